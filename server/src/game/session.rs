//! One async task per started room: countdown, then the execution pipeline.
//!
//! Phases run in strict order and the first hard failure skips the rest.
//! Whatever happens (cancellation, failure, panic) the task ends with a single
//! `finish` frame, the room back in `waiting` and a fresh `roomUpdated`.

use crate::{
    config::JoinConflictPolicy,
    connection::{Connection, Listener},
    coordinator::{call, call_all, CallSpec, Target},
    db::RankStore,
    error::ExecError,
    game::{
        ranking::{self, IngestError},
        registry::{Context, RoomHandle},
        types::{team_of, RoomStatus, Team},
    },
    metrics::PIPELINE_RUNS,
    protocol::{
        ActionKind, CreateRoomRequest, CreateRoomResult, JoinRoomRequest, PickRequest, Progress,
        ProgressStatus, ServerMsg, Topic, ALREADY_IN_GAME,
    },
};
use futures::{
    stream::{FuturesUnordered, StreamExt},
    FutureExt,
};
use serde::de::IgnoredAny;
use serde_json::Value;
use std::{panic::AssertUnwindSafe, sync::Arc};
use tokio::{
    task::JoinHandle,
    time::{sleep, Duration},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub(crate) fn spawn(
    room: RoomHandle,
    ctx: Arc<Context>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move { run(room, ctx, cancel).await })
}

async fn run(room: RoomHandle, ctx: Arc<Context>, cancel: CancellationToken) {
    let hide = ctx.settings.hide_rank_score;

    if !countdown(&room, &ctx, &cancel).await {
        let mut r = room.lock();
        log::info!("room {}: countdown stopped", r.id);
        r.reset_to_waiting();
        r.broadcast(&ServerMsg::End);
        r.notify(hide);
        return;
    }

    let outcome = AssertUnwindSafe(execute(&room, &ctx, &cancel))
        .catch_unwind()
        .await;
    let label = match outcome {
        Ok(Ok(())) => "completed",
        Ok(Err(ExecError::PipelineCancelled)) => "stopped",
        Ok(Err(_)) => "failed",
        Err(_) => {
            log::error!("room pipeline panicked");
            "panicked"
        }
    };
    PIPELINE_RUNS.with_label_values(&[label]).inc();

    let mut r = room.lock();
    r.notify_with(hide, ServerMsg::Finish);
    r.reset_to_waiting();
    r.notify(hide);
    log::info!("room {}: execution {label}", r.id);
}

/// Tick down the waiting time. `false` when stopped.
async fn countdown(room: &RoomHandle, ctx: &Context, cancel: &CancellationToken) -> bool {
    let total = room.lock().waiting_time;
    for remaining in (1..=total).rev() {
        room.lock().broadcast(&ServerMsg::Time { time: remaining });
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            _ = sleep(ctx.settings.tick) => {}
        }
    }
    !cancel.is_cancelled()
}

/// Participant snapshot taken when execution starts.
#[derive(Debug, Clone)]
struct Member {
    label: String,
    team: Team,
    conn: Connection,
    champion: Option<u32>,
}

impl Member {
    fn target(&self, request: ServerMsg) -> Target {
        Target {
            conn: self.conn.clone(),
            label: self.label.clone(),
            request,
        }
    }
}

/// Execution log broadcast to the room.
struct ProgressLog<'a> {
    room: &'a RoomHandle,
    next_id: u32,
}

impl<'a> ProgressLog<'a> {
    fn new(room: &'a RoomHandle) -> Self {
        ProgressLog { room, next_id: 0 }
    }

    fn begin(&mut self, message: impl Into<String>) -> Progress {
        let item = Progress {
            id: self.next_id,
            message: message.into(),
            status: ProgressStatus::Pending,
        };
        self.next_id += 1;
        self.emit(&item);
        item
    }

    fn set(&self, item: &mut Progress, message: impl Into<String>, status: ProgressStatus) {
        item.message = message.into();
        item.status = status;
        self.emit(item);
    }

    /// Mark `item` failed and hand the error back.
    fn fail(&self, item: &mut Progress, message: &str, err: ExecError) -> ExecError {
        self.set(item, format!("{message}: {err}"), ProgressStatus::Failure);
        err
    }

    fn emit(&self, item: &Progress) {
        self.room
            .lock()
            .broadcast(&ServerMsg::ExecuteProgress(item.clone()));
    }
}

fn enter_executing(room: &RoomHandle, hide: bool) -> (Uuid, String, Vec<Member>) {
    let mut r = room.lock();
    r.status = RoomStatus::Executing;
    let members = r
        .occupants()
        .map(|(seat, o)| Member {
            label: format!("{} ({})", o.player.name, o.player.id),
            team: team_of(seat),
            conn: o.conn.clone(),
            champion: o.assignment.map(|a| a.champion),
        })
        .collect();
    r.notify(hide);
    (r.id, r.server.clone(), members)
}

async fn execute(
    room: &RoomHandle,
    ctx: &Context,
    cancel: &CancellationToken,
) -> Result<(), ExecError> {
    let (room_id, server, members) = enter_executing(room, ctx.settings.hide_rank_score);
    let mut log = ProgressLog::new(room);

    let result = phases(room, room_id, &server, &members, ctx, cancel, &mut log).await;
    match &result {
        Ok(()) => {}
        Err(ExecError::PipelineCancelled) => {
            let mut item = log.begin("Stopped by player");
            log.set(&mut item, "Stopped by player", ProgressStatus::Failure);
        }
        Err(e) => log::warn!("room {room_id}: execution failed: {e}"),
    }
    result
}

fn action(ctx: &Context, kind: ActionKind) -> CallSpec {
    let s = &ctx.settings;
    CallSpec::new(kind, s.action_timeout, s.action_attempts, s.retry_backoff)
}

async fn phases(
    room: &RoomHandle,
    room_id: Uuid,
    server: &str,
    members: &[Member],
    ctx: &Context,
    cancel: &CancellationToken,
    log: &mut ProgressLog<'_>,
) -> Result<(), ExecError> {
    let s = &ctx.settings;
    let Some((host, guests)) = members.split_first() else {
        return Err(ExecError::PipelineCancelled);
    };
    let n = members.len();

    // a. everybody's client is ready
    let mut item = log.begin(format!("Waiting for players to get ready (0 / {n})"));
    let targets: Vec<Target> = members
        .iter()
        .map(|m| m.target(ServerMsg::PrepareExecute))
        .collect();
    let barrier = CallSpec::new(ActionKind::PrepareExecute, s.barrier_timeout, 1, s.retry_backoff);
    let res = call_all::<IgnoredAny, _>(&targets, &barrier, cancel, |done, total| {
        log.set(
            &mut item,
            format!("Waiting for players to get ready ({done} / {total})"),
            ProgressStatus::Pending,
        )
    })
    .await;
    match res {
        Ok(_) => log.set(&mut item, "All players are ready", ProgressStatus::Success),
        Err(e) => return Err(log.fail(&mut item, "Players are not ready", e)),
    }

    // b. external lobby
    let mut item = log.begin(format!("Creating the game room ({})", host.label));
    let request = CreateRoomRequest {
        room_name: room_id.to_string(),
        password: Uuid::new_v4().simple().to_string(),
        team: host.team,
    };
    let lobby: CreateRoomResult = match call(
        &host.target(ServerMsg::CreateRoom(request)),
        &action(ctx, ActionKind::CreateRoom),
        cancel,
    )
    .await
    {
        Ok(lobby) => {
            log.set(&mut item, "Game room created", ProgressStatus::Success);
            lobby
        }
        Err(e) => return Err(log.fail(&mut item, "Room creation failed", e)),
    };

    // c. give the external client time to publish the lobby
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ExecError::PipelineCancelled),
        _ = sleep(s.settle_delay) => {}
    }

    // d. everybody else joins
    if !guests.is_empty() {
        let total = guests.len();
        let mut item = log.begin(format!("Players joining the room (0 / {total})"));
        let targets: Vec<Target> = guests
            .iter()
            .map(|m| {
                m.target(ServerMsg::JoinRoom(JoinRoomRequest {
                    room_name: lobby.room_name.clone(),
                    password: lobby.password.clone(),
                    team: m.team,
                }))
            })
            .collect();
        let mut spec = action(ctx, ActionKind::JoinRoom);
        if s.join_conflict == JoinConflictPolicy::Succeed {
            spec = spec.tolerate(ALREADY_IN_GAME);
        }
        let res = call_all::<IgnoredAny, _>(&targets, &spec, cancel, |done, total| {
            log.set(
                &mut item,
                format!("Players joining the room ({done} / {total})"),
                ProgressStatus::Pending,
            )
        })
        .await;
        match res {
            Ok(_) => log.set(&mut item, "All players joined", ProgressStatus::Success),
            Err(e) => return Err(log.fail(&mut item, "Joining the room failed", e)),
        }
    }

    // e. host starts champion select
    let mut item = log.begin("Starting the game");
    match call::<IgnoredAny>(
        &host.target(ServerMsg::StartGame),
        &action(ctx, ActionKind::StartGame),
        cancel,
    )
    .await
    {
        Ok(_) => log.set(&mut item, "Game started", ProgressStatus::Success),
        Err(e) => return Err(log.fail(&mut item, "Starting the game failed", e)),
    }

    // f. lock in the drafted champions
    let targets: Vec<Target> = members
        .iter()
        .filter_map(|m| {
            m.champion
                .map(|champion| m.target(ServerMsg::Pick(PickRequest { champion })))
        })
        .collect();
    let total = targets.len();
    let mut item = log.begin(format!("Picking champions (0 / {total})"));
    let res = call_all::<IgnoredAny, _>(
        &targets,
        &action(ctx, ActionKind::Pick),
        cancel,
        |done, total| {
            log.set(
                &mut item,
                format!("Picking champions ({done} / {total})"),
                ProgressStatus::Pending,
            )
        },
    )
    .await;
    match res {
        Ok(_) => log.set(&mut item, "Champions picked", ProgressStatus::Success),
        Err(e) => return Err(log.fail(&mut item, "Picking champions failed", e)),
    }

    // g. wait for somebody to report the result
    let mut item = log.begin("Waiting for the game to end");
    let payload = match await_result(members, s.result_timeout, cancel).await {
        Ok(payload) => {
            log.set(&mut item, "Game finished", ProgressStatus::Success);
            payload
        }
        Err(e) => return Err(log.fail(&mut item, "No game result", e)),
    };

    // h. rank scores
    let mut item = log.begin("Updating rank scores");
    match ranking::ingest_payload(ctx.store.as_ref(), ctx.formula.as_ref(), payload, server).await
    {
        Ok(changes) => {
            log::info!("room {room_id}: {} rank score(s) updated", changes.len());
            refresh_scores(room, ctx.store.as_ref(), server).await;
            log.set(&mut item, "Rank scores updated", ProgressStatus::Success);
        }
        Err(e @ IngestError::DuplicateGame { .. }) => {
            log::warn!("room {room_id}: {e}");
            log.set(&mut item, "Game was already recorded", ProgressStatus::Success);
        }
        Err(e) => {
            log::error!("room {room_id}: result ingestion failed: {e}");
            log.set(
                &mut item,
                format!("Updating rank scores failed: {e}"),
                ProgressStatus::Failure,
            );
        }
    }
    Ok(())
}

/// Reload the occupants' scores so the next views and arrangements use them.
async fn refresh_scores(room: &RoomHandle, store: &dyn RankStore, server: &str) {
    let ids: Vec<String> = room
        .lock()
        .occupants()
        .map(|(_, o)| o.player.id.clone())
        .collect();
    for id in ids {
        match store.find_user(&id, server).await {
            Ok(Some(user)) => {
                room.lock().set_rank_score(&id, user.rank_score);
            }
            Ok(None) => {}
            Err(e) => log::warn!("could not reload the score of {id}: {e:#}"),
        }
    }
}

/// First `end-of-game` report from any member.
async fn await_result(
    members: &[Member],
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Value, ExecError> {
    let mut listeners: Vec<Listener> = members
        .iter()
        .map(|m| m.conn.once(Topic::EndOfGame))
        .collect();
    let mut reports: FuturesUnordered<_> = listeners.iter_mut().map(|l| l.recv()).collect();
    let deadline = sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExecError::PipelineCancelled),
            _ = &mut deadline => return Err(ExecError::NoResult),
            report = reports.next() => match report {
                Some(Some(Ok(payload))) => return Ok(payload),
                Some(Some(Err(detail))) => log::warn!("end-of-game report failed: {detail}"),
                // that member is gone, keep waiting for the others
                Some(None) => {}
                None => return Err(ExecError::NoResult),
            },
        }
    }
}
