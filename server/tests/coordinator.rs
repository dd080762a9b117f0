mod common;

use aram_lobby_server::{
    coordinator::{call, call_all, CallSpec, Target},
    error::ExecError,
    game::types::Team,
    protocol::{
        ActionKind, CreateRoomRequest, CreateRoomResult, JoinRoomRequest, PickRequest, ServerMsg,
        ALREADY_IN_GAME,
    },
};
use common::*;
use serde::de::IgnoredAny;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;

fn spec(kind: ActionKind, attempts: u32) -> CallSpec {
    CallSpec::new(kind, Duration::from_millis(40), attempts, Duration::from_millis(5))
}

fn target(client: &FakeClient, request: ServerMsg) -> Target {
    Target {
        conn: client.conn.clone(),
        label: "tester".into(),
        request,
    }
}

fn silent() -> Responder {
    Arc::new(|_, _| None)
}

fn create_request() -> ServerMsg {
    ServerMsg::CreateRoom(CreateRoomRequest {
        room_name: "r".into(),
        password: "p".into(),
        team: Team::Blue,
    })
}

#[tokio::test]
async fn success_returns_typed_result() {
    let client = FakeClient::spawn(cooperative());
    let cancel = CancellationToken::new();

    let lobby: CreateRoomResult = call(
        &target(&client, create_request()),
        &spec(ActionKind::CreateRoom, 3),
        &cancel,
    )
    .await
    .unwrap();

    assert_eq!(lobby.room_name, "lobby");
    assert_eq!(client.requests(ActionKind::CreateRoom), 1);
    assert_eq!(client.conn.listener_count(), 0);
}

#[tokio::test]
async fn failures_are_retried_until_the_budget_is_spent() {
    let client = FakeClient::spawn(failing_on(ActionKind::StartGame));
    let cancel = CancellationToken::new();

    let err = call::<IgnoredAny>(
        &target(&client, ServerMsg::StartGame),
        &spec(ActionKind::StartGame, 3),
        &cancel,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExecError::RemoteActionFailed { ref detail, .. } if detail == "boom"));
    assert_eq!(client.requests(ActionKind::StartGame), 3);
    assert_eq!(client.conn.listener_count(), 0);
}

#[tokio::test]
async fn a_later_attempt_can_succeed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let client = FakeClient::spawn(Arc::new(move |_, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Some(Err("not yet".into()))
        } else {
            Some(Ok(serde_json::Value::Null))
        }
    }));
    let cancel = CancellationToken::new();

    call::<IgnoredAny>(
        &target(&client, ServerMsg::StartGame),
        &spec(ActionKind::StartGame, 3),
        &cancel,
    )
    .await
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(client.conn.listener_count(), 0);
}

#[tokio::test]
async fn silence_times_out_each_attempt() {
    let client = FakeClient::spawn(silent());
    let cancel = CancellationToken::new();

    let err = call::<IgnoredAny>(
        &target(&client, ServerMsg::StartGame),
        &spec(ActionKind::StartGame, 2),
        &cancel,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExecError::RemoteActionTimeout { .. }));
    assert_eq!(client.requests(ActionKind::StartGame), 2);
    assert_eq!(client.conn.listener_count(), 0);
}

#[tokio::test]
async fn disconnect_fails_without_retry() {
    let client = FakeClient::spawn(silent());
    let cancel = CancellationToken::new();
    let conn = client.conn.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        conn.close();
    });

    let err = call::<IgnoredAny>(
        &target(&client, ServerMsg::StartGame),
        &CallSpec::new(ActionKind::StartGame, Duration::from_secs(5), 3, Duration::ZERO),
        &cancel,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExecError::RemoteActionDisconnected { .. }));
    assert_eq!(client.requests(ActionKind::StartGame), 1);
    assert_eq!(client.conn.listener_count(), 0);
}

#[tokio::test]
async fn cancellation_aborts_pending_waits() {
    let clients: Vec<FakeClient> = (0..3).map(|_| FakeClient::spawn(silent())).collect();
    let targets: Vec<Target> = clients
        .iter()
        .map(|c| target(c, ServerMsg::PrepareExecute))
        .collect();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = call_all::<IgnoredAny, _>(
        &targets,
        &CallSpec::new(ActionKind::PrepareExecute, Duration::from_secs(5), 1, Duration::ZERO),
        &cancel,
        |_, _| {},
    )
    .await
    .unwrap_err();

    assert_eq!(err, ExecError::PipelineCancelled);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(clients.iter().all(|c| c.conn.listener_count() == 0));
}

#[tokio::test]
async fn one_failure_fails_the_whole_fan_out() {
    let good = FakeClient::spawn(silent());
    let bad = FakeClient::spawn(failing_on(ActionKind::Pick));
    let pick = ServerMsg::Pick(PickRequest { champion: 7 });
    let targets = vec![target(&good, pick.clone()), target(&bad, pick)];
    let cancel = CancellationToken::new();

    let err = call_all::<IgnoredAny, _>(
        &targets,
        &CallSpec::new(ActionKind::Pick, Duration::from_secs(5), 2, Duration::ZERO),
        &cancel,
        |_, _| {},
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExecError::RemoteActionFailed { .. }));
    assert_eq!(good.conn.listener_count(), 0);
    assert_eq!(bad.conn.listener_count(), 0);
}

#[tokio::test]
async fn progress_counts_every_success() {
    let clients: Vec<FakeClient> = (0..4).map(|_| FakeClient::spawn(cooperative())).collect();
    let targets: Vec<Target> = clients
        .iter()
        .map(|c| target(c, ServerMsg::PrepareExecute))
        .collect();
    let cancel = CancellationToken::new();
    let mut progress = Vec::new();

    let results = call_all::<IgnoredAny, _>(
        &targets,
        &spec(ActionKind::PrepareExecute, 1),
        &cancel,
        |done, total| progress.push((done, total)),
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(progress, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
}

#[tokio::test]
async fn tolerated_failure_counts_as_success() {
    let client = FakeClient::spawn(Arc::new(|_, _| Some(Err(ALREADY_IN_GAME.into()))));
    let cancel = CancellationToken::new();
    let request = target(
        &client,
        ServerMsg::JoinRoom(JoinRoomRequest {
            room_name: "lobby".into(),
            password: "secret".into(),
            team: Team::Red,
        }),
    );

    call::<IgnoredAny>(
        &request,
        &spec(ActionKind::JoinRoom, 1).tolerate(ALREADY_IN_GAME),
        &cancel,
    )
    .await
    .unwrap();

    let err = call::<IgnoredAny>(&request, &spec(ActionKind::JoinRoom, 1), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::RemoteActionFailed { .. }));
    assert_eq!(client.conn.listener_count(), 0);
}

#[tokio::test]
async fn unreadable_reply_is_reported() {
    let client = FakeClient::spawn(Arc::new(|_, _| Some(Ok(serde_json::json!(42)))));
    let cancel = CancellationToken::new();

    let err = call::<CreateRoomResult>(
        &target(&client, create_request()),
        &spec(ActionKind::CreateRoom, 1),
        &cancel,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ExecError::BadReply { .. }));
}
