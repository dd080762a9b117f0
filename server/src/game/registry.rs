//! Owned registry of live rooms.
//!
//! Lock order: a `members` entry, then the room mutex. No lock is ever held
//! across an await; the room pipeline only touches its own room.

use crate::{
    config::Settings,
    connection::Connection,
    db::RankStore,
    error::RoomError,
    game::{
        arrange, draft,
        room::{Occupant, Room},
        scoring::{DefaultFormula, ScoreFormula},
        session,
        types::{Participant, RoomOptions, RoomStatus},
    },
    metrics::ACTIVE_ROOMS,
    protocol::{ClientMsg, ServerMsg},
};
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Collaborators shared by the registry and every room pipeline.
pub struct Context {
    pub settings: Settings,
    pub store: Arc<dyn RankStore>,
    pub formula: Arc<dyn ScoreFormula>,
}

impl Context {
    pub fn new(settings: Settings, store: Arc<dyn RankStore>) -> Self {
        Context {
            settings,
            store,
            formula: Arc::new(DefaultFormula),
        }
    }

    pub fn with_formula(mut self, formula: Arc<dyn ScoreFormula>) -> Self {
        self.formula = formula;
        self
    }
}

/// Shared handle to one room.
#[derive(Clone)]
pub struct RoomHandle {
    room: Arc<Mutex<Room>>,
}

impl RoomHandle {
    fn new(room: Room) -> Self {
        RoomHandle {
            room: Arc::new(Mutex::new(room)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Room> {
        self.room.lock()
    }
}

/// Where a connecting player wants to go.
#[derive(Debug, Clone, Default)]
pub struct JoinRequest {
    pub room_id: Option<Uuid>,
    pub password: Option<String>,
    /// Used when `room_id` is absent or unknown.
    pub create: Option<RoomOptions>,
}

pub struct Registry {
    rooms: DashMap<Uuid, RoomHandle>,
    /// player id → room id
    members: DashMap<String, Uuid>,
    ctx: Arc<Context>,
}

impl Registry {
    pub fn new(ctx: Context) -> Self {
        Registry {
            rooms: DashMap::new(),
            members: DashMap::new(),
            ctx: Arc::new(ctx),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.ctx.settings
    }

    pub fn store(&self) -> &Arc<dyn RankStore> {
        &self.ctx.store
    }

    pub fn formula(&self) -> &dyn ScoreFormula {
        self.ctx.formula.as_ref()
    }

    pub fn room(&self, room_id: Uuid) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(&room_id)
            .map(|r| r.value().clone())
            .ok_or(RoomError::RoomNotFound)
    }

    pub fn room_of(&self, player_id: &str) -> Option<Uuid> {
        self.members.get(player_id).map(|r| *r.value())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn hide(&self) -> bool {
        self.ctx.settings.hide_rank_score
    }

    fn validate(&self, opts: &RoomOptions) -> Result<(), RoomError> {
        let s = &self.ctx.settings;
        if opts.name.trim().is_empty() {
            return Err(RoomError::InvalidOptions("room name is required".into()));
        }
        if !(s.min_waiting_time..=s.max_waiting_time).contains(&opts.waiting_time) {
            return Err(RoomError::InvalidOptions(format!(
                "waiting time must be between {} and {} seconds",
                s.min_waiting_time, s.max_waiting_time
            )));
        }
        Ok(())
    }

    /// Seat `player` in the requested room, or in a fresh one built from
    /// `req.create` when the id is absent or unknown.
    pub fn join_room(
        &self,
        req: JoinRequest,
        player: Participant,
        conn: Connection,
    ) -> Result<Uuid, RoomError> {
        let member = match self.members.entry(player.id.clone()) {
            Entry::Occupied(_) => return Err(RoomError::AlreadyInRoom),
            Entry::Vacant(e) => e,
        };

        let existing = req.room_id.and_then(|id| self.room(id).ok());
        if let Some(handle) = existing {
            let mut room = handle.lock();
            if !room.closed {
                room.require_status(RoomStatus::Waiting)?;
                if room.password.is_some() && room.password != req.password {
                    return Err(RoomError::WrongPassword);
                }
                let seat = room
                    .seat(Occupant::new(player.clone(), conn))
                    .map_err(|_| RoomError::RoomFull)?;
                member.insert(room.id);
                log::info!("{} joined room {} at seat {seat}", player.id, room.id);
                room.notify(self.hide());
                return Ok(room.id);
            }
        }

        let Some(opts) = req.create else {
            return Err(RoomError::RoomNotFound);
        };
        self.validate(&opts)?;

        let id = Uuid::new_v4();
        let mut room = Room::new(id, opts);
        room.seat(Occupant::new(player.clone(), conn))?;
        room.notify(self.hide());
        self.rooms.insert(id, RoomHandle::new(room));
        member.insert(id);
        ACTIVE_ROOMS.inc();
        log::info!("{} created room {id}", player.id);
        Ok(id)
    }

    /// Leave the room. A running countdown or execution is cancelled; the
    /// room is destroyed once nobody is left.
    pub fn quit_room(&self, room_id: Uuid, player_id: &str) -> Result<(), RoomError> {
        let handle = self.room(room_id)?;
        let now_empty = {
            let mut room = handle.lock();
            room.remove(player_id).ok_or(RoomError::UserNotInRoom)?;
            if room.status != RoomStatus::Waiting {
                if let Some(token) = &room.cancel {
                    token.cancel();
                }
            }
            if room.is_empty() {
                room.closed = true;
                true
            } else {
                room.notify(self.hide());
                false
            }
        };
        self.members.remove_if(player_id, |_, r| *r == room_id);
        log::info!("{player_id} left room {room_id}");

        if now_empty && self.rooms.remove(&room_id).is_some() {
            ACTIVE_ROOMS.dec();
            log::info!("room {room_id} destroyed");
        }
        Ok(())
    }

    fn with_room<T>(
        &self,
        room_id: Uuid,
        f: impl FnOnce(&mut Room) -> Result<T, RoomError>,
    ) -> Result<T, RoomError> {
        let handle = self.room(room_id)?;
        let mut room = handle.lock();
        let out = f(&mut room)?;
        room.notify(self.hide());
        Ok(out)
    }

    pub fn change_seat(&self, room_id: Uuid, player_id: &str, seat: usize) -> Result<(), RoomError> {
        self.with_room(room_id, |room| room.change_seat(player_id, seat))
    }

    pub fn auto_arrange(&self, room_id: Uuid, player_id: &str) -> Result<(), RoomError> {
        let tolerance = self.ctx.settings.arrange_tolerance;
        self.with_room(room_id, |room| {
            room.seat_of(player_id).ok_or(RoomError::UserNotInRoom)?;
            let split = arrange::auto_arrange(room, tolerance, &mut rand::rng())?;
            log::debug!("room {room_id} arranged, score difference {}", split.diff);
            Ok(())
        })
    }

    pub fn reroll(&self, room_id: Uuid, player_id: &str) -> Result<u32, RoomError> {
        self.with_room(room_id, |room| draft::reroll(room, player_id, &mut rand::rng()))
    }

    pub fn pick(&self, room_id: Uuid, player_id: &str, champion: u32) -> Result<(), RoomError> {
        self.with_room(room_id, |room| draft::pick(room, player_id, champion))
    }

    /// Seed the draft and start the countdown.
    pub fn play(&self, room_id: Uuid, player_id: &str) -> Result<(), RoomError> {
        let handle = self.room(room_id)?;
        let token = CancellationToken::new();
        {
            let mut room = handle.lock();
            room.seat_of(player_id).ok_or(RoomError::UserNotInRoom)?;
            room.require_status(RoomStatus::Waiting)?;
            draft::start(&mut room, &mut rand::rng())?;
            room.status = RoomStatus::Playing;
            room.cancel = Some(token.clone());
            room.notify(self.hide());
            room.broadcast(&ServerMsg::Play);
        }
        log::info!("{player_id} started room {room_id}");
        session::spawn(handle, self.ctx.clone(), token);
        Ok(())
    }

    /// Stop the countdown or the running execution.
    pub fn end(&self, room_id: Uuid, player_id: &str) -> Result<(), RoomError> {
        let handle = self.room(room_id)?;
        let room = handle.lock();
        room.seat_of(player_id).ok_or(RoomError::UserNotInRoom)?;
        if room.status == RoomStatus::Waiting {
            return Err(RoomError::InvalidState(room.status));
        }
        if let Some(token) = &room.cancel {
            log::info!("{player_id} stopped room {room_id}");
            token.cancel();
        }
        Ok(())
    }

    /// Dispatch a client command.
    pub fn handle(&self, room_id: Uuid, player_id: &str, msg: ClientMsg) -> Result<(), RoomError> {
        match msg {
            ClientMsg::ChangeSeat { seat } => self.change_seat(room_id, player_id, seat),
            ClientMsg::Play => self.play(room_id, player_id),
            ClientMsg::AutoArrange => self.auto_arrange(room_id, player_id),
            ClientMsg::Random => self.reroll(room_id, player_id).map(|_| ()),
            ClientMsg::Pick { champion } => self.pick(room_id, player_id, champion),
            ClientMsg::End => self.end(room_id, player_id),
        }
    }
}
