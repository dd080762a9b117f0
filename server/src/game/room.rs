//! One lobby room: seats, status and the participant-scoped view.

use crate::{
    connection::Connection,
    error::RoomError,
    game::{
        draft::DraftState,
        types::{
            team_of, GameAssignment, Participant, RoomOptions, RoomStatus, MAX_SEATS,
        },
    },
    protocol::{GameDataView, RoomView, ServerMsg, UserView, HIDDEN_ID},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A player sitting in a seat together with their socket.
#[derive(Debug, Clone)]
pub struct Occupant {
    pub player: Participant,
    pub conn: Connection,
    pub assignment: Option<GameAssignment>,
}

impl Occupant {
    pub fn new(player: Participant, conn: Connection) -> Self {
        Occupant {
            player,
            conn,
            assignment: None,
        }
    }
}

#[derive(Debug)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub server: String,
    pub password: Option<String>,
    pub waiting_time: u32,
    pub status: RoomStatus,
    pub seats: [Option<Occupant>; MAX_SEATS],
    pub draft: Option<DraftState>,
    /// Stop signal of the running countdown / execution.
    pub cancel: Option<CancellationToken>,
    /// Set once the last occupant left; a closed room is never reused.
    pub closed: bool,
}

impl Room {
    pub fn new(id: Uuid, opts: RoomOptions) -> Self {
        Room {
            id,
            name: opts.name,
            server: opts.server,
            password: opts.password.filter(|p| !p.is_empty()),
            waiting_time: opts.waiting_time,
            status: RoomStatus::Waiting,
            seats: Default::default(),
            draft: None,
            cancel: None,
            closed: false,
        }
    }

    pub fn seat_of(&self, player_id: &str) -> Option<usize> {
        self.seats
            .iter()
            .position(|s| s.as_ref().is_some_and(|o| o.player.id == player_id))
    }

    /// Occupied seats in seat order.
    pub fn occupants(&self) -> impl Iterator<Item = (usize, &Occupant)> {
        self.seats
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|o| (i, o)))
    }

    pub fn occupant_count(&self) -> usize {
        self.seats.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.iter().all(Option::is_none)
    }

    pub fn first_empty_seat(&self) -> Result<usize, RoomError> {
        self.seats
            .iter()
            .position(Option::is_none)
            .ok_or(RoomError::NoEmptySeats)
    }

    pub fn require_status(&self, status: RoomStatus) -> Result<(), RoomError> {
        if self.status == status {
            Ok(())
        } else {
            Err(RoomError::InvalidState(self.status))
        }
    }

    /// Seat a new occupant in the first empty seat.
    pub fn seat(&mut self, occupant: Occupant) -> Result<usize, RoomError> {
        let seat = self.first_empty_seat()?;
        self.seats[seat] = Some(occupant);
        Ok(seat)
    }

    pub fn remove(&mut self, player_id: &str) -> Option<Occupant> {
        let seat = self.seat_of(player_id)?;
        self.seats[seat].take()
    }

    /// Move into `target`, swapping with whoever sits there.
    pub fn change_seat(&mut self, player_id: &str, target: usize) -> Result<(), RoomError> {
        self.require_status(RoomStatus::Waiting)?;
        let from = self.seat_of(player_id).ok_or(RoomError::UserNotInRoom)?;
        if target >= MAX_SEATS || target == from {
            return Err(RoomError::InvalidSeat(target));
        }
        self.seats.swap(from, target);
        Ok(())
    }

    /// Back to `waiting`, forgetting every draft and the stop signal.
    pub fn reset_to_waiting(&mut self) {
        self.status = RoomStatus::Waiting;
        self.draft = None;
        self.cancel = None;
        for occupant in self.seats.iter_mut().flatten() {
            occupant.assignment = None;
        }
    }

    pub fn set_rank_score(&mut self, player_id: &str, rank_score: i32) {
        if let Some(seat) = self.seat_of(player_id) {
            if let Some(o) = self.seats[seat].as_mut() {
                o.player.rank_score = rank_score;
            }
        }
    }

    /// Projection of the room as `viewer_id` may see it.
    pub fn view(&self, viewer_id: &str, hide_rank_score: bool) -> RoomView {
        let viewer_team = self.seat_of(viewer_id).map(team_of);

        let available_champions = match (&self.draft, viewer_team) {
            (Some(draft), Some(team)) => draft.pool(team).to_vec(),
            _ => Vec::new(),
        };

        let users = self
            .seats
            .iter()
            .enumerate()
            .map(|(seat, slot)| {
                slot.as_ref().map(|o| {
                    let visible = self.status == RoomStatus::Waiting
                        || viewer_team == Some(team_of(seat));
                    UserView {
                        id: if o.player.id == viewer_id {
                            o.player.id.clone()
                        } else {
                            HIDDEN_ID.to_string()
                        },
                        name: o.player.name.clone(),
                        game_id: o.player.game_name.clone(),
                        game_data: o.assignment.filter(|_| visible).map(|a| GameDataView {
                            champion: a.champion,
                            remain_random: a.rerolls_remaining,
                        }),
                        rank_score: if hide_rank_score { 0 } else { o.player.rank_score },
                    }
                })
            })
            .collect();

        RoomView {
            id: self.id.to_string(),
            name: self.name.clone(),
            status: self.status,
            server: self.server.clone(),
            has_password: self.password.is_some(),
            total_time: self.waiting_time,
            available_champions,
            users,
        }
    }

    /// Send every occupant their own view wrapped by `wrap`.
    pub fn notify_with(&self, hide_rank_score: bool, wrap: impl Fn(RoomView) -> ServerMsg) {
        for (_, o) in self.occupants() {
            o.conn.emit(wrap(self.view(&o.player.id, hide_rank_score)));
        }
    }

    /// Broadcast a `roomUpdated` snapshot.
    pub fn notify(&self, hide_rank_score: bool) {
        self.notify_with(hide_rank_score, ServerMsg::RoomUpdated);
    }

    /// Send the same frame to every occupant.
    pub fn broadcast(&self, msg: &ServerMsg) {
        for (_, o) in self.occupants() {
            o.conn.emit(msg.clone());
        }
    }
}
