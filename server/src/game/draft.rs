//! Champion draft of a playing room: random assignment, rerolls and picks
//! from the team pool.

use crate::{
    error::RoomError,
    game::{
        room::Room,
        types::{team_of, GameAssignment, RoomStatus, Team, REROLLS_PER_GAME},
    },
};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashSet;

/// Per-room draft bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct DraftState {
    /// Champions rerolled away, free for teammates to pick. Indexed by team.
    pools: [Vec<u32>; 2],
    /// Every champion handed out this round.
    consumed: HashSet<u32>,
}

impl DraftState {
    pub fn pool(&self, team: Team) -> &[u32] {
        &self.pools[team.index()]
    }

    pub fn is_consumed(&self, champion: u32) -> bool {
        self.consumed.contains(&champion)
    }

    fn roll<R: Rng + ?Sized>(&self, owned: &[u32], rng: &mut R) -> Option<u32> {
        let eligible: Vec<u32> = owned
            .iter()
            .copied()
            .filter(|c| !self.consumed.contains(c))
            .collect();
        eligible.choose(rng).copied()
    }
}

/// Seed the draft when a room starts playing. Either every occupant gets a
/// champion or nothing changes.
pub fn start<R: Rng + ?Sized>(room: &mut Room, rng: &mut R) -> Result<(), RoomError> {
    let mut draft = DraftState::default();
    let mut assigned = Vec::new();

    for (seat, occupant) in room.occupants() {
        let champion = draft
            .roll(&occupant.player.owned_champions, rng)
            .ok_or(RoomError::RollFailed)?;
        draft.consumed.insert(champion);
        assigned.push((seat, champion));
    }

    for (seat, champion) in assigned {
        if let Some(occupant) = room.seats[seat].as_mut() {
            occupant.assignment = Some(GameAssignment {
                champion,
                rerolls_remaining: REROLLS_PER_GAME,
            });
        }
    }
    room.draft = Some(draft);
    Ok(())
}

fn playing_seat(room: &Room, player_id: &str) -> Result<usize, RoomError> {
    if room.status != RoomStatus::Playing || room.draft.is_none() {
        return Err(RoomError::GameNotStarted);
    }
    room.seat_of(player_id).ok_or(RoomError::UserNotInRoom)
}

/// Swap the current champion for a fresh random one.
pub fn reroll<R: Rng + ?Sized>(
    room: &mut Room,
    player_id: &str,
    rng: &mut R,
) -> Result<u32, RoomError> {
    let seat = playing_seat(room, player_id)?;
    let team = team_of(seat);
    let Room { seats, draft, .. } = room;
    let (Some(occupant), Some(draft)) = (seats[seat].as_mut(), draft.as_mut()) else {
        return Err(RoomError::GameNotStarted);
    };
    let Some(current) = occupant.assignment.as_mut() else {
        return Err(RoomError::GameNotStarted);
    };

    if current.rerolls_remaining == 0 {
        return Err(RoomError::NoRerollsRemaining);
    }
    let next = draft
        .roll(&occupant.player.owned_champions, rng)
        .ok_or(RoomError::RollFailed)?;

    draft.consumed.insert(next);
    draft.pools[team.index()].push(current.champion);
    current.champion = next;
    current.rerolls_remaining -= 1;
    Ok(next)
}

/// Take `champion` out of the team pool, returning the current one to it.
pub fn pick(room: &mut Room, player_id: &str, champion: u32) -> Result<(), RoomError> {
    let seat = playing_seat(room, player_id)?;
    let team = team_of(seat);
    let Room { seats, draft, .. } = room;
    let (Some(occupant), Some(draft)) = (seats[seat].as_mut(), draft.as_mut()) else {
        return Err(RoomError::GameNotStarted);
    };
    let Some(current) = occupant.assignment.as_mut() else {
        return Err(RoomError::GameNotStarted);
    };

    let pool = &mut draft.pools[team.index()];
    let Some(idx) = pool.iter().position(|c| *c == champion) else {
        return Err(RoomError::InvalidChampion(champion));
    };
    if !occupant.player.owned_champions.contains(&champion) {
        return Err(RoomError::ChampionNotOwned(champion));
    }

    pool.remove(idx);
    pool.push(current.champion);
    current.champion = champion;
    Ok(())
}
