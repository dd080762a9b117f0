//! Balanced team split for auto-arrange.
//!
//! With at most ten occupants an exhaustive search is cheap: C(10,5) = 252
//! candidate splits.

use crate::{
    error::RoomError,
    game::{
        room::{Occupant, Room},
        types::{RoomStatus, Team, MAX_SEATS, TEAM_SIZE},
    },
};
use rand::seq::IndexedRandom;
use rand::Rng;

/// One candidate split: `mask` bit `i` set means entry `i` goes to blue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub mask: u32,
    pub diff: i64,
}

/// Every split of `scores` into a group of `ceil(n/2)` and the rest, sorted
/// by score difference (best first).
pub fn all_splits(scores: &[i64]) -> Vec<Split> {
    let n = scores.len();
    let group = n.div_ceil(2) as u32;
    let total: i64 = scores.iter().sum();

    let mut splits: Vec<Split> = (0u32..(1 << n))
        .filter(|mask| mask.count_ones() == group)
        .map(|mask| {
            let blue: i64 = scores
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, s)| *s)
                .sum();
            Split {
                mask,
                diff: (2 * blue - total).abs(),
            }
        })
        .collect();
    splits.sort_by_key(|s| s.diff);
    splits
}

/// Pick a near-optimal split at random: anything within `tolerance` of the
/// best difference, limited to the best tenth of all splits.
pub fn choose_split<R: Rng + ?Sized>(scores: &[i64], tolerance: i64, rng: &mut R) -> Split {
    let splits = all_splits(scores);
    let Some(best) = splits.first().map(|s| s.diff) else {
        return Split { mask: 0, diff: 0 };
    };
    let cap = (splits.len() / 10).max(1);
    let candidates: Vec<Split> = splits
        .iter()
        .take(cap)
        .take_while(|s| s.diff <= best + tolerance)
        .copied()
        .collect();
    candidates.choose(rng).copied().unwrap_or(splits[0])
}

/// Re-seat the room's occupants along a balanced split.
pub fn auto_arrange<R: Rng + ?Sized>(
    room: &mut Room,
    tolerance: i64,
    rng: &mut R,
) -> Result<Split, RoomError> {
    room.require_status(RoomStatus::Waiting)?;

    let occupants: Vec<Occupant> = room.seats.iter_mut().filter_map(Option::take).collect();
    let scores: Vec<i64> = occupants
        .iter()
        .map(|o| i64::from(o.player.rank_score))
        .collect();
    let split = choose_split(&scores, tolerance, rng);

    let mut next = [Team::Blue.first_seat(), Team::Red.first_seat()];
    for (i, occupant) in occupants.into_iter().enumerate() {
        let team = if split.mask & (1 << i) != 0 {
            Team::Blue
        } else {
            Team::Red
        };
        let seat = next[team.index()];
        debug_assert!(seat < team.first_seat() + TEAM_SIZE && seat < MAX_SEATS);
        room.seats[seat] = Some(occupant);
        next[team.index()] += 1;
    }
    Ok(split)
}
