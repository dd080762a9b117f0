use serde::{Deserialize, Serialize};
use std::fmt;

/// Seats per room.
pub const MAX_SEATS: usize = 10;
/// Seats per team; seats `0..TEAM_SIZE` are blue, the rest red.
pub const TEAM_SIZE: usize = MAX_SEATS / 2;
/// Rerolls every player starts a draft with.
pub const REROLLS_PER_GAME: u8 = 2;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Blue,
    Red,
}

impl Team {
    pub fn index(self) -> usize {
        match self {
            Team::Blue => 0,
            Team::Red => 1,
        }
    }

    /// First seat belonging to this team.
    pub fn first_seat(self) -> usize {
        self.index() * TEAM_SIZE
    }
}

/// Which team a seat plays for.
pub fn team_of(seat: usize) -> Team {
    if seat < TEAM_SIZE {
        Team::Blue
    } else {
        Team::Red
    }
}

/// Room life-cycle.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Executing,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Playing => "playing",
            RoomStatus::Executing => "executing",
        };
        f.write_str(s)
    }
}

/// A connected player as the lobby knows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// External account id (the game client's summoner id).
    pub id: String,
    pub name: String,
    /// Name shown inside the external game client.
    pub game_name: String,
    pub owned_champions: Vec<u32>,
    pub rank_score: i32,
}

/// Per-player draft result while a room is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameAssignment {
    pub champion: u32,
    pub rerolls_remaining: u8,
}

/// Options a creator supplies when opening a room.
#[derive(Debug, Clone)]
pub struct RoomOptions {
    pub name: String,
    pub waiting_time: u32,
    pub server: String,
    pub password: Option<String>,
}
