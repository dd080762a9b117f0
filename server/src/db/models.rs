use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Score used for players without a rank record.
pub const DEFAULT_RANK_SCORE: i32 = 1200;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserRecord {
    pub player_id: String,
    pub server: String,
    pub name: String,
    pub rank_score: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct GameRecord {
    pub game_id: String,
    pub server: String,
    /// Raw end-of-game payload (JSON).
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct GameParticipantRecord {
    pub game_id: String,
    pub server: String,
    pub player_id: String,
    pub is_win: bool,
    pub score_delta: i32,
}

/// One player's outcome of a game, written together with the game record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameResultRow {
    pub player_id: String,
    /// Display name used when the player has no rank record yet.
    pub name: String,
    pub is_win: bool,
    pub score_delta: i32,
}
