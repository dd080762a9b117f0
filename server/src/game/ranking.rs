//! End-of-game ingestion: persist the raw result and apply rank deltas.

use crate::{
    db::{
        models::{GameResultRow, DEFAULT_RANK_SCORE},
        RankStore,
    },
    game::scoring::ScoreFormula,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Team id the external client uses for the blue side.
pub const BLUE_TEAM_ID: u32 = 100;

/// End-of-game report as sent by the external client. Only the fields the
/// ranking needs are typed; everything else is kept for storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndOfGameData {
    pub game_id: u64,
    pub teams: Vec<EogTeam>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EogTeam {
    pub team_id: u32,
    pub is_winning_team: bool,
    pub players: Vec<EogPlayer>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EogPlayer {
    pub summoner_id: u64,
    #[serde(default)]
    pub summoner_name: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl EogTeam {
    fn side(&self) -> usize {
        if self.team_id == BLUE_TEAM_ID {
            0
        } else {
            1
        }
    }
}

/// Score change applied to one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreChange {
    pub player_id: String,
    pub name: String,
    pub is_win: bool,
    pub delta: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("game {game_id} on {server} already recorded")]
    DuplicateGame { game_id: String, server: String },
    #[error("malformed end-of-game data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Parse a raw end-of-game payload and ingest it. The payload is stored as
/// received.
pub async fn ingest_payload(
    store: &dyn RankStore,
    formula: &dyn ScoreFormula,
    payload: Value,
    server: &str,
) -> Result<Vec<ScoreChange>, IngestError> {
    let data = EndOfGameData::deserialize(&payload)?;
    handle_end_of_game_data(store, formula, &data, &payload.to_string(), server).await
}

/// Record a finished game and update every participant's rank score in one
/// write. A game already known for `server` is rejected with
/// [`IngestError::DuplicateGame`] and changes nothing; a store failure
/// leaves nothing behind, so the same report can be ingested again.
pub async fn handle_end_of_game_data(
    store: &dyn RankStore,
    formula: &dyn ScoreFormula,
    data: &EndOfGameData,
    raw: &str,
    server: &str,
) -> Result<Vec<ScoreChange>, IngestError> {
    let game_id = data.game_id.to_string();
    let duplicate = || IngestError::DuplicateGame {
        game_id: game_id.clone(),
        server: server.to_owned(),
    };

    if store.game_exists(&game_id, server).await? {
        log::warn!("game {game_id} on {server} already exists, skipping");
        return Err(duplicate());
    }

    // team totals from the scores before this game
    let mut totals = [0i64; 2];
    for team in &data.teams {
        for player in &team.players {
            let score = store
                .find_user(&player.summoner_id.to_string(), server)
                .await?
                .map(|u| u.rank_score)
                .unwrap_or(DEFAULT_RANK_SCORE);
            totals[team.side()] += i64::from(score);
        }
    }

    let mut rows = Vec::new();
    for team in &data.teams {
        let own = team.side();
        let score_difference = totals[1 - own] - totals[own];
        for player in &team.players {
            let player_id = player.summoner_id.to_string();
            let game_count = store.game_count(&player_id, server).await?;
            rows.push(GameResultRow {
                name: match player.summoner_name.as_str() {
                    "" => "N/A".to_owned(),
                    name => name.to_owned(),
                },
                player_id,
                is_win: team.is_winning_team,
                score_delta: formula.delta(team.is_winning_team, game_count, score_difference),
            });
        }
    }

    if !store.record_game(&game_id, server, raw, &rows).await? {
        log::warn!("game {game_id} on {server} recorded concurrently, skipping");
        return Err(duplicate());
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            log::info!(
                "game {game_id}: {} ({}) win={} delta={}",
                row.player_id,
                row.name,
                row.is_win,
                row.score_delta
            );
            ScoreChange {
                player_id: row.player_id,
                name: row.name,
                is_win: row.is_win,
                delta: row.score_delta,
            }
        })
        .collect())
}
