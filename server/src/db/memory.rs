//! In-process [`RankStore`], used by tests and database-less local runs.

use crate::db::{
    models::{GameParticipantRecord, GameRecord, GameResultRow, UserRecord, DEFAULT_RANK_SCORE},
    rank_repo::RankStore,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::Mutex;

type Key = (String, String);

fn key(a: &str, server: &str) -> Key {
    (a.to_owned(), server.to_owned())
}

#[derive(Debug, Default)]
pub struct MemoryRankStore {
    users: DashMap<Key, UserRecord>,
    games: DashMap<Key, GameRecord>,
    participants: Mutex<Vec<GameParticipantRecord>>,
}

impl MemoryRankStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a player with a given score.
    pub fn insert_user(&self, player_id: &str, server: &str, name: &str, rank_score: i32) {
        self.users.insert(
            key(player_id, server),
            UserRecord {
                player_id: player_id.to_owned(),
                server: server.to_owned(),
                name: name.to_owned(),
                rank_score,
                created_at: Utc::now(),
            },
        );
    }

    pub fn game_total(&self) -> usize {
        self.games.len()
    }

    pub fn participant_rows(&self) -> Vec<GameParticipantRecord> {
        self.participants.lock().clone()
    }

    /// Stored payload of a game.
    pub fn game_payload(&self, game_id: &str, server: &str) -> Option<String> {
        self.games
            .get(&key(game_id, server))
            .map(|g| g.payload.clone())
    }
}

#[async_trait]
impl RankStore for MemoryRankStore {
    async fn find_user(&self, player_id: &str, server: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .users
            .get(&key(player_id, server))
            .map(|u| u.value().clone()))
    }

    async fn upsert_user(&self, player_id: &str, server: &str, name: &str) -> Result<UserRecord> {
        let mut user = self
            .users
            .entry(key(player_id, server))
            .or_insert_with(|| UserRecord {
                player_id: player_id.to_owned(),
                server: server.to_owned(),
                name: name.to_owned(),
                rank_score: DEFAULT_RANK_SCORE,
                created_at: Utc::now(),
            });
        user.name = name.to_owned();
        Ok(user.value().clone())
    }

    async fn game_count(&self, player_id: &str, server: &str) -> Result<u32> {
        let n = self
            .participants
            .lock()
            .iter()
            .filter(|p| p.player_id == player_id && p.server == server)
            .count();
        Ok(n as u32)
    }

    async fn game_exists(&self, game_id: &str, server: &str) -> Result<bool> {
        Ok(self.games.contains_key(&key(game_id, server)))
    }

    async fn record_game(
        &self,
        game_id: &str,
        server: &str,
        payload: &str,
        rows: &[GameResultRow],
    ) -> Result<bool> {
        // the participant lock serialises every writer
        let mut participants = self.participants.lock();
        let game = match self.games.entry(key(game_id, server)) {
            Entry::Occupied(_) => return Ok(false),
            Entry::Vacant(e) => e,
        };
        for (i, row) in rows.iter().enumerate() {
            if rows[..i].iter().any(|r| r.player_id == row.player_id) {
                anyhow::bail!("participant {} listed twice in game {game_id}", row.player_id);
            }
        }

        game.insert(GameRecord {
            game_id: game_id.to_owned(),
            server: server.to_owned(),
            payload: payload.to_owned(),
            created_at: Utc::now(),
        });
        for row in rows {
            self.users
                .entry(key(&row.player_id, server))
                .or_insert_with(|| UserRecord {
                    player_id: row.player_id.clone(),
                    server: server.to_owned(),
                    name: row.name.clone(),
                    rank_score: DEFAULT_RANK_SCORE,
                    created_at: Utc::now(),
                })
                .rank_score += row.score_delta;
            participants.push(GameParticipantRecord {
                game_id: game_id.to_owned(),
                server: server.to_owned(),
                player_id: row.player_id.clone(),
                is_win: row.is_win,
                score_delta: row.score_delta,
            });
        }
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
