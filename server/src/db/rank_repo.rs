//! Rank records and game history.

use crate::db::models::{GameResultRow, UserRecord, DEFAULT_RANK_SCORE};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

/// Persistence collaborator of the lobby. Every key is scoped by the game
/// server tag: the same player id on two servers is two players.
#[async_trait]
pub trait RankStore: Send + Sync {
    async fn find_user(&self, player_id: &str, server: &str) -> Result<Option<UserRecord>>;

    /// Create the record at the default score or refresh its display name.
    async fn upsert_user(&self, player_id: &str, server: &str, name: &str) -> Result<UserRecord>;

    /// Number of recorded games of a player.
    async fn game_count(&self, player_id: &str, server: &str) -> Result<u32>;

    async fn game_exists(&self, game_id: &str, server: &str) -> Result<bool>;

    /// Store a game with its participant rows and apply every score delta,
    /// all or nothing. A player without a record starts at
    /// `DEFAULT_RANK_SCORE`. Returns `false`, writing nothing, if
    /// `(game_id, server)` already existed.
    async fn record_game(
        &self,
        game_id: &str,
        server: &str,
        payload: &str,
        rows: &[GameResultRow],
    ) -> Result<bool>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgRankStore {
    db: PgPool,
}

const SCHEMA: [&str; 3] = [
    r#"CREATE TABLE IF NOT EXISTS rank_users (
           player_id  TEXT        NOT NULL,
           server     TEXT        NOT NULL,
           name       TEXT        NOT NULL,
           rank_score INTEGER     NOT NULL,
           created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
           PRIMARY KEY (player_id, server)
       )"#,
    r#"CREATE TABLE IF NOT EXISTS games (
           game_id    TEXT        NOT NULL,
           server     TEXT        NOT NULL,
           payload    TEXT        NOT NULL,
           created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
           PRIMARY KEY (game_id, server)
       )"#,
    r#"CREATE TABLE IF NOT EXISTS game_participants (
           game_id     TEXT    NOT NULL,
           server      TEXT    NOT NULL,
           player_id   TEXT    NOT NULL,
           is_win      BOOLEAN NOT NULL,
           score_delta INTEGER NOT NULL,
           PRIMARY KEY (game_id, server, player_id),
           FOREIGN KEY (game_id, server) REFERENCES games (game_id, server)
       )"#,
];

impl PgRankStore {
    pub fn new(db: PgPool) -> Self {
        PgRankStore { db }
    }

    /// Create missing tables. Idempotent.
    pub async fn create_tables(&self) -> Result<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt)
                .execute(&self.db)
                .await
                .context("creating tables")?;
        }
        Ok(())
    }
}

#[async_trait]
impl RankStore for PgRankStore {
    async fn find_user(&self, player_id: &str, server: &str) -> Result<Option<UserRecord>> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT player_id, server, name, rank_score, created_at
               FROM rank_users
              WHERE player_id = $1 AND server = $2",
        )
        .bind(player_id)
        .bind(server)
        .fetch_optional(&self.db)
        .await
        .context("fetching rank user")
    }

    async fn upsert_user(&self, player_id: &str, server: &str, name: &str) -> Result<UserRecord> {
        sqlx::query_as::<_, UserRecord>(
            "INSERT INTO rank_users (player_id, server, name, rank_score)
                  VALUES ($1, $2, $3, $4)
             ON CONFLICT (player_id, server) DO UPDATE
                     SET name = EXCLUDED.name
               RETURNING player_id, server, name, rank_score, created_at",
        )
        .bind(player_id)
        .bind(server)
        .bind(name)
        .bind(DEFAULT_RANK_SCORE)
        .fetch_one(&self.db)
        .await
        .context("upserting rank user")
    }

    async fn game_count(&self, player_id: &str, server: &str) -> Result<u32> {
        let n = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM game_participants WHERE player_id = $1 AND server = $2",
        )
        .bind(player_id)
        .bind(server)
        .fetch_one(&self.db)
        .await
        .context("counting games")?;
        Ok(u32::try_from(n).unwrap_or(u32::MAX))
    }

    async fn game_exists(&self, game_id: &str, server: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM games WHERE game_id = $1 AND server = $2)",
        )
        .bind(game_id)
        .bind(server)
        .fetch_one(&self.db)
        .await
        .context("checking game")
    }

    async fn record_game(
        &self,
        game_id: &str,
        server: &str,
        payload: &str,
        rows: &[GameResultRow],
    ) -> Result<bool> {
        let mut tx = self.db.begin().await.context("beginning game transaction")?;

        let inserted = sqlx::query(
            "INSERT INTO games (game_id, server, payload)
                  VALUES ($1, $2, $3)
             ON CONFLICT (game_id, server) DO NOTHING",
        )
        .bind(game_id)
        .bind(server)
        .bind(payload)
        .execute(&mut *tx)
        .await
        .context("inserting game")?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        for row in rows {
            sqlx::query(
                "INSERT INTO rank_users (player_id, server, name, rank_score)
                      VALUES ($1, $2, $3, $4 + $5)
                 ON CONFLICT (player_id, server) DO UPDATE
                         SET rank_score = rank_users.rank_score + $5",
            )
            .bind(&row.player_id)
            .bind(server)
            .bind(&row.name)
            .bind(DEFAULT_RANK_SCORE)
            .bind(row.score_delta)
            .execute(&mut *tx)
            .await
            .context("applying rank delta")?;

            sqlx::query(
                "INSERT INTO game_participants (game_id, server, player_id, is_win, score_delta)
                      VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(game_id)
            .bind(server)
            .bind(&row.player_id)
            .bind(row.is_win)
            .bind(row.score_delta)
            .execute(&mut *tx)
            .await
            .context("inserting game participant")?;
        }

        tx.commit().await.context("committing game")?;
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
