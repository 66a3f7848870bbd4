//! Tournament persistence
//!
//! Stores are a side effect of the tournament core: pairings and results
//! are written best-effort and nothing reads them back to make pairing
//! decisions.

pub mod models;

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqlitePool, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::{path::Path, sync::Mutex};

use crate::{error::Result, tournament::Pairing};
use models::{GameRecord, PairingRecord};

pub type DbPool = Pool<Sqlite>;

pub async fn create_pool(database_url: &str) -> std::result::Result<DbPool, sqlx::Error> {
    // Every connection to `sqlite::memory:` opens a fresh database
    if database_url.contains(":memory:") {
        return SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await;
    }

    // Create the database file if it doesn't exist
    if let Some(db_path) = database_url.strip_prefix("sqlite:") {
        let db_path = db_path.trim_start_matches("//");
        if !Path::new(db_path).exists() {
            if let Some(parent) = Path::new(db_path).parent() {
                std::fs::create_dir_all(parent).ok();
            }
            std::fs::File::create(db_path).ok();
        }
    }

    SqlitePool::connect(database_url).await
}

pub async fn run_migrations(pool: &DbPool) -> std::result::Result<(), sqlx::Error> {
    let migration_sql = include_str!("migrations/001_initial_schema.sql");

    sqlx::raw_sql(migration_sql).execute(pool).await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

#[async_trait]
pub trait TournamentStore: Send + Sync {
    async fn persist_pairing_round(
        &self,
        tournament_id: &str,
        round: u32,
        pairings: &[Pairing],
    ) -> Result<()>;

    async fn persist_result(&self, record: &GameRecord) -> Result<()>;
}

/// sqlite-backed store
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn load_pairings(&self, tournament_id: &str) -> Result<Vec<PairingRecord>> {
        let rows = sqlx::query_as::<_, PairingRecord>(
            "SELECT * FROM tournament_pairings WHERE tournament_id = ? ORDER BY round, position",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn load_results(&self, tournament_id: &str) -> Result<Vec<GameRecord>> {
        let rows = sqlx::query_as::<_, GameRecord>(
            "SELECT * FROM tournament_games WHERE tournament_id = ? ORDER BY round, game_id",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl TournamentStore for SqliteStore {
    async fn persist_pairing_round(
        &self,
        tournament_id: &str,
        round: u32,
        pairings: &[Pairing],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (position, pairing) in pairings.iter().enumerate() {
            let record = PairingRecord::new(tournament_id, round, position, pairing);
            sqlx::query(
                "INSERT INTO tournament_pairings (tournament_id, round, position, kind, white, black, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.tournament_id)
            .bind(record.round)
            .bind(record.position)
            .bind(&record.kind)
            .bind(&record.white)
            .bind(&record.black)
            .bind(&record.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn persist_result(&self, record: &GameRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO tournament_games (game_id, tournament_id, round, white, black, outcome, cause, plies, finished_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.game_id)
        .bind(&record.tournament_id)
        .bind(record.round)
        .bind(&record.white)
        .bind(&record.black)
        .bind(&record.outcome)
        .bind(&record.cause)
        .bind(record.plies)
        .bind(&record.finished_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-process store for tests and database-less runs
#[derive(Default)]
pub struct MemoryStore {
    pairings: Mutex<Vec<PairingRecord>>,
    results: Mutex<Vec<GameRecord>>,
    offline: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn pairings(&self) -> Vec<PairingRecord> {
        self.pairings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn results(&self) -> Vec<GameRecord> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(anyhow::anyhow!("store is offline").into());
        }
        Ok(())
    }
}

#[async_trait]
impl TournamentStore for MemoryStore {
    async fn persist_pairing_round(
        &self,
        tournament_id: &str,
        round: u32,
        pairings: &[Pairing],
    ) -> Result<()> {
        self.check_online()?;
        let mut stored = self.pairings.lock().unwrap_or_else(|e| e.into_inner());
        stored.extend(pairings.iter().enumerate().map(|(position, pairing)| {
            PairingRecord::new(tournament_id, round, position, pairing)
        }));
        Ok(())
    }

    async fn persist_result(&self, record: &GameRecord) -> Result<()> {
        self.check_online()?;
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}
