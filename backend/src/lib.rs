//! Tournament Server Library
//!
//! Pairing and lifecycle engine for Arena, Swiss and round-robin
//! tournaments. Matches are delegated to a [`game::GameEngine`]; the
//! transport and persistence layers plug in through the traits in [`ws`]
//! and [`db`].

pub mod config;
pub mod db;
pub mod error;
pub mod game;
pub mod tournament;
pub mod ws;

/// Test helper to create an in-memory database and run migrations
pub async fn create_test_db() -> db::DbPool {
    let pool = db::create_pool(":memory:")
        .await
        .expect("Failed to create in-memory database");

    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}
