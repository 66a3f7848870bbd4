//! Error types shared by the tournament engine.

use thiserror::Error;

/// Errors surfaced by tournament operations
#[derive(Debug, Error)]
pub enum AppError {
    // Registry errors
    #[error("Player {0} already joined this tournament")]
    DuplicateJoin(String),
    #[error("Player {0} is not part of this tournament")]
    UnknownPlayer(String),

    // Configuration errors
    #[error("Invalid tournament configuration: {0}")]
    InvalidConfig(String),

    // Pairing exhaustion; the clock treats this as "nothing to pair"
    #[error("Not enough eligible players to pair")]
    InsufficientPlayers,

    // Ordering violations
    #[error("Result for game {0} was already applied")]
    ResultAlreadyApplied(String),

    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),

    // Collaborators
    #[error("Game engine error: {0}")]
    Engine(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
