//! Game engine boundary
//!
//! The tournament core never validates moves. It asks a [`GameEngine`] to
//! start a match between two players and waits on the returned
//! [`GameHandle`] for the terminal [`GameResult`].

pub mod simulated;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

pub use simulated::SimulatedEngine;

pub type GameId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

/// Clock settings handed to the engine for every match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeControl {
    pub base_minutes: f64,
    pub increment_secs: u32,
}

impl TimeControl {
    pub fn new(base_minutes: f64, increment_secs: u32) -> Self {
        Self {
            base_minutes,
            increment_secs,
        }
    }

    /// Berserk halves the base time and drops the increment
    pub fn berserked(&self) -> Self {
        Self {
            base_minutes: self.base_minutes / 2.0,
            increment_secs: 0,
        }
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        Self::new(1.0, 0)
    }
}

/// Everything the engine needs to create one match
#[derive(Debug, Clone)]
pub struct GameSpec {
    pub id: GameId,
    pub tournament_id: String,
    pub white: String,
    pub black: String,
    pub variant: String,
    pub white_clock: TimeControl,
    pub black_clock: TimeControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    WhiteWins,
    BlackWins,
    Draw,
    Aborted,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::WhiteWins => "white_wins",
            Outcome::BlackWins => "black_wins",
            Outcome::Draw => "draw",
            Outcome::Aborted => "aborted",
        }
    }

    /// Result from the point of view of the player holding `color`
    pub fn for_color(&self, color: Color) -> PlayerOutcome {
        match (self, color) {
            (Outcome::WhiteWins, Color::White) | (Outcome::BlackWins, Color::Black) => {
                PlayerOutcome::Win
            }
            (Outcome::WhiteWins, Color::Black) | (Outcome::BlackWins, Color::White) => {
                PlayerOutcome::Loss
            }
            (Outcome::Draw, _) => PlayerOutcome::Draw,
            (Outcome::Aborted, _) => PlayerOutcome::Aborted,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCause {
    Checkmate,
    Resignation,
    TimeForfeit,
    AgreedDraw,
    /// Terminated by server authority, e.g. when the tournament ends
    ServerAbort,
}

impl EndCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndCause::Checkmate => "checkmate",
            EndCause::Resignation => "resignation",
            EndCause::TimeForfeit => "time_forfeit",
            EndCause::AgreedDraw => "agreed_draw",
            EndCause::ServerAbort => "server_abort",
        }
    }
}

impl fmt::Display for EndCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-player view of a finished game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerOutcome {
    Win,
    Draw,
    Loss,
    /// Full-credit round without an opponent
    Bye,
    Aborted,
}

/// Terminal result reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub outcome: Outcome,
    pub cause: EndCause,
    pub plies: u32,
}

impl GameResult {
    pub fn new(outcome: Outcome, cause: EndCause, plies: u32) -> Self {
        Self {
            outcome,
            cause,
            plies,
        }
    }

    pub fn server_abort(plies: u32) -> Self {
        Self::new(Outcome::Aborted, EndCause::ServerAbort, plies)
    }
}

/// Completion side of a running match
#[derive(Debug)]
pub struct GameHandle {
    pub id: GameId,
    completion: oneshot::Receiver<GameResult>,
}

impl GameHandle {
    pub fn new(id: GameId, completion: oneshot::Receiver<GameResult>) -> Self {
        Self { id, completion }
    }

    /// Wait for the terminal result. An engine that drops the match without
    /// reporting is read as a server abort.
    pub async fn finished(self) -> GameResult {
        match self.completion.await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Game {} dropped by engine without a result", self.id);
                GameResult::server_abort(0)
            }
        }
    }
}

/// The external engine that actually runs matches
pub trait GameEngine: Send + Sync {
    fn start_game(&self, spec: GameSpec) -> Result<GameHandle>;

    /// Terminate a running match by server authority. Returns false when
    /// the game is unknown or already over.
    fn force_abort(&self, game_id: &str) -> bool;
}
