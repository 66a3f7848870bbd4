use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::tournament::{
    registration::{Settlement, SettlementKind},
    Pairing,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PairingRecord {
    pub tournament_id: String,
    pub round: i64,
    pub position: i64,
    pub kind: String, // "game" or "bye"
    pub white: String,
    pub black: Option<String>,
    pub created_at: String,
}

impl PairingRecord {
    pub fn new(tournament_id: &str, round: u32, position: usize, pairing: &Pairing) -> Self {
        let (kind, white, black) = match pairing {
            Pairing::Game { white, black } => ("game", white.clone(), Some(black.clone())),
            Pairing::Bye { player, .. } => ("bye", player.clone(), None),
        };

        Self {
            tournament_id: tournament_id.to_string(),
            round: i64::from(round),
            position: i64::try_from(position).unwrap_or(i64::MAX),
            kind: kind.to_string(),
            white,
            black,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GameRecord {
    pub game_id: String,
    pub tournament_id: String,
    pub round: i64,
    pub white: String,
    /// `None` for a bye
    pub black: Option<String>,
    pub outcome: String,
    pub cause: Option<String>,
    pub plies: i64,
    pub finished_at: String,
}

impl GameRecord {
    pub fn from_settlement(tournament_id: &str, settlement: &Settlement) -> Self {
        let (white, black, outcome, cause, plies) = match &settlement.kind {
            SettlementKind::Played {
                white,
                black,
                result,
            } => (
                white.username.clone(),
                Some(black.username.clone()),
                result.outcome.as_str().to_string(),
                Some(result.cause.as_str().to_string()),
                i64::from(result.plies),
            ),
            SettlementKind::Bye { player } => (player.clone(), None, "bye".to_string(), None, 0),
        };

        Self {
            game_id: settlement.game_id.clone(),
            tournament_id: tournament_id.to_string(),
            round: i64::from(settlement.round),
            white,
            black,
            outcome,
            cause,
            plies,
            finished_at: Utc::now().to_rfc3339(),
        }
    }
}
