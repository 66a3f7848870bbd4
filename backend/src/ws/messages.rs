use crate::game::{EndCause, Outcome};
use crate::tournament::{Pairing, TournamentStatus};
use serde::{Deserialize, Serialize};

/// Events the tournament core emits for the transport layer to relay to
/// lobby and spectator connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    TournamentStatusChanged {
        tournament_id: String,
        tournament_name: String,
        status: TournamentStatus,
    },
    TournamentPlayerJoined {
        tournament_id: String,
        username: String,
        nb_players: usize,
    },
    TournamentPlayerWithdrew {
        tournament_id: String,
        username: String,
        nb_players: usize,
    },
    TournamentRoundPaired {
        tournament_id: String,
        round: u32,
        pairings: Vec<Pairing>,
    },
    TournamentGameFinished {
        tournament_id: String,
        game_id: String,
        white: String,
        black: String,
        outcome: Outcome,
        cause: EndCause,
    },
    TournamentLeaderboard {
        tournament_id: String,
        server_time: String,
        standings: Vec<Standing>,
    },
    TournamentFinished {
        tournament_id: String,
        tournament_name: String,
        standings: Vec<Standing>,
    },
}

impl ServerMessage {
    pub fn tournament_id(&self) -> &str {
        match self {
            ServerMessage::TournamentStatusChanged { tournament_id, .. }
            | ServerMessage::TournamentPlayerJoined { tournament_id, .. }
            | ServerMessage::TournamentPlayerWithdrew { tournament_id, .. }
            | ServerMessage::TournamentRoundPaired { tournament_id, .. }
            | ServerMessage::TournamentGameFinished { tournament_id, .. }
            | ServerMessage::TournamentLeaderboard { tournament_id, .. }
            | ServerMessage::TournamentFinished { tournament_id, .. } => tournament_id,
        }
    }
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub position: usize,
    pub username: String,
    pub score: u32,
    pub games: usize,
}
