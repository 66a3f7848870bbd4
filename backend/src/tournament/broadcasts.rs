use chrono::Utc;
use tokio::sync::broadcast;

use crate::ws::messages::{ServerMessage, Standing};

/// Fan-out of tournament events to whoever relays them (lobby sockets,
/// spectators, tests)
pub struct BroadcastService {
    sender: broadcast::Sender<ServerMessage>,
}

impl BroadcastService {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.sender.subscribe()
    }

    /// Returns how many receivers got the event. Nobody listening is fine.
    pub fn publish(&self, message: ServerMessage) -> usize {
        match self.sender.send(message) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(message)) => {
                tracing::debug!(
                    "No subscribers for event of tournament {}",
                    message.tournament_id()
                );
                0
            }
        }
    }

    /// Leaderboard snapshot stamped with the current server time
    pub fn publish_leaderboard(&self, tournament_id: &str, standings: Vec<Standing>) -> usize {
        self.publish(ServerMessage::TournamentLeaderboard {
            tournament_id: tournament_id.to_string(),
            server_time: Utc::now().to_rfc3339(),
            standings,
        })
    }
}
