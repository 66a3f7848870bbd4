use std::sync::Arc;
use tokio::time::timeout;

use crate::{
    config::ClockSettings,
    db::{models::GameRecord, TournamentStore},
    game::GameEngine,
    ws::sessions::SessionDirectory,
};

use super::{broadcasts::BroadcastService, pairing::Pairing, registration::Settlement};

/// Collaborators shared by every tournament of the process
pub struct TournamentContext {
    pub engine: Arc<dyn GameEngine>,
    pub sessions: Arc<dyn SessionDirectory>,
    pub store: Arc<dyn TournamentStore>,
    pub broadcasts: BroadcastService,
    pub settings: ClockSettings,
}

impl TournamentContext {
    pub fn new(
        engine: Arc<dyn GameEngine>,
        sessions: Arc<dyn SessionDirectory>,
        store: Arc<dyn TournamentStore>,
        settings: ClockSettings,
        event_capacity: usize,
    ) -> Self {
        Self {
            engine,
            sessions,
            store,
            broadcasts: BroadcastService::new(event_capacity),
            settings,
        }
    }

    pub(crate) fn has_active_session(&self, username: &str, tournament_id: &str) -> bool {
        self.sessions.has_active_session(username, tournament_id)
    }

    /// Best-effort: failures and timeouts are logged, never returned
    pub(crate) async fn persist_pairing_round(
        &self,
        tournament_id: &str,
        round: u32,
        pairings: &[Pairing],
    ) {
        let call = self.store.persist_pairing_round(tournament_id, round, pairings);
        match timeout(self.settings.persist_timeout, call).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(
                "Failed to persist round {} of tournament {}: {}",
                round,
                tournament_id,
                e
            ),
            Err(_) => tracing::warn!(
                "Persisting round {} of tournament {} timed out",
                round,
                tournament_id
            ),
        }
    }

    /// Best-effort: failures and timeouts are logged, never returned
    pub(crate) async fn persist_result(&self, tournament_id: &str, settlement: &Settlement) {
        let record = GameRecord::from_settlement(tournament_id, settlement);
        match timeout(self.settings.persist_timeout, self.store.persist_result(&record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(
                "Failed to persist game {} of tournament {}: {}",
                record.game_id,
                tournament_id,
                e
            ),
            Err(_) => tracing::warn!(
                "Persisting game {} of tournament {} timed out",
                record.game_id,
                tournament_id
            ),
        }
    }
}
