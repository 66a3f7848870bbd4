//! Tournament Manager
//!
//! Owns every live tournament of the process:
//! - Creation and lookup
//! - Joining and withdrawing players
//! - Event subscription
//! - Shutdown and cleanup of finished tournaments

use crate::{
    error::{AppError, Result},
    ws::messages::ServerMessage,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{broadcast, RwLock};

use super::{
    context::TournamentContext,
    lifecycle::Tournament,
    model::{TournamentConfig, TournamentStatus, TournamentSystem},
};

/// Lobby listing row
#[derive(Debug, Clone, Serialize)]
pub struct TournamentSummary {
    pub id: String,
    pub name: String,
    pub system: TournamentSystem,
    pub status: TournamentStatus,
    pub nb_players: usize,
    pub current_round: u32,
    pub created_at: DateTime<Utc>,
}

/// Manages all tournaments
pub struct TournamentManager {
    ctx: Arc<TournamentContext>,
    tournaments: RwLock<HashMap<String, Arc<Tournament>>>,
}

impl TournamentManager {
    pub fn new(ctx: Arc<TournamentContext>) -> Self {
        Self {
            ctx,
            tournaments: RwLock::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &Arc<TournamentContext> {
        &self.ctx
    }

    /// Validate, register and start the clock of a new tournament
    pub async fn create(&self, config: TournamentConfig) -> Result<Arc<Tournament>> {
        let tournament = Tournament::spawn(config, self.ctx.clone())?;
        self.tournaments
            .write()
            .await
            .insert(tournament.id().to_string(), tournament.clone());
        Ok(tournament)
    }

    pub async fn get(&self, tournament_id: &str) -> Result<Arc<Tournament>> {
        self.tournaments
            .read()
            .await
            .get(tournament_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Tournament {}", tournament_id)))
    }

    pub async fn join(&self, tournament_id: &str, username: &str) -> Result<()> {
        self.get(tournament_id).await?.join(username).await
    }

    pub async fn withdraw(&self, tournament_id: &str, username: &str) -> Result<()> {
        self.get(tournament_id).await?.withdraw(username).await
    }

    /// Newest first
    pub async fn list(&self) -> Vec<TournamentSummary> {
        let tournaments: Vec<Arc<Tournament>> =
            self.tournaments.read().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(tournaments.len());
        for tournament in tournaments {
            summaries.push(TournamentSummary {
                id: tournament.id().to_string(),
                name: tournament.name().to_string(),
                system: tournament.system(),
                status: tournament.status(),
                nb_players: tournament.nb_players().await,
                current_round: tournament.current_round(),
                created_at: tournament.created_at(),
            });
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// Events of every tournament
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.ctx.broadcasts.subscribe()
    }

    /// Stop every clock. Each one aborts and settles its running games
    /// before returning.
    pub async fn shutdown_all(&self) {
        let tournaments: Vec<Arc<Tournament>> =
            self.tournaments.read().await.values().cloned().collect();
        tracing::info!("Shutting down {} tournaments", tournaments.len());

        for tournament in tournaments {
            tournament.shutdown().await;
        }
    }

    /// Forget finished tournaments and their session bookkeeping. Returns
    /// how many were removed.
    pub async fn cleanup_finished(&self) -> usize {
        let mut tournaments = self.tournaments.write().await;
        let finished: Vec<String> = tournaments
            .iter()
            .filter(|(_, tournament)| tournament.status() == TournamentStatus::Finished)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &finished {
            tournaments.remove(id);
            self.ctx.sessions.clear_tournament(id);
        }

        if !finished.is_empty() {
            tracing::info!("Cleaned up {} finished tournaments", finished.len());
        }
        finished.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ClockSettings, db::MemoryStore, game::SimulatedEngine, ws::sessions::SessionTracker,
    };
    use std::time::Duration;

    fn manager() -> TournamentManager {
        let ctx = TournamentContext::new(
            Arc::new(SimulatedEngine::with_seed(3, Duration::from_millis(10))),
            Arc::new(SessionTracker::new()),
            Arc::new(MemoryStore::new()),
            ClockSettings::default(),
            64,
        );
        TournamentManager::new(Arc::new(ctx))
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_rejects_invalid_config() {
        let manager = manager();
        let result = manager.create(TournamentConfig::swiss("", 3)).await;
        assert!(matches!(result, Err(AppError::InvalidConfig(_))));
        assert!(manager.list().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_tournament_is_not_found() {
        let manager = manager();
        assert!(matches!(
            manager.join("missing", "alice").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_and_list() {
        let manager = manager();
        let tournament = manager
            .create(TournamentConfig::swiss("Weekly Swiss", 3).with_before_start(1.0))
            .await
            .unwrap();

        manager.join(tournament.id(), "alice").await.unwrap();
        manager.join(tournament.id(), "bob").await.unwrap();
        assert!(matches!(
            manager.join(tournament.id(), "bob").await,
            Err(AppError::DuplicateJoin(_))
        ));

        let listing = manager.list().await;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "Weekly Swiss");
        assert_eq!(listing[0].nb_players, 2);
        assert_eq!(listing[0].status, TournamentStatus::Created);

        manager.shutdown_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_then_cleanup() {
        let manager = manager();
        let tournament = manager
            .create(TournamentConfig::arena("Hourly", 5.0).with_before_start(1.0))
            .await
            .unwrap();

        assert_eq!(manager.cleanup_finished().await, 0);
        manager.shutdown_all().await;

        assert_eq!(tournament.status(), TournamentStatus::Finished);
        assert_eq!(manager.cleanup_finished().await, 1);
        assert!(manager.get(tournament.id()).await.is_err());
    }
}
