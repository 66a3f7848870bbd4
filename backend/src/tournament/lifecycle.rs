//! Tournament lifecycle
//!
//! One [`Tournament`] per competition. Its clock is a single tokio task that
//! waits out the start delay, then pairs rounds through the format's
//! [`PairingStrategy`] until a termination rule fires, and finally aborts
//! whatever is still running before flipping to FINISHED.

use chrono::{DateTime, Utc};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex as StdMutex, PoisonError,
};
use tokio::{
    sync::{watch, RwLock},
    task::JoinHandle,
    time::{interval, sleep_until, Instant, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    ws::messages::{ServerMessage, Standing},
};

use super::{
    context::TournamentContext,
    model::{TournamentConfig, TournamentStatus, TournamentSystem},
    orchestrator::GameOrchestrator,
    pairing::{strategy_for, PairingStrategy},
    player::TournamentPlayer,
    registration::{join_allowed, PlayerRegistry},
};

pub struct Tournament {
    id: String,
    config: TournamentConfig,
    ctx: Arc<TournamentContext>,
    registry: Arc<RwLock<PlayerRegistry>>,
    orchestrator: GameOrchestrator,
    status: watch::Sender<TournamentStatus>,
    shutdown: watch::Sender<bool>,
    current_round: AtomicU32,
    created_at: DateTime<Utc>,
    starts_at: Instant,
    clock: StdMutex<Option<JoinHandle<()>>>,
}

/// What the clock does after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Continue,
    Finish,
}

impl Tournament {
    /// Validate the configuration, register the tournament and start its
    /// clock. The tournament is CREATED until the start delay elapses.
    pub fn spawn(config: TournamentConfig, ctx: Arc<TournamentContext>) -> Result<Arc<Self>> {
        config.validate()?;
        let starts_at = start_and_deadline(&config, Instant::now())?.0;

        let id = Uuid::new_v4().to_string();
        let registry = Arc::new(RwLock::new(PlayerRegistry::new(config.system)));
        let orchestrator = GameOrchestrator::new(&id, &config, registry.clone(), ctx.clone());
        let (status, _) = watch::channel(TournamentStatus::Created);
        let (shutdown, _) = watch::channel(false);

        let tournament = Arc::new(Self {
            id,
            config,
            ctx,
            registry,
            orchestrator,
            status,
            shutdown,
            current_round: AtomicU32::new(0),
            created_at: Utc::now(),
            starts_at,
            clock: StdMutex::new(None),
        });

        tracing::info!(
            "Created {} tournament: {} ({})",
            tournament.config.system,
            tournament.config.name,
            tournament.id
        );

        let handle = tokio::spawn(Arc::clone(&tournament).run_clock());
        *tournament
            .clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Ok(tournament)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &TournamentConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn system(&self) -> TournamentSystem {
        self.config.system
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> TournamentStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<TournamentStatus> {
        self.status.subscribe()
    }

    /// Pairing cycles run so far
    pub fn current_round(&self) -> u32 {
        self.current_round.load(Ordering::SeqCst)
    }

    pub fn running_games(&self) -> usize {
        self.orchestrator.running_count()
    }

    pub async fn join(&self, username: &str) -> Result<()> {
        let nb_players = {
            let mut registry = self.registry.write().await;
            join_allowed(self.status(), self.config.system).map_err(AppError::BadRequest)?;
            registry.join(username)?;
            registry.nb_players()
        };

        tracing::info!("{} joined tournament {}", username, self.id);
        self.ctx
            .broadcasts
            .publish(ServerMessage::TournamentPlayerJoined {
                tournament_id: self.id.clone(),
                username: username.to_string(),
                nb_players,
            });
        Ok(())
    }

    /// Withdraw a player; repeating it is a no-op. A game already running
    /// is played out and still scored.
    pub async fn withdraw(&self, username: &str) -> Result<()> {
        let (changed, nb_players) = {
            let mut registry = self.registry.write().await;
            let changed = registry.withdraw(username)?;
            (changed, registry.nb_players())
        };

        if changed {
            tracing::info!("{} withdrew from tournament {}", username, self.id);
            self.ctx
                .broadcasts
                .publish(ServerMessage::TournamentPlayerWithdrew {
                    tournament_id: self.id.clone(),
                    username: username.to_string(),
                    nb_players,
                });
        }
        Ok(())
    }

    pub async fn pause(&self, username: &str) -> Result<()> {
        self.registry.write().await.pause(username)
    }

    pub async fn resume(&self, username: &str) -> Result<()> {
        self.registry.write().await.resume(username)
    }

    /// Berserk the player's next Arena game; other formats ignore it
    pub async fn berserk(&self, username: &str) -> Result<()> {
        self.registry.write().await.request_berserk(username)
    }

    /// Usernames eligible for the next pairing, in join order
    pub async fn waiting_players(&self) -> Vec<String> {
        let registry = self.registry.read().await;
        registry
            .waiting_players(|username| self.ctx.has_active_session(username, &self.id))
            .map(|player| player.username.clone())
            .collect()
    }

    pub async fn leaderboard(&self) -> Vec<TournamentPlayer> {
        self.registry
            .read()
            .await
            .leaderboard()
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn standings(&self) -> Vec<Standing> {
        self.registry.read().await.standings()
    }

    /// Every player ever joined, withdrawn ones included, in join order
    pub async fn players(&self) -> Vec<TournamentPlayer> {
        self.registry.read().await.players().cloned().collect()
    }

    pub async fn player(&self, username: &str) -> Option<TournamentPlayer> {
        self.registry.read().await.get(username).cloned()
    }

    pub async fn nb_players(&self) -> usize {
        self.registry.read().await.nb_players()
    }

    pub async fn total_players(&self) -> usize {
        self.registry.read().await.total_players()
    }

    pub async fn games_played(&self) -> usize {
        self.registry.read().await.games_played()
    }

    /// Resolves once the tournament is FINISHED
    pub async fn wait_finished(&self) {
        let mut status = self.subscribe_status();
        // The sender lives as long as `self`
        let _ = status
            .wait_for(|status| *status == TournamentStatus::Finished)
            .await;
    }

    /// Stop the clock. Running games are force-aborted and settled before
    /// this returns.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        let handle = self
            .clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Clock of tournament {} failed: {}", self.id, e);
            }
        }

        // A clock that died early must not leave games behind
        if self.status() != TournamentStatus::Finished {
            self.finish().await;
        }
    }

    async fn run_clock(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();

        let cancelled = tokio::select! {
            _ = sleep_until(self.starts_at) => false,
            _ = stop_requested(&mut shutdown) => true,
        };
        if cancelled {
            tracing::info!("Tournament {} cancelled before start", self.id);
            self.finish().await;
            return;
        }

        let mut strategy = strategy_for(self.config.system);
        {
            let registry = self.registry.write().await;
            strategy.prepare(&registry);
            self.set_status(TournamentStatus::Started);
        }

        let deadline = match self.config.duration() {
            Some(duration) => match Instant::now().checked_add(duration) {
                Some(deadline) => Some(deadline),
                None => {
                    tracing::error!("Tournament {} deadline is out of range", self.id);
                    self.finish().await;
                    return;
                }
            },
            None => None,
        };
        let rounds = match (self.config.rounds(), strategy.max_rounds()) {
            (Some(configured), Some(available)) => Some(configured.min(available)),
            (configured, _) => configured,
        };

        let mut ticker = interval(self.ctx.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.orchestrator.reap().await;
            if self.tick(strategy.as_mut(), rounds, deadline).await == Tick::Finish {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.orchestrator.settled() => {}
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {}
                _ = stop_requested(&mut shutdown) => {
                    tracing::info!("Tournament {} clock stopped", self.id);
                    break;
                }
            }
        }

        self.finish().await;
    }

    async fn tick(
        &self,
        strategy: &mut dyn PairingStrategy,
        rounds: Option<u32>,
        deadline: Option<Instant>,
    ) -> Tick {
        let running = self.orchestrator.running_count();
        let waiting = self.waiting_players().await;
        tracing::debug!(
            "Tournament {} tick: {} waiting, {} running",
            self.id,
            waiting.len(),
            running
        );

        if self.config.system.is_round_based() {
            if running > 0 {
                return Tick::Continue;
            }
            if rounds.is_some_and(|rounds| self.current_round() >= rounds) {
                tracing::info!("Tournament {}: all rounds played", self.id);
                return Tick::Finish;
            }
            if waiting.len() < 2 {
                tracing::info!("Tournament {}: not enough players left to pair", self.id);
                return Tick::Finish;
            }
            return match self.pair_round(strategy, &waiting).await {
                Some(_) => Tick::Continue,
                None => Tick::Finish,
            };
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            tracing::info!("Tournament {}: time is up", self.id);
            return Tick::Finish;
        }
        if waiting.is_empty() && running == 0 && self.games_played().await > 0 {
            tracing::info!("Tournament {}: nobody left to pair", self.id);
            return Tick::Finish;
        }
        if waiting.len() >= 2 {
            self.pair_round(strategy, &waiting).await;
        }
        Tick::Continue
    }

    /// Pair and launch one round. `None` when the strategy had nothing to
    /// pair.
    async fn pair_round(
        &self,
        strategy: &mut dyn PairingStrategy,
        waiting: &[String],
    ) -> Option<u32> {
        let plan = {
            let registry = self.registry.read().await;
            match strategy.create_pairing(&registry, waiting) {
                Ok(plan) => plan,
                Err(AppError::InsufficientPlayers) => return None,
                Err(e) => {
                    tracing::error!("Pairing failed in tournament {}: {}", self.id, e);
                    return None;
                }
            }
        };
        if plan.is_empty() {
            return None;
        }

        let round = self.current_round.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            "Tournament {} round {}: {} games, {} byes",
            self.id,
            round,
            plan.games().count(),
            plan.byes().count()
        );

        for pairing in &plan.pairings {
            if let Err(e) = self.orchestrator.launch(round, pairing).await {
                tracing::warn!(
                    "Could not launch {:?} in tournament {}: {}",
                    pairing,
                    self.id,
                    e
                );
            }
        }

        self.ctx
            .broadcasts
            .publish(ServerMessage::TournamentRoundPaired {
                tournament_id: self.id.clone(),
                round,
                pairings: plan.pairings.clone(),
            });
        self.ctx
            .broadcasts
            .publish_leaderboard(&self.id, self.standings().await);
        self.ctx
            .persist_pairing_round(&self.id, round, &plan.pairings)
            .await;

        Some(round)
    }

    /// Abort what is still running, then flip to FINISHED
    async fn finish(&self) {
        let aborted = self
            .orchestrator
            .abort_all(self.ctx.settings.abort_grace)
            .await;
        if aborted > 0 {
            tracing::info!(
                "Tournament {}: {} running games aborted by the server",
                self.id,
                aborted
            );
        }

        let standings = self.standings().await;
        if !self.set_status(TournamentStatus::Finished) {
            return;
        }

        if let Some(winner) = standings.first() {
            tracing::info!(
                "Tournament {} finished, winner {} with {} points",
                self.id,
                winner.username,
                winner.score
            );
        } else {
            tracing::info!("Tournament {} finished without players", self.id);
        }
        self.ctx.broadcasts.publish(ServerMessage::TournamentFinished {
            tournament_id: self.id.clone(),
            tournament_name: self.config.name.clone(),
            standings,
        });
    }

    /// Move forward to `next`; never backwards. Returns whether the status
    /// changed. Intermediate states may be skipped: a clock stopped while
    /// CREATED goes straight to FINISHED and never reports STARTED.
    fn set_status(&self, next: TournamentStatus) -> bool {
        let changed = self.status.send_if_modified(|status| {
            if next > *status {
                *status = next;
                true
            } else {
                false
            }
        });

        if changed {
            tracing::info!("Tournament {} is now {}", self.id, next);
            self.ctx
                .broadcasts
                .publish(ServerMessage::TournamentStatusChanged {
                    tournament_id: self.id.clone(),
                    tournament_name: self.config.name.clone(),
                    status: next,
                });
        }
        changed
    }
}

/// Start instant and, for Arena, the deadline measured from `from`. Fails
/// when either lies beyond what the clock can represent.
fn start_and_deadline(
    config: &TournamentConfig,
    from: Instant,
) -> Result<(Instant, Option<Instant>)> {
    let out_of_range = || {
        AppError::InvalidConfig(format!(
            "tournament {} ends too far in the future",
            config.name
        ))
    };
    let start = from
        .checked_add(config.before_start())
        .ok_or_else(out_of_range)?;
    let deadline = match config.duration() {
        Some(duration) => Some(start.checked_add(duration).ok_or_else(out_of_range)?),
        None => None,
    };
    Ok((start, deadline))
}

/// Resolves once a stop was requested. The watch guard is released before
/// returning.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    // The sender lives as long as the tournament
    let _ = shutdown.wait_for(|stop| *stop).await;
}
