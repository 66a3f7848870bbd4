//! Game orchestrator
//!
//! Turns pairings into running matches and folds every terminal result back
//! into the registry. Real games and byes converge on [`Shared::settle`], the
//! only place a result is applied.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, PoisonError},
    time::Duration,
};
use tokio::{
    sync::{oneshot, Mutex, Notify, RwLock},
    task::{JoinError, JoinSet},
    time::timeout,
};
use uuid::Uuid;

use crate::{
    error::Result,
    game::{GameId, GameResult, GameSpec, TimeControl},
    ws::messages::ServerMessage,
};

use super::{
    context::TournamentContext,
    model::{TournamentConfig, TournamentSystem},
    pairing::{ByeCredit, Pairing},
    registration::{PlayerRegistry, Seat, Settlement, SettlementKind},
};

/// A launched pairing unit, resolved once its result has been applied
#[derive(Debug)]
pub struct GameTicket {
    pub game_id: GameId,
    done: oneshot::Receiver<Settlement>,
}

impl GameTicket {
    /// `None` if the result was refused by the registry
    pub async fn await_completion(self) -> Option<Settlement> {
        self.done.await.ok()
    }
}

struct RunningGame {
    round: u32,
    /// `None` for a bye, which is settled as soon as it is registered
    seats: Option<(Seat, Seat)>,
    done: oneshot::Sender<Settlement>,
}

struct Shared {
    tournament_id: String,
    registry: Arc<RwLock<PlayerRegistry>>,
    ctx: Arc<TournamentContext>,
    running: StdMutex<HashMap<GameId, RunningGame>>,
    settled: Notify,
}

impl Shared {
    fn running(&self) -> std::sync::MutexGuard<'_, HashMap<GameId, RunningGame>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a terminal result exactly once, then release the game from
    /// supervision and wake the clock
    async fn settle(&self, settlement: Settlement) -> bool {
        let applied = self.registry.write().await.apply(&settlement);
        let entry = self.running().remove(&settlement.game_id);
        self.settled.notify_one();

        if let Err(e) = applied {
            tracing::error!(
                "Refused result of game {} in tournament {}: {}",
                settlement.game_id,
                self.tournament_id,
                e
            );
            return false;
        }

        if let SettlementKind::Played {
            white,
            black,
            result,
        } = &settlement.kind
        {
            tracing::debug!(
                "Game {} finished: {} - {} {} by {}",
                settlement.game_id,
                white.username,
                black.username,
                result.outcome,
                result.cause
            );
            self.ctx
                .broadcasts
                .publish(ServerMessage::TournamentGameFinished {
                    tournament_id: self.tournament_id.clone(),
                    game_id: settlement.game_id.clone(),
                    white: white.username.clone(),
                    black: black.username.clone(),
                    outcome: result.outcome,
                    cause: result.cause,
                });
        }

        self.ctx
            .persist_result(&self.tournament_id, &settlement)
            .await;

        if let Some(entry) = entry {
            let _ = entry.done.send(settlement);
        }
        true
    }
}

pub struct GameOrchestrator {
    shared: Arc<Shared>,
    system: TournamentSystem,
    variant: String,
    time_control: TimeControl,
    tasks: Mutex<JoinSet<()>>,
}

impl GameOrchestrator {
    pub fn new(
        tournament_id: &str,
        config: &TournamentConfig,
        registry: Arc<RwLock<PlayerRegistry>>,
        ctx: Arc<TournamentContext>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                tournament_id: tournament_id.to_string(),
                registry,
                ctx,
                running: StdMutex::new(HashMap::new()),
                settled: Notify::new(),
            }),
            system: config.system,
            variant: config.variant.clone(),
            time_control: config.time_control,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Start one pairing unit. Games run as their own task; full-credit byes
    /// are settled before this returns; idle byes only bump the player's
    /// unpaired streak and yield no ticket.
    pub async fn launch(&self, round: u32, pairing: &Pairing) -> Result<Option<GameTicket>> {
        match pairing {
            Pairing::Game { white, black } => {
                let ticket = self.launch_game(round, white, black).await?;
                Ok(Some(ticket))
            }
            Pairing::Bye {
                player,
                credit: ByeCredit::Full,
            } => {
                let game_id = format!("bye-{}", Uuid::new_v4());
                let ticket = self.register(game_id.clone(), round, None);
                self.shared
                    .settle(Settlement {
                        game_id,
                        round,
                        kind: SettlementKind::Bye {
                            player: player.clone(),
                        },
                    })
                    .await;
                Ok(Some(ticket))
            }
            Pairing::Bye {
                player,
                credit: ByeCredit::Idle,
            } => {
                self.shared.registry.write().await.mark_unpaired(player)?;
                Ok(None)
            }
        }
    }

    async fn launch_game(&self, round: u32, white: &str, black: &str) -> Result<GameTicket> {
        let game_id = Uuid::new_v4().to_string();

        let (white_seat, black_seat) = {
            let mut registry = self.shared.registry.write().await;
            registry.mark_playing(&[white, black])?;
            let berserk_allowed = self.system == TournamentSystem::Arena;
            (
                Seat::new(white, berserk_allowed && registry.take_berserk(white)),
                Seat::new(black, berserk_allowed && registry.take_berserk(black)),
            )
        };

        let clock_for = |seat: &Seat| {
            if seat.berserk {
                self.time_control.berserked()
            } else {
                self.time_control
            }
        };
        let spec = GameSpec {
            id: game_id.clone(),
            tournament_id: self.shared.tournament_id.clone(),
            white: white.to_string(),
            black: black.to_string(),
            variant: self.variant.clone(),
            white_clock: clock_for(&white_seat),
            black_clock: clock_for(&black_seat),
        };

        let handle = match self.shared.ctx.engine.start_game(spec) {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.registry.write().await.release(&[white, black]);
                return Err(e);
            }
        };

        let ticket = self.register(
            game_id.clone(),
            round,
            Some((white_seat.clone(), black_seat.clone())),
        );

        let shared = self.shared.clone();
        self.tasks.lock().await.spawn(async move {
            let result = handle.finished().await;
            shared
                .settle(Settlement {
                    game_id,
                    round,
                    kind: SettlementKind::Played {
                        white: white_seat,
                        black: black_seat,
                        result,
                    },
                })
                .await;
        });

        Ok(ticket)
    }

    fn register(&self, game_id: GameId, round: u32, seats: Option<(Seat, Seat)>) -> GameTicket {
        let (done_tx, done_rx) = oneshot::channel();
        self.shared.running().insert(
            game_id.clone(),
            RunningGame {
                round,
                seats,
                done: done_tx,
            },
        );
        GameTicket {
            game_id,
            done: done_rx,
        }
    }

    pub fn running_count(&self) -> usize {
        self.shared.running().len()
    }

    pub fn running_games(&self) -> Vec<GameId> {
        self.shared.running().keys().cloned().collect()
    }

    /// Resolves after the next settlement; a settlement that happened while
    /// nobody waited is remembered
    pub async fn settled(&self) {
        self.shared.settled.notified().await;
    }

    /// Collect finished match tasks
    pub async fn reap(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(joined) = tasks.try_join_next() {
            log_join(&self.shared.tournament_id, joined);
        }
    }

    /// Force-abort every running game and wait for the aborts to settle.
    /// Match tasks still alive after `grace` are cancelled and their games
    /// settled as server aborts. Returns the number of games aborted.
    pub async fn abort_all(&self, grace: Duration) -> usize {
        let game_ids = self.running_games();
        for game_id in &game_ids {
            if !self.shared.ctx.engine.force_abort(game_id) {
                tracing::debug!("Game {} already gone from the engine", game_id);
            }
        }

        let mut tasks = self.tasks.lock().await;
        let drained = timeout(grace, async {
            while let Some(joined) = tasks.join_next().await {
                log_join(&self.shared.tournament_id, joined);
            }
        })
        .await
        .is_ok();

        if !drained {
            tracing::warn!(
                "{} match tasks of tournament {} outlived the abort grace period, cancelling",
                tasks.len(),
                self.shared.tournament_id
            );
            tasks.abort_all();
            while let Some(joined) = tasks.join_next().await {
                log_join(&self.shared.tournament_id, joined);
            }
        }
        drop(tasks);

        let leftovers: Vec<(GameId, u32, Seat, Seat)> = self
            .shared
            .running()
            .iter()
            .filter_map(|(game_id, game)| {
                game.seats
                    .clone()
                    .map(|(white, black)| (game_id.clone(), game.round, white, black))
            })
            .collect();

        for (game_id, round, white, black) in leftovers {
            tracing::warn!("Settling cancelled game {} as a server abort", game_id);
            self.shared
                .settle(Settlement {
                    game_id,
                    round,
                    kind: SettlementKind::Played {
                        white,
                        black,
                        result: GameResult::server_abort(0),
                    },
                })
                .await;
        }

        game_ids.len()
    }
}

fn log_join(tournament_id: &str, joined: std::result::Result<(), JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_panic() => {
            tracing::error!("Match task of tournament {} panicked: {}", tournament_id, e)
        }
        Err(_) => tracing::debug!("Match task of tournament {} cancelled", tournament_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ClockSettings,
        db::MemoryStore,
        error::AppError,
        game::{EndCause, GameEngine, GameHandle, Outcome, SimulatedEngine},
        ws::sessions::SessionTracker,
    };

    /// Engine whose games never end and ignore aborts
    struct StuckEngine {
        senders: StdMutex<Vec<oneshot::Sender<GameResult>>>,
    }

    impl GameEngine for StuckEngine {
        fn start_game(&self, spec: GameSpec) -> Result<GameHandle> {
            let (tx, rx) = oneshot::channel();
            self.senders.lock().unwrap().push(tx);
            Ok(GameHandle::new(spec.id, rx))
        }

        fn force_abort(&self, _game_id: &str) -> bool {
            false
        }
    }

    struct RefusingEngine;

    impl GameEngine for RefusingEngine {
        fn start_game(&self, _spec: GameSpec) -> Result<GameHandle> {
            Err(AppError::Engine("no capacity".to_string()))
        }

        fn force_abort(&self, _game_id: &str) -> bool {
            false
        }
    }

    struct Fixture {
        orchestrator: GameOrchestrator,
        registry: Arc<RwLock<PlayerRegistry>>,
        store: Arc<MemoryStore>,
    }

    async fn fixture(engine: Arc<dyn GameEngine>, system: TournamentSystem) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ctx = Arc::new(TournamentContext::new(
            engine,
            Arc::new(SessionTracker::new()),
            store.clone(),
            ClockSettings::default(),
            64,
        ));
        let mut registry = PlayerRegistry::new(system);
        for name in ["alice", "bob", "carol"] {
            registry.join(name).unwrap();
        }
        let registry = Arc::new(RwLock::new(registry));
        let config = match system {
            TournamentSystem::Arena => TournamentConfig::arena("test", 30.0),
            TournamentSystem::Swiss => TournamentConfig::swiss("test", 3),
            TournamentSystem::RoundRobin => TournamentConfig::round_robin("test", 3),
        };
        Fixture {
            orchestrator: GameOrchestrator::new("t1", &config, registry.clone(), ctx),
            registry,
            store,
        }
    }

    fn simulated() -> Arc<dyn GameEngine> {
        Arc::new(SimulatedEngine::with_seed(7, Duration::from_millis(10)))
    }

    #[tokio::test(start_paused = true)]
    async fn game_result_is_applied_to_both_players() {
        let f = fixture(simulated(), TournamentSystem::Swiss).await;

        let ticket = f
            .orchestrator
            .launch(1, &Pairing::game("alice", "bob"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(f.orchestrator.running_count(), 1);
        assert!(!f.registry.read().await.get("alice").unwrap().free);

        let settlement = ticket.await_completion().await.unwrap();
        assert!(matches!(settlement.kind, SettlementKind::Played { .. }));
        assert_eq!(f.orchestrator.running_count(), 0);

        let registry = f.registry.read().await;
        let alice = registry.get("alice").unwrap();
        let bob = registry.get("bob").unwrap();
        assert_eq!(alice.games.len(), 1);
        assert_eq!(bob.games.len(), 1);
        assert!(alice.free && bob.free);
        assert!(registry.is_settled(&settlement.game_id));
        drop(registry);

        f.orchestrator.reap().await;
        assert_eq!(f.store.results().len(), 1);
    }

    #[tokio::test]
    async fn full_bye_settles_immediately_through_the_same_path() {
        let f = fixture(simulated(), TournamentSystem::Swiss).await;

        let ticket = f
            .orchestrator
            .launch(1, &Pairing::full_bye("carol"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(f.orchestrator.running_count(), 0);

        let settlement = ticket.await_completion().await.unwrap();
        assert!(matches!(settlement.kind, SettlementKind::Bye { .. }));
        let registry = f.registry.read().await;
        assert_eq!(registry.get("carol").unwrap().score, 2);
        assert_eq!(f.store.results()[0].outcome, "bye");
    }

    #[tokio::test]
    async fn idle_bye_only_counts_the_wait() {
        let f = fixture(simulated(), TournamentSystem::Arena).await;

        let ticket = f
            .orchestrator
            .launch(1, &Pairing::idle_bye("carol"))
            .await
            .unwrap();
        assert!(ticket.is_none());

        let registry = f.registry.read().await;
        let carol = registry.get("carol").unwrap();
        assert_eq!(carol.nb_not_paired, 1);
        assert!(carol.games.is_empty());
        assert_eq!(carol.score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_all_records_server_aborts() {
        let f = fixture(simulated(), TournamentSystem::Arena).await;
        f.orchestrator
            .launch(1, &Pairing::game("alice", "bob"))
            .await
            .unwrap();

        assert_eq!(f.orchestrator.abort_all(Duration::from_secs(1)).await, 1);
        assert_eq!(f.orchestrator.running_count(), 0);

        let registry = f.registry.read().await;
        let game = &registry.get("alice").unwrap().games[0];
        assert_eq!(game.cause, Some(EndCause::ServerAbort));
        assert_eq!(game.points, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_games_are_cancelled_after_grace() {
        let engine = Arc::new(StuckEngine {
            senders: StdMutex::new(Vec::new()),
        });
        let f = fixture(engine.clone(), TournamentSystem::Swiss).await;
        let ticket = f
            .orchestrator
            .launch(1, &Pairing::game("alice", "bob"))
            .await
            .unwrap()
            .unwrap();

        f.orchestrator.abort_all(Duration::from_millis(500)).await;

        let settlement = ticket.await_completion().await.unwrap();
        match settlement.kind {
            SettlementKind::Played { result, .. } => {
                assert_eq!(result.outcome, Outcome::Aborted);
                assert_eq!(result.cause, EndCause::ServerAbort);
            }
            other => panic!("unexpected settlement {:?}", other),
        }
        assert_eq!(f.registry.read().await.games_played(), 1);
        drop(engine);
    }

    #[tokio::test]
    async fn refused_start_releases_players() {
        let f = fixture(Arc::new(RefusingEngine), TournamentSystem::Swiss).await;

        let err = f
            .orchestrator
            .launch(1, &Pairing::game("alice", "bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Engine(_)));
        assert_eq!(f.orchestrator.running_count(), 0);
        assert!(f.registry.read().await.get("alice").unwrap().free);
    }

    #[tokio::test(start_paused = true)]
    async fn berserk_is_consumed_only_in_arena() {
        let f = fixture(simulated(), TournamentSystem::Arena).await;
        f.registry.write().await.request_berserk("alice").unwrap();

        let ticket = f
            .orchestrator
            .launch(1, &Pairing::game("alice", "bob"))
            .await
            .unwrap()
            .unwrap();
        let settlement = ticket.await_completion().await.unwrap();
        match settlement.kind {
            SettlementKind::Played { white, black, .. } => {
                assert!(white.berserk);
                assert!(!black.berserk);
            }
            other => panic!("unexpected settlement {:?}", other),
        }
        assert!(!f.registry.read().await.get("alice").unwrap().berserk_requested);
    }

    #[tokio::test(start_paused = true)]
    async fn berserk_stays_pending_outside_arena() {
        let f = fixture(simulated(), TournamentSystem::Swiss).await;
        f.registry.write().await.request_berserk("alice").unwrap();

        let ticket = f
            .orchestrator
            .launch(1, &Pairing::game("alice", "bob"))
            .await
            .unwrap()
            .unwrap();
        let settlement = ticket.await_completion().await.unwrap();
        match settlement.kind {
            SettlementKind::Played { white, black, .. } => {
                assert!(!white.berserk);
                assert!(!black.berserk);
            }
            other => panic!("unexpected settlement {:?}", other),
        }
        assert!(f.registry.read().await.get("alice").unwrap().berserk_requested);
    }
}
