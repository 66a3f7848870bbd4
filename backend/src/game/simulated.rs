//! Simulated game engine.
//!
//! Plays every match as a scripted random game: the script (length, winner
//! and how the game ends) is drawn from a seeded ChaCha RNG when the match
//! starts, then the match runs for `plies × move_delay` of tokio time unless
//! it is force-aborted first. Used by the demo binary and the tests.

use super::{EndCause, GameEngine, GameHandle, GameId, GameResult, GameSpec, Outcome};
use crate::error::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::sync::oneshot;

const MIN_PLIES: u32 = 20;
const MAX_PLIES: u32 = 80;
/// Games running past this length end in an agreed draw
const DRAW_AFTER_PLIES: u32 = 60;

type AbortSenders = Arc<Mutex<HashMap<GameId, oneshot::Sender<()>>>>;

pub struct SimulatedEngine {
    rng: Mutex<ChaCha20Rng>,
    move_delay: Duration,
    running: AbortSenders,
}

impl SimulatedEngine {
    pub fn new(move_delay: Duration) -> Self {
        Self::with_rng(ChaCha20Rng::from_entropy(), move_delay)
    }

    pub fn with_seed(seed: u64, move_delay: Duration) -> Self {
        Self::with_rng(ChaCha20Rng::seed_from_u64(seed), move_delay)
    }

    fn with_rng(rng: ChaCha20Rng, move_delay: Duration) -> Self {
        Self {
            rng: Mutex::new(rng),
            move_delay,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of matches that have not reached a terminal state
    pub fn running_games(&self) -> usize {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn script(&self, spec: &GameSpec) -> GameResult {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let plies = rng.gen_range(MIN_PLIES..=MAX_PLIES);

        if plies > DRAW_AFTER_PLIES {
            return GameResult::new(Outcome::Draw, EndCause::AgreedDraw, plies);
        }

        let outcome = if rng.gen_bool(0.5) {
            Outcome::WhiteWins
        } else {
            Outcome::BlackWins
        };
        let loser_berserked = match outcome {
            Outcome::WhiteWins => spec.black_clock.base_minutes < spec.white_clock.base_minutes,
            _ => spec.white_clock.base_minutes < spec.black_clock.base_minutes,
        };

        let cause = if loser_berserked && rng.gen_bool(0.5) {
            EndCause::TimeForfeit
        } else if rng.gen_bool(0.3) {
            EndCause::Checkmate
        } else {
            EndCause::Resignation
        };

        GameResult::new(outcome, cause, plies)
    }
}

impl GameEngine for SimulatedEngine {
    fn start_game(&self, spec: GameSpec) -> Result<GameHandle> {
        let script = self.script(&spec);
        let (abort_tx, abort_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(spec.id.clone(), abort_tx);

        let running = Arc::clone(&self.running);
        let game_id = spec.id.clone();
        let duration = self.move_delay * script.plies;
        let move_delay = self.move_delay;
        tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let result = tokio::select! {
                _ = tokio::time::sleep(duration) => script,
                _ = abort_rx => {
                    let played = started.elapsed().as_millis() / move_delay.as_millis().max(1);
                    GameResult::server_abort(played as u32)
                }
            };
            running
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&game_id);
            tracing::debug!(
                "Simulated game {} ended: {} by {} after {} plies",
                game_id,
                result.outcome,
                result.cause,
                result.plies
            );
            let _ = done_tx.send(result);
        });

        Ok(GameHandle::new(spec.id, done_rx))
    }

    fn force_abort(&self, game_id: &str) -> bool {
        let sender = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(game_id);
        match sender {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::TimeControl;

    fn spec(id: &str) -> GameSpec {
        GameSpec {
            id: id.to_string(),
            tournament_id: "t1".to_string(),
            white: "alice".to_string(),
            black: "bob".to_string(),
            variant: "chess".to_string(),
            white_clock: TimeControl::default(),
            black_clock: TimeControl::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn game_runs_to_scripted_result() {
        let engine = SimulatedEngine::with_seed(3, Duration::from_millis(50));
        let handle = engine.start_game(spec("g1")).expect("start");
        assert_eq!(engine.running_games(), 1);

        let result = handle.finished().await;
        assert!(result.plies >= MIN_PLIES && result.plies <= MAX_PLIES);
        assert_ne!(result.cause, EndCause::ServerAbort);
        assert_eq!(engine.running_games(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn force_abort_ends_game_with_server_cause() {
        let engine = SimulatedEngine::with_seed(3, Duration::from_secs(1));
        let handle = engine.start_game(spec("g1")).expect("start");

        assert!(engine.force_abort("g1"));
        assert!(!engine.force_abort("g1"));

        let result = handle.finished().await;
        assert_eq!(result.outcome, Outcome::Aborted);
        assert_eq!(result.cause, EndCause::ServerAbort);
    }

    #[test]
    fn same_seed_same_script() {
        let a = SimulatedEngine::with_seed(11, Duration::from_millis(10));
        let b = SimulatedEngine::with_seed(11, Duration::from_millis(10));
        for i in 0..10 {
            let id = format!("g{}", i);
            assert_eq!(a.script(&spec(&id)), b.script(&spec(&id)));
        }
    }
}
