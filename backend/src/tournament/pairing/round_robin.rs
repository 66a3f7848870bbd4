use crate::error::{AppError, Result};

use super::{assign_colors, Pairing, PairingStrategy, RoundPlan};
use crate::tournament::{model::TournamentSystem, registration::PlayerRegistry};

/// One fixture slot; `None` is the rotating bye
type Slot = Option<String>;

/// Replays a fixture built once with the circle method
#[derive(Debug, Default)]
pub struct RoundRobinPairing {
    fixture: Option<Vec<Vec<(Slot, Slot)>>>,
    next_round: usize,
}

impl RoundRobinPairing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixture_rounds(&self) -> Option<usize> {
        self.fixture.as_ref().map(Vec::len)
    }
}

/// Every unique pair exactly once. With an odd count a `None` slot is
/// added, and whoever meets it sits out that round.
pub fn circle_fixture(players: &[String]) -> Vec<Vec<(Slot, Slot)>> {
    if players.len() < 2 {
        return Vec::new();
    }
    let mut slots: Vec<Slot> = players.iter().cloned().map(Some).collect();
    if slots.len() % 2 == 1 {
        slots.push(None);
    }

    let n = slots.len();
    let mut rounds = Vec::with_capacity(n - 1);
    for _ in 0..n - 1 {
        let round = (0..n / 2)
            .map(|k| (slots[k].clone(), slots[n - 1 - k].clone()))
            .collect();
        rounds.push(round);
        // First slot stays put, the rest rotate one position
        slots[1..].rotate_right(1);
    }
    rounds
}

impl PairingStrategy for RoundRobinPairing {
    fn system(&self) -> TournamentSystem {
        TournamentSystem::RoundRobin
    }

    fn prepare(&mut self, registry: &PlayerRegistry) {
        let players: Vec<String> = registry
            .players()
            .filter(|p| !p.withdrawn)
            .map(|p| p.username.clone())
            .collect();
        let fixture = circle_fixture(&players);
        tracing::info!(
            "Round-robin fixture: {} players over {} rounds",
            players.len(),
            fixture.len()
        );
        self.fixture = Some(fixture);
        self.next_round = 0;
    }

    fn max_rounds(&self) -> Option<u32> {
        self.fixture_rounds()
            .map(|rounds| u32::try_from(rounds).unwrap_or(u32::MAX))
    }

    fn create_pairing(
        &mut self,
        registry: &PlayerRegistry,
        waiting: &[String],
    ) -> Result<RoundPlan> {
        if waiting.len() < 2 {
            return Err(AppError::InsufficientPlayers);
        }
        let Some(round) = self
            .fixture
            .as_ref()
            .and_then(|fixture| fixture.get(self.next_round))
        else {
            return Err(AppError::InsufficientPlayers);
        };

        let present = |slot: &Slot| -> Option<String> {
            slot.as_ref()
                .filter(|name| waiting.contains(name))
                .cloned()
        };

        let mut plan = RoundPlan::default();
        for (a, b) in round {
            match (present(a), present(b)) {
                (Some(a), Some(b)) => {
                    let ranked = registry.ranked(&[a, b]);
                    if let [higher, lower] = ranked.as_slice() {
                        plan.push(assign_colors(higher, lower));
                    }
                }
                (Some(player), None) | (None, Some(player)) => {
                    plan.push(Pairing::full_bye(player));
                }
                (None, None) => {}
            }
        }

        tracing::debug!(
            "Round-robin round {} replayed with {} pairings",
            self.next_round + 1,
            plan.pairings.len()
        );
        self.next_round += 1;
        Ok(plan)
    }
}
