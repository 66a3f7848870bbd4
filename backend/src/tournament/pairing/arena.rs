use crate::error::{AppError, Result};

use super::{assign_colors, pair_adjacent, pick_bye_index, Pairing, PairingStrategy, RoundPlan};
use crate::tournament::{model::TournamentSystem, registration::PlayerRegistry};

/// Continuous pairing by score proximity
#[derive(Debug, Default)]
pub struct ArenaPairing;

impl ArenaPairing {
    pub fn new() -> Self {
        Self
    }
}

impl PairingStrategy for ArenaPairing {
    fn system(&self) -> TournamentSystem {
        TournamentSystem::Arena
    }

    fn create_pairing(
        &mut self,
        registry: &PlayerRegistry,
        waiting: &[String],
    ) -> Result<RoundPlan> {
        let mut ranked = registry.ranked(waiting);
        if ranked.len() < 2 {
            return Err(AppError::InsufficientPlayers);
        }

        let mut plan = RoundPlan::default();

        // Whoever sat out last time must not sit out again
        if ranked.len() % 2 == 1 {
            let idle = ranked.remove(pick_bye_index(&ranked, |p| p.nb_not_paired == 0));
            tracing::debug!("{} waits for the next arena cycle", idle.username);
            plan.push(Pairing::idle_bye(&idle.username));
        }

        let pairs = pair_adjacent(&ranked, |a, b| {
            a.last_opponent() == Some(b.username.as_str())
        });
        for (i, j) in pairs {
            plan.push(assign_colors(ranked[i], ranked[j]));
        }

        Ok(plan)
    }
}
