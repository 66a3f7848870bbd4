use crate::error::{AppError, Result};

use super::{assign_colors, pair_adjacent, pick_bye_index, Pairing, PairingStrategy, RoundPlan};
use crate::tournament::{
    model::TournamentSystem, player::TournamentPlayer, registration::PlayerRegistry,
};

/// Opponent choices the rematch-free search may try before giving up
const SEARCH_BUDGET: usize = 20_000;

/// Round-based pairing of close scores without rematches
#[derive(Debug)]
pub struct SwissPairing {
    budget: usize,
}

impl SwissPairing {
    pub fn new() -> Self {
        Self::with_budget(SEARCH_BUDGET)
    }

    pub fn with_budget(budget: usize) -> Self {
        Self { budget }
    }
}

impl Default for SwissPairing {
    fn default() -> Self {
        Self::new()
    }
}

impl PairingStrategy for SwissPairing {
    fn system(&self) -> TournamentSystem {
        TournamentSystem::Swiss
    }

    fn create_pairing(
        &mut self,
        registry: &PlayerRegistry,
        waiting: &[String],
    ) -> Result<RoundPlan> {
        let ranked = registry.ranked(waiting);
        if ranked.len() < 2 {
            return Err(AppError::InsufficientPlayers);
        }

        let mut plan = RoundPlan::default();
        let mut budget = self.budget;
        let (players, pairs) = if ranked.len() % 2 == 1 {
            let (bye, players, pairs) = choose_bye(&ranked, &mut budget);
            plan.push(Pairing::full_bye(&bye.username));
            (players, pairs)
        } else {
            let pairs = rematch_free(&ranked, &mut budget);
            (ranked, pairs)
        };

        let pairs = match pairs {
            Some(pairs) => pairs,
            None => {
                tracing::warn!(
                    "No rematch-free swiss pairing for {} players within budget, falling back to greedy",
                    players.len()
                );
                pair_adjacent(&players, |a, b| a.has_played(&b.username))
            }
        };
        tracing::debug!(
            "Swiss pairing used {} of {} search steps",
            self.budget - budget,
            self.budget
        );

        for (i, j) in pairs {
            plan.push(assign_colors(players[i], players[j]));
        }
        Ok(plan)
    }
}

/// Pick the bye of an odd pool. Candidates without a previous bye are tried
/// from the bottom of the standings up; the first one whose absence leaves a
/// rematch-free matching sits out. When none does, the lowest-ranked
/// candidate sits out and no matching is returned.
fn choose_bye<'a>(
    ranked: &[&'a TournamentPlayer],
    budget: &mut usize,
) -> (
    &'a TournamentPlayer,
    Vec<&'a TournamentPlayer>,
    Option<Vec<(usize, usize)>>,
) {
    let mut candidates: Vec<usize> = (0..ranked.len())
        .rev()
        .filter(|&idx| !ranked[idx].had_bye)
        .collect();
    if candidates.is_empty() {
        candidates = (0..ranked.len()).rev().collect();
    }

    for &idx in &candidates {
        let rest = without(ranked, idx);
        if let Some(pairs) = rematch_free(&rest, budget) {
            return (ranked[idx], rest, Some(pairs));
        }
        if *budget == 0 {
            break;
        }
    }

    let idx = pick_bye_index(ranked, |p| !p.had_bye);
    (ranked[idx], without(ranked, idx), None)
}

fn without<'a>(ranked: &[&'a TournamentPlayer], idx: usize) -> Vec<&'a TournamentPlayer> {
    ranked
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != idx)
        .map(|(_, player)| *player)
        .collect()
}

/// Depth-first search for a perfect matching with no repeated opponents,
/// trying the closest-ranked candidates first
fn rematch_free(ranked: &[&TournamentPlayer], budget: &mut usize) -> Option<Vec<(usize, usize)>> {
    let mut taken = vec![false; ranked.len()];
    let mut pairs = Vec::with_capacity(ranked.len() / 2);
    if extend(ranked, &mut taken, &mut pairs, budget) {
        Some(pairs)
    } else {
        None
    }
}

fn extend(
    ranked: &[&TournamentPlayer],
    taken: &mut [bool],
    pairs: &mut Vec<(usize, usize)>,
    budget: &mut usize,
) -> bool {
    let Some(i) = taken.iter().position(|t| !t) else {
        return true;
    };

    taken[i] = true;
    for j in i + 1..ranked.len() {
        if taken[j] || ranked[i].has_played(&ranked[j].username) {
            continue;
        }
        if *budget == 0 {
            break;
        }
        *budget -= 1;

        taken[j] = true;
        pairs.push((i, j));
        if extend(ranked, taken, pairs, budget) {
            return true;
        }
        pairs.pop();
        taken[j] = false;
    }
    taken[i] = false;
    false
}
