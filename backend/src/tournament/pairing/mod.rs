//! Pairing strategies
//!
//! Every format implements [`PairingStrategy`]; the lifecycle clock owns one
//! boxed strategy per tournament and calls it with the current registry and
//! waiting pool whenever a round should be paired:
//! - Arena: continuous score-proximity pairing, idle leftovers
//! - Swiss: fixed rounds, rematch-free pairing of close scores, full byes
//! - Round-robin: precomputed circle-method fixture

mod arena;
mod round_robin;
mod swiss;

pub use arena::ArenaPairing;
pub use round_robin::RoundRobinPairing;
pub use swiss::SwissPairing;

use crate::error::Result;
use serde::{Deserialize, Serialize};

use super::{model::TournamentSystem, player::TournamentPlayer, registration::PlayerRegistry};

/// What a bye is worth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByeCredit {
    /// Swiss / round-robin: scores as a win and counts as a game
    Full,
    /// Arena: the player simply waits for the next cycle
    Idle,
}

/// One unit of a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pairing {
    Game { white: String, black: String },
    Bye { player: String, credit: ByeCredit },
}

impl Pairing {
    pub fn game(white: impl Into<String>, black: impl Into<String>) -> Self {
        Pairing::Game {
            white: white.into(),
            black: black.into(),
        }
    }

    pub fn full_bye(player: impl Into<String>) -> Self {
        Pairing::Bye {
            player: player.into(),
            credit: ByeCredit::Full,
        }
    }

    pub fn idle_bye(player: impl Into<String>) -> Self {
        Pairing::Bye {
            player: player.into(),
            credit: ByeCredit::Idle,
        }
    }

    pub fn players(&self) -> Vec<&str> {
        match self {
            Pairing::Game { white, black } => vec![white.as_str(), black.as_str()],
            Pairing::Bye { player, .. } => vec![player.as_str()],
        }
    }
}

/// Pairings produced for one round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundPlan {
    pub pairings: Vec<Pairing>,
}

impl RoundPlan {
    pub fn push(&mut self, pairing: Pairing) {
        self.pairings.push(pairing);
    }

    pub fn games(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.pairings.iter().filter_map(|pairing| match pairing {
            Pairing::Game { white, black } => Some((white.as_str(), black.as_str())),
            Pairing::Bye { .. } => None,
        })
    }

    pub fn byes(&self) -> impl Iterator<Item = (&str, ByeCredit)> + '_ {
        self.pairings.iter().filter_map(|pairing| match pairing {
            Pairing::Bye { player, credit } => Some((player.as_str(), *credit)),
            Pairing::Game { .. } => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.pairings.is_empty()
    }
}

pub trait PairingStrategy: Send {
    fn system(&self) -> TournamentSystem;

    /// Called once, when the tournament starts
    fn prepare(&mut self, _registry: &PlayerRegistry) {}

    /// Upper bound on the rounds this strategy can produce, if it has one
    fn max_rounds(&self) -> Option<u32> {
        None
    }

    /// Pair the waiting pool. Fails with `InsufficientPlayers` when fewer
    /// than two players wait; the caller skips the round.
    fn create_pairing(
        &mut self,
        registry: &PlayerRegistry,
        waiting: &[String],
    ) -> Result<RoundPlan>;
}

pub fn strategy_for(system: TournamentSystem) -> Box<dyn PairingStrategy> {
    match system {
        TournamentSystem::Arena => Box::new(ArenaPairing::new()),
        TournamentSystem::Swiss => Box::new(SwissPairing::new()),
        TournamentSystem::RoundRobin => Box::new(RoundRobinPairing::new()),
    }
}

/// Give white to the player who had it less often; ties go to `higher`,
/// the better-ranked of the two.
pub(crate) fn assign_colors(higher: &TournamentPlayer, lower: &TournamentPlayer) -> Pairing {
    if lower.color_balance() < higher.color_balance() {
        Pairing::game(&lower.username, &higher.username)
    } else {
        Pairing::game(&higher.username, &lower.username)
    }
}

/// Index of the player who sits out: the lowest-ranked one satisfying
/// `eligible`, or the lowest-ranked overall
pub(crate) fn pick_bye_index<F>(ranked: &[&TournamentPlayer], eligible: F) -> usize
where
    F: Fn(&TournamentPlayer) -> bool,
{
    ranked
        .iter()
        .rposition(|player| eligible(player))
        .unwrap_or(ranked.len().saturating_sub(1))
}

/// Pair neighbours in rank order. Each player takes the closest unpaired
/// opponent that `avoid` does not flag, or the closest one if all are
/// flagged. `ranked` must have even length.
pub(crate) fn pair_adjacent<F>(ranked: &[&TournamentPlayer], avoid: F) -> Vec<(usize, usize)>
where
    F: Fn(&TournamentPlayer, &TournamentPlayer) -> bool,
{
    let mut taken = vec![false; ranked.len()];
    let mut pairs = Vec::with_capacity(ranked.len() / 2);

    for i in 0..ranked.len() {
        if taken[i] {
            continue;
        }
        let mut candidates = (i + 1..ranked.len()).filter(|&j| !taken[j]);
        let Some(first_free) = candidates.clone().next() else {
            break;
        };
        let opponent = candidates
            .find(|&j| !avoid(ranked[i], ranked[j]))
            .unwrap_or(first_free);
        taken[i] = true;
        taken[opponent] = true;
        pairs.push((i, opponent));
    }

    pairs
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn colors_favour_the_player_with_fewer_whites() {
        let mut registry = registry(TournamentSystem::Swiss, 4);
        play(&mut registry, "g1", "player_01", "player_02");

        let p1 = registry.get("player_01").unwrap();
        let p2 = registry.get("player_02").unwrap();
        assert_eq!(assign_colors(p1, p2), Pairing::game("player_02", "player_01"));

        let p3 = registry.get("player_03").unwrap();
        let p4 = registry.get("player_04").unwrap();
        assert_eq!(assign_colors(p3, p4), Pairing::game("player_03", "player_04"));
    }

    #[test]
    fn adjacent_pairing_skips_flagged_opponents_when_possible() {
        let registry = registry(TournamentSystem::Arena, 4);
        let ranked = registry.ranked(&everyone(&registry));

        let pairs = pair_adjacent(&ranked, |a, b| {
            a.username == "player_01" && b.username == "player_02"
        });
        assert_eq!(pairs, vec![(0, 2), (1, 3)]);

        let forced = pair_adjacent(&ranked[..2], |_, _| true);
        assert_eq!(forced, vec![(0, 1)]);
    }

    #[test]
    fn bye_index_prefers_lowest_eligible() {
        let registry = registry(TournamentSystem::Swiss, 3);
        let ranked = registry.ranked(&everyone(&registry));

        assert_eq!(pick_bye_index(&ranked, |p| p.username != "player_03"), 1);
        assert_eq!(pick_bye_index(&ranked, |_| false), 2);
    }

    #[test]
    fn plan_splits_games_and_byes() {
        let plan = RoundPlan {
            pairings: vec![Pairing::game("a", "b"), Pairing::idle_bye("c")],
        };
        assert_eq!(plan.games().collect::<Vec<_>>(), vec![("a", "b")]);
        assert_eq!(plan.byes().collect::<Vec<_>>(), vec![("c", ByeCredit::Idle)]);
        assert!(!plan.is_empty());
    }
}
