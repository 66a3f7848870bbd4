//! Player registry
//!
//! Tracks every player who joined a tournament together with their score,
//! history and pairing bookkeeping. All mutation is synchronous; the owning
//! tournament wraps the registry in a lock so that game results coming from
//! concurrently running matches are applied one at a time.

use crate::{
    error::{AppError, Result},
    game::{Color, GameId, GameResult, PlayerOutcome},
    ws::messages::Standing,
};
use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use super::{
    model::{TournamentStatus, TournamentSystem},
    player::{PlayedGame, TournamentPlayer},
    scoring,
};

/// One side of a finished game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub username: String,
    pub berserk: bool,
}

impl Seat {
    pub fn new(username: impl Into<String>, berserk: bool) -> Self {
        Self {
            username: username.into(),
            berserk,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettlementKind {
    Played {
        white: Seat,
        black: Seat,
        result: GameResult,
    },
    /// Full-credit round without an opponent
    Bye { player: String },
}

/// A terminal game outcome waiting to be folded into the standings
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub game_id: GameId,
    pub round: u32,
    pub kind: SettlementKind,
}

impl Settlement {
    pub fn usernames(&self) -> Vec<&str> {
        match &self.kind {
            SettlementKind::Played { white, black, .. } => {
                vec![white.username.as_str(), black.username.as_str()]
            }
            SettlementKind::Bye { player } => vec![player.as_str()],
        }
    }
}

#[derive(Debug)]
pub struct PlayerRegistry {
    system: TournamentSystem,
    players: HashMap<String, TournamentPlayer>,
    join_sequence: Vec<String>,
    settled: HashSet<GameId>,
}

impl PlayerRegistry {
    pub fn new(system: TournamentSystem) -> Self {
        Self {
            system,
            players: HashMap::new(),
            join_sequence: Vec::new(),
            settled: HashSet::new(),
        }
    }

    pub fn system(&self) -> TournamentSystem {
        self.system
    }

    /// Add a player with a clean slate
    pub fn join(&mut self, username: &str) -> Result<&TournamentPlayer> {
        if self.players.contains_key(username) {
            return Err(AppError::DuplicateJoin(username.to_string()));
        }

        let player = TournamentPlayer::new(username.to_string(), self.join_sequence.len());
        self.join_sequence.push(username.to_string());
        Ok(&*self.players.entry(username.to_string()).or_insert(player))
    }

    /// Mark a player withdrawn. Their history stays; they leave the
    /// leaderboard and the waiting pool. Returns false when the player had
    /// already withdrawn.
    pub fn withdraw(&mut self, username: &str) -> Result<bool> {
        let player = self.get_mut(username)?;
        if player.withdrawn {
            return Ok(false);
        }
        player.withdrawn = true;
        player.berserk_requested = false;
        Ok(true)
    }

    pub fn pause(&mut self, username: &str) -> Result<()> {
        self.get_mut(username)?.paused = true;
        Ok(())
    }

    pub fn resume(&mut self, username: &str) -> Result<()> {
        self.get_mut(username)?.paused = false;
        Ok(())
    }

    /// Remember that the player wants to berserk their next game
    pub fn request_berserk(&mut self, username: &str) -> Result<()> {
        let player = self.get_mut(username)?;
        if player.withdrawn {
            return Err(AppError::BadRequest(format!(
                "{} has withdrawn from the tournament",
                username
            )));
        }
        player.berserk_requested = true;
        Ok(())
    }

    /// Consume a pending berserk request
    pub(crate) fn take_berserk(&mut self, username: &str) -> bool {
        self.players
            .get_mut(username)
            .map(|player| std::mem::take(&mut player.berserk_requested))
            .unwrap_or(false)
    }

    pub fn get(&self, username: &str) -> Option<&TournamentPlayer> {
        self.players.get(username)
    }

    fn get_mut(&mut self, username: &str) -> Result<&mut TournamentPlayer> {
        self.players
            .get_mut(username)
            .ok_or_else(|| AppError::UnknownPlayer(username.to_string()))
    }

    /// Every player ever joined, in join order
    pub fn players(&self) -> impl Iterator<Item = &TournamentPlayer> + '_ {
        self.join_sequence
            .iter()
            .filter_map(|username| self.players.get(username))
    }

    pub fn total_players(&self) -> usize {
        self.join_sequence.len()
    }

    /// Players who have not withdrawn
    pub fn nb_players(&self) -> usize {
        self.players.values().filter(|p| !p.withdrawn).count()
    }

    /// Players eligible for the next pairing: not withdrawn, not paused,
    /// connected, and not committed to a running game. Evaluated lazily in
    /// join order.
    pub fn waiting_players<'a, F>(
        &'a self,
        has_session: F,
    ) -> impl Iterator<Item = &'a TournamentPlayer> + 'a
    where
        F: Fn(&str) -> bool + 'a,
    {
        self.players().filter(move |player| {
            !player.withdrawn && !player.paused && player.free && has_session(&player.username)
        })
    }

    /// Non-withdrawn players, best first
    pub fn leaderboard(&self) -> Vec<&TournamentPlayer> {
        let mut board: Vec<&TournamentPlayer> =
            self.players.values().filter(|p| !p.withdrawn).collect();
        board.sort_by(|a, b| rank_order(a, b));
        board
    }

    /// The given players in leaderboard order; unknown names are skipped
    pub fn ranked(&self, usernames: &[String]) -> Vec<&TournamentPlayer> {
        let mut ranked: Vec<&TournamentPlayer> = usernames
            .iter()
            .filter_map(|username| self.players.get(username))
            .collect();
        ranked.sort_by(|a, b| rank_order(a, b));
        ranked
    }

    pub fn standings(&self) -> Vec<Standing> {
        self.leaderboard()
            .into_iter()
            .enumerate()
            .map(|(idx, player)| Standing {
                position: idx + 1,
                username: player.username.clone(),
                score: player.score,
                games: player.games.len(),
            })
            .collect()
    }

    /// Number of settled games and byes
    pub fn games_played(&self) -> usize {
        self.settled.len()
    }

    pub fn is_settled(&self, game_id: &str) -> bool {
        self.settled.contains(game_id)
    }

    /// Commit players to a freshly launched game
    pub(crate) fn mark_playing(&mut self, usernames: &[&str]) -> Result<()> {
        for username in usernames {
            if !self.players.contains_key(*username) {
                return Err(AppError::UnknownPlayer(username.to_string()));
            }
        }
        for username in usernames {
            let player = self.get_mut(username)?;
            player.free = false;
            player.nb_not_paired = 0;
        }
        Ok(())
    }

    /// Undo `mark_playing` when the engine refused to start the game
    pub(crate) fn release(&mut self, usernames: &[&str]) {
        for username in usernames {
            if let Some(player) = self.players.get_mut(*username) {
                player.free = true;
            }
        }
    }

    /// The player sat out a pairing round while others were paired
    pub(crate) fn mark_unpaired(&mut self, username: &str) -> Result<()> {
        self.get_mut(username)?.nb_not_paired += 1;
        Ok(())
    }

    /// Fold a terminal result into both participants. Each game may be
    /// applied exactly once; a second application is refused and leaves the
    /// standings untouched.
    pub(crate) fn apply(&mut self, settlement: &Settlement) -> Result<()> {
        if self.settled.contains(&settlement.game_id) {
            return Err(AppError::ResultAlreadyApplied(settlement.game_id.clone()));
        }
        for username in settlement.usernames() {
            if !self.players.contains_key(username) {
                return Err(AppError::UnknownPlayer(username.to_string()));
            }
        }

        let system = self.system;
        match &settlement.kind {
            SettlementKind::Played {
                white,
                black,
                result,
            } => {
                for (seat, opponent, color) in [
                    (white, black, Color::White),
                    (black, white, Color::Black),
                ] {
                    let player = self.get_mut(&seat.username)?;
                    let outcome = result.outcome.for_color(color);
                    let points =
                        scoring::points_for(system, player, outcome, seat.berserk, result.plies);
                    player.record(PlayedGame {
                        game_id: settlement.game_id.clone(),
                        round: settlement.round,
                        opponent: Some(opponent.username.clone()),
                        color: Some(color),
                        outcome,
                        cause: Some(result.cause),
                        points,
                        berserk: seat.berserk,
                    });
                }
            }
            SettlementKind::Bye { player } => {
                let player = self.get_mut(player)?;
                let points = scoring::points_for(system, player, PlayerOutcome::Bye, false, 0);
                player.nb_not_paired = 0;
                player.record(PlayedGame {
                    game_id: settlement.game_id.clone(),
                    round: settlement.round,
                    opponent: None,
                    color: None,
                    outcome: PlayerOutcome::Bye,
                    cause: None,
                    points,
                    berserk: false,
                });
            }
        }

        self.settled.insert(settlement.game_id.clone());
        Ok(())
    }
}

fn rank_order(a: &TournamentPlayer, b: &TournamentPlayer) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.join_order.cmp(&b.join_order))
}

/// Whether a tournament in `status` still accepts new players
pub(crate) fn join_allowed(
    status: TournamentStatus,
    system: TournamentSystem,
) -> std::result::Result<(), String> {
    match (status, system) {
        (TournamentStatus::Finished, _) => Err("Tournament is finished".to_string()),
        (TournamentStatus::Started, TournamentSystem::RoundRobin) => {
            Err("Round-robin fixture already generated".to_string())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{EndCause, Outcome};

    fn registry_with(names: &[&str]) -> PlayerRegistry {
        let mut registry = PlayerRegistry::new(TournamentSystem::Swiss);
        for name in names {
            registry.join(name).expect("join");
        }
        registry
    }

    fn played(id: &str, white: &str, black: &str, outcome: Outcome) -> Settlement {
        Settlement {
            game_id: id.to_string(),
            round: 1,
            kind: SettlementKind::Played {
                white: Seat::new(white, false),
                black: Seat::new(black, false),
                result: GameResult::new(outcome, EndCause::Resignation, 30),
            },
        }
    }

    #[test]
    fn join_rejects_duplicates() {
        let mut registry = registry_with(&["alice"]);
        let err = registry.join("alice").unwrap_err();
        assert!(matches!(err, AppError::DuplicateJoin(name) if name == "alice"));
        assert_eq!(registry.total_players(), 1);
    }

    #[test]
    fn new_player_starts_clean() {
        let registry = registry_with(&["alice"]);
        let player = registry.get("alice").unwrap();
        assert_eq!(player.score, 0);
        assert!(player.games.is_empty());
        assert_eq!(player.nb_not_paired, 0);
        assert!(player.free);
    }

    #[test]
    fn withdraw_unknown_fails_and_repeat_is_noop() {
        let mut registry = registry_with(&["alice", "bob"]);
        assert!(matches!(
            registry.withdraw("ghost"),
            Err(AppError::UnknownPlayer(_))
        ));
        assert!(registry.withdraw("alice").unwrap());
        assert!(!registry.withdraw("alice").unwrap());

        assert_eq!(registry.total_players(), 2);
        assert_eq!(registry.nb_players(), 1);
        assert!(registry.leaderboard().iter().all(|p| p.username != "alice"));
    }

    #[test]
    fn withdrawal_keeps_played_games() {
        let mut registry = registry_with(&["alice", "bob"]);
        registry.mark_playing(&["alice", "bob"]).unwrap();
        registry.apply(&played("g1", "alice", "bob", Outcome::WhiteWins)).unwrap();
        registry.withdraw("alice").unwrap();

        let alice = registry.get("alice").unwrap();
        assert_eq!(alice.games.len(), 1);
        assert_eq!(alice.score, 2);
        assert_eq!(registry.get("bob").unwrap().games.len(), 1);
    }

    #[test]
    fn waiting_pool_filters_sessions_games_and_pauses() {
        let mut registry = registry_with(&["alice", "bob", "carol", "dave", "erin"]);
        registry.withdraw("alice").unwrap();
        registry.mark_playing(&["bob"]).unwrap();
        registry.pause("carol").unwrap();

        let waiting: Vec<&str> = registry
            .waiting_players(|name| name != "erin")
            .map(|p| p.username.as_str())
            .collect();
        assert_eq!(waiting, vec!["dave"]);

        registry.resume("carol").unwrap();
        assert_eq!(registry.waiting_players(|_| true).count(), 3);
    }

    #[test]
    fn leaderboard_orders_by_score_then_join_order() {
        let mut registry = registry_with(&["alice", "bob", "carol", "dave"]);
        registry.mark_playing(&["alice", "bob", "carol", "dave"]).unwrap();
        registry.apply(&played("g1", "alice", "bob", Outcome::BlackWins)).unwrap();
        registry.apply(&played("g2", "carol", "dave", Outcome::Draw)).unwrap();

        let order: Vec<&str> = registry
            .leaderboard()
            .iter()
            .map(|p| p.username.as_str())
            .collect();
        assert_eq!(order, vec!["bob", "carol", "dave", "alice"]);

        let standings = registry.standings();
        assert_eq!(standings[0].position, 1);
        assert_eq!(standings[0].username, "bob");
        assert_eq!(standings[0].score, 2);
    }

    #[test]
    fn result_is_applied_exactly_once() {
        let mut registry = registry_with(&["alice", "bob"]);
        registry.mark_playing(&["alice", "bob"]).unwrap();
        let settlement = played("g1", "alice", "bob", Outcome::WhiteWins);

        registry.apply(&settlement).unwrap();
        let err = registry.apply(&settlement).unwrap_err();
        assert!(matches!(err, AppError::ResultAlreadyApplied(id) if id == "g1"));

        let alice = registry.get("alice").unwrap();
        assert_eq!(alice.score, 2);
        assert_eq!(alice.games.len(), 1);
        assert_eq!(registry.games_played(), 1);
    }

    #[test]
    fn bye_credits_full_point_and_resets_unpaired() {
        let mut registry = registry_with(&["alice"]);
        registry.mark_unpaired("alice").unwrap();
        registry
            .apply(&Settlement {
                game_id: "bye-1".to_string(),
                round: 1,
                kind: SettlementKind::Bye {
                    player: "alice".to_string(),
                },
            })
            .unwrap();

        let alice = registry.get("alice").unwrap();
        assert_eq!(alice.score, scoring::BYE_POINTS);
        assert_eq!(alice.nb_not_paired, 0);
        assert!(alice.had_bye);
        assert_eq!(alice.games.len(), 1);
    }

    #[test]
    fn mark_playing_is_all_or_nothing() {
        let mut registry = registry_with(&["alice"]);
        assert!(registry.mark_playing(&["alice", "ghost"]).is_err());
        assert!(registry.get("alice").unwrap().free);
    }

    #[test]
    fn berserk_request_is_consumed_once() {
        let mut registry = registry_with(&["alice"]);
        registry.request_berserk("alice").unwrap();
        assert!(registry.take_berserk("alice"));
        assert!(!registry.take_berserk("alice"));
        assert!(!registry.take_berserk("ghost"));
    }

    #[test]
    fn join_rules_follow_status_and_system() {
        assert!(join_allowed(TournamentStatus::Created, TournamentSystem::RoundRobin).is_ok());
        assert!(join_allowed(TournamentStatus::Started, TournamentSystem::Arena).is_ok());
        assert!(join_allowed(TournamentStatus::Started, TournamentSystem::Swiss).is_ok());
        assert!(join_allowed(TournamentStatus::Started, TournamentSystem::RoundRobin).is_err());
        assert!(join_allowed(TournamentStatus::Finished, TournamentSystem::Arena).is_err());
    }
}
