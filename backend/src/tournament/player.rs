//! Tournament-scoped player state

use crate::game::{Color, EndCause, GameId, PlayerOutcome};
use serde::{Deserialize, Serialize};

/// One entry of a player's tournament history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedGame {
    pub game_id: GameId,
    pub round: u32,
    /// `None` for a bye
    pub opponent: Option<String>,
    pub color: Option<Color>,
    pub outcome: PlayerOutcome,
    pub cause: Option<EndCause>,
    pub points: u32,
    pub berserk: bool,
}

/// A platform user for the duration of one tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentPlayer {
    pub username: String,
    /// Position in the join sequence; the leaderboard tie-break
    pub join_order: usize,
    pub score: u32,
    pub games: Vec<PlayedGame>,
    /// Consecutive pairing rounds this player waited through unpaired
    pub nb_not_paired: u32,
    pub withdrawn: bool,
    pub paused: bool,
    /// False while committed to a running game
    pub free: bool,
    pub win_streak: u32,
    pub nb_white: u32,
    pub nb_black: u32,
    pub had_bye: bool,
    pub berserk_requested: bool,
}

impl TournamentPlayer {
    pub fn new(username: String, join_order: usize) -> Self {
        Self {
            username,
            join_order,
            score: 0,
            games: Vec::new(),
            nb_not_paired: 0,
            withdrawn: false,
            paused: false,
            free: true,
            win_streak: 0,
            nb_white: 0,
            nb_black: 0,
            had_bye: false,
            berserk_requested: false,
        }
    }

    /// Whites minus blacks; the colour allocator gives white to the lower value
    pub fn color_balance(&self) -> i64 {
        i64::from(self.nb_white) - i64::from(self.nb_black)
    }

    pub fn last_opponent(&self) -> Option<&str> {
        self.games
            .iter()
            .rev()
            .find_map(|game| game.opponent.as_deref())
    }

    pub fn has_played(&self, opponent: &str) -> bool {
        self.games
            .iter()
            .any(|game| game.opponent.as_deref() == Some(opponent))
    }

    /// Fold one settled game into this player's state
    pub(crate) fn record(&mut self, game: PlayedGame) {
        match game.color {
            Some(Color::White) => self.nb_white += 1,
            Some(Color::Black) => self.nb_black += 1,
            None => {}
        }
        if game.outcome == PlayerOutcome::Bye {
            self.had_bye = true;
        }
        self.win_streak = match game.outcome {
            PlayerOutcome::Win => self.win_streak + 1,
            // An aborted game neither extends nor breaks a streak
            PlayerOutcome::Aborted => self.win_streak,
            _ => 0,
        };
        self.score += game.points;
        self.free = true;
        self.games.push(game);
    }
}
