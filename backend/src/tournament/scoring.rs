//! Format-specific scoring. Points are kept in half-game units so a draw
//! stays an integer.

use super::{model::TournamentSystem, player::TournamentPlayer};
use crate::game::PlayerOutcome;

pub const WIN_POINTS: u32 = 2;
pub const DRAW_POINTS: u32 = 1;
pub const BYE_POINTS: u32 = WIN_POINTS;

/// Consecutive wins needed before an Arena player is on fire
pub const FIRE_STREAK: u32 = 2;
/// A berserked win only earns its bonus if the game lasted this long
pub const BERSERK_MIN_PLIES: u32 = 14;

/// Points `player` earns for `outcome`, computed against the player's
/// state before the game is recorded.
pub fn points_for(
    system: TournamentSystem,
    player: &TournamentPlayer,
    outcome: PlayerOutcome,
    berserk: bool,
    plies: u32,
) -> u32 {
    let base = match outcome {
        PlayerOutcome::Win => WIN_POINTS,
        PlayerOutcome::Draw => DRAW_POINTS,
        PlayerOutcome::Bye => BYE_POINTS,
        PlayerOutcome::Loss | PlayerOutcome::Aborted => 0,
    };

    if system != TournamentSystem::Arena {
        return base;
    }

    let on_fire = player.win_streak >= FIRE_STREAK;
    let mut points = match outcome {
        PlayerOutcome::Win | PlayerOutcome::Draw if on_fire => base * 2,
        _ => base,
    };
    if outcome == PlayerOutcome::Win && berserk && plies >= BERSERK_MIN_PLIES {
        points += 1;
    }
    points
}
