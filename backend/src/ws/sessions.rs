//! Live connection bookkeeping.
//!
//! The transport layer reports every tournament lobby connection here; the
//! tournament core only asks whether a player has at least one.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

/// Presence lookup used to build the waiting pool
pub trait SessionDirectory: Send + Sync {
    fn has_active_session(&self, username: &str, tournament_id: &str) -> bool;

    /// Forget every connection of a tournament once it is cleaned up
    fn clear_tournament(&self, _tournament_id: &str) {}
}

/// Counts open connections per (tournament, player)
#[derive(Debug, Default)]
pub struct SessionTracker {
    connections: RwLock<HashMap<String, HashMap<String, usize>>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more connection, returning the player's open count
    pub fn connect(&self, username: &str, tournament_id: &str) -> usize {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let count = connections
            .entry(tournament_id.to_string())
            .or_default()
            .entry(username.to_string())
            .or_insert(0);
        *count += 1;
        *count
    }

    /// Drop one connection, returning what is left
    pub fn disconnect(&self, username: &str, tournament_id: &str) -> usize {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(players) = connections.get_mut(tournament_id) else {
            return 0;
        };
        let remaining = match players.get_mut(username) {
            Some(count) if *count > 1 => {
                *count -= 1;
                *count
            }
            Some(_) => {
                players.remove(username);
                0
            }
            None => 0,
        };
        if players.is_empty() {
            connections.remove(tournament_id);
        }
        remaining
    }
}

impl SessionDirectory for SessionTracker {
    fn has_active_session(&self, username: &str, tournament_id: &str) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tournament_id)
            .and_then(|players| players.get(username))
            .is_some_and(|count| *count > 0)
    }

    fn clear_tournament(&self, tournament_id: &str) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(tournament_id);
    }
}
