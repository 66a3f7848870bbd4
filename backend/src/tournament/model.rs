//! Tournament configuration and status types

use crate::{
    error::{AppError, Result},
    game::TimeControl,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

/// Competition format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentSystem {
    Arena,
    Swiss,
    RoundRobin,
}

impl TournamentSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentSystem::Arena => "arena",
            TournamentSystem::Swiss => "swiss",
            TournamentSystem::RoundRobin => "rr",
        }
    }

    /// Formats played in rounds where every game of a round must settle
    /// before the next one is paired
    pub fn is_round_based(&self) -> bool {
        !matches!(self, TournamentSystem::Arena)
    }
}

impl fmt::Display for TournamentSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentSystem {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arena" => Ok(TournamentSystem::Arena),
            "swiss" => Ok(TournamentSystem::Swiss),
            "rr" | "round_robin" | "round-robin" => Ok(TournamentSystem::RoundRobin),
            other => Err(AppError::InvalidConfig(format!(
                "unknown tournament system '{}'",
                other
            ))),
        }
    }
}

/// Lifecycle status. The derived ordering matches the only allowed
/// direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    Created,
    Started,
    Finished,
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TournamentStatus::Created => "created",
            TournamentStatus::Started => "started",
            TournamentStatus::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// How long a tournament runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TournamentLength {
    /// Arena: wall-clock minutes after the start
    Minutes(f64),
    /// Swiss and round-robin: number of rounds
    Rounds(u32),
}

/// Configuration for creating a tournament
#[derive(Debug, Clone)]
pub struct TournamentConfig {
    pub name: String,
    pub system: TournamentSystem,
    pub variant: String,
    pub time_control: TimeControl,
    /// Minutes between creation and start
    pub before_start_minutes: f64,
    pub length: TournamentLength,
}

impl TournamentConfig {
    pub fn arena(name: impl Into<String>, minutes: f64) -> Self {
        Self::new(name, TournamentSystem::Arena, TournamentLength::Minutes(minutes))
    }

    pub fn swiss(name: impl Into<String>, rounds: u32) -> Self {
        Self::new(name, TournamentSystem::Swiss, TournamentLength::Rounds(rounds))
    }

    pub fn round_robin(name: impl Into<String>, rounds: u32) -> Self {
        Self::new(
            name,
            TournamentSystem::RoundRobin,
            TournamentLength::Rounds(rounds),
        )
    }

    fn new(name: impl Into<String>, system: TournamentSystem, length: TournamentLength) -> Self {
        Self {
            name: name.into(),
            system,
            variant: "chess".to_string(),
            time_control: TimeControl::default(),
            before_start_minutes: 0.0,
            length,
        }
    }

    pub fn with_before_start(mut self, minutes: f64) -> Self {
        self.before_start_minutes = minutes;
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn with_time_control(mut self, time_control: TimeControl) -> Self {
        self.time_control = time_control;
        self
    }

    /// Reject values that cannot describe a playable tournament
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidConfig("name must not be empty".to_string()));
        }

        if !self.before_start_minutes.is_finite() || self.before_start_minutes < 0.0 {
            return Err(AppError::InvalidConfig(format!(
                "start delay must be a non-negative number of minutes, got {}",
                self.before_start_minutes
            )));
        }
        if minutes_to_duration(self.before_start_minutes).is_none() {
            return Err(AppError::InvalidConfig(format!(
                "start delay of {} minutes is out of range",
                self.before_start_minutes
            )));
        }

        if !self.time_control.base_minutes.is_finite() || self.time_control.base_minutes <= 0.0 {
            return Err(AppError::InvalidConfig(format!(
                "base clock must be positive, got {} minutes",
                self.time_control.base_minutes
            )));
        }

        match (self.system, self.length) {
            (TournamentSystem::Arena, TournamentLength::Minutes(minutes)) => {
                if !minutes.is_finite() || minutes <= 0.0 {
                    return Err(AppError::InvalidConfig(format!(
                        "arena duration must be positive, got {} minutes",
                        minutes
                    )));
                }
                if minutes_to_duration(minutes).is_none() {
                    return Err(AppError::InvalidConfig(format!(
                        "arena duration of {} minutes is out of range",
                        minutes
                    )));
                }
            }
            (TournamentSystem::Swiss | TournamentSystem::RoundRobin, TournamentLength::Rounds(0)) => {
                return Err(AppError::InvalidConfig(
                    "round count must be at least 1".to_string(),
                ));
            }
            (TournamentSystem::Swiss | TournamentSystem::RoundRobin, TournamentLength::Rounds(_)) => {}
            (system, length) => {
                return Err(AppError::InvalidConfig(format!(
                    "{} tournaments cannot be configured with {:?}",
                    system, length
                )));
            }
        }

        Ok(())
    }

    /// Start delay. Saturates when the configuration was never validated.
    pub fn before_start(&self) -> Duration {
        minutes_to_duration(self.before_start_minutes).unwrap_or(Duration::MAX)
    }

    /// Arena duration; `None` for round-based formats
    pub fn duration(&self) -> Option<Duration> {
        match self.length {
            TournamentLength::Minutes(minutes) => {
                Some(minutes_to_duration(minutes).unwrap_or(Duration::MAX))
            }
            TournamentLength::Rounds(_) => None,
        }
    }

    /// Configured round count; `None` for Arena
    pub fn rounds(&self) -> Option<u32> {
        match self.length {
            TournamentLength::Rounds(rounds) => Some(rounds),
            TournamentLength::Minutes(_) => None,
        }
    }
}

/// `None` for negative, non-finite or overflowing values
fn minutes_to_duration(minutes: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(minutes * 60.0).ok()
}
