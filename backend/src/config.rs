use anyhow::Context;
use std::{env, str::FromStr, time::Duration};

use crate::tournament::model::TournamentSystem;

#[derive(Clone, Debug)]
pub struct Config {
    /// When unset, results only live in memory
    pub database_url: Option<String>,
    pub clock: ClockSettings,
    pub event_capacity: usize,
    pub demo: DemoConfig,
}

/// Timing knobs shared by every tournament clock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockSettings {
    pub tick_interval: Duration,
    /// How long forced aborts may take before match tasks are cancelled
    pub abort_grace: Duration,
    /// Upper bound on a single best-effort store call
    pub persist_timeout: Duration,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            abort_grace: Duration::from_millis(2000),
            persist_timeout: Duration::from_millis(3000),
        }
    }
}

/// Settings of the demo binary
#[derive(Clone, Debug)]
pub struct DemoConfig {
    pub system: TournamentSystem,
    pub players: usize,
    pub rounds: u32,
    pub minutes: f64,
    pub before_start_minutes: f64,
    pub variant: String,
    pub move_delay: Duration,
    pub seed: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            system: TournamentSystem::Swiss,
            players: 8,
            rounds: 5,
            minutes: 1.0,
            // Round-based clocks finish at once when nobody has joined yet
            before_start_minutes: 0.05,
            variant: "chess".to_string(),
            move_delay: Duration::from_millis(20),
            seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = ClockSettings::default();
        let clock = ClockSettings {
            tick_interval: millis_var("TOURNEY_TICK_MS", defaults.tick_interval)?,
            abort_grace: millis_var("TOURNEY_ABORT_GRACE_MS", defaults.abort_grace)?,
            persist_timeout: millis_var("TOURNEY_PERSIST_TIMEOUT_MS", defaults.persist_timeout)?,
        };
        if clock.tick_interval.is_zero() {
            anyhow::bail!("TOURNEY_TICK_MS must be greater than zero");
        }

        let event_capacity = parsed_var("TOURNEY_EVENT_CAPACITY", 256usize)?;
        if event_capacity == 0 {
            anyhow::bail!("TOURNEY_EVENT_CAPACITY must be greater than zero");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            clock,
            event_capacity,
            demo: DemoConfig::from_env()?,
        })
    }
}

impl DemoConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            system: parsed_var("DEMO_SYSTEM", defaults.system)?,
            players: parsed_var("DEMO_PLAYERS", defaults.players)?,
            rounds: parsed_var("DEMO_ROUNDS", defaults.rounds)?,
            minutes: parsed_var("DEMO_MINUTES", defaults.minutes)?,
            before_start_minutes: parsed_var(
                "DEMO_BEFORE_START_MINUTES",
                defaults.before_start_minutes,
            )?,
            variant: env::var("DEMO_VARIANT").unwrap_or(defaults.variant),
            move_delay: millis_var("DEMO_MOVE_DELAY_MS", defaults.move_delay)?,
            seed: match env::var("DEMO_SEED") {
                Ok(raw) => Some(parse_value("DEMO_SEED", &raw)?),
                Err(_) => None,
            },
        })
    }
}

fn parsed_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn millis_var(name: &str, default: Duration) -> anyhow::Result<Duration> {
    match env::var(name) {
        Ok(raw) => parse_value::<u64>(name, &raw).map(Duration::from_millis),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(name: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("{} has an invalid value '{}'", name, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_value_reports_the_variable() {
        let err = parse_value::<u64>("TOURNEY_TICK_MS", "soon").unwrap_err();
        assert!(format!("{:#}", err).contains("TOURNEY_TICK_MS"));
        assert_eq!(parse_value::<u64>("TOURNEY_TICK_MS", " 250 ").unwrap(), 250);
    }

    #[test]
    fn system_names_parse_through_from_str() {
        assert_eq!(
            parse_value::<TournamentSystem>("DEMO_SYSTEM", "rr").unwrap(),
            TournamentSystem::RoundRobin
        );
        assert!(parse_value::<TournamentSystem>("DEMO_SYSTEM", "ladder").is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let clock = ClockSettings::default();
        assert_eq!(clock.tick_interval, Duration::from_secs(1));
        assert_eq!(clock.abort_grace, Duration::from_secs(2));
        assert_eq!(clock.persist_timeout, Duration::from_secs(3));
    }
}
