use chrono::{FixedOffset, Offset, Utc};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_VOTE_THRESHOLD: f64 = 25.0;
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
/// India Standard Time, +05:30.
pub const DEFAULT_CAMPUS_OFFSET_MINUTES: i32 = 330;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} has an invalid value `{value}`: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub vote_threshold: f64,
    pub refresh_interval: Duration,
    pub past_topics_limit: usize,
    pub campus_offset: FixedOffset,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            db_max_connections: 20,
            vote_threshold: DEFAULT_VOTE_THRESHOLD,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            past_topics_limit: 20,
            campus_offset: ist(),
        }
    }
}

fn ist() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_CAMPUS_OFFSET_MINUTES * 60).unwrap_or(Utc.fix())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let bind_addr = parse_var(&lookup, "BIND_ADDR", defaults.bind_addr)?;
        let db_max_connections =
            parse_var(&lookup, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?;

        let vote_threshold = parse_var(&lookup, "VOTE_THRESHOLD", defaults.vote_threshold)?;
        if !(vote_threshold.is_finite() && vote_threshold > 0.0) {
            return Err(invalid("VOTE_THRESHOLD", vote_threshold, "must be positive"));
        }

        let refresh_secs = parse_var(
            &lookup,
            "REFRESH_INTERVAL_SECS",
            defaults.refresh_interval.as_secs(),
        )?;
        if refresh_secs == 0 {
            return Err(invalid("REFRESH_INTERVAL_SECS", refresh_secs, "must be positive"));
        }

        let past_topics_limit =
            parse_var(&lookup, "PAST_TOPICS_LIMIT", defaults.past_topics_limit)?;

        let offset_minutes: i32 = parse_var(
            &lookup,
            "CAMPUS_UTC_OFFSET_MINUTES",
            DEFAULT_CAMPUS_OFFSET_MINUTES,
        )?;
        let campus_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| invalid("CAMPUS_UTC_OFFSET_MINUTES", offset_minutes, "out of range"))?;

        Ok(Config {
            database_url,
            bind_addr,
            db_max_connections,
            vote_threshold,
            refresh_interval: Duration::from_secs(refresh_secs),
            past_topics_limit,
            campus_offset,
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &raw, e.to_string())),
        None => Ok(default),
    }
}

fn invalid(var: &'static str, value: impl ToString, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}
