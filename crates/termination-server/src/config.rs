//! Server configuration, loaded from environment variables at startup.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

/// Value of `TERMDET_DATABASE_URL` that selects the in-memory store.
pub const IN_MEMORY_DATABASE: &str = "memory";

/// Runtime configuration for termination-server.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8080"`).
    pub bind_address: SocketAddr,

    /// sqlx SQLite URL, or `"memory"` for the in-memory store
    /// (default: `"sqlite::memory:"`).
    pub database_url: String,

    /// How long task records are kept after registration. Required.
    pub tasks_storing_duration: Duration,

    /// `tracing` filter string, e.g. `"info"` or `"termination_core=debug"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is required")]
    Missing(&'static str),

    #[error("{var}: {source}")]
    Duration {
        var: &'static str,
        #[source]
        source: InvalidDuration,
    },

    #[error("{var}: invalid socket address {value:?}: {source}")]
    BindAddress {
        var: &'static str,
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration {0:?}, expected a positive value such as 12h, 30m, 90s, 7d or 1h30m")]
pub struct InvalidDuration(pub String);

/// Where task records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Sqlite(String),
}

impl Config {
    /// Build [`Config`] from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from any key lookup (the environment in production,
    /// a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = env_or(&lookup, "TERMDET_BIND", "0.0.0.0:8080");
        let bind_address = bind.parse().map_err(|source| ConfigError::BindAddress {
            var: "TERMDET_BIND",
            value: bind.clone(),
            source,
        })?;

        let storing = lookup("TASKS_STORING_DURATION")
            .ok_or(ConfigError::Missing("TASKS_STORING_DURATION"))?;
        let tasks_storing_duration =
            parse_duration(&storing).map_err(|source| ConfigError::Duration {
                var: "TASKS_STORING_DURATION",
                source,
            })?;

        Ok(Self {
            bind_address,
            database_url: env_or(&lookup, "TERMDET_DATABASE_URL", "sqlite::memory:"),
            tasks_storing_duration,
            log_level: env_or(&lookup, "TERMDET_LOG", "info"),
            log_json: lookup("TERMDET_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    pub fn store_backend(&self) -> StoreBackend {
        if self.database_url == IN_MEMORY_DATABASE {
            StoreBackend::InMemory
        } else {
            StoreBackend::Sqlite(self.database_url.clone())
        }
    }
}

/// Parse a duration made of `<integer><unit>` parts, units `ms`, `s`, `m`,
/// `h` and `d` (e.g. `1h30m`). The total must be positive.
pub fn parse_duration(text: &str) -> Result<Duration, InvalidDuration> {
    let invalid = || InvalidDuration(text.to_owned());

    let mut rest = text.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::zero();
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let amount: i64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Duration::try_milliseconds(amount),
            "s" => Duration::try_seconds(amount),
            "m" => Duration::try_minutes(amount),
            "h" => Duration::try_hours(amount),
            "d" => Duration::try_days(amount),
            _ => None,
        }
        .ok_or_else(invalid)?;
        rest = &rest[unit_len..];

        total = total.checked_add(&part).ok_or_else(invalid)?;
    }

    if total <= Duration::zero() {
        return Err(invalid());
    }
    Ok(total)
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_owned())
}
