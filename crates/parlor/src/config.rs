//! Server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Settings for one Parlor server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PARLOR_BIND`, listen address.
    pub bind_address: String,
    /// `PARLOR_SECRET`, the shared room secret. Required.
    pub secret: String,
    /// `PARLOR_HISTORY_LIMIT`, messages replayed to a joiner.
    pub history_limit: usize,
    /// `PARLOR_HISTORY_PATH`, JSON-lines history file. In-memory when unset.
    pub history_path: Option<PathBuf>,
    /// `PARLOR_HANDSHAKE_TIMEOUT_SECS`, time allowed before `connect`.
    pub handshake_timeout: Duration,
    /// `PARLOR_PERSIST_QUEUE`, persistence queue capacity.
    pub persist_queue: usize,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret = lookup("PARLOR_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("PARLOR_SECRET"))?;

        Ok(Self {
            bind_address: lookup("PARLOR_BIND").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            secret,
            history_limit: parse_or(&lookup, "PARLOR_HISTORY_LIMIT", 50)?,
            history_path: lookup("PARLOR_HISTORY_PATH")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            handshake_timeout: Duration::from_secs(parse_or(
                &lookup,
                "PARLOR_HANDSHAKE_TIMEOUT_SECS",
                10,
            )?),
            persist_queue: parse_or(&lookup, "PARLOR_PERSIST_QUEUE", 256)?,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: raw,
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
