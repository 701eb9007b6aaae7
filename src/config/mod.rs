//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Highest accepted tick rate; keeps the tick period at or above one millisecond
pub const MAX_TICK_RATE: u32 = 1000;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS; empty allows any origin
    pub client_origins: Vec<String>,

    /// Physics ticks per second
    pub tick_rate: u32,
    /// Period between full arena snapshots
    pub snapshot_interval: Duration,
    /// Seed for respawn placement
    pub arena_seed: u64,
    /// Whether `arena_seed` came from the environment
    pub arena_seed_fixed: bool,
    /// Max inbound messages per second per connection
    pub input_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let client_origins = lookup("CLIENT_ORIGIN")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let tick_rate: u32 = parse_or(&lookup, "TICK_RATE", 20)?;
        if tick_rate == 0 || tick_rate > MAX_TICK_RATE {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }

        let snapshot_secs: f64 = parse_or(&lookup, "SNAPSHOT_INTERVAL_SECS", 1.0)?;
        if snapshot_secs <= 0.0 {
            return Err(ConfigError::Invalid("SNAPSHOT_INTERVAL_SECS"));
        }
        let snapshot_interval = Duration::try_from_secs_f64(snapshot_secs)
            .map_err(|_| ConfigError::Invalid("SNAPSHOT_INTERVAL_SECS"))?;

        let seed: Option<u64> = lookup("ARENA_SEED")
            .map(|raw| raw.parse().map_err(|_| ConfigError::Invalid("ARENA_SEED")))
            .transpose()?;

        let input_rate_limit: u32 = parse_or(&lookup, "INPUT_RATE_LIMIT", 120)?;
        if input_rate_limit == 0 {
            return Err(ConfigError::Invalid("INPUT_RATE_LIMIT"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origins,
            tick_rate,
            snapshot_interval,
            arena_seed: seed.unwrap_or_else(rand::random),
            arena_seed_fixed: seed.is_some(),
            input_rate_limit,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
