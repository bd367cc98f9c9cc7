//! Storage configuration loaded from the environment.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("missing required setting {0}")]
    Missing(&'static str),
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Postgres connection string; in-memory stores ignore it.
    pub database_url: Option<String>,
    /// Pool size for the Postgres store.
    pub max_connections: u32,
    /// Longest wait for a per-carrier lock before giving up.
    pub lock_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl StorageConfig {
    /// Read `CARRIERWISE_*` variables, falling back to `DATABASE_URL` for the connection.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, file, test map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.database_url = lookup("CARRIERWISE_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .filter(|url| !url.trim().is_empty());

        if let Some(raw) = lookup("CARRIERWISE_MAX_CONNECTIONS") {
            config.max_connections = parse("CARRIERWISE_MAX_CONNECTIONS", &raw)?;
        }
        if let Some(raw) = lookup("CARRIERWISE_LOCK_TIMEOUT_MS") {
            let millis: u64 = parse("CARRIERWISE_LOCK_TIMEOUT_MS", &raw)?;
            config.lock_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("CARRIERWISE_DATABASE_URL"))
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}
