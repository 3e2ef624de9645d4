//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Bot server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Webhook that receives outbound replies. Replies are only logged when unset.
    pub connector_url: Option<String>,
    /// Stored conversations untouched for this long are deleted.
    pub state_retention: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `BOT_ADDR` | Server bind address | `127.0.0.1:3978` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:spotbot.db?mode=rwc` |
    /// | `BOT_CONNECTOR_URL` | Outbound reply webhook | (none, log replies) |
    /// | `STATE_RETENTION_DAYS` | Days to keep idle conversation state | `30` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("BOT_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3978".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url = env::var("SQLITE_PATH")
            .unwrap_or_else(|_| "sqlite:spotbot.db?mode=rwc".to_string());

        let connector_url = env::var("BOT_CONNECTOR_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let retention_days: u64 = match env::var("STATE_RETENTION_DAYS") {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidRetention)?,
            Err(_) => 30,
        };

        Ok(Self {
            addr,
            database_url,
            connector_url,
            state_retention: Duration::from_secs(retention_days * 86_400),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid BOT_ADDR format")]
    InvalidAddr,

    #[error("STATE_RETENTION_DAYS must be a whole number of days")]
    InvalidRetention,
}
