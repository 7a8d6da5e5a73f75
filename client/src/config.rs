//! Configuration management for the sync agent.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default interval between periodic syncs while online (5 minutes).
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Default interval between reachability probes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);

/// Agent configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the REST API, without trailing slash
    pub api_url: String,
    /// User whose bookings and messages are mirrored
    pub user_id: String,
    /// Directory holding the persisted cache and pending log
    pub storage_dir: PathBuf,
    /// Interval of the periodic pull while online
    pub sync_interval: Duration,
    /// Interval of the reachability probe
    pub probe_interval: Duration,
    /// Bearer token sent with every request
    pub auth_token: Option<String>,
    /// Identifier embedded in pending action ids
    pub device_id: String,
}

impl Config {
    /// Build a configuration with defaults for everything but the API and user.
    pub fn new(api_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            user_id: user_id.into(),
            storage_dir: PathBuf::from(".berth"),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            auth_token: None,
            device_id: "device".to_string(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = env::var("BERTH_API_URL").map_err(|_| ConfigError::MissingApiUrl)?;
        let user_id = env::var("BERTH_USER_ID").map_err(|_| ConfigError::MissingUserId)?;

        let mut config = Self::new(api_url, user_id);

        if let Ok(dir) = env::var("BERTH_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }

        if let Ok(secs) = env::var("BERTH_SYNC_INTERVAL_SECS") {
            config.sync_interval = parse_secs(&secs, "BERTH_SYNC_INTERVAL_SECS")?;
        }

        if let Ok(secs) = env::var("BERTH_PROBE_INTERVAL_SECS") {
            config.probe_interval = parse_secs(&secs, "BERTH_PROBE_INTERVAL_SECS")?;
        }

        config.auth_token = env::var("BERTH_AUTH_TOKEN").ok().filter(|t| !t.is_empty());

        if let Ok(device_id) = env::var("BERTH_DEVICE_ID") {
            config.device_id = device_id;
        }

        Ok(config)
    }
}

fn parse_secs(value: &str, name: &'static str) -> Result<Duration, ConfigError> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidInterval(name)),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("BERTH_API_URL environment variable is required")]
    MissingApiUrl,

    #[error("BERTH_USER_ID environment variable is required")]
    MissingUserId,

    #[error("Invalid {0} value, expected a positive number of seconds")]
    InvalidInterval(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::new("http://localhost:3000/", "user-1");
        assert_eq!(config.api_url, "http://localhost:3000");
        assert_eq!(config.sync_interval, Duration::from_secs(300));
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn interval_parsing() {
        assert_eq!(
            parse_secs("60", "X").unwrap(),
            Duration::from_secs(60)
        );
        assert!(matches!(
            parse_secs("0", "X"),
            Err(ConfigError::InvalidInterval("X"))
        ));
        assert!(parse_secs("soon", "X").is_err());
    }
}
