//! Service configuration.
//!
//! Loaded from `COMPTOIR_*` environment variables with fallback to defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use comptoir_core::sequence::MAX_PADDING;
use comptoir_db::{DbConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Comptoir configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size (default: 5)
    pub max_connections: u32,

    /// How long a writer waits for the lock before failing busy
    pub busy_timeout_ms: u64,

    /// Attempts per unit of work, including the first
    pub retry_max_attempts: u32,

    /// First retry delay, doubled on each attempt
    pub retry_base_delay_ms: u64,

    /// Zero-padding of new code counters (`CLI-2025-0001` → 4)
    pub code_padding: u32,

    /// Tracing filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from("./comptoir.db"),
            max_connections: 5,
            busy_timeout_ms: 5000,
            retry_max_attempts: 5,
            retry_base_delay_ms: 10,
            code_padding: 4,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup; `load` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();

        let config = AppConfig {
            database_path: lookup("COMPTOIR_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse(&lookup, "COMPTOIR_DB_MAX_CONNECTIONS", defaults.max_connections)?,

            busy_timeout_ms: parse(&lookup, "COMPTOIR_DB_BUSY_TIMEOUT_MS", defaults.busy_timeout_ms)?,

            retry_max_attempts: parse(&lookup, "COMPTOIR_RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts)?,

            retry_base_delay_ms: parse(&lookup, "COMPTOIR_RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms)?,

            code_padding: parse(&lookup, "COMPTOIR_CODE_PADDING", defaults.code_padding)?,

            log_filter: lookup("COMPTOIR_LOG").unwrap_or(defaults.log_filter),
        };

        config.validate()?;
        Ok(config)
    }

    /// Range checks applied by `load`; callers building an `AppConfig` by
    /// hand run them too.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections < 1 {
            return Err(ConfigError::OutOfRange {
                key: "COMPTOIR_DB_MAX_CONNECTIONS",
                min: 1,
                max: u32::MAX as u64,
            });
        }
        if self.retry_max_attempts < 1 {
            return Err(ConfigError::OutOfRange {
                key: "COMPTOIR_RETRY_MAX_ATTEMPTS",
                min: 1,
                max: u32::MAX as u64,
            });
        }
        if !(1..=MAX_PADDING).contains(&self.code_padding) {
            return Err(ConfigError::OutOfRange {
                key: "COMPTOIR_CODE_PADDING",
                min: 1,
                max: MAX_PADDING as u64,
            });
        }
        Ok(())
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("{key} must be between {min} and {max}")]
    OutOfRange { key: &'static str, min: u64, max: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.db_config().max_connections, 5);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("COMPTOIR_DATABASE_PATH", "/tmp/shop.db"),
            ("COMPTOIR_DB_MAX_CONNECTIONS", "8"),
            ("COMPTOIR_RETRY_MAX_ATTEMPTS", "3"),
            ("COMPTOIR_CODE_PADDING", " 6 "),
            ("COMPTOIR_LOG", "debug,sqlx=warn"),
        ])
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert_eq!(config.code_padding, 6);
        assert_eq!(config.log_filter, "debug,sqlx=warn");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            load(&[("COMPTOIR_DB_BUSY_TIMEOUT_MS", "soon")]),
            Err(ConfigError::InvalidValue(key)) if key == "COMPTOIR_DB_BUSY_TIMEOUT_MS"
        ));
        assert!(matches!(
            load(&[("COMPTOIR_DB_MAX_CONNECTIONS", "0")]),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            load(&[("COMPTOIR_RETRY_MAX_ATTEMPTS", "0")]),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(load(&[("COMPTOIR_CODE_PADDING", "13")]).is_err());
        assert!(load(&[("COMPTOIR_CODE_PADDING", "0")]).is_err());
    }
}
