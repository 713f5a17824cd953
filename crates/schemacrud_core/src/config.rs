//! Process configuration.
//!
//! # Responsibility
//! - Describe schema location, database pool settings and logging settings.
//! - Fill every omitted key with a working default.
//!
//! # Invariants
//! - A validated config has `pool_size >= 1` and non-zero timeouts.
//! - `logging.dir`, when set, is absolute.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SCHEMA_PATH: &str = "models.json";
const DEFAULT_POOL_SIZE: usize = 4;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// JSON file with the model definitions.
    pub schema_path: PathBuf,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            schema_path: PathBuf::from(DEFAULT_SCHEMA_PATH),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database file; `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// Connections for file databases. In-memory databases always use one.
    pub pool_size: usize,
    /// SQLite busy timeout applied to every connection.
    pub busy_timeout_ms: u64,
    /// Upper bound for waiting on a free pooled connection.
    pub acquire_timeout_ms: u64,
    /// Upper bound for running one statement; longer runs are interrupted.
    pub statement_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            statement_timeout_ms: DEFAULT_STATEMENT_TIMEOUT_MS,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        if self.busy_timeout_ms == 0
            || self.acquire_timeout_ms == 0
            || self.statement_timeout_ms == 0
        {
            return Err(ConfigError::Invalid(
                "database timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// File logging settings. Logging stays off when `dir` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        crate::logging::normalize_level(&self.logging.level).map_err(|err| {
            ConfigError::Invalid(format!("logging.level: {err}"))
        })?;
        if let Some(dir) = &self.logging.dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use std::path::PathBuf;

    #[test]
    fn omitted_keys_use_defaults() {
        let json = r#"{"database": {"path": "/tmp/crud.db"}}"#;
        let config = CoreConfig::from_json_str(json).unwrap();
        assert_eq!(config.schema_path, PathBuf::from("models.json"));
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/crud.db")));
        assert_eq!(config.database.pool_size, 4);
        assert_eq!(config.database.statement_timeout_ms, 30_000);
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn rejects_zero_pool_and_relative_log_dir() {
        let err = CoreConfig::from_json_str(r#"{"database": {"pool_size": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("pool_size")));

        let json = r#"{"database": {"statement_timeout_ms": 0}}"#;
        let err = CoreConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("timeouts")));

        let err = CoreConfig::from_json_str(r#"{"logging": {"dir": "logs"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("absolute")));

        let err = CoreConfig::from_json_str(r#"{"logging": {"level": "loud"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let err = CoreConfig::from_json_str(r#"{"databse": {}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
