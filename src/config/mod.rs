//! Configuration management.
//!
//! Configuration is layered, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. A TOML config file
//! 3. Environment variables (`PG_HOST`, `PG_PORT`, `PG_DB`, `PG_USER`,
//!    `PG_PASSWORD`, `TARGET_USR`, `POLL_INTERVAL`, `LOG_FILE`,
//!    `QUERYTRAIL_MAX_QUERY_LEN`)
//! 4. Command-line flags, applied by the binary through the `with_*` setters
//!
//! The result is a plain [`CollectorConfig`] value handed to the collector;
//! nothing below `main` reads the environment.

mod connection;

pub use connection::{ConfigFileDatabase, ConnectionConfig, DEFAULT_PORT};

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default database role whose queries are collected.
pub const DEFAULT_TARGET_USER: &str = "aurena";
/// Default seconds between polls.
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 5.0;
/// Default query log path.
pub const DEFAULT_LOG_FILE: &str = "queries.log";
/// Default truncation length, in characters, applied by the database.
pub const DEFAULT_MAX_QUERY_LEN: u32 = 3000;

/// Main configuration for querytrail.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Connection to the monitored database.
    pub database: ConnectionConfig,
    /// Database role whose active queries are captured.
    pub target_user: String,
    /// Time between the start of consecutive polls.
    pub poll_interval: Duration,
    /// Path of the append-only query log.
    pub log_file: PathBuf,
    /// Maximum query length kept, in characters.
    pub max_query_len: u32,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Target user.
    pub target_user: Option<String>,
    /// Poll interval in seconds.
    pub poll_interval_secs: Option<f64>,
    /// Query log path.
    pub log_file: Option<String>,
    /// Maximum query length.
    pub max_query_len: Option<u32>,
    /// Database connection section.
    pub database: Option<ConfigFileDatabase>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            database: ConnectionConfig::default(),
            target_user: DEFAULT_TARGET_USER.to_string(),
            poll_interval: Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SECS),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            max_query_len: DEFAULT_MAX_QUERY_LEN,
        }
    }
}

impl CollectorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {}", path.display(), e),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| {
            Error::InvalidConfiguration(format!("{}: {}", path.display(), e))
        })?;

        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir (`~/.config/querytrail/config.toml` on
    /// Linux) and returns the defaults if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(dirs) = directories::ProjectDirs::from("", "", "querytrail") else {
            return Self::default();
        };

        let path = dirs.config_dir().join("config.toml");
        if path.exists() {
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `CollectorConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(target_user) = file.target_user {
            config.target_user = target_user;
        }
        if let Some(secs) = file.poll_interval_secs {
            config.poll_interval = parse_interval(secs)?;
        }
        if let Some(log_file) = file.log_file {
            config.log_file = PathBuf::from(log_file);
        }
        if let Some(max_query_len) = file.max_query_len {
            config.max_query_len = max_query_len;
        }
        if let Some(database) = file.database {
            config.database.apply_file(database);
        }

        Ok(config)
    }

    /// Applies environment variable overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies environment variable overrides read through `lookup`.
    ///
    /// Variables that are unset or empty leave the current value in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `PG_PORT`, `POLL_INTERVAL`
    /// or `QUERYTRAIL_MAX_QUERY_LEN` is not a valid number.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("PG_HOST") {
            self.database.host = host;
        }
        if let Some(port) = get("PG_PORT") {
            self.database.port = parse_number("PG_PORT", &port)?;
        }
        if let Some(dbname) = get("PG_DB") {
            self.database.dbname = dbname;
        }
        if let Some(user) = get("PG_USER") {
            self.database.user = user;
        }
        if let Some(password) = get("PG_PASSWORD") {
            self.database.password = password.into();
        }
        if let Some(target_user) = get("TARGET_USR") {
            self.target_user = target_user;
        }
        if let Some(interval) = get("POLL_INTERVAL") {
            self.poll_interval = parse_interval(parse_number("POLL_INTERVAL", &interval)?)?;
        }
        if let Some(log_file) = get("LOG_FILE") {
            self.log_file = PathBuf::from(log_file);
        }
        if let Some(max_len) = get("QUERYTRAIL_MAX_QUERY_LEN") {
            self.max_query_len = parse_number("QUERYTRAIL_MAX_QUERY_LEN", &max_len)?;
        }

        Ok(())
    }

    /// Checks that the configuration is usable before connecting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConfiguration`] listing every missing
    /// connection parameter (and `TARGET_USR` if the target is blank), or
    /// [`Error::InvalidConfiguration`] for a zero interval or query length.
    pub fn validate(&self) -> Result<()> {
        let mut missing = self.database.missing();
        if self.target_user.trim().is_empty() {
            missing.push("TARGET_USR".to_string());
        }
        if !missing.is_empty() {
            return Err(Error::MissingConfiguration(missing));
        }

        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfiguration(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.max_query_len == 0 || i32::try_from(self.max_query_len).is_err() {
            return Err(Error::InvalidConfiguration(format!(
                "max query length must be between 1 and {}",
                i32::MAX
            )));
        }

        Ok(())
    }

    /// Sets the database host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.database.host = host.into();
        self
    }

    /// Sets the database port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.database.port = port;
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn with_dbname(mut self, dbname: impl Into<String>) -> Self {
        self.database.dbname = dbname.into();
        self
    }

    /// Sets the login role.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.database.user = user.into();
        self
    }

    /// Sets the target user.
    #[must_use]
    pub fn with_target_user(mut self, target_user: impl Into<String>) -> Self {
        self.target_user = target_user.into();
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the query log path.
    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }
}

/// Converts a seconds value into a poll interval.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] unless `secs` is finite and
/// strictly positive.
pub fn parse_interval(secs: f64) -> Result<Duration> {
    if !(secs.is_finite() && secs > 0.0) {
        return Err(Error::InvalidConfiguration(format!(
            "poll interval must be a positive number of seconds, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::InvalidConfiguration(format!("poll interval {secs}: {e}")))
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::InvalidConfiguration(format!("{key}={value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("PG_HOST", "db.internal"),
            ("PG_PORT", "6543"),
            ("PG_DB", "app"),
            ("PG_USER", "monitor"),
            ("PG_PASSWORD", "pw"),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.target_user, "aurena");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.log_file, PathBuf::from("queries.log"));
        assert_eq!(config.max_query_len, 3000);
        assert_eq!(config.database.port, 5432);
    }

    #[test]
    fn test_default_fails_validation_with_every_missing_key() {
        let err = CollectorConfig::default().validate().unwrap_err();
        match err {
            Error::MissingConfiguration(keys) => {
                assert_eq!(keys, vec!["PG_HOST", "PG_DB", "PG_USER", "PG_PASSWORD"]);
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CollectorConfig::default();
        let mut pairs = full_env();
        pairs.extend([
            ("TARGET_USR", "reporting"),
            ("POLL_INTERVAL", "0.5"),
            ("LOG_FILE", "/var/log/q.log"),
            ("QUERYTRAIL_MAX_QUERY_LEN", "100"),
        ]);
        config.apply_env_from(env(&pairs)).unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.password.expose_secret(), "pw");
        assert_eq!(config.target_user, "reporting");
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.log_file, PathBuf::from("/var/log/q.log"));
        assert_eq!(config.max_query_len, 100);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = CollectorConfig::default().with_host("kept");
        config
            .apply_env_from(env(&[("PG_HOST", ""), ("TARGET_USR", "  ")]))
            .unwrap();

        assert_eq!(config.database.host, "kept");
        assert_eq!(config.target_user, "aurena");
    }

    #[test]
    fn test_bad_port_is_invalid() {
        let mut config = CollectorConfig::default();
        let err = config.apply_env_from(env(&[("PG_PORT", "abc")])).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(msg) if msg.contains("PG_PORT")));
    }

    #[test]
    fn test_zero_port_env_fails_validation() {
        let mut config = CollectorConfig::default();
        let mut pairs = full_env();
        pairs.push(("PG_PORT", "0"));
        config.apply_env_from(env(&pairs)).unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::MissingConfiguration(keys) if keys == vec!["PG_PORT"]));
    }

    #[test]
    fn test_interval_must_be_positive() {
        assert!(parse_interval(0.0).is_err());
        assert!(parse_interval(-1.0).is_err());
        assert!(parse_interval(f64::NAN).is_err());
        assert!(parse_interval(f64::INFINITY).is_err());
        assert_eq!(parse_interval(2.5).unwrap(), Duration::from_millis(2500));
    }

    #[test]
    fn test_validate_rejects_zero_query_len() {
        let mut config = CollectorConfig::default();
        config.apply_env_from(env(&full_env())).unwrap();
        config.max_query_len = 0;

        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_target() {
        let mut config = CollectorConfig::default();
        config.apply_env_from(env(&full_env())).unwrap();
        let config = config.with_target_user(" ");

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::MissingConfiguration(keys) if keys == vec!["TARGET_USR"]));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
target_user = "etl"
poll_interval_secs = 10
log_file = "etl.log"

[database]
host = "localhost"
dbname = "warehouse"
user = "monitor"
password = "pw"
"#,
        )
        .unwrap();

        let config = CollectorConfig::load_from_file(&path).unwrap();
        assert_eq!(config.target_user, "etl");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.log_file, PathBuf::from("etl.log"));
        assert_eq!(config.database.dbname, "warehouse");
        assert_eq!(config.database.port, DEFAULT_PORT);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file_rejects_bad_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_secs = \"soon\"").unwrap();

        let err = CollectorConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = CollectorConfig::load_from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
    }

    #[test]
    fn test_builders() {
        let config = CollectorConfig::new()
            .with_host("h")
            .with_port(1)
            .with_dbname("d")
            .with_user("u")
            .with_target_user("t")
            .with_poll_interval(Duration::from_secs(1))
            .with_log_file("x.log");

        assert_eq!(config.database.host, "h");
        assert_eq!(config.database.port, 1);
        assert_eq!(config.target_user, "t");
        assert_eq!(config.log_file, PathBuf::from("x.log"));
    }
}
