//! PostgreSQL connection parameters.
//!
//! # Example TOML
//!
//! ```toml
//! [database]
//! host = "db.internal"
//! port = 5432
//! dbname = "app"
//! user = "monitor"
//! password = "secret"
//! ```

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Default PostgreSQL port.
pub const DEFAULT_PORT: u16 = 5432;

/// Connection parameters for the monitored database.
///
/// Every field is required; [`ConnectionConfig::missing`] reports which ones
/// are still empty. The password is kept in a [`SecretString`] so it never
/// shows up in `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name.
    pub dbname: String,
    /// Login role.
    pub user: String,
    /// Login password.
    pub password: SecretString,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            dbname: String::new(),
            user: String::new(),
            password: SecretString::from(String::new()),
        }
    }
}

/// Database section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDatabase {
    /// Host.
    pub host: Option<String>,
    /// Port.
    pub port: Option<u16>,
    /// Database name.
    pub dbname: Option<String>,
    /// User.
    pub user: Option<String>,
    /// Password.
    pub password: Option<String>,
}

impl ConnectionConfig {
    /// Parses a `postgresql://` URL or key/value connection string.
    ///
    /// Only the first host and port are used. Missing parts stay empty and
    /// are reported by [`ConnectionConfig::missing`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the string cannot be parsed.
    pub fn from_url(url: &str) -> Result<Self> {
        let config = url
            .parse::<tokio_postgres::Config>()
            .map_err(|e| Error::InvalidConfiguration(format!("connection url: {e}")))?;

        Ok(Self {
            host: config
                .get_hosts()
                .first()
                .map(host_to_string)
                .unwrap_or_default(),
            port: config.get_ports().first().copied().unwrap_or(DEFAULT_PORT),
            dbname: config.get_dbname().map(String::from).unwrap_or_default(),
            user: config.get_user().map(String::from).unwrap_or_default(),
            password: SecretString::from(
                config
                    .get_password()
                    .map(|p| String::from_utf8_lossy(p).to_string())
                    .unwrap_or_default(),
            ),
        })
    }

    /// Applies the `[database]` section of a config file.
    pub(crate) fn apply_file(&mut self, file: ConfigFileDatabase) {
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(dbname) = file.dbname {
            self.dbname = dbname;
        }
        if let Some(user) = file.user {
            self.user = user;
        }
        if let Some(password) = file.password {
            self.password = SecretString::from(password);
        }
    }

    /// Returns the environment variable names of every missing parameter.
    #[must_use]
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.host.trim().is_empty() {
            missing.push("PG_HOST".to_string());
        }
        if self.port == 0 {
            missing.push("PG_PORT".to_string());
        }
        if self.dbname.trim().is_empty() {
            missing.push("PG_DB".to_string());
        }
        if self.user.trim().is_empty() {
            missing.push("PG_USER".to_string());
        }
        if self.password.expose_secret().is_empty() {
            missing.push("PG_PASSWORD".to_string());
        }
        missing
    }
}

/// Extracts host string from tokio-postgres Host.
#[cfg(unix)]
fn host_to_string(h: &tokio_postgres::config::Host) -> String {
    match h {
        tokio_postgres::config::Host::Tcp(s) => s.clone(),
        tokio_postgres::config::Host::Unix(p) => p.to_string_lossy().to_string(),
    }
}

/// Extracts host string from tokio-postgres Host (Windows: Tcp only).
#[cfg(not(unix))]
fn host_to_string(h: &tokio_postgres::config::Host) -> String {
    let tokio_postgres::config::Host::Tcp(s) = h;
    s.clone()
}
