//! PostgreSQL activity source.
//!
//! Reads `pg_stat_activity` over a single `tokio-postgres` connection.

use crate::config::ConnectionConfig;
use crate::storage::traits::{ActivityRow, ActivitySource};
use crate::{Error, Result};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, Statement};
use tracing::instrument;

/// Distinct non-idle queries of one role, truncated by the server.
///
/// `$1` is the role name and `$2` the truncation length in characters. The
/// `ILIKE` clause keeps this very query (and any other monitoring query on
/// the activity view) out of the results.
pub const ACTIVITY_SQL: &str = r"
SELECT DISTINCT left(query, $2) AS query
FROM pg_stat_activity
WHERE usename = $1
  AND state <> 'idle'
  AND query IS NOT NULL
  AND query NOT ILIKE '%pg_stat_activity%'
";

/// `application_name` reported to the server.
const APPLICATION_NAME: &str = "querytrail";

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Activity source backed by a live PostgreSQL connection.
///
/// Owns the client and the task driving the connection. Dropping the source
/// drops the client, which closes the connection and ends the driver task;
/// [`PgActivitySource::close`] does the same and waits for the driver.
pub struct PgActivitySource {
    client: Client,
    driver: JoinHandle<()>,
    statement: Statement,
    max_query_len: i32,
}

/// Helper to map query errors.
fn query_error(e: &tokio_postgres::Error) -> Error {
    Error::Query {
        cause: e.to_string(),
    }
}

impl PgActivitySource {
    /// Connects and prepares the activity query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the server cannot be reached or
    /// rejects the login, [`Error::Query`] if the statement cannot be
    /// prepared, and [`Error::InvalidConfiguration`] if `max_query_len`
    /// does not fit a PostgreSQL integer.
    #[instrument(
        skip(config),
        fields(host = %config.host, port = config.port, dbname = %config.dbname, user = %config.user)
    )]
    pub async fn connect(config: &ConnectionConfig, max_query_len: u32) -> Result<Self> {
        let max_query_len = i32::try_from(max_query_len)
            .map_err(|e| Error::InvalidConfiguration(format!("max query length: {e}")))?;

        let (client, connection) = pg_config(config)
            .connect(NoTls)
            .await
            .map_err(|e| Error::Connection {
                cause: e.to_string(),
            })?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection closed with error");
            }
        });

        let statement = match client.prepare(ACTIVITY_SQL).await {
            Ok(statement) => statement,
            Err(e) => {
                drop(client);
                let _ = driver.await;
                return Err(query_error(&e));
            },
        };

        tracing::debug!("Connected to PostgreSQL");
        Ok(Self {
            client,
            driver,
            statement,
            max_query_len,
        })
    }

    /// Closes the connection and waits for the driver task to finish.
    pub async fn close(self) {
        let Self { client, driver, .. } = self;
        drop(client);
        if let Err(e) = driver.await {
            tracing::warn!(error = %e, "PostgreSQL connection task did not shut down cleanly");
        }
        tracing::debug!("PostgreSQL connection closed");
    }
}

impl ActivitySource for PgActivitySource {
    #[instrument(skip(self, target), fields(operation = "fetch_active", user = %target))]
    async fn fetch_active(&mut self, target: &str) -> Result<Vec<ActivityRow>> {
        let rows = self
            .client
            .query(&self.statement, &[&target, &self.max_query_len])
            .await
            .map_err(|e| query_error(&e))?;

        rows.iter()
            .map(|row| row.try_get::<_, Option<String>>(0))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| query_error(&e))
    }
}

/// Builds the tokio-postgres config for a connection.
fn pg_config(config: &ConnectionConfig) -> tokio_postgres::Config {
    let mut pg = tokio_postgres::Config::new();
    pg.host(&config.host)
        .port(config.port)
        .dbname(&config.dbname)
        .user(&config.user)
        .password(config.password.expose_secret())
        .application_name(APPLICATION_NAME)
        .connect_timeout(CONNECT_TIMEOUT);
    pg
}
