//! PostgreSQL connection wrapper.

use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row, Transaction};
use tracing::{debug, warn};

use crate::config::PgConfig;
use crate::error::{PgError, PgResult};

/// A connected client together with the task driving its socket.
///
/// Dropping a `PgConnection` closes the socket eventually; [`close`] does it
/// deterministically and waits until the server side has seen the
/// disconnect, which matters before dropping the database it points at.
///
/// [`close`]: PgConnection::close
pub struct PgConnection {
    client: Client,
    driver: JoinHandle<()>,
    database: String,
}

impl PgConnection {
    /// Open a connection described by `config`.
    pub async fn connect(config: &PgConfig) -> PgResult<Self> {
        let database = config.database();
        let pg_config = config.to_pg_config()?;

        debug!(target = %config.describe(), "Connecting");
        let (client, connection) = pg_config.connect(NoTls).await.map_err(|e| {
            PgError::connection(format!("failed to connect to {}: {}", config.describe(), e))
        })?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "Connection error");
            }
        });

        Ok(Self {
            client,
            driver,
            database,
        })
    }

    /// Name of the database this connection is attached to.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Execute a query and return all rows.
    pub async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Vec<Row>> {
        debug!(sql = %sql, "Executing query");
        let rows = self.client.query(sql, params).await?;
        Ok(rows)
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<u64> {
        debug!(sql = %sql, "Executing statement");
        let count = self.client.execute(sql, params).await?;
        Ok(count)
    }

    /// Execute a batch of statements using the simple query protocol.
    ///
    /// No parameters are bound, so the text is sent to the server verbatim.
    pub async fn batch_execute(&self, sql: &str) -> PgResult<()> {
        debug!(bytes = sql.len(), "Executing batch");
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    /// Begin a transaction.
    pub async fn transaction(&mut self) -> PgResult<Transaction<'_>> {
        debug!("Beginning transaction");
        let txn = self.client.transaction().await?;
        Ok(txn)
    }

    /// Get the underlying tokio-postgres client.
    ///
    /// This is useful for advanced operations not covered by this wrapper.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Close the connection and wait for the driver task to finish.
    pub async fn close(self) {
        let Self {
            client,
            driver,
            database,
        } = self;
        drop(client);
        if let Err(e) = driver.await {
            warn!(database = %database, error = %e, "Connection task did not shut down cleanly");
        }
        debug!(database = %database, "Connection closed");
    }
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("database", &self.database)
            .field("closed", &self.client.is_closed())
            .finish()
    }
}
