//! Ephemeral database lifecycle.
//!
//! Ephemeral databases are throwaway databases that schema files or
//! migrations get applied to so they can be introspected and compared. Each
//! one is:
//!
//! 1. Created with a unique name (`{base}_{epoch}_{suffix}_{nonce}`)
//! 2. Tagged with [`MARKER`] as its shared description
//! 3. Connected to and handed to the caller
//! 4. Dropped when the caller releases it
//!
//! The marker is what lets [`OrphanCleaner`](crate::cleaner::OrphanCleaner)
//! find databases left behind by a process that was killed before step 4.
//!
//! # Example
//!
//! ```rust,ignore
//! use tusker_migrate::ephemeral::{DatabaseAdmin, settle};
//!
//! let admin = DatabaseAdmin::connect(&config).await?;
//! let db = admin.acquire("schema").await?;
//!
//! let outcome = db.connection().batch_execute("CREATE TABLE t (id int)").await;
//! let result = settle(outcome.map_err(Into::into), db.release().await);
//!
//! admin.close().await;
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use tusker_postgres::{PgConfig, PgConnection, quote_ident, quote_literal};
use uuid::Uuid;

use crate::error::{MigrateResult, MigrationError};

/// Shared description attached to every ephemeral database.
pub const MARKER: &str = "CREATED BY TUSKER - If this table is left behind tusker probably crashed and was not able to clean up after itself. Either try running `tusker clean` or remove this database manually.";

/// Database the administrative connection is opened against.
pub const ADMIN_DATABASE: &str = "template1";

/// PostgreSQL truncates identifiers longer than this many bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Generate a unique ephemeral database name.
pub fn generate_name(base: &str, suffix: &str) -> String {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let nonce = Uuid::new_v4().simple().to_string();
    build_name(base, epoch, suffix, &nonce[..8])
}

/// Assemble a name from its parts, shortening `base` so the result fits in
/// a PostgreSQL identifier.
fn build_name(base: &str, epoch: u64, suffix: &str, nonce: &str) -> String {
    let tail = format!("_{}_{}_{}", epoch, suffix, nonce);
    let room = MAX_IDENTIFIER_LEN.saturating_sub(tail.len());

    let mut end = base.len().min(room);
    while !base.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}{}", &base[..end], tail)
}

/// Combine the outcome of a scoped body with the outcome of its cleanup.
///
/// The body's error always wins. A cleanup error is returned only when the
/// body succeeded; otherwise it is logged and discarded.
pub fn settle<T>(outcome: MigrateResult<T>, cleanup: MigrateResult<()>) -> MigrateResult<T> {
    match (outcome, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(cleanup_err)) => Err(cleanup_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(cleanup_err)) => {
            warn!(error = %cleanup_err, "Cleanup failed after an earlier error");
            Err(err)
        }
    }
}

/// Autocommit connection used for `CREATE DATABASE`, `DROP DATABASE` and
/// catalog scans.
#[derive(Debug)]
pub struct DatabaseAdmin {
    conn: PgConnection,
    config: PgConfig,
}

impl DatabaseAdmin {
    /// Connect to [`ADMIN_DATABASE`] using the server described by `config`.
    ///
    /// `config` is kept as the template for every connection opened later.
    pub async fn connect(config: &PgConfig) -> MigrateResult<Self> {
        let conn = PgConnection::connect(&config.with_database(ADMIN_DATABASE)).await?;
        debug!(server = %config.describe(), "Administrative connection established");
        Ok(Self {
            conn,
            config: config.clone(),
        })
    }

    /// Connection parameters of the configured (live) database.
    pub fn config(&self) -> &PgConfig {
        &self.config
    }

    /// The underlying administrative connection.
    pub fn connection(&self) -> &PgConnection {
        &self.conn
    }

    /// Create, tag and connect to a new ephemeral database.
    ///
    /// If tagging or connecting fails the database is dropped again before
    /// the error is returned.
    pub async fn acquire(&self, suffix: &str) -> MigrateResult<EphemeralDatabase<'_>> {
        let name = generate_name(&self.config.database(), suffix);

        self.conn
            .batch_execute(&format!("CREATE DATABASE {}", quote_ident(&name)))
            .await?;
        let mut guard = OrphanGuard::armed(&name);
        info!(database = %name, "Created ephemeral database");

        match self.tag_and_connect(&name).await {
            Ok(conn) => Ok(EphemeralDatabase {
                admin: self,
                conn,
                guard,
            }),
            Err(err) => {
                let cleanup = self.drop_database(&name).await;
                guard.disarm();
                settle(Err(err), cleanup)
            }
        }
    }

    async fn tag_and_connect(&self, name: &str) -> MigrateResult<PgConnection> {
        self.conn
            .batch_execute(&format!(
                "COMMENT ON DATABASE {} IS {}",
                quote_ident(name),
                quote_literal(MARKER)
            ))
            .await?;

        let conn = PgConnection::connect(&self.config.with_database(name)).await?;
        Ok(conn)
    }

    /// Drop a database by name.
    pub async fn drop_database(&self, name: &str) -> MigrateResult<()> {
        self.conn
            .batch_execute(&format!("DROP DATABASE {}", quote_ident(name)))
            .await
            .map_err(|e| {
                MigrationError::ephemeral(format!("failed to drop database {}: {}", name, e))
            })?;
        info!(database = %name, "Dropped database");
        Ok(())
    }

    /// Close the administrative connection.
    pub async fn close(self) {
        self.conn.close().await;
    }
}

/// A live ephemeral database and a connection bound to it.
///
/// Must be finished with [`release`](EphemeralDatabase::release). Dropping it
/// unreleased leaves the database on the server and logs a warning.
#[derive(Debug)]
pub struct EphemeralDatabase<'a> {
    admin: &'a DatabaseAdmin,
    conn: PgConnection,
    guard: OrphanGuard,
}

impl EphemeralDatabase<'_> {
    /// Generated database name.
    pub fn name(&self) -> &str {
        &self.guard.name
    }

    /// Connection to the ephemeral database.
    pub fn connection(&self) -> &PgConnection {
        &self.conn
    }

    /// Mutable connection, for opening transactions.
    pub fn connection_mut(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Close the connection and drop the database.
    pub async fn release(self) -> MigrateResult<()> {
        let Self {
            admin,
            conn,
            mut guard,
        } = self;

        conn.close().await;
        let result = admin.drop_database(&guard.name).await;
        guard.disarm();
        result
    }
}

/// Warns about a database that was created but never dropped.
#[derive(Debug)]
struct OrphanGuard {
    name: String,
    armed: bool,
}

impl OrphanGuard {
    fn armed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for OrphanGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                database = %self.name,
                "Ephemeral database was not dropped. Run `tusker clean` to remove it."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_name_layout() {
        let name = build_name("app", 1_700_000_000, "schema", "0a1b2c3d");
        assert_eq!(name, "app_1700000000_schema_0a1b2c3d");
    }

    #[test]
    fn test_build_name_truncates_long_base() {
        let base = "x".repeat(80);
        let name = build_name(&base, 1_700_000_000, "migrations", "0a1b2c3d");
        assert_eq!(name.len(), MAX_IDENTIFIER_LEN);
        assert!(name.ends_with("_1700000000_migrations_0a1b2c3d"));
    }

    #[test]
    fn test_build_name_truncates_on_char_boundary() {
        let base = "ü".repeat(40);
        let name = build_name(&base, 1_700_000_000, "schema", "0a1b2c3d");
        assert!(name.len() <= MAX_IDENTIFIER_LEN);
        assert!(name.starts_with("üü"));
        assert!(name.ends_with("_schema_0a1b2c3d"));
    }

    #[test]
    fn test_generate_name_is_unique() {
        let a = generate_name("tusker", "schema");
        let b = generate_name("tusker", "schema");
        assert_ne!(a, b);
        assert!(a.starts_with("tusker_"));
        assert!(a.contains("_schema_"));
    }

    #[test]
    fn test_marker_mentions_clean() {
        assert!(MARKER.starts_with("CREATED BY TUSKER"));
        assert!(MARKER.contains("`tusker clean`"));
    }

    #[test]
    fn test_settle_keeps_body_error() {
        let result: MigrateResult<()> = settle(
            Err(MigrationError::usage("body")),
            Err(MigrationError::ephemeral("cleanup")),
        );
        assert!(result.unwrap_err().is_usage());
    }

    #[test]
    fn test_settle_surfaces_cleanup_error_after_success() {
        let result = settle(Ok(1), Err(MigrationError::ephemeral("cleanup")));
        assert!(matches!(result, Err(MigrationError::Ephemeral(_))));
    }

    #[test]
    fn test_settle_success() {
        assert_eq!(settle(Ok(7), Ok(())).unwrap(), 7);
    }

    #[test]
    fn test_settle_body_error_clean_cleanup() {
        let result: MigrateResult<()> = settle(Err(MigrationError::usage("body")), Ok(()));
        assert!(result.unwrap_err().is_usage());
    }
}
