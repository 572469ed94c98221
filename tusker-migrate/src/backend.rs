//! Backends: the three places a schema can come from.
//!
//! - [`BackendKind::Schema`] applies the schema files to a fresh ephemeral database
//! - [`BackendKind::Migrations`] applies the migration files to a fresh ephemeral database
//! - [`BackendKind::Database`] connects to the configured database as is

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tokio_postgres::Client;
use tracing::{debug, info};
use tusker_postgres::{PgConfig, PgConnection, PgError};

use crate::ephemeral::{DatabaseAdmin, EphemeralDatabase, settle};
use crate::error::{MigrateResult, MigrationError};
use crate::exec::execute_file;
use crate::fileset::FileSet;

/// Default schema file pattern.
pub const DEFAULT_SCHEMA_PATTERN: &str = "schema.sql";

/// Default migration file pattern.
pub const DEFAULT_MIGRATIONS_PATTERN: &str = "migrations/*.sql";

/// Which schema source a backend represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// The declared schema files.
    Schema,
    /// The ordered migration files.
    Migrations,
    /// The live configured database.
    Database,
}

impl BackendKind {
    /// Every backend, in the order `check all` compares them.
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Migrations,
        BackendKind::Schema,
        BackendKind::Database,
    ];

    /// Name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Migrations => "migrations",
            Self::Database => "database",
        }
    }

    /// Suffix of the ephemeral database, if this backend needs one.
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Self::Schema => Some("schema"),
            Self::Migrations => Some("migrations"),
            Self::Database => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "schema" => Ok(Self::Schema),
            "migrations" => Ok(Self::Migrations),
            "database" => Ok(Self::Database),
            other => Err(MigrationError::usage(format!(
                "unknown backend '{}' (expected schema, migrations or database)",
                other
            ))),
        }
    }
}

/// File sets backing the schema and migrations backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFiles {
    /// Schema file patterns.
    pub schema: FileSet,
    /// Migration file patterns.
    pub migrations: FileSet,
}

impl SourceFiles {
    /// Create from explicit file sets.
    pub fn new(schema: FileSet, migrations: FileSet) -> Self {
        Self { schema, migrations }
    }

    /// File set for a backend kind. The live database has none.
    pub fn for_kind(&self, kind: BackendKind) -> Option<&FileSet> {
        match kind {
            BackendKind::Schema => Some(&self.schema),
            BackendKind::Migrations => Some(&self.migrations),
            BackendKind::Database => None,
        }
    }
}

impl Default for SourceFiles {
    fn default() -> Self {
        Self {
            schema: FileSet::new([DEFAULT_SCHEMA_PATTERN]),
            migrations: FileSet::new([DEFAULT_MIGRATIONS_PATTERN]),
        }
    }
}

/// A materialized backend ready to be introspected.
#[derive(Debug)]
pub enum Backend<'a> {
    /// Files applied to a database that is dropped on release.
    Ephemeral {
        /// Schema or migrations.
        kind: BackendKind,
        /// The database holding the applied files.
        database: EphemeralDatabase<'a>,
    },
    /// Direct connection to the configured database.
    Live(PgConnection),
}

impl Backend<'_> {
    /// Which backend this is.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Ephemeral { kind, .. } => *kind,
            Self::Live(_) => BackendKind::Database,
        }
    }

    /// Client connected to the backend's database.
    pub fn client(&self) -> &Client {
        match self {
            Self::Ephemeral { database, .. } => database.connection().client(),
            Self::Live(conn) => conn.client(),
        }
    }

    /// Close the connection, dropping the database if it is ephemeral.
    pub async fn release(self) -> MigrateResult<()> {
        match self {
            Self::Ephemeral { database, .. } => database.release().await,
            Self::Live(conn) => {
                conn.close().await;
                Ok(())
            }
        }
    }
}

/// Turns a [`BackendKind`] into a [`Backend`].
#[derive(Debug, Clone, Copy)]
pub struct Materializer<'a> {
    admin: &'a DatabaseAdmin,
    sources: &'a SourceFiles,
}

impl<'a> Materializer<'a> {
    /// Create a materializer over an administrative connection.
    pub fn new(admin: &'a DatabaseAdmin, sources: &'a SourceFiles) -> Self {
        Self { admin, sources }
    }

    /// Bring a backend up.
    ///
    /// Files are resolved before any database is created, so a bad pattern
    /// costs nothing on the server.
    pub async fn materialize(&self, kind: BackendKind) -> MigrateResult<Backend<'a>> {
        let (Some(files), Some(suffix)) = (self.sources.for_kind(kind), kind.suffix()) else {
            debug!(server = %self.admin.config().describe(), "Connecting to live database");
            let config = live_config(self.admin.config());
            let conn = PgConnection::connect(&config).await?;
            return Ok(Backend::Live(conn));
        };

        let files = files.resolve()?;
        let mut database = self.admin.acquire(suffix).await?;
        info!(
            backend = %kind,
            database = %database.name(),
            files = files.len(),
            "Materializing backend"
        );

        match apply_files(&mut database, &files).await {
            Ok(()) => Ok(Backend::Ephemeral { kind, database }),
            Err(err) => settle(Err(err), database.release().await),
        }
    }
}

/// The live database is only ever read.
fn live_config(config: &PgConfig) -> PgConfig {
    config.with_setting("default_transaction_read_only", "on")
}

/// Apply files in order inside a single transaction.
///
/// Deferred constraints are checked at commit; a failure there is reported
/// against the last file applied.
async fn apply_files(database: &mut EphemeralDatabase<'_>, files: &[PathBuf]) -> MigrateResult<()> {
    let txn = database.connection_mut().transaction().await?;
    for file in files {
        execute_file(&txn, file).await?;
    }
    txn.commit()
        .await
        .map_err(|e| commit_error(files, PgError::from(e)))
}

fn commit_error(files: &[PathBuf], err: PgError) -> MigrationError {
    match files.last() {
        Some(last) => MigrationError::sql_execution(last, &err),
        None => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_kind() {
        assert_eq!("schema".parse::<BackendKind>().unwrap(), BackendKind::Schema);
        assert_eq!(
            "migrations".parse::<BackendKind>().unwrap(),
            BackendKind::Migrations
        );
        assert_eq!(
            "database".parse::<BackendKind>().unwrap(),
            BackendKind::Database
        );
    }

    #[test]
    fn test_unknown_backend_is_usage_error() {
        let err = "production".parse::<BackendKind>().unwrap_err();
        assert!(err.is_usage());
        assert!(err.to_string().contains("production"));
    }

    #[test]
    fn test_display_matches_parse() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_all_order() {
        assert_eq!(
            BackendKind::ALL,
            [
                BackendKind::Migrations,
                BackendKind::Schema,
                BackendKind::Database
            ]
        );
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(BackendKind::Schema.suffix(), Some("schema"));
        assert_eq!(BackendKind::Migrations.suffix(), Some("migrations"));
        assert_eq!(BackendKind::Database.suffix(), None);
    }

    #[test]
    fn test_live_connection_is_read_only() {
        let config = PgConfig::from_url("postgresql://app@localhost/app").unwrap();
        let live = live_config(&config);
        assert_eq!(
            live.to_pg_config().unwrap().get_options(),
            Some("-c default_transaction_read_only=on")
        );
        assert_eq!(live.database(), "app");
        assert_eq!(config.options, None);
    }

    #[test]
    fn test_commit_failure_names_last_file() {
        let files = vec![
            PathBuf::from("migrations/0001.sql"),
            PathBuf::from("migrations/0002.sql"),
        ];
        let err = commit_error(&files, PgError::connection("server closed the connection"));
        match err {
            MigrationError::SqlExecution { path, class, .. } => {
                assert_eq!(path, PathBuf::from("migrations/0002.sql"));
                assert_eq!(class, "ConnectionError");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = commit_error(&[], PgError::connection("server closed the connection"));
        assert!(matches!(err, MigrationError::Database(_)));
    }

    #[test]
    fn test_default_sources() {
        let sources = SourceFiles::default();
        assert_eq!(sources.schema.patterns(), ["schema.sql"]);
        assert_eq!(sources.migrations.patterns(), ["migrations/*.sql"]);
        assert!(sources.for_kind(BackendKind::Database).is_none());
    }
}
