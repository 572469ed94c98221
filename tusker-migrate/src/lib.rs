//! # tusker-migrate
//!
//! Compare a PostgreSQL schema as declared in SQL files, as built up by
//! migrations, and as it exists in a live database.
//!
//! Schema and migration files are applied to throwaway databases, which are
//! then compared with each other (or with the live database) by a
//! [`DiffEngine`]. The result is the SQL needed to get from one to the
//! other.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ schema/*.sql │   │ migrations/  │   │ live database  │
//! └──────┬───────┘   └──────┬───────┘   └───────┬────────┘
//!        ▼                  ▼                   │
//! ┌──────────────┐   ┌──────────────┐           │
//! │ ephemeral db │   │ ephemeral db │           │
//! └──────┬───────┘   └──────┬───────┘           │
//!        └─────────┬────────┴───────────────────┘
//!                  ▼
//!         ┌──────────────────┐    ┌─────────────┐
//!         │ DiffOrchestrator │───▶│ DiffEngine  │───▶ SQL
//!         └──────────────────┘    └─────────────┘
//! ```
//!
//! Ephemeral databases are tagged with [`MARKER`] so that [`OrphanCleaner`]
//! can find the ones a crashed run left behind.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tusker_migrate::{BackendKind, DatabaseAdmin, DiffOrchestrator, SourceFiles};
//! use tusker_postgres::PgConfig;
//!
//! async fn pending_migration() -> Result<String, Box<dyn std::error::Error>> {
//!     let config = PgConfig::from_url("postgresql://localhost/app")?;
//!     let admin = DatabaseAdmin::connect(&config).await?;
//!
//!     let orchestrator = DiffOrchestrator::new(&admin, SourceFiles::default());
//!     let sql = orchestrator
//!         .diff(BackendKind::Migrations, BackendKind::Schema)
//!         .await;
//!
//!     admin.close().await;
//!     Ok(sql?)
//! }
//! ```

pub mod backend;
pub mod cleaner;
pub mod diff;
pub mod engine;
pub mod ephemeral;
pub mod error;
pub mod exec;
pub mod fileset;
pub mod introspect;
pub mod sql;

pub use backend::{Backend, BackendKind, Materializer, SourceFiles};
pub use cleaner::OrphanCleaner;
pub use diff::{CatalogDiffEngine, DiffEngine, DiffOptions, SchemaDiff, SchemaDiffer};
pub use engine::{DiffOrchestrator, validate_chain, validate_pair};
pub use ephemeral::{DatabaseAdmin, EphemeralDatabase, MARKER, settle};
pub use error::{MigrateResult, MigrationError};
pub use exec::execute_file;
pub use fileset::FileSet;
pub use introspect::{CatalogIntrospector, SchemaSnapshot};
pub use sql::{MigrationSql, PostgresSqlGenerator};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::backend::{BackendKind, SourceFiles};
    pub use crate::diff::{DiffEngine, DiffOptions};
    pub use crate::engine::DiffOrchestrator;
    pub use crate::ephemeral::DatabaseAdmin;
    pub use crate::error::{MigrateResult, MigrationError};
    pub use crate::fileset::FileSet;
}
