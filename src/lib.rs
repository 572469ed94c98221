//! # Tusker
//!
//! Keep PostgreSQL schema files, migrations and live databases in sync.
//!
//! Tusker applies your schema files and your migrations to two throwaway
//! databases, compares them (or either of them with the live database) and
//! prints the SQL needed to get from one state to the other.
//!
//! - [`migrate`] materializes backends and diffs them
//! - [`postgres`] holds connection parameters and the connection handle
//!
//! The `tusker` binary lives in the `tusker-cli` crate.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tusker::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), MigrationError> {
//!     let config = PgConfig::from_url("postgresql://localhost/app")?;
//!     let admin = DatabaseAdmin::connect(&config).await?;
//!
//!     let result = DiffOrchestrator::new(&admin, SourceFiles::default())
//!         .check(&BackendKind::ALL)
//!         .await;
//!     admin.close().await;
//!
//!     if let Some((a, b)) = result? {
//!         eprintln!("Schemas differ: {a} != {b}");
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Ephemeral databases, backends and schema diffing.
pub mod migrate {
    pub use tusker_migrate::*;
}

/// PostgreSQL connection handling.
pub mod postgres {
    pub use tusker_postgres::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tusker_migrate::prelude::*;
    pub use tusker_migrate::{MARKER, OrphanCleaner};
    pub use tusker_postgres::{PgConfig, PgConnection, PgError};
}

pub use tusker_migrate::{
    BackendKind, DatabaseAdmin, DiffOptions, DiffOrchestrator, FileSet, MigrationError,
    SourceFiles,
};
pub use tusker_postgres::PgConfig;
