//! Error types for the migration tooling.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tusker_postgres::PgError;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur while materializing and diffing schemas.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    File {
        /// Offending file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Database operation error.
    #[error("Database error: {0}")]
    Database(#[from] PgError),

    /// A SQL file failed against its target database.
    ///
    /// Deliberately carries no SQL text.
    #[error("Error executing {}: {class}: {message}", path.display())]
    SqlExecution {
        /// The file that failed.
        path: PathBuf,
        /// Driver error class.
        class: String,
        /// Driver error message.
        message: String,
    },

    /// A glob pattern could not be parsed or expanded.
    #[error("Invalid file pattern '{pattern}': {message}")]
    Pattern {
        /// The pattern as configured.
        pattern: String,
        /// What went wrong.
        message: String,
    },

    /// The request was malformed (same backend twice, unknown backend, ...).
    #[error("Usage error: {0}")]
    Usage(String),

    /// Ephemeral database lifecycle error.
    #[error("Ephemeral database error: {0}")]
    Ephemeral(String),

    /// Schema introspection failed.
    #[error("Introspection error: {0}")]
    Introspection(String),

    /// Safe mode rejected a destructive migration.
    #[error(
        "Unsafe migration: {} destructive statement(s) would be generated:\n{}",
        .0.len(),
        .0.join("\n")
    )]
    UnsafeMigration(Vec<String>),
}

impl MigrationError {
    /// Create a usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Create an ephemeral database error.
    pub fn ephemeral(msg: impl Into<String>) -> Self {
        Self::Ephemeral(msg.into())
    }

    /// Create an introspection error.
    pub fn introspection(msg: impl Into<String>) -> Self {
        Self::Introspection(msg.into())
    }

    /// Create a file read error.
    pub fn file(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::File {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Wrap a driver error raised while executing the given file.
    pub fn sql_execution(path: impl AsRef<Path>, err: &PgError) -> Self {
        Self::SqlExecution {
            path: path.as_ref().to_path_buf(),
            class: err.class(),
            message: err.message(),
        }
    }

    /// Create a pattern error.
    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Check if this error was raised before any database work started.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_execution_display_names_file_without_sql() {
        let err = MigrationError::sql_execution(
            "migrations/0001_init.sql",
            &PgError::connection("server closed the connection"),
        );
        let msg = err.to_string();
        assert!(msg.contains("migrations/0001_init.sql"));
        assert!(msg.contains("ConnectionError"));
        assert!(msg.contains("server closed the connection"));
    }

    #[test]
    fn test_unsafe_migration_lists_statements() {
        let err = MigrationError::UnsafeMigration(vec![
            "DROP TABLE \"public\".\"a\";".to_string(),
            "DROP TABLE \"public\".\"b\";".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("2 destructive statement(s)"));
        assert!(msg.contains("\"public\".\"b\""));
    }

    #[test]
    fn test_is_usage() {
        assert!(MigrationError::usage("same backend twice").is_usage());
        assert!(!MigrationError::ephemeral("boom").is_usage());
    }
}
