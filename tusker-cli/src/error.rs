//! CLI error types and result alias.

use miette::Diagnostic;
use thiserror::Error;
use tusker_migrate::{BackendKind, MigrationError};
use tusker_postgres::PgError;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(tusker::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(tusker::config))]
    Config(String),

    /// Invalid combination of arguments
    #[error("Usage error: {0}")]
    #[diagnostic(code(tusker::usage))]
    Usage(String),

    /// Connection or driver error outside of file execution
    #[error("Database error: {0}")]
    #[diagnostic(code(tusker::database))]
    Database(#[from] PgError),

    /// Error from materializing or diffing backends
    #[error(transparent)]
    #[diagnostic(code(tusker::migrate))]
    Migrate(MigrationError),

    /// `check` found two adjacent backends that differ
    #[error("Schemas differ: {0} != {1}")]
    #[diagnostic(code(tusker::check), help("run `tusker diff` on the two backends to see the difference"))]
    SchemasDiffer(BackendKind, BackendKind),
}

impl From<MigrationError> for CliError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::Usage(msg) => CliError::Usage(msg),
            MigrationError::Database(err) => CliError::Database(err),
            other => CliError::Migrate(other),
        }
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_errors_stay_usage_errors() {
        let err: CliError = MigrationError::usage("cannot diff schema against itself").into();
        assert!(matches!(err, CliError::Usage(_)));
        assert_eq!(
            err.to_string(),
            "Usage error: cannot diff schema against itself"
        );
    }

    #[test]
    fn test_schemas_differ_message() {
        let err = CliError::SchemasDiffer(BackendKind::Migrations, BackendKind::Schema);
        assert_eq!(err.to_string(), "Schemas differ: migrations != schema");
    }

    #[test]
    fn test_migration_errors_are_transparent() {
        let err: CliError = MigrationError::introspection("boom").into();
        assert!(matches!(err, CliError::Migrate(_)));
        assert_eq!(
            err.to_string(),
            MigrationError::introspection("boom").to_string()
        );
    }
}
