//! Error types for PostgreSQL operations.

use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Postgres(e) => e.as_db_error().is_none(),
            Self::Config(_) => false,
        }
    }

    /// The SQLSTATE code reported by the server, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Postgres(e) => e.code().map(|c| c.code()),
            _ => None,
        }
    }

    /// A short classification of the error, suitable for reports.
    ///
    /// Server errors are classified by severity and SQLSTATE
    /// (`ERROR 42601`), everything else by its kind.
    pub fn class(&self) -> String {
        match self {
            Self::Postgres(e) => match e.as_db_error() {
                Some(db) => format!("{} {}", db.severity(), db.code().code()),
                None => "ClientError".to_string(),
            },
            Self::Config(_) => "ConfigError".to_string(),
            Self::Connection(_) => "ConnectionError".to_string(),
        }
    }

    /// The bare message of the error, without the class prefix.
    ///
    /// For server errors this includes the detail and hint lines when the
    /// server sent them.
    pub fn message(&self) -> String {
        match self {
            Self::Postgres(e) => match e.as_db_error() {
                Some(db) => {
                    let mut message = db.message().to_string();
                    if let Some(detail) = db.detail() {
                        message.push_str("\nDETAIL: ");
                        message.push_str(detail);
                    }
                    if let Some(hint) = db.hint() {
                        message.push_str("\nHINT: ");
                        message.push_str(hint);
                    }
                    message
                }
                None => e.to_string(),
            },
            Self::Config(msg) | Self::Connection(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PgError::config("invalid URL");
        assert!(matches!(err, PgError::Config(_)));
        assert!(!err.is_connection_error());

        let err = PgError::connection("connection refused");
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_class_and_message() {
        let err = PgError::connection("connection refused");
        assert_eq!(err.class(), "ConnectionError");
        assert_eq!(err.message(), "connection refused");
        assert_eq!(err.sqlstate(), None);
        assert_eq!(err.to_string(), "connection error: connection refused");
    }
}
