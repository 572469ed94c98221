//! Execution of SQL files against a connection.

use std::path::Path;

use tokio_postgres::GenericClient;
use tracing::debug;
use tusker_postgres::PgError;

use crate::error::{MigrateResult, MigrationError};

/// Read a SQL file, returning `None` when it holds nothing but whitespace.
pub async fn read_sql(path: &Path) -> MigrateResult<Option<String>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| MigrationError::file(path, e))?;

    let trimmed = contents.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

/// Run the statements of one file.
///
/// The text goes through the simple query protocol, so nothing in it is
/// treated as a placeholder. Failures name the file and carry the driver's
/// error class and message, never the SQL itself.
pub async fn execute_file<C>(client: &C, path: &Path) -> MigrateResult<()>
where
    C: GenericClient + Sync,
{
    let Some(sql) = read_sql(path).await? else {
        debug!(file = %path.display(), "Skipping empty file");
        return Ok(());
    };

    debug!(file = %path.display(), bytes = sql.len(), "Executing file");
    client
        .batch_execute(&sql)
        .await
        .map_err(|e| MigrationError::sql_execution(path, &PgError::from(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_sql_trims() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.sql");
        fs::write(&path, "\n  CREATE TABLE t (id int);\n\n").unwrap();

        let sql = read_sql(&path).await.unwrap();
        assert_eq!(sql.as_deref(), Some("CREATE TABLE t (id int);"));
    }

    #[tokio::test]
    async fn test_read_sql_whitespace_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.sql");
        fs::write(&path, " \n\t\n").unwrap();

        assert!(read_sql(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_sql_keeps_percent_signs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("like.sql");
        fs::write(&path, "SELECT 'a%b' LIKE '%b';").unwrap();

        let sql = read_sql(&path).await.unwrap().unwrap();
        assert_eq!(sql, "SELECT 'a%b' LIKE '%b';");
    }

    #[tokio::test]
    async fn test_read_sql_missing_file() {
        let err = read_sql(Path::new("/nonexistent/tusker/a.sql")).await.unwrap_err();
        assert!(matches!(err, MigrationError::File { .. }));
        assert!(err.to_string().contains("/nonexistent/tusker/a.sql"));
    }
}
