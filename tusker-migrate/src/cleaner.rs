//! Removal of ephemeral databases left behind by interrupted runs.

use tracing::info;

use crate::ephemeral::{DatabaseAdmin, MARKER};
use crate::error::{MigrateResult, MigrationError};

/// Databases whose shared description is exactly `$1`.
const MARKED_DATABASES: &str = "\
    SELECT db.datname \
    FROM pg_database db \
    JOIN pg_shdescription dsc \
      ON dsc.objoid = db.oid AND dsc.classoid = 'pg_database'::regclass \
    WHERE dsc.description = $1 \
    ORDER BY db.datname";

/// Finds and drops databases tagged with [`MARKER`].
#[derive(Debug)]
pub struct OrphanCleaner<'a> {
    admin: &'a DatabaseAdmin,
}

impl<'a> OrphanCleaner<'a> {
    /// Create a cleaner on top of an administrative connection.
    pub fn new(admin: &'a DatabaseAdmin) -> Self {
        Self { admin }
    }

    /// Names of databases carrying the marker.
    pub async fn find(&self) -> MigrateResult<Vec<String>> {
        let rows = self
            .admin
            .connection()
            .query(MARKED_DATABASES, &[&MARKER])
            .await?;

        rows.iter()
            .map(|row| {
                row.try_get::<_, String>("datname")
                    .map_err(|e| MigrationError::introspection(e.to_string()))
            })
            .collect()
    }

    /// Drop every marked database and return the names dropped.
    ///
    /// Names are quoted, so databases with unusual characters in their
    /// names are dropped like any other.
    pub async fn clean(&self) -> MigrateResult<Vec<String>> {
        let names = self.find().await?;
        for name in &names {
            info!(database = %name, "Dropping orphaned database");
            self.admin.drop_database(name).await?;
        }
        Ok(names)
    }
}
