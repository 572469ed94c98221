//! CLI command implementations.

pub mod check;
pub mod clean;
pub mod diff;
pub mod version;

use tracing::info;
use tusker_migrate::DatabaseAdmin;

use crate::config::Config;
use crate::error::CliResult;

/// Open the administrative connection every database command starts with.
pub(crate) async fn connect_admin(config: &Config) -> CliResult<DatabaseAdmin> {
    let pg = config.pg_config()?;
    info!(target_db = %pg.describe(), "Connecting");
    Ok(DatabaseAdmin::connect(&pg).await?)
}
