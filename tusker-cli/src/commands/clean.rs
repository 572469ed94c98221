//! `tusker clean` command - Drop databases left behind by interrupted runs.

use tusker_migrate::OrphanCleaner;

use crate::commands::connect_admin;
use crate::config::Config;
use crate::error::CliResult;
use crate::output;

/// Run the clean command
pub async fn run(config: &Config) -> CliResult<()> {
    let admin = connect_admin(config).await?;
    let result = OrphanCleaner::new(&admin).clean().await;
    admin.close().await;

    let dropped = result?;
    if dropped.is_empty() {
        output::info("No orphaned databases found");
        return Ok(());
    }
    for name in &dropped {
        output::list_item(name);
    }
    output::success(&format!("Dropped {} database(s)", dropped.len()));
    Ok(())
}
