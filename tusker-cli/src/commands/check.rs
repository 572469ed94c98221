//! `tusker check` command - Verify that backends have the same structure.

use tusker_migrate::DiffOrchestrator;

use crate::cli::CheckArgs;
use crate::commands::connect_admin;
use crate::config::Config;
use crate::error::{CliError, CliResult};
use crate::output;

/// Run the check command
///
/// A difference is reported as [`CliError::SchemasDiffer`].
pub async fn run(args: CheckArgs, config: &Config) -> CliResult<()> {
    let kinds = args.backends()?;
    let options = args.flags.apply(config.diff_options());
    let sources = config.sources();

    let admin = connect_admin(config).await?;
    let result = DiffOrchestrator::new(&admin, sources)
        .with_options(options)
        .check(&kinds)
        .await;
    admin.close().await;

    match result? {
        Some((a, b)) => Err(CliError::SchemasDiffer(a, b)),
        None => {
            let names: Vec<_> = kinds.iter().map(|k| k.as_str()).collect();
            output::success(&format!("Schemas match: {}", names.join(" = ")));
            Ok(())
        }
    }
}
