//! `tusker diff` command - Print the SQL that turns one backend into another.

use tusker_migrate::DiffOrchestrator;

use crate::cli::DiffArgs;
use crate::commands::connect_admin;
use crate::config::Config;
use crate::error::CliResult;
use crate::output;

/// Run the diff command
pub async fn run(args: DiffArgs, config: &Config) -> CliResult<()> {
    let (from, to) = args.backends()?;
    let options = args.flags.apply(config.diff_options());
    let sources = config.sources();

    let admin = connect_admin(config).await?;
    let result = DiffOrchestrator::new(&admin, sources)
        .with_options(options)
        .diff(from, to)
        .await;
    admin.close().await;

    output::sql(&result?);
    Ok(())
}
