//! Tusker CLI - compare PostgreSQL schema files, migrations and live databases.
//!
//! This crate provides the `tusker` binary: configuration loading,
//! argument parsing and the `diff`, `check` and `clean` commands built on
//! top of `tusker-migrate`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;

use cli::{Cli, Command};
use config::Config;
use error::CliResult;

/// Run a parsed command line.
pub async fn run(cli: Cli) -> CliResult<()> {
    if let Command::Version = cli.command {
        return commands::version::run().await;
    }

    let config = Config::load(&cli.config)?;
    match cli.command {
        Command::Diff(args) => commands::diff::run(args, &config).await,
        Command::Check(args) => commands::check::run(args, &config).await,
        Command::Clean => commands::clean::run(&config).await,
        Command::Version => commands::version::run().await,
    }
}
