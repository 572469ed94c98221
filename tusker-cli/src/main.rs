//! Tusker CLI - PostgreSQL migration management tool.

use clap::Parser;

use tusker_cli::cli::Cli;
use tusker_cli::{logging, output};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = tusker_cli::run(cli).await {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}
