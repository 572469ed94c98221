//! `tusker version` command - Display version information.

use crate::error::CliResult;
use crate::output::kv;

/// Package version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the version command
pub async fn run() -> CliResult<()> {
    println!("tusker {}", VERSION);

    #[cfg(debug_assertions)]
    let build_mode = "debug";
    #[cfg(not(debug_assertions))]
    let build_mode = "release";

    kv("Version", VERSION);
    kv("Build", build_mode);
    Ok(())
}
