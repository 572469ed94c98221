//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use tusker_migrate::{BackendKind, DiffOptions, validate_chain, validate_pair};

use crate::config::CONFIG_FILE_NAME;
use crate::error::{CliError, CliResult};

/// Tusker - PostgreSQL migration management tool
#[derive(Parser, Debug)]
#[command(name = "tusker")]
#[command(version)]
#[command(about = "Tusker - PostgreSQL migration management tool", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "TUSKER_CONFIG", default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the SQL that turns one backend into another
    Diff(DiffArgs),

    /// Check that backends have the same structure
    Check(CheckArgs),

    /// Drop databases left behind by interrupted runs
    Clean,

    /// Display version information
    Version,
}

// =============================================================================
// Shared flags
// =============================================================================

/// Flags that tune the generated SQL
#[derive(Args, Debug, Default)]
pub struct DiffFlags {
    /// Include GRANT/REVOKE statements
    #[arg(long, overrides_with = "without_privileges")]
    pub with_privileges: bool,

    /// Ignore privileges
    #[arg(long, overrides_with = "with_privileges")]
    pub without_privileges: bool,

    /// Refuse to generate destructive statements
    #[arg(long, overrides_with = "unsafe_")]
    pub safe: bool,

    /// Allow destructive statements
    #[arg(long = "unsafe", overrides_with = "safe")]
    pub unsafe_: bool,
}

impl DiffFlags {
    /// Apply the flags on top of the configured options.
    pub fn apply(&self, mut options: DiffOptions) -> DiffOptions {
        if let Some(privileges) = pick(self.with_privileges, self.without_privileges) {
            options = options.privileges(privileges);
        }
        if let Some(safe) = pick(self.safe, self.unsafe_) {
            options = options.safe(safe);
        }
        options
    }
}

fn pick(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

// =============================================================================
// Diff Command
// =============================================================================

/// Arguments for the `diff` command
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Backend to diff from (schema, migrations or database)
    #[arg(default_value = "migrations")]
    pub from: String,

    /// Backend to diff to (schema, migrations or database)
    #[arg(default_value = "schema")]
    pub to: String,

    /// Swap source and target
    #[arg(short, long)]
    pub reverse: bool,

    #[command(flatten)]
    pub flags: DiffFlags,
}

impl DiffArgs {
    /// The `(from, to)` pair after `--reverse`, rejected if both are the same.
    pub fn backends(&self) -> CliResult<(BackendKind, BackendKind)> {
        let from: BackendKind = self.from.parse()?;
        let to: BackendKind = self.to.parse()?;
        let (from, to) = if self.reverse { (to, from) } else { (from, to) };
        validate_pair(from, to)?;
        Ok((from, to))
    }
}

// =============================================================================
// Check Command
// =============================================================================

/// Arguments for the `check` command
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Backends to compare in order, or `all` (default: migrations schema)
    pub backends: Vec<String>,

    #[command(flatten)]
    pub flags: DiffFlags,
}

impl CheckArgs {
    /// The backends to compare, in order.
    pub fn backends(&self) -> CliResult<Vec<BackendKind>> {
        let kinds = match self.backends.as_slice() {
            [] => vec![BackendKind::Migrations, BackendKind::Schema],
            [all] if all == "all" => BackendKind::ALL.to_vec(),
            names if names.iter().any(|n| n == "all") => {
                return Err(CliError::Usage(
                    "'all' cannot be combined with other backends".to_string(),
                ));
            }
            names => names
                .iter()
                .map(|name| name.parse::<BackendKind>())
                .collect::<Result<Vec<_>, _>>()?,
        };
        validate_chain(&kinds)?;
        Ok(kinds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tusker").chain(args.iter().copied())).unwrap()
    }

    fn diff_args(args: &[&str]) -> DiffArgs {
        match parse(args).command {
            Command::Diff(args) => args,
            other => panic!("expected diff, got {other:?}"),
        }
    }

    fn check_args(args: &[&str]) -> CheckArgs {
        match parse(args).command {
            Command::Check(args) => args,
            other => panic!("expected check, got {other:?}"),
        }
    }

    #[test]
    fn test_diff_defaults() {
        let args = diff_args(&["diff"]);
        assert_eq!(
            args.backends().unwrap(),
            (BackendKind::Migrations, BackendKind::Schema)
        );
    }

    #[test]
    fn test_diff_reverse_swaps() {
        let args = diff_args(&["diff", "schema", "database", "--reverse"]);
        assert_eq!(
            args.backends().unwrap(),
            (BackendKind::Database, BackendKind::Schema)
        );
    }

    #[test]
    fn test_diff_rejects_same_backend() {
        let args = diff_args(&["diff", "schema", "schema"]);
        assert!(matches!(args.backends(), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_diff_rejects_unknown_backend() {
        let args = diff_args(&["diff", "schemas", "database"]);
        let err = args.backends().unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
        assert!(err.to_string().contains("schemas"));
    }

    #[test]
    fn test_check_defaults_and_all() {
        assert_eq!(
            check_args(&["check"]).backends().unwrap(),
            vec![BackendKind::Migrations, BackendKind::Schema]
        );
        assert_eq!(
            check_args(&["check", "all"]).backends().unwrap(),
            BackendKind::ALL.to_vec()
        );
    }

    #[test]
    fn test_check_rejects_single_backend() {
        let args = check_args(&["check", "schema"]);
        assert!(matches!(args.backends(), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_check_rejects_all_with_others() {
        let args = check_args(&["check", "all", "schema"]);
        assert!(matches!(args.backends(), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_flags_override_config() {
        let configured = DiffOptions::new().safe(true).privileges(true);

        let args = diff_args(&["diff", "--unsafe", "--without-privileges"]);
        let options = args.flags.apply(configured.clone());
        assert!(!options.safe);
        assert!(!options.privileges);

        let args = diff_args(&["diff"]);
        let options = args.flags.apply(configured);
        assert!(options.safe);
        assert!(options.privileges);
    }

    #[test]
    fn test_last_flag_wins() {
        let args = diff_args(&["diff", "--safe", "--unsafe"]);
        assert!(!args.flags.apply(DiffOptions::new()).safe);

        let args = diff_args(&["diff", "--unsafe", "--safe"]);
        assert!(args.flags.apply(DiffOptions::new()).safe);
    }

    #[test]
    fn test_global_options() {
        let cli = parse(&["--verbose", "--config", "other.toml", "clean"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert!(matches!(cli.command, Command::Clean));
    }
}
