//! CLI configuration handling.
//!
//! Configuration lives in `tusker.toml`:
//!
//! ```toml
//! [database]
//! url = "postgresql://${PGUSER}@localhost/app"
//! schema = "public"
//!
//! [schema]
//! filename = ["schema/*.sql"]
//!
//! [migrations]
//! filename = ["migrations/*.sql"]
//!
//! [migra]
//! safe = false
//! privileges = false
//! ```
//!
//! Every string value may reference environment variables as `${NAME}`.

use regex_lite::{Captures, Regex};
use serde::Deserialize;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

use tusker_migrate::backend::{DEFAULT_MIGRATIONS_PATTERN, DEFAULT_SCHEMA_PATTERN};
use tusker_migrate::{DiffOptions, FileSet, SourceFiles};
use tusker_postgres::PgConfig;

use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "tusker.toml";

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid interpolation pattern")
});

/// Tusker configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Connection parameters
    pub database: DatabaseConfig,

    /// Schema files
    pub schema: SchemaConfig,

    /// Migration files
    pub migrations: MigrationsConfig,

    /// Diff options
    pub migra: MigraConfig,
}

/// Database connection parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection URL or DSN
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Base name for ephemeral databases and name of the live database
    pub dbname: Option<String>,
    /// Restrict diffs to this schema
    pub schema: Option<String>,
}

/// One pattern or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Filenames {
    One(String),
    Many(Vec<String>),
}

impl Filenames {
    fn to_vec(&self) -> Vec<String> {
        match self {
            Filenames::One(name) => vec![name.clone()],
            Filenames::Many(names) => names.clone(),
        }
    }
}

/// `[schema]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaConfig {
    pub filename: Option<Filenames>,
}

/// `[migrations]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationsConfig {
    pub filename: Option<Filenames>,
    /// Legacy single directory, superseded by `filename`
    pub directory: Option<String>,
}

/// `[migra]` section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigraConfig {
    pub safe: bool,
    pub privileges: bool,
}

impl Config {
    /// Load configuration from a file, or the defaults if it does not exist.
    pub fn load(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration text, interpolating environment variables.
    pub fn parse(content: &str) -> CliResult<Self> {
        Self::parse_with(content, |name| std::env::var(name).ok())
    }

    /// Parse configuration text, looking variables up with `lookup`.
    pub fn parse_with<F>(content: &str, lookup: F) -> CliResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut value: toml::Value = toml::from_str(content)?;
        interpolate(&mut value, "", &lookup)?;
        let config: Config = value.try_into()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        match (&self.migrations.filename, &self.migrations.directory) {
            (Some(_), Some(_)) => Err(CliError::Config(
                "migrations.directory and migrations.filename are mutually exclusive".to_string(),
            )),
            (None, Some(directory)) => {
                warn!(
                    directory = %directory,
                    "migrations.directory is deprecated, use migrations.filename = [\"{}/*.sql\"]",
                    directory.trim_end_matches('/')
                );
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Connection parameters for the configured database.
    pub fn pg_config(&self) -> CliResult<PgConfig> {
        let db = &self.database;
        let mut builder = PgConfig::builder().application_name("tusker");
        if let Some(url) = &db.url {
            builder = builder.url(url);
        }
        if let Some(host) = &db.host {
            builder = builder.host(host);
        }
        if let Some(port) = db.port {
            builder = builder.port(port);
        }
        if let Some(user) = &db.user {
            builder = builder.user(user);
        }
        if let Some(password) = &db.password {
            builder = builder.password(password);
        }
        if let Some(dbname) = &db.dbname {
            builder = builder.dbname(dbname);
        }
        if let Some(schema) = &db.schema {
            builder = builder.schema(schema);
        }
        builder
            .build()
            .map_err(|e| CliError::Config(format!("database: {}", e)))
    }

    /// Schema and migration file sets.
    pub fn sources(&self) -> SourceFiles {
        let schema = match &self.schema.filename {
            Some(names) => FileSet::new(names.to_vec()),
            None => FileSet::new([DEFAULT_SCHEMA_PATTERN]),
        };
        let migrations = match (&self.migrations.filename, &self.migrations.directory) {
            (Some(names), _) => FileSet::new(names.to_vec()),
            (None, Some(directory)) => FileSet::from_directory(directory),
            (None, None) => FileSet::new([DEFAULT_MIGRATIONS_PATTERN]),
        };
        SourceFiles::new(schema, migrations)
    }

    /// Diff options as configured, before command line overrides.
    pub fn diff_options(&self) -> DiffOptions {
        let options = DiffOptions::new()
            .safe(self.migra.safe)
            .privileges(self.migra.privileges);
        match &self.database.schema {
            Some(schema) => options.schema(schema),
            None => options,
        }
    }
}

/// Replace `${NAME}` in every string of `value`; `key` is the dotted path
/// used in error messages.
fn interpolate<F>(value: &mut toml::Value, key: &str, lookup: &F) -> CliResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        toml::Value::String(text) => {
            let mut missing = None;
            let replaced = ENV_VAR.replace_all(text, |caps: &Captures<'_>| {
                let name = &caps[1];
                lookup(name).unwrap_or_else(|| {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                })
            });
            if let Some(name) = missing {
                return Err(CliError::Config(format!(
                    "environment variable '{}' referenced by '{}' is not set",
                    name, key
                )));
            }
            *text = replaced.into_owned();
        }
        toml::Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                interpolate(item, &format!("{}[{}]", key, i), lookup)?;
            }
        }
        toml::Value::Table(table) => {
            for (name, item) in table.iter_mut() {
                let path = if key.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", key, name)
                };
                interpolate(item, &path, lookup)?;
            }
        }
        _ => {}
    }
    Ok(())
}
