use airlock::{NamingPolicy, UniquenessMode};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{env, path::PathBuf, str::FromStr};

/// Settings of the command-line shell.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage_dir: PathBuf,
    pub log_level: String,
    pub policy: NamingPolicy,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Validate bucket names and reconcile uploads against a bucket")]
pub struct Args {
    /// Directory mirroring the storage backend, one subdirectory per bucket
    /// (overrides AIRLOCK_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Operation log level: debug, info, warning or error (overrides AIRLOCK_LOG_LEVEL)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Minimum bucket name length (overrides AIRLOCK_NAME_MIN_LEN)
    #[arg(long)]
    pub min_len: Option<usize>,

    /// Maximum bucket name length (overrides AIRLOCK_NAME_MAX_LEN)
    #[arg(long)]
    pub max_len: Option<usize>,

    /// Allow reusing bucket names owned by the caller
    #[arg(long)]
    pub ownable: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a bucket name against the naming rules
    Validate {
        name: String,
        /// Bucket names already in use
        #[arg(long = "existing")]
        existing: Vec<String>,
        /// Bucket names in use that belong to the caller
        #[arg(long = "owned")]
        owned: Vec<String>,
    },
    /// Map local files to object keys and report which already exist
    Reconcile {
        /// Destination as `bucket` or `bucket/prefix`
        destination: String,
        /// Files and directories to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Suffix appended to every object key
        #[arg(long, default_value = "")]
        suffix: String,
        /// Object keys already part of the selection
        #[arg(long = "selected")]
        selected: Vec<String>,
    },
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command to run.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_storage = env::var("AIRLOCK_STORAGE_DIR").unwrap_or_else(|_| "./data/buckets".into());
        let env_level = env::var("AIRLOCK_LOG_LEVEL").unwrap_or_else(|_| "info".into());
        let env_min = env_number("AIRLOCK_NAME_MIN_LEN", airlock::services::name_validator::NAME_MIN_LEN)?;
        let env_max = env_number("AIRLOCK_NAME_MAX_LEN", airlock::services::name_validator::NAME_MAX_LEN)?;

        // --- Merge ---
        let uniqueness = if args.ownable {
            UniquenessMode::Ownable
        } else {
            UniquenessMode::Strict
        };
        let policy = NamingPolicy::new(
            args.min_len.unwrap_or(env_min),
            args.max_len.unwrap_or(env_max),
            uniqueness,
        )
        .context("building naming policy")?;

        let cfg = Self {
            storage_dir: args.storage_dir.unwrap_or_else(|| PathBuf::from(env_storage)),
            log_level: args.log_level.unwrap_or(env_level),
            policy,
        };

        Ok((cfg, args.command))
    }
}

fn env_number<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {name} value `{value}`")),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {name}")),
    }
}
