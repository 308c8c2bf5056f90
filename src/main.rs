use airlock::{
    Destination, DirectoryProbe, ExistingNames, NameValidator, OperationLog, RetryingProbe,
    UniquenessMode, UploadSetBuilder, scan_selection,
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::EnvFilter;

mod config;

use config::{AppConfig, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config + command ---
    let (cfg, command) = config::AppConfig::from_env_and_args()?;
    tracing::debug!("Starting airlock with config: {:?}", cfg);

    let log = Arc::new(OperationLog::from_level_name(&cfg.log_level));
    let outcome = run(&cfg, command, &log).await;

    for line in log.render() {
        eprintln!("{line}");
    }
    outcome
}

async fn run(cfg: &AppConfig, command: Command, log: &Arc<OperationLog>) -> Result<()> {
    match command {
        Command::Validate {
            name,
            existing,
            owned,
        } => {
            let mut names = ExistingNames::new(existing);
            if cfg.policy.uniqueness() == UniquenessMode::Ownable {
                names = names.with_owned(owned);
            }
            let report = NameValidator::new(cfg.policy).report(&name, &names);
            if report.is_valid() {
                log.info(format!("Bucket name {name} is valid"));
            } else {
                log.warning(format!("Bucket name {name} is not valid"));
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Reconcile {
            destination,
            paths,
            suffix,
            selected,
        } => reconcile(cfg, &destination, paths, suffix, selected, log).await?,
    }
    Ok(())
}

async fn reconcile(
    cfg: &AppConfig,
    destination: &str,
    paths: Vec<PathBuf>,
    suffix: String,
    selected: Vec<String>,
    log: &Arc<OperationLog>,
) -> Result<()> {
    let destination = Destination::parse(destination);

    let files = tokio::task::spawn_blocking(move || scan_selection(&paths))
        .await
        .context("selection scan panicked")?;
    let files = match files {
        Ok(files) => files,
        Err(err) => {
            log.emit_error(&err);
            return Err(err).context("scanning selection");
        }
    };
    log.debug(format!("{} files found in selection", files.len()));

    let (builder, bucket) = UploadSetBuilder::new(cfg.policy)
        .with_suffix(suffix)
        .with_selected(selected)
        .with_log(log.clone())
        .for_destination(&destination);

    // TODO: swap in an S3 HEAD-object probe once credentials can be passed to the shell.
    let probe = RetryingProbe::new(DirectoryProbe::new(&cfg.storage_dir));
    let set = builder
        .build(&bucket, &files, &probe)
        .await
        .with_context(|| format!("reconciling selection against bucket {bucket}"))?;

    for entry in set.conflicts() {
        log.warning(format!(
            "Object {} already exists in bucket {bucket} and would be overwritten by {}",
            entry.object,
            entry.file.display()
        ));
    }

    println!("{}", serde_json::to_string_pretty(&set)?);
    Ok(())
}
