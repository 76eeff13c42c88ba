#![deny(clippy::mod_module_files)]
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod cache;
mod commit;
mod config;
mod detect;
mod error;
#[cfg(test)]
mod fixtures;
mod objects;
mod remote;
mod repo;
mod storage;

use cache::RevisionCache;
use config::RevisionConfig;
use detect::{RevisionDetector, RevisionReport};
use remote::{HttpRemoteApi, RemoteApi};
use storage::{FilesystemStore, RevisionEntries, RevisionStore};

/// Report the checked-out git revision by reading repository storage directly
#[derive(Parser, Debug)]
#[command(name = "git-revision", version, about)]
struct Cli {
    /// Working directory to inspect
    #[arg(short = 'C', long = "repo", default_value = ".")]
    repo: PathBuf,

    /// Configuration file (default: ~/.config/git-revision/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also record the report in this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Rendering of the report on stdout
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Never contact the verification API
    #[arg(long)]
    offline: bool,

    /// Use a throwaway in-memory session cache
    #[arg(long)]
    no_cache: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RevisionConfig::load(cli.config.as_deref())?;

    let report = if config.show_revision {
        run_detection(&cli, &config)
    } else {
        tracing::debug!("Revision display disabled by configuration");
        RevisionReport::NoRevisionData
    };

    if let Some(output) = &cli.output {
        let store = FilesystemStore::new(output);
        log_revision_change(&store, &report);
        store.write_report(&report)?;
    }

    let entries = RevisionEntries::from(&report);
    let rendered = match cli.format {
        Format::Json => {
            serde_json::to_string_pretty(&entries).context("Failed to render report")? + "\n"
        }
        Format::Yaml => serde_yaml::to_string(&entries).context("Failed to render report")?,
    };
    print!("{}", rendered);

    Ok(())
}

fn run_detection(cli: &Cli, config: &RevisionConfig) -> RevisionReport {
    let remote = match (&config.remote_api_base, cli.offline) {
        (Some(base), false) => match HttpRemoteApi::new(base.clone()) {
            Ok(api) => Some(api),
            Err(e) => {
                tracing::warn!("Continuing without remote verification: {:#}", e);
                None
            }
        },
        _ => None,
    };
    let detector = RevisionDetector::new(remote.as_ref().map(|api| api as &dyn RemoteApi));

    if cli.no_cache {
        let mut cache = RevisionCache::new();
        return detector.detect(&cli.repo, &mut cache);
    }

    let session_path = RevisionCache::session_path(&config.cache_dir, &cli.repo);
    let session_ttl = Duration::from_secs(config.session_ttl);
    // A damaged session file is discarded rather than blocking detection
    let mut cache = RevisionCache::load(&session_path, session_ttl).unwrap_or_else(|e| {
        tracing::warn!("Starting a fresh session cache: {:#}", e);
        RevisionCache::new()
    });

    let report = detector.detect(&cli.repo, &mut cache);

    if let Err(e) = cache.save(&session_path) {
        tracing::warn!("Failed to save session cache: {:#}", e);
    }
    report
}

/// Note when the recorded report names a different commit than this run.
fn log_revision_change(store: &dyn RevisionStore, report: &RevisionReport) {
    let previous = match store.read_report() {
        Ok(Some(entries)) => entries.details.map(|details| details.git_commit_hash),
        Ok(None) => return,
        Err(e) => {
            tracing::warn!("Ignoring unreadable previous report: {:#}", e);
            return;
        }
    };
    let current = match report {
        RevisionReport::Revision(metadata) => Some(metadata.hash.as_str()),
        RevisionReport::NoRevisionData => None,
    };
    if previous.as_deref() != current {
        tracing::info!(
            "Revision changed from {} to {}",
            previous.as_deref().unwrap_or("none"),
            current.unwrap_or("none")
        );
    }
}
