use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Configuration for git-revision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RevisionConfig {
    /// Whether to detect and report the revision at all
    #[serde(default = "defaults::show_revision")]
    pub show_revision: bool,
    /// Base URL of the verification API; remote checks are skipped when unset
    #[serde(default)]
    pub remote_api_base: Option<String>,
    /// Directory holding per-worktree session caches
    #[serde(default = "defaults::cache_dir")]
    pub cache_dir: PathBuf,
    /// Seconds a session cache stays valid after it was started
    #[serde(default = "defaults::session_ttl")]
    pub session_ttl: u64,
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            show_revision: defaults::show_revision(),
            remote_api_base: None,
            cache_dir: defaults::cache_dir(),
            session_ttl: defaults::session_ttl(),
        }
    }
}

impl RevisionConfig {
    /// Load configuration from `path` (or the default location) and
    /// environment variables. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => expand_tilde(path),
            None => Self::config_file_path()?,
        };
        tracing::debug!("loading git-revision config from {:?}", config_path);

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            tracing::debug!("no config file at {:?}, using defaults", config_path);
            Self::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: RevisionConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.cache_dir = expand_tilde(&config.cache_dir);

        Ok(config)
    }

    /// Apply `GIT_REVISION_*` environment overrides
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(show) = env::var("GIT_REVISION_SHOW") {
            self.show_revision = parse_bool(&show)
                .with_context(|| format!("Failed to parse GIT_REVISION_SHOW={:?}", show))?;
        }

        if let Ok(base) = env::var("GIT_REVISION_API_BASE") {
            self.remote_api_base = if base.is_empty() { None } else { Some(base) };
        }

        if let Ok(path) = env::var("GIT_REVISION_CACHE_DIR") {
            self.cache_dir = expand_tilde(&PathBuf::from(path));
        }

        if let Ok(ttl) = env::var("GIT_REVISION_SESSION_TTL") {
            self.session_ttl = ttl
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse GIT_REVISION_SESSION_TTL={:?}", ttl))?;
        }
        Ok(())
    }

    /// Get default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config/git-revision/config.yaml"))
            .context("Could not determine home directory for config file")
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

mod defaults {
    use std::path::PathBuf;

    pub(crate) fn show_revision() -> bool {
        true
    }

    pub(crate) fn session_ttl() -> u64 {
        600
    }

    pub(crate) fn cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("git-revision")
    }
}
