use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex digits of the working directory hash used in session file names
const SESSION_KEY_LEN: usize = 16;

/// Memoized repository location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CachedLocation {
    /// `None` when the directory is not a repository
    pub git_dir: Option<PathBuf>,
}

/// Memoized outcome of a commit body lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CachedBody {
    Found { lines: Vec<String> },
    NotFound,
    Corrupt { reason: String },
}

/// Definitive remote verification outcomes for one commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<bool>,
}

/// Per-session memo of expensive detection results, keyed by commit hash
///
/// A session lasts for a fixed time after it starts; a persisted session
/// older than that is discarded on load, negative outcomes included.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RevisionCache {
    /// Session start (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<CachedLocation>,

    /// commit hash -> body lookup outcome
    #[serde(default)]
    bodies: BTreeMap<String, CachedBody>,

    /// commit hash -> remote verification outcomes
    #[serde(default)]
    remote: BTreeMap<String, RemoteStatus>,
}

impl RevisionCache {
    /// Start a new, empty session
    pub fn new() -> Self {
        Self {
            created_at: Some(Utc::now().to_rfc3339()),
            ..Self::default()
        }
    }

    /// Session file for `workdir` inside `cache_dir`.
    pub fn session_path(cache_dir: &Path, workdir: &Path) -> PathBuf {
        let canonical = workdir
            .canonicalize()
            .unwrap_or_else(|_| workdir.to_path_buf());
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        let digest = hex::encode(hasher.finalize());
        cache_dir.join(format!("{}.yaml", &digest[..SESSION_KEY_LEN]))
    }

    /// Load the session stored at `path`, or start a new one when the file
    /// is missing or the stored session began more than `ttl` ago.
    pub fn load(path: &Path, ttl: Duration) -> Result<Self> {
        tracing::debug!("Loading revision cache from {:?}", path);
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read revision cache from {:?}", path))?;

        let cache: RevisionCache = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse revision cache from {:?}", path))?;

        if cache.is_expired(ttl, Utc::now()) {
            tracing::debug!("Session in {:?} has expired, starting a new one", path);
            return Ok(Self::new());
        }
        Ok(cache)
    }

    /// Whether the session started at least `ttl` before `now`.
    ///
    /// A missing or unreadable start time, or one in the future, counts as expired.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let started = match self.created_at.as_deref().map(DateTime::parse_from_rfc3339) {
            Some(Ok(started)) => started.with_timezone(&Utc),
            _ => return true,
        };
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        started > now || now - started >= ttl
    }

    /// Save cache to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize revision cache")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write revision cache to {:?}", path))?;

        Ok(())
    }

    pub fn location(&self) -> Option<&CachedLocation> {
        self.location.as_ref()
    }

    pub fn set_location(&mut self, location: CachedLocation) {
        self.location = Some(location);
    }

    pub fn body(&self, hash: &str) -> Option<&CachedBody> {
        self.bodies.get(hash)
    }

    pub fn insert_body(&mut self, hash: &str, body: CachedBody) {
        self.bodies.insert(hash.to_string(), body);
    }

    /// Cached "commit exists upstream" outcome
    pub fn remote_commit(&self, hash: &str) -> Option<bool> {
        self.remote.get(hash).and_then(|status| status.commit)
    }

    pub fn set_remote_commit(&mut self, hash: &str, exists: bool) {
        self.remote.entry(hash.to_string()).or_default().commit = Some(exists);
    }

    /// Cached "branch exists upstream" outcome, recorded under the commit hash
    pub fn remote_branch(&self, hash: &str) -> Option<bool> {
        self.remote.get(hash).and_then(|status| status.branch)
    }

    pub fn set_remote_branch(&mut self, hash: &str, exists: bool) {
        self.remote.entry(hash.to_string()).or_default().branch = Some(exists);
    }

    /// Check if nothing has been memoized yet
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.location.is_none() && self.bodies.is_empty() && self.remote.is_empty()
    }
}
