//! The detection pipeline
//!
//! locate -> resolve HEAD -> fetch commit body -> (verify upstream) -> parse.
//! Every failure ends in [`RevisionReport::NoRevisionData`]; revision
//! display is best-effort and never interrupts the caller.

use std::path::Path;

use crate::cache::RevisionCache;
use crate::commit::{self, CommitMetadata};
use crate::error::{RevisionError, RevisionResult};
use crate::objects::{is_object_hash, ObjectStore};
use crate::remote::{RemoteApi, RemoteVerifier};
use crate::repo::{self, ResolvedRef};

/// Terminal outcome of a detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionReport {
    Revision(CommitMetadata),
    NoRevisionData,
}

/// Runs the pipeline against a working directory.
pub struct RevisionDetector<'a> {
    remote: Option<&'a dyn RemoteApi>,
}

impl<'a> RevisionDetector<'a> {
    /// `remote` is consulted when present; `None` keeps detection fully local.
    pub fn new(remote: Option<&'a dyn RemoteApi>) -> Self {
        Self { remote }
    }

    pub fn detect(&self, workdir: &Path, cache: &mut RevisionCache) -> RevisionReport {
        match self.try_detect(workdir, cache) {
            Ok(metadata) => {
                tracing::info!(
                    "Detected revision {} on {}",
                    metadata.hash,
                    metadata.branch.as_deref().unwrap_or("detached HEAD")
                );
                RevisionReport::Revision(metadata)
            }
            Err(e) if e.is_corruption() => {
                tracing::warn!("Disabling revision reporting: {}", e);
                RevisionReport::NoRevisionData
            }
            Err(e) => {
                tracing::info!("No revision data: {}", e);
                RevisionReport::NoRevisionData
            }
        }
    }

    fn try_detect(&self, workdir: &Path, cache: &mut RevisionCache) -> RevisionResult<CommitMetadata> {
        let handle = repo::locate_cached(workdir, cache)?;
        if let Some(common_dir) = handle.common_dir() {
            tracing::debug!("Linked worktree, shared metadata in {:?}", common_dir);
        }

        let ResolvedRef { branch, hash } = repo::resolve(&handle)?;

        // Corruption and transient read errors end the detection here,
        // without asking the remote
        let local_body = match ObjectStore::new(&handle).fetch_commit_body_cached(&hash, cache) {
            Ok(lines) => Some(lines),
            Err(RevisionError::NotFound) => None,
            Err(e) => return Err(e),
        };

        let mut is_remote_commit = false;
        let mut is_remote_branch = false;
        let mut remote_commit = None;
        if let Some(api) = self.remote.filter(|_| is_object_hash(&hash)) {
            let verifier = RemoteVerifier::new(api);
            let verification = verifier.verify_commit(&hash, local_body.is_some(), cache);
            is_remote_commit = verification.is_remote_commit;
            remote_commit = verification.remote_commit;

            if let Some(branch) = branch.as_deref().filter(|_| is_remote_commit) {
                is_remote_branch = verifier.verify_branch(&hash, branch, cache);
            }
        }

        let parsed = match local_body {
            Some(lines) => commit::parse(&lines)?,
            None => remote_commit.ok_or(RevisionError::NotFound)?,
        };

        Ok(CommitMetadata {
            hash,
            branch,
            author: parsed.author,
            committer: parsed.committer,
            message: parsed.message,
            is_remote_commit,
            is_remote_branch,
        })
    }
}
