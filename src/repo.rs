//! Repository discovery and HEAD resolution
//!
//! Everything here reads the metadata directory directly; no `git`
//! executable is ever spawned.

mod locator;
mod refs;

use std::path::{Path, PathBuf};

pub use locator::{locate, locate_cached};
pub use refs::{resolve, ResolvedRef};

/// A located, valid repository metadata directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    /// The directory holding `HEAD` (the worktree-specific dir for linked worktrees)
    git_dir: PathBuf,
    /// Shared metadata directory named by a `commondir` file, if any
    common_dir: Option<PathBuf>,
}

impl RepositoryHandle {
    /// Open a handle on a metadata directory, following a `commondir` redirect.
    pub fn open(git_dir: PathBuf) -> Self {
        let common_dir = match std::fs::read_to_string(git_dir.join("commondir")) {
            Ok(contents) => {
                let common = git_dir.join(contents.trim());
                tracing::debug!("Following commondir to {:?}", common);
                Some(common)
            }
            Err(_) => None,
        };
        Self {
            git_dir,
            common_dir,
        }
    }

    /// Directory holding `HEAD`.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Directory all ref and object lookups go through.
    pub fn metadata_dir(&self) -> &Path {
        self.common_dir.as_deref().unwrap_or(&self.git_dir)
    }

    /// Shared metadata directory, for linked worktrees.
    pub fn common_dir(&self) -> Option<&Path> {
        self.common_dir.as_deref()
    }

    /// The `objects/` directory under the metadata dir.
    pub fn objects_dir(&self) -> PathBuf {
        self.metadata_dir().join("objects")
    }
}
