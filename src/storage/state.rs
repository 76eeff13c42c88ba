use serde::{Deserialize, Serialize};

use crate::commit::{CommitMetadata, Identity};
use crate::detect::RevisionReport;

/// A report flattened into its well-known keys.
///
/// With no revision data only `git_revision: false` is present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RevisionEntries {
    pub git_revision: bool,

    #[serde(flatten)]
    pub details: Option<RevisionDetails>,
}

/// Entries present only when a revision was detected.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RevisionDetails {
    pub git_commit_hash: String,
    /// `null` for a detached HEAD
    pub git_branch: Option<String>,
    pub git_message: String,
    pub git_author: Identity,
    pub git_committer: Identity,
    pub git_is_remote_commit: bool,
    pub git_is_remote_branch: bool,
}

impl From<&RevisionReport> for RevisionEntries {
    fn from(report: &RevisionReport) -> Self {
        match report {
            RevisionReport::Revision(metadata) => RevisionEntries {
                git_revision: true,
                details: Some(RevisionDetails::from(metadata)),
            },
            RevisionReport::NoRevisionData => RevisionEntries {
                git_revision: false,
                details: None,
            },
        }
    }
}

impl From<&CommitMetadata> for RevisionDetails {
    fn from(metadata: &CommitMetadata) -> Self {
        RevisionDetails {
            git_commit_hash: metadata.hash.clone(),
            git_branch: metadata.branch.clone(),
            git_message: metadata.message.clone(),
            git_author: metadata.author.clone(),
            git_committer: metadata.committer.clone(),
            git_is_remote_commit: metadata.is_remote_commit,
            git_is_remote_branch: metadata.is_remote_branch,
        }
    }
}
