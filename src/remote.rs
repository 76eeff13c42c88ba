//! Upstream verification of the detected revision
//!
//! Local data may be stale or missing (shallow clones, exported trees), so
//! the commit and branch are optionally checked against a read-only API.
//! Only definitive answers are cached; an unreachable API leaves the
//! session cache untouched.

mod http;

use serde::Deserialize;

use crate::cache::RevisionCache;
use crate::commit::{Identity, ParsedCommit};

pub use http::HttpRemoteApi;

/// Outcome of one remote lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteLookup<T> {
    /// Definitive: the resource exists
    Exists(T),
    /// Definitive: the resource does not exist
    Missing,
    /// The API could not be reached or did not answer usefully
    Unavailable,
}

/// Read-only verification API.
pub trait RemoteApi {
    /// `GET /api/commit/<hash>/`, returning the response body on success.
    fn fetch_commit(&self, hash: &str) -> RemoteLookup<String>;

    /// `GET /api/tree/<branch>/`
    fn branch_exists(&self, branch: &str) -> RemoteLookup<()>;
}

/// Commit body returned by the commit endpoint
#[derive(Debug, Deserialize)]
struct RemoteCommit {
    author: Identity,
    committer: Identity,
    message: String,
}

/// Result of [`RemoteVerifier::verify_commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitVerification {
    pub is_remote_commit: bool,
    /// Metadata supplied by the API when no local body was available
    pub remote_commit: Option<ParsedCommit>,
}

/// Checks commits and branches against a [`RemoteApi`], memoizing definitive answers.
pub struct RemoteVerifier<'a> {
    api: &'a dyn RemoteApi,
}

impl<'a> RemoteVerifier<'a> {
    pub fn new(api: &'a dyn RemoteApi) -> Self {
        Self { api }
    }

    /// Does `hash` exist upstream?
    ///
    /// When `local_body_present` is false the cached status is not used:
    /// the API is asked again and, if the commit exists, its response
    /// supplies the commit metadata.
    pub fn verify_commit(
        &self,
        hash: &str,
        local_body_present: bool,
        cache: &mut RevisionCache,
    ) -> CommitVerification {
        if let Some(cached) = cache.remote_commit(hash).filter(|_| local_body_present) {
            tracing::debug!("Using cached remote commit status for {}: {}", hash, cached);
            return CommitVerification {
                is_remote_commit: cached,
                remote_commit: None,
            };
        }

        match self.api.fetch_commit(hash) {
            RemoteLookup::Exists(body) => {
                cache.set_remote_commit(hash, true);
                let remote_commit = if local_body_present {
                    None
                } else {
                    parse_remote_commit(&body)
                };
                CommitVerification {
                    is_remote_commit: true,
                    remote_commit,
                }
            }
            RemoteLookup::Missing => {
                tracing::debug!("Commit {} is not known upstream", hash);
                cache.set_remote_commit(hash, false);
                CommitVerification {
                    is_remote_commit: false,
                    remote_commit: None,
                }
            }
            RemoteLookup::Unavailable => {
                tracing::warn!("Remote API unavailable, commit {} status unknown", hash);
                CommitVerification {
                    is_remote_commit: false,
                    remote_commit: None,
                }
            }
        }
    }

    /// Does `branch` exist upstream? The answer is cached under `hash`.
    pub fn verify_branch(&self, hash: &str, branch: &str, cache: &mut RevisionCache) -> bool {
        if let Some(cached) = cache.remote_branch(hash) {
            tracing::debug!("Using cached remote branch status for {}: {}", branch, cached);
            return cached;
        }

        match self.api.branch_exists(branch) {
            RemoteLookup::Exists(()) => {
                cache.set_remote_branch(hash, true);
                true
            }
            RemoteLookup::Missing => {
                cache.set_remote_branch(hash, false);
                false
            }
            RemoteLookup::Unavailable => {
                tracing::warn!("Remote API unavailable, branch {} status unknown", branch);
                false
            }
        }
    }
}

fn parse_remote_commit(body: &str) -> Option<ParsedCommit> {
    match serde_json::from_str::<RemoteCommit>(body) {
        Ok(remote) => Some(ParsedCommit {
            author: remote.author,
            committer: remote.committer,
            message: remote.message.trim().to_string(),
        }),
        Err(e) => {
            tracing::warn!("Ignoring unparsable remote commit body: {}", e);
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeRemoteApi;
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    const REMOTE_BODY: &str = r#"{
        "author": {"name": "A", "email": "a@x", "date": "2001-09-09T01:46:40Z"},
        "committer": {"name": "C", "email": "c@x", "date": "2001-09-09T01:46:40Z"},
        "message": "  remote msg\n",
        "url": "https://example.com/commit"
    }"#;

    #[test]
    fn test_unreachable_api_leaves_cache_untouched() {
        let api = FakeRemoteApi::new(RemoteLookup::Unavailable, RemoteLookup::Unavailable);
        let verifier = RemoteVerifier::new(&api);
        let mut cache = RevisionCache::new();

        let result = verifier.verify_commit(HASH, true, &mut cache);
        assert!(!result.is_remote_commit);
        assert!(!verifier.verify_branch(HASH, "main", &mut cache));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_definitive_answers_are_cached() {
        let api = FakeRemoteApi::new(RemoteLookup::Missing, RemoteLookup::Exists(()));
        let verifier = RemoteVerifier::new(&api);
        let mut cache = RevisionCache::new();

        assert!(!verifier.verify_commit(HASH, true, &mut cache).is_remote_commit);
        assert!(verifier.verify_branch(HASH, "main", &mut cache));
        assert_eq!(cache.remote_commit(HASH), Some(false));
        assert_eq!(cache.remote_branch(HASH), Some(true));
        assert_eq!(api.calls.get(), 2);

        // Served from the cache; no more API calls
        assert!(!verifier.verify_commit(HASH, true, &mut cache).is_remote_commit);
        assert!(verifier.verify_branch(HASH, "main", &mut cache));
        assert_eq!(api.calls.get(), 2);
    }

    #[test]
    fn test_cached_missing_requeried_without_local_body() {
        let api = FakeRemoteApi::new(
            RemoteLookup::Exists(REMOTE_BODY.to_string()),
            RemoteLookup::Missing,
        );
        let verifier = RemoteVerifier::new(&api);
        let mut cache = RevisionCache::new();
        cache.set_remote_commit(HASH, false);

        // The commit has since been pushed
        let result = verifier.verify_commit(HASH, false, &mut cache);
        assert_eq!(api.calls.get(), 1);
        assert!(result.is_remote_commit);
        assert_eq!(result.remote_commit.unwrap().message, "remote msg");
        assert_eq!(cache.remote_commit(HASH), Some(true));
    }

    #[test]
    fn test_remote_body_used_without_local_body() {
        let api = FakeRemoteApi::new(
            RemoteLookup::Exists(REMOTE_BODY.to_string()),
            RemoteLookup::Missing,
        );
        let verifier = RemoteVerifier::new(&api);
        let mut cache = RevisionCache::new();

        let result = verifier.verify_commit(HASH, false, &mut cache);
        assert!(result.is_remote_commit);
        let commit = result.remote_commit.unwrap();
        assert_eq!(commit.author.name, "A");
        assert_eq!(commit.committer.email, "c@x");
        assert_eq!(commit.author.date, "2001-09-09T01:46:40Z");
        assert_eq!(commit.message, "remote msg");
    }

    #[test]
    fn test_remote_body_ignored_with_local_body() {
        let api = FakeRemoteApi::new(
            RemoteLookup::Exists(REMOTE_BODY.to_string()),
            RemoteLookup::Missing,
        );
        let verifier = RemoteVerifier::new(&api);
        let mut cache = RevisionCache::new();

        let result = verifier.verify_commit(HASH, true, &mut cache);
        assert!(result.is_remote_commit);
        assert!(result.remote_commit.is_none());
    }

    #[test]
    fn test_cached_exists_refetches_for_missing_local_body() {
        let api = FakeRemoteApi::new(
            RemoteLookup::Exists(REMOTE_BODY.to_string()),
            RemoteLookup::Missing,
        );
        let verifier = RemoteVerifier::new(&api);
        let mut cache = RevisionCache::new();
        cache.set_remote_commit(HASH, true);

        let result = verifier.verify_commit(HASH, false, &mut cache);
        assert_eq!(api.calls.get(), 1);
        assert!(result.remote_commit.is_some());
    }

    #[test]
    fn test_unparsable_body_still_counts_as_existing() {
        let api = FakeRemoteApi::new(
            RemoteLookup::Exists("<html>".to_string()),
            RemoteLookup::Missing,
        );
        let verifier = RemoteVerifier::new(&api);
        let mut cache = RevisionCache::new();

        let result = verifier.verify_commit(HASH, false, &mut cache);
        assert!(result.is_remote_commit);
        assert!(result.remote_commit.is_none());
        assert_eq!(cache.remote_commit(HASH), Some(true));
    }
}
