//! Commit object retrieval from loose objects and pack files
//!
//! Lookup order: `objects/xx/yyyy...` first, then every pack named by
//! `objects/info/packs` (or found in `objects/pack/` when that file is
//! missing). The first pack that yields a commit wins.

mod loose;
mod pack_entry;
mod pack_index;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::cache::{CachedBody, RevisionCache};
use crate::error::{RevisionError, RevisionResult};
use crate::repo::RepositoryHandle;

use pack_entry::PackEntry;

/// Length of a hex-encoded SHA-1 object name
const HASH_HEX_LEN: usize = 40;

/// Whether `hash` is a lowercase, 40 hex digit object name.
pub fn is_object_hash(hash: &str) -> bool {
    hash.len() == HASH_HEX_LEN && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Read-only access to the commit objects of one repository.
pub struct ObjectStore<'a> {
    handle: &'a RepositoryHandle,
}

impl<'a> ObjectStore<'a> {
    pub fn new(handle: &'a RepositoryHandle) -> Self {
        Self { handle }
    }

    /// Fetch the commit payload for `hash`, split into lines.
    pub fn fetch_commit_body(&self, hash: &str) -> RevisionResult<Vec<String>> {
        if !is_object_hash(hash) {
            tracing::debug!("{:?} is not an object name", hash);
            return Err(RevisionError::NotFound);
        }

        let objects_dir = self.handle.objects_dir();
        let loose_path = loose::loose_object_path(&objects_dir, hash);
        if let Some(payload) = loose::read_loose_object(&loose_path)? {
            tracing::debug!("Read loose object {}", hash);
            return Ok(split_lines(&payload));
        }

        let payload = self.find_in_packs(&objects_dir, hash)?;
        Ok(split_lines(&payload))
    }

    /// [`fetch_commit_body`](Self::fetch_commit_body), memoized in the session cache.
    ///
    /// Found bodies and permanent failures are cached; transient I/O
    /// failures are not, so the next request retries.
    pub fn fetch_commit_body_cached(
        &self,
        hash: &str,
        cache: &mut RevisionCache,
    ) -> RevisionResult<Vec<String>> {
        if let Some(cached) = cache.body(hash) {
            tracing::debug!("Using cached commit body for {}", hash);
            return match cached {
                CachedBody::Found { lines } => Ok(lines.clone()),
                CachedBody::NotFound => Err(RevisionError::NotFound),
                CachedBody::Corrupt { reason } => {
                    Err(RevisionError::DecompressionFailed(reason.clone()))
                }
            };
        }

        let result = self.fetch_commit_body(hash);
        if is_object_hash(hash) {
            match &result {
                Ok(lines) => cache.insert_body(hash, CachedBody::Found { lines: lines.clone() }),
                Err(RevisionError::NotFound) => cache.insert_body(hash, CachedBody::NotFound),
                Err(e) if e.is_corruption() => cache.insert_body(
                    hash,
                    CachedBody::Corrupt {
                        reason: e.to_string(),
                    },
                ),
                Err(e) if !e.is_permanent() => {
                    tracing::warn!("Not caching transient failure for {}: {}", hash, e)
                }
                Err(e) => tracing::debug!("Not caching {} for {}", e, hash),
            }
        }
        result
    }

    /// Scan candidate packs for `hash`.
    ///
    /// A pack with a missing or malformed index is skipped, as is a pack
    /// whose entry is not a commit. An index that cannot be read and a
    /// damaged entry are skipped too, but reported if no later pack
    /// supplies the commit.
    fn find_in_packs(&self, objects_dir: &Path, hash: &str) -> RevisionResult<Vec<u8>> {
        let mut binary = [0u8; 20];
        hex::decode_to_slice(hash, &mut binary).map_err(|_| RevisionError::NotFound)?;

        let pack_dir = objects_dir.join("pack");
        let mut failure = None;

        for pack_name in pack_names(objects_dir)? {
            let index_name = pack_name.replace(".pack", ".idx");
            let index_data = match fs::read(pack_dir.join(&index_name)) {
                Ok(data) if !data.is_empty() => data,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!("Skipping {}: {}", index_name, e);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", index_name, e);
                    failure = Some(RevisionError::Io(e));
                    continue;
                }
            };

            let offset = match pack_index::find_offset(&index_data, &binary) {
                Ok(offset) => offset,
                Err(RevisionError::NotFound) => continue,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", index_name, e);
                    continue;
                }
            };
            tracing::debug!("{} found in {} at offset {}", hash, index_name, offset);

            match pack_entry::read_object_at(&pack_dir.join(&pack_name), offset) {
                Ok(PackEntry::Commit(payload)) => return Ok(payload),
                Ok(PackEntry::Other(kind)) => {
                    tracing::debug!("{} in {} is {:?}, not a commit", hash, pack_name, kind);
                }
                Err(RevisionError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!("Pack {} is missing", pack_name);
                }
                Err(e) => {
                    tracing::warn!("Failed to read {} from {}: {}", hash, pack_name, e);
                    failure = Some(e);
                }
            }
        }

        Err(failure.unwrap_or(RevisionError::NotFound))
    }
}

/// Names of candidate `.pack` files, in lookup order.
fn pack_names(objects_dir: &Path) -> RevisionResult<Vec<String>> {
    let packs_file = objects_dir.join("info").join("packs");
    match fs::read_to_string(&packs_file) {
        Ok(contents) if !contents.trim().is_empty() => {
            let names = contents
                .lines()
                .filter_map(|line| line.strip_prefix('P'))
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            return Ok(names);
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(RevisionError::Io(e)),
    }

    list_pack_dir(&objects_dir.join("pack"))
}

/// `objects/pack/*.pack`, sorted by name.
fn list_pack_dir(pack_dir: &Path) -> RevisionResult<Vec<String>> {
    let entries = match fs::read_dir(pack_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RevisionError::Io(e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let path: PathBuf = entry?.path();
        if !path.is_file() || !path.extension().is_some_and(|ext| ext == "pack") {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn split_lines(payload: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(payload)
        .split('\n')
        .map(str::to_string)
        .collect()
}
