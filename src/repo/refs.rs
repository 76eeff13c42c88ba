use std::fs;
use std::path::Path;

use super::RepositoryHandle;
use crate::error::{RevisionError, RevisionResult};

/// Length of the `ref: ` prefix of a symbolic HEAD
const SYMREF_PREFIX_LEN: usize = 5;

/// Namespace of local branches
const HEADS_PREFIX: &str = "refs/heads/";

/// What HEAD points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    /// Branch name; `None` for a detached HEAD
    pub branch: Option<String>,
    /// Commit hash as found on disk (shape is checked by the object store)
    pub hash: String,
}

/// Resolve HEAD to a branch name and commit hash.
pub fn resolve(handle: &RepositoryHandle) -> RevisionResult<ResolvedRef> {
    let head_path = handle.git_dir().join("HEAD");
    let head = fs::read_to_string(&head_path)
        .map_err(|e| RevisionError::Unresolvable(format!("cannot read {:?}: {}", head_path, e)))?;
    if head.is_empty() {
        return Err(RevisionError::Unresolvable("HEAD is empty".to_string()));
    }

    if !head.contains('/') {
        tracing::debug!("Detached HEAD at {}", head.trim());
        return Ok(ResolvedRef {
            branch: None,
            hash: head.trim().to_string(),
        });
    }

    let ref_name = head
        .trim()
        .get(SYMREF_PREFIX_LEN..)
        .ok_or_else(|| RevisionError::Unresolvable(format!("bad symbolic ref: {}", head.trim())))?;
    let branch = branch_name(ref_name);
    tracing::debug!("HEAD points at {} (branch {})", ref_name, branch);

    let hash = match read_loose_ref(handle.metadata_dir(), ref_name)? {
        Some(hash) => hash,
        None => read_packed_ref(handle.metadata_dir(), ref_name)?,
    };

    Ok(ResolvedRef {
        branch: Some(branch),
        hash,
    })
}

/// Short branch name for a ref path: strip `refs/heads/`, otherwise use
/// the last path segment.
fn branch_name(ref_name: &str) -> String {
    match ref_name.strip_prefix(HEADS_PREFIX) {
        Some(branch) => branch.to_string(),
        None => Path::new(ref_name)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| ref_name.to_string()),
    }
}

/// Read `<metadata>/<ref_name>`; `Ok(None)` when the file does not exist.
fn read_loose_ref(metadata_dir: &Path, ref_name: &str) -> RevisionResult<Option<String>> {
    let ref_path = metadata_dir.join(ref_name);
    if !ref_path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&ref_path)
        .map_err(|e| RevisionError::Unresolvable(format!("cannot read {:?}: {}", ref_path, e)))?;
    Ok(Some(contents.trim().to_string()))
}

/// Look `ref_name` up in the `packed-refs` table.
fn read_packed_ref(metadata_dir: &Path, ref_name: &str) -> RevisionResult<String> {
    let packed_path = metadata_dir.join("packed-refs");
    let packed = fs::read_to_string(&packed_path).map_err(|e| {
        RevisionError::Unresolvable(format!("no loose ref and cannot read packed-refs: {}", e))
    })?;

    for line in packed.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        // Peeled lines (`^<hash>`) have a single field and are skipped
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 2 {
            continue;
        }
        if parts[1] == ref_name {
            tracing::debug!("Found {} in packed-refs", ref_name);
            return Ok(parts[0].to_string());
        }
    }

    Err(RevisionError::Unresolvable(format!(
        "{} not present in packed-refs",
        ref_name
    )))
}
