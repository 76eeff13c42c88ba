use std::fs;
use std::path::{Path, PathBuf};

use super::RepositoryHandle;
use crate::cache::{CachedLocation, RevisionCache};
use crate::error::{RevisionError, RevisionResult};

/// Name of the metadata entry inside a working directory
const DOT_GIT: &str = ".git";

/// Prefix of a `.git` file written by `--separate-git-dir` and linked worktrees
const GITDIR_PREFIX: &str = "gitdir: ";

/// Find the metadata directory for `workdir`.
///
/// A `.git` directory must contain a `config` file. A `.git` file must
/// consist of a single `gitdir: <path>` line naming an existing directory;
/// relative paths are taken relative to `workdir`.
pub fn locate(workdir: &Path) -> RevisionResult<RepositoryHandle> {
    let dot_git = workdir.join(DOT_GIT);

    if dot_git.is_dir() {
        if !dot_git.join("config").is_file() {
            tracing::debug!("{:?} has no config file", dot_git);
            return Err(RevisionError::NotARepository);
        }
        return Ok(RepositoryHandle::open(dot_git));
    }

    if dot_git.is_file() {
        let target = read_gitdir_file(&dot_git).ok_or(RevisionError::NotARepository)?;
        let git_dir = workdir.join(target);
        if !git_dir.is_dir() {
            tracing::debug!("gitdir target {:?} is not a directory", git_dir);
            return Err(RevisionError::NotARepository);
        }
        tracing::debug!("Detected separate git dir at {:?}", git_dir);
        return Ok(RepositoryHandle::open(git_dir));
    }

    Err(RevisionError::NotARepository)
}

/// [`locate`], memoized in the session cache.
///
/// Both outcomes are cached: a directory that is not a repository stays
/// that way for the rest of the session.
pub fn locate_cached(workdir: &Path, cache: &mut RevisionCache) -> RevisionResult<RepositoryHandle> {
    if let Some(cached) = cache.location() {
        tracing::debug!("Using cached repository location {:?}", cached.git_dir);
        return match &cached.git_dir {
            Some(git_dir) => Ok(RepositoryHandle::open(git_dir.clone())),
            None => Err(RevisionError::NotARepository),
        };
    }

    let result = locate(workdir);
    let git_dir = result.as_ref().ok().map(|h| h.git_dir().to_path_buf());
    cache.set_location(CachedLocation { git_dir });
    result
}

/// Parse a `.git` redirect file, returning the referenced path.
fn read_gitdir_file(path: &Path) -> Option<PathBuf> {
    let contents = fs::read_to_string(path).ok()?;
    let line = contents.strip_suffix('\n').unwrap_or(&contents);
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.contains('\n') {
        return None;
    }
    let target = line.strip_prefix(GITDIR_PREFIX)?;
    if target.is_empty() {
        return None;
    }
    Some(PathBuf::from(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_locate_plain_dot_git() {
        let temp = TempDir::new().unwrap();
        let git_dir = temp.path().join(".git");
        fs::create_dir(&git_dir).unwrap();
        fs::write(git_dir.join("config"), "[core]\n").unwrap();

        let handle = locate(temp.path()).unwrap();
        assert_eq!(handle.git_dir(), git_dir.as_path());
    }

    #[test]
    fn test_locate_dot_git_without_config() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();

        assert!(matches!(
            locate(temp.path()),
            Err(RevisionError::NotARepository)
        ));
    }

    #[test]
    fn test_locate_separate_git_dir() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("real.git");
        fs::create_dir(&real).unwrap();
        fs::write(
            temp.path().join(".git"),
            format!("gitdir: {}\n", real.display()),
        )
        .unwrap();

        let handle = locate(temp.path()).unwrap();
        assert_eq!(handle.git_dir(), real.as_path());
    }

    #[test]
    fn test_locate_relative_gitdir() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("store")).unwrap();
        fs::write(temp.path().join(".git"), "gitdir: store").unwrap();

        let handle = locate(temp.path()).unwrap();
        assert_eq!(handle.git_dir(), temp.path().join("store").as_path());
    }

    #[test]
    fn test_locate_gitdir_file_malformed() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".git"), "not a pointer\n").unwrap();
        assert!(locate(temp.path()).is_err());
    }

    #[test]
    fn test_locate_gitdir_target_missing() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".git"), "gitdir: /nonexistent/place\n").unwrap();
        assert!(locate(temp.path()).is_err());
    }

    #[test]
    fn test_locate_nothing_there() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            locate(temp.path()),
            Err(RevisionError::NotARepository)
        ));
    }

    #[test]
    fn test_locate_cached_remembers_negative_result() {
        let temp = TempDir::new().unwrap();
        let mut cache = RevisionCache::new();

        assert!(locate_cached(temp.path(), &mut cache).is_err());

        // A repository appearing later is not noticed within the same session
        let git_dir = temp.path().join(".git");
        fs::create_dir(&git_dir).unwrap();
        fs::write(git_dir.join("config"), "").unwrap();
        assert!(locate_cached(temp.path(), &mut cache).is_err());

        let mut fresh = RevisionCache::new();
        assert!(locate_cached(temp.path(), &mut fresh).is_ok());
        assert_eq!(
            fresh.location().and_then(|l| l.git_dir.clone()),
            Some(git_dir)
        );
    }
}
