//! Hand-built repositories for unit tests

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use tempfile::TempDir;

pub const COMMIT_BODY: &str = "tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
author A <a@x> 1000000000\n\
committer C <c@x> 1000000000 +0000\n\
\n\
msg\n";

/// A working directory with a `.git` metadata directory.
pub struct TestRepo {
    pub dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let git_dir = dir.path().join(".git");
        fs::create_dir_all(git_dir.join("objects")).unwrap();
        fs::create_dir_all(git_dir.join("refs/heads")).unwrap();
        fs::write(git_dir.join("config"), "[core]\n\trepositoryformatversion = 0\n").unwrap();
        Self { dir }
    }

    pub fn workdir(&self) -> &Path {
        self.dir.path()
    }

    pub fn git_dir(&self) -> PathBuf {
        self.dir.path().join(".git")
    }

    /// Point HEAD at `branch`, which points at `hash`.
    pub fn checkout_branch(&self, branch: &str, hash: &str) {
        fs::write(self.git_dir().join("HEAD"), format!("ref: refs/heads/{}\n", branch)).unwrap();
        let ref_path = self.git_dir().join("refs/heads").join(branch);
        fs::create_dir_all(ref_path.parent().unwrap()).unwrap();
        fs::write(ref_path, format!("{}\n", hash)).unwrap();
    }

    /// Store `body` as a loose commit and return its hash.
    pub fn write_loose_commit(&self, body: &str) -> String {
        let hash = object_id("commit", body.as_bytes());
        let path = self
            .git_dir()
            .join("objects")
            .join(&hash[..2])
            .join(&hash[2..]);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut content = format!("commit {}\0", body.len()).into_bytes();
        content.extend_from_slice(body.as_bytes());
        fs::write(path, compress(&content)).unwrap();
        hash
    }
}

pub fn object_id(kind: &str, data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{} {}\0", kind, data.len()).as_bytes());
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
