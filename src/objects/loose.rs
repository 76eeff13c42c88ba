use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use gix_object::Kind;

use crate::error::{RevisionError, RevisionResult};

/// Loose objects are stored as `objects/ab/cdef123...`
pub fn loose_object_path(objects_dir: &Path, hash: &str) -> PathBuf {
    let (dir, file) = hash.split_at(2);
    objects_dir.join(dir).join(file)
}

/// Read and inflate a loose object, returning its payload without the
/// `"<type> <size>\0"` header. `Ok(None)` when no such file exists.
pub fn read_loose_object(path: &Path) -> RevisionResult<Option<Vec<u8>>> {
    let compressed = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RevisionError::Io(e)),
    };

    let mut content = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut content)
        .map_err(|e| RevisionError::DecompressionFailed(format!("{}: {}", path.display(), e)))?;

    let null_pos = content.iter().position(|&b| b == 0).ok_or_else(|| {
        RevisionError::DecompressionFailed(format!(
            "{}: no null terminator in object header",
            path.display()
        ))
    })?;

    let kind = content[..null_pos]
        .split(|&b| b == b' ')
        .next()
        .and_then(|kind| Kind::from_bytes(kind).ok());
    if kind != Some(Kind::Commit) {
        tracing::debug!("Loose object {} is {:?}, not a commit", path.display(), kind);
    }

    Ok(Some(content.split_off(null_pos + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_compressed(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = fs::File::create(path).unwrap();
        let mut encoder = ZlibEncoder::new(file, Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_loose_object_path() {
        let path = loose_object_path(
            Path::new("/repo/objects"),
            "9daeafb9864cf43055ae93beb0afd6c7d144bfa4",
        );
        assert_eq!(
            path,
            PathBuf::from("/repo/objects/9d/aeafb9864cf43055ae93beb0afd6c7d144bfa4")
        );
    }

    #[test]
    fn test_read_strips_header() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ab/cdef");
        write_compressed(&path, b"commit 11\0tree x\n\nmsg");

        let payload = read_loose_object(&path).unwrap().unwrap();
        assert_eq!(payload, b"tree x\n\nmsg".to_vec());
    }

    #[test]
    fn test_missing_file_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(read_loose_object(&temp.path().join("nope")).unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_decompression_failure() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("garbage");
        fs::write(&path, b"this was never deflated").unwrap();

        assert!(matches!(
            read_loose_object(&path),
            Err(RevisionError::DecompressionFailed(_))
        ));
    }
}
