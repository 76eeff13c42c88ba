use std::fmt;

/// Failure outcomes of the revision detection pipeline.
///
/// Only `Io` is transient; every other variant describes the repository
/// as it is on disk and may be cached for the rest of the session.
#[derive(Debug)]
pub enum RevisionError {
    NotARepository,
    Unresolvable(String),
    NotFound,
    MalformedIndex(String),
    DecompressionFailed(String),
    ReadFailed(String),
    Malformed(String),
    Io(std::io::Error),
}

impl RevisionError {
    /// Whether this outcome is stable for the lifetime of the session.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, RevisionError::Io(_))
    }

    /// Whether this outcome indicates damaged or unsupported storage.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            RevisionError::MalformedIndex(_)
                | RevisionError::DecompressionFailed(_)
                | RevisionError::ReadFailed(_)
        )
    }
}

impl fmt::Display for RevisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionError::NotARepository => write!(f, "Not a git repository"),
            RevisionError::Unresolvable(msg) => write!(f, "Unresolvable HEAD: {}", msg),
            RevisionError::NotFound => write!(f, "Commit object not found"),
            RevisionError::MalformedIndex(msg) => write!(f, "Malformed pack index: {}", msg),
            RevisionError::DecompressionFailed(msg) => write!(f, "Decompression failed: {}", msg),
            RevisionError::ReadFailed(msg) => write!(f, "Pack read failed: {}", msg),
            RevisionError::Malformed(msg) => write!(f, "Malformed commit: {}", msg),
            RevisionError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for RevisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RevisionError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RevisionError {
    fn from(e: std::io::Error) -> Self {
        RevisionError::Io(e)
    }
}

pub type RevisionResult<T> = std::result::Result<T, RevisionError>;
