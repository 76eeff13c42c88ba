use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::traits::RevisionStore;
use super::RevisionEntries;
use crate::detect::RevisionReport;

/// Records the report as a YAML file
pub struct FilesystemStore {
    path: PathBuf,
}

impl FilesystemStore {
    /// Create a store writing to `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FilesystemStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Directory temp files are staged in, so the final rename stays on one filesystem
    fn staging_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl RevisionStore for FilesystemStore {
    fn read_report(&self) -> Result<Option<RevisionEntries>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read report from {:?}", self.path))?;
        let entries = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse report from {:?}", self.path))?;
        Ok(Some(entries))
    }

    fn write_report(&self, report: &RevisionReport) -> Result<()> {
        let staging_dir = self.staging_dir();
        fs::create_dir_all(&staging_dir)
            .with_context(|| format!("Failed to create directory {:?}", staging_dir))?;

        // 1. Write to temp file
        let yaml = serde_yaml::to_string(&RevisionEntries::from(report))
            .context("Failed to serialize report")?;
        let mut temp = NamedTempFile::new_in(&staging_dir)
            .context("Failed to create temporary report file")?;
        temp.write_all(yaml.as_bytes())
            .context("Failed to write temporary report file")?;

        // 2. Atomic rename (atomic on POSIX systems)
        temp.persist(&self.path)
            .with_context(|| format!("Failed to persist report to {:?}", self.path))?;

        tracing::debug!("Recorded revision report in {:?}", self.path);
        Ok(())
    }
}
