use anyhow::Result;

use super::RevisionEntries;
use crate::detect::RevisionReport;

/// Destination of the detected revision, keyed by well-known entry names.
pub trait RevisionStore {
    /// Read the last recorded report.
    /// Returns `None` if nothing has been recorded yet.
    fn read_report(&self) -> Result<Option<RevisionEntries>>;

    /// Atomically record a report, replacing any previous one.
    /// Implementation should ensure atomicity (temp file + rename or equivalent).
    fn write_report(&self, report: &RevisionReport) -> Result<()>;
}
