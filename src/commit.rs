//! Commit object parsing

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::{RevisionError, RevisionResult};

/// Layout of normalized identity dates
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An author or committer line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
    /// `YYYY-MM-DD HH:MM:SS` in UTC, followed by the raw timezone offset when present
    pub date: String,
}

/// The parts of a commit this tool reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommit {
    pub author: Identity,
    pub committer: Identity,
    pub message: String,
}

/// Everything known about the checked-out revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMetadata {
    pub hash: String,
    pub branch: Option<String>,
    pub author: Identity,
    pub committer: Identity,
    pub message: String,
    pub is_remote_commit: bool,
    pub is_remote_branch: bool,
}

/// Parse commit payload lines into identities and message.
///
/// Headers run up to the first empty line; everything after it is the
/// message, joined with single spaces.
pub fn parse<S: AsRef<str>>(lines: &[S]) -> RevisionResult<ParsedCommit> {
    let mut author = None;
    let mut committer = None;
    let mut body_start = lines.len();

    for (i, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if line.is_empty() {
            body_start = i + 1;
            break;
        }
        match line.split_once(' ') {
            Some(("author", rest)) => author = Some(parse_identity(rest)?),
            Some(("committer", rest)) => committer = Some(parse_identity(rest)?),
            _ => {}
        }
    }

    let author = author.ok_or_else(|| RevisionError::Malformed("no author header".to_string()))?;
    let committer =
        committer.ok_or_else(|| RevisionError::Malformed("no committer header".to_string()))?;

    let message = lines[body_start..]
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(" ")
        .trim()
        .to_string();

    Ok(ParsedCommit {
        author,
        committer,
        message,
    })
}

/// Parse `Name <email> <unix-seconds>[ <tz>]`.
fn parse_identity(value: &str) -> RevisionResult<Identity> {
    let malformed = || RevisionError::Malformed(format!("bad identity: {}", value));

    let (name, rest) = value.split_once('<').ok_or_else(malformed)?;
    let (email, rest) = rest.split_once('>').ok_or_else(malformed)?;
    if name.is_empty() || email.is_empty() {
        return Err(malformed());
    }

    let rest = rest.strip_prefix(' ').ok_or_else(malformed)?;
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (timestamp, tail) = rest.split_at(digits_end);
    let timestamp: i64 = timestamp.parse().map_err(|_| malformed())?;

    let mut date = DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(malformed)?
        .format(DATE_FORMAT)
        .to_string();
    if let Some(tz) = tail.strip_prefix(' ') {
        let tz = tz.split(' ').next().unwrap_or_default();
        if !tz.is_empty() {
            date.push(' ');
            date.push_str(tz);
        }
    }

    Ok(Identity {
        name: name.trim().to_string(),
        email: email.trim().to_string(),
        date,
    })
}
