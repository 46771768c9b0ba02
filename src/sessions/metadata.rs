//! Session identity: hash-addressed directory names and metadata.
//!
//! A session directory is named `<NNN>_<12-hex>`: a sequence number
//! zero-padded to at least three digits (it grows to four or more past 999)
//! joined to the first twelve hex chars of the PRD content hash. Directory
//! listings ignore anything that does not match this shape, so foreign
//! entries in the plan directory are harmless.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Length of the hash prefix carried in session IDs and directory names.
pub const HASH_PREFIX_LEN: usize = 12;

static SESSION_DIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{3,})_([0-9a-f]{12})$").expect("session dir regex is valid")
});

/// A string that does not name a session directory.
#[derive(Debug, Error, Diagnostic)]
#[error("not a session ID: {input:?}")]
#[diagnostic(
    code(taskloom::sessions::invalid_id),
    help("Session IDs look like 001_a1b2c3d4e5f6: a zero-padded sequence and a 12-hex hash prefix.")
)]
pub struct SessionIdError {
    pub input: String,
}

/// A parsed session identifier.
///
/// ```rust
/// use taskloom::sessions::SessionId;
///
/// let id: SessionId = "007_0123456789ab".parse().unwrap();
/// assert_eq!(id.sequence(), 7);
/// assert_eq!(id.hash_prefix(), "0123456789ab");
/// assert_eq!(id.to_string(), "007_0123456789ab");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct SessionId {
    sequence: u64,
    hash_prefix: String,
}

impl SessionId {
    /// Build an ID from a sequence number and the *full* PRD hash; only the
    /// first [`HASH_PREFIX_LEN`] chars are kept.
    #[must_use]
    pub fn new(sequence: u64, full_hash: &str) -> Self {
        let hash_prefix = full_hash.chars().take(HASH_PREFIX_LEN).collect();
        Self {
            sequence,
            hash_prefix,
        }
    }

    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub fn hash_prefix(&self) -> &str {
        &self.hash_prefix
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}_{}", self.sequence, self.hash_prefix)
    }
}

impl FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = SESSION_DIR_RE.captures(s).ok_or_else(|| SessionIdError {
            input: s.to_string(),
        })?;
        let sequence = caps[1].parse().map_err(|_| SessionIdError {
            input: s.to_string(),
        })?;
        Ok(Self {
            sequence,
            hash_prefix: caps[2].to_string(),
        })
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_string()
    }
}

/// Everything known about a session without loading its registry.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub id: SessionId,
    /// First twelve hex chars of the PRD content hash the session was
    /// created from; always equals `id.hash_prefix()`.
    pub hash: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub parent_session: Option<SessionId>,
}
