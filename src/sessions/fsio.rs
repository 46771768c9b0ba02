//! Filesystem plumbing for the session store.
//!
//! Three concerns live here, all of them about surviving a hostile disk:
//!
//! * the atomic write protocol (temp file + rename) that guarantees readers
//!   of `tasks.json` only ever see a fully written registry,
//! * errno classification and the exponential-backoff retry policy used by
//!   `flush_updates`,
//! * the `tasks.json.failed` recovery artifact written when a flush gives up,
//!   so pending intents survive a crash for manual replay.
//!
//! The [`BacklogWriter`] trait is the seam between the store and the disk;
//! tests substitute failing writers to drive the retry machinery.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::tasks::{ItemId, Status};

/// Registry file inside a session directory.
pub const TASKS_FILE: &str = "tasks.json";
/// Verbatim PRD copy taken at session creation.
pub const PRD_SNAPSHOT_FILE: &str = "prd_snapshot.md";
/// Present on delta sessions only; contains the parent session ID.
pub const PARENT_SESSION_FILE: &str = "parent_session.txt";
/// Recovery artifact written when a flush exhausts its retries.
pub const RECOVERY_FILE: &str = "tasks.json.failed";
/// Subdirectory holding generated plan artifacts, one JSON file per subtask.
pub const PRP_DIR: &str = "prps";

/// Error codes the flush path retries on. Everything else — including
/// errors with no OS code at all — fails immediately.
pub const RETRYABLE_CODES: [&str; 4] = ["EBUSY", "EAGAIN", "EIO", "ENFILE"];

/// A filesystem operation that failed, with enough context to decide
/// whether retrying can help.
#[derive(Debug, Error, Diagnostic)]
#[error("{operation} failed for {}: {source}", .path.display())]
#[diagnostic(code(taskloom::sessions::file))]
pub struct SessionFileError {
    pub path: PathBuf,
    pub operation: &'static str,
    /// Symbolic OS error code (`"EBUSY"`, `"ENOSPC"`, ...) when one could be
    /// derived; `None` means the error is never retryable.
    pub code: Option<String>,
    #[source]
    pub source: io::Error,
}

impl SessionFileError {
    /// Wrap an I/O failure, deriving the symbolic code. Public so custom
    /// [`BacklogWriter`] implementations can produce store-compatible errors.
    pub fn new(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        let code = errno_name(&source).map(str::to_string);
        Self {
            path: path.into(),
            operation,
            code,
            source,
        }
    }

    /// Whether the flush retry policy may try again after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|c| RETRYABLE_CODES.contains(&c))
    }
}

/// Derive the symbolic errno name from an [`io::Error`].
///
/// `ErrorKind` covers the portable cases; the raw errno table fills in the
/// codes the kind taxonomy has no name for (common Unix values).
fn errno_name(err: &io::Error) -> Option<&'static str> {
    use io::ErrorKind;
    match err.kind() {
        ErrorKind::ResourceBusy => return Some("EBUSY"),
        ErrorKind::WouldBlock => return Some("EAGAIN"),
        ErrorKind::StorageFull => return Some("ENOSPC"),
        ErrorKind::NotFound => return Some("ENOENT"),
        ErrorKind::PermissionDenied => return Some("EACCES"),
        _ => {}
    }
    match err.raw_os_error() {
        Some(2) => Some("ENOENT"),
        Some(5) => Some("EIO"),
        Some(11) => Some("EAGAIN"),
        Some(13) => Some("EACCES"),
        Some(16) => Some("EBUSY"),
        Some(23) => Some("ENFILE"),
        Some(28) => Some("ENOSPC"),
        _ => None,
    }
}

/// Hard upper bound on configured flush retries.
pub const MAX_RETRY_BOUND: u32 = 10;

/// Exponential backoff with jitter for the flush path.
///
/// `max_retries` is the *total* attempt budget: 3 means up to three calls to
/// the writer, 0 still performs exactly one. Between attempt N and N+1 the
/// policy sleeps `min(base · 2^(N-1) · jitter, max)` with jitter drawn from
/// `[0.5, 1.5)`.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy with the given retry budget, clamped to [`MAX_RETRY_BOUND`].
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRY_BOUND),
            ..Self::default()
        }
    }

    /// Total writer attempts this policy allows (never less than one).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Backoff to sleep after `completed_attempt` (1-based) failed.
    #[must_use]
    pub fn delay_after(&self, completed_attempt: u32) -> Duration {
        let exp = completed_attempt.saturating_sub(1).min(16);
        let base = self.base_delay.as_secs_f64() * f64::from(1u32 << exp);
        let jitter: f64 = rand::rng().random_range(0.5..1.5);
        Duration::from_secs_f64((base * jitter).min(self.max_delay.as_secs_f64()))
    }
}

fn temp_name(file_name: &str) -> String {
    let nonce: u64 = rand::rng().random();
    format!(".{file_name}.{nonce:016x}.tmp")
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Write `contents` to `path` through a randomly named temp file in the same
/// directory, then rename into place.
///
/// Readers of `path` therefore observe either the previous committed file or
/// the new one, never a prefix. On any error between write and rename the
/// temp file is unlinked best-effort and the original error is surfaced.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), SessionFileError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(TASKS_FILE);
    let tmp = dir.join(temp_name(file_name));

    let write_result = async {
        tokio::fs::write(&tmp, contents).await?;
        set_mode(&tmp, 0o644).await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(source) = write_result {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(SessionFileError::new("atomic write", path, source));
    }
    Ok(())
}

/// Plain write with mode 0644, for files with no concurrent readers.
pub async fn write_file(path: &Path, contents: &str) -> Result<(), SessionFileError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| SessionFileError::new("write", path, e))?;
    set_mode(path, 0o644)
        .await
        .map_err(|e| SessionFileError::new("chmod", path, e))
}

/// One queued status mutation awaiting flush.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub item_id: ItemId,
    pub status: Status,
    pub queued_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecoveryError<'a> {
    code: Option<&'a str>,
    attempts: u32,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecoveryFileBody<'a> {
    version: &'static str,
    error: RecoveryError<'a>,
    pending_count: usize,
    pending_updates: &'a [PendingUpdate],
}

/// Write the `tasks.json.failed` recovery artifact. Best-effort: a failure
/// here is logged and swallowed so the original flush error stays primary.
pub async fn write_recovery_file(
    session_dir: &Path,
    error: &SessionFileError,
    attempts: u32,
    pending: &[PendingUpdate],
) {
    let body = RecoveryFileBody {
        version: "1.0",
        error: RecoveryError {
            code: error.code.as_deref(),
            attempts,
            message: error.to_string(),
        },
        pending_count: pending.len(),
        pending_updates: pending,
    };
    let path = session_dir.join(RECOVERY_FILE);
    match serde_json::to_string_pretty(&body) {
        Ok(json) => {
            if let Err(e) = tokio::fs::write(&path, json).await {
                warn!(path = %path.display(), error = %e, "failed to write recovery file");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize recovery file"),
    }
}

/// The seam between the session store and the disk. The production
/// implementation performs the atomic write protocol; tests inject failing
/// writers to exercise the retry policy.
#[async_trait]
pub trait BacklogWriter: Send + Sync {
    /// Persist the serialized registry into `session_dir`.
    async fn persist(&self, session_dir: &Path, json: &str) -> Result<(), SessionFileError>;
}

/// Production writer: atomic temp-file-and-rename into `tasks.json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomicBacklogWriter;

#[async_trait]
impl BacklogWriter for AtomicBacklogWriter {
    async fn persist(&self, session_dir: &Path, json: &str) -> Result<(), SessionFileError> {
        write_atomic(&session_dir.join(TASKS_FILE), json).await
    }
}
