//! The session store: hash-addressed session identity, the in-memory
//! registry, and the single write-through persistence path.
//!
//! One store owns one PRD and one plan directory. [`SessionStore::initialize`]
//! hashes the PRD and either resumes the session whose directory carries the
//! same 12-char hash prefix or allocates the next sequence number and creates
//! a fresh one. All status mutation goes through [`SessionStore::update_item_status`],
//! which only touches memory; [`SessionStore::flush_updates`] batches the
//! accumulated intents into one atomic, retried write. When the PRD changes,
//! [`SessionStore::create_delta_session`] opens a child session linked to its
//! parent so prior results can be reused.
//!
//! The store is the single source of truth for the registry and the sole
//! owner of the session directory on disk. It is cheap to share behind an
//! `Arc`; internal state is guarded by short critical sections that are never
//! held across await points, and flushes are serialized by an async gate.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::ports::{AgentError, PermissivePrdValidator, PrdHasher, PrdValidator, Sha256PrdHasher};
use crate::sessions::diff::diff_summary;
use crate::sessions::fsio::{
    AtomicBacklogWriter, BacklogWriter, PARENT_SESSION_FILE, PRD_SNAPSHOT_FILE, PRP_DIR,
    PendingUpdate, RetryPolicy, SessionFileError, TASKS_FILE, write_file, write_recovery_file,
};
use crate::sessions::metadata::{HASH_PREFIX_LEN, SessionId, SessionMetadata};
use crate::tasks::{Backlog, ItemId, PrpDocument, Status, ValidationError, validate_backlog};

/// Errors from session store operations.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// PRD validation failed, or persisted data failed schema validation.
    #[error("invalid input: {reason}")]
    #[diagnostic(code(taskloom::sessions::invalid_input))]
    InvalidInput { reason: String },

    /// A registry being ingested violates the schema.
    #[error(transparent)]
    #[diagnostic(code(taskloom::sessions::invalid_backlog))]
    InvalidBacklog(#[from] ValidationError),

    /// A filesystem operation failed.
    #[error(transparent)]
    #[diagnostic(code(taskloom::sessions::file))]
    File(#[from] SessionFileError),

    /// A mutation or query required an initialized session.
    #[error("no active session; call initialize() first")]
    #[diagnostic(
        code(taskloom::sessions::no_session),
        help("This is a programming error in the caller, not a recoverable condition.")
    )]
    NoSession,

    /// A status update named an item the registry does not contain.
    #[error("unknown item: {id}")]
    #[diagnostic(code(taskloom::sessions::unknown_item))]
    UnknownItem { id: ItemId },

    /// An external agent port failed.
    #[error(transparent)]
    #[diagnostic(code(taskloom::sessions::agent))]
    Agent(#[from] AgentError),
}

fn schema_error(context: &str, e: &serde_json::Error) -> StoreError {
    StoreError::InvalidInput {
        reason: format!("schema validation failed for {context}: {e}"),
    }
}

/// PRD change context carried by a delta session.
#[derive(Clone, Debug)]
pub struct DeltaContext {
    pub old_prd: String,
    pub new_prd: String,
    /// Free-form summary of the PRD change; not machine-parsed.
    pub diff_summary: String,
}

/// The in-memory image of the active session.
#[derive(Clone, Debug)]
pub struct SessionState {
    pub metadata: SessionMetadata,
    /// Verbatim PRD contents at session creation.
    pub prd_snapshot: String,
    /// The task registry, single source of truth for statuses.
    pub registry: Backlog,
    /// The item the scheduler is currently processing, if any.
    pub current_item: Option<ItemId>,
    /// Present only on delta sessions.
    pub delta: Option<DeltaContext>,
}

/// Builder for [`SessionStore`]. Every port has a working default:
/// SHA-256 hashing, permissive validation, atomic writes.
pub struct SessionStoreBuilder {
    prd_path: PathBuf,
    plan_dir: PathBuf,
    hasher: Arc<dyn PrdHasher>,
    validator: Arc<dyn PrdValidator>,
    writer: Arc<dyn BacklogWriter>,
    retry: RetryPolicy,
}

impl SessionStoreBuilder {
    #[must_use]
    pub fn hasher(mut self, hasher: Arc<dyn PrdHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn PrdValidator>) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn writer(mut self, writer: Arc<dyn BacklogWriter>) -> Self {
        self.writer = writer;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn build(self) -> SessionStore {
        SessionStore {
            prd_path: self.prd_path,
            plan_dir: self.plan_dir,
            hasher: self.hasher,
            validator: self.validator,
            writer: self.writer,
            retry: self.retry,
            session: RwLock::new(None),
            pending: Mutex::new(FxHashMap::default()),
            flush_gate: tokio::sync::Mutex::new(()),
            initial_hash: Mutex::new(None),
        }
    }
}

/// Owns the session on disk and in memory. See the module docs for the
/// lifecycle overview and each method for its persistence contract.
pub struct SessionStore {
    prd_path: PathBuf,
    plan_dir: PathBuf,
    hasher: Arc<dyn PrdHasher>,
    validator: Arc<dyn PrdValidator>,
    writer: Arc<dyn BacklogWriter>,
    retry: RetryPolicy,
    session: RwLock<Option<SessionState>>,
    /// Intent log keyed by item ID: the latest queued status per item. On a
    /// successful flush the flushed intents are removed; on failure the log
    /// survives so a later flush can retry the same intent.
    pending: Mutex<FxHashMap<ItemId, PendingUpdate>>,
    /// Serializes flushes: at most one in flight per store.
    flush_gate: tokio::sync::Mutex<()>,
    /// Full PRD hash cached at `initialize()`, for `has_session_changed`.
    initial_hash: Mutex<Option<String>>,
}

impl SessionStore {
    /// A store over `prd_path` persisting into `plan_dir`, with default
    /// ports.
    #[must_use]
    pub fn new(prd_path: impl Into<PathBuf>, plan_dir: impl Into<PathBuf>) -> Self {
        Self::builder(prd_path, plan_dir).build()
    }

    #[must_use]
    pub fn builder(prd_path: impl Into<PathBuf>, plan_dir: impl Into<PathBuf>) -> SessionStoreBuilder {
        SessionStoreBuilder {
            prd_path: prd_path.into(),
            plan_dir: plan_dir.into(),
            hasher: Arc::new(Sha256PrdHasher),
            validator: Arc::new(PermissivePrdValidator),
            writer: Arc::new(AtomicBacklogWriter),
            retry: RetryPolicy::default(),
        }
    }

    /// Validate and hash the PRD, then resume the session addressed by its
    /// hash prefix or create the next one.
    ///
    /// Fails with [`StoreError::InvalidInput`] when the PRD is missing or
    /// the validator reports a critical issue.
    #[instrument(skip(self), err)]
    pub async fn initialize(&self) -> Result<SessionState, StoreError> {
        if !matches!(tokio::fs::try_exists(&self.prd_path).await, Ok(true)) {
            return Err(StoreError::InvalidInput {
                reason: format!("PRD not found: {}", self.prd_path.display()),
            });
        }
        let verdict = self.validator.validate(&self.prd_path).await?;
        if verdict.has_critical_issues() {
            return Err(StoreError::InvalidInput {
                reason: format!("PRD validation failed: {}", verdict.summary),
            });
        }

        let full_hash = self.hasher.hash_prd(&self.prd_path).await?;
        *self.initial_hash.lock() = Some(full_hash.clone());
        let prefix: String = full_hash.chars().take(HASH_PREFIX_LEN).collect();

        tokio::fs::create_dir_all(&self.plan_dir)
            .await
            .map_err(|e| SessionFileError::new("create plan dir", &self.plan_dir, e))?;

        let existing = self.scan_sessions().await?;
        if let Some(meta) = existing.iter().find(|m| m.hash == prefix) {
            let state = self.load_session(&meta.path).await?;
            *self.session.write() = Some(state.clone());
            info!(session = %state.metadata.id, "resumed session for current PRD");
            return Ok(state);
        }

        let next_seq = existing.last().map_or(1, |m| m.id.sequence() + 1);
        let id = SessionId::new(next_seq, &full_hash);
        let dir = self.plan_dir.join(id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SessionFileError::new("create session dir", &dir, e))?;

        let prd_snapshot = tokio::fs::read_to_string(&self.prd_path)
            .await
            .map_err(|e| SessionFileError::new("read PRD", &self.prd_path, e))?;
        write_file(&dir.join(PRD_SNAPSHOT_FILE), &prd_snapshot).await?;

        let registry = Backlog::empty();
        let json = serde_json::to_string_pretty(&registry)
            .map_err(|e| schema_error(TASKS_FILE, &e))?;
        self.writer.persist(&dir, &json).await?;

        let state = SessionState {
            metadata: SessionMetadata {
                hash: id.hash_prefix().to_string(),
                id,
                path: dir,
                created_at: Utc::now(),
                parent_session: None,
            },
            prd_snapshot,
            registry,
            current_item: None,
            delta: None,
        };
        *self.session.write() = Some(state.clone());
        info!(session = %state.metadata.id, "created session");
        Ok(state)
    }

    /// Reconstruct a session from its directory without activating it.
    ///
    /// Reads `tasks.json` (schema-validated), `prd_snapshot.md`, the optional
    /// `parent_session.txt`, and the directory creation time. The restored
    /// state always has `current_item = None`.
    #[instrument(skip(self), err)]
    pub async fn load_session(&self, path: &Path) -> Result<SessionState, StoreError> {
        let dir_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let id: SessionId = dir_name.parse().map_err(|_| StoreError::InvalidInput {
            reason: format!("not a session directory: {}", path.display()),
        })?;

        let tasks_path = path.join(TASKS_FILE);
        let tasks_json = tokio::fs::read_to_string(&tasks_path)
            .await
            .map_err(|e| SessionFileError::new("read", &tasks_path, e))?;
        let registry: Backlog =
            serde_json::from_str(&tasks_json).map_err(|e| schema_error(TASKS_FILE, &e))?;
        validate_backlog(&registry)?;

        let snapshot_path = path.join(PRD_SNAPSHOT_FILE);
        let prd_snapshot = tokio::fs::read_to_string(&snapshot_path)
            .await
            .map_err(|e| SessionFileError::new("read", &snapshot_path, e))?;

        let parent_session = match tokio::fs::read_to_string(path.join(PARENT_SESSION_FILE)).await
        {
            Ok(contents) => contents.trim().parse().ok(),
            Err(_) => None,
        };
        let created_at = dir_created_at(path).await;

        Ok(SessionState {
            metadata: SessionMetadata {
                hash: id.hash_prefix().to_string(),
                id,
                path: path.to_path_buf(),
                created_at,
                parent_session,
            },
            prd_snapshot,
            registry,
            current_item: None,
            delta: None,
        })
    }

    /// Create a child session for a changed PRD and make it current.
    ///
    /// The new session carries the parent's registry forward so Complete
    /// results are visible for reuse, records the parent ID in
    /// `parent_session.txt`, and stores a textual diff summary of the PRD
    /// change.
    #[instrument(skip(self), err)]
    pub async fn create_delta_session(
        &self,
        new_prd_path: &Path,
    ) -> Result<SessionState, StoreError> {
        let (parent_id, old_prd, carried_registry) = {
            let guard = self.session.read();
            let session = guard.as_ref().ok_or(StoreError::NoSession)?;
            (
                session.metadata.id.clone(),
                session.prd_snapshot.clone(),
                session.registry.clone(),
            )
        };

        let full_hash = self.hasher.hash_prd(new_prd_path).await?;
        let new_prd = tokio::fs::read_to_string(new_prd_path)
            .await
            .map_err(|e| SessionFileError::new("read PRD", new_prd_path, e))?;
        let summary = diff_summary(&old_prd, &new_prd);

        let existing = self.scan_sessions().await?;
        let next_seq = existing.last().map_or(1, |m| m.id.sequence() + 1);
        let id = SessionId::new(next_seq, &full_hash);
        let dir = self.plan_dir.join(id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SessionFileError::new("create session dir", &dir, e))?;

        write_file(&dir.join(PARENT_SESSION_FILE), &parent_id.to_string()).await?;
        write_file(&dir.join(PRD_SNAPSHOT_FILE), &new_prd).await?;
        let json = serde_json::to_string_pretty(&carried_registry)
            .map_err(|e| schema_error(TASKS_FILE, &e))?;
        self.writer.persist(&dir, &json).await?;

        let state = SessionState {
            metadata: SessionMetadata {
                hash: id.hash_prefix().to_string(),
                id,
                path: dir,
                created_at: Utc::now(),
                parent_session: Some(parent_id.clone()),
            },
            prd_snapshot: new_prd.clone(),
            registry: carried_registry,
            current_item: None,
            delta: Some(DeltaContext {
                old_prd,
                new_prd,
                diff_summary: summary,
            }),
        };
        *self.session.write() = Some(state.clone());
        info!(
            session = %state.metadata.id,
            parent = %parent_id,
            "created delta session"
        );
        Ok(state)
    }

    /// All sessions in the plan directory, ascending by sequence number.
    ///
    /// Entries that do not match the session naming grammar are ignored;
    /// sessions whose directories cannot be inspected are logged and skipped,
    /// never aborting the listing.
    pub async fn list_sessions(&self) -> Result<Vec<SessionMetadata>, StoreError> {
        self.scan_sessions().await
    }

    /// The session with the highest sequence number, if any.
    pub async fn find_latest_session(&self) -> Result<Option<SessionMetadata>, StoreError> {
        Ok(self.scan_sessions().await?.pop())
    }

    /// The session whose hash prefix matches the given PRD's content hash.
    pub async fn find_session_by_prd(
        &self,
        prd_path: &Path,
    ) -> Result<Option<SessionMetadata>, StoreError> {
        let full_hash = self.hasher.hash_prd(prd_path).await?;
        let prefix: String = full_hash.chars().take(HASH_PREFIX_LEN).collect();
        Ok(self
            .scan_sessions()
            .await?
            .into_iter()
            .find(|m| m.hash == prefix))
    }

    async fn scan_sessions(&self) -> Result<Vec<SessionMetadata>, StoreError> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.plan_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(SessionFileError::new("read plan dir", &self.plan_dir, e).into()),
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(SessionFileError::new("read plan dir", &self.plan_dir, e).into());
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Ok(id) = name.parse::<SessionId>() else {
                continue;
            };
            match session_metadata(&entry.path(), id).await {
                Ok(meta) => out.push(meta),
                Err(e) => warn!(session = name, error = %e, "skipping unreadable session"),
            }
        }
        out.sort_by_key(|m| m.id.sequence());
        Ok(out)
    }

    /// Queue a status change. Mutates only the in-memory registry and the
    /// pending-intent log; nothing is written to disk until
    /// [`flush_updates`](Self::flush_updates).
    pub fn update_item_status(&self, id: &ItemId, status: Status) -> Result<(), StoreError> {
        let mut guard = self.session.write();
        let session = guard.as_mut().ok_or(StoreError::NoSession)?;
        if !session.registry.set_status(id, status) {
            return Err(StoreError::UnknownItem { id: id.clone() });
        }
        drop(guard);
        self.pending.lock().insert(
            id.clone(),
            PendingUpdate {
                item_id: id.clone(),
                status,
                queued_at: Utc::now(),
            },
        );
        debug!(item = %id, status = %status, "queued status update");
        Ok(())
    }

    /// Record the item the scheduler is currently processing.
    pub fn set_current_item(&self, id: Option<ItemId>) -> Result<(), StoreError> {
        let mut guard = self.session.write();
        let session = guard.as_mut().ok_or(StoreError::NoSession)?;
        session.current_item = id;
        Ok(())
    }

    /// Whether queued updates await a flush.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Number of distinct items with a queued update.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Persist the registry atomically, retrying transient errors.
    ///
    /// A no-op when nothing is pending. At most one flush runs at a time;
    /// a concurrent call queues behind the gate and then observes the first
    /// flush's final state (usually finding nothing left to do).
    ///
    /// On exhausted retries or a non-retryable error, a recovery artifact is
    /// written next to the registry and the original error is surfaced; the
    /// pending intents survive for a later flush.
    #[instrument(skip(self), err)]
    pub async fn flush_updates(&self) -> Result<(), StoreError> {
        let _gate = self.flush_gate.lock().await;

        let pending: Vec<PendingUpdate> = {
            let p = self.pending.lock();
            if p.is_empty() {
                return Ok(());
            }
            p.values().cloned().collect()
        };
        let (dir, json) = {
            let guard = self.session.read();
            let session = guard.as_ref().ok_or(StoreError::NoSession)?;
            let json = serde_json::to_string_pretty(&session.registry)
                .map_err(|e| schema_error(TASKS_FILE, &e))?;
            (session.metadata.path.clone(), json)
        };

        let budget = self.retry.attempts();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.writer.persist(&dir, &json).await {
                Ok(()) => {
                    // Clear exactly what we flushed; anything queued while the
                    // write was in flight stays for the next flush.
                    let mut p = self.pending.lock();
                    for update in &pending {
                        let unchanged = p.get(&update.item_id).is_some_and(|cur| {
                            cur.queued_at == update.queued_at && cur.status == update.status
                        });
                        if unchanged {
                            p.remove(&update.item_id);
                        }
                    }
                    debug!(updates = pending.len(), attempts = attempt, "flushed registry");
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt < budget => {
                    let delay = self.retry.delay_after(attempt);
                    debug!(
                        attempt,
                        code = err.code.as_deref().unwrap_or("?"),
                        delay_ms = delay.as_millis() as u64,
                        "flush attempt failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!(
                        attempts = attempt,
                        code = err.code.as_deref().unwrap_or("none"),
                        "flush failed; writing recovery file"
                    );
                    write_recovery_file(&dir, &err, attempt, &pending).await;
                    return Err(err.into());
                }
            }
        }
    }

    /// Replace the registry and persist it immediately.
    ///
    /// The backlog is schema-validated before anything is written. Cycle
    /// detection over the dependency graph is the planning pipeline's
    /// explicit step (see [`crate::deps`]); the store does not repeat it.
    /// Pending intents are cleared — the persisted registry already
    /// reflects them.
    #[instrument(skip(self, backlog), err)]
    pub async fn save_backlog(&self, backlog: &Backlog) -> Result<(), StoreError> {
        validate_backlog(backlog)?;
        let dir = {
            let guard = self.session.read();
            guard
                .as_ref()
                .ok_or(StoreError::NoSession)?
                .metadata
                .path
                .clone()
        };
        let json =
            serde_json::to_string_pretty(backlog).map_err(|e| schema_error(TASKS_FILE, &e))?;
        self.writer.persist(&dir, &json).await?;
        {
            let mut guard = self.session.write();
            let session = guard.as_mut().ok_or(StoreError::NoSession)?;
            session.registry = backlog.clone();
        }
        self.pending.lock().clear();
        Ok(())
    }

    /// Read the registry back from disk, refresh the in-memory copy, and
    /// return it.
    #[instrument(skip(self), err)]
    pub async fn load_backlog(&self) -> Result<Backlog, StoreError> {
        let dir = {
            let guard = self.session.read();
            guard
                .as_ref()
                .ok_or(StoreError::NoSession)?
                .metadata
                .path
                .clone()
        };
        let tasks_path = dir.join(TASKS_FILE);
        let json = tokio::fs::read_to_string(&tasks_path)
            .await
            .map_err(|e| SessionFileError::new("read", &tasks_path, e))?;
        let backlog: Backlog =
            serde_json::from_str(&json).map_err(|e| schema_error(TASKS_FILE, &e))?;
        validate_backlog(&backlog)?;
        {
            let mut guard = self.session.write();
            let session = guard.as_mut().ok_or(StoreError::NoSession)?;
            session.registry = backlog.clone();
        }
        Ok(backlog)
    }

    /// Whether the current session's hash differs from the PRD hash cached
    /// at [`initialize`](Self::initialize) — true once a delta session has
    /// been swapped in.
    pub fn has_session_changed(&self) -> Result<bool, StoreError> {
        let initial = self
            .initial_hash
            .lock()
            .clone()
            .ok_or(StoreError::NoSession)?;
        let prefix: String = initial.chars().take(HASH_PREFIX_LEN).collect();
        let guard = self.session.read();
        let session = guard.as_ref().ok_or(StoreError::NoSession)?;
        Ok(session.metadata.hash != prefix)
    }

    /// Persist a generated plan artifact under `<session>/prps/<id>.json`
    /// so a resumed session can reuse it without regenerating.
    #[instrument(skip(self, prp), fields(subtask = %prp.task_id), err)]
    pub async fn save_prp_document(&self, prp: &PrpDocument) -> Result<(), StoreError> {
        let dir = {
            let guard = self.session.read();
            guard
                .as_ref()
                .ok_or(StoreError::NoSession)?
                .metadata
                .path
                .join(PRP_DIR)
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SessionFileError::new("create prp dir", &dir, e))?;
        let path = dir.join(format!("{}.json", prp.task_id));
        let json = serde_json::to_string_pretty(prp)
            .map_err(|e| schema_error("prp document", &e))?;
        write_file(&path, &json).await?;
        Ok(())
    }

    /// Load a previously persisted plan artifact, if one exists.
    pub async fn load_prp_document(
        &self,
        id: &ItemId,
    ) -> Result<Option<PrpDocument>, StoreError> {
        let path = {
            let guard = self.session.read();
            guard
                .as_ref()
                .ok_or(StoreError::NoSession)?
                .metadata
                .path
                .join(PRP_DIR)
                .join(format!("{id}.json"))
        };
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionFileError::new("read", &path, e).into()),
        };
        let prp = serde_json::from_str(&json).map_err(|e| schema_error("prp document", &e))?;
        Ok(Some(prp))
    }

    /// Clone of the active session state, if one is active.
    #[must_use]
    pub fn current_session(&self) -> Option<SessionState> {
        self.session.read().clone()
    }

    /// Clone of the in-memory registry.
    pub fn backlog_snapshot(&self) -> Result<Backlog, StoreError> {
        let guard = self.session.read();
        Ok(guard.as_ref().ok_or(StoreError::NoSession)?.registry.clone())
    }

    /// The PRD path this store was built over.
    #[must_use]
    pub fn prd_path(&self) -> &Path {
        &self.prd_path
    }

    /// The plan directory sessions are persisted under.
    #[must_use]
    pub fn plan_dir(&self) -> &Path {
        &self.plan_dir
    }
}

async fn dir_created_at(path: &Path) -> DateTime<Utc> {
    match tokio::fs::metadata(path).await {
        Ok(md) => md
            .created()
            .or_else(|_| md.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now()),
        Err(_) => Utc::now(),
    }
}

async fn session_metadata(path: &Path, id: SessionId) -> Result<SessionMetadata, SessionFileError> {
    let md = tokio::fs::metadata(path)
        .await
        .map_err(|e| SessionFileError::new("stat", path, e))?;
    if !md.is_dir() {
        return Err(SessionFileError::new(
            "stat",
            path,
            io::Error::other("not a directory"),
        ));
    }
    let parent_session = match tokio::fs::read_to_string(path.join(PARENT_SESSION_FILE)).await {
        Ok(contents) => contents.trim().parse().ok(),
        Err(_) => None,
    };
    Ok(SessionMetadata {
        hash: id.hash_prefix().to_string(),
        id,
        path: path.to_path_buf(),
        created_at: dir_created_at(path).await,
        parent_session,
    })
}
