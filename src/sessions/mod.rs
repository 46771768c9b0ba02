//! Session lifecycle and persistence.
//!
//! A session is a hash-identified workspace directory holding the PRD
//! snapshot and the current task registry. This module owns session
//! identity ([`metadata`]), the filesystem protocols ([`fsio`]), PRD diffing
//! for delta sessions ([`diff`]) and the store itself ([`store`]).

pub mod diff;
pub mod fsio;
pub mod metadata;
pub mod store;

pub use diff::diff_summary;
pub use fsio::{
    AtomicBacklogWriter, BacklogWriter, MAX_RETRY_BOUND, PARENT_SESSION_FILE, PRD_SNAPSHOT_FILE,
    PRP_DIR, PendingUpdate, RECOVERY_FILE, RETRYABLE_CODES, RetryPolicy, SessionFileError,
    TASKS_FILE,
};
pub use metadata::{HASH_PREFIX_LEN, SessionId, SessionIdError, SessionMetadata};
pub use store::{DeltaContext, SessionState, SessionStore, SessionStoreBuilder, StoreError};
