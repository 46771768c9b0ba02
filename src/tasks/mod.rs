//! The task model: IDs, the typed hierarchy, contracts, plan artifacts and
//! schema validation.
//!
//! Everything the rest of the engine schedules, persists or reports on is
//! defined here. The module is pure data — no I/O, no async.

pub mod context;
pub mod id;
pub mod item;
pub mod prp;
pub mod validate;

pub use context::{CONTRACT_HEADER, ContextScope, ContextScopeError, ContractSection};
pub use id::{IdError, ItemId, ItemKind};
pub use item::{Backlog, BacklogStats, ItemRef, Milestone, Phase, Status, Subtask, Task};
pub use prp::{PrpDocument, SuccessCriterion, ValidationGate};
pub use validate::{STORY_POINTS_RANGE, TITLE_MAX_CHARS, ValidationError, validate_backlog};
