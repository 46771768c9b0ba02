//! Item identifiers for the task hierarchy.
//!
//! IDs follow the dotted grammar `P<n>(.M<n>(.T<n>(.S<n>)?)?)?` where `<n>`
//! is a decimal number. The depth of an ID determines the kind of item it
//! names: `P1` is a phase, `P1.M2` a milestone, `P1.M2.T3` a task and
//! `P1.M2.T3.S4` a subtask. IDs serialize as their string form so the
//! on-disk registry stays human-readable.
//!
//! # Examples
//!
//! ```rust
//! use taskloom::tasks::{ItemId, ItemKind};
//!
//! let id: ItemId = "P1.M2.T3.S4".parse().unwrap();
//! assert_eq!(id.kind(), ItemKind::Subtask);
//! assert_eq!(id.to_string(), "P1.M2.T3.S4");
//! assert_eq!(id.parent().unwrap().to_string(), "P1.M2.T3");
//! ```

use std::fmt;
use std::str::FromStr;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four levels of the task hierarchy, from coarsest to finest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKind {
    Phase,
    Milestone,
    Task,
    Subtask,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phase => write!(f, "phase"),
            Self::Milestone => write!(f, "milestone"),
            Self::Task => write!(f, "task"),
            Self::Subtask => write!(f, "subtask"),
        }
    }
}

/// Structured form of a dotted item ID.
///
/// The depth invariant is maintained by construction: a `task` segment is
/// only ever present when `milestone` is, and a `subtask` segment only when
/// `task` is. Ordering follows document order (a parent sorts before its
/// children, siblings sort by number), which makes sorted ID lists agree
/// with registry pre-order for well-formed backlogs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId {
    phase: u32,
    milestone: Option<u32>,
    task: Option<u32>,
    subtask: Option<u32>,
}

impl ItemId {
    /// Create a phase-level ID (`P<n>`).
    #[must_use]
    pub fn phase(n: u32) -> Self {
        Self {
            phase: n,
            milestone: None,
            task: None,
            subtask: None,
        }
    }

    /// Extend a phase ID into a milestone ID (`P<n>.M<m>`).
    #[must_use]
    pub fn milestone(mut self, n: u32) -> Self {
        debug_assert_eq!(self.kind(), ItemKind::Phase, "milestone() extends a phase ID");
        self.milestone = Some(n);
        self
    }

    /// Extend a milestone ID into a task ID (`P<n>.M<m>.T<t>`).
    #[must_use]
    pub fn task(mut self, n: u32) -> Self {
        debug_assert_eq!(
            self.kind(),
            ItemKind::Milestone,
            "task() extends a milestone ID"
        );
        self.task = Some(n);
        self
    }

    /// Extend a task ID into a subtask ID (`P<n>.M<m>.T<t>.S<s>`).
    #[must_use]
    pub fn subtask(mut self, n: u32) -> Self {
        debug_assert_eq!(self.kind(), ItemKind::Task, "subtask() extends a task ID");
        self.subtask = Some(n);
        self
    }

    /// The hierarchy level this ID names, derived from its depth.
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        if self.subtask.is_some() {
            ItemKind::Subtask
        } else if self.task.is_some() {
            ItemKind::Task
        } else if self.milestone.is_some() {
            ItemKind::Milestone
        } else {
            ItemKind::Phase
        }
    }

    /// The ID one level up, or `None` for a phase.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let mut parent = self.clone();
        if parent.subtask.take().is_some() {
            return Some(parent);
        }
        if parent.task.take().is_some() {
            return Some(parent);
        }
        if parent.milestone.take().is_some() {
            return Some(parent);
        }
        None
    }

    /// Whether `self` equals `other` or lies in the subtree rooted at `other`.
    #[must_use]
    pub fn is_within(&self, other: &Self) -> bool {
        if self.phase != other.phase {
            return false;
        }
        for (mine, theirs) in [
            (self.milestone, other.milestone),
            (self.task, other.task),
            (self.subtask, other.subtask),
        ] {
            match (mine, theirs) {
                (_, None) => return true,
                (None, Some(_)) => return false,
                (Some(a), Some(b)) if a != b => return false,
                _ => {}
            }
        }
        true
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.phase)?;
        if let Some(m) = self.milestone {
            write!(f, ".M{m}")?;
        }
        if let Some(t) = self.task {
            write!(f, ".T{t}")?;
        }
        if let Some(s) = self.subtask {
            write!(f, ".S{s}")?;
        }
        Ok(())
    }
}

/// Failure to parse a dotted item ID.
#[derive(Debug, Error, Diagnostic)]
#[error("invalid item ID {input:?}: {reason}")]
#[diagnostic(
    code(taskloom::tasks::invalid_id),
    help("Expected the form P<n>, P<n>.M<n>, P<n>.M<n>.T<n> or P<n>.M<n>.T<n>.S<n>.")
)]
pub struct IdError {
    pub input: String,
    pub reason: &'static str,
}

impl IdError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

impl FromStr for ItemId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn segment(input: &str, seg: &str, prefix: char) -> Result<u32, IdError> {
            let Some(digits) = seg.strip_prefix(prefix) else {
                return Err(IdError::new(input, "segment has the wrong level prefix"));
            };
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(IdError::new(input, "segment number must be decimal digits"));
            }
            digits
                .parse()
                .map_err(|_| IdError::new(input, "segment number out of range"))
        }

        if s.is_empty() {
            return Err(IdError::new(s, "empty string"));
        }
        let mut parts = s.split('.');
        let phase = segment(s, parts.next().unwrap_or_default(), 'P')?;
        let mut id = ItemId::phase(phase);
        if let Some(seg) = parts.next() {
            id.milestone = Some(segment(s, seg, 'M')?);
        }
        if let Some(seg) = parts.next() {
            id.task = Some(segment(s, seg, 'T')?);
        }
        if let Some(seg) = parts.next() {
            id.subtask = Some(segment(s, seg, 'S')?);
        }
        if parts.next().is_some() {
            return Err(IdError::new(s, "more than four segments"));
        }
        Ok(id)
    }
}

impl TryFrom<String> for ItemId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.to_string()
    }
}
