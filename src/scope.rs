//! Execution scope: what part of the registry a run covers.
//!
//! A scope is parsed from a user-supplied string — either the literal
//! `"all"` or a dotted item ID — and resolved against a registry into the
//! ordered sequence of items the scheduler will process. Resolution is
//! read-only and eager; the scheduler's queue is exactly the resolver's
//! output.

use std::fmt;
use std::str::FromStr;

use miette::Diagnostic;
use thiserror::Error;

use crate::tasks::{Backlog, ItemId, ItemKind};

/// The accepted forms, quoted in parse errors.
pub const EXPECTED_FORMAT: &str = "\"all\" | P<n> | P<n>.M<n> | P<n>.M<n>.T<n> | P<n>.M<n>.T<n>.S<n>";

/// A parsed execution scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Every subtask in the registry, leaves only, in registry order.
    All,
    /// The subtree rooted at one phase.
    Phase(ItemId),
    /// The subtree rooted at one milestone.
    Milestone(ItemId),
    /// The subtree rooted at one task.
    Task(ItemId),
    /// A single subtask.
    Subtask(ItemId),
}

impl Scope {
    /// The root ID, when the scope is not `All`.
    #[must_use]
    pub fn id(&self) -> Option<&ItemId> {
        match self {
            Self::All => None,
            Self::Phase(id) | Self::Milestone(id) | Self::Task(id) | Self::Subtask(id) => Some(id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            None => f.write_str("all"),
            Some(id) => write!(f, "{id}"),
        }
    }
}

/// A scope string that matches neither `"all"` nor the ID grammar.
///
/// Surfaced to the caller; never taints session state.
#[derive(Debug, Error, Diagnostic)]
#[error("cannot parse scope {invalid_input:?}")]
#[diagnostic(
    code(taskloom::scope::parse),
    help("Expected one of: {expected_format}")
)]
pub struct ScopeParseError {
    pub invalid_input: String,
    pub expected_format: &'static str,
}

impl FromStr for Scope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "all" {
            return Ok(Self::All);
        }
        let id: ItemId = trimmed.parse().map_err(|_| ScopeParseError {
            invalid_input: s.to_string(),
            expected_format: EXPECTED_FORMAT,
        })?;
        Ok(match id.kind() {
            ItemKind::Phase => Self::Phase(id),
            ItemKind::Milestone => Self::Milestone(id),
            ItemKind::Task => Self::Task(id),
            ItemKind::Subtask => Self::Subtask(id),
        })
    }
}

/// Resolve a scope against a registry into an ordered item sequence.
///
/// `All` yields every subtask (leaves only) in registry order. A specific
/// ID yields the DFS pre-order of its subtree: the item itself, then its
/// descendants left to right. An ID that names nothing yields an empty
/// sequence. The registry is never mutated.
#[must_use]
pub fn resolve(backlog: &Backlog, scope: &Scope) -> Vec<ItemId> {
    match scope {
        Scope::All => backlog.subtasks().map(|s| s.id.clone()).collect(),
        Scope::Phase(id) | Scope::Milestone(id) | Scope::Task(id) | Scope::Subtask(id) => {
            if backlog.find(id).is_none() {
                return Vec::new();
            }
            backlog
                .walk()
                .filter(|item| item.id().is_within(id))
                .map(|item| item.id().clone())
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_and_every_depth() {
        assert_eq!("all".parse::<Scope>().unwrap(), Scope::All);
        assert_eq!(" all ".parse::<Scope>().unwrap(), Scope::All);
        assert!(matches!("P1".parse::<Scope>().unwrap(), Scope::Phase(_)));
        assert!(matches!(
            "P1.M2".parse::<Scope>().unwrap(),
            Scope::Milestone(_)
        ));
        assert!(matches!("P1.M2.T3".parse::<Scope>().unwrap(), Scope::Task(_)));
        assert!(matches!(
            "P1.M2.T3.S4".parse::<Scope>().unwrap(),
            Scope::Subtask(_)
        ));
    }

    #[test]
    fn rejects_garbage_with_expected_format() {
        for bad in ["ALL", "All", "everything", "P1.S1", "", "P1..M1"] {
            let err = bad.parse::<Scope>().unwrap_err();
            assert_eq!(err.invalid_input, bad);
            assert_eq!(err.expected_format, EXPECTED_FORMAT);
        }
    }
}
