//! Schema validation for registries.
//!
//! Every registry that enters the system — freshly generated or read back
//! from disk — passes through [`validate_backlog`] before it is trusted.
//! Validation is structural: field bounds, ID/type agreement, parent/child
//! prefix agreement, and dependency referential integrity. Cycle detection
//! over the dependency graph is a separate concern (see [`crate::deps`]).

use miette::Diagnostic;
use rustc_hash::FxHashSet;
use thiserror::Error;

use super::id::{ItemId, ItemKind};
use super::item::{Backlog, ItemRef};

/// Inclusive bounds on item titles.
pub const TITLE_MAX_CHARS: usize = 200;
/// Inclusive bounds on subtask story points.
pub const STORY_POINTS_RANGE: std::ops::RangeInclusive<u8> = 1..=21;

/// A registry that violates the schema.
#[derive(Debug, Error, Diagnostic)]
pub enum ValidationError {
    #[error("item {id} has a title of {len} chars (must be 1..={TITLE_MAX_CHARS})")]
    #[diagnostic(code(taskloom::tasks::title_length))]
    TitleLength { id: ItemId, len: usize },

    #[error("item {id} has an empty description")]
    #[diagnostic(code(taskloom::tasks::empty_description))]
    EmptyDescription { id: ItemId },

    #[error("subtask {id} has {points} story points (must be 1..=21)")]
    #[diagnostic(code(taskloom::tasks::story_points))]
    StoryPoints { id: ItemId, points: u8 },

    #[error("item {id} is placed as a {structural} but its ID names a {named}")]
    #[diagnostic(
        code(taskloom::tasks::kind_mismatch),
        help("ID depth is the type discriminator; P1.M1 must sit in a milestone slot.")
    )]
    KindMismatch {
        id: ItemId,
        structural: ItemKind,
        named: ItemKind,
    },

    #[error("item {child} is not inside its parent {parent}")]
    #[diagnostic(code(taskloom::tasks::parent_mismatch))]
    ParentMismatch { parent: ItemId, child: ItemId },

    #[error("duplicate item ID {id}")]
    #[diagnostic(code(taskloom::tasks::duplicate_id))]
    DuplicateId { id: ItemId },

    #[error("subtask {id} depends on {dependency}, which is not a subtask in this registry")]
    #[diagnostic(code(taskloom::tasks::unknown_dependency))]
    UnknownDependency { id: ItemId, dependency: ItemId },
}

fn check_common(item: &ItemRef<'_>) -> Result<(), ValidationError> {
    let id = item.id().clone();
    let len = item.title().chars().count();
    if len == 0 || len > TITLE_MAX_CHARS {
        return Err(ValidationError::TitleLength { id, len });
    }
    let named = item.id().kind();
    let structural = item.kind();
    if named != structural {
        return Err(ValidationError::KindMismatch {
            id,
            structural,
            named,
        });
    }
    let description_empty = match item {
        ItemRef::Phase(p) => p.description.is_empty(),
        ItemRef::Milestone(m) => m.description.is_empty(),
        ItemRef::Task(t) => t.description.is_empty(),
        ItemRef::Subtask(_) => false,
    };
    if description_empty {
        return Err(ValidationError::EmptyDescription { id });
    }
    Ok(())
}

fn check_placement(parent: &ItemId, child: &ItemId) -> Result<(), ValidationError> {
    if child.parent().as_ref() != Some(parent) {
        return Err(ValidationError::ParentMismatch {
            parent: parent.clone(),
            child: child.clone(),
        });
    }
    Ok(())
}

/// Validate a registry against the schema, failing on the first violation.
pub fn validate_backlog(backlog: &Backlog) -> Result<(), ValidationError> {
    let mut seen: FxHashSet<&ItemId> = FxHashSet::default();
    for item in backlog.walk() {
        check_common(&item)?;
        if !seen.insert(item.id()) {
            return Err(ValidationError::DuplicateId {
                id: item.id().clone(),
            });
        }
        if let ItemRef::Subtask(subtask) = item {
            if !STORY_POINTS_RANGE.contains(&subtask.story_points) {
                return Err(ValidationError::StoryPoints {
                    id: subtask.id.clone(),
                    points: subtask.story_points,
                });
            }
        }
    }

    // Structural containment: every child ID must extend the ID of the node
    // it actually sits under.
    for phase in &backlog.backlog {
        for milestone in &phase.milestones {
            check_placement(&phase.id, &milestone.id)?;
            for task in &milestone.tasks {
                check_placement(&milestone.id, &task.id)?;
                for subtask in &task.subtasks {
                    check_placement(&task.id, &subtask.id)?;
                }
            }
        }
    }

    // Referential integrity over the dependency edges, after all IDs are known.
    let subtask_ids: FxHashSet<&ItemId> = backlog.subtasks().map(|s| &s.id).collect();
    for subtask in backlog.subtasks() {
        for dep in &subtask.dependencies {
            if !subtask_ids.contains(dep) {
                return Err(ValidationError::UnknownDependency {
                    id: subtask.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }
    Ok(())
}
