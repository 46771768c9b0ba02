//! The typed task hierarchy and its container.
//!
//! A [`Backlog`] is the entire plan for one session: phases containing
//! milestones containing tasks containing subtasks. Subtasks are the only
//! executable leaves; everything above them exists for scoping and status
//! roll-up. The hierarchy is a closed set of variants dispatched through
//! [`ItemRef`] — there is no open polymorphism, and validation is by schema
//! (see [`crate::tasks::validate`]), not by type identity.
//!
//! Items are created when a registry is loaded or written, their status is
//! mutated only through the session store's update path, and they are
//! destroyed only by replacing the whole registry.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::context::ContextScope;
use super::id::{ItemId, ItemKind};

/// Lifecycle status of any item in the hierarchy.
///
/// Serialized case-sensitively as the variant name. The store enforces no
/// transition matrix; ordering of transitions is the scheduler's contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Planned,
    Researching,
    Implementing,
    Complete,
    Failed,
    Obsolete,
}

impl Status {
    /// Terminal states are entered at most once per session and are never
    /// re-executed.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Obsolete)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planned => "Planned",
            Self::Researching => "Researching",
            Self::Implementing => "Implementing",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
            Self::Obsolete => "Obsolete",
        };
        f.write_str(s)
    }
}

/// The atomic execution unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: ItemId,
    pub title: String,
    pub status: Status,
    /// Effort estimate, 1..=21.
    pub story_points: u8,
    /// IDs of subtasks in the same registry that must be Complete first.
    #[serde(default)]
    pub dependencies: Vec<ItemId>,
    pub context_scope: ContextScope,
}

/// A task groups subtasks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    pub status: Status,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

/// A milestone groups tasks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    pub status: Status,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// A phase groups milestones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    pub status: Status,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

/// Borrowed view over any level of the hierarchy, for uniform dispatch.
#[derive(Clone, Copy, Debug)]
pub enum ItemRef<'a> {
    Phase(&'a Phase),
    Milestone(&'a Milestone),
    Task(&'a Task),
    Subtask(&'a Subtask),
}

impl<'a> ItemRef<'a> {
    #[must_use]
    pub fn id(self) -> &'a ItemId {
        match self {
            Self::Phase(p) => &p.id,
            Self::Milestone(m) => &m.id,
            Self::Task(t) => &t.id,
            Self::Subtask(s) => &s.id,
        }
    }

    #[must_use]
    pub fn title(self) -> &'a str {
        match self {
            Self::Phase(p) => &p.title,
            Self::Milestone(m) => &m.title,
            Self::Task(t) => &t.title,
            Self::Subtask(s) => &s.title,
        }
    }

    #[must_use]
    pub fn status(self) -> Status {
        match self {
            Self::Phase(p) => p.status,
            Self::Milestone(m) => m.status,
            Self::Task(t) => t.status,
            Self::Subtask(s) => s.status,
        }
    }

    /// The structural kind of the referenced item (not derived from its ID).
    #[must_use]
    pub fn kind(self) -> ItemKind {
        match self {
            Self::Phase(_) => ItemKind::Phase,
            Self::Milestone(_) => ItemKind::Milestone,
            Self::Task(_) => ItemKind::Task,
            Self::Subtask(_) => ItemKind::Subtask,
        }
    }
}

/// Per-status counts over a registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BacklogStats {
    pub planned: usize,
    pub researching: usize,
    pub implementing: usize,
    pub complete: usize,
    pub failed: usize,
    pub obsolete: usize,
    /// Sum of story points over all subtasks.
    pub total_story_points: u32,
    /// Story points of Complete subtasks.
    pub completed_story_points: u32,
}

impl BacklogStats {
    #[must_use]
    pub fn total_subtasks(&self) -> usize {
        self.planned
            + self.researching
            + self.implementing
            + self.complete
            + self.failed
            + self.obsolete
    }
}

/// The entire hierarchical plan for one session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Backlog {
    #[serde(default)]
    pub backlog: Vec<Phase>,
}

impl Backlog {
    /// An empty registry, the initial state of a fresh session.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// DFS pre-order walk over every item, left to right.
    pub fn walk(&self) -> impl Iterator<Item = ItemRef<'_>> {
        let mut out = Vec::new();
        for phase in &self.backlog {
            out.push(ItemRef::Phase(phase));
            for milestone in &phase.milestones {
                out.push(ItemRef::Milestone(milestone));
                for task in &milestone.tasks {
                    out.push(ItemRef::Task(task));
                    out.extend(task.subtasks.iter().map(ItemRef::Subtask));
                }
            }
        }
        out.into_iter()
    }

    /// Every subtask in registry order (the leaves of the pre-order walk).
    pub fn subtasks(&self) -> impl Iterator<Item = &Subtask> {
        self.backlog.iter().flat_map(|p| {
            p.milestones
                .iter()
                .flat_map(|m| m.tasks.iter().flat_map(|t| t.subtasks.iter()))
        })
    }

    /// Locate any item by ID.
    #[must_use]
    pub fn find(&self, id: &ItemId) -> Option<ItemRef<'_>> {
        self.walk().find(|item| item.id() == id)
    }

    /// Locate a subtask by ID.
    #[must_use]
    pub fn find_subtask(&self, id: &ItemId) -> Option<&Subtask> {
        self.subtasks().find(|s| &s.id == id)
    }

    /// Position of a subtask in registry order, used for deterministic
    /// batch ordering.
    #[must_use]
    pub fn subtask_position(&self, id: &ItemId) -> Option<usize> {
        self.subtasks().position(|s| &s.id == id)
    }

    /// Set the status of the item named by `id`. Returns `false` when the ID
    /// names nothing in this registry.
    pub fn set_status(&mut self, id: &ItemId, status: Status) -> bool {
        for phase in &mut self.backlog {
            if &phase.id == id {
                phase.status = status;
                return true;
            }
            for milestone in &mut phase.milestones {
                if &milestone.id == id {
                    milestone.status = status;
                    return true;
                }
                for task in &mut milestone.tasks {
                    if &task.id == id {
                        task.status = status;
                        return true;
                    }
                    for subtask in &mut task.subtasks {
                        if &subtask.id == id {
                            subtask.status = status;
                            return true;
                        }
                    }
                }
            }
        }
        false
    }

    /// Subtask status counts and story-point totals.
    #[must_use]
    pub fn stats(&self) -> BacklogStats {
        let mut stats = BacklogStats::default();
        for subtask in self.subtasks() {
            let points = u32::from(subtask.story_points);
            stats.total_story_points += points;
            match subtask.status {
                Status::Planned => stats.planned += 1,
                Status::Researching => stats.researching += 1,
                Status::Implementing => stats.implementing += 1,
                Status::Complete => {
                    stats.complete += 1;
                    stats.completed_story_points += points;
                }
                Status::Failed => stats.failed += 1,
                Status::Obsolete => stats.obsolete += 1,
            }
        }
        stats
    }
}
