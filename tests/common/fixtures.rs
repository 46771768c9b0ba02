use std::path::Path;
use std::sync::Arc;

use taskloom::sessions::{RetryPolicy, SessionStore};
use taskloom::tasks::{
    Backlog, CONTRACT_HEADER, ContextScope, ItemId, Milestone, Phase, Status, Subtask, Task,
};
use tempfile::TempDir;

pub fn contract() -> ContextScope {
    ContextScope::new(format!(
        "{CONTRACT_HEADER}1. RESEARCH NOTE: none\n2. INPUT: registry\n3. LOGIC: execute\n4. OUTPUT: status\n"
    ))
    .expect("fixture contract is well-formed")
}

pub fn task_id() -> ItemId {
    ItemId::phase(1).milestone(1).task(1)
}

/// `P1.M1.T1.S<n>`.
pub fn sid(n: u32) -> ItemId {
    task_id().subtask(n)
}

pub fn subtask_with_deps(n: u32, deps: &[u32]) -> Subtask {
    Subtask {
        id: sid(n),
        title: format!("subtask {n}"),
        status: Status::Planned,
        story_points: 3,
        dependencies: deps.iter().map(|d| sid(*d)).collect(),
        context_scope: contract(),
    }
}

/// One phase/milestone/task spine holding the given subtasks.
pub fn backlog_of(subtasks: Vec<Subtask>) -> Backlog {
    Backlog {
        backlog: vec![Phase {
            id: ItemId::phase(1),
            title: "phase one".into(),
            description: "fixture phase".into(),
            status: Status::Planned,
            milestones: vec![Milestone {
                id: ItemId::phase(1).milestone(1),
                title: "milestone one".into(),
                description: "fixture milestone".into(),
                status: Status::Planned,
                tasks: vec![Task {
                    id: task_id(),
                    title: "task one".into(),
                    description: "fixture task".into(),
                    status: Status::Planned,
                    subtasks,
                }],
            }],
        }],
    }
}

/// S1 <- S2 <- S3 (a strict chain).
pub fn chain_backlog() -> Backlog {
    backlog_of(vec![
        subtask_with_deps(1, &[]),
        subtask_with_deps(2, &[1]),
        subtask_with_deps(3, &[2]),
    ])
}

/// S1 and S2 independent; S3 depends on both.
pub fn join_backlog() -> Backlog {
    backlog_of(vec![
        subtask_with_deps(1, &[]),
        subtask_with_deps(2, &[]),
        subtask_with_deps(3, &[1, 2]),
    ])
}

/// N independent subtasks.
pub fn independent_backlog(n: u32) -> Backlog {
    backlog_of((1..=n).map(|i| subtask_with_deps(i, &[])).collect())
}

/// S1 and S2 depend on each other, for the executor's progress-based
/// deadlock tests. Schema-valid; only the separate cycle detector rejects it.
pub fn deadlock_backlog() -> Backlog {
    backlog_of(vec![subtask_with_deps(1, &[2]), subtask_with_deps(2, &[1])])
}

/// Write a PRD with the given contents into `dir` and return its path.
pub fn write_prd(dir: &Path, contents: &str) -> std::path::PathBuf {
    let prd = dir.join("requirements.md");
    std::fs::write(&prd, contents).expect("write PRD fixture");
    prd
}

/// A store over a fresh temp workspace, initialized and seeded with the
/// given backlog.
pub async fn ready_store(backlog: Backlog) -> (TempDir, Arc<SessionStore>) {
    taskloom::telemetry::init_tracing();
    let tmp = TempDir::new().expect("create temp workspace");
    let prd = write_prd(tmp.path(), "# Fixture PRD\n\nBuild the thing.\n");
    let store = Arc::new(
        SessionStore::builder(&prd, tmp.path().join("sessions"))
            .retry(RetryPolicy::new(1))
            .build(),
    );
    store.initialize().await.expect("initialize session");
    store.save_backlog(&backlog).await.expect("seed backlog");
    (tmp, store)
}

/// Current status of a subtask in the store's registry.
pub fn status_of(store: &SessionStore, id: &ItemId) -> Status {
    store
        .backlog_snapshot()
        .expect("active session")
        .find_subtask(id)
        .map(|s| s.status)
        .expect("subtask exists")
}
