//! Sequential scheduling: queue materialization, status promotion, and the
//! per-subtask research → implement → terminal flow.

mod common;

use std::sync::Arc;

use common::*;
use taskloom::orchestrator::Orchestrator;
use taskloom::research::ResearchQueue;
use taskloom::scope::Scope;
use taskloom::tasks::{ItemId, Status};

fn orchestrator_with(
    store: Arc<taskloom::sessions::SessionStore>,
    scope: Scope,
    planner: StaticPlanner,
    executor: RecordingExecutor,
) -> (Orchestrator, Arc<RecordingExecutor>, Arc<StaticPlanner>) {
    let planner = Arc::new(planner);
    let executor = Arc::new(executor);
    let research = ResearchQueue::new(planner.clone());
    let orchestrator = Orchestrator::new(store, scope, research, executor.clone())
        .expect("orchestrator over active session");
    (orchestrator, executor, planner)
}

#[tokio::test]
async fn queue_is_materialized_at_construction() {
    let (_tmp, store) = ready_store(chain_backlog()).await;
    let (orchestrator, _, _) = orchestrator_with(
        store.clone(),
        Scope::All,
        StaticPlanner::new(),
        RecordingExecutor::new(),
    );
    assert_eq!(orchestrator.remaining(), 3);

    let (subtree, _, _) = orchestrator_with(
        store,
        "P1".parse().unwrap(),
        StaticPlanner::new(),
        RecordingExecutor::new(),
    );
    // Phase, milestone, task, three subtasks.
    assert_eq!(subtree.remaining(), 6);
}

#[tokio::test]
async fn non_leaf_items_are_promoted_to_implementing() {
    let (_tmp, store) = ready_store(chain_backlog()).await;
    let (mut orchestrator, executor, _) = orchestrator_with(
        store.clone(),
        "P1".parse().unwrap(),
        StaticPlanner::new(),
        RecordingExecutor::new(),
    );

    // P1, P1.M1, P1.M1.T1 promote without touching the executor.
    for expected in ["P1", "P1.M1", "P1.M1.T1"] {
        assert!(orchestrator.process_next().await.unwrap());
        let id: ItemId = expected.parse().unwrap();
        assert_eq!(orchestrator.current_item(), Some(&id));
        let registry = store.backlog_snapshot().unwrap();
        assert_eq!(registry.find(&id).unwrap().status(), Status::Implementing);
    }
    assert!(executor.started().is_empty());
}

#[tokio::test]
async fn subtask_success_runs_to_complete() {
    let (_tmp, store) = ready_store(independent_backlog(1)).await;
    let (mut orchestrator, executor, planner) = orchestrator_with(
        store.clone(),
        Scope::All,
        StaticPlanner::new(),
        RecordingExecutor::new(),
    );

    assert!(orchestrator.process_next().await.unwrap());
    assert_eq!(status_of(&store, &sid(1)), Status::Complete);
    assert_eq!(executor.started(), vec![sid(1)]);
    assert_eq!(planner.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn subtask_throw_is_recorded_as_failed() {
    let (_tmp, store) = ready_store(independent_backlog(2)).await;
    let (mut orchestrator, _, _) = orchestrator_with(
        store.clone(),
        Scope::All,
        StaticPlanner::new(),
        RecordingExecutor::new().failing_for([sid(1)]),
    );

    assert!(orchestrator.process_next().await.unwrap());
    assert_eq!(status_of(&store, &sid(1)), Status::Failed);

    // The traversal is not stopped by the failure.
    assert!(orchestrator.process_next().await.unwrap());
    assert_eq!(status_of(&store, &sid(2)), Status::Complete);
}

#[tokio::test]
async fn reported_failure_is_recorded_as_failed() {
    let (_tmp, store) = ready_store(independent_backlog(1)).await;
    let (mut orchestrator, _, _) = orchestrator_with(
        store.clone(),
        Scope::All,
        StaticPlanner::new(),
        RecordingExecutor::new().reporting_failure_for([sid(1)]),
    );
    assert!(orchestrator.process_next().await.unwrap());
    assert_eq!(status_of(&store, &sid(1)), Status::Failed);
}

#[tokio::test]
async fn plan_generation_failure_marks_the_subtask_failed() {
    let (_tmp, store) = ready_store(independent_backlog(1)).await;
    let (mut orchestrator, executor, _) = orchestrator_with(
        store.clone(),
        Scope::All,
        StaticPlanner::new().failing_for([sid(1)]),
        RecordingExecutor::new(),
    );
    assert!(orchestrator.process_next().await.unwrap());
    assert_eq!(status_of(&store, &sid(1)), Status::Failed);
    // The executor was never invoked without a plan.
    assert!(executor.started().is_empty());
}

#[tokio::test]
async fn empty_queue_returns_false_and_clears_current() {
    let (_tmp, store) = ready_store(independent_backlog(1)).await;
    let (mut orchestrator, _, _) = orchestrator_with(
        store.clone(),
        Scope::All,
        StaticPlanner::new(),
        RecordingExecutor::new(),
    );

    assert!(orchestrator.process_next().await.unwrap());
    assert!(!orchestrator.process_next().await.unwrap());
    assert!(orchestrator.current_item().is_none());
    assert!(store.current_session().unwrap().current_item.is_none());
}

#[tokio::test]
async fn blocking_dependencies_reflect_registry_state() {
    let (_tmp, store) = ready_store(join_backlog()).await;
    let (orchestrator, _, _) = orchestrator_with(
        store.clone(),
        Scope::All,
        StaticPlanner::new(),
        RecordingExecutor::new(),
    );

    let blocking = orchestrator.blocking_dependencies_of(&sid(3)).unwrap();
    assert_eq!(blocking, vec![sid(1), sid(2)]);

    store.update_item_status(&sid(1), Status::Complete).unwrap();
    let blocking = orchestrator.blocking_dependencies_of(&sid(3)).unwrap();
    assert_eq!(blocking, vec![sid(2)]);
}
