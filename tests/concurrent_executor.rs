//! Concurrent execution scenarios: dependency-respecting release, bounded
//! parallelism, deadlock detection, failure isolation, skip policy and
//! cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use taskloom::config::ExecutorConfig;
use taskloom::executor::{ConcurrentExecutor, ExecutorError};
use taskloom::ports::SubtaskExecutor;
use taskloom::sessions::{RetryPolicy, SessionStore};
use taskloom::tasks::{Backlog, Status};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn config(max_concurrency: usize) -> ExecutorConfig {
    ExecutorConfig::default().with_max_concurrency(max_concurrency)
}

async fn counting_store(backlog: Backlog) -> (TempDir, Arc<SessionStore>, Arc<FlakyWriter>) {
    let tmp = TempDir::new().unwrap();
    let prd = write_prd(tmp.path(), "# PRD\n");
    let writer = Arc::new(FlakyWriter::counting());
    let store = Arc::new(
        SessionStore::builder(&prd, tmp.path().join("sessions"))
            .writer(writer.clone())
            .retry(RetryPolicy::new(1))
            .build(),
    );
    store.initialize().await.unwrap();
    store.save_backlog(&backlog).await.unwrap();
    (tmp, store, writer)
}

fn all_subtask_ids(store: &SessionStore) -> Vec<taskloom::tasks::ItemId> {
    store
        .backlog_snapshot()
        .unwrap()
        .subtasks()
        .map(|s| s.id.clone())
        .collect()
}

#[tokio::test]
async fn happy_linear_chain_executes_in_dependency_order() {
    let (_tmp, store, writer) = counting_store(chain_backlog()).await;
    let agent = Arc::new(RecordingExecutor::new().with_delay(Duration::from_millis(10)));
    let executor = ConcurrentExecutor::new(
        store.clone(),
        agent.clone() as Arc<dyn SubtaskExecutor>,
        config(3),
    );

    let baseline = writer.attempts();
    let summary = executor
        .execute(&all_subtask_ids(&store), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(agent.started(), vec![sid(1), sid(2), sid(3)]);
    for n in 1..=3 {
        assert_eq!(status_of(&store, &sid(n)), Status::Complete);
    }
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.batches, 3, "one batch per chain link");
    assert!(
        writer.attempts() - baseline >= summary.batches,
        "persistence at least once per batch"
    );
}

#[tokio::test]
async fn parallel_siblings_gate_their_join() {
    let (_tmp, store, _) = counting_store(join_backlog()).await;
    let agent = Arc::new(RecordingExecutor::new().with_delay(Duration::from_millis(20)));
    let executor = ConcurrentExecutor::new(
        store.clone(),
        agent.clone() as Arc<dyn SubtaskExecutor>,
        config(2),
    );

    let summary = executor
        .execute(&all_subtask_ids(&store), &CancellationToken::new())
        .await
        .unwrap();

    // S3 must not start until both S1 and S2 are Complete.
    let started = agent.started();
    assert_eq!(started.len(), 3);
    assert_eq!(started[2], sid(3));
    let finished = agent.finished();
    assert!(finished[..2].contains(&sid(1)) && finished[..2].contains(&sid(2)));

    for n in 1..=3 {
        assert_eq!(status_of(&store, &sid(n)), Status::Complete);
    }
    assert_eq!(summary.batches, 2);
}

#[tokio::test]
async fn circular_dependencies_deadlock_without_executing() {
    let (_tmp, store, _) = counting_store(deadlock_backlog()).await;
    let agent = Arc::new(RecordingExecutor::new());
    let executor = ConcurrentExecutor::new(
        store.clone(),
        agent.clone() as Arc<dyn SubtaskExecutor>,
        config(2),
    );

    let err = executor
        .execute(&all_subtask_ids(&store), &CancellationToken::new())
        .await
        .unwrap_err();

    let ExecutorError::Deadlock { blocked } = err else {
        panic!("expected Deadlock, got {err:?}");
    };
    assert_eq!(blocked.len(), 2);
    let s1 = blocked.iter().find(|b| b.id == sid(1)).unwrap();
    assert_eq!(s1.blocking, vec![sid(2)]);
    let s2 = blocked.iter().find(|b| b.id == sid(2)).unwrap();
    assert_eq!(s2.blocking, vec![sid(1)]);

    // No subtask ever reached Implementing.
    assert!(agent.started().is_empty());
    assert_eq!(status_of(&store, &sid(1)), Status::Planned);
    assert_eq!(status_of(&store, &sid(2)), Status::Planned);
}

#[tokio::test]
async fn failures_are_isolated_per_subtask() {
    let (_tmp, store, _) = counting_store(independent_backlog(3)).await;
    let agent = Arc::new(RecordingExecutor::new().failing_for([sid(2)]));
    let executor = ConcurrentExecutor::new(
        store.clone(),
        agent.clone() as Arc<dyn SubtaskExecutor>,
        config(3),
    );

    let summary = executor
        .execute(&all_subtask_ids(&store), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(status_of(&store, &sid(1)), Status::Complete);
    assert_eq!(status_of(&store, &sid(2)), Status::Failed);
    assert_eq!(status_of(&store, &sid(3)), Status::Complete);

    assert_eq!(summary.total, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.batches, 1);
    let failure = &summary.failures[0];
    assert_eq!(failure.id, sid(2));
    assert!(failure.message.contains("injected failure"), "{}", failure.message);
}

#[tokio::test]
async fn reported_failure_is_distinguished_from_a_throw() {
    let (_tmp, store, _) = counting_store(independent_backlog(2)).await;
    let agent = Arc::new(
        RecordingExecutor::new()
            .failing_for([sid(1)])
            .reporting_failure_for([sid(2)]),
    );
    let executor =
        ConcurrentExecutor::new(store.clone(), agent as Arc<dyn SubtaskExecutor>, config(2));

    let summary = executor
        .execute(&all_subtask_ids(&store), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, 2);
    let thrown = summary.failures.iter().find(|f| f.id == sid(1)).unwrap();
    let reported = summary.failures.iter().find(|f| f.id == sid(2)).unwrap();
    assert!(thrown.message.contains("injected failure"));
    assert!(reported.message.contains("reported failure"));
}

#[tokio::test]
async fn concurrency_never_exceeds_the_bound() {
    let (_tmp, store, _) = counting_store(independent_backlog(6)).await;
    let agent = Arc::new(RecordingExecutor::new().with_delay(Duration::from_millis(30)));
    let executor = ConcurrentExecutor::new(
        store.clone(),
        agent.clone() as Arc<dyn SubtaskExecutor>,
        config(2),
    );

    let summary = executor
        .execute(&all_subtask_ids(&store), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.completed, 6);
    assert!(
        agent.max_concurrency() <= 2,
        "observed {} concurrent executions",
        agent.max_concurrency()
    );
}

#[tokio::test]
async fn zero_concurrency_fails_fast() {
    let (_tmp, store, _) = counting_store(independent_backlog(1)).await;
    let agent = Arc::new(RecordingExecutor::new());
    let executor = ConcurrentExecutor::new(
        store.clone(),
        agent.clone() as Arc<dyn SubtaskExecutor>,
        config(0),
    );

    let err = executor
        .execute(&all_subtask_ids(&store), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::InvalidConfiguration));
    assert!(err.to_string().contains("Invalid configuration"));
    assert!(agent.started().is_empty());
}

#[tokio::test]
async fn terminal_subtasks_are_skipped_entirely() {
    let mut backlog = independent_backlog(3);
    backlog.backlog[0].milestones[0].tasks[0].subtasks[1].status = Status::Failed;
    let (_tmp, store, _) = counting_store(backlog).await;
    let agent = Arc::new(RecordingExecutor::new());
    let executor = ConcurrentExecutor::new(
        store.clone(),
        agent.clone() as Arc<dyn SubtaskExecutor>,
        config(3),
    );

    let summary = executor
        .execute(&all_subtask_ids(&store), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.completed, 2);
    // No execution and no status change for the terminal subtask.
    assert!(!agent.started().contains(&sid(2)));
    assert_eq!(status_of(&store, &sid(2)), Status::Failed);
}

#[tokio::test]
async fn pre_triggered_cancellation_stops_batch_formation() {
    let (_tmp, store, _) = counting_store(independent_backlog(3)).await;
    let agent = Arc::new(RecordingExecutor::new());
    let executor = ConcurrentExecutor::new(
        store.clone(),
        agent.clone() as Arc<dyn SubtaskExecutor>,
        config(3),
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = executor
        .execute(&all_subtask_ids(&store), &cancel)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.batches, 0);
    assert!(agent.started().is_empty());
}

#[tokio::test]
async fn cancellation_lets_in_flight_work_finish() {
    let (_tmp, store, _) = counting_store(chain_backlog()).await;
    let agent = Arc::new(RecordingExecutor::new().with_delay(Duration::from_millis(80)));
    let executor = ConcurrentExecutor::new(
        store.clone(),
        agent.clone() as Arc<dyn SubtaskExecutor>,
        config(3),
    );

    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            cancel.cancel();
        })
    };

    let summary = executor
        .execute(&all_subtask_ids(&store), &cancel)
        .await
        .unwrap();
    canceller.await.unwrap();

    // The first batch (S1) was in flight at cancellation and still ran to
    // completion with its result recorded; later batches never formed.
    assert!(summary.cancelled);
    assert_eq!(status_of(&store, &sid(1)), Status::Complete);
    assert_eq!(status_of(&store, &sid(2)), Status::Planned);
    assert_eq!(status_of(&store, &sid(3)), Status::Planned);
}

#[tokio::test]
async fn dependencies_persist_before_dependents_launch() {
    // Happens-before: when S2 starts, S1's Complete is already on disk.
    let (_tmp, store, _) = counting_store(chain_backlog()).await;
    let agent = Arc::new(RecordingExecutor::new());
    let executor = ConcurrentExecutor::new(
        store.clone(),
        agent as Arc<dyn SubtaskExecutor>,
        config(1),
    );

    executor
        .execute(&[sid(1)], &CancellationToken::new())
        .await
        .unwrap();

    // After the S1 batch, disk already shows S1 Complete.
    let on_disk = store.load_backlog().await.unwrap();
    assert_eq!(on_disk.find_subtask(&sid(1)).unwrap().status, Status::Complete);
}
