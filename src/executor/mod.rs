//! Concurrent subtask execution: dependency-respecting release, bounded
//! parallelism, per-task failure isolation.
//!
//! The executor drains its working set in *batches*. Each round it selects
//! every Planned subtask whose dependencies are all Complete (in registry
//! order), runs the batch under a semaphore of `max_concurrency`, awaits the
//! whole batch, and flushes the store — so a dependency's Complete
//! transition is persisted before any dependent launches. When Planned
//! subtasks remain but nothing is runnable, the run fails with
//! [`ExecutorError::Deadlock`] after logging one structured record per
//! blocked subtask and attempting a final flush.
//!
//! Failures never escape a subtask's own scope: a throwing or reporting
//! executor agent marks that subtask Failed and the run carries on. Only
//! whole-operation conditions (deadlock, a flush that exhausts its retries)
//! propagate.

pub mod resources;

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::ExecutorConfig;
use crate::orchestrator::blocking_dependencies;
use crate::ports::SubtaskExecutor;
use crate::research::ResearchQueue;
use crate::sessions::{SessionStore, StoreError};
use crate::tasks::{Backlog, ItemId, Status, Subtask};

pub use resources::{BACKPRESSURE_SOFT_BOUND, MemoryMonitor};

/// A still-Planned subtask and the dependencies holding it back.
#[derive(Clone, Debug)]
pub struct BlockedSubtask {
    pub id: ItemId,
    pub blocking: Vec<ItemId>,
}

/// One isolated subtask failure, with the captured message.
#[derive(Clone, Debug)]
pub struct SubtaskFailure {
    pub id: ItemId,
    pub message: String,
}

/// Errors that fail the whole execution call.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutorError {
    /// `max_concurrency` was zero at entry.
    #[error("Invalid configuration: max_concurrency must be at least 1")]
    #[diagnostic(code(taskloom::executor::invalid_configuration))]
    InvalidConfiguration,

    /// Planned subtasks remain but none is eligible for the next batch.
    #[error("deadlock: {} subtask(s) remain Planned with no runnable batch", .blocked.len())]
    #[diagnostic(
        code(taskloom::executor::deadlock),
        help("Check the blocking dependencies of each listed subtask; a prerequisite likely Failed or was never scheduled.")
    )]
    Deadlock { blocked: Vec<BlockedSubtask> },

    /// The session store failed (typically a flush that exhausted retries).
    #[error(transparent)]
    #[diagnostic(code(taskloom::executor::store))]
    Store(#[from] StoreError),
}

/// What one execution call did.
#[derive(Clone, Debug, Default)]
pub struct ExecutionSummary {
    /// Size of the working set handed in.
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Subtasks skipped because their starting status was terminal.
    pub skipped: usize,
    pub batches: usize,
    /// True when a cancellation signal stopped batch formation early.
    pub cancelled: bool,
    /// Per-subtask failure messages, in completion order within batches.
    pub failures: Vec<SubtaskFailure>,
}

enum TaskVerdict {
    Completed,
    Failed(SubtaskFailure),
}

/// Executes a set of subtasks under the three batch constraints. Construct
/// one per run or reuse across runs; the executor itself is stateless
/// between calls.
pub struct ConcurrentExecutor {
    store: Arc<SessionStore>,
    agent: Arc<dyn SubtaskExecutor>,
    research: Option<ResearchQueue>,
    monitor: MemoryMonitor,
    config: ExecutorConfig,
}

impl ConcurrentExecutor {
    #[must_use]
    pub fn new(
        store: Arc<SessionStore>,
        agent: Arc<dyn SubtaskExecutor>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            agent,
            research: None,
            monitor: MemoryMonitor::new(),
            config,
        }
    }

    /// Attach a research queue so plans are prefetched for upcoming
    /// subtasks while earlier ones execute.
    #[must_use]
    pub fn with_research(mut self, research: ResearchQueue) -> Self {
        self.research = Some(research);
        self
    }

    /// Execute every subtask in `ids` to a terminal state, honoring
    /// dependencies, the concurrency bound, and the skip policy.
    ///
    /// Returns normally even when subtasks fail; only deadlock and store
    /// failures propagate. A triggered `cancel` stops further batch
    /// formation — in-flight subtasks run to completion and their results
    /// are recorded.
    #[instrument(skip(self, ids, cancel), fields(subtasks = ids.len()), err)]
    pub async fn execute(
        &self,
        ids: &[ItemId],
        cancel: &CancellationToken,
    ) -> Result<ExecutionSummary, ExecutorError> {
        if self.config.max_concurrency == 0 {
            return Err(ExecutorError::InvalidConfiguration);
        }
        let bound = self.config.effective_concurrency();

        let registry = self.store.backlog_snapshot()?;
        let mut working: Vec<ItemId> = Vec::with_capacity(ids.len());
        for id in ids {
            if registry.find_subtask(id).is_some() {
                working.push(id.clone());
            } else {
                warn!(subtask = %id, "ignoring unknown subtask in working set");
            }
        }
        working.sort_by_key(|id| registry.subtask_position(id).unwrap_or(usize::MAX));

        let mut summary = ExecutionSummary {
            total: working.len(),
            ..ExecutionSummary::default()
        };
        summary.skipped = working
            .iter()
            .filter_map(|id| registry.find_subtask(id))
            .filter(|s| s.status.is_terminal())
            .count();

        // Warm the research pipeline for everything we are about to run.
        if let Some(research) = &self.research {
            let shared = Arc::new(registry.clone());
            for id in &working {
                if let Some(subtask) = shared.find_subtask(id) {
                    if subtask.status == Status::Planned {
                        research.enqueue(subtask.clone(), &shared);
                    }
                }
            }
        }

        loop {
            if cancel.is_cancelled() {
                info!("cancellation requested; stopping batch formation");
                summary.cancelled = true;
                break;
            }

            let registry = self.store.backlog_snapshot()?;
            let planned: Vec<Subtask> = working
                .iter()
                .filter_map(|id| registry.find_subtask(id))
                .filter(|s| s.status == Status::Planned)
                .cloned()
                .collect();
            if planned.is_empty() {
                break;
            }

            let batch: Vec<Subtask> = planned
                .iter()
                .filter(|subtask| {
                    subtask.dependencies.iter().all(|dep| {
                        registry
                            .find_subtask(dep)
                            .is_some_and(|d| d.status == Status::Complete)
                    })
                })
                .cloned()
                .collect();

            if batch.is_empty() {
                let blocked: Vec<BlockedSubtask> = planned
                    .iter()
                    .map(|subtask| BlockedSubtask {
                        id: subtask.id.clone(),
                        blocking: blocking_dependencies(&registry, subtask),
                    })
                    .collect();
                for b in &blocked {
                    let blocking: Vec<String> = b.blocking.iter().map(ToString::to_string).collect();
                    error!(
                        subtask = %b.id,
                        blocking = ?blocking,
                        "subtask blocked; no runnable batch"
                    );
                }
                // Persist whatever already transitioned before surfacing.
                if let Err(e) = self.store.flush_updates().await {
                    warn!(error = %e, "flush before deadlock report failed");
                }
                return Err(ExecutorError::Deadlock { blocked });
            }

            summary.batches += 1;
            let batch_total = batch.len();
            let semaphore = Arc::new(Semaphore::new(bound));
            let shared = Arc::new(registry);
            let mut handles = Vec::with_capacity(batch_total);
            for subtask in batch {
                self.monitor
                    .wait_for_headroom(self.config.resource_threshold, BACKPRESSURE_SOFT_BOUND)
                    .await;
                let semaphore = Arc::clone(&semaphore);
                let store = Arc::clone(&self.store);
                let agent = Arc::clone(&self.agent);
                let research = self.research.clone();
                let backlog = Arc::clone(&shared);
                handles.push(tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return TaskVerdict::Failed(SubtaskFailure {
                                id: subtask.id.clone(),
                                message: "execution semaphore closed".into(),
                            });
                        }
                    };
                    run_subtask(&store, agent.as_ref(), research.as_ref(), &backlog, &subtask)
                        .await
                }));
            }

            // Barrier: the whole batch settles before the next one forms.
            let mut failure_count = 0usize;
            for handle in handles {
                match handle.await {
                    Ok(TaskVerdict::Completed) => summary.completed += 1,
                    Ok(TaskVerdict::Failed(failure)) => {
                        failure_count += 1;
                        summary.failed += 1;
                        summary.failures.push(failure);
                    }
                    Err(join_error) => {
                        failure_count += 1;
                        summary.failed += 1;
                        warn!(error = %join_error, "subtask task join error");
                    }
                }
            }
            info!(
                failure_count,
                total = batch_total,
                "batch complete"
            );

            // Dependencies' Complete transitions reach disk before any
            // dependent launches in the next round.
            self.store.flush_updates().await?;
        }

        Ok(summary)
    }
}

/// The per-subtask flow. Exceptions never escape this scope; every outcome
/// is recorded as a status plus (on failure) a captured message.
async fn run_subtask(
    store: &SessionStore,
    agent: &dyn SubtaskExecutor,
    research: Option<&ResearchQueue>,
    backlog: &Backlog,
    subtask: &Subtask,
) -> TaskVerdict {
    let id = &subtask.id;
    if let Err(e) = store.update_item_status(id, Status::Implementing) {
        warn!(subtask = %id, error = %e, "could not mark subtask Implementing");
        return TaskVerdict::Failed(SubtaskFailure {
            id: id.clone(),
            message: e.to_string(),
        });
    }

    // Consult the prefetched plan; a missing or failed plan does not fail
    // the subtask — the agent regenerates on its own if it needs to.
    if let Some(research) = research {
        if research.get_prp(id).is_none() && research.is_researching(id) {
            if let Err(e) = research.wait_for_prp(id).await {
                warn!(subtask = %id, error = %e, "plan prefetch failed; executing without it");
            }
        }
        if let Some(plan) = research.get_prp(id) {
            if let Err(e) = store.save_prp_document(&plan).await {
                warn!(subtask = %id, error = %e, "could not persist plan artifact");
            }
        }
    }

    match agent.execute(subtask, backlog).await {
        Ok(outcome) if outcome.success => {
            record_status(store, id, Status::Complete);
            info!(subtask = %id, reason = "Success", "subtask complete");
            TaskVerdict::Completed
        }
        Ok(outcome) => {
            let message = outcome
                .error
                .unwrap_or_else(|| "executor reported failure without detail".to_string());
            record_status(store, id, Status::Failed);
            warn!(subtask = %id, error = %message, "subtask failed (reported)");
            TaskVerdict::Failed(SubtaskFailure {
                id: id.clone(),
                message,
            })
        }
        Err(e) => {
            let message = e.to_string();
            record_status(store, id, Status::Failed);
            warn!(subtask = %id, error = %message, "subtask failed");
            TaskVerdict::Failed(SubtaskFailure {
                id: id.clone(),
                message,
            })
        }
    }
}

fn record_status(store: &SessionStore, id: &ItemId, status: Status) {
    if let Err(e) = store.update_item_status(id, status) {
        warn!(subtask = %id, status = %status, error = %e, "status update failed");
    }
}
