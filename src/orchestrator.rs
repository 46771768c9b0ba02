//! The hierarchical scheduler.
//!
//! An [`Orchestrator`] resolves a [`Scope`] against the active session's
//! registry at construction time, materializing the whole execution queue
//! up front — DFS pre-order is a property of the queue, not of the runtime,
//! so stepping never recurses or re-enters. [`Orchestrator::process_next`]
//! drains one item per call: non-leaf items are promoted to Implementing
//! (their children are already behind them in the queue when the scope
//! included them), subtasks are driven through the research queue and the
//! external executor to a terminal status.
//!
//! The sequential path does not enforce dependency ordering; when the scope
//! admits parallelism, [`Orchestrator::run_concurrent`] fans the queued
//! subtasks into the [`ConcurrentExecutor`](crate::executor::ConcurrentExecutor),
//! which is the first-class execution path.

use std::collections::VecDeque;
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::ExecutorConfig;
use crate::executor::{ConcurrentExecutor, ExecutionSummary, ExecutorError};
use crate::ports::SubtaskExecutor;
use crate::research::ResearchQueue;
use crate::scope::{Scope, resolve};
use crate::sessions::{SessionStore, StoreError};
use crate::tasks::{Backlog, ItemId, ItemKind, Status, Subtask};

/// Errors from scheduler operations.
#[derive(Debug, Error, Diagnostic)]
pub enum OrchestratorError {
    #[error(transparent)]
    #[diagnostic(code(taskloom::orchestrator::store))]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(code(taskloom::orchestrator::executor))]
    Executor(#[from] ExecutorError),
}

/// Dependencies of `subtask` that are not yet Complete in `registry`.
///
/// Dependencies referencing unknown IDs count as blocking: they can never
/// complete, which is exactly what a deadlock report should surface.
#[must_use]
pub fn blocking_dependencies(registry: &Backlog, subtask: &Subtask) -> Vec<ItemId> {
    subtask
        .dependencies
        .iter()
        .filter(|&dep| {
            !registry
                .find_subtask(dep)
                .is_some_and(|d| d.status == Status::Complete)
        })
        .cloned()
        .collect()
}

/// Drives one scope of the registry to completion, one item per step.
pub struct Orchestrator {
    store: Arc<SessionStore>,
    scope: Scope,
    queue: VecDeque<ItemId>,
    current_item: Option<ItemId>,
    research: ResearchQueue,
    agent: Arc<dyn SubtaskExecutor>,
}

impl Orchestrator {
    /// Resolve `scope` against the active session and materialize the
    /// execution queue. Requires an initialized session.
    pub fn new(
        store: Arc<SessionStore>,
        scope: Scope,
        research: ResearchQueue,
        agent: Arc<dyn SubtaskExecutor>,
    ) -> Result<Self, OrchestratorError> {
        let registry = store.backlog_snapshot()?;
        let queue: VecDeque<ItemId> = resolve(&registry, &scope).into();
        info!(scope = %scope, items = queue.len(), "execution queue materialized");
        Ok(Self {
            store,
            scope,
            queue,
            current_item: None,
            research,
            agent,
        })
    }

    /// The scope this scheduler was built for.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Items still queued.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// The item currently (or most recently) being processed.
    #[must_use]
    pub fn current_item(&self) -> Option<&ItemId> {
        self.current_item.as_ref()
    }

    /// Dependencies of the given subtask that are not yet Complete.
    pub fn blocking_dependencies_of(
        &self,
        id: &ItemId,
    ) -> Result<Vec<ItemId>, OrchestratorError> {
        let registry = self.store.backlog_snapshot()?;
        Ok(registry
            .find_subtask(id)
            .map(|subtask| blocking_dependencies(&registry, subtask))
            .unwrap_or_default())
    }

    /// Process the next queued item. Returns `false` when the queue is
    /// empty (clearing `current_item`), `true` after handling one item.
    ///
    /// Non-leaf items are set to Implementing and that is the entire
    /// effect. Subtasks run Researching → plan → Implementing → a terminal
    /// status; per-subtask failures (executor throw, reported failure, or a
    /// failed plan generation) are recorded as Failed and do not stop the
    /// traversal.
    #[instrument(skip(self), fields(scope = %self.scope), err)]
    pub async fn process_next(&mut self) -> Result<bool, OrchestratorError> {
        let Some(id) = self.queue.pop_front() else {
            self.current_item = None;
            self.store.set_current_item(None)?;
            return Ok(false);
        };
        self.current_item = Some(id.clone());
        self.store.set_current_item(Some(id.clone()))?;

        match id.kind() {
            ItemKind::Phase | ItemKind::Milestone | ItemKind::Task => {
                self.store.update_item_status(&id, Status::Implementing)?;
            }
            ItemKind::Subtask => self.process_subtask(&id).await?,
        }
        Ok(true)
    }

    async fn process_subtask(&mut self, id: &ItemId) -> Result<(), OrchestratorError> {
        self.store.update_item_status(id, Status::Researching)?;
        let backlog = Arc::new(self.store.backlog_snapshot()?);
        let Some(subtask) = backlog.find_subtask(id).cloned() else {
            return Err(StoreError::UnknownItem { id: id.clone() }.into());
        };

        self.research.enqueue(subtask.clone(), &backlog);
        match self.research.wait_for_prp(id).await {
            Ok(plan) => {
                if let Err(e) = self.store.save_prp_document(&plan).await {
                    warn!(subtask = %id, error = %e, "could not persist plan artifact");
                }
            }
            Err(e) => {
                self.store.update_item_status(id, Status::Failed)?;
                warn!(subtask = %id, error = %e, "plan generation failed; subtask marked Failed");
                return Ok(());
            }
        }

        self.store.update_item_status(id, Status::Implementing)?;
        match self.agent.execute(&subtask, &backlog).await {
            Ok(outcome) if outcome.success => {
                self.store.update_item_status(id, Status::Complete)?;
                info!(subtask = %id, reason = "Success", "subtask complete");
            }
            Ok(outcome) => {
                let message = outcome
                    .error
                    .unwrap_or_else(|| "executor reported failure without detail".to_string());
                self.store.update_item_status(id, Status::Failed)?;
                warn!(subtask = %id, error = %message, "subtask failed (reported)");
            }
            Err(e) => {
                self.store.update_item_status(id, Status::Failed)?;
                warn!(subtask = %id, error = %e, "subtask failed");
            }
        }
        Ok(())
    }

    /// Drain the queue through the concurrent executor: non-leaf items are
    /// promoted in queue order, the queued subtasks execute under the
    /// batch/dependency/concurrency rules of [`crate::executor`].
    #[instrument(skip(self, config, cancel), fields(scope = %self.scope), err)]
    pub async fn run_concurrent(
        &mut self,
        config: ExecutorConfig,
        cancel: &CancellationToken,
    ) -> Result<ExecutionSummary, OrchestratorError> {
        let mut subtasks = Vec::new();
        while let Some(id) = self.queue.pop_front() {
            match id.kind() {
                ItemKind::Subtask => subtasks.push(id),
                _ => self.store.update_item_status(&id, Status::Implementing)?,
            }
        }
        self.current_item = None;
        self.store.set_current_item(None)?;

        let executor = ConcurrentExecutor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.agent),
            config,
        )
        .with_research(self.research.clone());
        let summary = executor.execute(&subtasks, cancel).await?;
        Ok(summary)
    }
}
