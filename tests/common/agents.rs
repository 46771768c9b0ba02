use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use taskloom::ports::{
    AgentError, IssueSeverity, PlanGenerator, PrdIssue, PrdValidation, PrdValidator,
    SubtaskExecutor, SubtaskOutcome,
};
use taskloom::sessions::{AtomicBacklogWriter, BacklogWriter, SessionFileError};
use taskloom::tasks::{Backlog, ItemId, PrpDocument, Subtask};

/// Plan generator returning a canned plan, with optional latency and
/// per-subtask failures. Counts every call.
#[derive(Default)]
pub struct StaticPlanner {
    delay: Option<Duration>,
    fail_for: HashSet<ItemId>,
    pub calls: AtomicUsize,
}

impl StaticPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_for(mut self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.fail_for = ids.into_iter().collect();
        self
    }
}

#[async_trait]
impl PlanGenerator for StaticPlanner {
    async fn generate(
        &self,
        subtask: &Subtask,
        _backlog: &Backlog,
    ) -> Result<PrpDocument, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_for.contains(&subtask.id) {
            return Err(AgentError::PlanGeneration {
                message: format!("no plan for {}", subtask.id),
            });
        }
        Ok(PrpDocument {
            task_id: subtask.id.clone(),
            objective: subtask.title.clone(),
            context: "test plan".into(),
            implementation_steps: vec!["do the thing".into()],
            validation_gates: vec![],
            success_criteria: vec![],
            references: vec![],
        })
    }
}

/// Subtask executor that records ordering and concurrency, with optional
/// latency and per-subtask failures (thrown, not reported).
#[derive(Default)]
pub struct RecordingExecutor {
    started: Mutex<Vec<ItemId>>,
    finished: Mutex<Vec<ItemId>>,
    fail_for: HashSet<ItemId>,
    report_failure_for: HashSet<ItemId>,
    delay: Option<Duration>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// These subtasks throw.
    pub fn failing_for(mut self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.fail_for = ids.into_iter().collect();
        self
    }

    /// These subtasks return `{success: false}` without throwing.
    pub fn reporting_failure_for(mut self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.report_failure_for = ids.into_iter().collect();
        self
    }

    pub fn started(&self) -> Vec<ItemId> {
        self.started.lock().clone()
    }

    pub fn finished(&self) -> Vec<ItemId> {
        self.finished.lock().clone()
    }

    /// Highest number of concurrently executing subtasks observed.
    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubtaskExecutor for RecordingExecutor {
    async fn execute(
        &self,
        subtask: &Subtask,
        _backlog: &Backlog,
    ) -> Result<SubtaskOutcome, AgentError> {
        self.started.lock().push(subtask.id.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().push(subtask.id.clone());

        if self.fail_for.contains(&subtask.id) {
            return Err(AgentError::Execution {
                message: format!("injected failure in {}", subtask.id),
            });
        }
        if self.report_failure_for.contains(&subtask.id) {
            return Ok(SubtaskOutcome::failure(format!(
                "reported failure in {}",
                subtask.id
            )));
        }
        Ok(SubtaskOutcome::success())
    }
}

/// Writer that fails its first `failures` persists with the given errno,
/// then delegates to the real atomic writer. Counts every attempt.
pub struct FlakyWriter {
    failures_remaining: AtomicUsize,
    errno: i32,
    attempts: AtomicUsize,
    inner: AtomicBacklogWriter,
}

impl FlakyWriter {
    pub fn new(failures: usize, errno: i32) -> Self {
        Self {
            failures_remaining: AtomicUsize::new(failures),
            errno,
            attempts: AtomicUsize::new(0),
            inner: AtomicBacklogWriter,
        }
    }

    /// A writer that never fails, used to count attempts.
    pub fn counting() -> Self {
        Self::new(0, 0)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BacklogWriter for FlakyWriter {
    async fn persist(&self, session_dir: &Path, json: &str) -> Result<(), SessionFileError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(SessionFileError::new(
                "atomic write",
                session_dir.join("tasks.json"),
                std::io::Error::from_raw_os_error(self.errno),
            ));
        }
        self.inner.persist(session_dir, json).await
    }
}

/// PRD validator that reports one critical issue.
pub struct CriticalValidator;

#[async_trait]
impl PrdValidator for CriticalValidator {
    async fn validate(&self, _path: &Path) -> Result<PrdValidation, AgentError> {
        Ok(PrdValidation {
            valid: false,
            issues: vec![PrdIssue {
                severity: IssueSeverity::Critical,
                message: "PRD has no requirements section".into(),
                section: Some("requirements".into()),
            }],
            summary: "1 critical issue".into(),
        })
    }
}
