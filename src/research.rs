//! Bounded prefetch of per-subtask plans.
//!
//! Plan generation is external and network-bound; the research queue
//! overlaps that latency with execution by generating plans for upcoming
//! subtasks ahead of time. State is three-stage: a FIFO of pending
//! subtasks, an in-flight map bounded by the queue capacity, and a
//! completion cache. In-flight plans are shared, awaitable handles — a
//! second awaiter attaches to the same future and never re-launches
//! generation. Failures are rethrown to every awaiter and never cached;
//! retrying is the caller's business.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ResearchConfig;
use crate::ports::{AgentError, PlanGenerator};
use crate::tasks::{Backlog, ItemId, PrpDocument, Subtask};

/// Default bound on concurrently generating plans.
pub const DEFAULT_RESEARCH_CAPACITY: usize = 3;

type SharedPlan = Shared<BoxFuture<'static, Result<PrpDocument, AgentError>>>;

/// Errors from awaiting a plan.
#[derive(Debug, Error, Diagnostic)]
pub enum ResearchError {
    /// The subtask was never enqueued (or its failed generation was already
    /// discarded).
    #[error("no research scheduled for subtask {id}")]
    #[diagnostic(
        code(taskloom::research::unknown),
        help("Call enqueue() before waiting, or re-enqueue after a failure.")
    )]
    Unknown { id: ItemId },

    /// Plan generation failed; the same error is handed to every awaiter.
    #[error(transparent)]
    #[diagnostic(code(taskloom::research::agent))]
    Agent(#[from] AgentError),
}

/// Counters for observability and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResearchStats {
    pub queued: usize,
    pub in_flight: usize,
    pub cached: usize,
    pub capacity: usize,
}

struct Inner {
    queue: VecDeque<Subtask>,
    researching: FxHashMap<ItemId, SharedPlan>,
    results: FxHashMap<ItemId, PrpDocument>,
}

/// The prefetch queue. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ResearchQueue {
    generator: Arc<dyn PlanGenerator>,
    capacity: usize,
    inner: Arc<Mutex<Inner>>,
}

impl ResearchQueue {
    /// A queue with the default capacity of [`DEFAULT_RESEARCH_CAPACITY`].
    #[must_use]
    pub fn new(generator: Arc<dyn PlanGenerator>) -> Self {
        Self::with_capacity(generator, DEFAULT_RESEARCH_CAPACITY)
    }

    /// A queue sized by a [`ResearchConfig`], typically resolved through
    /// [`ResearchConfig::from_env`].
    #[must_use]
    pub fn from_config(generator: Arc<dyn PlanGenerator>, config: &ResearchConfig) -> Self {
        Self::with_capacity(generator, config.queue_size)
    }

    /// A queue generating at most `capacity` plans concurrently (min 1).
    #[must_use]
    pub fn with_capacity(generator: Arc<dyn PlanGenerator>, capacity: usize) -> Self {
        Self {
            generator,
            capacity: capacity.max(1),
            inner: Arc::new(Mutex::new(Inner {
                queue: VecDeque::new(),
                researching: FxHashMap::default(),
                results: FxHashMap::default(),
            })),
        }
    }

    /// Queue a subtask for plan generation. A no-op when the subtask is
    /// already queued, in flight, or cached.
    pub fn enqueue(&self, subtask: Subtask, backlog: &Arc<Backlog>) {
        {
            let mut inner = self.inner.lock();
            let id = &subtask.id;
            // Dedup spans all three stages: a duplicate left in the pending
            // queue would be popped and dispatched a second time later.
            if inner.researching.contains_key(id)
                || inner.results.contains_key(id)
                || inner.queue.iter().any(|s| &s.id == id)
            {
                debug!(subtask = %id, "research already scheduled; skipping");
                return;
            }
            inner.queue.push_back(subtask);
        }
        self.process_next(backlog);
    }

    /// Launch the next pending generation if a slot is free. Chains itself
    /// as in-flight work settles, so the pipeline stays full.
    pub fn process_next(&self, backlog: &Arc<Backlog>) {
        let (subtask, handle) = {
            let mut inner = self.inner.lock();
            if inner.researching.len() >= self.capacity {
                return;
            }
            let Some(subtask) = inner.queue.pop_front() else {
                return;
            };
            let generator = Arc::clone(&self.generator);
            let task = subtask.clone();
            let registry = Arc::clone(backlog);
            let handle: SharedPlan = async move { generator.generate(&task, &registry).await }
                .boxed()
                .shared();
            inner.researching.insert(subtask.id.clone(), handle.clone());
            (subtask, handle)
        };

        debug!(subtask = %subtask.id, "plan generation started");
        let this = self.clone();
        let backlog = Arc::clone(backlog);
        tokio::spawn(async move {
            let result = handle.await;
            {
                let mut inner = this.inner.lock();
                inner.researching.remove(&subtask.id);
                if let Ok(prp) = &result {
                    inner.results.insert(subtask.id.clone(), prp.clone());
                }
            }
            match result {
                Ok(_) => debug!(subtask = %subtask.id, "plan generation complete"),
                Err(e) => warn!(subtask = %subtask.id, error = %e, "plan generation failed"),
            }
            this.process_next(&backlog);
        });
    }

    /// Whether generation for `id` is currently in flight.
    #[must_use]
    pub fn is_researching(&self, id: &ItemId) -> bool {
        self.inner.lock().researching.contains_key(id)
    }

    /// The cached plan for `id`, if generation already completed.
    #[must_use]
    pub fn get_prp(&self, id: &ItemId) -> Option<PrpDocument> {
        self.inner.lock().results.get(id).cloned()
    }

    /// Await the plan for `id`: cached plans resolve immediately, in-flight
    /// plans are awaited through the shared handle, unknown IDs fail.
    pub async fn wait_for_prp(&self, id: &ItemId) -> Result<PrpDocument, ResearchError> {
        let waiter = {
            let inner = self.inner.lock();
            if let Some(prp) = inner.results.get(id) {
                return Ok(prp.clone());
            }
            match inner.researching.get(id) {
                Some(handle) => handle.clone(),
                None => {
                    return Err(ResearchError::Unknown { id: id.clone() });
                }
            }
        };
        waiter.await.map_err(ResearchError::Agent)
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> ResearchStats {
        let inner = self.inner.lock();
        ResearchStats {
            queued: inner.queue.len(),
            in_flight: inner.researching.len(),
            cached: inner.results.len(),
            capacity: self.capacity,
        }
    }

    /// Drop cached results. Pending and in-flight generation is unaffected.
    pub fn clear_cache(&self) {
        self.inner.lock().results.clear();
    }
}
