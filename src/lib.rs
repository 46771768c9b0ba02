//! # Taskloom: Hierarchical Task Execution Engine
//!
//! Taskloom ingests a product-requirements document (PRD), hashes it to
//! derive a stable session identity, and drives a pre-planned tree of work
//! (Phases → Milestones → Tasks → Subtasks) to completion with at-most-once
//! execution per subtask. When the PRD changes, a *delta session* linked to
//! its parent lets prior results be reused.
//!
//! ## Core Concepts
//!
//! - **Backlog**: the typed task hierarchy, the single source of truth for
//!   statuses
//! - **Session**: a hash-addressed workspace directory with atomic, batched,
//!   retrying persistence
//! - **Orchestrator**: DFS pre-order scheduling with parent status promotion
//! - **Concurrent Executor**: dependency-respecting batches under a
//!   concurrency bound, with deadlock detection and failure isolation
//! - **Research Queue**: bounded prefetch of per-subtask plans, overlapping
//!   plan-generation latency with execution
//!
//! External capabilities — plan generation, subtask execution, PRD
//! validation and hashing — live behind the narrow traits in [`ports`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use taskloom::config::ExecutorConfig;
//! use taskloom::orchestrator::Orchestrator;
//! use taskloom::ports::{AgentError, PlanGenerator, SubtaskExecutor, SubtaskOutcome};
//! use taskloom::research::ResearchQueue;
//! use taskloom::sessions::SessionStore;
//! use taskloom::tasks::{Backlog, PrpDocument, Subtask};
//!
//! struct MyPlanner;
//!
//! #[async_trait]
//! impl PlanGenerator for MyPlanner {
//!     async fn generate(
//!         &self,
//!         subtask: &Subtask,
//!         _backlog: &Backlog,
//!     ) -> Result<PrpDocument, AgentError> {
//!         Ok(PrpDocument {
//!             task_id: subtask.id.clone(),
//!             objective: subtask.title.clone(),
//!             context: String::new(),
//!             implementation_steps: vec![],
//!             validation_gates: vec![],
//!             success_criteria: vec![],
//!             references: vec![],
//!         })
//!     }
//! }
//!
//! struct MyExecutor;
//!
//! #[async_trait]
//! impl SubtaskExecutor for MyExecutor {
//!     async fn execute(
//!         &self,
//!         _subtask: &Subtask,
//!         _backlog: &Backlog,
//!     ) -> Result<SubtaskOutcome, AgentError> {
//!         Ok(SubtaskOutcome::success())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SessionStore::new("requirements.md", ".taskloom/sessions"));
//! store.initialize().await?;
//!
//! let research = ResearchQueue::new(Arc::new(MyPlanner));
//! let mut orchestrator = Orchestrator::new(
//!     Arc::clone(&store),
//!     "all".parse()?,
//!     research,
//!     Arc::new(MyExecutor),
//! )?;
//!
//! let summary = orchestrator
//!     .run_concurrent(ExecutorConfig::default(), &CancellationToken::new())
//!     .await?;
//! println!("completed {} of {}", summary.completed, summary.total);
//! store.flush_updates().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`tasks`] - The typed hierarchy, IDs, contracts and schema validation
//! - [`deps`] - Cycle detection over the subtask dependency graph
//! - [`scope`] - Scope parsing and queue resolution
//! - [`sessions`] - Session identity, the store and the persistence path
//! - [`orchestrator`] - DFS pre-order scheduling and status promotion
//! - [`executor`] - Bounded-concurrency batch execution
//! - [`research`] - Plan prefetching with shared in-flight futures
//! - [`ports`] - Traits for the external agent capabilities
//! - [`config`] - Engine configuration with environment overrides
//! - [`telemetry`] - Tracing subscriber setup for binaries and tests

pub mod config;
pub mod deps;
pub mod executor;
pub mod orchestrator;
pub mod ports;
pub mod research;
pub mod scope;
pub mod sessions;
pub mod tasks;
pub mod telemetry;
