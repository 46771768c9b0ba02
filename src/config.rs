//! Engine configuration.
//!
//! Plain structs with defaults and builder-style setters; `from_env()`
//! variants resolve overrides from the environment (after loading a local
//! `.env` file) for embedding applications that configure by deployment.

use crate::research::DEFAULT_RESEARCH_CAPACITY;

/// Configuration of the concurrent subtask executor.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutorConfig {
    /// When false the executor degrades to serialized execution
    /// (`max_concurrency = 1`) with identical semantics.
    pub enabled: bool,
    /// Upper bound on concurrently executing subtasks. Must be at least 1;
    /// 0 is rejected fail-fast at executor entry.
    pub max_concurrency: usize,
    /// Capacity handed to the research queue for plan prefetching.
    pub prp_generation_limit: usize,
    /// Fraction of memory use above which task launches back off, in (0, 1].
    pub resource_threshold: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrency: 3,
            prp_generation_limit: DEFAULT_RESEARCH_CAPACITY,
            resource_threshold: 0.9,
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    #[must_use]
    pub fn with_prp_generation_limit(mut self, limit: usize) -> Self {
        self.prp_generation_limit = limit;
        self
    }

    #[must_use]
    pub fn with_resource_threshold(mut self, threshold: f64) -> Self {
        self.resource_threshold = threshold;
        self
    }

    /// Defaults overridden by `TASKLOOM_*` environment variables. Variables
    /// that are absent or unparsable leave the default in place.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Some(v) = env_parse::<bool>("TASKLOOM_CONCURRENT_ENABLED") {
            config.enabled = v;
        }
        if let Some(v) = env_parse::<usize>("TASKLOOM_MAX_CONCURRENCY") {
            config.max_concurrency = v;
        }
        if let Some(v) = env_parse::<usize>("TASKLOOM_PRP_GENERATION_LIMIT") {
            config.prp_generation_limit = v;
        }
        if let Some(v) = env_parse::<f64>("TASKLOOM_RESOURCE_THRESHOLD") {
            config.resource_threshold = v;
        }
        config
    }

    /// The concurrency bound actually applied, folding in `enabled`.
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        if self.enabled { self.max_concurrency } else { 1 }
    }
}

/// Configuration of the research prefetch queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResearchConfig {
    /// Bound on concurrently generating plans; clamped to at least 1 when
    /// the queue is built.
    pub queue_size: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            queue_size: DEFAULT_RESEARCH_CAPACITY,
        }
    }
}

impl ResearchConfig {
    #[must_use]
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Defaults overridden by `TASKLOOM_RESEARCH_QUEUE_SIZE`. An absent or
    /// unparsable variable leaves the default in place.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Some(v) = env_parse::<usize>("TASKLOOM_RESEARCH_QUEUE_SIZE") {
            config.queue_size = v;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}
