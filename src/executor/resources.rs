//! Soft memory backpressure for the concurrent executor.
//!
//! Before each subtask launch the executor polls the current process's
//! memory footprint against total system memory and backs off while usage
//! sits above the configured threshold. The guard is soft twice over: after
//! a bounded wait the launch proceeds anyway, and on platforms where the
//! probe reports nothing the poll always passes.

use std::time::Duration;

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Longest a single launch will wait for memory headroom.
pub const BACKPRESSURE_SOFT_BOUND: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls this process's memory use as a fraction of system memory.
pub struct MemoryMonitor {
    system: Mutex<System>,
    pid: Pid,
}

impl Default for MemoryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: Pid::from_u32(std::process::id()),
        }
    }

    /// Current process RSS over total system memory, in [0, 1]. Returns 0.0
    /// when the platform reports nothing usable, which makes every poll pass.
    #[must_use]
    pub fn usage_fraction(&self) -> f64 {
        let mut system = self.system.lock();
        system.refresh_memory();
        system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        let total = system.total_memory();
        if total == 0 {
            return 0.0;
        }
        match system.process(self.pid) {
            Some(process) => process.memory() as f64 / total as f64,
            None => 0.0,
        }
    }

    /// Sleep-and-repoll until usage drops to `threshold` or the soft bound
    /// elapses, whichever comes first.
    pub async fn wait_for_headroom(&self, threshold: f64, soft_bound: Duration) {
        let started = Instant::now();
        loop {
            let usage = self.usage_fraction();
            if usage <= threshold {
                return;
            }
            if started.elapsed() >= soft_bound {
                warn!(
                    usage,
                    threshold, "memory still above threshold after soft bound; proceeding"
                );
                return;
            }
            debug!(usage, threshold, "memory above threshold; backing off");
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
