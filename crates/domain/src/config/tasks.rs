use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Worker pool configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the parallel task decomposition/execution pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Maximum number of worker tasks executed concurrently for a single
    /// decomposition. Clamped to `1..=20`.
    #[serde(default = "d_max_workers")]
    pub max_workers: usize,
    /// Per-task wall-clock deadline in milliseconds.
    #[serde(default = "d_task_timeout_ms")]
    pub task_timeout_ms: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_workers: d_max_workers(),
            task_timeout_ms: d_task_timeout_ms(),
        }
    }
}

impl WorkerPoolConfig {
    /// Clamp `max_workers` to the allowed range `1..=20`.
    pub fn clamped(&self) -> Self {
        Self {
            max_workers: self.max_workers.clamp(1, 20),
            task_timeout_ms: self.task_timeout_ms,
        }
    }
}

fn d_max_workers() -> usize {
    3
}
fn d_task_timeout_ms() -> u64 {
    15 * 60 * 1000
}
