use std::time::Duration;

use stratus_core::config::default_pool_size;
use stratus_core::Config;

pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 1000;
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of workers kept alive while the pool runs.
    pub size: usize,
    /// Tasks allowed to wait for a worker before submissions are rejected.
    pub max_queue_depth: usize,
    /// Per-task deadline. An expired task settles as failed and frees its worker.
    pub task_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            max_queue_depth: DEFAULT_MAX_QUEUE_DEPTH,
            task_timeout: Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECS),
        }
    }
}

impl From<&Config> for WorkerPoolConfig {
    fn from(config: &Config) -> Self {
        Self {
            size: config.upload_pool_size(),
            max_queue_depth: config.upload_pool_max_queue_depth(),
            task_timeout: Duration::from_secs(config.upload_task_timeout_secs()),
        }
    }
}
