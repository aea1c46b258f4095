use std::time::Duration;

use stratus_core::AppError;

/// Pool-level task failures. A task's own output, including domain failures, is never a
/// `PoolError`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Worker pool is shut down")]
    Shutdown,

    #[error("Worker pool overloaded: {queued} tasks queued (max {max})")]
    Overloaded { queued: usize, max: usize },

    #[error("Worker {worker_id} crashed while running the task")]
    WorkerCrashed { worker_id: usize },

    #[error("Task timed out after {}s", .timeout.as_secs_f64())]
    TimedOut { timeout: Duration },

    #[error("Worker pool is not running")]
    NotRunning,
}

impl PoolError {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, PoolError::Shutdown)
    }

    /// Whether resubmitting the same task later can succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PoolError::Shutdown | PoolError::NotRunning)
    }
}

impl From<PoolError> for AppError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Shutdown | PoolError::NotRunning => AppError::PoolShutdown,
            PoolError::Overloaded { queued, max } => AppError::PoolOverloaded { queued, max },
            other => AppError::Pool(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::ErrorMetadata;

    #[test]
    fn overload_maps_to_service_unavailable() {
        let err: AppError = PoolError::Overloaded { queued: 5, max: 5 }.into();
        assert_eq!(err.http_status_code(), 503);
        assert_eq!(err.error_code(), "POOL_OVERLOADED");
    }

    #[test]
    fn crash_is_recoverable_shutdown_is_not() {
        assert!(PoolError::WorkerCrashed { worker_id: 1 }.is_recoverable());
        assert!(!PoolError::Shutdown.is_recoverable());
        assert!(PoolError::Shutdown.is_shutdown());
    }

    #[test]
    fn timeout_message_has_seconds() {
        let err = PoolError::TimedOut {
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "Task timed out after 1.5s");
    }
}
