use serde::Serialize;

/// Point-in-time snapshot of a worker pool. Not transactional across fields of two
/// different snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStats {
    pub total_workers: usize,
    pub available_workers: usize,
    pub busy_workers: usize,
    pub queued_tasks: usize,
    pub queue_capacity: usize,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub respawned_workers: u64,
}
