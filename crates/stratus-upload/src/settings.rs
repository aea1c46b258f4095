use std::time::Duration;

use stratus_core::Config;

const MB: u64 = 1024 * 1024;

/// Orchestrator knobs.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_file_size_bytes: u64,
    pub max_files_per_batch: usize,
    /// Batches larger than this are dispatched in estimated chunks.
    pub chunk_threshold: usize,
    /// Extra bulk insert attempts before compensating.
    pub persist_retries: u32,
    /// Base delay between insert attempts, multiplied by the attempt number.
    pub persist_retry_backoff: Duration,
    /// Deadline of each detached virus scan submission.
    pub scan_timeout: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 100 * MB,
            max_files_per_batch: 100,
            chunk_threshold: 20,
            persist_retries: 2,
            persist_retry_backoff: Duration::from_millis(200),
            scan_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&Config> for UploadSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_file_size_bytes: config.max_file_size_bytes(),
            max_files_per_batch: config.max_files_per_batch(),
            chunk_threshold: config.upload_chunk_threshold(),
            persist_retries: config.upload_persist_retries(),
            scan_timeout: Duration::from_secs(config.virus_scan_timeout_secs()),
            ..Self::default()
        }
    }
}
