use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::upload::{FailedUpload, StoredFile};

/// Aggregated counters of one batch upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BatchStatistics {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Wall-clock time from request to report, in milliseconds.
    pub processing_time_ms: u64,
    /// Number of sequential chunks the batch was dispatched in (1 when not chunked, 0 when
    /// nothing was dispatched).
    pub chunks: usize,
}

/// Per-file report of a batch upload.
///
/// Callers must not rely on `successful_uploads` following input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BatchResult {
    pub successful_uploads: Vec<StoredFile>,
    pub failed_uploads: Vec<FailedUpload>,
    pub statistics: BatchStatistics,
}

impl BatchResult {
    pub fn new(
        successful_uploads: Vec<StoredFile>,
        failed_uploads: Vec<FailedUpload>,
        processing_time_ms: u64,
        chunks: usize,
    ) -> Self {
        let statistics = BatchStatistics {
            total: successful_uploads.len() + failed_uploads.len(),
            successful: successful_uploads.len(),
            failed: failed_uploads.len(),
            processing_time_ms,
            chunks,
        };
        Self {
            successful_uploads,
            failed_uploads,
            statistics,
        }
    }

    /// Total bytes of the files that were stored.
    pub fn stored_bytes(&self) -> u64 {
        self.successful_uploads.iter().map(|f| f.size).sum()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_uploads.is_empty()
    }
}

/// Outcome of deleting objects that were stored but could not be recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CompensationReport {
    /// Keys removed from the object store.
    pub deleted: Vec<String>,
    /// Keys that could not be removed and now exist without a metadata record.
    pub orphaned: Vec<String>,
}

impl CompensationReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty()
    }
}
