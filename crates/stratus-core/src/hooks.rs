//! Collaborator traits consumed by the upload core
//!
//! The batch orchestrator talks to persistence, quota accounting and virus scanning only
//! through these traits. `stratus-db` and `stratus-services` provide the production
//! implementations; tests plug in in-memory ones.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{QuotaDecision, StoredFile, UsageTotals};

/// Metadata store for uploaded file records and per-organization usage counters.
#[async_trait]
pub trait FileMetadataStore: Send + Sync {
    /// Insert all records in one write. Either every record is stored or none is.
    async fn insert_many(&self, records: &[StoredFile]) -> Result<u64, AppError>;

    /// Atomically add the deltas to the organization's usage counters and return the new
    /// totals. Must never be implemented as read-then-write.
    async fn increment_usage(
        &self,
        org_id: Uuid,
        delta_bytes: i64,
        delta_count: i64,
    ) -> Result<UsageTotals, AppError>;
}

/// Per-organization storage quota gate.
#[async_trait]
pub trait QuotaService: Send + Sync {
    async fn check(&self, org_id: Uuid, requested_bytes: u64) -> Result<QuotaDecision, AppError>;
}

/// Fire-and-forget virus scan submission.
///
/// Callers do not wait on scan outcomes; an `Err` is only logged.
#[async_trait]
pub trait VirusScanTrigger: Send + Sync {
    async fn submit(&self, file_id: Uuid, storage_key: &str) -> Result<(), AppError>;
}
