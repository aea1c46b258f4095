//! Database repositories
//
// Uploaded file records
pub mod files;
//
// Per-organization storage usage and quota
pub mod usage;

pub use files::FileRepository;
pub use usage::UsageRepository;

use async_trait::async_trait;
use stratus_core::models::{StoredFile, UsageTotals};
use stratus_core::{AppError, FileMetadataStore};
use uuid::Uuid;

/// [`FileMetadataStore`] over the `files` and `organization_storage_usage` tables.
#[derive(Clone)]
pub struct PgFileMetadataStore {
    files: FileRepository,
    usage: UsageRepository,
}

impl PgFileMetadataStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            files: FileRepository::new(pool.clone()),
            usage: UsageRepository::new(pool),
        }
    }

    pub fn usage(&self) -> &UsageRepository {
        &self.usage
    }
}

#[async_trait]
impl FileMetadataStore for PgFileMetadataStore {
    async fn insert_many(&self, records: &[StoredFile]) -> Result<u64, AppError> {
        self.files.insert_many(records).await
    }

    async fn increment_usage(
        &self,
        org_id: Uuid,
        delta_bytes: i64,
        delta_count: i64,
    ) -> Result<UsageTotals, AppError> {
        self.usage.increment(org_id, delta_bytes, delta_count).await
    }
}
