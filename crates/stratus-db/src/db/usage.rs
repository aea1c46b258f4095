//! Usage repository: per-organization storage counters and quota.
//!
//! Counters only move through single-statement relative updates (`used + $n`) or a full
//! rescan of the files table, so concurrent batches for one organization never lose an
//! update.

use async_trait::async_trait;
use sqlx::PgPool;
use stratus_core::models::{QuotaDecision, UsageTotals};
use stratus_core::{AppError, QuotaService};
use uuid::Uuid;

#[derive(Clone)]
pub struct UsageRepository {
    pool: PgPool,
}

impl UsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically add the deltas to the organization's counters, creating the row on
    /// first use.
    #[tracing::instrument(skip(self), fields(db.table = "organization_storage_usage"))]
    pub async fn increment(
        &self,
        org_id: Uuid,
        delta_bytes: i64,
        delta_count: i64,
    ) -> Result<UsageTotals, AppError> {
        let totals = sqlx::query_as::<_, UsageTotals>(
            r#"
            INSERT INTO organization_storage_usage (org_id, used_storage_bytes, file_count)
            VALUES ($1, $2, $3)
            ON CONFLICT (org_id) DO UPDATE SET
                used_storage_bytes = organization_storage_usage.used_storage_bytes + EXCLUDED.used_storage_bytes,
                file_count = organization_storage_usage.file_count + EXCLUDED.file_count,
                updated_at = NOW()
            RETURNING org_id, used_storage_bytes, file_count
            "#,
        )
        .bind(org_id)
        .bind(delta_bytes)
        .bind(delta_count)
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }

    /// Current counters, zero when the organization has never uploaded.
    #[tracing::instrument(skip(self), fields(db.table = "organization_storage_usage"))]
    pub async fn get(&self, org_id: Uuid) -> Result<UsageTotals, AppError> {
        let totals = sqlx::query_as::<_, UsageTotals>(
            "SELECT org_id, used_storage_bytes, file_count FROM organization_storage_usage WHERE org_id = $1",
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(totals.unwrap_or(UsageTotals {
            org_id,
            used_storage_bytes: 0,
            file_count: 0,
        }))
    }

    /// Set or clear (`None`) the storage ceiling of an organization.
    #[tracing::instrument(skip(self), fields(db.table = "organization_storage_usage"))]
    pub async fn set_limit(&self, org_id: Uuid, limit_bytes: Option<i64>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO organization_storage_usage (org_id, storage_limit_bytes)
            VALUES ($1, $2)
            ON CONFLICT (org_id) DO UPDATE SET
                storage_limit_bytes = EXCLUDED.storage_limit_bytes,
                updated_at = NOW()
            "#,
        )
        .bind(org_id)
        .bind(limit_bytes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Recompute the counters from the files table and overwrite them.
    ///
    /// Repairs drift left by crashes between upload and accounting. Meant for a periodic
    /// job; the upload path only uses [`increment`](Self::increment).
    #[tracing::instrument(skip(self), fields(db.table = "organization_storage_usage"))]
    pub async fn reconcile(&self, org_id: Uuid) -> Result<UsageTotals, AppError> {
        let totals = sqlx::query_as::<_, UsageTotals>(
            r#"
            INSERT INTO organization_storage_usage (org_id, used_storage_bytes, file_count)
            SELECT $1, COALESCE(SUM(size_bytes), 0)::BIGINT, COUNT(*)
            FROM files
            WHERE org_id = $1
            ON CONFLICT (org_id) DO UPDATE SET
                used_storage_bytes = EXCLUDED.used_storage_bytes,
                file_count = EXCLUDED.file_count,
                updated_at = NOW()
            RETURNING org_id, used_storage_bytes, file_count
            "#,
        )
        .bind(org_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            org_id = %org_id,
            used_storage_bytes = totals.used_storage_bytes,
            file_count = totals.file_count,
            "Storage usage reconciled"
        );
        Ok(totals)
    }
}

#[async_trait]
impl QuotaService for UsageRepository {
    #[tracing::instrument(skip(self), fields(db.table = "organization_storage_usage"))]
    async fn check(&self, org_id: Uuid, requested_bytes: u64) -> Result<QuotaDecision, AppError> {
        let row: Option<(i64, Option<i64>)> = sqlx::query_as(
            "SELECT used_storage_bytes, storage_limit_bytes FROM organization_storage_usage WHERE org_id = $1",
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        let (current_usage, limit) = row.unwrap_or((0, None));
        Ok(QuotaDecision::evaluate(current_usage, limit, requested_bytes))
    }
}
