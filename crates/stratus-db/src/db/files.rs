//! File repository: bulk writes to the files table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use stratus_core::models::StoredFile;
use stratus_core::AppError;
use uuid::Uuid;

/// Column-wise view of a batch of records, bound as arrays to a single `UNNEST` insert.
#[derive(Debug, Default, PartialEq)]
struct FileColumns {
    ids: Vec<Uuid>,
    org_ids: Vec<Uuid>,
    file_names: Vec<String>,
    original_names: Vec<String>,
    sizes: Vec<i64>,
    mime_types: Vec<String>,
    storage_keys: Vec<String>,
    buckets: Vec<Option<String>>,
    folders: Vec<Option<String>>,
    uploaded_by: Vec<Uuid>,
    statuses: Vec<String>,
    uploaded_at: Vec<DateTime<Utc>>,
}

impl FileColumns {
    fn from_records(records: &[StoredFile]) -> Result<Self, AppError> {
        let mut columns = FileColumns::default();
        for record in records {
            let size = i64::try_from(record.size).map_err(|_| {
                AppError::InvalidInput(format!("File size out of range: {}", record.size))
            })?;
            columns.ids.push(record.file_id);
            columns.org_ids.push(record.org_id);
            columns.file_names.push(record.file_name.clone());
            columns.original_names.push(record.original_name.clone());
            columns.sizes.push(size);
            columns.mime_types.push(record.mime_type.clone());
            columns.storage_keys.push(record.storage_key.clone());
            columns.buckets.push(record.bucket.clone());
            columns.folders.push(record.folder.clone());
            columns.uploaded_by.push(record.uploaded_by);
            columns.statuses.push(record.virus_scan_status.to_string());
            columns.uploaded_at.push(record.uploaded_at);
        }
        Ok(columns)
    }
}

#[derive(Clone)]
pub struct FileRepository {
    pool: PgPool,
}

impl FileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert all records with one statement. Either every row is written or none is.
    #[tracing::instrument(skip(self, records), fields(db.table = "files", count = records.len()))]
    pub async fn insert_many(&self, records: &[StoredFile]) -> Result<u64, AppError> {
        if records.is_empty() {
            return Ok(0);
        }

        let columns = FileColumns::from_records(records)?;

        let result = sqlx::query(
            r#"
            INSERT INTO files (
                id, org_id, file_name, original_name, size_bytes, mime_type,
                storage_key, bucket, folder, uploaded_by, virus_scan_status, uploaded_at
            )
            SELECT id, org_id, file_name, original_name, size_bytes, mime_type,
                   storage_key, bucket, folder, uploaded_by, status::virus_scan_status, uploaded_at
            FROM UNNEST(
                $1::uuid[], $2::uuid[], $3::text[], $4::text[], $5::int8[], $6::text[],
                $7::text[], $8::text[], $9::text[], $10::uuid[], $11::text[], $12::timestamptz[]
            ) AS t(
                id, org_id, file_name, original_name, size_bytes, mime_type,
                storage_key, bucket, folder, uploaded_by, status, uploaded_at
            )
            "#,
        )
        .bind(&columns.ids)
        .bind(&columns.org_ids)
        .bind(&columns.file_names)
        .bind(&columns.original_names)
        .bind(&columns.sizes)
        .bind(&columns.mime_types)
        .bind(&columns.storage_keys)
        .bind(&columns.buckets)
        .bind(&columns.folders)
        .bind(&columns.uploaded_by)
        .bind(&columns.statuses)
        .bind(&columns.uploaded_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(rows = result.rows_affected(), "Inserted file records");
        Ok(result.rows_affected())
    }

    /// Number of stored files of an organization.
    #[tracing::instrument(skip(self), fields(db.table = "files"))]
    pub async fn count_for_org(&self, org_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE org_id = $1")
            .bind(org_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
