//! Batch orchestrator.
//!
//! A batch runs through: validate every file, check quota for the valid bytes, fan the
//! uploads out over the worker pool (in memory-sized chunks for large batches), bulk
//! insert the metadata of stored files, bump usage once, then hand the stored files to
//! the virus scanner without waiting for it.
//!
//! Per-file failures are collected into the [`BatchResult`]. Quota, persistence and pool
//! availability failures reject the whole batch with a [`BatchUploadError`].
//!
//! A task the pool gave up on (timeout or worker crash) may still have written its
//! object. Its pre-assigned key is deleted best effort once the batch settles.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use stratus_core::models::{
    BatchResult, CompensationReport, FailedUpload, FileError, FileErrorKind, IncomingFile,
    ProcessedFileResult, StoredFile, UploadContext,
};
use stratus_core::{AppError, BatchUploadError, FileMetadataStore, QuotaService, VirusScanTrigger};
use stratus_infra::MemoryReader;
use stratus_storage::{generate_storage_key, normalize_folder, Storage};
use stratus_worker::{PoolError, PoolStats, WorkerPool};
use tokio_util::task::TaskTracker;
use uuid::Uuid;
use validator::Validate;

use crate::estimator::estimate_chunk_size;
use crate::processor::{FileProcessor, FileTask};
use crate::settings::UploadSettings;
use crate::validate::validate_files;

/// Identity of a dispatched file, kept to report a pool-level failure against it.
struct Dispatched {
    file_id: Uuid,
    file_name: String,
    original_name: String,
    storage_key: String,
}

fn pool_failure(file: Dispatched, err: &PoolError) -> FailedUpload {
    let kind = match err {
        PoolError::TimedOut { .. } => FileErrorKind::Timeout,
        PoolError::WorkerCrashed { .. } => FileErrorKind::WorkerCrashed,
        PoolError::Overloaded { .. } => FileErrorKind::Overloaded,
        PoolError::Shutdown | PoolError::NotRunning => FileErrorKind::Shutdown,
    };
    FailedUpload {
        file_id: Some(file.file_id),
        file_name: Some(file.file_name),
        original_name: file.original_name,
        error: FileError::new(kind, err.to_string()),
    }
}

pub struct BatchUploadService {
    pool: WorkerPool<FileProcessor>,
    storage: Arc<dyn Storage>,
    metadata: Arc<dyn FileMetadataStore>,
    quota: Arc<dyn QuotaService>,
    scanner: Arc<dyn VirusScanTrigger>,
    memory: Arc<dyn MemoryReader>,
    settings: UploadSettings,
    scans: TaskTracker,
}

impl BatchUploadService {
    /// `pool` must be built over the same `storage` so compensation deletes what the
    /// workers wrote.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: WorkerPool<FileProcessor>,
        storage: Arc<dyn Storage>,
        metadata: Arc<dyn FileMetadataStore>,
        quota: Arc<dyn QuotaService>,
        scanner: Arc<dyn VirusScanTrigger>,
        memory: Arc<dyn MemoryReader>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            pool,
            storage,
            metadata,
            quota,
            scanner,
            memory,
            settings,
            scans: TaskTracker::new(),
        }
    }

    pub fn pool(&self) -> &WorkerPool<FileProcessor> {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Number of scan triggers still in flight.
    pub fn pending_scans(&self) -> usize {
        self.scans.len()
    }

    /// Wait for in-flight scan triggers (bounded by the scan timeout), then stop the pool.
    ///
    /// Batches submitted afterwards are rejected as pool unavailable.
    pub async fn shutdown(&self) {
        self.scans.close();
        let pending = self.scans.len();
        if pending > 0 {
            tracing::info!(pending = pending, "Waiting for virus scan triggers");
        }
        if tokio::time::timeout(self.settings.scan_timeout, self.scans.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                pending = self.scans.len(),
                "Virus scan triggers still pending at shutdown"
            );
        }
        let abandoned = self.pool.terminate();
        tracing::info!(abandoned_tasks = abandoned, "Batch upload service stopped");
    }

    /// Upload a batch of files for one organization.
    ///
    /// The quota check and the usage increment are not one transaction. Concurrent
    /// batches for the same organization can each pass the check and together end above
    /// the limit; usage itself stays exact.
    #[tracing::instrument(
        skip(self, context, files),
        fields(org_id = %context.org_id, user_id = %context.user_id, files = files.len())
    )]
    pub async fn upload_batch(
        &self,
        context: UploadContext,
        files: Vec<IncomingFile>,
    ) -> Result<BatchResult, BatchUploadError> {
        let start = Instant::now();

        if files.len() > self.settings.max_files_per_batch {
            return Err(BatchUploadError::TooManyFiles {
                count: files.len(),
                max: self.settings.max_files_per_batch,
            });
        }
        if files.is_empty() {
            return Err(BatchUploadError::NoValidFiles {
                failed_uploads: Vec::new(),
            });
        }

        context.validate().map_err(AppError::from)?;
        let folder = match context.folder.as_deref() {
            Some(folder) => normalize_folder(folder)
                .map_err(|e| AppError::InvalidInput(e.to_string()))?,
            None => None,
        };
        let context = Arc::new(UploadContext { folder, ..context });

        let (valid, mut failed) = validate_files(files, self.settings.max_file_size_bytes).await;
        if valid.is_empty() {
            tracing::info!(rejected = failed.len(), "No valid files in batch");
            return Err(BatchUploadError::NoValidFiles {
                failed_uploads: failed,
            });
        }

        let requested: u64 = valid.iter().map(|f| f.size).sum();
        let decision = self.quota.check(context.org_id, requested).await?;
        if !decision.allowed {
            let available = decision.available().unwrap_or(0);
            tracing::warn!(
                requested_bytes = requested,
                available_bytes = available,
                "Batch rejected by storage quota"
            );
            return Err(BatchUploadError::QuotaExceeded {
                requested,
                available,
                reason: decision.reason,
                failed_uploads: failed,
            });
        }

        if !self.pool.is_running() {
            return Err(BatchUploadError::PoolUnavailable(
                PoolError::NotRunning.to_string(),
            ));
        }

        let mut sizes = Vec::with_capacity(valid.len());
        let mut dispatched = Vec::with_capacity(valid.len());
        let mut tasks = Vec::with_capacity(valid.len());
        for file in valid {
            let storage_key = match generate_storage_key(
                context.org_id,
                context.folder.as_deref(),
                &file.file_name,
            ) {
                Ok(key) => key,
                Err(e) => {
                    failed.push(FailedUpload {
                        file_id: Some(file.file_id),
                        file_name: Some(file.file_name),
                        original_name: file.original_name,
                        error: FileError::validation(e.to_string()),
                    });
                    continue;
                }
            };
            sizes.push(file.size);
            dispatched.push(Dispatched {
                file_id: file.file_id,
                file_name: file.file_name.clone(),
                original_name: file.original_name.clone(),
                storage_key: storage_key.clone(),
            });
            tasks.push(FileTask {
                file,
                storage_key,
                context: context.clone(),
            });
        }
        if tasks.is_empty() {
            return Err(BatchUploadError::NoValidFiles {
                failed_uploads: failed,
            });
        }

        let (settled, chunks) = if tasks.len() > self.settings.chunk_threshold {
            let chunk_size = estimate_chunk_size(&sizes, self.memory.snapshot());
            let chunks = tasks.len().div_ceil(chunk_size);
            tracing::info!(
                files = tasks.len(),
                chunk_size = chunk_size,
                chunks = chunks,
                "Dispatching batch in chunks"
            );
            (self.pool.execute_batch(tasks, chunk_size).await, chunks)
        } else {
            (self.pool.execute_parallel(tasks).await, 1)
        };

        let dispatched_count = dispatched.len();
        let mut stored = Vec::with_capacity(dispatched_count);
        let mut pool_rejections = 0;
        let mut abandoned = Vec::new();
        for (file, outcome) in dispatched.into_iter().zip(settled) {
            match outcome {
                Ok(ProcessedFileResult::Stored(record)) => stored.push(record),
                Ok(ProcessedFileResult::Failed(failure)) => failed.push(failure),
                Err(err) => {
                    match &err {
                        PoolError::Shutdown
                        | PoolError::NotRunning
                        | PoolError::Overloaded { .. } => pool_rejections += 1,
                        PoolError::TimedOut { .. } | PoolError::WorkerCrashed { .. } => {
                            abandoned.push(file.storage_key.clone())
                        }
                    }
                    failed.push(pool_failure(file, &err));
                }
            }
        }

        if !abandoned.is_empty() {
            let cleanup = self.compensate(&abandoned).await;
            tracing::warn!(
                abandoned = abandoned.len(),
                deleted = cleanup.deleted.len(),
                orphaned = cleanup.orphaned.len(),
                "Cleaned up objects of abandoned uploads"
            );
        }

        if stored.is_empty() && pool_rejections == dispatched_count {
            return Err(BatchUploadError::PoolUnavailable(format!(
                "All {} uploads were rejected by the worker pool",
                dispatched_count
            )));
        }

        if !stored.is_empty() {
            if let Err(err) = self.persist(&stored).await {
                tracing::error!(
                    error = %err,
                    files = stored.len(),
                    "Failed to record uploaded files, removing stored objects"
                );
                let keys: Vec<String> = stored.iter().map(|r| r.storage_key.clone()).collect();
                let compensation = self.compensate(&keys).await;
                return Err(BatchUploadError::Persistence {
                    message: err.to_string(),
                    files: stored.len(),
                    compensation,
                });
            }
            self.record_usage(context.org_id, &stored).await;
            self.trigger_scans(&stored);
        }

        let result = BatchResult::new(
            stored,
            failed,
            start.elapsed().as_millis() as u64,
            chunks,
        );
        tracing::info!(
            total = result.statistics.total,
            successful = result.statistics.successful,
            failed = result.statistics.failed,
            chunks = result.statistics.chunks,
            duration_ms = result.statistics.processing_time_ms,
            "Batch upload finished"
        );
        Ok(result)
    }

    /// Bulk insert with bounded retries and linear backoff.
    async fn persist(&self, records: &[StoredFile]) -> Result<u64, AppError> {
        let mut attempt: u32 = 0;
        loop {
            match self.metadata.insert_many(records).await {
                Ok(inserted) => return Ok(inserted),
                Err(err) if attempt < self.settings.persist_retries => {
                    attempt += 1;
                    tracing::warn!(
                        error = %err,
                        attempt = attempt,
                        max_retries = self.settings.persist_retries,
                        "Bulk insert failed, retrying"
                    );
                    tokio::time::sleep(self.settings.persist_retry_backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Best-effort delete of objects that will never get a metadata record. Deleting a
    /// key that was never written is not an error.
    async fn compensate(&self, keys: &[String]) -> CompensationReport {
        let deletions = keys.iter().map(|key| {
            let storage = self.storage.clone();
            async move {
                let result = storage.delete(key).await;
                (key.clone(), result)
            }
        });

        let mut report = CompensationReport::default();
        for (key, result) in join_all(deletions).await {
            match result {
                Ok(()) => report.deleted.push(key),
                Err(e) => {
                    tracing::error!(storage_key = %key, error = %e, "Orphaned object left in storage");
                    report.orphaned.push(key);
                }
            }
        }
        report
    }

    /// One atomic increment per batch. Files are already committed, so a failure here is
    /// logged and left to usage reconciliation.
    async fn record_usage(&self, org_id: Uuid, records: &[StoredFile]) {
        let bytes: u64 = records.iter().map(|r| r.size).sum();
        let delta_bytes = i64::try_from(bytes).unwrap_or(i64::MAX);
        let delta_count = records.len() as i64;

        match self
            .metadata
            .increment_usage(org_id, delta_bytes, delta_count)
            .await
        {
            Ok(totals) => tracing::debug!(
                used_storage_bytes = totals.used_storage_bytes,
                file_count = totals.file_count,
                "Storage usage updated"
            ),
            Err(e) => tracing::error!(
                error = %e,
                delta_bytes = delta_bytes,
                delta_count = delta_count,
                "Failed to update storage usage"
            ),
        }
    }

    fn trigger_scans(&self, records: &[StoredFile]) {
        for record in records {
            let scanner = self.scanner.clone();
            let timeout: Duration = self.settings.scan_timeout;
            let file_id = record.file_id;
            let storage_key = record.storage_key.clone();

            self.scans.spawn(async move {
                match tokio::time::timeout(timeout, scanner.submit(file_id, &storage_key)).await {
                    Ok(Ok(())) => tracing::debug!(file_id = %file_id, "Virus scan queued"),
                    Ok(Err(e)) => tracing::warn!(
                        file_id = %file_id,
                        error = %e,
                        "Failed to trigger virus scan"
                    ),
                    Err(_) => tracing::warn!(
                        file_id = %file_id,
                        timeout_secs = timeout.as_secs(),
                        "Virus scan trigger timed out"
                    ),
                }
            });
        }
    }
}
