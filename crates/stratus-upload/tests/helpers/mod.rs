//! In-memory collaborators for batch upload tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use stratus_core::constants::META_ORIGINAL_NAME;
use stratus_core::models::{IncomingFile, QuotaDecision, StoredFile, UploadContext, UsageTotals};
use stratus_core::{AppError, FileMetadataStore, QuotaService, StorageBackend, VirusScanTrigger};
use stratus_infra::{MemoryReader, MemorySnapshot};
use stratus_storage::{ObjectMetadata, Storage, StorageError, StorageResult, StoredObject};
use stratus_upload::{create_upload_pool, BatchUploadService, UploadSettings};
use stratus_worker::WorkerPoolConfig;
use uuid::Uuid;

pub const MB: u64 = 1024 * 1024;

/// Object store that keeps sizes in a map and fails or stalls on chosen original names.
///
/// `slow_on` stalls before writing. `late_ack_on` writes first and stalls before
/// acknowledging, like a backend that committed the object but answered too late.
#[derive(Default)]
pub struct RecordingStorage {
    pub objects: Mutex<HashMap<String, u64>>,
    pub puts: AtomicUsize,
    pub deletes: AtomicUsize,
    fail_names: HashSet<String>,
    slow_names: HashSet<String>,
    slow_delay: Duration,
    late_ack_names: HashSet<String>,
    fail_deletes: AtomicBool,
}

impl RecordingStorage {
    pub fn failing_on(names: &[&str]) -> Self {
        Self {
            fail_names: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn slow_on(names: &[&str], delay: Duration) -> Self {
        Self {
            slow_names: names.iter().map(|n| n.to_string()).collect(),
            slow_delay: delay,
            ..Self::default()
        }
    }

    pub fn late_ack_on(names: &[&str], delay: Duration) -> Self {
        Self {
            late_ack_names: names.iter().map(|n| n.to_string()).collect(),
            slow_delay: delay,
            ..Self::default()
        }
    }

    pub fn with_failing_deletes(self) -> Self {
        self.fail_deletes.store(true, Ordering::SeqCst);
        self
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn put(
        &self,
        storage_key: &str,
        data: Bytes,
        _content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<StoredObject> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let original = metadata.get(META_ORIGINAL_NAME).cloned().unwrap_or_default();

        if self.slow_names.contains(&original) {
            tokio::time::sleep(self.slow_delay).await;
        }
        if self.fail_names.contains(&original) {
            return Err(StorageError::UploadFailed(format!(
                "simulated failure for {}",
                original
            )));
        }

        let size = data.len() as u64;
        self.objects
            .lock()
            .unwrap()
            .insert(storage_key.to_string(), size);
        if self.late_ack_names.contains(&original) {
            tokio::time::sleep(self.slow_delay).await;
        }
        Ok(StoredObject {
            key: storage_key.to_string(),
            size,
        })
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(storage_key.to_string()));
        }
        self.objects.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.contains(storage_key))
    }

    fn bucket(&self) -> Option<&str> {
        Some("test-bucket")
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// Metadata store with atomic usage counters and injectable insert failures.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    pub records: Mutex<Vec<StoredFile>>,
    pub insert_calls: AtomicUsize,
    failures_left: AtomicUsize,
    used_bytes: AtomicI64,
    file_count: AtomicI64,
}

impl InMemoryMetadataStore {
    /// Fail the next `n` inserts.
    pub fn failing(n: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn used_bytes(&self) -> i64 {
        self.used_bytes.load(Ordering::SeqCst)
    }

    pub fn file_count(&self) -> i64 {
        self.file_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileMetadataStore for InMemoryMetadataStore {
    async fn insert_many(&self, records: &[StoredFile]) -> Result<u64, AppError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(AppError::Persistence("simulated insert failure".to_string()));
        }
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(records.len() as u64)
    }

    async fn increment_usage(
        &self,
        org_id: Uuid,
        delta_bytes: i64,
        delta_count: i64,
    ) -> Result<UsageTotals, AppError> {
        let used = self.used_bytes.fetch_add(delta_bytes, Ordering::SeqCst) + delta_bytes;
        let count = self.file_count.fetch_add(delta_count, Ordering::SeqCst) + delta_count;
        Ok(UsageTotals {
            org_id,
            used_storage_bytes: used,
            file_count: count,
        })
    }
}

/// Quota with fixed usage and limit.
#[derive(Default)]
pub struct StaticQuota {
    used: i64,
    limit: Option<i64>,
    pub calls: AtomicUsize,
    pub last_requested: AtomicU64,
}

impl StaticQuota {
    pub fn limited(used: u64, limit: u64) -> Self {
        Self {
            used: used as i64,
            limit: Some(limit as i64),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuotaService for StaticQuota {
    async fn check(&self, _org_id: Uuid, requested_bytes: u64) -> Result<QuotaDecision, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_requested.store(requested_bytes, Ordering::SeqCst);
        Ok(QuotaDecision::evaluate(self.used, self.limit, requested_bytes))
    }
}

#[derive(Default)]
pub struct RecordingScanTrigger {
    pub submitted: Mutex<Vec<(Uuid, String)>>,
    fail: bool,
    delay: Duration,
}

impl RecordingScanTrigger {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Each submission takes `delay` before it is recorded.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    /// Poll until `expected` submissions arrived or `timeout` elapsed.
    pub async fn wait_for(&self, expected: usize, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        while self.count() < expected && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.count()
    }
}

#[async_trait]
impl VirusScanTrigger for RecordingScanTrigger {
    async fn submit(&self, file_id: Uuid, storage_key: &str) -> Result<(), AppError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.submitted
            .lock()
            .unwrap()
            .push((file_id, storage_key.to_string()));
        if self.fail {
            return Err(AppError::VirusScan("scanner unreachable".to_string()));
        }
        Ok(())
    }
}

pub struct FixedMemory(pub MemorySnapshot);

impl MemoryReader for FixedMemory {
    fn snapshot(&self) -> MemorySnapshot {
        self.0
    }
}

pub struct Harness {
    pub service: Arc<BatchUploadService>,
    pub storage: Arc<RecordingStorage>,
    pub metadata: Arc<InMemoryMetadataStore>,
    pub quota: Arc<StaticQuota>,
    pub scanner: Arc<RecordingScanTrigger>,
}

pub struct HarnessBuilder {
    pub storage: RecordingStorage,
    pub metadata: InMemoryMetadataStore,
    pub quota: StaticQuota,
    pub scanner: RecordingScanTrigger,
    pub memory: MemorySnapshot,
    pub settings: UploadSettings,
    pub pool: WorkerPoolConfig,
    pub start_pool: bool,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            storage: RecordingStorage::default(),
            metadata: InMemoryMetadataStore::default(),
            quota: StaticQuota::default(),
            scanner: RecordingScanTrigger::default(),
            memory: MemorySnapshot {
                total_bytes: 16 * 1024 * MB,
                used_bytes: 0,
            },
            settings: UploadSettings {
                persist_retry_backoff: Duration::from_millis(10),
                ..UploadSettings::default()
            },
            pool: WorkerPoolConfig {
                size: 4,
                max_queue_depth: 1000,
                task_timeout: Duration::from_secs(5),
            },
            start_pool: true,
        }
    }
}

impl HarnessBuilder {
    pub fn build(self) -> Harness {
        let storage = Arc::new(self.storage);
        let metadata = Arc::new(self.metadata);
        let quota = Arc::new(self.quota);
        let scanner = Arc::new(self.scanner);

        let pool = create_upload_pool(storage.clone(), self.pool);
        if self.start_pool {
            pool.init().unwrap();
        }

        let service = BatchUploadService::new(
            pool,
            storage.clone(),
            metadata.clone(),
            quota.clone(),
            scanner.clone(),
            Arc::new(FixedMemory(self.memory)),
            self.settings,
        );

        Harness {
            service: Arc::new(service),
            storage,
            metadata,
            quota,
            scanner,
        }
    }
}

pub fn context() -> UploadContext {
    UploadContext {
        org_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        user_name: "Grace Hopper".to_string(),
        user_email: "grace@example.com".to_string(),
        folder: None,
    }
}

pub fn file(name: &str, size: usize) -> IncomingFile {
    IncomingFile::new(name, "text/plain", vec![b'x'; size])
}

/// `count` files named `file-1.txt` to `file-{count}.txt`.
pub fn numbered_files(count: usize, size: usize) -> Vec<IncomingFile> {
    (1..=count)
        .map(|i| file(&format!("file-{}.txt", i), size))
        .collect()
}
