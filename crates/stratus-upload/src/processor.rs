//! The per-file task run inside a pool worker.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use stratus_core::constants::{META_FILE_ID, META_ORG_ID, META_ORIGINAL_NAME, META_UPLOADED_BY};
use stratus_core::models::{
    FailedUpload, FileDescriptor, FileError, ProcessedFileResult, StoredFile, UploadContext,
    VirusScanStatus,
};
use stratus_storage::{ObjectMetadata, Storage};
use stratus_worker::{TaskHandler, WorkerPool, WorkerPoolConfig};

/// One validated file plus the batch context it belongs to. Moved into the worker.
///
/// The key is fixed before dispatch so the orchestrator can clean up an object whose
/// task was abandoned by the pool.
pub struct FileTask {
    pub file: FileDescriptor,
    pub storage_key: String,
    pub context: Arc<UploadContext>,
}

/// Streams one file into the object store.
///
/// Never fails outward: storage errors become [`ProcessedFileResult::Failed`]. Does not
/// touch the database.
#[derive(Clone)]
pub struct FileProcessor {
    storage: Arc<dyn Storage>,
}

impl FileProcessor {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

/// Pool whose workers run [`FileProcessor`]. Call `init` before use.
pub fn create_upload_pool(
    storage: Arc<dyn Storage>,
    config: WorkerPoolConfig,
) -> WorkerPool<FileProcessor> {
    WorkerPool::new(FileProcessor::new(storage), config)
}

fn object_metadata(file: &FileDescriptor, context: &UploadContext) -> ObjectMetadata {
    let mut metadata = ObjectMetadata::new();
    metadata.insert(META_ORG_ID.to_string(), context.org_id.to_string());
    metadata.insert(META_UPLOADED_BY.to_string(), context.user_id.to_string());
    metadata.insert(META_ORIGINAL_NAME.to_string(), file.original_name.clone());
    metadata.insert(META_FILE_ID.to_string(), file.file_id.to_string());
    metadata
}

#[async_trait]
impl TaskHandler for FileProcessor {
    type Input = FileTask;
    type Output = ProcessedFileResult;

    fn action(&self) -> &'static str {
        "upload_file"
    }

    async fn handle(&self, task: FileTask) -> ProcessedFileResult {
        let FileTask {
            file,
            storage_key,
            context,
        } = task;

        let metadata = object_metadata(&file, &context);
        let FileDescriptor {
            file_id,
            file_name,
            original_name,
            size,
            mime_type,
            bytes,
        } = file;

        match self
            .storage
            .put(&storage_key, bytes, &mime_type, &metadata)
            .await
        {
            Ok(stored) => {
                tracing::debug!(
                    file_id = %file_id,
                    storage_key = %stored.key,
                    size = stored.size,
                    "File stored"
                );
                ProcessedFileResult::Stored(StoredFile {
                    file_id,
                    file_name,
                    original_name,
                    size,
                    mime_type,
                    storage_key: stored.key,
                    bucket: self.storage.bucket().map(str::to_string),
                    org_id: context.org_id,
                    uploaded_by: context.user_id,
                    folder: context.folder.clone(),
                    virus_scan_status: VirusScanStatus::Pending,
                    uploaded_at: Utc::now(),
                })
            }
            Err(e) => {
                tracing::warn!(
                    file_id = %file_id,
                    original_name = %original_name,
                    error = %e,
                    "Failed to store file"
                );
                ProcessedFileResult::Failed(FailedUpload {
                    file_id: Some(file_id),
                    file_name: Some(file_name),
                    original_name,
                    error: FileError::upload(e.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use stratus_core::models::FileErrorKind;
    use stratus_storage::{generate_storage_key, LocalStorage};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn context(folder: Option<&str>) -> Arc<UploadContext> {
        Arc::new(UploadContext {
            org_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: "Ada".to_string(),
            user_email: "ada@example.com".to_string(),
            folder: folder.map(str::to_string),
        })
    }

    fn descriptor(file_name: &str) -> FileDescriptor {
        FileDescriptor {
            file_id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            original_name: "notes.txt".to_string(),
            size: 5,
            mime_type: "text/plain".to_string(),
            bytes: Bytes::from_static(b"hello"),
        }
    }

    async fn processor(dir: &TempDir) -> FileProcessor {
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        FileProcessor::new(Arc::new(storage))
    }

    #[tokio::test]
    async fn stores_file_under_org_scoped_key() {
        let dir = TempDir::new().unwrap();
        let processor = processor(&dir).await;
        let context = context(Some("reports"));
        let file = descriptor("abc.txt");
        let storage_key =
            generate_storage_key(context.org_id, context.folder.as_deref(), "abc.txt").unwrap();

        let result = processor
            .handle(FileTask {
                file,
                storage_key,
                context: context.clone(),
            })
            .await;

        let ProcessedFileResult::Stored(stored) = result else {
            panic!("expected stored file");
        };
        assert_eq!(
            stored.storage_key,
            format!("orgs/{}/reports/abc.txt", context.org_id)
        );
        assert_eq!(stored.virus_scan_status, VirusScanStatus::Pending);
        assert_eq!(stored.size, 5);
        assert!(stored.bucket.is_none());
        assert!(dir.path().join(&stored.storage_key).exists());
    }

    #[tokio::test]
    async fn storage_rejection_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let processor = processor(&dir).await;

        let result = processor
            .handle(FileTask {
                file: descriptor("escape.txt"),
                storage_key: "../escape.txt".to_string(),
                context: context(None),
            })
            .await;

        let ProcessedFileResult::Failed(failed) = result else {
            panic!("expected failure");
        };
        assert_eq!(failed.error.kind, FileErrorKind::Upload);
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
        assert_eq!(failed.original_name, "notes.txt");
    }

    #[test]
    fn metadata_carries_identity() {
        let context = context(None);
        let file = descriptor("abc.txt");
        let metadata = object_metadata(&file, &context);

        assert_eq!(metadata[META_ORG_ID], context.org_id.to_string());
        assert_eq!(metadata[META_UPLOADED_BY], context.user_id.to_string());
        assert_eq!(metadata[META_ORIGINAL_NAME], "notes.txt");
        assert_eq!(metadata[META_FILE_ID], file.file_id.to_string());
    }
}
