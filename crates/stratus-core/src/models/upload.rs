//! Per-file upload models: caller input, worker payload and per-file outcomes.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Who is uploading and where. Shared read-only by every task of a batch.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UploadContext {
    pub org_id: Uuid,
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub user_name: String,
    #[validate(email)]
    pub user_email: String,
    /// Optional destination folder inside the organization, `/`-separated.
    pub folder: Option<String>,
}

/// A file as received from the caller, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl IncomingFile {
    pub fn new(
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A validated file with its generated identity, ready to be moved into a worker.
///
/// `bytes` is immutable and owned; handing the descriptor to a worker transfers it.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub file_id: Uuid,
    /// Generated storage name (`{file_id}.{ext}`).
    pub file_name: String,
    /// Sanitized name supplied by the caller.
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Virus scan state of a stored file. New uploads always start as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "virus_scan_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum VirusScanStatus {
    #[default]
    Pending,
    Clean,
    Infected,
    Error,
}

impl VirusScanStatus {
    /// Lowercase label, identical to the serde and Postgres enum representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            VirusScanStatus::Pending => "pending",
            VirusScanStatus::Clean => "clean",
            VirusScanStatus::Infected => "infected",
            VirusScanStatus::Error => "error",
        }
    }
}

impl fmt::Display for VirusScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file that reached the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StoredFile {
    pub file_id: Uuid,
    pub file_name: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub storage_key: String,
    pub bucket: Option<String>,
    pub org_id: Uuid,
    pub uploaded_by: Uuid,
    pub folder: Option<String>,
    pub virus_scan_status: VirusScanStatus,
    pub uploaded_at: DateTime<Utc>,
}

/// Why a single file did not make it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileErrorKind {
    Validation,
    Upload,
    Timeout,
    WorkerCrashed,
    Overloaded,
    Shutdown,
}

impl fmt::Display for FileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileErrorKind::Validation => "validation",
            FileErrorKind::Upload => "upload",
            FileErrorKind::Timeout => "timeout",
            FileErrorKind::WorkerCrashed => "worker_crashed",
            FileErrorKind::Overloaded => "overloaded",
            FileErrorKind::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileError {
    pub kind: FileErrorKind,
    pub message: String,
}

impl FileError {
    pub fn new(kind: FileErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FileErrorKind::Validation, message)
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self::new(FileErrorKind::Upload, message)
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A file that failed validation, upload or dispatch.
///
/// `file_id` and `file_name` are absent when the file was rejected before an identity was
/// generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FailedUpload {
    pub file_id: Option<Uuid>,
    pub file_name: Option<String>,
    pub original_name: String,
    pub error: FileError,
}

/// Terminal outcome of one file processing task: success xor failure, always present.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessedFileResult {
    Stored(StoredFile),
    Failed(FailedUpload),
}
