//! Error types module
//!
//! `AppError` is the service-wide error used by repositories and collaborators.
//! `BatchUploadError` is the single structured failure of a batch upload: per-file problems
//! never reach it, they are aggregated into the batch report instead.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

use crate::models::{CompensationReport, FailedUpload};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for policy rejections like quota or overload
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "DATABASE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Upload pool is shut down")]
    PoolShutdown,

    #[error("Upload pool overloaded: {queued} tasks queued (max {max})")]
    PoolOverloaded { queued: usize, max: usize },

    #[error("Upload pool error: {0}")]
    Pool(String),

    #[error("Virus scan trigger failed: {0}")]
    VirusScan(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Persistence(_) => (
            500,
            "PERSISTENCE_ERROR",
            true,
            Some("Retry the upload"),
            true,
            LogLevel::Error,
        ),
        AppError::PoolShutdown => (
            503,
            "POOL_SHUTDOWN",
            true,
            Some("Retry against another instance"),
            false,
            LogLevel::Warn,
        ),
        AppError::PoolOverloaded { .. } => (
            503,
            "POOL_OVERLOADED",
            true,
            Some("Wait 30-60 seconds and retry"),
            false,
            LogLevel::Warn,
        ),
        AppError::Pool(_) => (
            500,
            "POOL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::VirusScan(_) => (
            502,
            "VIRUS_SCAN_ERROR",
            true,
            None,
            true,
            LogLevel::Warn,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::Persistence(_) => "Failed to record uploaded files".to_string(),
            AppError::PoolShutdown => "Upload service is shutting down".to_string(),
            AppError::PoolOverloaded { .. } => "Upload service is busy".to_string(),
            AppError::Pool(_) => "Upload worker failure".to_string(),
            AppError::VirusScan(_) => "Virus scan service unavailable".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

/// Batch-level failure of an upload request. Nothing in the batch was committed, except
/// where `Persistence` reports orphaned objects.
#[derive(Debug, thiserror::Error)]
pub enum BatchUploadError {
    #[error("Batch of {count} files exceeds the maximum of {max}")]
    TooManyFiles { count: usize, max: usize },

    #[error("No valid files in batch ({} rejected)", .failed_uploads.len())]
    NoValidFiles { failed_uploads: Vec<FailedUpload> },

    #[error("Storage quota exceeded: {requested} bytes requested, {available} bytes available")]
    QuotaExceeded {
        requested: u64,
        available: i64,
        reason: Option<String>,
        /// Files already rejected by validation, reported alongside the quota failure.
        failed_uploads: Vec<FailedUpload>,
    },

    #[error("Failed to record {files} uploaded files: {message}")]
    Persistence {
        message: String,
        files: usize,
        compensation: CompensationReport,
    },

    #[error("Upload pool unavailable: {0}")]
    PoolUnavailable(String),

    #[error(transparent)]
    Internal(#[from] AppError),
}

impl ErrorMetadata for BatchUploadError {
    fn http_status_code(&self) -> u16 {
        match self {
            BatchUploadError::TooManyFiles { .. } | BatchUploadError::NoValidFiles { .. } => 400,
            BatchUploadError::QuotaExceeded { .. } => 402,
            BatchUploadError::Persistence { .. } => 500,
            BatchUploadError::PoolUnavailable(_) => 503,
            BatchUploadError::Internal(e) => e.http_status_code(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            BatchUploadError::TooManyFiles { .. } => "BATCH_TOO_LARGE",
            BatchUploadError::NoValidFiles { .. } => "NO_VALID_FILES",
            BatchUploadError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            BatchUploadError::Persistence { .. } => "PERSISTENCE_ERROR",
            BatchUploadError::PoolUnavailable(_) => "POOL_UNAVAILABLE",
            BatchUploadError::Internal(e) => e.error_code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            BatchUploadError::TooManyFiles { .. }
            | BatchUploadError::NoValidFiles { .. }
            | BatchUploadError::QuotaExceeded { .. } => false,
            BatchUploadError::Persistence { .. } | BatchUploadError::PoolUnavailable(_) => true,
            BatchUploadError::Internal(e) => e.is_recoverable(),
        }
    }

    fn suggested_action(&self) -> Option<&'static str> {
        match self {
            BatchUploadError::TooManyFiles { .. } => Some("Split the batch into smaller requests"),
            BatchUploadError::NoValidFiles { .. } => Some("Check file sizes and names"),
            BatchUploadError::QuotaExceeded { .. } => Some("Delete files or upgrade plan"),
            BatchUploadError::Persistence { .. } => Some("Retry the upload"),
            BatchUploadError::PoolUnavailable(_) => Some("Wait 30-60 seconds and retry"),
            BatchUploadError::Internal(e) => e.suggested_action(),
        }
    }

    fn client_message(&self) -> String {
        match self {
            BatchUploadError::Persistence { .. } => "Failed to record uploaded files".to_string(),
            BatchUploadError::PoolUnavailable(_) => "Upload service unavailable".to_string(),
            BatchUploadError::Internal(e) => e.client_message(),
            other => other.to_string(),
        }
    }

    fn is_sensitive(&self) -> bool {
        match self {
            BatchUploadError::Persistence { .. } => true,
            BatchUploadError::Internal(e) => e.is_sensitive(),
            _ => false,
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            BatchUploadError::TooManyFiles { .. } | BatchUploadError::NoValidFiles { .. } => {
                LogLevel::Debug
            }
            BatchUploadError::QuotaExceeded { .. } | BatchUploadError::PoolUnavailable(_) => {
                LogLevel::Warn
            }
            BatchUploadError::Persistence { .. } => LogLevel::Error,
            BatchUploadError::Internal(e) => e.log_level(),
        }
    }
}
