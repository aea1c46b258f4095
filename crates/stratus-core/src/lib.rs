//! Stratus Core Library
//!
//! This crate provides core domain models, error types, configuration, validation and the
//! collaborator traits that are shared across all Stratus components.

pub mod config;
pub mod constants;
pub mod error;
pub mod hooks;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{BaseConfig, Config, UploadServiceConfig};
pub use error::{AppError, BatchUploadError, ErrorMetadata, LogLevel};
pub use hooks::{FileMetadataStore, QuotaService, VirusScanTrigger};
pub use storage_types::StorageBackend;
// Note: Storage, StorageError, StorageResult live in the stratus-storage crate
