//! Stratus Storage Library
//!
//! This crate provides the object store abstraction used by upload workers, with
//! implementations for S3 (and S3-compatible providers) and the local filesystem.
//!
//! # Storage key format
//!
//! Storage keys are organization-scoped. All backends use the same key layout:
//!
//! - **No folder**: `orgs/{org_id}/{file_name}`
//! - **With folder**: `orgs/{org_id}/{folder}/{file_name}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{generate_storage_key, normalize_folder};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use stratus_core::StorageBackend;
pub use traits::{ObjectMetadata, Storage, StorageError, StorageResult, StoredObject};
