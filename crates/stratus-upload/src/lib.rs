//! Stratus upload pipeline
//!
//! - [`estimator`]: chunk size from memory headroom and average file size
//! - [`validate`]: per-file checks and identity generation
//! - [`processor`]: the task each pool worker runs for one file
//! - [`service`]: the batch orchestrator tying quota, pool, persistence and accounting
//!   together

pub mod estimator;
pub mod processor;
pub mod service;
pub mod settings;
pub mod validate;

pub use estimator::{estimate_chunk_size, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
pub use processor::{create_upload_pool, FileProcessor, FileTask};
pub use service::BatchUploadService;
pub use settings::UploadSettings;
