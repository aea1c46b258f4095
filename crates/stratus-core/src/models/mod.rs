//! Data models for the upload pipeline
//!
//! Each sub-module represents a specific feature area.

mod batch;
mod upload;
mod usage;

// Re-export all models for convenient imports
pub use batch::*;
pub use upload::*;
pub use usage::*;
