//! Stratus database layer
//!
//! PostgreSQL repositories for uploaded file records and per-organization storage usage,
//! plus connection setup and migrations.

pub mod db;
pub mod setup;

pub use db::{FileRepository, PgFileMetadataStore, UsageRepository};
pub use setup::setup_database;
