//! Stratus Services Layer
//!
//! Outbound integrations used by the upload pipeline. Today this is the virus scan
//! trigger: an HTTP callback to the external scanner, or a disabled no-op.

pub mod services;

#[cfg(feature = "virus-scan-http")]
pub use services::virus_scan::HttpScanTrigger;
pub use services::virus_scan::{create_scan_trigger, NoopScanTrigger};
