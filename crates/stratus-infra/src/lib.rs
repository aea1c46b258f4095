//! Stratus Infrastructure Library
//!
//! Shared infrastructure used by Stratus binaries:
//! - Telemetry initialization
//! - Memory headroom probing for upload chunk sizing

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "capacity")]
pub mod capacity;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};

#[cfg(feature = "capacity")]
pub use capacity::{MemoryProbe, MemoryReader, MemorySnapshot};
