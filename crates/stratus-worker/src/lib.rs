//! Stratus Worker Library
//!
//! A fixed-size pool of isolated async workers with a bounded FIFO queue. Task input is
//! moved into the worker that runs it and the output is moved back through a one-shot
//! channel; workers never share mutable state with the submitter.

pub mod config;
pub mod error;
pub mod handler;
pub mod pool;
pub mod stats;

pub use config::WorkerPoolConfig;
pub use error::PoolError;
pub use handler::TaskHandler;
pub use pool::{TaskHandle, WorkerPool};
pub use stats::PoolStats;
