//! Memory headroom probing
//!
//! The upload chunk estimator consumes a [`MemorySnapshot`] so it stays a pure function;
//! this module is where the snapshot comes from.

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use sysinfo::System;

/// Memory counters in bytes at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemorySnapshot {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

impl MemorySnapshot {
    pub fn free_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.used_bytes)
    }
}

pub trait MemoryReader: Send + Sync {
    fn snapshot(&self) -> MemorySnapshot;
}

/// Reads system memory through sysinfo.
#[derive(Clone)]
pub struct MemoryProbe {
    system: Arc<Mutex<System>>,
}

impl MemoryProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();

        Self {
            system: Arc::new(Mutex::new(system)),
        }
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReader for MemoryProbe {
    fn snapshot(&self) -> MemorySnapshot {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_memory();

        let snapshot = MemorySnapshot {
            total_bytes: system.total_memory(),
            used_bytes: system.used_memory(),
        };
        tracing::trace!(
            total_bytes = snapshot.total_bytes,
            used_bytes = snapshot.used_bytes,
            "Memory snapshot"
        );
        snapshot
    }
}
