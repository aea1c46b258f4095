//! Chunk size estimation for large batches.

use stratus_infra::MemorySnapshot;

pub const MIN_CHUNK_SIZE: usize = 5;
pub const MAX_CHUNK_SIZE: usize = 50;

/// Share of free memory the upload buffers of one chunk may occupy.
const MEMORY_HEADROOM_RATIO: f64 = 0.7;
/// Each buffered file is assumed to cost twice its size while in transfer.
const BUFFER_OVERHEAD_FACTOR: f64 = 2.0;

/// Number of files to dispatch per chunk.
///
/// `floor(0.7 * free / (avg_size * 2))`, clamped to `[5, 50]`. Deterministic in its
/// inputs. An empty list yields the minimum; a list of empty files the maximum.
pub fn estimate_chunk_size(file_sizes: &[u64], memory: MemorySnapshot) -> usize {
    if file_sizes.is_empty() {
        return MIN_CHUNK_SIZE;
    }

    let total: f64 = file_sizes.iter().map(|&s| s as f64).sum();
    let average = total / file_sizes.len() as f64;
    if average <= 0.0 {
        return MAX_CHUNK_SIZE;
    }

    let available = MEMORY_HEADROOM_RATIO * memory.free_bytes() as f64;
    let optimal = (available / (average * BUFFER_OVERHEAD_FACTOR)).floor();

    // `as` saturates: negative and NaN become 0, huge values usize::MAX
    (optimal as usize).clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
}
