//! This module provides a set of shared, low-level utility functions used
//! throughout the volpipe core.
//!
//! Its primary responsibilities include:
//! 1.  Providing safe conversions between raw byte slices and typed values.
//!     Stage inputs live at arbitrary offsets inside caller buffers, so nothing
//!     here assumes alignment.
//! 2.  Normalizing the caller's thread budget.

use crate::error::VolpipeError;

//==================================================================================
// 1. Core Utility Functions
//==================================================================================

/// Copies a byte slice into an owned, properly aligned `Vec<T>`.
///
/// # Errors
/// Returns `VolpipeError::BufferMismatch` if the byte length is not a multiple
/// of the size of `T`.
pub fn bytes_to_typed_vec<T>(bytes: &[u8]) -> Result<Vec<T>, VolpipeError>
where
    T: bytemuck::Pod,
{
    let width = std::mem::size_of::<T>();
    if width == 0 || bytes.len() % width != 0 {
        return Err(VolpipeError::BufferMismatch {
            expected: bytes.len() - bytes.len() % width.max(1),
            actual: bytes.len(),
        });
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

/// Converts a slice of primitive values into a `Vec<u8>` in native byte order.
pub fn typed_slice_to_bytes<T: bytemuck::Pod>(data: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(data).to_vec()
}

/// Reads a little-endian `u64` from the first 8 bytes of `bytes`.
pub fn read_u64_le(bytes: &[u8]) -> Option<u64> {
    let head: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(head))
}

/// Clamps a requested thread count into `1..=available_parallelism`.
/// A request of `0` means "single threaded".
pub fn clean_thread_count(requested: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let cleaned = requested.clamp(1, available.max(1));
    if cleaned != requested && requested != 0 {
        log::warn!(
            "Requested {} threads, clamped to {} (available parallelism)",
            requested,
            cleaned
        );
    }
    cleaned
}
