//! This module contains the pure, stateless, and performant kernels for performing
//! Zstandard compression and decompression.
//!
//! This is the entropy-coding stage that usually ends a pipeline. It takes a
//! byte buffer that has already been reshaped by the preceding stages and
//! produces an opaque, self-delimiting frame:
//!
//! ```text
//! [ raw length: u64 LE ][ zstd frame ]
//! ```
//!
//! The length prefix lets the decoder size its output without any layout
//! information from the header. This module is a safe, panic-free wrapper
//! around the `zstd` crate.

use std::io::Read;
use zstd::stream::Decoder;

use crate::error::VolpipeError;
use crate::utils::read_u64_le;

/// Size of the raw-length prefix written before every frame.
pub const LENGTH_PREFIX: usize = 8;

//==================================================================================
// 1. Core Logic (The "Engine")
//==================================================================================

/// Compresses a byte slice in one shot, so the output never exceeds
/// `ZSTD_compressBound`.
fn compress_slice(input_bytes: &[u8], output_buf: &mut Vec<u8>, level: i32) -> Result<(), VolpipeError> {
    let frame =
        zstd::bulk::compress(input_bytes, level).map_err(|e| VolpipeError::ZstdError(e.to_string()))?;
    output_buf.extend_from_slice(&frame);
    Ok(())
}

/// Decompresses a frame that is declared to hold exactly `raw_len` bytes.
fn decompress_slice(frame: &[u8], raw_len: usize, output_buf: &mut Vec<u8>) -> Result<(), VolpipeError> {
    let decoder = Decoder::new(frame).map_err(|e| VolpipeError::ZstdError(e.to_string()))?;

    // Read at most one byte past the declared size so an oversized frame is
    // detected without decoding all of it.
    let mut limited = decoder.take((raw_len as u64).saturating_add(1));
    limited
        .read_to_end(output_buf)
        .map_err(|e| VolpipeError::ZstdError(e.to_string()))?;

    if output_buf.len() != raw_len {
        return Err(VolpipeError::ZstdError(format!(
            "Frame decoded to {} bytes, its prefix declares {}",
            output_buf.len(),
            raw_len
        )));
    }
    Ok(())
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Worst-case encoded size for `input_size` raw bytes.
pub fn max_encoded_size(input_size: usize) -> Result<usize, VolpipeError> {
    LENGTH_PREFIX
        .checked_add(zstd::zstd_safe::compress_bound(input_size))
        .ok_or_else(|| VolpipeError::ShapeOverflow(format!("zstd bound for {} bytes", input_size)))
}

/// The public-facing encode function for this module.
pub fn encode(input_bytes: &[u8], output_buf: &mut Vec<u8>, level: i32) -> Result<(), VolpipeError> {
    output_buf.clear();
    output_buf.extend_from_slice(&(input_bytes.len() as u64).to_le_bytes());
    compress_slice(input_bytes, output_buf, level)
}

/// The public-facing decode function for this module.
///
/// When `expected_len` is known it must match the length prefix. A prefix
/// declaring more than `max_len` bytes is rejected before anything is
/// decompressed.
pub fn decode(
    input_bytes: &[u8],
    expected_len: Option<usize>,
    max_len: usize,
    output_buf: &mut Vec<u8>,
) -> Result<(), VolpipeError> {
    let raw_len = read_u64_le(input_bytes).ok_or_else(|| {
        VolpipeError::ZstdError(format!(
            "Input of {} bytes is shorter than the length prefix",
            input_bytes.len()
        ))
    })?;
    let raw_len = usize::try_from(raw_len)
        .map_err(|_| VolpipeError::ZstdError(format!("Declared length {} overflows usize", raw_len)))?;

    if let Some(expected) = expected_len {
        if expected != raw_len {
            return Err(VolpipeError::ZstdError(format!(
                "Frame declares {} bytes, layout expects {}",
                raw_len, expected
            )));
        }
    }
    if raw_len > max_len {
        return Err(VolpipeError::ZstdError(format!(
            "Frame declares {} bytes, at most {} are possible here",
            raw_len, max_len
        )));
    }

    output_buf.clear();
    decompress_slice(&input_bytes[LENGTH_PREFIX..], raw_len, output_buf)
}
