//! This module contains the pure, stateless, and performant kernels for performing
//! XOR delta encoding and decoding.
//!
//! Each element is replaced by its XOR with the previous element. It is
//! particularly effective for slowly changing data, including float values,
//! where it isolates the few bits that flip between neighbours.
//!
//! XOR is bytewise, so the kernel works on raw bytes with a stride of one
//! element and never needs an aligned typed view.

use crate::error::VolpipeError;

/// Performs XOR delta encoding **in-place** on a byte slice of `stride`-byte elements.
fn xor_delta_inplace(data: &mut [u8], stride: usize) {
    if data.len() <= stride {
        return;
    }
    // Iterate backwards for encoding to use original values for calculation.
    for i in (stride..data.len()).rev() {
        data[i] ^= data[i - stride];
    }
}

/// Reconstructs the original data from an XOR delta stream **in-place**.
fn xor_undelta_inplace(data: &mut [u8], stride: usize) {
    if data.len() <= stride {
        return;
    }
    // Iterate forwards to use the newly-decoded values for subsequent XORs.
    for i in stride..data.len() {
        data[i] ^= data[i - stride];
    }
}

fn check_stride(len: usize, stride: usize) -> Result<(), VolpipeError> {
    if stride == 0 || len % stride != 0 {
        return Err(VolpipeError::BufferMismatch {
            expected: len - len % stride.max(1),
            actual: len,
        });
    }
    Ok(())
}

/// The public-facing encode function for this module.
pub fn encode(input_bytes: &[u8], stride: usize, output_buf: &mut Vec<u8>) -> Result<(), VolpipeError> {
    check_stride(input_bytes.len(), stride)?;
    output_buf.clear();
    output_buf.extend_from_slice(input_bytes);
    xor_delta_inplace(output_buf, stride);
    Ok(())
}

/// The public-facing decode function for this module.
pub fn decode(input_bytes: &[u8], stride: usize, output_buf: &mut Vec<u8>) -> Result<(), VolpipeError> {
    check_stride(input_bytes.len(), stride)?;
    output_buf.clear();
    output_buf.extend_from_slice(input_bytes);
    xor_undelta_inplace(output_buf, stride);
    Ok(())
}
