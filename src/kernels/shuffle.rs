//! This module contains the pure, stateless, and performant kernel for performing
//! byte-shuffling on streams of fixed-width elements.
//!
//! It reorganizes a row-oriented byte stream into a "byte-plane" layout: all
//! first bytes, then all second bytes, and so on. Smoothly varying volumes have
//! nearly constant high-order planes, which the entropy stage compresses far
//! better than the interleaved original.

use crate::error::VolpipeError;

//==================================================================================
// 1. Core Logic (The "Engine")
//==================================================================================

fn shuffle_bytes(input_bytes: &[u8], element_size: usize, output_buf: &mut Vec<u8>) {
    let num_elements = input_bytes.len() / element_size;
    output_buf.clear();
    output_buf.resize(input_bytes.len(), 0);

    for (j, element) in input_bytes.chunks_exact(element_size).enumerate() {
        for (i, &byte) in element.iter().enumerate() {
            output_buf[i * num_elements + j] = byte;
        }
    }
}

fn unshuffle_bytes(input_bytes: &[u8], element_size: usize, output_buf: &mut Vec<u8>) {
    let num_elements = input_bytes.len() / element_size;
    output_buf.clear();
    output_buf.resize(input_bytes.len(), 0);

    for (i, plane) in input_bytes.chunks_exact(num_elements).enumerate() {
        for (j, &byte) in plane.iter().enumerate() {
            output_buf[j * element_size + i] = byte;
        }
    }
}

fn check_width(len: usize, element_size: usize) -> Result<(), VolpipeError> {
    if element_size == 0 || len % element_size != 0 {
        return Err(VolpipeError::BufferMismatch {
            expected: len - len % element_size.max(1),
            actual: len,
        });
    }
    Ok(())
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Shuffles `input_bytes`, made of `element_size`-byte elements, into byte planes.
pub fn encode(
    input_bytes: &[u8],
    element_size: usize,
    output_buf: &mut Vec<u8>,
) -> Result<(), VolpipeError> {
    check_width(input_bytes.len(), element_size)?;
    if element_size == 1 || input_bytes.is_empty() {
        output_buf.clear();
        output_buf.extend_from_slice(input_bytes);
        return Ok(());
    }
    shuffle_bytes(input_bytes, element_size, output_buf);
    Ok(())
}

/// Restores the interleaved layout from byte planes.
pub fn decode(
    input_bytes: &[u8],
    element_size: usize,
    output_buf: &mut Vec<u8>,
) -> Result<(), VolpipeError> {
    check_width(input_bytes.len(), element_size)?;
    if element_size == 1 || input_bytes.is_empty() {
        output_buf.clear();
        output_buf.extend_from_slice(input_bytes);
        return Ok(());
    }
    unshuffle_bytes(input_bytes, element_size, output_buf);
    Ok(())
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::typed_slice_to_bytes;

    #[test]
    fn test_shuffle_u32_layout() {
        let original: Vec<u32> = vec![0x01020304, 0x05060708];
        let bytes = typed_slice_to_bytes(&original);
        let mut shuffled = Vec::new();
        encode(&bytes, 4, &mut shuffled).unwrap();

        // Byte plane i holds byte i of every element.
        let expected: Vec<u8> = (0..4)
            .flat_map(|i| bytes.chunks_exact(4).map(move |e| e[i]))
            .collect();
        assert_eq!(shuffled, expected);

        let mut restored = Vec::new();
        decode(&shuffled, 4, &mut restored).unwrap();
        assert_eq!(restored, bytes);
    }

    #[test]
    fn test_u8_is_identity() {
        let data = vec![1u8, 2, 3, 4, 5];
        let mut out = Vec::new();
        encode(&data, 1, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_misaligned_length_is_error() {
        let mut out = Vec::new();
        let result = decode(&[1, 2, 3], 2, &mut out);
        assert!(matches!(
            result,
            Err(VolpipeError::BufferMismatch { expected: 2, actual: 3 })
        ));
    }
}
