//! This module contains the kernel for the lossy background-removal stage.
//!
//! Microscopy volumes are dominated by a flat camera offset. The kernel
//! estimates that offset as the most frequent value (ties resolve to the
//! smaller value), adds a configurable epsilon, and subtracts the result from
//! every element with clipping at zero. The output keeps the input's byte
//! length, shape and element type, so it can be followed by any other stage.
//!
//! The subtraction is not reversible. Decoding is the identity, which means a
//! round trip reproduces the shape and length of the volume but not its values.
//! Only unsigned integer element types are supported.

use num_traits::{NumCast, PrimInt, Unsigned};
use std::collections::HashMap;
use std::hash::Hash;

use crate::error::VolpipeError;
use crate::types::ElementType;
use crate::utils::{bytes_to_typed_vec, typed_slice_to_bytes};

//==================================================================================
// 1. Generic Core Logic (The "Engine")
//==================================================================================

/// The most frequent value of `values`, or `None` if it is empty.
fn mode_of<T>(values: &[T]) -> Option<T>
where
    T: PrimInt + Hash,
{
    let mut counts: HashMap<T, usize> = HashMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.cmp(va)))
        .map(|(v, _)| v)
}

/// Subtracts `mode + epsilon` from every element in place, clipping at zero.
fn remove_background_inplace<T>(values: &mut [T], epsilon: u64)
where
    T: PrimInt + Unsigned + Hash,
{
    let Some(mode) = mode_of(values) else {
        return;
    };
    let epsilon: T = <T as NumCast>::from(epsilon).unwrap_or_else(T::max_value);
    let threshold = mode.saturating_add(epsilon);
    for v in values.iter_mut() {
        *v = v.saturating_sub(threshold);
    }
}

fn encode_typed<T>(input_bytes: &[u8], epsilon: u64) -> Result<Vec<u8>, VolpipeError>
where
    T: PrimInt + Unsigned + Hash + bytemuck::Pod,
{
    let mut values: Vec<T> = bytes_to_typed_vec(input_bytes)?;
    remove_background_inplace(&mut values, epsilon);
    Ok(typed_slice_to_bytes(&values))
}

//==================================================================================
// 2. Public API (Dispatch on the element type)
//==================================================================================

/// The public-facing encode function for this module.
pub fn encode(
    input_bytes: &[u8],
    dtype: ElementType,
    epsilon: u64,
    output_buf: &mut Vec<u8>,
) -> Result<(), VolpipeError> {
    let encoded = match dtype {
        ElementType::UInt8 => encode_typed::<u8>(input_bytes, epsilon)?,
        ElementType::UInt16 => encode_typed::<u16>(input_bytes, epsilon)?,
        ElementType::UInt32 => encode_typed::<u32>(input_bytes, epsilon)?,
        ElementType::UInt64 => encode_typed::<u64>(input_bytes, epsilon)?,
        other => {
            return Err(VolpipeError::UnsupportedType(format!(
                "Background removal requires an unsigned integer type, got {}",
                other
            )))
        }
    };
    *output_buf = encoded;
    Ok(())
}

/// The public-facing decode function for this module. The removed offset is
/// not recoverable, so this only copies.
pub fn decode(input_bytes: &[u8], output_buf: &mut Vec<u8>) -> Result<(), VolpipeError> {
    output_buf.clear();
    output_buf.extend_from_slice(input_bytes);
    Ok(())
}
