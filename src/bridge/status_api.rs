// In: src/bridge/status_api.rs

//! Status-code entry points for hosts that cannot consume `Result`.
//!
//! Each function returns `0` on success or the `ErrorCode` of the failure,
//! and reports its results through out-parameters. Out-parameters are only
//! written on success. All functions operate on the global stage registry.

use crate::bridge::stateless_api;
use crate::error::{ErrorCode, VolpipeError};
use crate::types::ElementType;

/// Writes the success value through `on_ok`, or logs and maps the error.
fn status<T>(result: Result<T, VolpipeError>, on_ok: impl FnOnce(T)) -> i32 {
    match result {
        Ok(value) => {
            on_ok(value);
            ErrorCode::Success.as_i32()
        }
        Err(e) => {
            log::debug!("status api call failed: {}", e);
            e.code().as_i32()
        }
    }
}

//==================================================================================
// 1. Header Inspection
//==================================================================================

pub fn header_size(src: &[u8], header_len: &mut usize) -> i32 {
    status(stateless_api::header_size(src), |n| *header_len = n)
}

pub fn decompressed_ndims(src: &[u8], ndims: &mut usize) -> i32 {
    status(stateless_api::decompressed_ndims(src), |n| *ndims = n)
}

/// Writes the decoded extents into the front of `shape`, which must have room
/// for every dimension.
pub fn decompressed_shape(src: &[u8], shape: &mut [usize]) -> i32 {
    let result = stateless_api::decompressed_shape(src).and_then(|extents| {
        if extents.len() > shape.len() {
            return Err(VolpipeError::DestinationTooSmall {
                required: extents.len(),
                available: shape.len(),
            });
        }
        Ok(extents)
    });
    status(result, |extents| shape[..extents.len()].copy_from_slice(&extents))
}

pub fn decompressed_sizeof(src: &[u8], sizeof: &mut usize) -> i32 {
    status(stateless_api::decompressed_sizeof(src), |n| *sizeof = n)
}

pub fn decompressed_length(src: &[u8], length: &mut usize) -> i32 {
    status(stateless_api::decompressed_length(src), |n| *length = n)
}

//==================================================================================
// 2. Pipeline Queries
//==================================================================================

/// Never fails; an unresolvable pipeline is simply `false`.
pub fn pipeline_possible(pipeline: &str) -> bool {
    stateless_api::pipeline_possible(pipeline)
}

/// `length` holds the input size on entry and the bound on success.
pub fn pipeline_max_compressed_length(pipeline: &str, dtype: ElementType, length: &mut usize) -> i32 {
    status(
        stateless_api::max_compressed_length(pipeline, *length, dtype),
        |n| *length = n,
    )
}

pub fn pipeline_max_compressed_length_nd(
    pipeline: &str,
    shape: &[usize],
    dtype: ElementType,
    length: &mut usize,
) -> i32 {
    status(
        stateless_api::max_compressed_length_nd(pipeline, shape, dtype),
        |n| *length = n,
    )
}

//==================================================================================
// 3. Encode & Decode
//==================================================================================

/// `dst_len` is read as the usable capacity of `dst` and overwritten with the
/// encoded length on success only.
pub fn pipeline_encode(
    pipeline: &str,
    src: &[u8],
    shape: &[usize],
    dtype: ElementType,
    dst: &mut [u8],
    dst_len: &mut usize,
    nthreads: usize,
) -> i32 {
    let capacity = (*dst_len).min(dst.len());
    status(
        stateless_api::encode_into(pipeline, src, shape, dtype, &mut dst[..capacity], nthreads),
        |n| *dst_len = n,
    )
}

/// Decodes `src` into `dst`, which must hold at least the decompressed length.
pub fn pipeline_decode(src: &[u8], dst: &mut [u8], nthreads: usize) -> i32 {
    status(stateless_api::decode_into(src, dst, nthreads), |_| ())
}

pub fn version_triple(version: &mut [i32; 3]) -> i32 {
    *version = stateless_api::version_triple();
    ErrorCode::Success.as_i32()
}
