// In: src/bridge/stateless_api.rs

//! The Result-returning public API over the process-wide stage registry.
//!
//! Every function here is a thin facade: it fetches the global registry and
//! delegates to the pure pipeline engine. Hosts that need a private registry
//! call `crate::pipeline` directly with their own `StageRegistry`.

use crate::bridge::format::CompressionStats;
use crate::error::VolpipeError;
use crate::pipeline::{self, inspector, registry};
use crate::traits::Element;
use crate::types::{ElementType, Shape};
use crate::utils::{bytes_to_typed_vec, typed_slice_to_bytes};

//==================================================================================
// 1. Version & Validation
//==================================================================================

/// The crate's semantic version as `[major, minor, patch]`.
pub fn version_triple() -> [i32; 3] {
    [
        env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
        env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
        env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
    ]
}

/// Whether `pipeline` resolves against the global registry.
pub fn pipeline_possible(pipeline: &str) -> bool {
    pipeline::pipeline_possible(pipeline, registry::global())
}

//==================================================================================
// 2. Estimation
//==================================================================================

pub fn max_compressed_length(pipeline: &str, input_size: usize, dtype: ElementType) -> Result<usize, VolpipeError> {
    pipeline::max_compressed_length(registry::global(), pipeline, input_size, dtype)
}

pub fn max_compressed_length_nd(pipeline: &str, shape: &[usize], dtype: ElementType) -> Result<usize, VolpipeError> {
    let shape = Shape::new(shape)?;
    pipeline::max_compressed_length_nd(registry::global(), pipeline, &shape, dtype)
}

//==================================================================================
// 3. Encode & Decode
//==================================================================================

/// Encodes `src` into `dst`, returning the number of bytes written.
pub fn encode_into(
    pipeline: &str,
    src: &[u8],
    shape: &[usize],
    dtype: ElementType,
    dst: &mut [u8],
    nthreads: usize,
) -> Result<usize, VolpipeError> {
    let shape = Shape::new(shape)?;
    pipeline::encode_into(registry::global(), pipeline, src, &shape, dtype, dst, nthreads)
}

/// Decodes `src` into `dst`, returning the number of bytes written.
pub fn decode_into(src: &[u8], dst: &mut [u8], nthreads: usize) -> Result<usize, VolpipeError> {
    pipeline::decode_into(registry::global(), src, dst, nthreads)
}

pub fn encode(
    pipeline: &str,
    src: &[u8],
    shape: &[usize],
    dtype: ElementType,
    nthreads: usize,
) -> Result<Vec<u8>, VolpipeError> {
    let shape = Shape::new(shape)?;
    pipeline::encode(registry::global(), pipeline, src, &shape, dtype, nthreads)
}

pub fn decode(src: &[u8], nthreads: usize) -> Result<Vec<u8>, VolpipeError> {
    pipeline::decode(registry::global(), src, nthreads).map(|(_, bytes)| bytes)
}

/// Encodes a typed slice; the element type is taken from `T`.
pub fn encode_typed<T: Element>(
    pipeline: &str,
    data: &[T],
    shape: &[usize],
    nthreads: usize,
) -> Result<Vec<u8>, VolpipeError> {
    encode(pipeline, &typed_slice_to_bytes(data), shape, T::DTYPE, nthreads)
}

/// Decodes into a typed vector, returning it with the decoded shape. Fails
/// with `UnsupportedType` if the buffer was not encoded from `T`.
pub fn decode_typed<T: Element>(src: &[u8], nthreads: usize) -> Result<(Vec<T>, Vec<usize>), VolpipeError> {
    let dtype = inspector::decompressed_dtype(src)?;
    if dtype != T::DTYPE {
        return Err(VolpipeError::UnsupportedType(format!(
            "Buffer holds {} elements, requested {}",
            dtype,
            T::DTYPE
        )));
    }
    let (header, bytes) = pipeline::decode(registry::global(), src, nthreads)?;
    Ok((bytes_to_typed_vec(&bytes)?, header.shape().extents().to_vec()))
}

//==================================================================================
// 4. Inspection
//==================================================================================

/// Analyzes an encoded buffer without running any stage.
pub fn analyze(bytes: &[u8]) -> Result<CompressionStats, VolpipeError> {
    inspector::analyze(bytes)
}

pub use crate::pipeline::inspector::{
    decompressed_dtype, decompressed_length, decompressed_ndims, decompressed_shape, decompressed_sizeof,
    header_size, pipeline_of,
};
