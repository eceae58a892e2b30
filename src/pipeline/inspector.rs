// In: src/pipeline/inspector.rs

//! Read-only queries over an encoded buffer. Every function here parses the
//! header only; no stage decoder is ever run and the registry is not consulted.

use crate::bridge::format::CompressionStats;
use crate::error::VolpipeError;
use crate::pipeline::header::{self, Header};
use crate::types::ElementType;

/// Length of the header at the start of `bytes`, from the fixed prefix alone.
pub fn header_size(bytes: &[u8]) -> Result<usize, VolpipeError> {
    header::header_size(bytes)
}

pub fn decompressed_ndims(bytes: &[u8]) -> Result<usize, VolpipeError> {
    Ok(Header::parse(bytes)?.shape().ndims())
}

pub fn decompressed_shape(bytes: &[u8]) -> Result<Vec<usize>, VolpipeError> {
    Ok(Header::parse(bytes)?.shape().extents().to_vec())
}

pub fn decompressed_dtype(bytes: &[u8]) -> Result<ElementType, VolpipeError> {
    Ok(Header::parse(bytes)?.dtype())
}

/// Width of one decompressed element in bytes.
pub fn decompressed_sizeof(bytes: &[u8]) -> Result<usize, VolpipeError> {
    Ok(Header::parse(bytes)?.dtype().size_of())
}

/// Bytes needed to hold the decompressed volume.
pub fn decompressed_length(bytes: &[u8]) -> Result<usize, VolpipeError> {
    Header::parse(bytes)?.decompressed_length()
}

/// The pipeline text the buffer was encoded with.
pub fn pipeline_of(bytes: &[u8]) -> Result<String, VolpipeError> {
    Ok(Header::parse(bytes)?.pipeline().to_string())
}

/// Aggregate statistics for an encoded buffer.
pub fn analyze(bytes: &[u8]) -> Result<CompressionStats, VolpipeError> {
    let header = Header::parse(bytes)?;
    let header_size = header.encoded_len()?;

    Ok(CompressionStats {
        header_size,
        data_size: bytes.len() - header_size,
        total_size: bytes.len(),
        pipeline: header.pipeline().to_string(),
        dtype: header.dtype(),
        shape: header.shape().extents().to_vec(),
        decompressed_length: header.decompressed_length()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Shape;

    fn encoded_stub() -> Vec<u8> {
        let mut bytes = Header::new("xor_delta->zstd", Shape::new(&[3, 5]).unwrap(), ElementType::Int32)
            .to_bytes()
            .unwrap();
        bytes.extend_from_slice(&[0u8; 10]);
        bytes
    }

    #[test]
    fn test_queries_read_the_header() {
        let bytes = encoded_stub();
        assert_eq!(decompressed_ndims(&bytes).unwrap(), 2);
        assert_eq!(decompressed_shape(&bytes).unwrap(), vec![3, 5]);
        assert_eq!(decompressed_dtype(&bytes).unwrap(), ElementType::Int32);
        assert_eq!(decompressed_sizeof(&bytes).unwrap(), 4);
        assert_eq!(decompressed_length(&bytes).unwrap(), 60);
        assert_eq!(pipeline_of(&bytes).unwrap(), "xor_delta->zstd");
        assert_eq!(header_size(&bytes).unwrap(), bytes.len() - 10);
    }

    #[test]
    fn test_analyze_splits_header_and_payload() {
        let bytes = encoded_stub();
        let stats = analyze(&bytes).unwrap();
        assert_eq!(stats.total_size, bytes.len());
        assert_eq!(stats.header_size + stats.data_size, stats.total_size);
        assert_eq!(stats.data_size, 10);
        assert_eq!(stats.pipeline, "xor_delta->zstd");
        assert_eq!(stats.shape, vec![3, 5]);
        assert!(stats.ratio() > 0.0);
    }

    #[test]
    fn test_garbage_is_header_error() {
        let garbage = vec![0u8; 64];
        assert!(matches!(analyze(&garbage), Err(VolpipeError::HeaderParseError(_))));
        assert!(matches!(decompressed_length(&[]), Err(VolpipeError::HeaderParseError(_))));
    }
}
