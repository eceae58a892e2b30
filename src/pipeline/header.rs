// In: src/pipeline/header.rs

//! The self-describing header written at the start of every encoded buffer.
//!
//! Layout (little-endian, see `bridge::format` for the constants):
//!
//! ```text
//! [ magic: 4 ][ version: u16 ][ header_len: u32 ][ dtype tag: u8 ][ ndims: u8 ]
//! [ extent: u64 ] * ndims
//! [ pipeline text: UTF-8, up to header_len ]
//! ```
//!
//! The pipeline text is the caller's exact string. The payload produced by the
//! last stage starts immediately after `header_len` bytes.

use std::io::{Cursor, Read, Write};

use crate::bridge::format::{EXTENT_WIDTH, FIXED_HEADER_LEN, FORMAT_VERSION, MAGIC, MAX_NDIMS};
use crate::error::VolpipeError;
use crate::pipeline::stage::DataView;
use crate::types::{ElementType, Shape};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pipeline: String,
    shape: Shape,
    dtype: ElementType,
}

//==================================================================================
// 1. Construction & Serialization
//==================================================================================

impl Header {
    pub fn new(pipeline: impl Into<String>, shape: Shape, dtype: ElementType) -> Self {
        Self {
            pipeline: pipeline.into(),
            shape,
            dtype,
        }
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    /// The layout of the decompressed volume.
    pub fn view(&self) -> DataView {
        DataView::new(self.shape.clone(), self.dtype)
    }

    /// `product(shape) * size_of(dtype)`.
    pub fn decompressed_length(&self) -> Result<usize, VolpipeError> {
        self.shape.num_bytes(self.dtype)
    }

    /// The number of bytes `write_to` produces.
    pub fn encoded_len(&self) -> Result<usize, VolpipeError> {
        header_len_for(self.pipeline.len(), self.shape.ndims())
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), VolpipeError> {
        let header_len = self.encoded_len()?;
        let header_len_u32 = u32::try_from(header_len).map_err(|_| VolpipeError::InvalidPipeline {
            pipeline: self.pipeline.clone(),
            reason: format!("header of {} bytes does not fit the length field", header_len),
        })?;
        let map_err = |e: std::io::Error| VolpipeError::InternalError(e.to_string());

        out.reserve(header_len);
        out.write_all(MAGIC).map_err(map_err)?;
        out.write_all(&FORMAT_VERSION.to_le_bytes()).map_err(map_err)?;
        out.write_all(&header_len_u32.to_le_bytes()).map_err(map_err)?;
        out.write_all(&[self.dtype.tag(), self.shape.ndims() as u8]).map_err(map_err)?;
        for &extent in self.shape.extents() {
            out.write_all(&(extent as u64).to_le_bytes()).map_err(map_err)?;
        }
        out.write_all(self.pipeline.as_bytes()).map_err(map_err)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, VolpipeError> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }
}

/// Total header length for a pipeline text of `pipeline_len` bytes and `ndims` extents.
pub fn header_len_for(pipeline_len: usize, ndims: usize) -> Result<usize, VolpipeError> {
    ndims
        .checked_mul(EXTENT_WIDTH)
        .and_then(|n| n.checked_add(FIXED_HEADER_LEN))
        .and_then(|n| n.checked_add(pipeline_len))
        .ok_or_else(|| VolpipeError::ShapeOverflow("header length overflows usize".into()))
}

/// Upper bound on the header for a pipeline text of `pipeline_len` bytes and
/// any shape the header can describe.
pub fn header_bound(pipeline_len: usize) -> Result<usize, VolpipeError> {
    header_len_for(pipeline_len, MAX_NDIMS)
}

//==================================================================================
// 2. Parsing
//==================================================================================

/// The fixed prefix: everything up to the shape extents.
struct Prefix {
    header_len: usize,
    dtype_tag: u8,
    ndims: usize,
}

fn parse_err(msg: impl Into<String>) -> VolpipeError {
    VolpipeError::HeaderParseError(msg.into())
}

fn read_prefix(bytes: &[u8]) -> Result<Prefix, VolpipeError> {
    if bytes.len() < FIXED_HEADER_LEN {
        return Err(parse_err(format!(
            "Buffer of {} bytes is shorter than the {}-byte fixed header",
            bytes.len(),
            FIXED_HEADER_LEN
        )));
    }

    let mut cursor = Cursor::new(bytes);
    let map_err = |e: std::io::Error| parse_err(e.to_string());

    let mut magic_buf = [0u8; 4];
    cursor.read_exact(&mut magic_buf).map_err(map_err)?;
    if magic_buf != *MAGIC {
        return Err(parse_err("Invalid magic number"));
    }

    let mut u16_buf = [0u8; 2];
    cursor.read_exact(&mut u16_buf).map_err(map_err)?;
    let version = u16::from_le_bytes(u16_buf);
    if version != FORMAT_VERSION {
        return Err(parse_err(format!(
            "Unsupported format version: expected {}, got {}",
            FORMAT_VERSION, version
        )));
    }

    let mut u32_buf = [0u8; 4];
    cursor.read_exact(&mut u32_buf).map_err(map_err)?;
    let header_len = u32::from_le_bytes(u32_buf) as usize;

    let mut tail = [0u8; 2];
    cursor.read_exact(&mut tail).map_err(map_err)?;

    Ok(Prefix {
        header_len,
        dtype_tag: tail[0],
        ndims: tail[1] as usize,
    })
}

/// Reads only the fixed prefix and returns the declared header length.
pub fn header_size(bytes: &[u8]) -> Result<usize, VolpipeError> {
    let prefix = read_prefix(bytes)?;
    if prefix.header_len < FIXED_HEADER_LEN {
        return Err(parse_err(format!(
            "Declared header length {} is smaller than the fixed header",
            prefix.header_len
        )));
    }
    Ok(prefix.header_len)
}

impl Header {
    /// Parses and validates the header at the start of `bytes`. Trailing
    /// payload bytes are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, VolpipeError> {
        let prefix = read_prefix(bytes)?;

        // SECURITY: validate the declared length before slicing anything.
        if prefix.header_len > bytes.len() {
            return Err(parse_err(format!(
                "Declared header length {} exceeds buffer of {} bytes",
                prefix.header_len,
                bytes.len()
            )));
        }
        if prefix.header_len < FIXED_HEADER_LEN {
            return Err(parse_err(format!(
                "Declared header length {} is smaller than the fixed header",
                prefix.header_len
            )));
        }
        if prefix.ndims == 0 || prefix.ndims > MAX_NDIMS {
            return Err(parse_err(format!(
                "Dimensionality {} is outside 1..={}",
                prefix.ndims, MAX_NDIMS
            )));
        }
        let extents_end = FIXED_HEADER_LEN + prefix.ndims * EXTENT_WIDTH;
        if extents_end > prefix.header_len {
            return Err(parse_err(format!(
                "Header of {} bytes cannot hold {} shape extents",
                prefix.header_len, prefix.ndims
            )));
        }

        let dtype = ElementType::from_tag(prefix.dtype_tag)?;

        let mut cursor = Cursor::new(&bytes[FIXED_HEADER_LEN..extents_end]);
        let map_err = |e: std::io::Error| parse_err(e.to_string());
        let mut extents = Vec::with_capacity(prefix.ndims);
        let mut u64_buf = [0u8; 8];
        for axis in 0..prefix.ndims {
            cursor.read_exact(&mut u64_buf).map_err(map_err)?;
            let extent = u64::from_le_bytes(u64_buf);
            if extent == 0 {
                return Err(parse_err(format!("Shape extent at axis {} is zero", axis)));
            }
            let extent = usize::try_from(extent)
                .map_err(|_| parse_err(format!("Shape extent {} overflows usize", extent)))?;
            extents.push(extent);
        }
        let shape = Shape::new(&extents)?;

        let pipeline_bytes = &bytes[extents_end..prefix.header_len];
        if pipeline_bytes.is_empty() {
            return Err(parse_err("Pipeline description is empty"));
        }
        let pipeline = std::str::from_utf8(pipeline_bytes)
            .map_err(|e| parse_err(format!("Pipeline description is not UTF-8: {}", e)))?
            .to_string();

        Ok(Self {
            pipeline,
            shape,
            dtype,
        })
    }
}
