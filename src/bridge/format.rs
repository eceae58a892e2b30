// In: src/bridge/format.rs

//! Defines all on-wire constants and public result structures for the volpipe
//! encoded-buffer format. This is the single source of truth for the header
//! layout; `pipeline::header` is the only code that reads or writes it.

use serde::{Deserialize, Serialize};

use crate::types::ElementType;

//==================================================================================
// I. Header Layout
//==================================================================================

/// The magic number that opens every encoded buffer.
pub const MAGIC: &[u8; 4] = b"VPIP";
/// The current version of the header format.
pub const FORMAT_VERSION: u16 = 1;

/// Bytes occupied by magic (4), version (2), header length (4), element tag (1)
/// and dimensionality (1). Shape extents follow immediately.
pub const FIXED_HEADER_LEN: usize = 12;
/// Width of one encoded shape extent.
pub const EXTENT_WIDTH: usize = 8;
/// The largest dimensionality a header can describe.
pub const MAX_NDIMS: usize = 8;

/// Separates stage identifiers in a pipeline description.
pub const PIPELINE_DELIMITER: &str = "->";
/// The pipeline used when a caller has no preference.
pub const DEFAULT_PIPELINE: &str = "shuffle->zstd";

//==================================================================================
// II. Public Result Structures
//==================================================================================

/// The public-facing struct for compression analysis results, returned by `analyze`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompressionStats {
    pub header_size: usize,
    pub data_size: usize,
    pub total_size: usize,
    pub pipeline: String,
    pub dtype: ElementType,
    pub shape: Vec<usize>,
    pub decompressed_length: usize,
}

impl CompressionStats {
    /// Decompressed bytes per encoded byte. `0.0` for an empty buffer.
    pub fn ratio(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        self.decompressed_length as f64 / self.total_size as f64
    }
}
