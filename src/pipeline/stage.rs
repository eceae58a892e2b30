// In: src/pipeline/stage.rs

//! Defines the behavioral contract every pipeline stage implements.
//!
//! A stage is a named, reversible byte transform. Besides the transform itself
//! it declares what it does to the stream's layout (`StreamTransform`) and
//! whether the executor may split its input along the outermost axis
//! (`Partitioning`). The executor is driven entirely by these declarations and
//! never inspects which concrete stage it is running.

use std::fmt;
use std::sync::Arc;

use crate::error::VolpipeError;
use crate::pipeline::args::StageArgs;
use crate::types::{ElementType, Shape};

//==================================================================================
// 1. Layout Descriptions
//==================================================================================

/// The typed layout a stage sees: the logical shape and element type of its
/// input bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataView {
    pub shape: Shape,
    pub dtype: ElementType,
}

impl DataView {
    pub fn new(shape: Shape, dtype: ElementType) -> Self {
        Self { shape, dtype }
    }

    /// An untyped, one-dimensional view of `len` bytes. This is the view every
    /// stage after a `ToBytes` stage receives.
    pub fn bytes(len: usize) -> Result<Self, VolpipeError> {
        let shape = Shape::linear(len).map_err(|_| {
            VolpipeError::InternalError("A byte view must cover at least one byte".into())
        })?;
        Ok(Self {
            shape,
            dtype: ElementType::UInt8,
        })
    }

    pub fn num_bytes(&self) -> Result<usize, VolpipeError> {
        self.shape.num_bytes(self.dtype)
    }

    /// The view of one slab along the outermost axis, if there is more than one axis.
    pub fn slab(&self) -> Option<DataView> {
        self.shape.slab().map(|shape| DataView {
            shape,
            dtype: self.dtype,
        })
    }
}

/// Describes the effect a stage has on the layout of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTransform {
    /// Output has exactly the input's byte length, shape and element type.
    /// Example: shuffle, xor_delta.
    PreserveLayout,
    /// Output is an opaque byte stream of arbitrary length.
    /// Example: zstd.
    ToBytes,
}

/// Whether the executor may run a stage independently on outer-axis slabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partitioning {
    /// The stage must see the whole buffer at once.
    Whole,
    /// Encoding each outermost slab on its own and concatenating the results is
    /// a valid encoding, and decoding the same way is its inverse. Only honored
    /// for `PreserveLayout` stages on views with at least two dimensions.
    OuterAxis,
}

//==================================================================================
// 2. The Stage Trait
//==================================================================================

/// A single step of a pipeline.
///
/// Implementations must be deterministic: the same input and view always
/// produce the same bytes. `decode(encode(x))` must reproduce `x` for lossless
/// stages and must reproduce its byte length for lossy ones.
pub trait Stage: Send + Sync + fmt::Debug {
    /// Identifier used in logs and error messages.
    fn name(&self) -> &str;

    fn transform(&self) -> StreamTransform;

    fn partitioning(&self) -> Partitioning {
        Partitioning::Whole
    }

    /// `true` if decoding does not restore the exact input.
    fn is_lossy(&self) -> bool {
        false
    }

    /// Upper bound on the bytes `encode` can produce for `input_size` bytes
    /// laid out as `view`. Must not depend on the input's content.
    fn max_encoded_size(&self, input_size: usize, view: &DataView) -> Result<usize, VolpipeError>;

    fn encode(&self, input: &[u8], view: &DataView) -> Result<Vec<u8>, VolpipeError>;

    /// Inverts `encode`. `target` is the layout `encode` saw, or `None` when
    /// it is not recoverable from the header (a `ToBytes` stage following
    /// another `ToBytes` stage). Such stages must be self-delimiting.
    ///
    /// `max_len` is the most bytes a valid encoding can decode to. A decoder
    /// must fail instead of producing, or allocating for, more than that.
    fn decode(&self, input: &[u8], target: Option<&DataView>, max_len: usize) -> Result<Vec<u8>, VolpipeError>;

    /// Whether `args` would be accepted by `configure`. Must not allocate on
    /// success.
    fn accepts_args(&self, args: &StageArgs<'_>) -> bool {
        args.is_empty()
    }

    /// A copy of this stage with `args` applied. Only called with a non-empty
    /// argument list; stages without parameters reject every argument.
    fn configure(&self, args: &StageArgs<'_>) -> Result<Arc<dyn Stage>, VolpipeError> {
        Err(VolpipeError::InvalidPipeline {
            pipeline: format!("{}({})", self.name(), args.text()),
            reason: format!("stage '{}' takes no arguments", self.name()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_view() {
        let view = DataView::bytes(17).unwrap();
        assert_eq!(view.dtype, ElementType::UInt8);
        assert_eq!(view.num_bytes().unwrap(), 17);
        assert!(view.slab().is_none());
        assert!(DataView::bytes(0).is_err());
    }

    #[test]
    fn test_slab_view_keeps_dtype() {
        let view = DataView::new(Shape::new(&[2, 3, 4]).unwrap(), ElementType::Float32);
        let slab = view.slab().unwrap();
        assert_eq!(slab.dtype, ElementType::Float32);
        assert_eq!(slab.num_bytes().unwrap(), 48);
    }
}
