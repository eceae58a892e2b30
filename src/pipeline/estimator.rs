// In: src/pipeline/estimator.rs

//! Worst-case encoded-size estimation.
//!
//! A bound is the header size plus a fold of every stage's `max_encoded_size`
//! over the views the stages would see during encode. Bounds depend only on
//! the pipeline, the size or shape, and the element type, never on content.

use crate::error::VolpipeError;
use crate::pipeline::descriptor::PipelineDescriptor;
use crate::pipeline::header::{header_bound, header_len_for};
use crate::pipeline::stage::{DataView, StreamTransform};
use crate::types::{ElementType, Shape};

/// Folds the stage bounds over `view`, starting from its byte length.
///
/// Entry `i` bounds the input of stage `i` (so entry `0` is the exact input
/// length) and the last entry bounds the payload. Decode uses entry `i` as the
/// most that stage `i`'s decoder may produce.
pub(crate) fn stage_bounds(descriptor: &PipelineDescriptor, view: DataView) -> Result<Vec<usize>, VolpipeError> {
    let mut size = view.num_bytes()?;
    let mut view = view;
    let mut bounds = Vec::with_capacity(descriptor.len() + 1);
    bounds.push(size);

    for resolved in descriptor.stages() {
        let bound = resolved.stage.max_encoded_size(size, &view)?;
        match resolved.stage.transform() {
            StreamTransform::PreserveLayout => {
                // A layout-preserving stage that reports growth would be
                // caught by the executor; keep the larger figure regardless.
                size = size.max(bound);
            }
            StreamTransform::ToBytes => {
                size = bound;
                view = DataView::bytes(size.max(1))?;
            }
        }
        log_metric!("event" = "estimate_stage", "stage" = &resolved.id, "bound" = &size);
        bounds.push(size);
    }
    Ok(bounds)
}

fn payload_bound(descriptor: &PipelineDescriptor, view: DataView) -> Result<usize, VolpipeError> {
    let bounds = stage_bounds(descriptor, view)?;
    bounds
        .last()
        .copied()
        .ok_or_else(|| VolpipeError::InternalError("empty bound fold".into()))
}

/// Shape-aware bound: exact header for `shape` plus the stage fold.
pub fn max_compressed_length_nd(
    descriptor: &PipelineDescriptor,
    shape: &Shape,
    dtype: ElementType,
) -> Result<usize, VolpipeError> {
    let header = header_len_for(descriptor.text().len(), shape.ndims())?;
    let payload = payload_bound(descriptor, DataView::new(shape.clone(), dtype))?;
    header
        .checked_add(payload)
        .ok_or_else(|| VolpipeError::ShapeOverflow(format!("bound for shape {} overflows usize", shape)))
}

/// Size-only bound: the input is treated as a 1D array of
/// `input_size / size_of(dtype)` elements, and the header is charged for the
/// largest dimensionality so the result covers any shape of that size.
pub fn max_compressed_length(
    descriptor: &PipelineDescriptor,
    input_size: usize,
    dtype: ElementType,
) -> Result<usize, VolpipeError> {
    let element_size = dtype.size_of();
    if input_size == 0 || input_size % element_size != 0 {
        return Err(VolpipeError::BufferMismatch {
            expected: input_size - input_size % element_size,
            actual: input_size,
        });
    }
    let shape = Shape::linear(input_size / element_size)?;
    let header = header_bound(descriptor.text().len())?;
    let payload = payload_bound(descriptor, DataView::new(shape, dtype))?;
    header.checked_add(payload).ok_or_else(|| {
        VolpipeError::ShapeOverflow(format!("bound for {} input bytes overflows usize", input_size))
    })
}
