//! The n-dimensional extent of a volume, in row-major (C) order.

use crate::bridge::format::MAX_NDIMS;
use crate::error::VolpipeError;
use crate::types::ElementType;
use std::fmt;

/// An ordered, non-empty list of positive extents.
///
/// A `Shape` can only be built through [`Shape::new`], which guarantees that
/// it has between 1 and `MAX_NDIMS` dimensions, that no extent is zero, and
/// that the element count fits in a `usize`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    extents: Vec<usize>,
    num_elements: usize,
}

impl Shape {
    pub fn new(extents: &[usize]) -> Result<Self, VolpipeError> {
        if extents.is_empty() {
            return Err(VolpipeError::UnsupportedType(
                "Shape must have at least one dimension".into(),
            ));
        }
        if extents.len() > MAX_NDIMS {
            return Err(VolpipeError::UnsupportedType(format!(
                "Shape has {} dimensions, at most {} are supported",
                extents.len(),
                MAX_NDIMS
            )));
        }
        if let Some(axis) = extents.iter().position(|&e| e == 0) {
            return Err(VolpipeError::UnsupportedType(format!(
                "Shape extent at axis {} is zero",
                axis
            )));
        }
        let num_elements = extents.iter().try_fold(1usize, |acc, &e| acc.checked_mul(e)).ok_or_else(|| {
            VolpipeError::ShapeOverflow(format!("Element count of shape {:?} overflows usize", extents))
        })?;
        Ok(Self {
            extents: extents.to_vec(),
            num_elements,
        })
    }

    /// A one-dimensional shape of `len` elements.
    pub fn linear(len: usize) -> Result<Self, VolpipeError> {
        Self::new(&[len])
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    pub fn ndims(&self) -> usize {
        self.extents.len()
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// Total byte length of a buffer of this shape holding `dtype` elements.
    pub fn num_bytes(&self, dtype: ElementType) -> Result<usize, VolpipeError> {
        self.num_elements.checked_mul(dtype.size_of()).ok_or_else(|| {
            VolpipeError::ShapeOverflow(format!(
                "Byte length of shape {:?} with {} elements overflows usize",
                self.extents, dtype
            ))
        })
    }

    /// The shape of one slab along the outermost axis, or `None` for 1D shapes.
    pub fn slab(&self) -> Option<Shape> {
        if self.extents.len() < 2 {
            return None;
        }
        let inner = &self.extents[1..];
        Some(Shape {
            extents: inner.to_vec(),
            num_elements: self.num_elements / self.extents[0],
        })
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.extents.iter().map(|e| e.to_string()).collect();
        write!(f, "[{}]", parts.join("x"))
    }
}
