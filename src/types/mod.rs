//! This module defines the core, strongly-typed data representations used
//! throughout the volpipe engine.
//!
//! It includes the canonical `ElementType` enum, which is the type tag carried
//! in every header, and the validated `Shape` of an n-dimensional volume.

pub mod element_type;
pub mod shape;

// Re-export the main type(s) for easier access.
pub use element_type::ElementType;
pub use shape::Shape;
