//! This module serves as the public API for the pipeline engine.
//!
//! It resolves pipeline descriptions against a stage registry and composes
//! the registered stages into encode and decode passes. It defines the
//! highest-level workflows within the pure Rust core; the `bridge` layer only
//! adds the global registry and the outer calling conventions.

//==================================================================================
// 1. Module Declarations
//==================================================================================

/// The stage contract and the layout types it is expressed in.
pub mod stage;

/// Identifier-to-stage mapping, local or process-wide.
pub mod registry;

/// Per-segment `id(key=value,...)` arguments.
pub mod args;

/// Parses `"a->b->c"` into resolved stages.
pub mod descriptor;

/// The self-describing header at the front of every encoded buffer.
pub mod header;

/// Content-independent worst-case sizes.
pub mod estimator;

/// The "Foreman": runs stages over caller buffers.
pub mod executor;

/// Header-only queries.
pub mod inspector;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================

pub use self::args::StageArgs;
pub use self::descriptor::{pipeline_possible, PipelineDescriptor};
pub use self::executor::{
    decode, decode_into, encode, encode_into, max_compressed_length, max_compressed_length_nd,
    ExecutionContext,
};
pub use self::header::Header;
pub use self::registry::StageRegistry;
pub use self::stage::{DataView, Partitioning, Stage, StreamTransform};

#[cfg(test)]
mod executor_tests;
