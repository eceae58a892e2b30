//! This file is the root of the `volpipe` Rust crate.
//!
//! volpipe compresses n-dimensional numeric volumes through pipelines of
//! named, reversible stages (`"shuffle->zstd"`). Every encoded buffer carries
//! a header recording the pipeline, shape and element type, so it can be
//! decoded and inspected without side information.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of our library (`pipeline`, `kernels`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the types a host application needs.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
pub mod observability; // Make macros available throughout the crate

pub mod bridge;
pub mod config;
pub mod error;
pub mod kernels;
pub mod pipeline;
pub mod traits;
pub mod types;

mod utils;

#[doc(hidden)]
pub use log as __log;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use config::EngineConfig;
pub use error::{ErrorCode, VolpipeError};
pub use kernels::BuiltinStage;
pub use observability::enable_verbose_logging;
pub use pipeline::registry::{global, install_global, install_global_with_config};
pub use pipeline::{
    DataView, Header, Partitioning, PipelineDescriptor, Stage, StageArgs, StageRegistry, StreamTransform,
};
pub use traits::Element;
pub use types::{ElementType, Shape};
