// In: src/error.rs

//! This module defines the single, unified error type for the entire volpipe library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Internally every operation returns `Result<_, VolpipeError>`. Integer status
//! codes only exist at the outer status API (see `bridge::status_api`), where
//! `VolpipeError::code()` maps each variant onto the closed `ErrorCode` set.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VolpipeError {
    // =========================================================================
    // === Pipeline & Registry Errors
    // =========================================================================
    #[error("Unknown stage '{name}' at position {position} of the pipeline")]
    UnknownStage { name: String, position: usize },

    #[error("Invalid pipeline '{pipeline}': {reason}")]
    InvalidPipeline { pipeline: String, reason: String },

    #[error("A stage named '{0}' is already registered")]
    DuplicateStage(String),

    #[error("The global stage registry has already been initialized")]
    RegistryInitialized,

    // =========================================================================
    // === Header & Buffer Errors
    // =========================================================================
    #[error("Header parse error: {0}")]
    HeaderParseError(String),

    #[error("Destination buffer too small: {required} bytes required, {available} available")]
    DestinationTooSmall { required: usize, available: usize },

    #[error("Shape arithmetic overflow: {0}")]
    ShapeOverflow(String),

    #[error("Buffer length mismatch: expected {expected} bytes, got {actual}")]
    BufferMismatch { expected: usize, actual: usize },

    #[error("Unsupported data type for this operation: {0}")]
    UnsupportedType(String),

    // =========================================================================
    // === Stage Execution Errors
    // =========================================================================
    #[error("Pipeline execution failed at stage '{stage}': {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: Box<VolpipeError>,
    },

    #[error("Zstd operation failed: {0}")]
    ZstdError(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// Surfaced only at boundaries that touch the file system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// bytemuck::PodCastError does not implement `Error`, so this is converted manually.
    #[error("Byte slice casting error: {0}")]
    PodCast(String),
}

/// The closed set of integer status codes exposed at the external interface.
/// `0` is success; everything else identifies one failure family.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Success = 0,
    DestinationTooSmall = 1,
    UnknownStage = 2,
    InvalidPipeline = 3,
    HeaderParse = 4,
    ShapeOverflow = 5,
    InvalidInput = 6,
    StageFailure = 7,
    Registry = 8,
    Io = 9,
    Internal = 10,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl VolpipeError {
    /// Maps this error onto its external status code.
    pub fn code(&self) -> ErrorCode {
        match self {
            VolpipeError::UnknownStage { .. } => ErrorCode::UnknownStage,
            VolpipeError::InvalidPipeline { .. } => ErrorCode::InvalidPipeline,
            VolpipeError::DuplicateStage(_) | VolpipeError::RegistryInitialized => {
                ErrorCode::Registry
            }
            VolpipeError::HeaderParseError(_) => ErrorCode::HeaderParse,
            VolpipeError::DestinationTooSmall { .. } => ErrorCode::DestinationTooSmall,
            VolpipeError::ShapeOverflow(_) => ErrorCode::ShapeOverflow,
            VolpipeError::BufferMismatch { .. }
            | VolpipeError::UnsupportedType(_)
            | VolpipeError::Config(_)
            | VolpipeError::SerdeJson(_)
            | VolpipeError::PodCast(_) => ErrorCode::InvalidInput,
            VolpipeError::StageFailed { .. } | VolpipeError::ZstdError(_) => {
                ErrorCode::StageFailure
            }
            VolpipeError::Io(_) => ErrorCode::Io,
            VolpipeError::InternalError(_) => ErrorCode::Internal,
        }
    }

    /// Wraps an error raised inside a stage with the stage's name.
    pub(crate) fn in_stage(stage: &str, source: VolpipeError) -> Self {
        VolpipeError::StageFailed {
            stage: stage.to_string(),
            source: Box::new(source),
        }
    }
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<bytemuck::PodCastError> for VolpipeError {
    fn from(err: bytemuck::PodCastError) -> Self {
        VolpipeError::PodCast(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_too_small_is_code_one() {
        let err = VolpipeError::DestinationTooSmall {
            required: 10,
            available: 9,
        };
        assert_eq!(err.code(), ErrorCode::DestinationTooSmall);
        assert_eq!(err.code().as_i32(), 1);
    }

    #[test]
    fn test_stage_failure_keeps_source() {
        let err = VolpipeError::in_stage("zstd", VolpipeError::ZstdError("bad frame".into()));
        assert_eq!(err.code(), ErrorCode::StageFailure);
        let msg = err.to_string();
        assert!(msg.contains("zstd"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: VolpipeError = io.into();
        assert_eq!(err.code(), ErrorCode::Io);
    }
}
