//! This module serves as the public API and dispatcher for the collection of all
//! pure, stateless compression and decompression kernels.
//!
//! It declares all kernel sub-modules and the closed `BuiltinStage` enum. Each
//! variant is one built-in stage; its `Stage` implementation dispatches into
//! the matching kernel. The executor only ever sees `dyn Stage`, so built-ins
//! and stages registered by the host application are driven identically.

use std::sync::Arc;

use crate::config::{EngineConfig, ZSTD_LEVELS};
use crate::error::VolpipeError;
use crate::pipeline::args::StageArgs;
use crate::pipeline::stage::{DataView, Partitioning, Stage, StreamTransform};

//==================================================================================
// 1. Module Declarations
//==================================================================================

/// Value reduction
pub mod background;
pub mod xor_delta;

/// Byte distribution
pub mod shuffle;

/// Final stage: entropy coding
pub mod zstd;

//==================================================================================
// 2. The Built-in Stage Set
//==================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltinStage {
    PassThrough,
    Shuffle,
    XorDelta,
    RemoveBackground { epsilon: u64 },
    Zstd { level: i32 },
}

impl BuiltinStage {
    pub const PASS_THROUGH: &'static str = "pass_through";
    pub const SHUFFLE: &'static str = "shuffle";
    pub const XOR_DELTA: &'static str = "xor_delta";
    pub const REMOVE_BACKGROUND: &'static str = "rmbkg";
    pub const ZSTD: &'static str = "zstd";

    /// Every built-in stage, parameterized from `config`.
    pub fn all(config: &EngineConfig) -> Vec<BuiltinStage> {
        vec![
            BuiltinStage::PassThrough,
            BuiltinStage::Shuffle,
            BuiltinStage::XorDelta,
            BuiltinStage::RemoveBackground {
                epsilon: config.rmbkg_epsilon,
            },
            BuiltinStage::Zstd {
                level: config.zstd_level,
            },
        ]
    }

    pub fn id(&self) -> &'static str {
        match self {
            BuiltinStage::PassThrough => Self::PASS_THROUGH,
            BuiltinStage::Shuffle => Self::SHUFFLE,
            BuiltinStage::XorDelta => Self::XOR_DELTA,
            BuiltinStage::RemoveBackground { .. } => Self::REMOVE_BACKGROUND,
            BuiltinStage::Zstd { .. } => Self::ZSTD,
        }
    }

    /// A copy with `args` applied. On failure returns the offending key.
    ///
    /// `rmbkg` takes `epsilon=<u64>`, `zstd` takes `level=<1..=22>`. The other
    /// built-ins take no arguments.
    fn with_args<'a>(&self, args: &StageArgs<'a>) -> Result<BuiltinStage, &'a str> {
        let mut stage = self.clone();
        for (key, value) in args.pairs() {
            match (&mut stage, key) {
                (BuiltinStage::RemoveBackground { epsilon }, "epsilon") => {
                    *epsilon = value.parse().map_err(|_| key)?;
                }
                (BuiltinStage::Zstd { level }, "level") => {
                    let parsed: i32 = value.parse().map_err(|_| key)?;
                    if !ZSTD_LEVELS.contains(&parsed) {
                        return Err(key);
                    }
                    *level = parsed;
                }
                _ => return Err(key),
            }
        }
        Ok(stage)
    }
}

//==================================================================================
// 3. Stage Implementation (Unified Dispatch)
//==================================================================================

impl Stage for BuiltinStage {
    fn name(&self) -> &str {
        self.id()
    }

    fn transform(&self) -> StreamTransform {
        match self {
            BuiltinStage::Zstd { .. } => StreamTransform::ToBytes,
            _ => StreamTransform::PreserveLayout,
        }
    }

    fn partitioning(&self) -> Partitioning {
        match self {
            BuiltinStage::PassThrough | BuiltinStage::Shuffle | BuiltinStage::XorDelta => {
                Partitioning::OuterAxis
            }
            // The background estimate must be global to the volume.
            BuiltinStage::RemoveBackground { .. } | BuiltinStage::Zstd { .. } => Partitioning::Whole,
        }
    }

    fn is_lossy(&self) -> bool {
        matches!(self, BuiltinStage::RemoveBackground { .. })
    }

    fn max_encoded_size(&self, input_size: usize, _view: &DataView) -> Result<usize, VolpipeError> {
        match self {
            BuiltinStage::Zstd { .. } => zstd::max_encoded_size(input_size),
            _ => Ok(input_size),
        }
    }

    fn encode(&self, input: &[u8], view: &DataView) -> Result<Vec<u8>, VolpipeError> {
        let mut output_buf = Vec::with_capacity(input.len());
        let element_size = view.dtype.size_of();
        match self {
            BuiltinStage::PassThrough => output_buf.extend_from_slice(input),
            BuiltinStage::Shuffle => shuffle::encode(input, element_size, &mut output_buf)?,
            BuiltinStage::XorDelta => xor_delta::encode(input, element_size, &mut output_buf)?,
            BuiltinStage::RemoveBackground { epsilon } => {
                background::encode(input, view.dtype, *epsilon, &mut output_buf)?
            }
            BuiltinStage::Zstd { level } => zstd::encode(input, &mut output_buf, *level)?,
        }
        Ok(output_buf)
    }

    fn decode(&self, input: &[u8], target: Option<&DataView>, max_len: usize) -> Result<Vec<u8>, VolpipeError> {
        let mut output_buf = Vec::with_capacity(input.len().min(max_len));
        match self {
            BuiltinStage::PassThrough => output_buf.extend_from_slice(input),
            BuiltinStage::Shuffle => {
                shuffle::decode(input, required_view(self, target)?.dtype.size_of(), &mut output_buf)?
            }
            BuiltinStage::XorDelta => {
                xor_delta::decode(input, required_view(self, target)?.dtype.size_of(), &mut output_buf)?
            }
            BuiltinStage::RemoveBackground { .. } => background::decode(input, &mut output_buf)?,
            BuiltinStage::Zstd { .. } => {
                let expected = target.map(|view| view.num_bytes()).transpose()?;
                zstd::decode(input, expected, max_len, &mut output_buf)?
            }
        }
        Ok(output_buf)
    }

    fn accepts_args(&self, args: &StageArgs<'_>) -> bool {
        self.with_args(args).is_ok()
    }

    fn configure(&self, args: &StageArgs<'_>) -> Result<Arc<dyn Stage>, VolpipeError> {
        let stage = self.with_args(args).map_err(|key| VolpipeError::InvalidPipeline {
            pipeline: format!("{}({})", self.id(), args.text()),
            reason: format!("stage '{}' does not accept argument '{}'", self.id(), key),
        })?;
        Ok(Arc::new(stage))
    }
}

/// Layout-preserving stages always receive a target view from the executor.
fn required_view<'a>(
    stage: &BuiltinStage,
    target: Option<&'a DataView>,
) -> Result<&'a DataView, VolpipeError> {
    target.ok_or_else(|| {
        VolpipeError::InternalError(format!("Stage '{}' was decoded without a target layout", stage.id()))
    })
}
