// In: src/pipeline/descriptor.rs

//! Parsing and resolution of pipeline descriptions such as
//! `"shuffle->zstd"` or `"rmbkg(epsilon=5)->zstd(level=9)"`.
//!
//! A `PipelineDescriptor` keeps the caller's exact text (it is written into the
//! header byte-for-byte) together with the resolved stages, in encode order.

use std::fmt;
use std::sync::Arc;

use crate::bridge::format::PIPELINE_DELIMITER;
use crate::error::VolpipeError;
use crate::pipeline::args::{split_segment, StageArgs};
use crate::pipeline::registry::StageRegistry;
use crate::pipeline::stage::Stage;

/// One resolved step of a pipeline.
#[derive(Debug, Clone)]
pub struct ResolvedStage {
    pub id: String,
    /// The argument text between the parentheses, empty if none were given.
    pub args: String,
    pub stage: Arc<dyn Stage>,
}

impl ResolvedStage {
    pub fn args(&self) -> StageArgs<'_> {
        StageArgs::new(&self.args)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineDescriptor {
    text: String,
    stages: Vec<ResolvedStage>,
}

impl PipelineDescriptor {
    /// Splits `text` on the delimiter and resolves every segment against
    /// `registry`.
    ///
    /// # Errors
    /// * `InvalidPipeline` for an empty text, an empty or malformed segment,
    ///   or arguments the stage rejects.
    /// * `UnknownStage` for the first segment that is not registered, with its
    ///   zero-based position.
    pub fn parse(text: &str, registry: &StageRegistry) -> Result<Self, VolpipeError> {
        if text.is_empty() {
            return Err(VolpipeError::InvalidPipeline {
                pipeline: text.to_string(),
                reason: "pipeline is empty".into(),
            });
        }

        let invalid = |position: usize, reason: &str| VolpipeError::InvalidPipeline {
            pipeline: text.to_string(),
            reason: format!("segment {}: {}", position, reason),
        };

        let mut stages = Vec::new();
        for (position, segment) in text.split(PIPELINE_DELIMITER).enumerate() {
            if segment.is_empty() {
                return Err(invalid(position, "segment is empty"));
            }
            let (id, args) = split_segment(segment).map_err(|reason| invalid(position, reason))?;
            let registered = registry.lookup(id).map_err(|_| VolpipeError::UnknownStage {
                name: id.to_string(),
                position,
            })?;
            let stage = if args.is_empty() {
                registered
            } else {
                registered.configure(&args).map_err(|e| match e {
                    VolpipeError::InvalidPipeline { reason, .. } => invalid(position, &reason),
                    other => other,
                })?
            };
            stages.push(ResolvedStage {
                id: id.to_string(),
                args: args.text().to_string(),
                stage,
            });
        }

        Ok(Self {
            text: text.to_string(),
            stages,
        })
    }

    /// The caller's text, unchanged.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn stages(&self) -> &[ResolvedStage] {
        &self.stages
    }

    pub fn stage_ids(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// `true` if any stage discards information.
    pub fn is_lossy(&self) -> bool {
        self.stages.iter().any(|s| s.stage.is_lossy())
    }
}

/// Two descriptors are equal when they name the same stages, with the same
/// arguments, in the same order.
impl PartialEq for PipelineDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.stages.len() == other.stages.len()
            && self
                .stages
                .iter()
                .zip(&other.stages)
                .all(|(a, b)| a.id == b.id && a.args == b.args)
    }
}

impl Eq for PipelineDescriptor {}

impl fmt::Display for PipelineDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Whether `text` resolves against `registry`. Follows the same segment rules
/// as `PipelineDescriptor::parse` but builds nothing, so it never allocates
/// and never executes a stage.
pub fn pipeline_possible(text: &str, registry: &StageRegistry) -> bool {
    !text.is_empty()
        && text.split(PIPELINE_DELIMITER).all(|segment| {
            !segment.is_empty()
                && match split_segment(segment) {
                    Ok((id, args)) => registry.get(id).is_some_and(|stage| stage.accepts_args(&args)),
                    Err(_) => false,
                }
        })
}
