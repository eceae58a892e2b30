// In: src/config.rs

//! The single source of truth for all engine configuration.
//!
//! `EngineConfig` is created once at the application boundary (from code or a
//! JSON document) and consumed when a stage registry is built. Stages capture
//! the parameters they need at construction, so the configuration is never
//! consulted while a pipeline runs.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::VolpipeError;

/// Accepted range of Zstandard compression levels.
pub(crate) const ZSTD_LEVELS: std::ops::RangeInclusive<i32> = 1..=22;

//==================================================================================
// I. The Unified EngineConfig
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Thread budget used when a caller passes `0`.
    #[serde(default = "default_threads")]
    pub default_threads: usize,

    /// Level handed to the `zstd` stage.
    #[serde(default = "default_zstd_level")]
    pub zstd_level: i32,

    /// Extra offset subtracted on top of the estimated background by `rmbkg`.
    #[serde(default)]
    pub rmbkg_epsilon: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_threads: default_threads(),
            zstd_level: default_zstd_level(),
            rmbkg_epsilon: 0,
        }
    }
}

fn default_threads() -> usize {
    1
}

fn default_zstd_level() -> i32 {
    3
}

//==================================================================================
// II. Loading & Validation
//==================================================================================

impl EngineConfig {
    /// Parses and validates a configuration from a JSON document.
    /// Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, VolpipeError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, VolpipeError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), VolpipeError> {
        if !ZSTD_LEVELS.contains(&self.zstd_level) {
            return Err(VolpipeError::Config(format!(
                "zstd_level {} is outside {}..={}",
                self.zstd_level,
                ZSTD_LEVELS.start(),
                ZSTD_LEVELS.end()
            )));
        }
        Ok(())
    }

    /// Resolves a caller-supplied thread count, where `0` selects the default.
    pub fn resolve_threads(&self, requested: usize) -> usize {
        if requested == 0 {
            self.default_threads
        } else {
            requested
        }
    }
}
