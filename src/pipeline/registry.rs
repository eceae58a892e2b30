// In: src/pipeline/registry.rs

//! The stage registry: a mapping from stage identifiers to stage implementations.
//!
//! Registries can be built locally and passed to the pipeline functions, or the
//! process-wide registry can be used. The global registry is write-once: it is
//! either installed explicitly before first use, or lazily initialized with
//! the built-in stages the first time it is read. It is never mutated after
//! that, so concurrent readers need no locking.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::config::EngineConfig;
use crate::error::VolpipeError;
use crate::kernels::BuiltinStage;
use crate::pipeline::stage::Stage;

//==================================================================================
// 1. The Registry
//==================================================================================

#[derive(Debug, Default, Clone)]
pub struct StageRegistry {
    stages: HashMap<String, Arc<dyn Stage>>,
    config: EngineConfig,
}

impl StageRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in stage, parameterized from `config`.
    pub fn with_builtins(config: &EngineConfig) -> Result<Self, VolpipeError> {
        config.validate()?;
        let mut registry = Self {
            stages: HashMap::new(),
            config: config.clone(),
        };
        for stage in BuiltinStage::all(config) {
            let id = stage.id();
            registry.register(id, Arc::new(stage))?;
        }
        Ok(registry)
    }

    /// Binds `id` to `stage`. Fails with `DuplicateStage` if `id` is taken or
    /// `InvalidPipeline` if `id` could never appear in a pipeline.
    pub fn register(&mut self, id: &str, stage: Arc<dyn Stage>) -> Result<(), VolpipeError> {
        if id.is_empty() || id.contains(crate::bridge::format::PIPELINE_DELIMITER) || id.contains(['(', ')']) {
            return Err(VolpipeError::InvalidPipeline {
                pipeline: id.to_string(),
                reason: "a stage identifier must be non-empty and free of the delimiter and parentheses".into(),
            });
        }
        if self.stages.contains_key(id) {
            return Err(VolpipeError::DuplicateStage(id.to_string()));
        }
        self.stages.insert(id.to_string(), stage);
        Ok(())
    }

    /// Registers `stage` under its own name.
    pub fn register_stage(&mut self, stage: Arc<dyn Stage>) -> Result<(), VolpipeError> {
        let id = stage.name().to_string();
        self.register(&id, stage)
    }

    /// Resolves `id`. Position `0` is reported on failure; pipeline resolution
    /// supplies the real position.
    pub fn lookup(&self, id: &str) -> Result<Arc<dyn Stage>, VolpipeError> {
        self.stages
            .get(id)
            .cloned()
            .ok_or_else(|| VolpipeError::UnknownStage {
                name: id.to_string(),
                position: 0,
            })
    }

    /// Borrowing lookup, for callers that must not allocate.
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Stage>> {
        self.stages.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.stages.contains_key(id)
    }

    /// Registered identifiers in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stages.keys().cloned().collect();
        names.sort();
        names
    }

    /// The configuration the built-in stages were parameterized from.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

//==================================================================================
// 2. The Global Registry
//==================================================================================

static GLOBAL_REGISTRY: OnceLock<StageRegistry> = OnceLock::new();

/// The process-wide registry. Initialized with the built-in stages and the
/// default configuration if nothing was installed first.
pub fn global() -> &'static StageRegistry {
    GLOBAL_REGISTRY.get_or_init(|| {
        let registry = StageRegistry::with_builtins(&EngineConfig::default()).unwrap_or_else(|e| {
            // The default configuration always validates; fall back to an empty
            // registry rather than panicking inside an initializer.
            log::error!("Failed to build built-in stages: {}", e);
            StageRegistry::new()
        });
        log::info!("Global stage registry initialized with stages {:?}", registry.names());
        registry
    })
}

/// Installs `registry` as the process-wide registry. Fails with
/// `RegistryInitialized` if the global registry is already in place.
pub fn install_global(registry: StageRegistry) -> Result<(), VolpipeError> {
    let names = registry.names();
    GLOBAL_REGISTRY
        .set(registry)
        .map_err(|_| VolpipeError::RegistryInitialized)?;
    log::info!("Global stage registry installed with stages {:?}", names);
    Ok(())
}

/// Installs the built-in stages, parameterized from `config`, as the global registry.
pub fn install_global_with_config(config: &EngineConfig) -> Result<(), VolpipeError> {
    install_global(StageRegistry::with_builtins(config)?)
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = StageRegistry::with_builtins(&EngineConfig::default()).unwrap();
        assert_eq!(
            registry.names(),
            vec!["pass_through", "rmbkg", "shuffle", "xor_delta", "zstd"]
        );
        assert!(registry.contains("zstd"));
        assert!(registry.lookup("shuffle").is_ok());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = StageRegistry::new();
        registry.register("copy", Arc::new(BuiltinStage::PassThrough)).unwrap();
        let result = registry.register("copy", Arc::new(BuiltinStage::Shuffle));
        assert!(matches!(result, Err(VolpipeError::DuplicateStage(ref id)) if id == "copy"));
        // The original binding is untouched.
        assert_eq!(registry.lookup("copy").unwrap().name(), "pass_through");
    }

    #[test]
    fn test_lookup_missing_is_unknown_stage() {
        let registry = StageRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.lookup("lz4"),
            Err(VolpipeError::UnknownStage { ref name, .. }) if name == "lz4"
        ));
    }

    #[test]
    fn test_rejects_unaddressable_ids() {
        let mut registry = StageRegistry::new();
        assert!(registry.register("", Arc::new(BuiltinStage::PassThrough)).is_err());
        assert!(registry.register("a->b", Arc::new(BuiltinStage::PassThrough)).is_err());
        assert!(registry.register("copy(fast)", Arc::new(BuiltinStage::PassThrough)).is_err());
    }

    #[test]
    fn test_registry_keeps_its_config() {
        let config = EngineConfig {
            default_threads: 3,
            ..EngineConfig::default()
        };
        let registry = StageRegistry::with_builtins(&config).unwrap();
        assert_eq!(registry.config().default_threads, 3);
        assert_eq!(StageRegistry::new().config(), &EngineConfig::default());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            zstd_level: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            StageRegistry::with_builtins(&config),
            Err(VolpipeError::Config(_))
        ));
    }

    #[test]
    fn test_global_is_write_once() {
        let registry = global();
        assert!(registry.contains("zstd"));
        let result = install_global(StageRegistry::new());
        assert!(matches!(result, Err(VolpipeError::RegistryInitialized)));
        // Still the same registry.
        assert!(global().contains("zstd"));
    }
}
