//! Scenario configuration.

use keel_heap::HeapConfig;

use crate::error::ConfigError;

/// Complete configuration for constructing a [`Scenario`](crate::Scenario).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioConfig {
    /// Limits for the scenario's heap.
    pub heap: HeapConfig,
    /// Maximum number of simultaneously live entities. Default: 4096.
    pub max_entities: usize,
    /// Frame the clock starts at. Default: 0.
    pub start_frame: u64,
}

impl ScenarioConfig {
    /// Default entity limit.
    pub const DEFAULT_MAX_ENTITIES: usize = 4096;

    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.heap.validate()?;
        if self.max_entities == 0 {
            return Err(ConfigError::NoEntityCapacity);
        }
        Ok(())
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            heap: HeapConfig::default(),
            max_entities: Self::DEFAULT_MAX_ENTITIES,
            start_frame: 0,
        }
    }
}
