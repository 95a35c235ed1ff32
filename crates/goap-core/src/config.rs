//! Orchestrator configuration, fixed at construction.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GoapError, GoapResult};

/// Search, execution and observability bounds for one orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum number of actions in a plan.
    pub max_planning_depth: usize,
    /// Wall-clock budget for one planning call (milliseconds).
    pub planning_timeout_ms: u64,
    /// Wall-clock budget for executing one whole plan (milliseconds).
    pub execution_timeout_ms: u64,
    /// Emit structured lifecycle events.
    pub enable_logging: bool,
    /// Count lifecycle events in [`Metrics`](crate::metrics::Metrics).
    pub enable_metrics: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_planning_depth: 10,
            planning_timeout_ms: 5_000,
            execution_timeout_ms: 300_000,
            enable_logging: true,
            enable_metrics: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> GoapResult<()> {
        if self.max_planning_depth == 0 {
            return Err(GoapError::InvalidConfig(
                "max_planning_depth must be greater than zero".to_string(),
            ));
        }
        if self.planning_timeout_ms == 0 {
            return Err(GoapError::InvalidConfig(
                "planning_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.execution_timeout_ms == 0 {
            return Err(GoapError::InvalidConfig(
                "execution_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse a TOML document; omitted fields take their defaults.
    pub fn from_toml_str(raw: &str) -> GoapResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> GoapResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}
