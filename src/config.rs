//! Kernel settings.
//!
//! Everything is optional; an empty document gives the defaults.
//!
//! ```
//! use labsim::LabConfig;
//!
//! let config = LabConfig::from_json(r#"{
//!     "max_step": 0.02,
//!     "overrides": { "projectile": { "target_distance": 30.0 } }
//! }"#)?;
//! assert_eq!(config.integrator().max_step, 0.02);
//! assert_eq!(config.catalog()?.len(), 17);
//! # Ok::<(), labsim::config::ConfigError>(())
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::Catalog;
use crate::models::ModelError;
use crate::solvers::integration::{Integrator, DEFAULT_EPSILON, DEFAULT_MAX_STEP};

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid setting `{name}` = {value}")]
    InvalidSetting { name: &'static str, value: f64 },
    #[error("No experiment `{0}` to override")]
    UnknownExperiment(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Integration settings plus per-experiment model constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Largest Euler sub-step (s)
    pub max_step: f64,
    /// Relative change below which a tracked variable counts as settled
    pub convergence_epsilon: f64,
    /// Constants per experiment id, by field name
    pub overrides: BTreeMap<String, Map<String, Value>>,
}

impl Default for LabConfig {
    fn default() -> Self {
        LabConfig {
            max_step: DEFAULT_MAX_STEP,
            convergence_epsilon: DEFAULT_EPSILON,
            overrides: BTreeMap::new(),
        }
    }
}

impl LabConfig {
    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: LabConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.max_step.is_finite() && self.max_step > 0.0) {
            return Err(ConfigError::InvalidSetting { name: "max_step", value: self.max_step });
        }
        if !(self.convergence_epsilon.is_finite() && self.convergence_epsilon > 0.0) {
            return Err(ConfigError::InvalidSetting {
                name: "convergence_epsilon",
                value: self.convergence_epsilon,
            });
        }
        Ok(())
    }

    pub fn integrator(&self) -> Integrator {
        Integrator::new().with_max_step(self.max_step).with_epsilon(self.convergence_epsilon)
    }

    /// Built-in experiments with the configured constants applied.
    pub fn catalog(&self) -> ConfigResult<Catalog> {
        Catalog::with_overrides(&self.overrides)
    }
}
