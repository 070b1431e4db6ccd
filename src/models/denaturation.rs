//! Enzyme activity against temperature and pH.
//!
//! Activity falls linearly away from the optimum (3 % per degree, 20 % per pH
//! unit) and the weaker of the two effects wins. Past the thresholds the
//! protein is denatured.

use serde::{Deserialize, Serialize};

use super::{require_positive, require_within, AnalyticModel, ModelError, ModelResult, StateSchema};
use crate::Variable;

static VARIABLES: [Variable; 3] = [
    Variable::algebraic("temperature"),
    Variable::algebraic("ph"),
    Variable::algebraic("efficiency"),
];

/// Conditions and enzyme sensitivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Denaturation {
    /// Bath temperature (C)
    pub temperature: f64,
    pub ph: f64,
    pub optimum_temperature: f64,
    pub optimum_ph: f64,
    /// Activity lost per degree away from the optimum (%)
    pub temperature_sensitivity: f64,
    /// Activity lost per pH unit away from the optimum (%)
    pub ph_sensitivity: f64,
    /// Above this temperature the protein unfolds (C)
    pub denaturation_temperature: f64,
    pub ph_lower_limit: f64,
    pub ph_upper_limit: f64,
}

impl Denaturation {
    pub fn validate(&self) -> ModelResult<()> {
        require_within("temperature", self.temperature, -20.0, 120.0)?;
        require_within("ph", self.ph, 0.0, 14.0)?;
        require_within("optimum_ph", self.optimum_ph, 0.0, 14.0)?;
        require_within("optimum_temperature", self.optimum_temperature, 0.0, 100.0)?;
        require_positive("temperature_sensitivity", self.temperature_sensitivity)?;
        require_positive("ph_sensitivity", self.ph_sensitivity)?;
        require_within("ph_lower_limit", self.ph_lower_limit, 0.0, 14.0)?;
        require_within("ph_upper_limit", self.ph_upper_limit, 0.0, 14.0)?;
        if self.ph_lower_limit >= self.ph_upper_limit {
            return Err(ModelError::InvalidModelParameter {
                name: "ph_lower_limit",
                value: self.ph_lower_limit,
                reason: "must be below the upper limit",
            });
        }
        Ok(())
    }

    /// Remaining activity in percent, 0..=100.
    pub fn efficiency(&self) -> f64 {
        let temperature_effect = 100.0
            - (self.temperature - self.optimum_temperature).abs() * self.temperature_sensitivity;
        let ph_effect = 100.0 - (self.ph - self.optimum_ph).abs() * self.ph_sensitivity;
        temperature_effect.min(ph_effect).max(0.0)
    }

    /// Whether the given conditions unfold the protein.
    pub fn is_denatured(&self, temperature: f64, ph: f64) -> bool {
        temperature > self.denaturation_temperature
            || ph < self.ph_lower_limit
            || ph > self.ph_upper_limit
    }
}

impl Default for Denaturation {
    fn default() -> Self {
        Denaturation {
            temperature: 37.0,
            ph: 7.0,
            optimum_temperature: 37.0,
            optimum_ph: 7.0,
            temperature_sensitivity: 3.0,
            ph_sensitivity: 20.0,
            denaturation_temperature: 55.0,
            ph_lower_limit: 3.0,
            ph_upper_limit: 11.0,
        }
    }
}

impl StateSchema for Denaturation {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        self.at(0.0)
    }
}

impl AnalyticModel for Denaturation {
    fn at(&self, _t: f64) -> Vec<f64> {
        vec![self.temperature, self.ph, self.efficiency()]
    }
}
