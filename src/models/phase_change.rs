//! Water in a beaker held at a chosen temperature.
//!
//! Ice at or below the melting point, liquid water between the two
//! transition points, steam from the boiling point up. Ice floats a little
//! lower than the water it melts into, and steam leaves the beaker empty.

use serde::{Deserialize, Serialize};

use super::{require_within, AnalyticModel, ModelError, ModelResult, StateSchema};
use crate::Variable;

static VARIABLES: [Variable; 2] =
    [Variable::algebraic("temperature"), Variable::algebraic("fill_level")];

/// Beaker fill (% of its height) while frozen.
const SOLID_FILL: f64 = 50.0;
/// Beaker fill (% of its height) while liquid.
const LIQUID_FILL: f64 = 60.0;

/// Substance and bath temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseChange {
    /// Temperature (C)
    pub temperature: f64,
    pub melting_point: f64,
    pub boiling_point: f64,
    /// Above this temperature the burner is lit (C)
    pub burner_threshold: f64,
}

impl PhaseChange {
    pub fn at_temperature(temperature: f64) -> Self {
        PhaseChange { temperature, ..PhaseChange::default() }
    }

    pub fn validate(&self) -> ModelResult<()> {
        require_within("temperature", self.temperature, -273.15, 1000.0)?;
        require_within("melting_point", self.melting_point, -273.15, 1000.0)?;
        require_within("boiling_point", self.boiling_point, -273.15, 1000.0)?;
        require_within("burner_threshold", self.burner_threshold, -273.15, 1000.0)?;
        if self.melting_point >= self.boiling_point {
            return Err(ModelError::InvalidModelParameter {
                name: "melting_point",
                value: self.melting_point,
                reason: "must be below the boiling point",
            });
        }
        Ok(())
    }

    /// Frozen at or below the melting point.
    pub fn is_solid(&self) -> bool {
        self.temperature <= self.melting_point
    }

    /// Boiled off from the boiling point up.
    pub fn is_gas(&self) -> bool {
        self.temperature >= self.boiling_point
    }

    pub fn is_heated(&self) -> bool {
        self.temperature > self.burner_threshold
    }

    /// Share of the beaker taken by the substance (%).
    pub fn fill_level(&self) -> f64 {
        if self.is_gas() {
            0.0
        } else if self.is_solid() {
            SOLID_FILL
        } else {
            LIQUID_FILL
        }
    }
}

impl Default for PhaseChange {
    /// Water starting as ice at -20 C.
    fn default() -> Self {
        PhaseChange {
            temperature: -20.0,
            melting_point: 0.0,
            boiling_point: 100.0,
            burner_threshold: 20.0,
        }
    }
}

impl StateSchema for PhaseChange {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        self.at(0.0)
    }
}

impl AnalyticModel for PhaseChange {
    fn at(&self, _t: f64) -> Vec<f64> {
        vec![self.temperature, self.fill_level()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_points_are_inclusive() {
        assert!(PhaseChange::at_temperature(0.0).is_solid());
        assert!(!PhaseChange::at_temperature(0.5).is_solid());
        assert!(!PhaseChange::at_temperature(99.9).is_gas());
        assert!(PhaseChange::at_temperature(100.0).is_gas());
    }

    #[test]
    fn test_fill_level_follows_phase() {
        assert_eq!(PhaseChange::at_temperature(-20.0).fill_level(), 50.0);
        assert_eq!(PhaseChange::at_temperature(20.0).fill_level(), 60.0);
        assert_eq!(PhaseChange::at_temperature(120.0).fill_level(), 0.0);
    }

    #[test]
    fn test_burner() {
        assert!(!PhaseChange::at_temperature(20.0).is_heated());
        assert!(PhaseChange::at_temperature(21.0).is_heated());
    }

    #[test]
    fn test_rejects_inverted_transition_points() {
        let odd =
            PhaseChange { melting_point: 100.0, boiling_point: 0.0, ..PhaseChange::default() };
        assert!(odd.validate().is_err());
        assert!(PhaseChange::default().validate().is_ok());
    }
}
