//! DC circuit with a source, a load resistor and internal resistance.
//!
//! I = E / (R + r), terminal voltage U = I*R. With `internal_resistance = 0`
//! this is plain Ohm's law.

use serde::{Deserialize, Serialize};

use super::{require_non_negative, require_positive, AnalyticModel, ModelResult, StateSchema};
use crate::Variable;

static VARIABLES: [Variable; 3] = [
    Variable::algebraic("current"),
    Variable::algebraic("terminal_voltage"),
    Variable::algebraic("power"),
];

/// Source and load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    /// Source EMF (V)
    pub emf: f64,
    /// Load resistance (Ohm)
    pub resistance: f64,
    /// Internal resistance of the source (Ohm)
    #[serde(default)]
    pub internal_resistance: f64,
}

impl Circuit {
    /// Ideal source, Ohm's law bench.
    pub fn ohmic(voltage: f64, resistance: f64) -> ModelResult<Self> {
        let circuit = Circuit { emf: voltage, resistance, internal_resistance: 0.0 };
        circuit.validate()?;
        Ok(circuit)
    }

    pub fn validate(&self) -> ModelResult<()> {
        require_non_negative("emf", self.emf)?;
        require_positive("resistance", self.resistance)?;
        require_non_negative("internal_resistance", self.internal_resistance)
    }

    /// Current through the loop (A).
    pub fn current(&self) -> f64 {
        self.emf / (self.resistance + self.internal_resistance)
    }

    /// Voltage across the load (V).
    pub fn terminal_voltage(&self) -> f64 {
        self.current() * self.resistance
    }

    /// Power dissipated in the load (W).
    pub fn power(&self) -> f64 {
        self.current().powi(2) * self.resistance
    }
}

impl Default for Circuit {
    /// 9 V battery with 1 Ohm internal resistance on a 5 Ohm load.
    fn default() -> Self {
        Circuit { emf: 9.0, resistance: 5.0, internal_resistance: 1.0 }
    }
}

impl StateSchema for Circuit {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        self.at(0.0)
    }
}

impl AnalyticModel for Circuit {
    fn at(&self, _t: f64) -> Vec<f64> {
        vec![self.current(), self.terminal_voltage(), self.power()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ohms_law() {
        let circuit = Circuit::ohmic(12.0, 10.0).unwrap();
        assert!((circuit.current() - 1.2).abs() < 1e-12);
        assert!((circuit.terminal_voltage() - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_internal_resistance_drops_voltage() {
        let circuit = Circuit::default();
        assert!((circuit.current() - 1.5).abs() < 1e-12);
        assert!((circuit.terminal_voltage() - 7.5).abs() < 1e-12);
        assert!((circuit.power() - 11.25).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_zero_resistance() {
        assert!(Circuit::ohmic(5.0, 0.0).is_err());
        assert!(Circuit::ohmic(5.0, -2.0).is_err());
        let circuit = Circuit { internal_resistance: -1.0, ..Circuit::default() };
        assert!(circuit.validate().is_err());
    }
}
