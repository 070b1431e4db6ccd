//! Ideal transformer: U2 = U1 * N2 / N1, ratio k = N1 / N2.

use serde::{Deserialize, Serialize};

use super::{require_non_negative, require_positive, AnalyticModel, ModelResult, StateSchema};
use crate::Variable;

static VARIABLES: [Variable; 2] =
    [Variable::algebraic("secondary_voltage"), Variable::algebraic("ratio")];

/// Windings and input voltage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformer {
    pub primary_turns: f64,
    pub secondary_turns: f64,
    /// Input voltage (V)
    pub primary_voltage: f64,
}

impl Transformer {
    pub fn validate(&self) -> ModelResult<()> {
        require_positive("primary_turns", self.primary_turns)?;
        require_positive("secondary_turns", self.secondary_turns)?;
        require_non_negative("primary_voltage", self.primary_voltage)
    }

    /// Transformation ratio k = N1 / N2.
    pub fn ratio(&self) -> f64 {
        self.primary_turns / self.secondary_turns
    }

    /// Output voltage (V).
    pub fn secondary_voltage(&self) -> f64 {
        self.primary_voltage * (self.secondary_turns / self.primary_turns)
    }

    pub fn is_step_up(&self) -> bool {
        self.secondary_turns > self.primary_turns
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Transformer { primary_turns: 500.0, secondary_turns: 1000.0, primary_voltage: 220.0 }
    }
}

impl StateSchema for Transformer {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        self.at(0.0)
    }
}

impl AnalyticModel for Transformer {
    fn at(&self, _t: f64) -> Vec<f64> {
        vec![self.secondary_voltage(), self.ratio()]
    }
}
