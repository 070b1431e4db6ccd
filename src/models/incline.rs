//! Cart rolling down a frictionless inclined plane.
//!
//! Units follow the bench setup: centimetres and seconds, g = 980 cm/s^2.
//! a = g*h/L and the travel time is sqrt(2L/a).

use serde::{Deserialize, Serialize};

use super::{require_positive, AnalyticModel, ModelError, ModelResult, StateSchema};
use crate::Variable;

static VARIABLES: [Variable; 2] = [Variable::algebraic("distance"), Variable::algebraic("speed")];

const DISTANCE: usize = 0;

/// Inclined plane geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incline {
    /// Height of the raised end (cm)
    pub height: f64,
    /// Length of the ramp (cm)
    pub length: f64,
    /// Gravitational acceleration (cm/s^2)
    pub gravity: f64,
}

impl Incline {
    pub fn new(height: f64) -> ModelResult<Self> {
        let model = Incline { height, ..Incline::default() };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> ModelResult<()> {
        require_positive("height", self.height)?;
        require_positive("length", self.length)?;
        require_positive("gravity", self.gravity)?;
        if self.height > self.length {
            return Err(ModelError::InvalidModelParameter {
                name: "height",
                value: self.height,
                reason: "cannot exceed the ramp length",
            });
        }
        Ok(())
    }

    /// a = g*sin(alpha) = g*h/L (cm/s^2).
    pub fn acceleration(&self) -> f64 {
        self.gravity * (self.height / self.length)
    }

    /// Time to reach the bottom (s).
    pub fn travel_time(&self) -> f64 {
        (2.0 * self.length / self.acceleration()).sqrt()
    }
}

impl Default for Incline {
    fn default() -> Self {
        Incline { height: 20.0, length: 100.0, gravity: 980.0 }
    }
}

impl StateSchema for Incline {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        vec![0.0, 0.0]
    }

    fn is_finished(&self, values: &nalgebra::DVector<f64>) -> bool {
        values[DISTANCE] >= self.length
    }
}

impl AnalyticModel for Incline {
    fn at(&self, t: f64) -> Vec<f64> {
        let a = self.acceleration();
        let travel_time = self.travel_time();
        if t >= travel_time {
            return vec![self.length, a * travel_time];
        }
        vec![0.5 * a * t * t, a * t]
    }
}
