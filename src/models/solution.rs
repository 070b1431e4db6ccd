//! Preparing a salt solution of a given mass fraction.
//!
//! # State Variables
//! - Dissolved salt (g): Algebraic, grows linearly while stirring
//! - Concentration (%): Algebraic, dissolved salt over total mass
//!
//! The recipe for a target solution follows from w = m(salt) / m(solution):
//! 200 g at 5 % needs 10 g of salt and 190 g of water. Water is measured in
//! millilitres at 1 g/mL.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::{
    require_non_negative, require_positive, AnalyticModel, ModelError, ModelResult, StateSchema,
};
use crate::Variable;

static VARIABLES: [Variable; 2] =
    [Variable::algebraic("dissolved_salt"), Variable::algebraic("concentration")];

const DISSOLVED: usize = 0;

/// Target solution and what the learner weighed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionPreparation {
    /// Mass of solution asked for (g)
    pub target_mass: f64,
    /// Mass fraction asked for (%)
    pub target_fraction: f64,
    /// Salt weighed out (g)
    pub salt_mass: f64,
    /// Water measured out (mL)
    pub water_volume: f64,
    /// Stirring until all salt is dissolved (s)
    pub mixing_time: f64,
}

impl SolutionPreparation {
    pub fn validate(&self) -> ModelResult<()> {
        require_positive("target_mass", self.target_mass)?;
        require_positive("target_fraction", self.target_fraction)?;
        if self.target_fraction >= 100.0 {
            return Err(ModelError::InvalidModelParameter {
                name: "target_fraction",
                value: self.target_fraction,
                reason: "a solution needs some solvent",
            });
        }
        require_non_negative("salt_mass", self.salt_mass)?;
        require_non_negative("water_volume", self.water_volume)?;
        require_positive("mixing_time", self.mixing_time)
    }

    /// Salt the target solution needs (g).
    pub fn required_salt(&self) -> f64 {
        self.target_mass * self.target_fraction / 100.0
    }

    /// Water the target solution needs (g, equally mL).
    pub fn required_water(&self) -> f64 {
        self.target_mass - self.required_salt()
    }

    /// Mass of the mixture actually prepared (g).
    pub fn total_mass(&self) -> f64 {
        self.salt_mass + self.water_volume
    }

    /// Mass fraction once `dissolved` grams are in solution (%).
    pub fn concentration(&self, dissolved: f64) -> f64 {
        let total = self.total_mass();
        if total > 0.0 {
            100.0 * dissolved / total
        } else {
            0.0
        }
    }

    /// Whether the weighed amounts match the recipe within a gram.
    pub fn follows_recipe(&self) -> bool {
        (self.salt_mass - self.required_salt()).abs() <= 1.0
            && (self.water_volume - self.required_water()).abs() <= 1.0
    }
}

impl Default for SolutionPreparation {
    /// 200 g of 5 % table salt solution, nothing weighed yet.
    fn default() -> Self {
        SolutionPreparation {
            target_mass: 200.0,
            target_fraction: 5.0,
            salt_mass: 0.0,
            water_volume: 0.0,
            mixing_time: 2.0,
        }
    }
}

impl StateSchema for SolutionPreparation {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        self.at(0.0)
    }

    fn is_finished(&self, values: &DVector<f64>) -> bool {
        values[DISSOLVED] >= self.salt_mass
    }
}

impl AnalyticModel for SolutionPreparation {
    fn at(&self, t: f64) -> Vec<f64> {
        let dissolved = self.salt_mass * (t / self.mixing_time).clamp(0.0, 1.0);
        vec![dissolved, self.concentration(dissolved)]
    }
}
