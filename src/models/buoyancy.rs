//! Density by water displacement (Archimedes).
//!
//! A specimen of known mass is weighed in air, then lowered into a measuring
//! cylinder. The rise of the water level is its volume and the apparent mass
//! in water is reduced by the buoyant force.
//!
//! Units follow the bench: grams, millilitres, g/cm^3.

use serde::{Deserialize, Serialize};

use super::{require_positive, AnalyticModel, ModelResult, StateSchema};
use crate::Variable;

static VARIABLES: [Variable; 3] = [
    Variable::algebraic("volume"),
    Variable::algebraic("apparent_mass"),
    Variable::algebraic("water_level"),
];

/// Specimen and cylinder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buoyancy {
    /// Specimen mass (g)
    pub mass: f64,
    /// Specimen density (g/cm^3)
    pub density: f64,
    /// Water density (g/cm^3)
    pub fluid_density: f64,
    /// Water level before immersion (mL)
    pub initial_level: f64,
}

impl Buoyancy {
    pub fn validate(&self) -> ModelResult<()> {
        require_positive("mass", self.mass)?;
        require_positive("density", self.density)?;
        require_positive("fluid_density", self.fluid_density)?;
        require_positive("initial_level", self.initial_level)
    }

    /// Specimen volume (cm^3).
    pub fn volume(&self) -> f64 {
        self.mass / self.density
    }

    /// Reading of the balance with the specimen immersed (g).
    pub fn apparent_mass(&self) -> f64 {
        self.mass - self.fluid_density * self.volume()
    }

    /// Water level with the specimen immersed (mL).
    pub fn water_level(&self) -> f64 {
        self.initial_level + self.volume()
    }

    pub fn sinks(&self) -> bool {
        self.density > self.fluid_density
    }
}

impl Default for Buoyancy {
    /// 89 g of copper.
    fn default() -> Self {
        Buoyancy { mass: 89.0, density: 8.9, fluid_density: 1.0, initial_level: 50.0 }
    }
}

impl StateSchema for Buoyancy {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        self.at(0.0)
    }
}

impl AnalyticModel for Buoyancy {
    fn at(&self, _t: f64) -> Vec<f64> {
        vec![self.volume(), self.apparent_mass(), self.water_level()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copper_specimen() {
        let copper = Buoyancy::default();
        assert!((copper.volume() - 10.0).abs() < 1e-12);
        assert!((copper.apparent_mass() - 79.0).abs() < 1e-12);
        assert!((copper.water_level() - 60.0).abs() < 1e-12);
        assert!(copper.sinks());
    }

    #[test]
    fn test_density_recovered_from_readings() {
        let gold = Buoyancy { mass: 193.0, density: 19.3, ..Buoyancy::default() };
        let measured = gold.mass / (gold.water_level() - gold.initial_level);
        assert!((measured - 19.3).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_zero_density() {
        let specimen = Buoyancy { density: 0.0, ..Buoyancy::default() };
        assert!(specimen.validate().is_err());
    }
}
