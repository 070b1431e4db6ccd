//! Diffraction grating, first order maximum.
//!
//! d*sin(phi) = k*lambda; for small angles the offset on the screen is
//! x = lambda*L/d.

use serde::{Deserialize, Serialize};

use super::{require_positive, AnalyticModel, ModelError, ModelResult, StateSchema};
use crate::Variable;

static VARIABLES: [Variable; 1] = [Variable::algebraic("offset")];

/// Laser, grating and screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diffraction {
    /// Wavelength (nm)
    pub wavelength: f64,
    /// Grating to screen distance (m)
    pub screen_distance: f64,
    /// Grating period (m)
    pub grating_period: f64,
}

impl Diffraction {
    pub fn validate(&self) -> ModelResult<()> {
        require_positive("wavelength", self.wavelength)?;
        require_positive("screen_distance", self.screen_distance)?;
        require_positive("grating_period", self.grating_period)?;
        if self.wavelength * 1e-9 >= self.grating_period {
            return Err(ModelError::InvalidModelParameter {
                name: "wavelength",
                value: self.wavelength,
                reason: "no first order maximum for this grating",
            });
        }
        Ok(())
    }

    /// Offset of the first order maximum from the centre (m).
    pub fn first_order_offset(&self) -> f64 {
        self.wavelength * 1e-9 * self.screen_distance / self.grating_period
    }
}

impl Default for Diffraction {
    /// Red laser, 2 um grating, screen at 1 m.
    fn default() -> Self {
        Diffraction { wavelength: 650.0, screen_distance: 1.0, grating_period: 2e-6 }
    }
}

impl StateSchema for Diffraction {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        self.at(0.0)
    }
}

impl AnalyticModel for Diffraction {
    fn at(&self, _t: f64) -> Vec<f64> {
        vec![self.first_order_offset()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_red_laser_offset() {
        let grating = Diffraction::default();
        assert!((grating.first_order_offset() - 0.325).abs() < 1e-12);
    }

    #[test]
    fn test_offset_scales_with_distance() {
        let near = Diffraction::default();
        let far = Diffraction { screen_distance: 2.0, ..Diffraction::default() };
        assert!((far.first_order_offset() - 2.0 * near.first_order_offset()).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_wavelength_beyond_period() {
        let grating = Diffraction { grating_period: 5e-7, ..Diffraction::default() };
        assert!(grating.validate().is_err());
    }
}
