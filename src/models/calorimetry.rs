//! Ice melting in warm water (heat balance).
//!
//! c*m_w*(t_w - t) = lambda*m_i + c*m_i*(t - 0)
//! => t = (c*m_w*t_w - lambda*m_i) / (c*(m_w + m_i))
//!
//! When there is more ice than the water can melt the mixture settles at 0 C
//! and only part of the ice melts. The equilibrium is exact; the cooling the
//! learner watches is a linear approach at `cooling_rate`, so the model is
//! analytic.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::{
    require_non_negative, require_positive, require_within, AnalyticModel, ModelResult,
    StateSchema,
};
use crate::Variable;

static VARIABLES: [Variable; 2] =
    [Variable::algebraic("temperature"), Variable::algebraic("melted_ice")];

const TEMPERATURE: usize = 0;

/// Calorimeter contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calorimetry {
    /// Water mass (kg)
    pub water_mass: f64,
    /// Initial water temperature (C)
    pub water_temperature: f64,
    /// Ice mass at 0 C (kg)
    pub ice_mass: f64,
    /// Specific heat of water (J/(kg*K))
    pub specific_heat: f64,
    /// Latent heat of fusion of ice (J/kg)
    pub latent_heat: f64,
    /// Displayed cooling speed (C/s)
    pub cooling_rate: f64,
}

impl Calorimetry {
    pub fn validate(&self) -> ModelResult<()> {
        require_positive("water_mass", self.water_mass)?;
        require_within("water_temperature", self.water_temperature, 0.0, 100.0)?;
        require_non_negative("ice_mass", self.ice_mass)?;
        require_positive("specific_heat", self.specific_heat)?;
        require_positive("latent_heat", self.latent_heat)?;
        require_positive("cooling_rate", self.cooling_rate)
    }

    /// Heat the water can give up before reaching 0 C (J).
    fn available_heat(&self) -> f64 {
        self.specific_heat * self.water_mass * self.water_temperature
    }

    /// Final temperature of the mixture (C).
    pub fn equilibrium_temperature(&self) -> f64 {
        let numerator = self.available_heat() - self.latent_heat * self.ice_mass;
        let denominator = self.specific_heat * (self.water_mass + self.ice_mass);
        (numerator / denominator).max(0.0)
    }

    /// Mass of ice that ends up melted (kg).
    pub fn melted_at_equilibrium(&self) -> f64 {
        self.ice_mass.min(self.available_heat() / self.latent_heat)
    }

    /// Time the displayed cooling takes (s).
    pub fn settling_time(&self) -> f64 {
        (self.water_temperature - self.equilibrium_temperature()) / self.cooling_rate
    }
}

impl Default for Calorimetry {
    /// 200 g of water at 60 C, no ice yet.
    fn default() -> Self {
        Calorimetry {
            water_mass: 0.2,
            water_temperature: 60.0,
            ice_mass: 0.0,
            specific_heat: 4200.0,
            latent_heat: 330_000.0,
            cooling_rate: 20.0,
        }
    }
}

impl StateSchema for Calorimetry {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        vec![self.water_temperature, 0.0]
    }

    fn is_finished(&self, values: &DVector<f64>) -> bool {
        values[TEMPERATURE] <= self.equilibrium_temperature()
    }
}

impl AnalyticModel for Calorimetry {
    fn at(&self, t: f64) -> Vec<f64> {
        let equilibrium = self.equilibrium_temperature();
        let drop = self.water_temperature - equilibrium;
        let melted = self.melted_at_equilibrium();
        if drop <= 0.0 || t >= self.settling_time() {
            return vec![equilibrium, melted];
        }
        let temperature = self.water_temperature - self.cooling_rate * t;
        let progress = (self.water_temperature - temperature) / drop;
        vec![temperature, melted * progress]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equilibrium_with_small_ice() {
        // 50 g of ice into 200 g at 60 C
        let cal = Calorimetry { ice_mass: 0.05, ..Calorimetry::default() };
        let expected = (4200.0 * 0.2 * 60.0 - 330_000.0 * 0.05) / (4200.0 * 0.25);
        assert!((cal.equilibrium_temperature() - expected).abs() < 1e-9);
        assert_eq!(cal.melted_at_equilibrium(), 0.05);
    }

    #[test]
    fn test_too_much_ice_stops_at_zero() {
        let cal = Calorimetry { ice_mass: 0.5, ..Calorimetry::default() };
        assert_eq!(cal.equilibrium_temperature(), 0.0);
        // 50400 J melts ~0.1527 kg
        assert!((cal.melted_at_equilibrium() - 50_400.0 / 330_000.0).abs() < 1e-12);
        assert!(cal.melted_at_equilibrium() < cal.ice_mass);
    }

    #[test]
    fn test_cooling_is_linear_then_settles() {
        let cal = Calorimetry { ice_mass: 0.05, ..Calorimetry::default() };
        let mid = cal.at(0.5);
        assert!((mid[TEMPERATURE] - 50.0).abs() < 1e-12);

        let settled = cal.at(cal.settling_time() + 0.1);
        assert_eq!(settled[TEMPERATURE], cal.equilibrium_temperature());
        assert_eq!(settled[1], 0.05);
        assert!(cal.is_finished(&DVector::from_vec(settled)));
    }

    #[test]
    fn test_no_ice_no_change() {
        let cal = Calorimetry::default();
        let values = cal.at(3.0);
        assert!((values[TEMPERATURE] - 60.0).abs() < 1e-9);
        assert_eq!(values[1], 0.0);
    }

    #[test]
    fn test_rejects_bad_constants() {
        assert!(Calorimetry { water_mass: 0.0, ..Calorimetry::default() }.validate().is_err());
        assert!(Calorimetry { ice_mass: -0.01, ..Calorimetry::default() }.validate().is_err());
        assert!(Calorimetry { water_temperature: 120.0, ..Calorimetry::default() }
            .validate()
            .is_err());
    }
}
