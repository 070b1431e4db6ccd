//! Strong acid titrated with a strong base from a burette.
//!
//! # State Variables
//! - Volume of base added (mL): Differential, dV/dt = burette flow
//! - pH: Algebraic, recomputed from the excess of H+ or OH-
//!
//! pH follows the charge balance including water autoionization,
//! [H+] = (d + sqrt(d^2 + 4*Kw)) / 2 with d the net acid concentration, so it
//! is continuous and strictly increasing in the added volume (7 exactly at
//! the equivalence point).

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::{require_positive, DerivativeModel, ModelError, ModelResult, StateSchema};
use crate::{SimulationState, Variable};

static VARIABLES: [Variable; 2] =
    [Variable::differential("volume_added"), Variable::algebraic("ph")];

const VOLUME: usize = 0;
const PH: usize = 1;

/// Ion product of water at 25 C.
const KW: f64 = 1e-14;

/// Acid-base indicator dropped into the flask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    #[default]
    None,
    Litmus,
    Phenolphthalein,
}

/// Titration setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Titration {
    /// Acid concentration (mol/L)
    pub acid_concentration: f64,
    /// Acid sample volume (mL)
    pub acid_volume: f64,
    /// Protons released per acid molecule (1 for HCl, 2 for H2SO4)
    pub acid_protons: f64,
    /// Base concentration (mol/L)
    pub base_concentration: f64,
    /// Burette flow (mL/s)
    pub flow_rate: f64,
    /// Burette capacity (mL)
    pub max_volume: f64,
    #[serde(default)]
    pub indicator: Indicator,
}

impl Titration {
    pub fn validate(&self) -> ModelResult<()> {
        require_positive("acid_concentration", self.acid_concentration)?;
        require_positive("acid_volume", self.acid_volume)?;
        require_positive("acid_protons", self.acid_protons)?;
        require_positive("base_concentration", self.base_concentration)?;
        require_positive("flow_rate", self.flow_rate)?;
        require_positive("max_volume", self.max_volume)?;
        if self.acid_protons < 1.0 {
            return Err(ModelError::InvalidModelParameter {
                name: "acid_protons",
                value: self.acid_protons,
                reason: "an acid releases at least one proton",
            });
        }
        Ok(())
    }

    /// Moles of H+ in the sample.
    pub fn acid_moles(&self) -> f64 {
        self.acid_concentration * self.acid_volume / 1000.0 * self.acid_protons
    }

    /// Moles of OH- delivered with `volume` mL of base.
    pub fn base_moles(&self, volume: f64) -> f64 {
        self.base_concentration * volume / 1000.0
    }

    /// Volume of base that exactly neutralizes the sample (mL).
    pub fn equivalence_volume(&self) -> f64 {
        self.acid_moles() * 1000.0 / self.base_concentration
    }

    /// Whether `volume` mL of base has neutralized all acid.
    pub fn is_neutralized(&self, volume: f64) -> bool {
        let acid = self.acid_moles();
        self.base_moles(volume) >= acid * (1.0 - 1e-9)
    }

    /// pH after adding `volume` mL of base.
    pub fn ph_at(&self, volume: f64) -> f64 {
        let total_litres = (self.acid_volume + volume) / 1000.0;
        let net_acid = (self.acid_moles() - self.base_moles(volume)) / total_litres;
        let root = (net_acid * net_acid + 4.0 * KW).sqrt();
        // Pick the cancellation-free branch
        let hydrogen =
            if net_acid >= 0.0 { (net_acid + root) / 2.0 } else { 2.0 * KW / (root - net_acid) };
        -hydrogen.log10()
    }

    /// State after `volume` mL has been added at the nominal flow.
    pub fn state_with_volume(&self, volume: f64) -> SimulationState {
        let mut state = SimulationState::new(&VARIABLES, self.initial_values());
        let volume = volume.clamp(0.0, self.max_volume);
        state.commit(
            DVector::from_vec(vec![volume, self.ph_at(volume)]),
            volume / self.flow_rate,
            0,
        );
        state
    }
}

impl Default for Titration {
    /// 25 mL of 0.1 M HCl against 0.1 M NaOH.
    fn default() -> Self {
        Titration {
            acid_concentration: 0.1,
            acid_volume: 25.0,
            acid_protons: 1.0,
            base_concentration: 0.1,
            flow_rate: 0.5,
            max_volume: 50.0,
            indicator: Indicator::None,
        }
    }
}

impl StateSchema for Titration {
    fn variables(&self) -> &'static [Variable] {
        &VARIABLES
    }

    fn initial_values(&self) -> Vec<f64> {
        vec![0.0, self.ph_at(0.0)]
    }

    fn is_finished(&self, values: &DVector<f64>) -> bool {
        values[VOLUME] >= self.max_volume
    }
}

impl DerivativeModel for Titration {
    fn derivative(&self, _values: &DVector<f64>) -> DVector<f64> {
        DVector::from_vec(vec![self.flow_rate, 0.0])
    }

    fn post_step(&self, values: &mut DVector<f64>) {
        values[VOLUME] = values[VOLUME].min(self.max_volume);
        values[PH] = self.ph_at(values[VOLUME]);
    }

    fn tracked(&self) -> usize {
        PH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_ph_of_hcl() {
        // 0.1 M HCl has pH 1
        let titration = Titration::default();
        assert!((titration.ph_at(0.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_equivalence_point() {
        let titration = Titration::default();
        assert!((titration.equivalence_volume() - 25.0).abs() < 1e-12);
        assert!((titration.ph_at(25.0) - 7.0).abs() < 1e-9);
        assert!(titration.is_neutralized(25.0));
        assert!(!titration.is_neutralized(24.9));
    }

    #[test]
    fn test_sulfuric_acid_needs_twice_the_base() {
        let titration = Titration { acid_protons: 2.0, ..Titration::default() };
        assert!((titration.equivalence_volume() - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_ph_is_monotonic() {
        let titration = Titration::default();
        let mut previous = titration.ph_at(0.0);
        for i in 1..=500 {
            let ph = titration.ph_at(i as f64 * 0.1);
            assert!(ph > previous, "pH dropped at {} mL", i as f64 * 0.1);
            previous = ph;
        }
    }

    #[test]
    fn test_excess_base() {
        // 10 mL excess of 0.1 M NaOH in 60 mL: [OH-] = 1/60 M, pH ~12.22
        let titration = Titration::default();
        let expected = 14.0 + (1.0_f64 / 60.0).log10();
        assert!((titration.ph_at(35.0) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_state_with_volume() {
        let titration = Titration::default();
        let state = titration.state_with_volume(10.0);
        assert_eq!(state.get("volume_added"), Some(10.0));
        assert!((state.time() - 20.0).abs() < 1e-12);
        assert_eq!(state.get("ph"), Some(titration.ph_at(10.0)));
    }

    #[test]
    fn test_post_step_caps_volume() {
        let titration = Titration::default();
        let mut y = DVector::from_vec(vec![55.0, 0.0]);
        titration.post_step(&mut y);
        assert_eq!(y[VOLUME], 50.0);
        assert!(titration.is_finished(&y));
    }
}
