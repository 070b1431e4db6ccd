//! Time stepping for lab models.
//!
//! The host calls [`Integrator::advance`](integration::Integrator::advance)
//! once per animation frame with the wall-clock time elapsed since the last
//! frame. Two strategies are used depending on the model:
//!
//! ## Closed form
//!
//! Analytic models are evaluated directly at the accumulated time,
//! `state = at(t + dt)`. Frame rate has no influence on the result.
//!
//! ## Explicit Euler
//!
//! Derivative models are integrated with forward Euler,
//!
//! ```text
//! y(t + h) = y(t) + h * f(y(t))
//! ```
//!
//! The frame is split into `n = ceil(dt / bound)` equal sub-steps, where the
//! bound is the smaller of the configured `max_step` and the model's own
//! stability limit. Algebraic variables are recomputed after every sub-step.
//! A step either completes for the whole frame or leaves the state untouched.
//!
//! # Submodules
//!
//! - [`integration`]: the frame integrator
//! - `reference` (feature `solvers`): adaptive Dormand-Prince integration
//!   used to validate the Euler results

pub mod integration;

#[cfg(feature = "solvers")]
pub mod reference;

use crate::models::Model;
use crate::SimulationState;

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;

/// Errors that can occur while stepping a model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    /// Frame time is negative or not a number
    #[error("Invalid time step: {0}")]
    InvalidTimeStep(f64),
    /// A derivative or an updated value became NaN or infinite
    #[error("Numeric divergence in `{variable}` at step {step}")]
    NumericDivergence { variable: &'static str, step: u64 },
    /// Sub-step bound or convergence tolerance is not positive and finite
    #[error("Invalid integrator setting `{name}` = {value}")]
    InvalidSetting { name: &'static str, value: f64 },
    /// Reference ODE solver failed
    #[error("ODE solver failed: {0}")]
    ODESolverFailed(String),
    /// Too many differential variables for integrator capacity
    #[error("Problem has {0} differential variables but integrator capacity is {1}")]
    TooManyDifferentialVariables(usize, usize),
}

/// Relative change between two samples of a quantity.
///
/// Falls back to the absolute change when the new value is (almost) zero.
pub fn relative_change(current: f64, previous: f64) -> f64 {
    let delta = (current - previous).abs();
    let scale = current.abs();
    if scale > f64::EPSILON {
        delta / scale
    } else {
        delta
    }
}

/// Whether the model's tracked variable changed by at most `epsilon`
/// (relative) between two consecutive states.
///
/// A pair of states with the same step count has not been stepped, so it
/// never counts as converged.
pub fn has_converged(
    model: &Model,
    state: &SimulationState,
    previous: &SimulationState,
    epsilon: f64,
) -> bool {
    if state.steps() == previous.steps() {
        return false;
    }
    let tracked = model.tracked_variable();
    match (state.get(tracked), previous.get(tracked)) {
        (Some(current), Some(before)) => relative_change(current, before) <= epsilon,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ViscousFall;
    use nalgebra::DVector;

    #[test]
    fn test_relative_change() {
        assert!((relative_change(1.01, 1.0) - 0.01 / 1.01).abs() < 1e-12);
        assert_eq!(relative_change(0.0, 0.0), 0.0);
        assert_eq!(relative_change(0.0, 0.5), 0.5);
    }

    #[test]
    fn test_unstepped_state_is_not_converged() {
        let model = Model::ViscousFall(ViscousFall::default());
        let state = model.initial_state();
        assert!(!has_converged(&model, &state, &state.clone(), 0.005));
    }

    #[test]
    fn test_converged_when_change_is_small() {
        let model = Model::ViscousFall(ViscousFall::default());
        let mut previous = model.initial_state();
        previous.commit(DVector::from_vec(vec![0.1, 0.01]), 0.1, 1);
        let mut state = previous.clone();
        state.commit(DVector::from_vec(vec![0.1001, 0.02]), 0.2, 1);
        assert!(has_converged(&model, &state, &previous, 0.005));

        let mut moving = previous.clone();
        moving.commit(DVector::from_vec(vec![0.2, 0.02]), 0.2, 1);
        assert!(!has_converged(&model, &moving, &previous, 0.005));
    }

    #[test]
    fn test_error_messages() {
        let err = SolverError::NumericDivergence { variable: "velocity", step: 12 };
        assert_eq!(err.to_string(), "Numeric divergence in `velocity` at step 12");
        assert_eq!(SolverError::InvalidTimeStep(-1.0).to_string(), "Invalid time step: -1");
    }
}
