//! Adaptive reference integration for derivative models.
//!
//! Uses the Dormand-Prince 5(4) method from the
//! [`differential-equations`](https://docs.rs/differential-equations/) crate
//! with tight tolerances. The frame integrator is checked against it in
//! tests; it is not used while a run is animating.
//!
//! Boundary conditions applied by `post_step` (a ball resting on the bottom,
//! a burette running dry) are only applied once at the end, so compare over
//! an interval where none of them is active.

use differential_equations::methods::ExplicitRungeKutta;
use differential_equations::ode::{ODE, ODEProblem};
use nalgebra::{DVector, SVector};

use crate::models::DerivativeModel;
use crate::solvers::{SolverError, SolverResult};

/// Number of state entries the reference solver can carry.
pub const CAPACITY: usize = 4;

/// ODE wrapper around a derivative model, padded to [`CAPACITY`].
struct ModelODE<'a> {
    model: &'a dyn DerivativeModel,
    len: usize,
}

impl ODE<f64, SVector<f64, CAPACITY>> for ModelODE<'_> {
    fn diff(&self, _t: f64, y: &SVector<f64, CAPACITY>, dydt: &mut SVector<f64, CAPACITY>) {
        let values = DVector::from_iterator(self.len, y.iter().take(self.len).copied());
        let derivative = self.model.derivative(&values);
        for i in 0..self.len {
            dydt[i] = derivative[i];
        }
    }
}

/// Integrates `model` from its initial values over `duration` seconds.
///
/// Returns the final values after `post_step`.
pub fn solve(model: &dyn DerivativeModel, duration: f64) -> SolverResult<DVector<f64>> {
    if !duration.is_finite() || duration < 0.0 {
        return Err(SolverError::InvalidTimeStep(duration));
    }

    let initial = model.initial_values();
    let len = initial.len();
    if len > CAPACITY {
        return Err(SolverError::TooManyDifferentialVariables(len, CAPACITY));
    }

    let mut y0 = SVector::<f64, CAPACITY>::zeros();
    for (i, value) in initial.iter().enumerate() {
        y0[i] = *value;
    }

    let ode = ModelODE { model, len };
    let problem = ODEProblem::new(ode, 0.0, duration, y0);
    let mut solver = ExplicitRungeKutta::dopri5().rtol(1e-8).atol(1e-10);

    match problem.solve(&mut solver) {
        Ok(sol) => {
            let last = &sol.y[sol.y.len() - 1];
            let mut values = DVector::from_iterator(len, last.iter().take(len).copied());
            model.post_step(&mut values);
            Ok(values)
        }
        Err(e) => Err(SolverError::ODESolverFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Model, ViscousFall};
    use crate::solvers::integration::Integrator;

    #[test]
    fn test_reference_matches_closed_form_asymptote() {
        let fall = ViscousFall::new(0.002, 7800.0, 1260.0, 1.41, 0.5).unwrap();
        let values = solve(&fall, 0.2).unwrap();
        let terminal = fall.terminal_velocity();
        assert!(((values[0] - terminal) / terminal).abs() < 1e-6);
    }

    #[test]
    fn test_euler_tracks_reference() {
        let fall = ViscousFall::new(0.002, 7800.0, 1260.0, 1.41, 0.5).unwrap();
        let reference = solve(&fall, 0.5).unwrap();

        let model = Model::ViscousFall(fall);
        let mut state = model.initial_state();
        let integrator = Integrator::new();
        for _ in 0..30 {
            integrator.advance(&model, &mut state, 1.0 / 60.0).unwrap();
        }

        let v = state.get("velocity").unwrap();
        let depth = state.get("depth").unwrap();
        assert!(((v - reference[0]) / reference[0]).abs() < 0.01);
        assert!(((depth - reference[1]) / reference[1]).abs() < 0.01);
    }

    #[test]
    fn test_rejects_negative_duration() {
        let fall = ViscousFall::default();
        assert!(matches!(solve(&fall, -1.0), Err(SolverError::InvalidTimeStep(_))));
    }
}
