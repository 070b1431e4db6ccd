//! Frame integrator.
//!
//! Converts the wall-clock time between two host frames into a state update,
//! either by evaluating a closed form or by explicit Euler sub-steps.

use nalgebra::DVector;
use tracing::{trace, warn};

use crate::models::{DerivativeModel, Evolution, Model};
use crate::solvers::{SolverError, SolverResult};
use crate::{Role, SimulationState};

/// Default upper bound for one Euler sub-step (s).
pub const DEFAULT_MAX_STEP: f64 = 0.05;

/// Default relative change under which a tracked variable counts as settled.
pub const DEFAULT_EPSILON: f64 = 0.005;

/// What one call to [`Integrator::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// Number of sub-steps taken (1 for closed-form models, 0 for `dt = 0`)
    pub sub_steps: u64,
    /// Whether the model reports the phenomenon as finished
    pub finished: bool,
}

/// Stateless stepping policy shared by all runs.
///
/// # Examples
///
/// ```
/// use labsim::Integrator;
/// use labsim::models::{Model, Projectile};
///
/// let model = Model::Projectile(Projectile::new(40.0, 15.0)?);
/// let mut state = model.initial_state();
///
/// let integrator = Integrator::new().with_max_step(0.02);
/// integrator.advance(&model, &mut state, 1.0 / 60.0)?;
///
/// assert!((state.time() - 1.0 / 60.0).abs() < 1e-12);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrator {
    /// Upper bound for one Euler sub-step (s)
    pub max_step: f64,
    /// Relative tolerance of [`Integrator::has_converged`]
    pub epsilon: f64,
}

impl Integrator {
    /// Creates an integrator with the default 50 ms sub-step and 0.5 %
    /// convergence tolerance.
    pub fn new() -> Self {
        Integrator { max_step: DEFAULT_MAX_STEP, epsilon: DEFAULT_EPSILON }
    }

    /// Sets the sub-step bound.
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    /// Sets the convergence tolerance.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Rejects a sub-step bound or tolerance that is not positive and finite.
    pub fn validate(&self) -> SolverResult<()> {
        for (name, value) in [("max_step", self.max_step), ("epsilon", self.epsilon)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SolverError::InvalidSetting { name, value });
            }
        }
        Ok(())
    }

    /// Largest sub-step used for a derivative model.
    pub fn step_bound(&self, model: &dyn DerivativeModel) -> f64 {
        match model.max_stable_step() {
            Some(stable) if stable > 0.0 => self.max_step.min(stable),
            _ => self.max_step,
        }
    }

    /// Advances `state` by `dt` seconds.
    ///
    /// `dt` must be finite and non-negative; zero is a no-op. On error the
    /// state is left exactly as it was, including when the integrator's own
    /// settings are invalid.
    pub fn advance(
        &self,
        model: &Model,
        state: &mut SimulationState,
        dt: f64,
    ) -> SolverResult<StepReport> {
        self.validate()?;
        if !dt.is_finite() || dt < 0.0 {
            return Err(SolverError::InvalidTimeStep(dt));
        }
        if dt == 0.0 {
            return Ok(StepReport { sub_steps: 0, finished: model.is_finished(state) });
        }

        match model.evolution() {
            Evolution::Analytic(m) => {
                let time = state.time() + dt;
                let values = DVector::from_vec(m.at(time));
                if let Some(i) = values.iter().position(|v| !v.is_finite()) {
                    let variable = m.variables()[i].name;
                    warn!(model = model.name(), variable, time, "closed form is not finite");
                    let step = state.steps() + 1;
                    return Err(SolverError::NumericDivergence { variable, step });
                }
                let finished = m.is_finished(&values);
                state.commit(values, time, 1);
                trace!(model = model.name(), time, "closed form evaluated");
                Ok(StepReport { sub_steps: 1, finished })
            }
            Evolution::Derivative(m) => self.euler(model.name(), m, state, dt),
        }
    }

    /// Explicit Euler over `n` equal sub-steps on a scratch copy.
    fn euler(
        &self,
        name: &'static str,
        model: &dyn DerivativeModel,
        state: &mut SimulationState,
        dt: f64,
    ) -> SolverResult<StepReport> {
        let bound = self.step_bound(model);
        let n = (dt / bound).ceil().max(1.0) as u64;
        let h = dt / n as f64;
        let variables = model.variables();

        let mut y = state.values().clone();
        let mut taken = 0;
        for k in 0..n {
            // Time keeps running, values stay put
            if model.is_finished(&y) {
                break;
            }
            let dydt = model.derivative(&y);
            for (i, variable) in variables.iter().enumerate() {
                if variable.role == Role::Differential {
                    y[i] += h * dydt[i];
                }
            }
            model.post_step(&mut y);
            taken += 1;

            if let Some(i) = y.iter().position(|v| !v.is_finite()) {
                let variable = variables[i].name;
                let step = state.steps() + k + 1;
                warn!(model = name, variable, step, "integration diverged");
                return Err(SolverError::NumericDivergence { variable, step });
            }
        }

        let finished = model.is_finished(&y);
        let time = state.time() + dt;
        state.commit(y, time, taken);
        trace!(model = name, time, sub_steps = taken, h, finished, "euler frame");
        Ok(StepReport { sub_steps: taken, finished })
    }

    /// Whether the model's tracked variable has settled between two states.
    pub fn has_converged(
        &self,
        model: &Model,
        state: &SimulationState,
        previous: &SimulationState,
    ) -> bool {
        super::has_converged(model, state, previous, self.epsilon)
    }
}

impl Default for Integrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Projectile, Titration, ViscousFall};

    fn glycerin() -> Model {
        Model::ViscousFall(ViscousFall::new(0.002, 7800.0, 1260.0, 1.41, 0.5).unwrap())
    }

    #[test]
    fn test_integrator_defaults() {
        let integrator = Integrator::default();
        assert_eq!(integrator.max_step, 0.05);
        assert_eq!(integrator.epsilon, 0.005);

        let custom = Integrator::new().with_max_step(0.01).with_epsilon(0.001);
        assert_eq!(custom.max_step, 0.01);
        assert_eq!(custom.epsilon, 0.001);
    }

    #[test]
    fn test_rejects_invalid_time_step() {
        let model = glycerin();
        let mut state = model.initial_state();
        let integrator = Integrator::new();

        for dt in [-0.1, f64::NAN, f64::INFINITY] {
            let err = integrator.advance(&model, &mut state, dt).unwrap_err();
            assert!(matches!(err, SolverError::InvalidTimeStep(_)));
        }
        assert_eq!(state, model.initial_state());
    }

    #[test]
    fn test_zero_dt_is_noop() {
        let model = glycerin();
        let mut state = model.initial_state();
        let report = Integrator::new().advance(&model, &mut state, 0.0).unwrap();
        assert_eq!(report.sub_steps, 0);
        assert_eq!(state, model.initial_state());
    }

    #[test]
    fn test_sub_steps_follow_max_step() {
        // Steel in water relaxes over seconds, so only max_step bounds the step
        let model = Model::ViscousFall(ViscousFall::default());
        let mut state = model.initial_state();
        let report = Integrator::new().advance(&model, &mut state, 0.2).unwrap();
        assert_eq!(report.sub_steps, 4);
        assert_eq!(state.steps(), 4);
        assert!((state.time() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_glycerin_sub_steps_follow_stability() {
        let model = glycerin();
        let integrator = Integrator::new();
        let bound = match model.evolution() {
            Evolution::Derivative(m) => integrator.step_bound(m),
            Evolution::Analytic(_) => unreachable!(),
        };
        assert!(bound < 0.05);

        let mut state = model.initial_state();
        let report = integrator.advance(&model, &mut state, 0.05).unwrap();
        assert_eq!(report.sub_steps, (0.05 / bound).ceil() as u64);
        let v = state.get("velocity").unwrap();
        assert!(v > 0.0 && v.is_finite());
    }

    #[test]
    fn test_glycerin_converges_to_terminal_velocity() {
        let fall = ViscousFall::new(0.002, 7800.0, 1260.0, 1.41, 0.5).unwrap();
        let terminal = fall.terminal_velocity();
        let model = Model::ViscousFall(fall);
        let integrator = Integrator::new();

        let mut state = model.initial_state();
        let mut converged_at = None;
        for frame in 0..600 {
            let previous = state.clone();
            integrator.advance(&model, &mut state, 1.0 / 60.0).unwrap();
            if integrator.has_converged(&model, &state, &previous) {
                converged_at = Some(frame);
                break;
            }
        }

        assert!(converged_at.is_some(), "never converged");
        let v = state.get("velocity").unwrap();
        assert!(((v - terminal) / terminal).abs() < 0.01, "v = {v}, terminal = {terminal}");
    }

    #[test]
    fn test_projectile_is_frame_rate_independent() {
        let p = Projectile::new(40.0, 15.0).unwrap();
        let range = p.range();
        let model = Model::Projectile(p);
        let integrator = Integrator::new();

        for dt in [1.0 / 30.0, 1.0 / 60.0, 1.0 / 144.0, 0.7] {
            let mut state = model.initial_state();
            let mut finished = false;
            while !finished {
                finished = integrator.advance(&model, &mut state, dt).unwrap().finished;
            }
            assert!((state.get("x").unwrap() - range).abs() < 1e-12);
            assert_eq!(state.get("y"), Some(0.0));
        }
    }

    #[test]
    fn test_large_frame_equals_clamped_steps() {
        let model = Model::Titration(Titration::default());
        let integrator = Integrator::new();

        let mut one_frame = model.initial_state();
        integrator.advance(&model, &mut one_frame, 5.0).unwrap();

        let mut many_frames = model.initial_state();
        for _ in 0..100 {
            integrator.advance(&model, &mut many_frames, 0.05).unwrap();
        }

        assert_eq!(one_frame.steps(), 100);
        let a = one_frame.get("volume_added").unwrap();
        let b = many_frames.get("volume_added").unwrap();
        assert!((a - 2.5).abs() < 1e-9);
        assert!((a - b).abs() < 1e-9);
        assert!((one_frame.get("ph").unwrap() - many_frames.get("ph").unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_finished_model_keeps_time_running() {
        let model = Model::ViscousFall(ViscousFall::default());
        let mut state = model.initial_state();
        let integrator = Integrator::new();

        let report = integrator.advance(&model, &mut state, 60.0).unwrap();
        assert!(report.finished);
        assert_eq!(state.get("depth"), Some(0.5));
        assert_eq!(state.get("velocity"), Some(0.0));

        let before = state.clone();
        integrator.advance(&model, &mut state, 1.0).unwrap();
        assert!((state.time() - 61.0).abs() < 1e-9);
        assert_eq!(state.values(), before.values());
    }

    #[test]
    fn test_finishing_mid_frame_counts_only_taken_steps() {
        // 0.2 mL short of a full burette at 0.5 mL/s fills in about 8 of 20 sub-steps
        let titration = Titration::default();
        let model = Model::Titration(titration.clone());
        let mut state = titration.state_with_volume(49.8);

        let report = Integrator::new().advance(&model, &mut state, 1.0).unwrap();
        assert!(report.finished);
        assert!(report.sub_steps < 20);
        assert_eq!(state.steps(), report.sub_steps);
        assert_eq!(state.get("volume_added"), Some(50.0));
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let model = Model::ViscousFall(ViscousFall::default());
        let mut state = model.initial_state();

        for integrator in [
            Integrator::new().with_max_step(0.0),
            Integrator::new().with_max_step(f64::NAN),
            Integrator::new().with_max_step(-0.05),
            Integrator::new().with_epsilon(f64::INFINITY),
        ] {
            let err = integrator.advance(&model, &mut state, 1.0 / 60.0).unwrap_err();
            assert!(matches!(err, SolverError::InvalidSetting { .. }));
        }
        assert_eq!(state, model.initial_state());
        assert!(Integrator::new().validate().is_ok());
    }

    #[test]
    fn test_divergence_leaves_state_untouched() {
        // Bypasses validation on purpose
        let broken = ViscousFall { fluid_viscosity: f64::NAN, ..ViscousFall::default() };
        let model = Model::ViscousFall(broken);
        let mut state = model.initial_state();

        let err = Integrator::new().advance(&model, &mut state, 0.1).unwrap_err();
        assert_eq!(err, SolverError::NumericDivergence { variable: "velocity", step: 1 });
        assert_eq!(state, model.initial_state());
    }
}
