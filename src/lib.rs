//! # labsim: Simulation Kernel for Interactive Lab Exercises
//!
//! The non-visual core behind animated physics, chemistry and biology lab
//! screens. One generic kernel replaces per-screen timer loops:
//!
//! - [`models`]: closed-form or incremental physical truth per phenomenon
//! - [`solvers`]: wall-clock driven stepping (closed form or explicit Euler)
//! - [`mapper`]: continuous state to discrete visual outcomes
//! - [`machine`]: the `Idle → … → Completed` procedure with guarded edges
//! - [`scoring`]: tolerance checks, point accumulation and feedback
//! - [`session`]: the operation set a presentation layer drives
//!
//! ## Example
//!
//! ```
//! use labsim::{InputValue, Lab, Phase};
//!
//! let mut lab = Lab::new();
//! let run = lab.initialize("projectile")?;
//!
//! lab.transition(run, Phase::Setup)?;
//! lab.apply_input(run, "height", InputValue::Number(40.0))?;
//! lab.apply_input(run, "velocity", InputValue::Number(15.0))?;
//! lab.transition(run, Phase::Configuring)?;
//! lab.transition(run, Phase::Running)?;
//!
//! // One call per host animation frame
//! for _ in 0..240 {
//!     lab.advance(run, 1.0 / 60.0)?;
//! }
//!
//! lab.transition(run, Phase::Measuring)?;
//! # Ok::<(), labsim::RunError>(())
//! ```
//!
//! ## Optional Features
//!
//! - **`autodiff`**: measurement uncertainty propagation using `num-dual`
//! - **`solvers`**: adaptive reference integration using `differential-equations`

use nalgebra::DVector;

pub mod catalog;
pub mod config;
pub mod machine;
pub mod mapper;
pub mod models;
pub mod scoring;
pub mod selection;
pub mod session;
pub mod solvers;

#[cfg(feature = "autodiff")]
pub mod autodiff;

pub use catalog::{Catalog, ExperimentDefinition};
pub use config::LabConfig;
pub use machine::{Phase, PhaseMachine};
pub use mapper::{ColorToken, VisualState};
pub use models::{Domain, Model, ModelError};
pub use scoring::{Answer, ScoreRecord, Submission};
pub use selection::{InputValue, UserSelection};
pub use session::{Lab, RunError, RunHandle};
pub use solvers::integration::Integrator;

/// Role of a state variable.
///
/// Differential variables are advanced by the integrator; algebraic ones are
/// recomputed from the differential ones after every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Differential,
    Algebraic,
}

/// Declaration of one named state variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    pub name: &'static str,
    pub role: Role,
}

impl Variable {
    /// Declares a differential variable.
    pub const fn differential(name: &'static str) -> Self {
        Variable { name, role: Role::Differential }
    }

    /// Declares an algebraic variable.
    pub const fn algebraic(name: &'static str) -> Self {
        Variable { name, role: Role::Algebraic }
    }
}

/// Mutable state of one experiment run.
///
/// Holds the elapsed simulated time, the values of the model's declared
/// variables and a step counter. Time only moves forward; the only way back is
/// to build a fresh state.
///
/// # Examples
///
/// ```
/// use labsim::{SimulationState, Variable};
///
/// static VARS: [Variable; 2] =
///     [Variable::differential("velocity"), Variable::differential("depth")];
///
/// let state = SimulationState::new(&VARS, vec![0.0, 0.0]);
/// assert_eq!(state.time(), 0.0);
/// assert_eq!(state.get("depth"), Some(0.0));
/// assert_eq!(state.get("pressure"), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    time: f64,
    steps: u64,
    variables: &'static [Variable],
    values: DVector<f64>,
}

impl SimulationState {
    /// Creates a state at `t = 0` with the given initial values.
    pub fn new(variables: &'static [Variable], values: Vec<f64>) -> Self {
        assert_eq!(variables.len(), values.len(), "Value vector length mismatch");
        SimulationState { time: 0.0, steps: 0, variables, values: DVector::from_vec(values) }
    }

    /// Elapsed simulated time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of steps applied since creation.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Declared variables, in storage order.
    pub fn variables(&self) -> &'static [Variable] {
        self.variables
    }

    /// Position of a named variable.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    /// Value of a named variable.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.index_of(name).map(|i| self.values[i])
    }

    /// Value at a storage index.
    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    /// All values as a vector (for solvers).
    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.variables.iter().zip(self.values.iter()).map(|(v, &x)| (v.name, x))
    }

    /// Returns true if every value is finite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Replaces values and clock in one go.
    pub(crate) fn commit(&mut self, values: DVector<f64>, time: f64, steps: u64) {
        debug_assert_eq!(values.len(), self.values.len());
        debug_assert!(time >= self.time, "simulation time must not decrease");
        self.values = values;
        self.time = time;
        self.steps += steps;
    }
}
