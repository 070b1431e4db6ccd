//! Physical and chemical models behind the lab exercises.
//!
//! Each phenomenon lives in its own file and exposes its constants as a plain
//! record. Models come in two flavours:
//!
//! - **Analytic** models ([`AnalyticModel`]) have an exact closed form
//!   `at(t)`, so stepping them can never accumulate error (projectile,
//!   inclined plane, calorimetry, circuits, bench tests, ...).
//! - **Derivative** models ([`DerivativeModel`]) expose `dState/dt` because
//!   their forces depend on the evolving state itself (viscous fall,
//!   titration, reagent dripping) and must be integrated.
//!
//! The [`Model`] enum is the tagged variant that the rest of the crate
//! consumes. It is serde-friendly, so constants can be swapped from
//! configuration without code changes:
//!
//! ```
//! use labsim::models::{Model, ViscousFall};
//! use serde_json::json;
//!
//! let water = Model::ViscousFall(ViscousFall::new(0.002, 7800.0, 1000.0, 0.001, 0.5)?);
//!
//! let overrides = json!({ "fluid_density": 1260.0, "fluid_viscosity": 1.41 });
//! let glycerin = water.with_constants(overrides.as_object().unwrap())?;
//!
//! // Invalid constants are rejected when the model is built, not later as NaN.
//! let broken = json!({ "fluid_viscosity": 0.0 });
//! assert!(water.with_constants(broken.as_object().unwrap()).is_err());
//! # let _ = glycerin;
//! # Ok::<(), labsim::ModelError>(())
//! ```
//!
//! # Creating a New Model
//!
//! 1. Define a constants struct deriving `Serialize`/`Deserialize` with a
//!    `validate()` that rejects non-physical values.
//! 2. Declare its variables as a `static [Variable; N]`.
//! 3. Implement [`StateSchema`] and one of [`AnalyticModel`] or
//!    [`DerivativeModel`].
//! 4. Add a variant to [`Model`] and wire it into the `match` arms below.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{SimulationState, Variable};

mod buoyancy;
mod calorimetry;
mod circuit;
mod denaturation;
mod diffraction;
mod food;
mod incline;
mod phase_change;
mod projectile;
mod ruler;
mod solution;
mod substance;
mod titration;
mod transformer;
mod viscous_fall;

pub use buoyancy::Buoyancy;
pub use calorimetry::Calorimetry;
pub use circuit::Circuit;
pub use denaturation::Denaturation;
pub use diffraction::Diffraction;
pub use food::{Food, FoodAnalysis, Nutrient, Reagent};
pub use incline::Incline;
pub use ion_test::{Cation, IonTest};
pub use phase_change::PhaseChange;
pub use projectile::Projectile;
pub use ruler::Ruler;
pub use solution::SolutionPreparation;
pub use substance::{Item, Response, SubstanceTest, Tool};
pub use titration::{Indicator, Titration};
pub use transformer::Transformer;
pub use viscous_fall::ViscousFall;

/// Standard gravitational acceleration (m/s^2).
pub const STANDARD_GRAVITY: f64 = 9.81;

/// Result type for model construction.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or configuring a model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// A constant is outside its physical domain
    #[error("Invalid model parameter `{name}` = {value}: {reason}")]
    InvalidModelParameter { name: &'static str, value: f64, reason: &'static str },
    /// An override names a constant the model does not have
    #[error("Unknown constant `{constant}` for {model} model")]
    UnknownConstant { model: &'static str, constant: String },
    /// Constants could not be (de)serialized
    #[error("Invalid model configuration: {0}")]
    Config(String),
}

/// Rejects zero, negative and non-finite values.
pub(crate) fn require_positive(name: &'static str, value: f64) -> ModelResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidModelParameter { name, value, reason: "must be positive" })
    }
}

/// Rejects negative and non-finite values.
pub(crate) fn require_non_negative(name: &'static str, value: f64) -> ModelResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidModelParameter { name, value, reason: "must not be negative" })
    }
}

/// Rejects values outside `[min, max]`.
pub(crate) fn require_within(
    name: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> ModelResult<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ModelError::InvalidModelParameter { name, value, reason: "out of physical range" })
    }
}

/// Scientific domain an experiment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Mechanics,
    Chemistry,
    Thermal,
    Electrical,
    Optics,
    Biology,
}

/// Variables and initial conditions shared by every model.
pub trait StateSchema {
    /// Declared variables in storage order.
    fn variables(&self) -> &'static [Variable];

    /// Values at `t = 0`.
    fn initial_values(&self) -> Vec<f64>;

    /// Whether the phenomenon has run its course (ball at the bottom,
    /// projectile landed, equilibrium reached).
    fn is_finished(&self, _values: &DVector<f64>) -> bool {
        false
    }
}

/// A model with an exact closed-form solution.
pub trait AnalyticModel: StateSchema {
    /// State values at elapsed time `t`.
    fn at(&self, t: f64) -> Vec<f64>;
}

/// A model that must be integrated numerically.
pub trait DerivativeModel: StateSchema {
    /// Time derivatives of the state. Algebraic entries are zero.
    fn derivative(&self, values: &DVector<f64>) -> DVector<f64>;

    /// Recomputes algebraic variables and applies boundary conditions after
    /// each integration step.
    fn post_step(&self, _values: &mut DVector<f64>) {}

    /// Index of the variable that settles asymptotically.
    fn tracked(&self) -> usize {
        0
    }

    /// Largest sub-step for which explicit Euler stays stable.
    fn max_stable_step(&self) -> Option<f64> {
        None
    }
}

/// How a model evolves in time.
pub enum Evolution<'a> {
    Analytic(&'a dyn AnalyticModel),
    Derivative(&'a dyn DerivativeModel),
}

/// Every supported phenomenon, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    ViscousFall(ViscousFall),
    Projectile(Projectile),
    Incline(Incline),
    Titration(Titration),
    Calorimetry(Calorimetry),
    Circuit(Circuit),
    Transformer(Transformer),
    Denaturation(Denaturation),
    Buoyancy(Buoyancy),
    Diffraction(Diffraction),
    IonTest(IonTest),
    Ruler(Ruler),
    PhaseChange(PhaseChange),
    SolutionPreparation(SolutionPreparation),
    SubstanceTest(SubstanceTest),
    FoodAnalysis(FoodAnalysis),
}

impl Model {
    /// Short model name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Model::ViscousFall(_) => "viscous_fall",
            Model::Projectile(_) => "projectile",
            Model::Incline(_) => "incline",
            Model::Titration(_) => "titration",
            Model::Calorimetry(_) => "calorimetry",
            Model::Circuit(_) => "circuit",
            Model::Transformer(_) => "transformer",
            Model::Denaturation(_) => "denaturation",
            Model::Buoyancy(_) => "buoyancy",
            Model::Diffraction(_) => "diffraction",
            Model::IonTest(_) => "ion_test",
            Model::Ruler(_) => "ruler",
            Model::PhaseChange(_) => "phase_change",
            Model::SolutionPreparation(_) => "solution_preparation",
            Model::SubstanceTest(_) => "substance_test",
            Model::FoodAnalysis(_) => "food_analysis",
        }
    }

    /// Scientific domain of the phenomenon.
    pub fn domain(&self) -> Domain {
        match self {
            Model::ViscousFall(_) | Model::Projectile(_) | Model::Incline(_) => Domain::Mechanics,
            Model::Buoyancy(_) | Model::Ruler(_) => Domain::Mechanics,
            Model::Titration(_) | Model::IonTest(_) => Domain::Chemistry,
            Model::SolutionPreparation(_) | Model::SubstanceTest(_) => Domain::Chemistry,
            Model::Calorimetry(_) | Model::PhaseChange(_) => Domain::Thermal,
            Model::Circuit(_) | Model::Transformer(_) => Domain::Electrical,
            Model::Diffraction(_) => Domain::Optics,
            Model::Denaturation(_) | Model::FoodAnalysis(_) => Domain::Biology,
        }
    }

    /// Evolution strategy of this model.
    pub fn evolution(&self) -> Evolution<'_> {
        match self {
            Model::ViscousFall(m) => Evolution::Derivative(m),
            Model::Titration(m) => Evolution::Derivative(m),
            Model::IonTest(m) => Evolution::Derivative(m),
            Model::Projectile(m) => Evolution::Analytic(m),
            Model::Incline(m) => Evolution::Analytic(m),
            Model::Calorimetry(m) => Evolution::Analytic(m),
            Model::Circuit(m) => Evolution::Analytic(m),
            Model::Transformer(m) => Evolution::Analytic(m),
            Model::Denaturation(m) => Evolution::Analytic(m),
            Model::Buoyancy(m) => Evolution::Analytic(m),
            Model::Diffraction(m) => Evolution::Analytic(m),
            Model::Ruler(m) => Evolution::Analytic(m),
            Model::PhaseChange(m) => Evolution::Analytic(m),
            Model::SolutionPreparation(m) => Evolution::Analytic(m),
            Model::SubstanceTest(m) => Evolution::Analytic(m),
            Model::FoodAnalysis(m) => Evolution::Analytic(m),
        }
    }

    fn schema(&self) -> &dyn StateSchema {
        match self {
            Model::ViscousFall(m) => m,
            Model::Projectile(m) => m,
            Model::Incline(m) => m,
            Model::Titration(m) => m,
            Model::Calorimetry(m) => m,
            Model::Circuit(m) => m,
            Model::Transformer(m) => m,
            Model::Denaturation(m) => m,
            Model::Buoyancy(m) => m,
            Model::Diffraction(m) => m,
            Model::IonTest(m) => m,
            Model::Ruler(m) => m,
            Model::PhaseChange(m) => m,
            Model::SolutionPreparation(m) => m,
            Model::SubstanceTest(m) => m,
            Model::FoodAnalysis(m) => m,
        }
    }

    /// Checks every constant against its physical domain.
    pub fn validate(&self) -> ModelResult<()> {
        match self {
            Model::ViscousFall(m) => m.validate(),
            Model::Projectile(m) => m.validate(),
            Model::Incline(m) => m.validate(),
            Model::Titration(m) => m.validate(),
            Model::Calorimetry(m) => m.validate(),
            Model::Circuit(m) => m.validate(),
            Model::Transformer(m) => m.validate(),
            Model::Denaturation(m) => m.validate(),
            Model::Buoyancy(m) => m.validate(),
            Model::Diffraction(m) => m.validate(),
            Model::IonTest(m) => m.validate(),
            Model::Ruler(m) => m.validate(),
            Model::PhaseChange(m) => m.validate(),
            Model::SolutionPreparation(m) => m.validate(),
            Model::SubstanceTest(m) => m.validate(),
            Model::FoodAnalysis(m) => m.validate(),
        }
    }

    /// Declared state variables.
    pub fn variables(&self) -> &'static [Variable] {
        self.schema().variables()
    }

    /// Fresh state at `t = 0`.
    pub fn initial_state(&self) -> SimulationState {
        let schema = self.schema();
        SimulationState::new(schema.variables(), schema.initial_values())
    }

    /// Whether the phenomenon has run its course in `state`.
    pub fn is_finished(&self, state: &SimulationState) -> bool {
        self.schema().is_finished(state.values())
    }

    /// Name of the variable used for convergence checks.
    pub fn tracked_variable(&self) -> &'static str {
        match self.evolution() {
            Evolution::Derivative(m) => m.variables()[m.tracked()].name,
            Evolution::Analytic(m) => m.variables()[0].name,
        }
    }

    /// Returns a copy with some constants replaced, validated.
    ///
    /// Constants are addressed by their field name. Unknown names are
    /// rejected rather than silently ignored.
    pub fn with_constants(&self, overrides: &Map<String, Value>) -> ModelResult<Model> {
        if overrides.is_empty() {
            return Ok(self.clone());
        }

        let mut value = serde_json::to_value(self).map_err(|e| ModelError::Config(e.to_string()))?;
        let fields = value
            .as_object_mut()
            .ok_or_else(|| ModelError::Config("model is not a record".to_string()))?;

        for (name, constant) in overrides {
            if name == "kind" || !fields.contains_key(name) {
                return Err(ModelError::UnknownConstant {
                    model: self.name(),
                    constant: name.clone(),
                });
            }
            fields.insert(name.clone(), constant.clone());
        }

        let model: Model =
            serde_json::from_value(value).map_err(|e| ModelError::Config(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }
}
