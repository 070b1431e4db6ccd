//! Built-in experiments.
//!
//! An [`ExperimentDefinition`] ties a model to what the learner can do with
//! it: the inputs they may set, the guards gating each phase, the questions
//! they answer and the feedback they read. Definitions are static; the
//! [`Catalog`] pairs each with its model constants, which configuration may
//! override.
//!
//! | id | model | asks for |
//! |---|---|---|
//! | `stokes` | viscous fall | terminal velocity |
//! | `projectile` | horizontal launch | landing distance, hit or miss |
//! | `incline` | inclined plane | acceleration, travel time |
//! | `titration` | acid-base titration | reagents, indicator, product, equivalence volume |
//! | `calorimetry` | ice in warm water | final temperature |
//! | `ohms_law` | ideal circuit | current |
//! | `emf` | source with internal resistance | current, terminal voltage |
//! | `transformer` | ideal transformer | output voltage, step-up or step-down |
//! | `denaturation` | enzyme activity | efficiency, denatured or active |
//! | `density` | water displacement | density, material |
//! | `diffraction` | grating | first order offset, color |
//! | `ion_recognition` | hydroxide test | cation |
//! | `measurement` | ruler | length |
//! | `phase_change` | water at a set temperature | state of matter, boiling point |
//! | `solution_preparation` | salt solution | salt and water masses, concentration |
//! | `substance_properties` | object under a tool | observed response, tested property |
//! | `food_analysis` | reagent in a food extract | reaction, nutrient found |

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{ConfigError, ConfigResult};
use crate::machine::{EdgeGuard, GuardContext, Phase};
use crate::mapper::spectral_color;
use crate::mapper::Matter;
use crate::models::{
    Buoyancy, Calorimetry, Circuit, Denaturation, Diffraction, Domain, FoodAnalysis, Incline,
    IonTest, Model, PhaseChange, Projectile, Ruler, SolutionPreparation, SubstanceTest, Titration,
    Tool, Transformer, ViscousFall,
};
use crate::scoring::{
    check_choice, check_condition, check_numeric, Answer, CheckResult, Points, Tolerance,
};
use crate::selection::{
    find_input, Binding, ChoiceOption, Constant, InputKind, InputSpec, SelectionResult,
    UserSelection,
};
use crate::SimulationState;

/// Texts shown after an answer is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feedback {
    pub correct: &'static str,
    pub incorrect: &'static str,
}

/// Feedback for experiments without their own texts.
pub const GENERIC_FEEDBACK: Feedback =
    Feedback { correct: "Correct!", incorrect: "Not quite. Check your measurement and try again." };

/// What the questions of a run are checked against: the measurement
/// snapshot and the selection at the time it was taken.
#[derive(Debug, Clone, Copy)]
pub struct Evidence<'a> {
    pub model: &'a Model,
    pub state: &'a SimulationState,
    pub selection: &'a UserSelection,
}

impl Evidence<'_> {
    /// Value of a state variable, NaN if the model has no such variable.
    pub fn reading(&self, name: &str) -> f64 {
        self.state.get(name).unwrap_or(f64::NAN)
    }
}

/// Expected answer of a question.
#[derive(Debug, Clone, Copy)]
pub enum Expected {
    /// A variable of the measured state
    Reading { variable: &'static str, tolerance: Tolerance },
    /// A quantity computed from the measurement
    Derived {
        compute: fn(&Evidence) -> f64,
        tolerance: Tolerance,
        /// Widens the band to the propagated reading uncertainty when larger
        uncertainty: Option<fn(&Evidence) -> f64>,
    },
    /// A fixed correct option
    Choice { correct: &'static str },
    /// An option decided by the model (hit or miss, step-up or step-down)
    Verdict { judge: fn(&Evidence) -> &'static str },
    /// Judged on the learner's selection; the submitted answer is ignored
    Selection { check: fn(&UserSelection) -> bool },
}

/// A question the learner answers after measuring.
#[derive(Debug, Clone, Copy)]
pub struct Question {
    pub id: &'static str,
    pub label: &'static str,
    pub expected: Expected,
    pub points: Points,
}

impl Question {
    /// Checks an answer. An answer of the wrong kind is simply wrong.
    pub fn check(&self, evidence: &Evidence, answer: &Answer) -> CheckResult {
        match (self.expected, answer) {
            (Expected::Reading { variable, tolerance }, Answer::Numeric(x)) => {
                check_numeric(*x, evidence.reading(variable), tolerance, self.points)
            }
            (Expected::Derived { compute, tolerance, uncertainty }, Answer::Numeric(x)) => {
                let actual = compute(evidence);
                let tolerance = match uncertainty.map(|spread| spread(evidence)) {
                    Some(spread) if spread > tolerance.band(actual) => Tolerance::Absolute(spread),
                    _ => tolerance,
                };
                check_numeric(*x, actual, tolerance, self.points)
            }
            (Expected::Choice { correct }, Answer::Choice(chosen)) => {
                check_choice(chosen, correct, self.points)
            }
            (Expected::Verdict { judge }, Answer::Choice(chosen)) => {
                check_choice(chosen, judge(evidence), self.points)
            }
            (Expected::Selection { check }, _) => {
                check_condition(check(evidence.selection), self.points)
            }
            _ => check_condition(false, self.points),
        }
    }
}

/// Static description of one experiment.
#[derive(Debug, Clone, Copy)]
pub struct ExperimentDefinition {
    pub id: &'static str,
    pub title: &'static str,
    pub domain: Domain,
    /// Builds the model with its default constants
    pub model: fn() -> Model,
    pub inputs: &'static [InputSpec],
    pub guards: &'static [EdgeGuard],
    pub questions: &'static [Question],
    pub feedback: Feedback,
}

impl ExperimentDefinition {
    pub fn input(&self, key: &str) -> SelectionResult<&'static InputSpec> {
        find_input(self.inputs, key)
    }

    pub fn question(&self, id: &str) -> Option<&'static Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// Looks up a built-in definition.
pub fn find(id: &str) -> Option<&'static ExperimentDefinition> {
    EXPERIMENTS.iter().find(|d| d.id == id)
}

/// Definitions together with their (possibly overridden) model constants.
#[derive(Debug, Clone)]
pub struct Catalog {
    models: BTreeMap<&'static str, Model>,
}

impl Catalog {
    /// All built-in experiments with their default constants.
    pub fn builtin() -> Self {
        Catalog { models: EXPERIMENTS.iter().map(|d| (d.id, (d.model)())).collect() }
    }

    /// Built-in experiments with constants replaced per experiment id.
    ///
    /// Every override is validated; one bad constant rejects the catalog.
    pub fn with_overrides(overrides: &BTreeMap<String, Map<String, Value>>) -> ConfigResult<Self> {
        let mut catalog = Self::builtin();
        for (id, constants) in overrides {
            let model = catalog
                .models
                .get_mut(id.as_str())
                .ok_or_else(|| ConfigError::UnknownExperiment(id.clone()))?;
            *model = model.with_constants(constants)?;
            debug!(experiment = %id, constants = constants.len(), "constants overridden");
        }
        Ok(catalog)
    }

    pub fn definition(&self, id: &str) -> Option<&'static ExperimentDefinition> {
        find(id).filter(|d| self.models.contains_key(d.id))
    }

    /// Model constants of an experiment before any learner input.
    pub fn model(&self, id: &str) -> Option<&Model> {
        self.models.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.models.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// Guards shared by several experiments

fn finished(ctx: &GuardContext) -> bool {
    ctx.live().is_some_and(|(model, state)| model.is_finished(state))
}

fn chosen(selection: &UserSelection, key: &str) -> bool {
    selection.choice(key).is_some()
}

const FINISHED: EdgeGuard = EdgeGuard {
    from: Phase::Running,
    description: "wait until the experiment has run its course",
    check: finished,
};

// Stokes

static LIQUIDS: [ChoiceOption; 3] = [
    ChoiceOption {
        id: "water",
        label: "Water",
        constants: &[
            ("fluid_density", Constant::Number(1000.0)),
            ("fluid_viscosity", Constant::Number(0.001)),
        ],
    },
    ChoiceOption {
        id: "oil",
        label: "Vegetable oil",
        constants: &[
            ("fluid_density", Constant::Number(920.0)),
            ("fluid_viscosity", Constant::Number(0.065)),
        ],
    },
    ChoiceOption {
        id: "glycerin",
        label: "Glycerin",
        constants: &[
            ("fluid_density", Constant::Number(1260.0)),
            ("fluid_viscosity", Constant::Number(1.41)),
        ],
    },
];

static STOKES_INPUTS: [InputSpec; 2] = [
    InputSpec {
        key: "liquid",
        label: "Liquid",
        kind: InputKind::Choice { options: &LIQUIDS },
        binding: Binding::Unbound,
    },
    InputSpec {
        key: "radius",
        label: "Ball radius (mm)",
        kind: InputKind::Range { min: 1.0, max: 5.0 },
        binding: Binding::Scaled { constant: "ball_radius", factor: 0.001 },
    },
];

fn ball_settled(ctx: &GuardContext) -> bool {
    let Some((model, state)) = ctx.live() else {
        return false;
    };
    if model.is_finished(state) {
        return true;
    }
    match model {
        Model::ViscousFall(m) => {
            state.get("velocity").is_some_and(|v| v >= 0.99 * m.terminal_velocity())
        }
        _ => false,
    }
}

fn liquid_chosen(ctx: &GuardContext) -> bool {
    chosen(ctx.selection, "liquid")
}

fn terminal_velocity(e: &Evidence) -> f64 {
    match e.model {
        Model::ViscousFall(m) => m.terminal_velocity(),
        _ => f64::NAN,
    }
}

static STOKES_GUARDS: [EdgeGuard; 2] = [
    EdgeGuard { from: Phase::Setup, description: "choose a liquid", check: liquid_chosen },
    EdgeGuard {
        from: Phase::Running,
        description: "wait for the ball to reach terminal velocity",
        check: ball_settled,
    },
];

static STOKES_QUESTIONS: [Question; 1] = [Question {
    id: "terminal_velocity",
    label: "Terminal velocity (m/s)",
    expected: Expected::Derived {
        compute: terminal_velocity,
        tolerance: Tolerance::Relative(0.05),
        uncertainty: None,
    },
    points: Points::Scaled { max: 100 },
}];

// Projectile

static PROJECTILE_INPUTS: [InputSpec; 2] = [
    InputSpec {
        key: "height",
        label: "Launch height (m)",
        kind: InputKind::Range { min: 5.0, max: 50.0 },
        binding: Binding::Constant("height"),
    },
    InputSpec {
        key: "velocity",
        label: "Launch speed (m/s)",
        kind: InputKind::Range { min: 1.0, max: 30.0 },
        binding: Binding::Constant("launch_speed"),
    },
];

fn projectile_outcome(e: &Evidence) -> &'static str {
    match e.model {
        Model::Projectile(m) if m.is_hit() => "hit",
        _ => "miss",
    }
}

static PROJECTILE_GUARDS: [EdgeGuard; 1] = [FINISHED];

static PROJECTILE_QUESTIONS: [Question; 2] = [
    Question {
        id: "distance",
        label: "Landing distance (m)",
        expected: Expected::Reading { variable: "x", tolerance: Tolerance::Absolute(0.5) },
        points: Points::Scaled { max: 50 },
    },
    Question {
        id: "outcome",
        label: "Did it hit the target?",
        expected: Expected::Verdict { judge: projectile_outcome },
        points: Points::Fixed(50),
    },
];

// Incline

static INCLINE_INPUTS: [InputSpec; 1] = [InputSpec {
    key: "height",
    label: "Ramp height (cm)",
    kind: InputKind::Range { min: 5.0, max: 100.0 },
    binding: Binding::Constant("height"),
}];

fn incline_acceleration(e: &Evidence) -> f64 {
    match e.model {
        Model::Incline(m) => m.acceleration(),
        _ => f64::NAN,
    }
}

fn incline_time(e: &Evidence) -> f64 {
    match e.model {
        Model::Incline(m) => m.travel_time(),
        _ => f64::NAN,
    }
}

static INCLINE_GUARDS: [EdgeGuard; 1] = [FINISHED];

static INCLINE_QUESTIONS: [Question; 2] = [
    Question {
        id: "acceleration",
        label: "Acceleration (cm/s^2)",
        expected: Expected::Derived {
            compute: incline_acceleration,
            tolerance: Tolerance::Relative(0.05),
            uncertainty: None,
        },
        points: Points::Scaled { max: 50 },
    },
    Question {
        id: "time",
        label: "Travel time (s)",
        expected: Expected::Derived {
            compute: incline_time,
            tolerance: Tolerance::Relative(0.05),
            uncertainty: None,
        },
        points: Points::Scaled { max: 50 },
    },
];

// Titration

static ACIDS: [ChoiceOption; 2] = [
    ChoiceOption {
        id: "hcl",
        label: "Hydrochloric acid",
        constants: &[("acid_protons", Constant::Number(1.0))],
    },
    ChoiceOption {
        id: "h2so4",
        label: "Sulfuric acid",
        constants: &[("acid_protons", Constant::Number(2.0))],
    },
];

static BASES: [ChoiceOption; 2] = [
    ChoiceOption { id: "naoh", label: "Sodium hydroxide", constants: &[] },
    ChoiceOption { id: "koh", label: "Potassium hydroxide", constants: &[] },
];

static INDICATORS: [ChoiceOption; 2] = [
    ChoiceOption {
        id: "litmus",
        label: "Litmus",
        constants: &[("indicator", Constant::Text("litmus"))],
    },
    ChoiceOption {
        id: "phenolphthalein",
        label: "Phenolphthalein",
        constants: &[("indicator", Constant::Text("phenolphthalein"))],
    },
];

static TITRATION_INPUTS: [InputSpec; 3] = [
    InputSpec {
        key: "acid",
        label: "Acid",
        kind: InputKind::Choice { options: &ACIDS },
        binding: Binding::Unbound,
    },
    InputSpec {
        key: "base",
        label: "Base",
        kind: InputKind::Choice { options: &BASES },
        binding: Binding::Unbound,
    },
    InputSpec {
        key: "indicator",
        label: "Indicator",
        kind: InputKind::Choice { options: &INDICATORS },
        binding: Binding::Unbound,
    },
];

/// Fraction of the equivalence volume where reading the burette starts to
/// make sense.
const WINDOW_START: f64 = 0.9;
/// Beyond this fraction the endpoint has been overshot.
const WINDOW_END: f64 = 1.2;

fn in_measurable_window(ctx: &GuardContext) -> bool {
    match ctx.live() {
        Some((Model::Titration(m), state)) => {
            let volume = state.get("volume_added").unwrap_or(0.0);
            let equivalence = m.equivalence_volume();
            volume >= WINDOW_START * equivalence && volume <= WINDOW_END * equivalence
        }
        _ => false,
    }
}

fn hcl_and_naoh(selection: &UserSelection) -> bool {
    selection.is("acid", "hcl") && selection.is("base", "naoh")
}

fn reagents_chosen(ctx: &GuardContext) -> bool {
    chosen(ctx.selection, "acid") && chosen(ctx.selection, "base")
}

fn indicator_added(ctx: &GuardContext) -> bool {
    indicator_used(ctx.selection)
}

fn indicator_used(selection: &UserSelection) -> bool {
    chosen(selection, "indicator")
}

fn reaction_product(e: &Evidence) -> &'static str {
    let sulfuric = e.selection.is("acid", "h2so4");
    let potassium = e.selection.is("base", "koh");
    match (sulfuric, potassium) {
        (false, false) => "nacl_h2o",
        (false, true) => "kcl_h2o",
        (true, false) => "na2so4_h2o",
        (true, true) => "k2so4_h2o",
    }
}

fn equivalence_volume(e: &Evidence) -> f64 {
    match e.model {
        Model::Titration(m) => m.equivalence_volume(),
        _ => f64::NAN,
    }
}

static TITRATION_GUARDS: [EdgeGuard; 3] = [
    EdgeGuard {
        from: Phase::Setup,
        description: "choose an acid and a base",
        check: reagents_chosen,
    },
    EdgeGuard { from: Phase::Configuring, description: "add an indicator", check: indicator_added },
    EdgeGuard {
        from: Phase::Running,
        description: "stop the burette close to the equivalence point",
        check: in_measurable_window,
    },
];

static TITRATION_QUESTIONS: [Question; 4] = [
    Question {
        id: "reagents",
        label: "Neutralize hydrochloric acid with sodium hydroxide",
        expected: Expected::Selection { check: hcl_and_naoh },
        points: Points::Fixed(50),
    },
    Question {
        id: "indicator",
        label: "Use an indicator",
        expected: Expected::Selection { check: indicator_used },
        points: Points::Fixed(30),
    },
    Question {
        id: "product",
        label: "Products of the reaction",
        expected: Expected::Verdict { judge: reaction_product },
        points: Points::Fixed(20),
    },
    Question {
        id: "equivalence_volume",
        label: "Volume of base at the equivalence point (mL)",
        expected: Expected::Derived {
            compute: equivalence_volume,
            tolerance: Tolerance::Absolute(1.0),
            uncertainty: None,
        },
        points: Points::Scaled { max: 20 },
    },
];

// Calorimetry

static CALORIMETRY_INPUTS: [InputSpec; 2] = [
    InputSpec {
        key: "ice_cubes",
        label: "Ice cubes (10 g each)",
        kind: InputKind::Counter { max: 10 },
        binding: Binding::Scaled { constant: "ice_mass", factor: 0.01 },
    },
    InputSpec {
        key: "water_temperature",
        label: "Water temperature (C)",
        kind: InputKind::Range { min: 20.0, max: 90.0 },
        binding: Binding::Constant("water_temperature"),
    },
];

fn ice_added(ctx: &GuardContext) -> bool {
    ctx.selection.number("ice_cubes").is_some_and(|n| n >= 1.0)
}

fn final_temperature(e: &Evidence) -> f64 {
    match e.model {
        Model::Calorimetry(m) => m.equilibrium_temperature(),
        _ => f64::NAN,
    }
}

static CALORIMETRY_GUARDS: [EdgeGuard; 2] = [
    EdgeGuard {
        from: Phase::Configuring,
        description: "drop at least one ice cube",
        check: ice_added,
    },
    FINISHED,
];

static CALORIMETRY_QUESTIONS: [Question; 1] = [Question {
    id: "final_temperature",
    label: "Final temperature (C)",
    expected: Expected::Derived {
        compute: final_temperature,
        tolerance: Tolerance::Absolute(1.0),
        uncertainty: None,
    },
    points: Points::Scaled { max: 100 },
}];

// Circuits

static OHM_INPUTS: [InputSpec; 2] = [
    InputSpec {
        key: "voltage",
        label: "Voltage (V)",
        kind: InputKind::Range { min: 1.0, max: 12.0 },
        binding: Binding::Constant("emf"),
    },
    InputSpec {
        key: "resistance",
        label: "Resistance (Ohm)",
        kind: InputKind::Range { min: 1.0, max: 100.0 },
        binding: Binding::Constant("resistance"),
    },
];

static OHM_QUESTIONS: [Question; 1] = [Question {
    id: "current",
    label: "Current (A)",
    expected: Expected::Reading { variable: "current", tolerance: Tolerance::Relative(0.02) },
    points: Points::Scaled { max: 100 },
}];

static EMF_INPUTS: [InputSpec; 1] = [InputSpec {
    key: "resistance",
    label: "Load resistance (Ohm)",
    kind: InputKind::Range { min: 1.0, max: 50.0 },
    binding: Binding::Constant("resistance"),
}];

static EMF_QUESTIONS: [Question; 2] = [
    Question {
        id: "current",
        label: "Current (A)",
        expected: Expected::Reading { variable: "current", tolerance: Tolerance::Relative(0.02) },
        points: Points::Scaled { max: 50 },
    },
    Question {
        id: "terminal_voltage",
        label: "Terminal voltage (V)",
        expected: Expected::Reading {
            variable: "terminal_voltage",
            tolerance: Tolerance::Relative(0.02),
        },
        points: Points::Scaled { max: 50 },
    },
];

// Transformer

static TRANSFORMER_INPUTS: [InputSpec; 2] = [
    InputSpec {
        key: "primary_turns",
        label: "Primary turns",
        kind: InputKind::Range { min: 100.0, max: 2000.0 },
        binding: Binding::Constant("primary_turns"),
    },
    InputSpec {
        key: "secondary_turns",
        label: "Secondary turns",
        kind: InputKind::Range { min: 100.0, max: 2000.0 },
        binding: Binding::Constant("secondary_turns"),
    },
];

fn transformer_kind(e: &Evidence) -> &'static str {
    match e.model {
        Model::Transformer(m) if m.is_step_up() => "step_up",
        Model::Transformer(m) if m.secondary_turns < m.primary_turns => "step_down",
        _ => "isolation",
    }
}

static TRANSFORMER_QUESTIONS: [Question; 2] = [
    Question {
        id: "secondary_voltage",
        label: "Output voltage (V)",
        expected: Expected::Reading {
            variable: "secondary_voltage",
            tolerance: Tolerance::Relative(0.02),
        },
        points: Points::Scaled { max: 50 },
    },
    Question {
        id: "kind",
        label: "Step-up or step-down?",
        expected: Expected::Verdict { judge: transformer_kind },
        points: Points::Fixed(50),
    },
];

// Denaturation

static DENATURATION_INPUTS: [InputSpec; 2] = [
    InputSpec {
        key: "temperature",
        label: "Temperature (C)",
        kind: InputKind::Range { min: 0.0, max: 100.0 },
        binding: Binding::Constant("temperature"),
    },
    InputSpec {
        key: "ph",
        label: "pH",
        kind: InputKind::Range { min: 0.0, max: 14.0 },
        binding: Binding::Constant("ph"),
    },
];

fn protein_state(e: &Evidence) -> &'static str {
    match e.model {
        Model::Denaturation(m) if m.is_denatured(m.temperature, m.ph) => "denatured",
        _ => "active",
    }
}

static DENATURATION_QUESTIONS: [Question; 2] = [
    Question {
        id: "efficiency",
        label: "Enzyme efficiency (%)",
        expected: Expected::Reading { variable: "efficiency", tolerance: Tolerance::Absolute(5.0) },
        points: Points::Scaled { max: 50 },
    },
    Question {
        id: "state",
        label: "Is the protein denatured?",
        expected: Expected::Verdict { judge: protein_state },
        points: Points::Fixed(50),
    },
];

// Density

static SPECIMENS: [ChoiceOption; 4] = [
    ChoiceOption {
        id: "gold",
        label: "Gold",
        constants: &[("mass", Constant::Number(193.0)), ("density", Constant::Number(19.3))],
    },
    ChoiceOption {
        id: "iron",
        label: "Iron",
        constants: &[("mass", Constant::Number(78.0)), ("density", Constant::Number(7.8))],
    },
    ChoiceOption {
        id: "aluminium",
        label: "Aluminium",
        constants: &[("mass", Constant::Number(27.0)), ("density", Constant::Number(2.7))],
    },
    ChoiceOption {
        id: "mystery",
        label: "Unknown metal",
        constants: &[("mass", Constant::Number(89.0)), ("density", Constant::Number(8.9))],
    },
];

static DENSITY_INPUTS: [InputSpec; 1] = [InputSpec {
    key: "specimen",
    label: "Specimen",
    kind: InputKind::Choice { options: &SPECIMENS },
    binding: Binding::Unbound,
}];

/// Reference densities (g/cm^3) for identifying a specimen.
const MATERIALS: [(&str, f64); 4] =
    [("gold", 19.3), ("iron", 7.8), ("aluminium", 2.7), ("copper", 8.9)];

/// Balance resolution (g).
#[cfg(feature = "autodiff")]
const MASS_READING: f64 = 0.1;
/// Half a division of the measuring cylinder (mL).
#[cfg(feature = "autodiff")]
const VOLUME_READING: f64 = 0.5;

fn displaced_volume(e: &Evidence) -> f64 {
    match e.model {
        Model::Buoyancy(m) => e.reading("water_level") - m.initial_level,
        _ => f64::NAN,
    }
}

fn measured_density(e: &Evidence) -> f64 {
    match e.model {
        Model::Buoyancy(m) => m.mass / displaced_volume(e),
        _ => f64::NAN,
    }
}

#[cfg(feature = "autodiff")]
fn density_spread(e: &Evidence) -> f64 {
    match e.model {
        Model::Buoyancy(m) => crate::autodiff::density_uncertainty(
            m.mass,
            displaced_volume(e),
            MASS_READING,
            VOLUME_READING,
        ),
        _ => 0.0,
    }
}

#[cfg(feature = "autodiff")]
const DENSITY_SPREAD: Option<fn(&Evidence) -> f64> = Some(density_spread);
#[cfg(not(feature = "autodiff"))]
const DENSITY_SPREAD: Option<fn(&Evidence) -> f64> = None;

fn specimen_chosen(ctx: &GuardContext) -> bool {
    chosen(ctx.selection, "specimen")
}

fn material(e: &Evidence) -> &'static str {
    let density = measured_density(e);
    MATERIALS
        .iter()
        .min_by(|a, b| (a.1 - density).abs().total_cmp(&(b.1 - density).abs()))
        .map(|(name, _)| *name)
        .unwrap_or("unknown")
}

static DENSITY_GUARDS: [EdgeGuard; 1] =
    [EdgeGuard { from: Phase::Setup, description: "pick a specimen", check: specimen_chosen }];

static DENSITY_QUESTIONS: [Question; 2] = [
    Question {
        id: "density",
        label: "Density (g/cm^3)",
        expected: Expected::Derived {
            compute: measured_density,
            tolerance: Tolerance::Absolute(0.5),
            uncertainty: DENSITY_SPREAD,
        },
        points: Points::Scaled { max: 70 },
    },
    Question {
        id: "material",
        label: "What is it made of?",
        expected: Expected::Verdict { judge: material },
        points: Points::Fixed(30),
    },
];

// Diffraction

static DIFFRACTION_INPUTS: [InputSpec; 2] = [
    InputSpec {
        key: "wavelength",
        label: "Wavelength (nm)",
        kind: InputKind::Range { min: 400.0, max: 700.0 },
        binding: Binding::Constant("wavelength"),
    },
    InputSpec {
        key: "distance",
        label: "Screen distance (m)",
        kind: InputKind::Range { min: 0.5, max: 3.0 },
        binding: Binding::Constant("screen_distance"),
    },
];

fn laser_color(e: &Evidence) -> &'static str {
    match e.model {
        Model::Diffraction(m) => spectral_color(m.wavelength).name(),
        _ => "unknown",
    }
}

static DIFFRACTION_QUESTIONS: [Question; 2] = [
    Question {
        id: "offset",
        label: "First order offset (m)",
        expected: Expected::Reading { variable: "offset", tolerance: Tolerance::Relative(0.05) },
        points: Points::Scaled { max: 50 },
    },
    Question {
        id: "color",
        label: "Color of the laser",
        expected: Expected::Verdict { judge: laser_color },
        points: Points::Fixed(50),
    },
];

// Ion recognition

static TUBES: [ChoiceOption; 2] = [
    ChoiceOption {
        id: "tube_a",
        label: "Tube A",
        constants: &[("cation", Constant::Text("copper"))],
    },
    ChoiceOption {
        id: "tube_b",
        label: "Tube B",
        constants: &[("cation", Constant::Text("zinc"))],
    },
];

static ION_INPUTS: [InputSpec; 1] = [InputSpec {
    key: "tube",
    label: "Test tube",
    kind: InputKind::Choice { options: &TUBES },
    binding: Binding::Unbound,
}];

/// Drops after which both cations have shown their behaviour.
const TELLING_DROPS: f64 = 3.0;

fn tube_chosen(ctx: &GuardContext) -> bool {
    chosen(ctx.selection, "tube")
}

fn enough_drops(ctx: &GuardContext) -> bool {
    ctx.live().is_some_and(|(model, state)| {
        model.is_finished(state) || state.get("drops").is_some_and(|d| d >= TELLING_DROPS)
    })
}

fn cation(e: &Evidence) -> &'static str {
    match e.model {
        Model::IonTest(m) => match m.cation {
            crate::models::Cation::Copper => "copper",
            crate::models::Cation::Zinc => "zinc",
        },
        _ => "unknown",
    }
}

static ION_GUARDS: [EdgeGuard; 2] = [
    EdgeGuard { from: Phase::Setup, description: "pick a test tube", check: tube_chosen },
    EdgeGuard {
        from: Phase::Running,
        description: "add at least three drops",
        check: enough_drops,
    },
];

static ION_QUESTIONS: [Question; 1] = [Question {
    id: "ion",
    label: "Which cation is in the tube?",
    expected: Expected::Verdict { judge: cation },
    points: Points::Fixed(100),
}];

// Measurement

static MEASUREMENT_QUESTIONS: [Question; 1] = [Question {
    id: "length",
    label: "Length (cm)",
    expected: Expected::Reading { variable: "length", tolerance: Tolerance::Absolute(0.2) },
    points: Points::Fixed(100),
}];

// Phase change

static PHASE_CHANGE_INPUTS: [InputSpec; 1] = [InputSpec {
    key: "temperature",
    label: "Temperature (C)",
    kind: InputKind::Range { min: -50.0, max: 150.0 },
    binding: Binding::Constant("temperature"),
}];

fn state_of_matter(e: &Evidence) -> &'static str {
    let matter = match e.model {
        Model::PhaseChange(m) => {
            Matter::between(e.reading("temperature"), m.melting_point, m.boiling_point)
        }
        _ => return "unknown",
    };
    match matter {
        Matter::Solid => "solid",
        Matter::Liquid => "liquid",
        Matter::Gas => "gas",
    }
}

fn boiling_point(e: &Evidence) -> f64 {
    match e.model {
        Model::PhaseChange(m) => m.boiling_point,
        _ => f64::NAN,
    }
}

static PHASE_CHANGE_QUESTIONS: [Question; 2] = [
    Question {
        id: "state",
        label: "Solid, liquid or gas?",
        expected: Expected::Verdict { judge: state_of_matter },
        points: Points::Fixed(60),
    },
    Question {
        id: "boiling_point",
        label: "Boiling point (C)",
        expected: Expected::Derived {
            compute: boiling_point,
            tolerance: Tolerance::Absolute(1.0),
            uncertainty: None,
        },
        points: Points::Fixed(40),
    },
];

// Solution preparation

static SOLUTION_INPUTS: [InputSpec; 2] = [
    InputSpec {
        key: "salt_mass",
        label: "Salt (g)",
        kind: InputKind::Range { min: 0.0, max: 50.0 },
        binding: Binding::Constant("salt_mass"),
    },
    InputSpec {
        key: "water_volume",
        label: "Water (mL)",
        kind: InputKind::Range { min: 0.0, max: 300.0 },
        binding: Binding::Constant("water_volume"),
    },
];

fn ingredients_measured(ctx: &GuardContext) -> bool {
    let selection = ctx.selection;
    selection.number("salt_mass").is_some() && selection.number("water_volume").is_some()
}

fn required_salt(e: &Evidence) -> f64 {
    match e.model {
        Model::SolutionPreparation(m) => m.required_salt(),
        _ => f64::NAN,
    }
}

fn required_water(e: &Evidence) -> f64 {
    match e.model {
        Model::SolutionPreparation(m) => m.required_water(),
        _ => f64::NAN,
    }
}

static SOLUTION_GUARDS: [EdgeGuard; 2] = [
    EdgeGuard {
        from: Phase::Setup,
        description: "weigh the salt and measure the water",
        check: ingredients_measured,
    },
    FINISHED,
];

static SOLUTION_QUESTIONS: [Question; 3] = [
    Question {
        id: "salt_mass",
        label: "Salt needed (g)",
        expected: Expected::Derived {
            compute: required_salt,
            tolerance: Tolerance::Absolute(0.1),
            uncertainty: None,
        },
        points: Points::Fixed(35),
    },
    Question {
        id: "water_mass",
        label: "Water needed (g)",
        expected: Expected::Derived {
            compute: required_water,
            tolerance: Tolerance::Absolute(0.5),
            uncertainty: None,
        },
        points: Points::Fixed(35),
    },
    Question {
        id: "concentration",
        label: "Concentration of your solution (%)",
        expected: Expected::Reading {
            variable: "concentration",
            tolerance: Tolerance::Absolute(0.1),
        },
        points: Points::Fixed(30),
    },
];

// Substance properties

static ITEMS: [ChoiceOption; 4] = [
    ChoiceOption {
        id: "iron_nail",
        label: "Iron nail",
        constants: &[("item", Constant::Text("iron_nail"))],
    },
    ChoiceOption {
        id: "rubber_ball",
        label: "Rubber ball",
        constants: &[("item", Constant::Text("rubber_ball"))],
    },
    ChoiceOption {
        id: "sugar_cube",
        label: "Sugar cube",
        constants: &[("item", Constant::Text("sugar_cube"))],
    },
    ChoiceOption {
        id: "wood_block",
        label: "Piece of wood",
        constants: &[("item", Constant::Text("wood_block"))],
    },
];

static TOOLS: [ChoiceOption; 3] = [
    ChoiceOption {
        id: "hammer",
        label: "Hardness (hammer)",
        constants: &[("tool", Constant::Text("hammer"))],
    },
    ChoiceOption {
        id: "water",
        label: "Solubility (water)",
        constants: &[("tool", Constant::Text("water"))],
    },
    ChoiceOption {
        id: "stretch",
        label: "Elasticity (force)",
        constants: &[("tool", Constant::Text("stretch"))],
    },
];

static SUBSTANCE_INPUTS: [InputSpec; 2] = [
    InputSpec {
        key: "item",
        label: "Object",
        kind: InputKind::Choice { options: &ITEMS },
        binding: Binding::Unbound,
    },
    InputSpec {
        key: "tool",
        label: "Test",
        kind: InputKind::Choice { options: &TOOLS },
        binding: Binding::Unbound,
    },
];

fn item_and_tool_chosen(ctx: &GuardContext) -> bool {
    chosen(ctx.selection, "item") && chosen(ctx.selection, "tool")
}

fn substance_response(e: &Evidence) -> &'static str {
    match e.model {
        Model::SubstanceTest(m) => m.response().id(),
        _ => "unknown",
    }
}

fn tested_property(e: &Evidence) -> &'static str {
    match e.model {
        Model::SubstanceTest(m) => match m.tool {
            Tool::Hammer => "hardness",
            Tool::Water => "solubility",
            Tool::Stretch => "elasticity",
        },
        _ => "unknown",
    }
}

static SUBSTANCE_GUARDS: [EdgeGuard; 2] = [
    EdgeGuard {
        from: Phase::Setup,
        description: "pick an object and a test",
        check: item_and_tool_chosen,
    },
    FINISHED,
];

static SUBSTANCE_QUESTIONS: [Question; 2] = [
    Question {
        id: "response",
        label: "What happened to the object?",
        expected: Expected::Verdict { judge: substance_response },
        points: Points::Fixed(70),
    },
    Question {
        id: "property",
        label: "Which property did you test?",
        expected: Expected::Verdict { judge: tested_property },
        points: Points::Fixed(30),
    },
];

// Food analysis

static FOODS: [ChoiceOption; 3] = [
    ChoiceOption { id: "chips", label: "Chips", constants: &[("food", Constant::Text("chips"))] },
    ChoiceOption {
        id: "egg_white",
        label: "Egg white",
        constants: &[("food", Constant::Text("egg_white"))],
    },
    ChoiceOption { id: "apple", label: "Apple", constants: &[("food", Constant::Text("apple"))] },
];

static REAGENTS: [ChoiceOption; 3] = [
    ChoiceOption {
        id: "iodine",
        label: "Iodine (starch)",
        constants: &[("reagent", Constant::Text("iodine"))],
    },
    ChoiceOption {
        id: "biuret",
        label: "Biuret (protein)",
        constants: &[("reagent", Constant::Text("biuret"))],
    },
    ChoiceOption {
        id: "paper",
        label: "Paper (fat)",
        constants: &[("reagent", Constant::Text("paper"))],
    },
];

static FOOD_INPUTS: [InputSpec; 2] = [
    InputSpec {
        key: "food",
        label: "Sample",
        kind: InputKind::Choice { options: &FOODS },
        binding: Binding::Unbound,
    },
    InputSpec {
        key: "reagent",
        label: "Reagent",
        kind: InputKind::Choice { options: &REAGENTS },
        binding: Binding::Unbound,
    },
];

fn food_and_reagent_chosen(ctx: &GuardContext) -> bool {
    chosen(ctx.selection, "food") && chosen(ctx.selection, "reagent")
}

fn food_reaction(e: &Evidence) -> &'static str {
    match e.model {
        Model::FoodAnalysis(m) if m.is_positive() => "positive",
        _ => "negative",
    }
}

fn nutrient_found(e: &Evidence) -> &'static str {
    match e.model {
        Model::FoodAnalysis(m) => m.finding().map_or("none", |n| n.id()),
        _ => "unknown",
    }
}

static FOOD_GUARDS: [EdgeGuard; 2] = [
    EdgeGuard {
        from: Phase::Setup,
        description: "pick a sample and a reagent",
        check: food_and_reagent_chosen,
    },
    FINISHED,
];

static FOOD_QUESTIONS: [Question; 2] = [
    Question {
        id: "reaction",
        label: "Did the color change?",
        expected: Expected::Verdict { judge: food_reaction },
        points: Points::Fixed(40),
    },
    Question {
        id: "nutrient",
        label: "What does the sample contain?",
        expected: Expected::Verdict { judge: nutrient_found },
        points: Points::Fixed(60),
    },
];

/// Every built-in experiment.
pub static EXPERIMENTS: [ExperimentDefinition; 17] = [
    ExperimentDefinition {
        id: "stokes",
        title: "Stokes' law",
        domain: Domain::Mechanics,
        model: || Model::ViscousFall(ViscousFall::default()),
        inputs: &STOKES_INPUTS,
        guards: &STOKES_GUARDS,
        questions: &STOKES_QUESTIONS,
        feedback: Feedback {
            correct: "Right: drag now balances the net weight, so the ball no longer speeds up.",
            incorrect: "Use v = 2r^2(rho_ball - rho_fluid)g / (9 eta).",
        },
    },
    ExperimentDefinition {
        id: "projectile",
        title: "Horizontal launch",
        domain: Domain::Mechanics,
        model: || Model::Projectile(Projectile::default()),
        inputs: &PROJECTILE_INPUTS,
        guards: &PROJECTILE_GUARDS,
        questions: &PROJECTILE_QUESTIONS,
        feedback: Feedback {
            correct: "Right: the fall time depends only on the height.",
            incorrect: "The range is v0 * sqrt(2h/g).",
        },
    },
    ExperimentDefinition {
        id: "incline",
        title: "Inclined plane",
        domain: Domain::Mechanics,
        model: || Model::Incline(Incline::default()),
        inputs: &INCLINE_INPUTS,
        guards: &INCLINE_GUARDS,
        questions: &INCLINE_QUESTIONS,
        feedback: Feedback {
            correct: "Right: a = g * h / L.",
            incorrect: "Only the component g * sin(alpha) = g * h / L drives the cart.",
        },
    },
    ExperimentDefinition {
        id: "titration",
        title: "Neutralization",
        domain: Domain::Chemistry,
        model: || Model::Titration(Titration::default()),
        inputs: &TITRATION_INPUTS,
        guards: &TITRATION_GUARDS,
        questions: &TITRATION_QUESTIONS,
        feedback: Feedback {
            correct: "Right: HCl + NaOH -> NaCl + H2O.",
            incorrect: "An acid and a base react to form a salt and water.",
        },
    },
    ExperimentDefinition {
        id: "calorimetry",
        title: "Melting ice",
        domain: Domain::Thermal,
        model: || Model::Calorimetry(Calorimetry::default()),
        inputs: &CALORIMETRY_INPUTS,
        guards: &CALORIMETRY_GUARDS,
        questions: &CALORIMETRY_QUESTIONS,
        feedback: Feedback {
            correct: "Right: heat given by the water melts the ice and warms the melt.",
            incorrect: "Balance c*m_w*(t_w - t) against lambda*m_i + c*m_i*t.",
        },
    },
    ExperimentDefinition {
        id: "ohms_law",
        title: "Ohm's law",
        domain: Domain::Electrical,
        model: || Model::Circuit(Circuit { emf: 6.0, resistance: 10.0, internal_resistance: 0.0 }),
        inputs: &OHM_INPUTS,
        guards: &[],
        questions: &OHM_QUESTIONS,
        feedback: Feedback {
            correct: "Right: I = U / R.",
            incorrect: "Current is voltage divided by resistance.",
        },
    },
    ExperimentDefinition {
        id: "emf",
        title: "Electromotive force",
        domain: Domain::Electrical,
        model: || Model::Circuit(Circuit::default()),
        inputs: &EMF_INPUTS,
        guards: &[],
        questions: &EMF_QUESTIONS,
        feedback: Feedback {
            correct: "Right: I = E / (R + r).",
            incorrect: "Do not forget the internal resistance of the source.",
        },
    },
    ExperimentDefinition {
        id: "transformer",
        title: "Transformer",
        domain: Domain::Electrical,
        model: || Model::Transformer(Transformer::default()),
        inputs: &TRANSFORMER_INPUTS,
        guards: &[],
        questions: &TRANSFORMER_QUESTIONS,
        feedback: Feedback {
            correct: "Right: U2 / U1 = N2 / N1.",
            incorrect: "Voltages scale with the number of turns.",
        },
    },
    ExperimentDefinition {
        id: "denaturation",
        title: "Protein denaturation",
        domain: Domain::Biology,
        model: || Model::Denaturation(Denaturation::default()),
        inputs: &DENATURATION_INPUTS,
        guards: &[],
        questions: &DENATURATION_QUESTIONS,
        feedback: Feedback {
            correct: "Right: enzymes work best near 37 C and neutral pH.",
            incorrect: "Heat above 55 C or extreme pH unfolds the protein.",
        },
    },
    ExperimentDefinition {
        id: "density",
        title: "Density by displacement",
        domain: Domain::Mechanics,
        model: || Model::Buoyancy(Buoyancy::default()),
        inputs: &DENSITY_INPUTS,
        guards: &DENSITY_GUARDS,
        questions: &DENSITY_QUESTIONS,
        feedback: Feedback {
            correct: "Right: density is mass over displaced volume.",
            incorrect: "Divide the mass by the rise of the water level.",
        },
    },
    ExperimentDefinition {
        id: "diffraction",
        title: "Diffraction grating",
        domain: Domain::Optics,
        model: || Model::Diffraction(Diffraction::default()),
        inputs: &DIFFRACTION_INPUTS,
        guards: &[],
        questions: &DIFFRACTION_QUESTIONS,
        feedback: Feedback {
            correct: "Right: x = lambda * L / d.",
            incorrect: "Longer wavelengths are diffracted further.",
        },
    },
    ExperimentDefinition {
        id: "ion_recognition",
        title: "Recognizing cations",
        domain: Domain::Chemistry,
        model: || Model::IonTest(IonTest::default()),
        inputs: &ION_INPUTS,
        guards: &ION_GUARDS,
        questions: &ION_QUESTIONS,
        feedback: Feedback {
            correct: "Right: Cu(OH)2 is blue, Zn(OH)2 is white and dissolves in excess.",
            incorrect: "Watch what the precipitate does as more hydroxide is added.",
        },
    },
    ExperimentDefinition {
        id: "measurement",
        title: "Measuring length",
        domain: Domain::Mechanics,
        model: || Model::Ruler(Ruler::default()),
        inputs: &[],
        guards: &[],
        questions: &MEASUREMENT_QUESTIONS,
        feedback: Feedback {
            correct: "Right: read at eye level against the scale.",
            incorrect: "Line the object up with the zero mark.",
        },
    },
    ExperimentDefinition {
        id: "phase_change",
        title: "Phase changes",
        domain: Domain::Thermal,
        model: || Model::PhaseChange(PhaseChange::default()),
        inputs: &PHASE_CHANGE_INPUTS,
        guards: &[],
        questions: &PHASE_CHANGE_QUESTIONS,
        feedback: Feedback {
            correct: "Right: water melts at 0 C and boils at 100 C.",
            incorrect: "Compare the temperature with the melting and boiling points.",
        },
    },
    ExperimentDefinition {
        id: "solution_preparation",
        title: "Preparing a solution",
        domain: Domain::Chemistry,
        model: || Model::SolutionPreparation(SolutionPreparation::default()),
        inputs: &SOLUTION_INPUTS,
        guards: &SOLUTION_GUARDS,
        questions: &SOLUTION_QUESTIONS,
        feedback: Feedback {
            correct: "Right: m(salt) = m(solution) * w, the rest is water.",
            incorrect: "200 g at 5 % needs 10 g of salt and 190 g of water.",
        },
    },
    ExperimentDefinition {
        id: "substance_properties",
        title: "Properties of substances",
        domain: Domain::Chemistry,
        model: || Model::SubstanceTest(SubstanceTest::default()),
        inputs: &SUBSTANCE_INPUTS,
        guards: &SUBSTANCE_GUARDS,
        questions: &SUBSTANCE_QUESTIONS,
        feedback: Feedback {
            correct: "Right: each material answers each test in its own way.",
            incorrect: "Watch the object closely while the test runs.",
        },
    },
    ExperimentDefinition {
        id: "food_analysis",
        title: "Nutrients in food",
        domain: Domain::Biology,
        model: || Model::FoodAnalysis(FoodAnalysis::default()),
        inputs: &FOOD_INPUTS,
        guards: &FOOD_GUARDS,
        questions: &FOOD_QUESTIONS,
        feedback: Feedback {
            correct: "Right: iodine finds starch, biuret finds protein, paper finds fat.",
            incorrect: "A reagent only changes color when its nutrient is present.",
        },
    },
];
