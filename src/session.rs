//! Experiment runs.
//!
//! A [`Lab`] owns any number of independent runs, each addressed by a
//! [`RunHandle`]. A run carries the learner's selection, its phase machine,
//! the live model and state while `Running`, the snapshot taken on entering
//! `Measuring` and the score record. Nothing is shared between runs.
//!
//! The host drives a run with a handful of calls:
//!
//! - [`Lab::apply_input`] between frames
//! - [`Lab::transition`] when the learner moves the procedure on
//! - [`Lab::advance`] once per animation frame while `Running`
//! - [`Lab::evaluate`] for every answer
//! - [`Lab::reset`] to start over
//!
//! Recoverable errors leave the run exactly as it was.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use tracing::{debug, info, instrument, trace, warn};

use crate::catalog::{Catalog, Evidence, ExperimentDefinition};
use crate::config::{ConfigResult, LabConfig};
use crate::machine::{GuardContext, MachineError, Phase, PhaseMachine};
use crate::mapper::{self, VisualState};
use crate::models::{Model, ModelError};
use crate::scoring::{self, CheckResult, ScoreRecord, Submission};
use crate::selection::{constant_overrides, InputValue, SelectionError, UserSelection};
use crate::solvers::integration::Integrator;
use crate::solvers::SolverError;
use crate::SimulationState;

/// Result type for run operations.
pub type RunResult<T> = Result<T, RunError>;

/// Errors reported to the presentation layer.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Unknown experiment `{0}`")]
    UnknownModel(String),
    #[error("Unknown run {0}")]
    UnknownRun(RunHandle),
    #[error("Invalid selection: {0}")]
    InvalidSelection(#[from] SelectionError),
    #[error("Cannot advance in phase {phase}")]
    NotRunning { phase: Phase },
    #[error("Nothing has been measured yet")]
    NotReady,
    #[error("Run stalled after a numeric divergence; retry or reset it")]
    Stalled,
    #[error("Unknown question `{0}`")]
    UnknownQuestion(String),
    #[error("Question `{0}` has already been answered")]
    AlreadyAnswered(String),
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Opaque identifier of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunHandle(u64);

impl fmt::Display for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Model, state and selection frozen on entering `Measuring`.
#[derive(Debug, Clone)]
struct Snapshot {
    model: Model,
    state: SimulationState,
    selection: UserSelection,
}

#[derive(Debug)]
struct Run {
    definition: &'static ExperimentDefinition,
    /// Catalog constants before any learner input
    base: Model,
    machine: PhaseMachine,
    selection: UserSelection,
    model: Option<Model>,
    state: Option<SimulationState>,
    snapshot: Option<Snapshot>,
    score: ScoreRecord,
    answered: BTreeSet<&'static str>,
    last_result: Option<CheckResult>,
    /// An input changed while running; rebuild before the next step
    dirty: bool,
    stalled: bool,
}

impl Run {
    fn new(definition: &'static ExperimentDefinition, base: Model) -> Self {
        Run {
            definition,
            base,
            machine: PhaseMachine::new(definition.guards),
            selection: UserSelection::new(),
            model: None,
            state: None,
            snapshot: None,
            score: ScoreRecord::new(),
            answered: BTreeSet::new(),
            last_result: None,
            dirty: false,
            stalled: false,
        }
    }

    fn build_model(&self) -> RunResult<Model> {
        let overrides = constant_overrides(self.definition.inputs, &self.selection);
        let model = self.base.with_constants(&overrides)?;
        debug!(experiment = self.definition.id, constants = overrides.len(), "model built");
        Ok(model)
    }

    fn clear(&mut self) {
        self.machine.reset();
        self.selection.clear();
        self.model = None;
        self.state = None;
        self.snapshot = None;
        self.score.clear();
        self.answered.clear();
        self.last_result = None;
        self.dirty = false;
        self.stalled = false;
    }
}

/// Owner of all experiment runs.
///
/// # Examples
///
/// ```
/// use labsim::{Lab, Phase, Submission};
///
/// let mut lab = Lab::new();
/// let run = lab.initialize("measurement")?;
/// for phase in [Phase::Setup, Phase::Configuring, Phase::Running, Phase::Measuring] {
///     lab.transition(run, phase)?;
/// }
///
/// let score = lab.evaluate(run, &Submission::numeric("length", 12.5))?;
/// assert_eq!(score.total(), 100);
/// # Ok::<(), labsim::RunError>(())
/// ```
#[derive(Debug)]
pub struct Lab {
    catalog: Catalog,
    integrator: Integrator,
    runs: HashMap<RunHandle, Run>,
    next_id: u64,
}

impl Lab {
    /// Lab over the built-in catalog with default integration settings.
    pub fn new() -> Self {
        Lab {
            catalog: Catalog::builtin(),
            integrator: Integrator::new(),
            runs: HashMap::new(),
            next_id: 1,
        }
    }

    /// Lab configured from settings; fails on invalid settings or constants.
    pub fn with_config(config: &LabConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Lab::new().with_catalog(config.catalog()?).with_integrator(config.integrator()))
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_integrator(mut self, integrator: Integrator) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn integrator(&self) -> &Integrator {
        &self.integrator
    }

    /// Number of live runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn run(&self, handle: RunHandle) -> RunResult<&Run> {
        self.runs.get(&handle).ok_or(RunError::UnknownRun(handle))
    }

    fn run_mut(&mut self, handle: RunHandle) -> RunResult<&mut Run> {
        self.runs.get_mut(&handle).ok_or(RunError::UnknownRun(handle))
    }

    /// Creates a run of a catalog experiment, in `Idle`.
    pub fn initialize(&mut self, experiment_id: &str) -> RunResult<RunHandle> {
        let definition = self
            .catalog
            .definition(experiment_id)
            .ok_or_else(|| RunError::UnknownModel(experiment_id.to_string()))?;
        let base = self
            .catalog
            .model(experiment_id)
            .cloned()
            .ok_or_else(|| RunError::UnknownModel(experiment_id.to_string()))?;

        let handle = RunHandle(self.next_id);
        self.next_id += 1;
        self.runs.insert(handle, Run::new(definition, base));
        info!(run = %handle, experiment = definition.id, "run created");
        Ok(handle)
    }

    /// Records a learner input after checking it against its declaration.
    ///
    /// Inputs are locked once a measurement has been taken. A change while
    /// `Running` is picked up at the start of the next [`Lab::advance`].
    pub fn apply_input(
        &mut self,
        handle: RunHandle,
        key: &str,
        value: InputValue,
    ) -> RunResult<()> {
        let run = self.run_mut(handle)?;
        let spec = run.definition.input(key)?;
        if run.machine.phase().is_measured() {
            return Err(SelectionError::Locked(key.to_string()).into());
        }
        spec.validate(&value)?;

        debug!(run = %handle, key, value = ?value, "input applied");
        run.selection.set(spec.key, value);
        if run.machine.phase() == Phase::Running {
            run.dirty = true;
        }
        Ok(())
    }

    /// Moves the run to `to`. Returns the previous phase.
    ///
    /// `Idle` is always reachable and resets the run. Entering `Running`
    /// builds the model from the selection; entering `Measuring` freezes the
    /// live state for evaluation.
    pub fn transition(&mut self, handle: RunHandle, to: Phase) -> RunResult<Phase> {
        if to == Phase::Idle {
            return self.reset(handle);
        }
        let run = self.run_mut(handle)?;
        if run.stalled {
            warn!(run = %handle, %to, "transition rejected while stalled");
            return Err(RunError::Stalled);
        }

        let ctx = GuardContext {
            selection: &run.selection,
            model: run.model.as_ref(),
            state: run.state.as_ref(),
            answers: run.score.len(),
        };
        if let Err(e) = run.machine.check(to, &ctx) {
            warn!(run = %handle, error = %e, "transition rejected");
            return Err(e.into());
        }

        let live = match to {
            Phase::Running => {
                let model = run.build_model()?;
                let state = model.initial_state();
                Some((model, state))
            }
            _ => None,
        };
        let from = run.machine.transition(to, &ctx)?;

        if let Some((model, state)) = live {
            run.model = Some(model);
            run.state = Some(state);
            run.dirty = false;
            run.stalled = false;
        }
        if to == Phase::Measuring {
            if let (Some(model), Some(state)) = (&run.model, &run.state) {
                run.snapshot = Some(Snapshot {
                    model: model.clone(),
                    state: state.clone(),
                    selection: run.selection.clone(),
                });
            }
        }
        info!(run = %handle, %from, %to, "phase changed");
        Ok(from)
    }

    /// Advances the live model by `dt` seconds of wall-clock time.
    #[instrument(level = "trace", skip(self), fields(run = %handle))]
    pub fn advance(&mut self, handle: RunHandle, dt: f64) -> RunResult<VisualState> {
        let integrator = self.integrator;
        let run = self.run_mut(handle)?;
        let phase = run.machine.phase();
        if phase != Phase::Running {
            return Err(RunError::NotRunning { phase });
        }
        if run.stalled {
            return Err(RunError::Stalled);
        }
        if run.dirty {
            let model = run.build_model()?;
            run.model = Some(model);
            run.dirty = false;
        }

        let (Some(model), Some(state)) = (&run.model, &mut run.state) else {
            return Err(RunError::NotRunning { phase });
        };
        match integrator.advance(model, state, dt) {
            Ok(report) => {
                trace!(sub_steps = report.sub_steps, finished = report.finished, "advanced");
                Ok(mapper::map(model, state))
            }
            Err(e @ SolverError::NumericDivergence { .. }) => {
                warn!(run = %handle, error = %e, "run stalled");
                run.stalled = true;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Checks one answer against the measurement snapshot and records it.
    ///
    /// The first answer moves the run from `Measuring` to `Evaluating`.
    pub fn evaluate(
        &mut self,
        handle: RunHandle,
        submission: &Submission,
    ) -> RunResult<ScoreRecord> {
        let run = self.run_mut(handle)?;
        let phase = run.machine.phase();
        let Some(snapshot) = run.snapshot.as_ref() else {
            return Err(RunError::NotReady);
        };
        if !matches!(phase, Phase::Measuring | Phase::Evaluating) {
            return Err(RunError::NotReady);
        }
        let question = run
            .definition
            .question(&submission.question)
            .ok_or_else(|| RunError::UnknownQuestion(submission.question.clone()))?;
        if run.answered.contains(question.id) {
            return Err(RunError::AlreadyAnswered(question.id.to_string()));
        }

        let evidence = Evidence {
            model: &snapshot.model,
            state: &snapshot.state,
            selection: &snapshot.selection,
        };
        let result = question.check(&evidence, &submission.answer);

        if phase == Phase::Measuring {
            let ctx = GuardContext {
                selection: &run.selection,
                model: run.model.as_ref(),
                state: run.state.as_ref(),
                answers: run.score.len(),
            };
            let to = Phase::Evaluating;
            run.machine.transition(to, &ctx)?;
            info!(run = %handle, from = %phase, %to, "phase changed");
        }

        run.score.record(question.label, &result);
        run.answered.insert(question.id);
        run.last_result = Some(result);
        debug!(
            run = %handle,
            question = question.id,
            correct = result.correct,
            points = result.points,
            total = run.score.total(),
            "answer scored"
        );
        Ok(run.score.clone())
    }

    /// Feedback for the most recent answer, if any.
    pub fn feedback(&self, handle: RunHandle) -> RunResult<Option<&'static str>> {
        let run = self.run(handle)?;
        Ok(run.last_result.map(|result| scoring::feedback(&result, run.definition.id)))
    }

    /// Returns the run to `Idle` and forgets everything about the attempt.
    /// Returns the previous phase.
    pub fn reset(&mut self, handle: RunHandle) -> RunResult<Phase> {
        let run = self.run_mut(handle)?;
        let from = run.machine.phase();
        run.clear();
        info!(run = %handle, %from, "run reset");
        Ok(from)
    }

    /// Restarts a running experiment from its initial state, clearing a stall.
    pub fn retry(&mut self, handle: RunHandle) -> RunResult<()> {
        let run = self.run_mut(handle)?;
        let phase = run.machine.phase();
        if phase != Phase::Running {
            return Err(RunError::NotRunning { phase });
        }
        if run.dirty || run.model.is_none() {
            run.model = Some(run.build_model()?);
            run.dirty = false;
        }
        run.state = run.model.as_ref().map(Model::initial_state);
        run.stalled = false;
        info!(run = %handle, "run restarted");
        Ok(())
    }

    /// Discards a run.
    pub fn teardown(&mut self, handle: RunHandle) -> RunResult<()> {
        self.runs.remove(&handle).ok_or(RunError::UnknownRun(handle))?;
        info!(run = %handle, "run discarded");
        Ok(())
    }

    /// Visual state of the live run, or of the snapshot once measuring.
    pub fn visual(&self, handle: RunHandle) -> RunResult<Option<VisualState>> {
        let run = self.run(handle)?;
        let visual = match (&run.model, &run.state, &run.snapshot) {
            (Some(model), Some(state), _) => Some(mapper::map(model, state)),
            (_, _, Some(snapshot)) => Some(mapper::map(&snapshot.model, &snapshot.state)),
            _ => None,
        };
        Ok(visual)
    }

    pub fn phase(&self, handle: RunHandle) -> RunResult<Phase> {
        Ok(self.run(handle)?.machine.phase())
    }

    pub fn selection(&self, handle: RunHandle) -> RunResult<&UserSelection> {
        Ok(&self.run(handle)?.selection)
    }

    pub fn score(&self, handle: RunHandle) -> RunResult<&ScoreRecord> {
        Ok(&self.run(handle)?.score)
    }

    /// Live state while running, `None` before.
    pub fn state(&self, handle: RunHandle) -> RunResult<Option<&SimulationState>> {
        Ok(self.run(handle)?.state.as_ref())
    }

    /// Live model while running, `None` before.
    pub fn model(&self, handle: RunHandle) -> RunResult<Option<&Model>> {
        Ok(self.run(handle)?.model.as_ref())
    }

    pub fn is_stalled(&self, handle: RunHandle) -> RunResult<bool> {
        Ok(self.run(handle)?.stalled)
    }

    pub fn definition(&self, handle: RunHandle) -> RunResult<&'static ExperimentDefinition> {
        Ok(self.run(handle)?.definition)
    }
}

impl Default for Lab {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Titration;

    fn running(lab: &mut Lab, experiment: &str, inputs: &[(&str, InputValue)]) -> RunHandle {
        let run = lab.initialize(experiment).unwrap();
        lab.transition(run, Phase::Setup).unwrap();
        for (key, value) in inputs {
            lab.apply_input(run, key, value.clone()).unwrap();
        }
        lab.transition(run, Phase::Configuring).unwrap();
        lab.transition(run, Phase::Running).unwrap();
        run
    }

    fn choice(id: &str) -> InputValue {
        InputValue::Choice(id.to_string())
    }

    #[test]
    fn test_unknown_experiment() {
        let mut lab = Lab::new();
        assert!(matches!(
            lab.initialize("alchemy"),
            Err(RunError::UnknownModel(id)) if id == "alchemy"
        ));
        assert!(lab.is_empty());
    }

    #[test]
    fn test_runs_are_independent() {
        let mut lab = Lab::new();
        let a = lab.initialize("projectile").unwrap();
        let b = lab.initialize("projectile").unwrap();
        assert_ne!(a, b);

        lab.transition(a, Phase::Setup).unwrap();
        lab.apply_input(a, "height", InputValue::Number(40.0)).unwrap();
        assert_eq!(lab.phase(b).unwrap(), Phase::Idle);
        assert!(lab.selection(b).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_input_leaves_selection() {
        let mut lab = Lab::new();
        let run = lab.initialize("projectile").unwrap();
        lab.apply_input(run, "height", InputValue::Number(20.0)).unwrap();

        let err = lab.apply_input(run, "height", InputValue::Number(500.0)).unwrap_err();
        assert!(matches!(err, RunError::InvalidSelection(SelectionError::OutOfRange { .. })));
        let err = lab.apply_input(run, "colour", InputValue::Number(1.0)).unwrap_err();
        assert!(matches!(err, RunError::InvalidSelection(SelectionError::UnknownInput(_))));
        assert_eq!(lab.selection(run).unwrap().number("height"), Some(20.0));
    }

    #[test]
    fn test_advance_outside_running() {
        let mut lab = Lab::new();
        let run = lab.initialize("projectile").unwrap();
        assert!(matches!(
            lab.advance(run, 0.1),
            Err(RunError::NotRunning { phase: Phase::Idle })
        ));
    }

    #[test]
    fn test_running_builds_model_from_selection() {
        let mut lab = Lab::new();
        let run = running(
            &mut lab,
            "projectile",
            &[("height", InputValue::Number(40.0)), ("velocity", InputValue::Number(15.0))],
        );
        match lab.model(run).unwrap() {
            Some(Model::Projectile(p)) => {
                assert_eq!(p.height, 40.0);
                assert_eq!(p.launch_speed, 15.0);
            }
            other => panic!("unexpected model {other:?}"),
        }
        assert_eq!(lab.state(run).unwrap().map(|s| s.time()), Some(0.0));
    }

    #[test]
    fn test_input_while_running_rebuilds_before_next_step() {
        let mut lab = Lab::new();
        let run = running(&mut lab, "ohms_law", &[]);
        lab.advance(run, 0.1).unwrap();
        assert_eq!(lab.state(run).unwrap().and_then(|s| s.get("current")), Some(0.6));

        lab.apply_input(run, "resistance", InputValue::Number(20.0)).unwrap();
        lab.advance(run, 0.1).unwrap();
        assert_eq!(lab.state(run).unwrap().and_then(|s| s.get("current")), Some(0.3));
    }

    #[test]
    fn test_invalid_model_keeps_phase() {
        let mut overrides = std::collections::BTreeMap::new();
        let constants = serde_json::json!({ "length": 50.0 });
        overrides.insert("incline".to_string(), constants.as_object().unwrap().clone());
        let mut lab = Lab::new().with_catalog(Catalog::with_overrides(&overrides).unwrap());

        let run = lab.initialize("incline").unwrap();
        lab.transition(run, Phase::Setup).unwrap();
        // Higher than the ramp is long
        lab.apply_input(run, "height", InputValue::Number(80.0)).unwrap();
        lab.transition(run, Phase::Configuring).unwrap();

        let err = lab.transition(run, Phase::Running).unwrap_err();
        assert!(matches!(
            err,
            RunError::Model(ModelError::InvalidModelParameter { name: "height", .. })
        ));
        assert_eq!(lab.phase(run).unwrap(), Phase::Configuring);
        assert!(lab.state(run).unwrap().is_none());
    }

    #[test]
    fn test_guard_rejection_keeps_phase() {
        let mut lab = Lab::new();
        let run = lab.initialize("titration").unwrap();
        lab.transition(run, Phase::Setup).unwrap();
        lab.apply_input(run, "acid", choice("hcl")).unwrap();

        let err = lab.transition(run, Phase::Configuring).unwrap_err();
        assert!(matches!(err, RunError::Machine(MachineError::GuardRejected { .. })));
        assert_eq!(lab.phase(run).unwrap(), Phase::Setup);
    }

    #[test]
    fn test_measuring_too_early_is_rejected() {
        let mut lab = Lab::new();
        let run = running(
            &mut lab,
            "titration",
            &[("acid", choice("hcl")), ("base", choice("naoh")), ("indicator", choice("litmus"))],
        );
        lab.advance(run, 10.0).unwrap();
        assert!(lab.transition(run, Phase::Measuring).is_err());
        assert_eq!(lab.phase(run).unwrap(), Phase::Running);

        // 25 mL at 0.5 mL/s
        lab.advance(run, 40.0).unwrap();
        lab.transition(run, Phase::Measuring).unwrap();
    }

    #[test]
    fn test_evaluate_needs_a_snapshot() {
        let mut lab = Lab::new();
        let run = running(&mut lab, "measurement", &[]);
        let err = lab.evaluate(run, &Submission::numeric("length", 12.5)).unwrap_err();
        assert!(matches!(err, RunError::NotReady));
    }

    #[test]
    fn test_evaluate_flow() {
        let mut lab = Lab::new();
        let run = running(&mut lab, "measurement", &[]);
        lab.transition(run, Phase::Measuring).unwrap();

        let err = lab.evaluate(run, &Submission::numeric("width", 3.0)).unwrap_err();
        assert!(matches!(err, RunError::UnknownQuestion(id) if id == "width"));
        assert_eq!(lab.phase(run).unwrap(), Phase::Measuring);

        let score = lab.evaluate(run, &Submission::numeric("length", 13.5)).unwrap();
        assert_eq!(score.total(), 0);
        assert_eq!(score.len(), 1);
        assert_eq!(lab.phase(run).unwrap(), Phase::Evaluating);
        assert_eq!(lab.feedback(run).unwrap(), Some("Line the object up with the zero mark."));

        let err = lab.evaluate(run, &Submission::numeric("length", 12.5)).unwrap_err();
        assert!(matches!(err, RunError::AlreadyAnswered(_)));

        lab.transition(run, Phase::Completed).unwrap();
        assert!(matches!(lab.advance(run, 0.1), Err(RunError::NotRunning { .. })));
    }

    #[test]
    fn test_completed_needs_an_answer() {
        let mut lab = Lab::new();
        let run = running(&mut lab, "measurement", &[]);
        lab.transition(run, Phase::Measuring).unwrap();
        assert!(lab.transition(run, Phase::Evaluating).is_ok());
        assert!(lab.transition(run, Phase::Completed).is_err());
    }

    #[test]
    fn test_inputs_lock_after_measuring() {
        let mut lab = Lab::new();
        let run = running(&mut lab, "ohms_law", &[]);
        lab.transition(run, Phase::Measuring).unwrap();
        let err = lab.apply_input(run, "voltage", InputValue::Number(3.0)).unwrap_err();
        assert!(matches!(err, RunError::InvalidSelection(SelectionError::Locked(_))));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut lab = Lab::new();
        let run = running(&mut lab, "measurement", &[]);
        lab.transition(run, Phase::Measuring).unwrap();
        lab.evaluate(run, &Submission::numeric("length", 12.5)).unwrap();
        assert_eq!(lab.score(run).unwrap().total(), 100);

        assert_eq!(lab.transition(run, Phase::Idle).unwrap(), Phase::Evaluating);
        assert_eq!(lab.score(run).unwrap().total(), 0);
        assert!(lab.state(run).unwrap().is_none());
        assert!(lab.visual(run).unwrap().is_none());
        let early = lab.evaluate(run, &Submission::numeric("length", 12.5));
        assert!(matches!(early, Err(RunError::NotReady)));
    }

    #[test]
    fn test_divergence_stalls_until_retry() {
        let mut lab = Lab::new();
        let run = running(&mut lab, "stokes", &[("liquid", choice("water"))]);
        lab.advance(run, 0.1).unwrap();

        // Corrupt the live state the way a blown-up step would
        let entry = lab.runs.get_mut(&run).unwrap();
        let model = entry.model.as_ref().unwrap();
        let mut broken = model.initial_state();
        broken.commit(nalgebra::DVector::from_vec(vec![f64::NAN, 0.0]), 0.2, 1);
        entry.state = Some(broken);

        assert!(matches!(
            lab.advance(run, 0.1),
            Err(RunError::Solver(SolverError::NumericDivergence { .. }))
        ));
        assert!(lab.is_stalled(run).unwrap());
        assert!(matches!(lab.advance(run, 0.1), Err(RunError::Stalled)));

        lab.retry(run).unwrap();
        assert!(!lab.is_stalled(run).unwrap());
        assert_eq!(lab.state(run).unwrap().map(|s| s.time()), Some(0.0));
        assert!(lab.advance(run, 0.1).is_ok());
    }

    #[test]
    fn test_stalled_run_cannot_be_measured() {
        let mut lab = Lab::new();
        let run = running(&mut lab, "stokes", &[("liquid", choice("water"))]);
        lab.advance(run, 0.1).unwrap();

        // Settled ball with a corrupted position
        let entry = lab.runs.get_mut(&run).unwrap();
        let terminal = match entry.model.as_ref().unwrap() {
            Model::ViscousFall(fall) => fall.terminal_velocity(),
            other => panic!("unexpected model {}", other.name()),
        };
        let mut broken = entry.model.as_ref().unwrap().initial_state();
        broken.commit(nalgebra::DVector::from_vec(vec![terminal, f64::NAN]), 0.2, 1);
        entry.state = Some(broken);

        assert!(lab.advance(run, 0.1).is_err());
        assert!(lab.is_stalled(run).unwrap());
        assert!(matches!(lab.transition(run, Phase::Measuring), Err(RunError::Stalled)));
        assert_eq!(lab.phase(run).unwrap(), Phase::Running);

        let submission = Submission::numeric("terminal_velocity", terminal);
        assert!(matches!(lab.evaluate(run, &submission), Err(RunError::NotReady)));
        assert!(lab.score(run).unwrap().is_empty());

        lab.retry(run).unwrap();
        lab.advance(run, 60.0).unwrap();
        assert_eq!(lab.transition(run, Phase::Measuring).unwrap(), Phase::Running);
    }

    #[test]
    fn test_invalid_integrator_is_rejected_without_stalling() {
        let mut lab = Lab::new().with_integrator(Integrator::new().with_max_step(0.0));
        let run = running(&mut lab, "stokes", &[("liquid", choice("water"))]);

        let err = lab.advance(run, 0.1).unwrap_err();
        assert!(matches!(
            err,
            RunError::Solver(SolverError::InvalidSetting { name: "max_step", .. })
        ));
        assert!(!lab.is_stalled(run).unwrap());
        assert_eq!(lab.state(run).unwrap().map(|s| s.steps()), Some(0));
    }

    #[test]
    fn test_visual_uses_snapshot_state() {
        let mut lab = Lab::new();
        let run = running(
            &mut lab,
            "titration",
            &[
                ("acid", choice("hcl")),
                ("base", choice("naoh")),
                ("indicator", choice("phenolphthalein")),
            ],
        );
        lab.advance(run, 50.0).unwrap();
        lab.transition(run, Phase::Measuring).unwrap();
        let visual = lab.visual(run).unwrap().unwrap();
        assert_eq!(visual.color, crate::ColorToken::Magenta);

        let volume = lab.state(run).unwrap().and_then(|s| s.get("volume_added")).unwrap();
        assert!((volume - Titration::default().equivalence_volume()).abs() < 1e-6);
    }

    #[test]
    fn test_teardown() {
        let mut lab = Lab::new();
        let run = lab.initialize("measurement").unwrap();
        lab.teardown(run).unwrap();
        assert!(matches!(lab.phase(run), Err(RunError::UnknownRun(_))));
        assert!(matches!(lab.teardown(run), Err(RunError::UnknownRun(_))));
    }
}
