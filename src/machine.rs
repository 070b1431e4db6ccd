//! Procedure phases of an experiment run.
//!
//! Every run walks the same lifecycle:
//!
//! ```text
//! Idle -> Setup -> Configuring -> Running -> Measuring -> Evaluating -> Completed
//!   ^                                                                     |
//!   +------------------------------- reset -------------------------------+
//! ```
//!
//! Forward edges go one phase at a time and may be gated by guards that the
//! experiment declares. A reset returns to `Idle` from any phase and is never
//! guarded. `Evaluating -> Completed` additionally requires at least one
//! scored answer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Model;
use crate::selection::UserSelection;
use crate::SimulationState;

/// Result type for phase transitions.
pub type MachineResult<T> = Result<T, MachineError>;

/// Errors raised by the phase machine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MachineError {
    /// No edge between the two phases
    #[error("No transition from {from} to {to}")]
    UndeclaredTransition { from: Phase, to: Phase },
    /// The edge exists but its guard is not satisfied
    #[error("Cannot go from {from} to {to}: {guard}")]
    GuardRejected { from: Phase, to: Phase, guard: &'static str },
}

/// Phase of an experiment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Setup,
    Configuring,
    Running,
    Measuring,
    Evaluating,
    Completed,
}

impl Phase {
    /// All phases in procedure order.
    pub const ALL: [Phase; 7] = [
        Phase::Idle,
        Phase::Setup,
        Phase::Configuring,
        Phase::Running,
        Phase::Measuring,
        Phase::Evaluating,
        Phase::Completed,
    ];

    /// The phase a forward edge leads to.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Idle => Some(Phase::Setup),
            Phase::Setup => Some(Phase::Configuring),
            Phase::Configuring => Some(Phase::Running),
            Phase::Running => Some(Phase::Measuring),
            Phase::Measuring => Some(Phase::Evaluating),
            Phase::Evaluating => Some(Phase::Completed),
            Phase::Completed => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Setup => "setup",
            Phase::Configuring => "configuring",
            Phase::Running => "running",
            Phase::Measuring => "measuring",
            Phase::Evaluating => "evaluating",
            Phase::Completed => "completed",
        }
    }

    /// Whether a measurement snapshot exists in this phase.
    pub fn is_measured(&self) -> bool {
        *self >= Phase::Measuring
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a guard may look at.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub selection: &'a UserSelection,
    /// Present from `Running` on
    pub model: Option<&'a Model>,
    pub state: Option<&'a SimulationState>,
    /// Number of scored answers
    pub answers: usize,
}

impl<'a> GuardContext<'a> {
    /// Context with only a selection, before any model exists.
    pub fn selection(selection: &'a UserSelection) -> Self {
        GuardContext { selection, model: None, state: None, answers: 0 }
    }

    /// Live model and state, if both are present.
    pub fn live(&self) -> Option<(&'a Model, &'a SimulationState)> {
        self.model.zip(self.state)
    }
}

/// Predicate gating the forward edge out of `from`.
#[derive(Debug, Clone, Copy)]
pub struct EdgeGuard {
    pub from: Phase,
    /// Shown to the learner when the guard rejects
    pub description: &'static str,
    pub check: fn(&GuardContext) -> bool,
}

/// Phase machine of one run.
///
/// # Examples
///
/// ```
/// use labsim::machine::{GuardContext, Phase, PhaseMachine};
/// use labsim::UserSelection;
///
/// let mut machine = PhaseMachine::new(&[]);
/// let selection = UserSelection::new();
/// let ctx = GuardContext::selection(&selection);
///
/// machine.transition(Phase::Setup, &ctx)?;
/// assert!(machine.transition(Phase::Running, &ctx).is_err());
///
/// machine.reset();
/// assert_eq!(machine.phase(), Phase::Idle);
/// # Ok::<(), labsim::machine::MachineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: Phase,
    guards: &'static [EdgeGuard],
}

impl PhaseMachine {
    pub fn new(guards: &'static [EdgeGuard]) -> Self {
        PhaseMachine { phase: Phase::Idle, guards }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Checks that `to` is reachable from the current phase right now.
    pub fn check(&self, to: Phase, ctx: &GuardContext) -> MachineResult<()> {
        let from = self.phase;
        if to == Phase::Idle {
            return Ok(());
        }
        if from.next() != Some(to) {
            return Err(MachineError::UndeclaredTransition { from, to });
        }
        if to == Phase::Completed && ctx.answers == 0 {
            let guard = "no answer has been scored";
            return Err(MachineError::GuardRejected { from, to, guard });
        }
        match self.guards.iter().find(|g| g.from == from && !(g.check)(ctx)) {
            Some(guard) => Err(MachineError::GuardRejected { from, to, guard: guard.description }),
            None => Ok(()),
        }
    }

    /// Moves to `to` if the edge exists and its guards pass. Returns the
    /// previous phase.
    pub fn transition(&mut self, to: Phase, ctx: &GuardContext) -> MachineResult<Phase> {
        self.check(to, ctx)?;
        Ok(std::mem::replace(&mut self.phase, to))
    }

    /// Returns to `Idle`. Returns the previous phase.
    pub fn reset(&mut self) -> Phase {
        std::mem::replace(&mut self.phase, Phase::Idle)
    }
}
