use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::step::StepId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepTransition {
    Advance,
    Retreat,
    JumpTo(StepId),
    Submit,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: StepId,
    pub to: StepId,
    pub transition: StepTransition,
    /// Step newly marked completed by this transition, if any.
    pub completed: Option<StepId>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionRejection {
    #[error("cannot advance past the terminal step {step}")]
    AtTerminalStep { step: StepId },
    #[error("cannot retreat before the first step {step}")]
    AtFirstStep { step: StepId },
    #[error("step {target} is not reachable; the furthest reachable step is {frontier}")]
    UnreachableStep { target: StepId, frontier: StepId },
    #[error("only the terminal step can be submitted (current step is {step})")]
    SubmitBeforeTerminal { step: StepId },
    #[error("the workflow has already been submitted")]
    AlreadySubmitted,
    #[error("step number {0} is outside 1..=4")]
    UnknownStepNumber(u8),
}
