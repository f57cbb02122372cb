use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::step::{StepDescriptor, StepId};
use crate::flows::states::{StepTransition, TransitionOutcome, TransitionRejection};

/// Ordered steps, their completion flags and the active step.
///
/// `completed` only ever grows: retreating or jumping back never
/// un-completes a step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepGraph {
    steps: Vec<StepDescriptor>,
    current: StepId,
    completed: BTreeSet<StepId>,
    #[serde(default)]
    submitted: bool,
}

impl Default for StepGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl StepGraph {
    pub fn new() -> Self {
        Self {
            steps: StepDescriptor::standard(),
            current: StepId::RateQuote,
            completed: BTreeSet::new(),
            submitted: false,
        }
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn current(&self) -> StepId {
        self.current
    }

    pub fn current_step_id(&self) -> u8 {
        self.current.number()
    }

    pub fn completed(&self) -> &BTreeSet<StepId> {
        &self.completed
    }

    pub fn is_completed(&self, step: StepId) -> bool {
        self.completed.contains(&step)
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn highest_completed(&self) -> Option<StepId> {
        self.completed.iter().next_back().copied()
    }

    /// The step right after the highest completed one; the furthest a
    /// jump may go.
    pub fn frontier(&self) -> StepId {
        match self.highest_completed() {
            Some(step) => step.next().unwrap_or(step),
            None => StepId::RateQuote,
        }
    }

    pub fn can_jump_to(&self, target: StepId) -> bool {
        self.is_completed(target) || target == self.frontier()
    }

    /// Computes the outcome of `transition` without applying it.
    pub fn plan(
        &self,
        transition: StepTransition,
    ) -> Result<TransitionOutcome, TransitionRejection> {
        if self.submitted {
            return Err(TransitionRejection::AlreadySubmitted);
        }

        let from = self.current;
        let (to, completed) = match transition {
            StepTransition::Advance => {
                let to = from.next().ok_or(TransitionRejection::AtTerminalStep { step: from })?;
                (to, self.newly_completed(from))
            }
            StepTransition::Retreat => {
                let to = from.previous().ok_or(TransitionRejection::AtFirstStep { step: from })?;
                (to, None)
            }
            StepTransition::JumpTo(target) => {
                if !self.can_jump_to(target) {
                    return Err(TransitionRejection::UnreachableStep {
                        target,
                        frontier: self.frontier(),
                    });
                }
                (target, None)
            }
            StepTransition::Submit => {
                if !from.is_terminal() {
                    return Err(TransitionRejection::SubmitBeforeTerminal { step: from });
                }
                (from, self.newly_completed(from))
            }
        };

        Ok(TransitionOutcome { from, to, transition, completed })
    }

    pub fn apply(
        &mut self,
        transition: StepTransition,
    ) -> Result<TransitionOutcome, TransitionRejection> {
        let outcome = self.plan(transition)?;
        if let StepTransition::Advance | StepTransition::Submit = transition {
            self.completed.insert(outcome.from);
        }
        if transition == StepTransition::Submit {
            self.submitted = true;
        }
        self.current = outcome.to;
        Ok(outcome)
    }

    pub fn advance(&mut self) -> Result<TransitionOutcome, TransitionRejection> {
        self.apply(StepTransition::Advance)
    }

    pub fn retreat(&mut self) -> Result<TransitionOutcome, TransitionRejection> {
        self.apply(StepTransition::Retreat)
    }

    pub fn jump_to(&mut self, target: StepId) -> Result<TransitionOutcome, TransitionRejection> {
        self.apply(StepTransition::JumpTo(target))
    }

    pub fn jump_to_number(&mut self, number: u8) -> Result<TransitionOutcome, TransitionRejection> {
        let target =
            StepId::from_number(number).ok_or(TransitionRejection::UnknownStepNumber(number))?;
        self.jump_to(target)
    }

    pub fn submit(&mut self) -> Result<TransitionOutcome, TransitionRejection> {
        self.apply(StepTransition::Submit)
    }

    /// Structural checks for a graph that arrived from outside (a restored
    /// snapshot): the fixed step list, and a current step that could have
    /// been reached from the recorded completions.
    pub fn is_consistent(&self) -> bool {
        let standard_steps =
            self.steps.iter().map(|descriptor| descriptor.id).eq(StepId::ALL.into_iter());
        let submitted_ok = !self.submitted || self.is_completed(StepId::Summary);
        standard_steps && self.can_jump_to(self.current) && submitted_ok
    }

    fn newly_completed(&self, step: StepId) -> Option<StepId> {
        (!self.completed.contains(&step)).then_some(step)
    }
}
