//! Session orchestration: step transitions, population events and the
//! save/restore pair around authentication interruptions.

pub mod controller;
pub mod ticket;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::artifact::ArtifactRejected;
use crate::domain::step::StepId;
use crate::drafts::SaveOutcome;
use crate::flows::TransitionRejection;

pub use controller::WorkflowController;
pub use ticket::TicketIssuer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Active,
    /// An authentication check was issued and has not reported back.
    CheckingAuth,
    /// Authentication was lost; the state is held until it is regained.
    Suspended,
    Submitted,
}

impl WorkflowPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::CheckingAuth => "checking_auth",
            Self::Suspended => "suspended",
            Self::Submitted => "submitted",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowRejection {
    #[error("workflow is suspended until the user signs in again")]
    AwaitingReauthentication,
    #[error("an authentication check is still outstanding")]
    AuthCheckPending,
    #[error("the workflow has already been submitted")]
    Submitted,
    #[error("effect was issued for a session state that is no longer active")]
    StaleTicket,
    #[error("step {step} is not reachable yet")]
    StepNotReachable { step: StepId },
    #[error("step {step} is not the current step ({current})")]
    NotCurrentStep { step: StepId, current: StepId },
    #[error(transparent)]
    ArtifactNotOwned(#[from] ArtifactRejected),
    #[error(transparent)]
    Transition(#[from] TransitionRejection),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LossOutcome {
    /// First loss since the last recovery; the state was handed to the store.
    Suspended(SaveOutcome),
    AlreadySuspended,
    SessionClosed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumeOutcome {
    Restored { step: StepId },
    NothingToRestore,
    StaleDiscarded { age: Duration },
    CorruptDiscarded,
    /// Restore already ran for this session; the in-memory state is kept.
    NotAttempted,
    SessionClosed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthCheckOutcome {
    Lost(LossOutcome),
    Recovered(ResumeOutcome),
    /// The verdict arrived for a check this controller no longer waits on.
    Discarded,
}
