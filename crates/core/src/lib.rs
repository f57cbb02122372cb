pub mod audit;
pub mod auth;
pub mod autofill;
pub mod carry;
pub mod clock;
pub mod config;
pub mod domain;
pub mod drafts;
pub mod errors;
pub mod flows;
pub mod tracking;
pub mod workflow;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use auth::{check_authentication, AuthToken, AuthVerdict, CarrierId, TokenAccessor};
pub use autofill::{AutoPopulationResolver, AutoPopulationRule, AutofillPatch, RuleBook};
pub use carry::{CarryForwardBridge, CarryMapping};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::artifact::{ArtifactKind, ArtifactLedger};
pub use domain::draft::{Draft, OrderRecord};
pub use domain::session::{SessionId, SessionTicket};
pub use domain::state::WorkflowState;
pub use domain::step::{StepDescriptor, StepId};
pub use drafts::{
    DraftBackend, DraftSnapshot, DraftStore, InMemoryDraftBackend, RestoreOutcome, SaveOutcome,
    SnapshotStatus, StorageError,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{StepGraph, StepTransition, TransitionOutcome, TransitionRejection};
pub use tracking::FieldEditTracker;
pub use workflow::{
    AuthCheckOutcome, LossOutcome, ResumeOutcome, WorkflowController, WorkflowPhase,
    WorkflowRejection,
};
