use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink,
};
use crate::auth::{check_authentication, AuthVerdict, CarrierId, TokenAccessor};
use crate::autofill::{AutoPopulationResolver, AutofillPatch, RuleBook};
use crate::carry::CarryForwardBridge;
use crate::config::{AppConfig, MAX_GRACE_SECS};
use crate::domain::artifact::ArtifactKind;
use crate::domain::draft::{Draft, OrderRecord};
use crate::domain::session::{SessionId, SessionTicket};
use crate::domain::state::WorkflowState;
use crate::domain::step::StepId;
use crate::drafts::{DraftStore, RestoreOutcome};
use crate::errors::{ApplicationError, InterfaceError};
use crate::flows::{StepTransition, TransitionOutcome, TransitionRejection};
use crate::tracking::FieldEditTracker;
use crate::workflow::ticket::TicketIssuer;
use crate::workflow::{
    AuthCheckOutcome, LossOutcome, ResumeOutcome, WorkflowPhase, WorkflowRejection,
};

const DEFAULT_GRACE_SECS: i64 = 60;

#[derive(Clone, Copy, Debug)]
struct PendingCheck {
    ticket: SessionTicket,
    resume_to: WorkflowPhase,
}

/// Owns one session's `WorkflowState` and is the only thing that mutates it.
///
/// Every mutation happens inside a single `&mut self` call, so a save or
/// restore is fully applied before the next transition is looked at.
/// Effects that complete outside the controller carry a `SessionTicket` and
/// are dropped once the ticket no longer matches.
pub struct WorkflowController {
    state: WorkflowState,
    tickets: TicketIssuer,
    phase: WorkflowPhase,
    pending_check: Option<PendingCheck>,
    restore_due: bool,
    order_data: Option<OrderRecord>,
    store: DraftStore,
    rules: RuleBook,
    bridge: CarryForwardBridge,
    resolver: AutoPopulationResolver,
    audit_sink: Arc<dyn AuditSink>,
    audit_context: AuditContext,
    grace_secs: i64,
}

impl WorkflowController {
    /// Fresh session. The first successful authentication check will try
    /// to resume a snapshot left behind by an earlier instance.
    pub fn new(store: DraftStore) -> Self {
        Self {
            state: WorkflowState::new(),
            tickets: TicketIssuer::default(),
            phase: WorkflowPhase::Active,
            pending_check: None,
            restore_due: true,
            order_data: None,
            store,
            rules: RuleBook::standard(),
            bridge: CarryForwardBridge::standard(),
            resolver: AutoPopulationResolver,
            audit_sink: Arc::new(NoopAuditSink),
            audit_context: AuditContext::default(),
            grace_secs: DEFAULT_GRACE_SECS,
        }
    }

    pub fn from_config(config: &AppConfig, store: DraftStore) -> Self {
        Self::new(store).with_grace_secs(config.auth.grace_secs)
    }

    pub fn with_rules(mut self, rules: RuleBook) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_bridge(mut self, bridge: CarryForwardBridge) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>, context: AuditContext) -> Self {
        self.audit_sink = sink;
        self.audit_context = context;
        self
    }

    /// Clamped to `0..=MAX_GRACE_SECS`.
    pub fn with_grace_secs(mut self, grace_secs: i64) -> Self {
        self.grace_secs = grace_secs.clamp(0, MAX_GRACE_SECS);
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn session_id(&self) -> SessionId {
        self.tickets.session_id()
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    pub fn current_step(&self) -> StepId {
        self.state.current_step()
    }

    pub fn draft(&self, step: StepId) -> Option<&Draft> {
        self.state.draft(step)
    }

    pub fn is_edited(&self, step: StepId, field: &str) -> bool {
        self.state.tracker(step).is_some_and(|tracker| tracker.is_edited(field))
    }

    pub fn grace_secs(&self) -> i64 {
        self.grace_secs
    }

    /// Maps a rejected operation to what the interface layer shows, tagged
    /// with this controller's correlation id.
    pub fn explain(&self, rejection: WorkflowRejection) -> InterfaceError {
        ApplicationError::from(rejection).into_interface(self.audit_context.correlation_id.clone())
    }

    /// Ticket to attach to an effect started now (for example a lookup whose
    /// result will feed `receive_order_data`).
    pub fn issue_ticket(&self) -> SessionTicket {
        self.tickets.issue()
    }

    pub fn advance(&mut self) -> Result<TransitionOutcome, WorkflowRejection> {
        let outcome = self.transition(StepTransition::Advance)?;
        self.carry_forward(outcome.from, outcome.to);
        self.populate_entered(outcome.to);
        Ok(outcome)
    }

    pub fn retreat(&mut self) -> Result<TransitionOutcome, WorkflowRejection> {
        let outcome = self.transition(StepTransition::Retreat)?;
        self.populate_entered(outcome.to);
        Ok(outcome)
    }

    pub fn jump_to(&mut self, target: StepId) -> Result<TransitionOutcome, WorkflowRejection> {
        let outcome = self.transition(StepTransition::JumpTo(target))?;
        self.populate_entered(outcome.to);
        Ok(outcome)
    }

    pub fn jump_to_number(&mut self, number: u8) -> Result<TransitionOutcome, WorkflowRejection> {
        let target =
            StepId::from_number(number).ok_or(TransitionRejection::UnknownStepNumber(number))?;
        self.jump_to(target)
    }

    /// Completes the summary step and closes the session. Any snapshot
    /// still in the store is removed so the shipment cannot be resumed.
    pub async fn submit(&mut self) -> Result<TransitionOutcome, WorkflowRejection> {
        let outcome = self.transition(StepTransition::Submit)?;
        self.phase = WorkflowPhase::Submitted;
        self.pending_check = None;
        self.restore_due = false;
        self.store.clear().await;
        Ok(outcome)
    }

    /// Applies a user edit and records the field as edited, even when the
    /// new value is blank.
    pub fn record_edit(
        &mut self,
        step: StepId,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), WorkflowRejection> {
        self.ensure_active()?;
        if !self.state.graph.can_jump_to(step) {
            return Err(WorkflowRejection::StepNotReachable { step });
        }

        let field = field.into();
        let (draft, tracker) = self.state.slice_mut(step);
        draft.set(field.clone(), value);
        tracker.mark_edited(field.clone());

        debug!(
            event_name = "workflow.field.edited",
            session_id = %self.session_id(),
            step = %step,
            field = %field,
            "user edit recorded"
        );
        Ok(())
    }

    /// Runs `step`'s rule set over `record` and applies the result. The
    /// record is kept and reapplied to each step the user enters.
    pub fn receive_order_data(
        &mut self,
        ticket: SessionTicket,
        step: StepId,
        record: OrderRecord,
    ) -> Result<AutofillPatch, WorkflowRejection> {
        if !self.tickets.is_current(&ticket) {
            self.discard_effect("order_data", &ticket);
            return Err(WorkflowRejection::StaleTicket);
        }
        self.ensure_active()?;

        let patch = self.resolve(&record, step);
        self.order_data = Some(record);
        self.apply_patch(step, &patch, "order_data");
        Ok(patch)
    }

    /// Records an artifact produced by the current step; returns the value
    /// it replaced, if the step was completed before.
    pub fn record_artifact(
        &mut self,
        step: StepId,
        kind: ArtifactKind,
        value: Value,
    ) -> Result<Option<Value>, WorkflowRejection> {
        self.ensure_active()?;
        let current = self.current_step();
        if step != current {
            return Err(WorkflowRejection::NotCurrentStep { step, current });
        }

        let replaced = self.state.carried_artifacts.record(step, kind, value)?;
        info!(
            event_name = "workflow.artifact.recorded",
            session_id = %self.session_id(),
            step = %step,
            artifact = %kind,
            replaced = replaced.is_some(),
            "step artifact recorded"
        );
        self.audit(
            Some(step),
            "workflow.artifact.recorded",
            AuditCategory::Workflow,
            AuditOutcome::Success,
            vec![("artifact", kind.to_string())],
        );
        Ok(replaced)
    }

    /// Marks an authentication check as outstanding. Step transitions are
    /// refused until `finish_auth_check` reports back with this ticket.
    pub fn begin_auth_check(&mut self) -> Result<SessionTicket, WorkflowRejection> {
        match self.phase {
            WorkflowPhase::Submitted => return Err(WorkflowRejection::Submitted),
            WorkflowPhase::CheckingAuth => return Err(WorkflowRejection::AuthCheckPending),
            WorkflowPhase::Active | WorkflowPhase::Suspended => {}
        }

        let ticket = self.tickets.issue();
        self.pending_check = Some(PendingCheck { ticket, resume_to: self.phase });
        self.phase = WorkflowPhase::CheckingAuth;
        debug!(
            event_name = "workflow.auth.check_started",
            session_id = %self.session_id(),
            generation = ticket.generation,
            "authentication check started"
        );
        Ok(ticket)
    }

    pub async fn finish_auth_check(
        &mut self,
        ticket: SessionTicket,
        verdict: AuthVerdict,
    ) -> AuthCheckOutcome {
        let pending = match self.pending_check {
            Some(pending) if pending.ticket == ticket && self.tickets.is_current(&ticket) => {
                pending
            }
            _ => {
                self.discard_effect("auth_check", &ticket);
                return AuthCheckOutcome::Discarded;
            }
        };

        self.pending_check = None;
        self.phase = pending.resume_to;
        match verdict {
            AuthVerdict::Lost => AuthCheckOutcome::Lost(self.authentication_lost().await),
            AuthVerdict::Recovered => {
                AuthCheckOutcome::Recovered(self.authentication_recovered().await)
            }
        }
    }

    /// Full check against `tokens`: session liveness, token expiry with the
    /// configured grace, then a refresh attempt.
    pub async fn verify_authentication(
        &mut self,
        tokens: &dyn TokenAccessor,
        carrier: &CarrierId,
    ) -> Result<AuthCheckOutcome, WorkflowRejection> {
        let ticket = self.begin_auth_check()?;
        let verdict = check_authentication(tokens, carrier, self.grace_secs).await;
        Ok(self.finish_auth_check(ticket, verdict).await)
    }

    /// Saves the whole state and suspends. Repeated losses before the next
    /// recovery do not save again.
    pub async fn authentication_lost(&mut self) -> LossOutcome {
        match self.phase {
            WorkflowPhase::Submitted => return LossOutcome::SessionClosed,
            WorkflowPhase::Suspended => {
                debug!(
                    event_name = "workflow.auth.lost_while_suspended",
                    session_id = %self.session_id(),
                    "already suspended; snapshot left as is"
                );
                return LossOutcome::AlreadySuspended;
            }
            WorkflowPhase::Active | WorkflowPhase::CheckingAuth => {}
        }

        self.pending_check = None;
        self.phase = WorkflowPhase::Suspended;
        self.restore_due = true;
        let saved = self.store.save(&self.state).await;

        warn!(
            event_name = "workflow.auth.lost",
            session_id = %self.session_id(),
            step = %self.current_step(),
            save = ?saved,
            "authentication lost; workflow suspended"
        );
        self.audit(
            Some(self.current_step()),
            "workflow.auth.lost",
            AuditCategory::Auth,
            AuditOutcome::Success,
            vec![("save", format!("{saved:?}"))],
        );
        LossOutcome::Suspended(saved)
    }

    /// Resumes the workflow, replacing the state with a stored snapshot when
    /// this is the first recovery since a loss (or since construction).
    pub async fn authentication_recovered(&mut self) -> ResumeOutcome {
        if self.phase == WorkflowPhase::Submitted {
            return ResumeOutcome::SessionClosed;
        }
        self.pending_check = None;

        let outcome = if self.restore_due {
            self.restore_due = false;
            match self.store.restore().await {
                RestoreOutcome::Restored(state) => {
                    let step = state.current_step();
                    self.state = *state;
                    self.tickets.bump();
                    ResumeOutcome::Restored { step }
                }
                RestoreOutcome::Absent => ResumeOutcome::NothingToRestore,
                RestoreOutcome::Stale { age } => ResumeOutcome::StaleDiscarded { age },
                RestoreOutcome::Corrupt => ResumeOutcome::CorruptDiscarded,
            }
        } else {
            ResumeOutcome::NotAttempted
        };
        self.phase = WorkflowPhase::Active;

        info!(
            event_name = "workflow.auth.recovered",
            session_id = %self.session_id(),
            step = %self.current_step(),
            resume = ?outcome,
            "authentication recovered"
        );
        if outcome != ResumeOutcome::NotAttempted {
            self.audit(
                Some(self.current_step()),
                "workflow.auth.recovered",
                AuditCategory::Auth,
                AuditOutcome::Success,
                vec![("resume", format!("{outcome:?}"))],
            );
        }
        outcome
    }

    /// Drops the current shipment and starts a new session identity. Every
    /// ticket issued before this call becomes stale.
    pub async fn abandon(&mut self) -> SessionId {
        let retired = self.tickets.renew();
        self.state = WorkflowState::new();
        self.phase = WorkflowPhase::Active;
        self.pending_check = None;
        self.restore_due = false;
        self.order_data = None;
        self.store.clear().await;

        info!(
            event_name = "workflow.session.abandoned",
            session_id = %self.session_id(),
            retired_session_id = %retired,
            "session abandoned; fresh workflow started"
        );
        self.audit(
            None,
            "workflow.session.abandoned",
            AuditCategory::Workflow,
            AuditOutcome::Success,
            vec![("retired_session_id", retired.to_string())],
        );
        self.session_id()
    }

    fn ensure_active(&self) -> Result<(), WorkflowRejection> {
        match self.phase {
            WorkflowPhase::Active => Ok(()),
            WorkflowPhase::CheckingAuth => Err(WorkflowRejection::AuthCheckPending),
            WorkflowPhase::Suspended => Err(WorkflowRejection::AwaitingReauthentication),
            WorkflowPhase::Submitted => Err(WorkflowRejection::Submitted),
        }
    }

    fn transition(
        &mut self,
        transition: StepTransition,
    ) -> Result<TransitionOutcome, WorkflowRejection> {
        let from = self.current_step();
        let result = self
            .ensure_active()
            .and_then(|()| self.state.graph.apply(transition).map_err(WorkflowRejection::from));

        match &result {
            Ok(outcome) => {
                let event_type = transition_event(transition);
                info!(
                    event_name = event_type,
                    session_id = %self.session_id(),
                    from = %outcome.from,
                    to = %outcome.to,
                    "workflow transition applied"
                );
                self.audit(
                    Some(outcome.to),
                    event_type,
                    AuditCategory::Workflow,
                    AuditOutcome::Success,
                    vec![("from", outcome.from.to_string()), ("to", outcome.to.to_string())],
                );
            }
            Err(error) => {
                info!(
                    event_name = "workflow.step.rejected",
                    session_id = %self.session_id(),
                    step = %from,
                    transition = ?transition,
                    error = %error,
                    "workflow transition not permitted"
                );
                self.audit(
                    Some(from),
                    "workflow.step.rejected",
                    AuditCategory::Workflow,
                    AuditOutcome::Rejected,
                    vec![("transition", format!("{transition:?}")), ("error", error.to_string())],
                );
            }
        }
        result
    }

    fn carry_forward(&mut self, completed: StepId, next: StepId) {
        let empty_draft = Draft::new();
        let empty_tracker = FieldEditTracker::new();
        let patch = self.bridge.plan(
            completed,
            &self.state.carried_artifacts,
            self.state.draft(next).unwrap_or(&empty_draft),
            self.state.tracker(next).unwrap_or(&empty_tracker),
        );
        self.apply_patch(next, &patch, "carry_forward");
    }

    fn populate_entered(&mut self, step: StepId) {
        let Some(record) = self.order_data.take() else {
            return;
        };
        let patch = self.resolve(&record, step);
        self.order_data = Some(record);
        self.apply_patch(step, &patch, "order_data");
    }

    fn resolve(&self, record: &OrderRecord, step: StepId) -> AutofillPatch {
        let empty_draft = Draft::new();
        let empty_tracker = FieldEditTracker::new();
        self.resolver.apply(
            record,
            self.state.draft(step).unwrap_or(&empty_draft),
            self.rules.rules_for(step),
            self.state.tracker(step).unwrap_or(&empty_tracker),
        )
    }

    fn apply_patch(&mut self, step: StepId, patch: &AutofillPatch, source: &'static str) {
        if patch.is_empty() {
            return;
        }
        let written = patch.apply_to(self.state.draft_mut(step));
        let fields = patch.fields().collect::<Vec<_>>().join(",");

        debug!(
            event_name = "workflow.autofill.applied",
            session_id = %self.session_id(),
            step = %step,
            source,
            written,
            skipped = patch.skipped.len(),
            fields = %fields,
            "automatic population applied"
        );
        self.audit(
            Some(step),
            "workflow.autofill.applied",
            AuditCategory::Autofill,
            AuditOutcome::Success,
            vec![("source", source.to_owned()), ("fields", fields)],
        );
    }

    fn discard_effect(&self, effect: &'static str, ticket: &SessionTicket) {
        debug!(
            event_name = "workflow.effect.discarded",
            session_id = %self.session_id(),
            ticket_session_id = %ticket.session_id,
            ticket_generation = ticket.generation,
            effect,
            "stale effect dropped"
        );
        self.audit(
            None,
            "workflow.effect.discarded",
            AuditCategory::Workflow,
            AuditOutcome::Rejected,
            vec![("effect", effect.to_owned())],
        );
    }

    fn audit(
        &self,
        step: Option<StepId>,
        event_type: &str,
        category: AuditCategory,
        outcome: AuditOutcome,
        metadata: Vec<(&'static str, String)>,
    ) {
        let event = metadata.into_iter().fold(
            AuditEvent::new(
                self.session_id(),
                step,
                &self.audit_context,
                event_type,
                category,
                outcome,
            ),
            |event, (key, value)| event.with_metadata(key, value),
        );
        self.audit_sink.emit(event);
    }
}

fn transition_event(transition: StepTransition) -> &'static str {
    match transition {
        StepTransition::Advance => "workflow.step.advanced",
        StepTransition::Retreat => "workflow.step.retreated",
        StepTransition::JumpTo(_) => "workflow.step.jumped",
        StepTransition::Submit => "workflow.submitted",
    }
}
