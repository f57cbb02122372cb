use thiserror::Error;

use crate::config::ConfigError;
use crate::drafts::StorageError;
use crate::flows::TransitionRejection;
use crate::workflow::WorkflowRejection;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Transition(#[from] TransitionRejection),
    #[error(transparent)]
    Workflow(#[from] WorkflowRejection),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("authentication required: {0}")]
    Authentication(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<WorkflowRejection> for ApplicationError {
    fn from(value: WorkflowRejection) -> Self {
        match value {
            WorkflowRejection::AwaitingReauthentication => {
                Self::Authentication("workflow suspended until the user signs in again".to_owned())
            }
            other => Self::Domain(DomainError::Workflow(other)),
        }
    }
}

impl From<StorageError> for ApplicationError {
    fn from(value: StorageError) -> Self {
        Self::Persistence(value.to_string())
    }
}

impl From<ConfigError> for ApplicationError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not permitted: {message}")]
    NotPermitted { message: String, correlation_id: String },
    #[error("reauthentication required: {message}")]
    ReauthenticationRequired { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotPermitted { .. } => "That step is not available yet.",
            Self::ReauthenticationRequired { .. } => {
                "Your carrier session expired. Please log in again to continue."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::NotPermitted { correlation_id, .. }
            | Self::ReauthenticationRequired { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::NotPermitted { correlation_id: id, .. }
            | InterfaceError::ReauthenticationRequired { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::InvariantViolation(message)) => {
                Self::Internal { message, correlation_id }
            }
            ApplicationError::Domain(error) => {
                Self::NotPermitted { message: error.to_string(), correlation_id }
            }
            ApplicationError::Authentication(message) => {
                Self::ReauthenticationRequired { message, correlation_id }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::step::StepId;
    use crate::drafts::StorageError;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::flows::TransitionRejection;
    use crate::workflow::WorkflowRejection;

    #[test]
    fn transition_rejection_maps_to_not_permitted() {
        let interface = ApplicationError::from(DomainError::from(
            TransitionRejection::UnreachableStep {
                target: StepId::Summary,
                frontier: StepId::PickupRequest,
            },
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::NotPermitted { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(interface.user_message(), "That step is not available yet.");
    }

    #[test]
    fn suspension_maps_to_reauthentication_prompt() {
        let interface = ApplicationError::from(WorkflowRejection::AwaitingReauthentication)
            .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::ReauthenticationRequired { .. }));
        assert_eq!(
            interface.user_message(),
            "Your carrier session expired. Please log in again to continue."
        );
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface =
            ApplicationError::from(StorageError::Unavailable("snapshot backend offline".into()))
                .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
    }

    #[test]
    fn invariant_violation_maps_to_internal() {
        let interface = ApplicationError::from(DomainError::InvariantViolation(
            "restored graph skipped a step".to_owned(),
        ))
        .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
