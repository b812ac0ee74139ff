//! Enrollment errors

use edu_access::AccessError;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{EnrollmentStatus, RecordKind, TransitionKind};
use crate::ports::outbound::RepositoryError;

/// Input rejected before anything was persisted. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Payment gateway failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Gateway refused the charge; message is the gateway's own
    #[error("{message}")]
    Rejected { message: String },
    /// Transport failure or timeout: the charge may or may not exist
    #[error("payment gateway unavailable: {message}")]
    Unavailable { message: String },
}

/// Orchestrator error
#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("{kind} {record_id}: {source}")]
    Gateway {
        kind: RecordKind,
        record_id: Uuid,
        source: GatewayError,
    },

    #[error("{kind} {record_id}: cannot apply {event} while {from}")]
    InvalidTransition {
        kind: RecordKind,
        record_id: Uuid,
        from: EnrollmentStatus,
        event: TransitionKind,
    },

    #[error("{kind} {record_id} not found")]
    NotFound { kind: RecordKind, record_id: Uuid },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EnrollmentError {
    /// Record the error is about, when there is one
    pub fn record_id(&self) -> Option<Uuid> {
        match self {
            Self::Gateway { record_id, .. }
            | Self::InvalidTransition { record_id, .. }
            | Self::NotFound { record_id, .. } => Some(*record_id),
            _ => None,
        }
    }
}
