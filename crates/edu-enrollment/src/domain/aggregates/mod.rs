//! Aggregates module
//!
//! `Enrollment` and `BatchEnrollmentPayment` share one lifecycle and one
//! persistence contract, expressed by [`PaymentRecord`].

pub mod batch;
pub mod enrollment;
pub mod lifecycle;
pub mod status;

pub use batch::{BatchDraft, BatchEnrollmentPayment};
pub use enrollment::{Enrollment, EnrollmentDraft};
pub use lifecycle::PaymentLifecycle;
pub use status::{EnrollmentStatus, TransitionEvent, TransitionKind, TransitionRejected};

use chrono::{DateTime, Utc};
use edu_common::{TenantId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::events::DomainEvent;
use crate::domain::value_objects::IdempotencyKey;

/// Which aggregate a record id belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Enrollment,
    Batch,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enrollment => "enrollment",
            Self::Batch => "batch",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed record reference, also sent to the gateway as the charge's external
/// reference (`enrollment:<uuid>` / `batch:<uuid>`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub kind: RecordKind,
    pub id: Uuid,
}

impl RecordRef {
    pub fn new(kind: RecordKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for RecordRef {
    type Err = String;

    /// Accepts the prefixed form; a bare uuid is taken as an enrollment id
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = match s.split_once(':') {
            Some(("enrollment", id)) => (RecordKind::Enrollment, id),
            Some(("batch", id)) => (RecordKind::Batch, id),
            Some((other, _)) => return Err(format!("unknown record kind: {other}")),
            None => (RecordKind::Enrollment, s),
        };
        let id = Uuid::parse_str(id).map_err(|e| e.to_string())?;
        Ok(Self { kind, id })
    }
}

/// What the orchestrator needs from any payment-carrying aggregate
pub trait PaymentRecord: Clone + Send + Sync + 'static {
    const KIND: RecordKind;

    fn record_id(&self) -> Uuid;
    fn tenant_id(&self) -> TenantId;
    fn consultant_id(&self) -> UserId;
    fn status(&self) -> EnrollmentStatus;
    fn created_at(&self) -> DateTime<Utc>;
    fn transaction_id(&self) -> Option<&str>;
    fn idempotency_key(&self) -> &IdempotencyKey;

    /// Apply one lifecycle event. On rejection the record is left untouched.
    fn apply(&mut self, event: TransitionEvent) -> Result<EnrollmentStatus, TransitionRejected>;

    /// Drain raised events
    fn take_events(&mut self) -> Vec<DomainEvent>;

    fn reference(&self) -> RecordRef {
        RecordRef::new(Self::KIND, self.record_id())
    }
}
