//! Lifecycle fields common to every payment record

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::status::{EnrollmentStatus, TransitionEvent, TransitionRejected};

/// Status plus everything the gateway and the back office write alongside it
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLifecycle {
    status: EnrollmentStatus,
    transaction_id: Option<String>,
    payment_url: Option<String>,
    bank_slip_url: Option<String>,
    failure_reason: Option<String>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl PaymentLifecycle {
    pub(crate) fn start(now: DateTime<Utc>) -> Self {
        Self {
            status: EnrollmentStatus::Pending,
            transaction_id: None,
            payment_url: None,
            bank_slip_url: None,
            failure_reason: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    pub fn status(&self) -> EnrollmentStatus { self.status }
    pub fn transaction_id(&self) -> Option<&str> { self.transaction_id.as_deref() }
    pub fn payment_url(&self) -> Option<&str> { self.payment_url.as_deref() }
    pub fn bank_slip_url(&self) -> Option<&str> { self.bank_slip_url.as_deref() }
    pub fn failure_reason(&self) -> Option<&str> { self.failure_reason.as_deref() }
    pub fn cancellation_reason(&self) -> Option<&str> { self.cancellation_reason.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn paid_at(&self) -> Option<DateTime<Utc>> { self.paid_at }
    pub fn completed_at(&self) -> Option<DateTime<Utc>> { self.completed_at }
    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> { self.cancelled_at }

    /// Move along one edge of the table, recording the event's payload.
    /// Returns the previous status.
    pub(crate) fn apply(&mut self, event: &TransitionEvent) -> Result<EnrollmentStatus, TransitionRejected> {
        let from = self.status;
        let to = from.next(event.kind()).ok_or(TransitionRejected {
            from,
            event: event.kind(),
        })?;
        let now = Utc::now();

        match event {
            TransitionEvent::GatewayAccepted {
                transaction_id,
                payment_url,
                bank_slip_url,
            } => {
                self.transaction_id = Some(transaction_id.clone());
                self.payment_url = payment_url.clone();
                self.bank_slip_url = bank_slip_url.clone();
            }
            TransitionEvent::GatewayRejected { reason } | TransitionEvent::PaymentFailed { reason } => {
                self.failure_reason = Some(reason.clone());
            }
            TransitionEvent::PaymentConfirmed => self.paid_at = Some(now),
            TransitionEvent::Finalize { .. } => self.completed_at = Some(now),
            TransitionEvent::Cancel { reason } => {
                self.cancellation_reason = reason.clone();
                self.cancelled_at = Some(now);
            }
        }

        self.status = to;
        self.updated_at = now;
        Ok(from)
    }
}
