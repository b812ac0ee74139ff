//! Batch Enrollment Payment Aggregate
//!
//! Several certifications of the same course billed on one gateway invoice.

use chrono::{DateTime, NaiveDate, Utc};
use edu_common::{TenantId, UserId};
use serde::Serialize;

use super::lifecycle::PaymentLifecycle;
use super::status::{EnrollmentStatus, TransitionEvent, TransitionRejected};
use super::{PaymentRecord, RecordKind};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{Cents, IdempotencyKey, Installments, MoneyError, Payer, PaymentMethod};
use crate::{BatchId, CourseId, StudentId};

/// Validated input for a new batch
#[derive(Clone, Debug)]
pub struct BatchDraft {
    pub id: BatchId,
    pub course_id: CourseId,
    pub members: Vec<StudentId>,
    pub unit_price: Cents,
    pub payer: Payer,
    pub installments: Installments,
    pub payment_method: PaymentMethod,
    pub due_date: NaiveDate,
}

/// Batch payment aggregate root
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEnrollmentPayment {
    id: BatchId,
    tenant_id: TenantId,
    course_id: CourseId,
    consultant_id: UserId,
    members: Vec<StudentId>,
    number_of_certifications: usize,
    unit_price: Cents,
    total_value: Cents,
    payer: Payer,
    installments: Installments,
    payment_method: PaymentMethod,
    due_date: NaiveDate,
    idempotency_key: IdempotencyKey,
    #[serde(flatten)]
    lifecycle: PaymentLifecycle,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl BatchEnrollmentPayment {
    /// Create a `pending` batch; the total is `unit_price × members`
    pub fn create(draft: BatchDraft, tenant_id: TenantId, consultant_id: UserId) -> Result<Self, MoneyError> {
        let total_value = draft.unit_price.times(draft.members.len())?;
        let now = Utc::now();

        let mut batch = Self {
            id: draft.id,
            tenant_id,
            course_id: draft.course_id,
            consultant_id,
            number_of_certifications: draft.members.len(),
            members: draft.members,
            unit_price: draft.unit_price,
            total_value,
            payer: draft.payer,
            installments: draft.installments,
            payment_method: draft.payment_method,
            due_date: draft.due_date,
            idempotency_key: IdempotencyKey::derive(draft.id),
            lifecycle: PaymentLifecycle::start(now),
            events: vec![],
        };

        batch.events.push(DomainEvent::BatchCreated {
            batch_id: batch.id,
            tenant_id,
            course_id: batch.course_id,
            consultant_id,
            certifications: batch.number_of_certifications,
            total_value,
            created_at: now,
        });

        Ok(batch)
    }

    pub fn id(&self) -> BatchId { self.id }
    pub fn course_id(&self) -> CourseId { self.course_id }
    pub fn members(&self) -> &[StudentId] { &self.members }
    pub fn number_of_certifications(&self) -> usize { self.number_of_certifications }
    pub fn unit_price(&self) -> Cents { self.unit_price }
    pub fn total_value(&self) -> Cents { self.total_value }
    pub fn payer(&self) -> &Payer { &self.payer }
    pub fn installments(&self) -> Installments { self.installments }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn due_date(&self) -> NaiveDate { self.due_date }
    pub fn lifecycle(&self) -> &PaymentLifecycle { &self.lifecycle }
    pub fn payment_url(&self) -> Option<&str> { self.lifecycle.payment_url() }
}

impl PaymentRecord for BatchEnrollmentPayment {
    const KIND: RecordKind = RecordKind::Batch;

    fn record_id(&self) -> BatchId { self.id }
    fn tenant_id(&self) -> TenantId { self.tenant_id }
    fn consultant_id(&self) -> UserId { self.consultant_id }
    fn status(&self) -> EnrollmentStatus { self.lifecycle.status() }
    fn created_at(&self) -> DateTime<Utc> { self.lifecycle.created_at() }
    fn transaction_id(&self) -> Option<&str> { self.lifecycle.transaction_id() }
    fn idempotency_key(&self) -> &IdempotencyKey { &self.idempotency_key }

    fn apply(&mut self, event: TransitionEvent) -> Result<EnrollmentStatus, TransitionRejected> {
        let from = self.lifecycle.apply(&event)?;
        let to = self.lifecycle.status();
        self.events.push(DomainEvent::StatusChanged {
            record: self.reference(),
            tenant_id: self.tenant_id,
            from,
            to,
            cause: event.kind(),
            changed_at: self.lifecycle.updated_at(),
        });
        Ok(to)
    }

    fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }
}
