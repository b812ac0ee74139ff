//! Enrollment Aggregate
//!
//! One learner, one course, one gateway charge.

use chrono::{DateTime, NaiveDate, Utc};
use edu_common::{TenantId, UserId};
use serde::Serialize;

use super::lifecycle::PaymentLifecycle;
use super::status::{EnrollmentStatus, TransitionEvent, TransitionRejected};
use super::{PaymentRecord, RecordKind};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{Cents, Cpf, Email, IdempotencyKey, Installments, Payer, PaymentMethod, Phone};
use crate::{CourseId, EnrollmentId, PoloId, StudentId};

/// Validated input for a new enrollment
#[derive(Clone, Debug)]
pub struct EnrollmentDraft {
    pub id: EnrollmentId,
    pub course_id: CourseId,
    pub student_name: String,
    pub student_email: Email,
    pub student_cpf: Cpf,
    pub student_phone: Option<Phone>,
    pub polo_id: Option<PoloId>,
    pub amount: Cents,
    pub installments: Installments,
    pub payment_method: PaymentMethod,
    pub due_date: NaiveDate,
}

/// Enrollment aggregate root.
///
/// Commercial terms (course, amount, CPF) have no setters; only the
/// lifecycle moves after creation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    id: EnrollmentId,
    tenant_id: TenantId,
    course_id: CourseId,
    student_id: Option<StudentId>,
    student_name: String,
    student_email: Email,
    student_cpf: Cpf,
    student_phone: Option<Phone>,
    polo_id: Option<PoloId>,
    consultant_id: UserId,
    amount: Cents,
    installments: Installments,
    payment_method: PaymentMethod,
    due_date: NaiveDate,
    idempotency_key: IdempotencyKey,
    #[serde(flatten)]
    lifecycle: PaymentLifecycle,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Enrollment {
    /// Create a `pending` enrollment
    pub fn create(draft: EnrollmentDraft, tenant_id: TenantId, consultant_id: UserId) -> Self {
        let now = Utc::now();

        let mut enrollment = Self {
            id: draft.id,
            tenant_id,
            course_id: draft.course_id,
            student_id: None,
            student_name: draft.student_name,
            student_email: draft.student_email,
            student_cpf: draft.student_cpf,
            student_phone: draft.student_phone,
            polo_id: draft.polo_id,
            consultant_id,
            amount: draft.amount,
            installments: draft.installments,
            payment_method: draft.payment_method,
            due_date: draft.due_date,
            idempotency_key: IdempotencyKey::derive(draft.id),
            lifecycle: PaymentLifecycle::start(now),
            events: vec![],
        };

        enrollment.raise_event(DomainEvent::EnrollmentCreated {
            enrollment_id: enrollment.id,
            tenant_id,
            course_id: enrollment.course_id,
            consultant_id,
            amount: enrollment.amount,
            created_at: now,
        });

        enrollment
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> EnrollmentId { self.id }
    pub fn course_id(&self) -> CourseId { self.course_id }
    pub fn student_id(&self) -> Option<StudentId> { self.student_id }
    pub fn student_name(&self) -> &str { &self.student_name }
    pub fn student_email(&self) -> &Email { &self.student_email }
    pub fn student_cpf(&self) -> &Cpf { &self.student_cpf }
    pub fn student_phone(&self) -> Option<&Phone> { self.student_phone.as_ref() }
    pub fn polo_id(&self) -> Option<PoloId> { self.polo_id }
    pub fn amount(&self) -> Cents { self.amount }
    pub fn installments(&self) -> Installments { self.installments }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn due_date(&self) -> NaiveDate { self.due_date }
    pub fn lifecycle(&self) -> &PaymentLifecycle { &self.lifecycle }
    pub fn payment_url(&self) -> Option<&str> { self.lifecycle.payment_url() }

    /// The learner pays for their own enrollment
    pub fn payer(&self) -> Payer {
        Payer {
            name: self.student_name.clone(),
            document: self.student_cpf.clone(),
            email: Some(self.student_email.clone()),
        }
    }

    fn raise_event(&mut self, event: DomainEvent) {
        self.events.push(event);
    }
}

impl PaymentRecord for Enrollment {
    const KIND: RecordKind = RecordKind::Enrollment;

    fn record_id(&self) -> EnrollmentId { self.id }
    fn tenant_id(&self) -> TenantId { self.tenant_id }
    fn consultant_id(&self) -> UserId { self.consultant_id }
    fn status(&self) -> EnrollmentStatus { self.lifecycle.status() }
    fn created_at(&self) -> DateTime<Utc> { self.lifecycle.created_at() }
    fn transaction_id(&self) -> Option<&str> { self.lifecycle.transaction_id() }
    fn idempotency_key(&self) -> &IdempotencyKey { &self.idempotency_key }

    fn apply(&mut self, event: TransitionEvent) -> Result<EnrollmentStatus, TransitionRejected> {
        let from = self.lifecycle.apply(&event)?;

        if let TransitionEvent::Finalize { student_id: Some(student_id) } = event {
            self.student_id = Some(student_id);
        }

        let to = self.lifecycle.status();
        self.raise_event(DomainEvent::StatusChanged {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::TransitionKind;
    use uuid::Uuid;

    fn draft() -> EnrollmentDraft {
        EnrollmentDraft {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            student_name: "Maria da Silva".into(),
            student_email: Email::new("maria@example.com").unwrap(),
            student_cpf: Cpf::parse("529.982.247-25").unwrap(),
            student_phone: None,
            polo_id: None,
            amount: Cents::new(15000).unwrap(),
            installments: Installments::new(3).unwrap(),
            payment_method: PaymentMethod::CreditCard,
            due_date: NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
        }
    }

    fn enrollment() -> Enrollment {
        Enrollment::create(draft(), Uuid::new_v4(), Uuid::new_v4())
    }

    fn accepted() -> TransitionEvent {
        TransitionEvent::GatewayAccepted {
            transaction_id: "pay_123".into(),
            payment_url: Some("https://pay.example/i/pay_123".into()),
            bank_slip_url: None,
        }
    }

    fn every_event() -> Vec<TransitionEvent> {
        vec![
            accepted(),
            TransitionEvent::GatewayRejected { reason: "x".into() },
            TransitionEvent::PaymentConfirmed,
            TransitionEvent::PaymentFailed { reason: "x".into() },
            TransitionEvent::Finalize { student_id: Some(Uuid::new_v4()) },
            TransitionEvent::Cancel { reason: None },
        ]
    }

    #[test]
    fn test_create_is_pending_with_derived_key() {
        let mut e = enrollment();
        assert_eq!(e.status(), EnrollmentStatus::Pending);
        assert_eq!(e.idempotency_key(), &IdempotencyKey::derive(e.id()));
        let events = e.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "enrollment.created");
        assert!(e.take_events().is_empty());
    }

    #[test]
    fn test_happy_path_to_completed() {
        let mut e = enrollment();
        let student = Uuid::new_v4();

        assert_eq!(e.apply(accepted()), Ok(EnrollmentStatus::WaitingPayment));
        assert_eq!(e.payment_url(), Some("https://pay.example/i/pay_123"));
        assert_eq!(e.transaction_id(), Some("pay_123"));

        assert_eq!(e.apply(TransitionEvent::PaymentConfirmed), Ok(EnrollmentStatus::PaymentConfirmed));
        assert!(e.lifecycle().paid_at().is_some());

        let done = e.apply(TransitionEvent::Finalize { student_id: Some(student) });
        assert_eq!(done, Ok(EnrollmentStatus::Completed));
        assert_eq!(e.student_id(), Some(student));
        assert!(e.lifecycle().completed_at().is_some());
        assert_eq!(e.take_events().len(), 4);
    }

    #[test]
    fn test_terminal_states_reject_everything_unchanged() {
        let terminal = {
            let mut failed = enrollment();
            failed.apply(TransitionEvent::GatewayRejected { reason: "CPF bloqueado".into() }).unwrap();
            let mut cancelled = enrollment();
            cancelled.apply(TransitionEvent::Cancel { reason: Some("desistiu".into()) }).unwrap();
            let mut completed = enrollment();
            completed.apply(accepted()).unwrap();
            completed.apply(TransitionEvent::PaymentConfirmed).unwrap();
            completed.apply(TransitionEvent::Finalize { student_id: None }).unwrap();
            vec![failed, cancelled, completed]
        };

        for mut record in terminal {
            record.take_events();
            let before = format!("{record:?}");
            for event in every_event() {
                let kind = event.kind();
                let result = record.apply(event);
                assert_eq!(
                    result,
                    Err(TransitionRejected { from: record.status(), event: kind })
                );
            }
            assert_eq!(format!("{record:?}"), before);
        }
    }

    #[test]
    fn test_confirmation_requires_acceptance_first() {
        let mut e = enrollment();
        let err = e.apply(TransitionEvent::PaymentConfirmed).unwrap_err();
        assert_eq!(err.from, EnrollmentStatus::Pending);
        assert_eq!(err.event, TransitionKind::PaymentConfirmed);
        assert_eq!(e.status(), EnrollmentStatus::Pending);
    }

    #[test]
    fn test_serializes_camel_case_with_lifecycle() {
        let mut e = enrollment();
        e.apply(accepted()).unwrap();
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["status"], "waiting_payment");
        assert_eq!(json["studentCpf"], "52998224725");
        assert_eq!(json["amount"], 15000);
        assert_eq!(json["paymentMethod"], "CREDIT_CARD");
        assert_eq!(json["paymentUrl"], "https://pay.example/i/pay_123");
        assert!(json.get("events").is_none());
    }
}
