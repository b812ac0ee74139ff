//! Command handlers
//!
//! `EnrollmentService` is the only writer of record status. Every write goes
//! through `EnrollmentService::commit`, which applies the transition table
//! and persists with a conditional update on the previous status.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use edu_access::{authorize_tenant, require_role, AccessError, SessionState};
use edu_common::{Role, TenantId, User};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::dto::*;
use crate::config::{ConfigError, EnrollmentConfig};
use crate::domain::aggregates::{
    BatchDraft, BatchEnrollmentPayment, Enrollment, EnrollmentStatus, PaymentRecord, RecordKind, RecordRef,
    TransitionEvent, TransitionKind,
};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Cents;
use crate::error::{EnrollmentError, GatewayError, ValidationError};
use crate::ports::inbound::EnrollmentUseCases;
use crate::ports::outbound::{
    ChargeReceipt, ChargeRequest, ChargeStatus, Course, CourseCatalog, EventPublisher, PaymentGateway,
    PaymentRecordStore, RepositoryError, StudentDirectory,
};
use crate::{BatchId, CourseId, EnrollmentId, StudentId};

/// Everything the service talks to
#[derive(Clone)]
pub struct ServicePorts {
    pub enrollments: Arc<dyn PaymentRecordStore<Enrollment>>,
    pub batches: Arc<dyn PaymentRecordStore<BatchEnrollmentPayment>>,
    pub courses: Arc<dyn CourseCatalog>,
    pub students: Arc<dyn StudentDirectory>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub events: Arc<dyn EventPublisher>,
}

/// Enrollment/payment application service
pub struct EnrollmentService {
    ports: ServicePorts,
    individual_price: Cents,
    batch_price: Cents,
    default_due_days: u32,
}

/// A payment record the service can bill and store
trait Chargeable: PaymentRecord {
    fn store(ports: &ServicePorts) -> &dyn PaymentRecordStore<Self>;
    fn course(&self) -> CourseId;
    fn charge_request(&self, course: &Course) -> ChargeRequest;
}

impl Chargeable for Enrollment {
    fn store(ports: &ServicePorts) -> &dyn PaymentRecordStore<Self> {
        ports.enrollments.as_ref()
    }

    fn course(&self) -> CourseId {
        self.course_id()
    }

    fn charge_request(&self, course: &Course) -> ChargeRequest {
        ChargeRequest {
            idempotency_key: self.idempotency_key().clone(),
            external_reference: self.reference(),
            description: format!("Matrícula - {}", course.name),
            payer: self.payer(),
            amount: self.amount(),
            installments: self.installments(),
            payment_method: self.payment_method(),
            due_date: self.due_date(),
        }
    }
}

impl Chargeable for BatchEnrollmentPayment {
    fn store(ports: &ServicePorts) -> &dyn PaymentRecordStore<Self> {
        ports.batches.as_ref()
    }

    fn course(&self) -> CourseId {
        self.course_id()
    }

    fn charge_request(&self, course: &Course) -> ChargeRequest {
        ChargeRequest {
            idempotency_key: self.idempotency_key().clone(),
            external_reference: self.reference(),
            description: format!(
                "Certificação - {} ({} alunos)",
                course.name,
                self.number_of_certifications()
            ),
            payer: self.payer().clone(),
            amount: self.total_value(),
            installments: self.installments(),
            payment_method: self.payment_method(),
            due_date: self.due_date(),
        }
    }
}

enum Inserted<R> {
    Fresh(R),
    /// Lost an insert race against a retry of the same request
    Replayed(R),
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Admins see the whole tenant; other operators only what they sold
fn can_see<R: PaymentRecord>(user: &User, record: &R) -> bool {
    user.is_admin() || record.consultant_id() == user.id
}

fn not_found<R: PaymentRecord>(id: Uuid) -> EnrollmentError {
    EnrollmentError::NotFound {
        kind: R::KIND,
        record_id: id,
    }
}

impl EnrollmentService {
    pub fn new(ports: ServicePorts, config: &EnrollmentConfig) -> Result<Self, ConfigError> {
        let (individual_price, batch_price) = config.pricing.unit_prices()?;
        Ok(Self {
            ports,
            individual_price,
            batch_price,
            default_due_days: config.default_due_days,
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Apply `event` and persist, provided nobody moved the record meanwhile
    async fn commit<R: PaymentRecord>(
        &self,
        store: &dyn PaymentRecordStore<R>,
        mut record: R,
        event: TransitionEvent,
    ) -> Result<R, EnrollmentError> {
        let reference = record.reference();
        let kind = event.kind();
        let expected = record.status();

        if let Err(rejected) = record.apply(event) {
            error!(record = %reference, from = %rejected.from, event = %kind, "invalid transition");
            return Err(EnrollmentError::InvalidTransition {
                kind: R::KIND,
                record_id: reference.id,
                from: rejected.from,
                event: kind,
            });
        }
        let events = record.take_events();

        match store.update_if_status(expected, &record).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict { actual, .. }) => {
                error!(record = %reference, expected = %expected, actual = %actual, event = %kind, "status changed concurrently");
                return Err(EnrollmentError::InvalidTransition {
                    kind: R::KIND,
                    record_id: reference.id,
                    from: actual,
                    event: kind,
                });
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            record = %reference,
            tenant_id = %record.tenant_id(),
            from = %expected,
            status = %record.status(),
            "status changed"
        );
        self.publish(events).await;
        Ok(record)
    }

    async fn persist_new<R: PaymentRecord>(
        &self,
        store: &dyn PaymentRecordStore<R>,
        mut record: R,
    ) -> Result<R, EnrollmentError> {
        let events = record.take_events();
        store.insert(&record).await?;
        self.publish(events).await;
        Ok(record)
    }

    /// Publishing happens after the write succeeded; a failure here cannot
    /// undo it, so it is only logged
    async fn publish(&self, events: Vec<DomainEvent>) {
        if events.is_empty() {
            return;
        }
        if let Err(e) = self.ports.events.publish(events).await {
            warn!(error = %e, "failed to publish domain events");
        }
    }

    // =========================================================================
    // Gateway
    // =========================================================================

    /// Ask the gateway for the record's charge and fold the answer in.
    ///
    /// Rejection parks the record in `failed`. An unknown outcome leaves it
    /// `pending` for the webhook or a resubmission to settle.
    async fn submit_charge<R: Chargeable>(&self, record: R, course: &Course) -> Result<R, EnrollmentError> {
        let store = R::store(&self.ports);
        let request = record.charge_request(course);
        let reference = record.reference();
        debug!(record = %reference, key = %request.idempotency_key, amount = %request.amount, "requesting charge");

        match self.ports.gateway.create_charge(&request).await {
            Ok(receipt) => self.record_acceptance(store, record, receipt).await,
            Err(source @ GatewayError::Rejected { .. }) => {
                warn!(record = %reference, error = %source, "gateway rejected charge");
                self.commit(
                    store,
                    record,
                    TransitionEvent::GatewayRejected {
                        reason: source.to_string(),
                    },
                )
                .await?;
                Err(EnrollmentError::Gateway {
                    kind: R::KIND,
                    record_id: reference.id,
                    source,
                })
            }
            Err(source) => {
                warn!(record = %reference, error = %source, "charge outcome unknown, record left pending");
                Err(EnrollmentError::Gateway {
                    kind: R::KIND,
                    record_id: reference.id,
                    source,
                })
            }
        }
    }

    async fn record_acceptance<R: PaymentRecord>(
        &self,
        store: &dyn PaymentRecordStore<R>,
        record: R,
        receipt: ChargeReceipt,
    ) -> Result<R, EnrollmentError> {
        let id = record.record_id();
        let accepted = TransitionEvent::GatewayAccepted {
            transaction_id: receipt.transaction_id.clone(),
            payment_url: receipt.payment_url.clone(),
            bank_slip_url: receipt.bank_slip_url.clone(),
        };

        let record = match self.commit(store, record, accepted).await {
            Ok(record) => record,
            Err(err @ EnrollmentError::InvalidTransition { .. }) => {
                // The webhook may have recorded this very charge first
                return match store.find_by_id(id).await? {
                    Some(current) if current.transaction_id() == Some(receipt.transaction_id.as_str()) => {
                        Ok(current)
                    }
                    _ => Err(err),
                };
            }
            Err(err) => return Err(err),
        };

        if receipt.status == ChargeStatus::Confirmed {
            return self.commit(store, record, TransitionEvent::PaymentConfirmed).await;
        }
        Ok(record)
    }

    /// Re-send the charge of a pending record with its original key
    async fn resubmit<R: Chargeable>(&self, record: R) -> Result<R, EnrollmentError> {
        if record.status() != EnrollmentStatus::Pending {
            return Err(EnrollmentError::InvalidTransition {
                kind: R::KIND,
                record_id: record.record_id(),
                from: record.status(),
                event: TransitionKind::GatewayAccepted,
            });
        }

        let course = self.require_course(record.tenant_id(), record.course()).await?;
        info!(record = %record.reference(), "resubmitting charge");
        self.submit_charge(record, &course).await
    }

    /// A retried create found its record already stored
    async fn replay<R: Chargeable>(&self, operator: &User, existing: R) -> Result<R, EnrollmentError> {
        authorize_tenant(operator, existing.tenant_id())?;
        if !can_see(operator, &existing) {
            return Err(AccessError::Forbidden { role: operator.role }.into());
        }

        debug!(record = %existing.reference(), status = %existing.status(), "replayed create request");
        if existing.status() == EnrollmentStatus::Pending {
            self.resubmit(existing).await
        } else {
            Ok(existing)
        }
    }

    /// Insert, or on a duplicate retried id replay the stored record
    async fn insert_or_replay<R: Chargeable>(
        &self,
        operator: &User,
        record: R,
        retried: bool,
    ) -> Result<Inserted<R>, EnrollmentError> {
        let id = record.record_id();
        match self.persist_new(R::store(&self.ports), record).await {
            Ok(record) => Ok(Inserted::Fresh(record)),
            Err(EnrollmentError::Repository(RepositoryError::DuplicateKey(_))) if retried => {
                let existing = R::store(&self.ports)
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| not_found::<R>(id))?;
                Ok(Inserted::Replayed(self.replay(operator, existing).await?))
            }
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    async fn require_course(&self, tenant_id: TenantId, course_id: CourseId) -> Result<Course, EnrollmentError> {
        self.ports
            .courses
            .find_course(tenant_id, course_id)
            .await?
            .ok_or_else(|| ValidationError::new("courseId", format!("course {course_id} not found")).into())
    }

    /// Every member must exist in the tenant, lack the certification and
    /// not already be invoiced by an open batch for the same course.
    /// One bad member fails the whole batch.
    async fn check_eligibility(
        &self,
        tenant_id: TenantId,
        course_id: CourseId,
        members: &[StudentId],
    ) -> Result<(), EnrollmentError> {
        let open_batches = self.ports.batches.list(tenant_id).await?;
        let invoiced: HashSet<StudentId> = open_batches
            .iter()
            .filter(|b| b.course_id() == course_id && !b.status().is_terminal())
            .flat_map(|b| b.members().iter().copied())
            .collect();

        let mut problems = Vec::new();

        for &student_id in members {
            let Some(student) = self.ports.students.find_student(tenant_id, student_id).await? else {
                problems.push(format!("student {student_id} not found"));
                continue;
            };
            if self.ports.students.is_certified(student.id, course_id).await? {
                problems.push(format!("student {student_id} already certified"));
            } else if invoiced.contains(&student.id) {
                problems.push(format!("student {student_id} already in an open batch"));
            }
        }

        if problems.is_empty() {
            return Ok(());
        }
        warn!(tenant_id = %tenant_id, course_id = %course_id, rejected = problems.len(), "batch has ineligible members");
        Err(ValidationError::new("studentIds", problems.join("; ")).into())
    }

    async fn load_visible<R: Chargeable>(&self, user: &User, id: Uuid) -> Result<R, EnrollmentError> {
        let record = R::store(&self.ports)
            .find(user.tenant_id, id)
            .await?
            .ok_or_else(|| not_found::<R>(id))?;

        authorize_tenant(user, record.tenant_id())?;
        if !can_see(user, &record) {
            return Err(AccessError::Forbidden { role: user.role }.into());
        }
        Ok(record)
    }

    async fn transition_record<R: Chargeable>(
        &self,
        tenant_id: TenantId,
        id: Uuid,
        event: TransitionEvent,
    ) -> Result<R, EnrollmentError> {
        let store = R::store(&self.ports);
        let record = store.find(tenant_id, id).await?.ok_or_else(|| not_found::<R>(id))?;
        self.commit(store, record, event).await
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    async fn reconcile_record<R: Chargeable>(
        &self,
        record: R,
        notification: &PaymentNotification,
    ) -> Result<ReconcileOutcome, EnrollmentError> {
        let reference = record.reference();
        let status = record.status();
        if notification.outcome.is_reflected_in(status) {
            debug!(record = %reference, status = %status, "notification already applied");
            return Ok(ReconcileOutcome::AlreadyApplied { reference, status });
        }

        match self.apply_notification(record, notification).await {
            Ok(record) => Ok(ReconcileOutcome::Applied {
                reference,
                status: record.status(),
            }),
            // A concurrent delivery of the same notification won the update
            Err(EnrollmentError::InvalidTransition { from, .. }) if notification.outcome.is_reflected_in(from) => {
                Ok(ReconcileOutcome::AlreadyApplied { reference, status: from })
            }
            Err(e) => Err(e),
        }
    }

    async fn apply_notification<R: Chargeable>(
        &self,
        record: R,
        notification: &PaymentNotification,
    ) -> Result<R, EnrollmentError> {
        let store = R::store(&self.ports);
        let pending = record.status() == EnrollmentStatus::Pending;

        match &notification.outcome {
            NotificationOutcome::Confirmed => {
                // The charge response never arrived; the notification carries it
                let record = if pending {
                    let accepted = TransitionEvent::GatewayAccepted {
                        transaction_id: notification.transaction_id.clone(),
                        payment_url: notification.payment_url.clone(),
                        bank_slip_url: None,
                    };
                    self.commit(store, record, accepted).await?
                } else {
                    record
                };
                self.commit(store, record, TransitionEvent::PaymentConfirmed).await
            }
            NotificationOutcome::Failed { reason } => {
                let reason = reason.clone();
                let event = if pending {
                    TransitionEvent::GatewayRejected { reason }
                } else {
                    TransitionEvent::PaymentFailed { reason }
                };
                self.commit(store, record, event).await
            }
        }
    }
}

#[async_trait]
impl EnrollmentUseCases for EnrollmentService {
    async fn create_enrollment(
        &self,
        session: &SessionState,
        command: CreateEnrollmentCommand,
    ) -> Result<Enrollment, EnrollmentError> {
        let operator = require_role(session, &Role::OPERATORS)?;
        let draft = command.validate(self.individual_price, today(), self.default_due_days)?;
        let retried = command.request_id.is_some();

        if retried {
            if let Some(existing) = self.ports.enrollments.find_by_id(draft.id).await? {
                return self.replay(operator, existing).await;
            }
        }

        let course = self.require_course(operator.tenant_id, draft.course_id).await?;
        let enrollment = Enrollment::create(draft, operator.tenant_id, operator.id);
        info!(
            enrollment_id = %enrollment.id(),
            tenant_id = %operator.tenant_id,
            consultant_id = %operator.id,
            cpf = %enrollment.student_cpf().masked(),
            amount = %enrollment.amount(),
            "creating enrollment"
        );

        match self.insert_or_replay(operator, enrollment, retried).await? {
            Inserted::Fresh(enrollment) => self.submit_charge(enrollment, &course).await,
            Inserted::Replayed(enrollment) => Ok(enrollment),
        }
    }

    async fn resubmit_enrollment(
        &self,
        session: &SessionState,
        id: EnrollmentId,
    ) -> Result<Enrollment, EnrollmentError> {
        let operator = require_role(session, &Role::OPERATORS)?;
        let enrollment = self.load_visible::<Enrollment>(operator, id).await?;
        self.resubmit(enrollment).await
    }

    async fn create_batch_enrollment(
        &self,
        session: &SessionState,
        command: CreateBatchEnrollmentCommand,
    ) -> Result<BatchEnrollmentPayment, EnrollmentError> {
        let operator = require_role(session, &Role::OPERATORS)?;
        let terms = command.validate(today(), self.default_due_days)?;
        let retried = command.request_id.is_some();

        if retried {
            if let Some(existing) = self.ports.batches.find_by_id(terms.id).await? {
                return self.replay(operator, existing).await;
            }
        }

        let course = self.require_course(operator.tenant_id, command.course_id).await?;
        self.check_eligibility(operator.tenant_id, course.id, &terms.members).await?;

        let draft = BatchDraft {
            id: terms.id,
            course_id: course.id,
            members: terms.members,
            unit_price: self.batch_price,
            payer: terms.payer,
            installments: terms.installments,
            payment_method: terms.payment_method,
            due_date: terms.due_date,
        };
        let batch = BatchEnrollmentPayment::create(draft, operator.tenant_id, operator.id)
            .map_err(|e| ValidationError::new("studentIds", e.to_string()))?;
        info!(
            batch_id = %batch.id(),
            tenant_id = %operator.tenant_id,
            certifications = batch.number_of_certifications(),
            total = %batch.total_value(),
            "creating batch enrollment"
        );

        match self.insert_or_replay(operator, batch, retried).await? {
            Inserted::Fresh(batch) => self.submit_charge(batch, &course).await,
            Inserted::Replayed(batch) => Ok(batch),
        }
    }

    async fn transition(
        &self,
        tenant_id: TenantId,
        id: EnrollmentId,
        event: TransitionEvent,
    ) -> Result<Enrollment, EnrollmentError> {
        self.transition_record(tenant_id, id, event).await
    }

    async fn transition_batch(
        &self,
        tenant_id: TenantId,
        id: BatchId,
        event: TransitionEvent,
    ) -> Result<BatchEnrollmentPayment, EnrollmentError> {
        self.transition_record(tenant_id, id, event).await
    }

    async fn cancel_enrollment(
        &self,
        session: &SessionState,
        id: EnrollmentId,
        reason: Option<String>,
    ) -> Result<Enrollment, EnrollmentError> {
        let operator = require_role(session, &Role::OPERATORS)?;
        let enrollment = self.load_visible::<Enrollment>(operator, id).await?;
        self.commit(
            self.ports.enrollments.as_ref(),
            enrollment,
            TransitionEvent::Cancel { reason },
        )
        .await
    }

    async fn finalize_enrollment(
        &self,
        session: &SessionState,
        id: EnrollmentId,
        student_id: StudentId,
    ) -> Result<Enrollment, EnrollmentError> {
        let admin = require_role(session, &[Role::Admin])?;
        let enrollment = self.load_visible::<Enrollment>(admin, id).await?;

        if self.ports.students.find_student(admin.tenant_id, student_id).await?.is_none() {
            return Err(ValidationError::new("studentId", format!("student {student_id} not found")).into());
        }

        self.commit(
            self.ports.enrollments.as_ref(),
            enrollment,
            TransitionEvent::Finalize {
                student_id: Some(student_id),
            },
        )
        .await
    }

    async fn cancel_batch(
        &self,
        session: &SessionState,
        id: BatchId,
        reason: Option<String>,
    ) -> Result<BatchEnrollmentPayment, EnrollmentError> {
        let operator = require_role(session, &Role::OPERATORS)?;
        let batch = self.load_visible::<BatchEnrollmentPayment>(operator, id).await?;
        self.commit(self.ports.batches.as_ref(), batch, TransitionEvent::Cancel { reason })
            .await
    }

    async fn finalize_batch(
        &self,
        session: &SessionState,
        id: BatchId,
    ) -> Result<BatchEnrollmentPayment, EnrollmentError> {
        let admin = require_role(session, &[Role::Admin])?;
        let batch = self.load_visible::<BatchEnrollmentPayment>(admin, id).await?;
        let batch = self
            .commit(
                self.ports.batches.as_ref(),
                batch,
                TransitionEvent::Finalize { student_id: None },
            )
            .await?;

        for &student_id in batch.members() {
            self.ports
                .students
                .record_certification(student_id, batch.course_id())
                .await?;
        }
        info!(
            batch_id = %batch.id(),
            tenant_id = %batch.tenant_id(),
            certifications = batch.number_of_certifications(),
            "batch certifications recorded"
        );
        Ok(batch)
    }

    async fn get_enrollment(&self, session: &SessionState, id: EnrollmentId) -> Result<Enrollment, EnrollmentError> {
        let operator = require_role(session, &Role::OPERATORS)?;
        self.load_visible(operator, id).await
    }

    async fn list_enrollments(
        &self,
        session: &SessionState,
        filter: EnrollmentFilter,
    ) -> Result<Vec<Enrollment>, EnrollmentError> {
        let operator = require_role(session, &Role::OPERATORS)?;
        let enrollments = self.ports.enrollments.list(operator.tenant_id).await?;

        Ok(enrollments
            .into_iter()
            .filter(|e| can_see(operator, e))
            .filter(|e| filter.status.map_or(true, |s| e.status() == s))
            .filter(|e| filter.course_id.map_or(true, |c| e.course_id() == c))
            .filter(|e| filter.consultant_id.map_or(true, |c| e.consultant_id() == c))
            .collect())
    }

    async fn get_batch(&self, session: &SessionState, id: BatchId) -> Result<BatchEnrollmentPayment, EnrollmentError> {
        let operator = require_role(session, &Role::OPERATORS)?;
        self.load_visible(operator, id).await
    }

    async fn reconcile_payment(&self, notification: PaymentNotification) -> Result<ReconcileOutcome, EnrollmentError> {
        let transaction_id = notification.transaction_id.as_str();

        if let Some(enrollment) = self.ports.enrollments.find_by_transaction(transaction_id).await? {
            return self.reconcile_record(enrollment, &notification).await;
        }
        if let Some(batch) = self.ports.batches.find_by_transaction(transaction_id).await? {
            return self.reconcile_record(batch, &notification).await;
        }

        let reference = notification
            .external_reference
            .as_deref()
            .and_then(|r| r.parse::<RecordRef>().ok());
        match reference {
            Some(RecordRef { kind: RecordKind::Enrollment, id }) => {
                if let Some(enrollment) = self.ports.enrollments.find_by_id(id).await? {
                    return self.reconcile_record(enrollment, &notification).await;
                }
            }
            Some(RecordRef { kind: RecordKind::Batch, id }) => {
                if let Some(batch) = self.ports.batches.find_by_id(id).await? {
                    return self.reconcile_record(batch, &notification).await;
                }
            }
            None => {}
        }

        warn!(
            transaction_id,
            external_reference = notification.external_reference.as_deref().unwrap_or(""),
            "payment notification matches no record"
        );
        Ok(ReconcileOutcome::Unmatched)
    }
}
