//! Inbound ports (Use case traits)
//!
//! Hexagonal architecture: application service interfaces.

use async_trait::async_trait;
use edu_access::SessionState;
use edu_common::TenantId;

use crate::application::dto::*;
use crate::domain::aggregates::{BatchEnrollmentPayment, Enrollment, TransitionEvent};
use crate::error::EnrollmentError;
use crate::{BatchId, EnrollmentId, StudentId};

/// Enrollment and batch payment use cases.
///
/// Operator-facing calls take the caller's session; gateway-facing calls
/// (`transition`, `reconcile_payment`) are trusted and take ids only.
#[async_trait]
pub trait EnrollmentUseCases: Send + Sync {
    /// Persist a pending enrollment and request its charge
    async fn create_enrollment(
        &self,
        session: &SessionState,
        command: CreateEnrollmentCommand,
    ) -> Result<Enrollment, EnrollmentError>;

    /// Request the charge again for a still-pending enrollment
    async fn resubmit_enrollment(&self, session: &SessionState, id: EnrollmentId)
        -> Result<Enrollment, EnrollmentError>;

    /// One invoice for several certifications, all-or-nothing
    async fn create_batch_enrollment(
        &self,
        session: &SessionState,
        command: CreateBatchEnrollmentCommand,
    ) -> Result<BatchEnrollmentPayment, EnrollmentError>;

    /// Apply a lifecycle event to an enrollment
    async fn transition(
        &self,
        tenant_id: TenantId,
        id: EnrollmentId,
        event: TransitionEvent,
    ) -> Result<Enrollment, EnrollmentError>;

    /// Apply a lifecycle event to a batch
    async fn transition_batch(
        &self,
        tenant_id: TenantId,
        id: BatchId,
        event: TransitionEvent,
    ) -> Result<BatchEnrollmentPayment, EnrollmentError>;

    async fn cancel_enrollment(
        &self,
        session: &SessionState,
        id: EnrollmentId,
        reason: Option<String>,
    ) -> Result<Enrollment, EnrollmentError>;

    /// Provision the learner after payment
    async fn finalize_enrollment(
        &self,
        session: &SessionState,
        id: EnrollmentId,
        student_id: StudentId,
    ) -> Result<Enrollment, EnrollmentError>;

    async fn cancel_batch(
        &self,
        session: &SessionState,
        id: BatchId,
        reason: Option<String>,
    ) -> Result<BatchEnrollmentPayment, EnrollmentError>;

    async fn finalize_batch(&self, session: &SessionState, id: BatchId)
        -> Result<BatchEnrollmentPayment, EnrollmentError>;

    async fn get_enrollment(&self, session: &SessionState, id: EnrollmentId) -> Result<Enrollment, EnrollmentError>;

    async fn list_enrollments(
        &self,
        session: &SessionState,
        filter: EnrollmentFilter,
    ) -> Result<Vec<Enrollment>, EnrollmentError>;

    async fn get_batch(&self, session: &SessionState, id: BatchId) -> Result<BatchEnrollmentPayment, EnrollmentError>;

    /// Fold a gateway notification into the matching record
    async fn reconcile_payment(&self, notification: PaymentNotification) -> Result<ReconcileOutcome, EnrollmentError>;
}
