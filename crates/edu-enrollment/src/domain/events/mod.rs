//! Domain Events
//!
//! Raised by the aggregates, drained by the service after a successful write.

use chrono::{DateTime, Utc};
use edu_common::{TenantId, UserId};
use serde::Serialize;

use crate::domain::aggregates::{EnrollmentStatus, RecordRef, TransitionKind};
use crate::domain::value_objects::Cents;
use crate::{BatchId, CourseId, EnrollmentId};

/// All domain events in the enrollment bounded context
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    EnrollmentCreated {
        enrollment_id: EnrollmentId,
        tenant_id: TenantId,
        course_id: CourseId,
        consultant_id: UserId,
        amount: Cents,
        created_at: DateTime<Utc>,
    },

    BatchCreated {
        batch_id: BatchId,
        tenant_id: TenantId,
        course_id: CourseId,
        consultant_id: UserId,
        certifications: usize,
        total_value: Cents,
        created_at: DateTime<Utc>,
    },

    StatusChanged {
        record: RecordRef,
        tenant_id: TenantId,
        from: EnrollmentStatus,
        to: EnrollmentStatus,
        cause: TransitionKind,
        changed_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Routing key for publishers
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::EnrollmentCreated { .. } => "enrollment.created",
            Self::BatchCreated { .. } => "batch.created",
            Self::StatusChanged { record, .. } => match record.kind {
                crate::domain::aggregates::RecordKind::Enrollment => "enrollment.status_changed",
                crate::domain::aggregates::RecordKind::Batch => "batch.status_changed",
            },
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            Self::EnrollmentCreated { tenant_id, .. }
            | Self::BatchCreated { tenant_id, .. }
            | Self::StatusChanged { tenant_id, .. } => *tenant_id,
        }
    }
}
