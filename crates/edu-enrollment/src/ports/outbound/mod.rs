//! Outbound ports
//!
//! Hexagonal architecture: these are the interfaces that infrastructure must implement.

use async_trait::async_trait;
use chrono::NaiveDate;
use edu_common::TenantId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{EnrollmentStatus, PaymentRecord, RecordRef};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{Cents, IdempotencyKey, Installments, Payer, PaymentMethod};
use crate::error::GatewayError;
use crate::{CourseId, StudentId};

/// Storage for one kind of payment record, keyed by tenant and id
#[async_trait]
pub trait PaymentRecordStore<R: PaymentRecord>: Send + Sync {
    /// Insert a new record; fails if the id is taken
    async fn insert(&self, record: &R) -> Result<(), RepositoryError>;

    /// Find within a tenant
    async fn find(&self, tenant_id: TenantId, id: Uuid) -> Result<Option<R>, RepositoryError>;

    /// Find by id alone; for gateway callbacks, which carry no tenant
    async fn find_by_id(&self, id: Uuid) -> Result<Option<R>, RepositoryError>;

    /// Find by the gateway's transaction id
    async fn find_by_transaction(&self, transaction_id: &str) -> Result<Option<R>, RepositoryError>;

    /// Replace the stored record only if its status is still `expected`.
    /// Compare and write are atomic.
    async fn update_if_status(&self, expected: EnrollmentStatus, record: &R) -> Result<(), RepositoryError>;

    /// All records of a tenant, oldest first
    async fn list(&self, tenant_id: TenantId) -> Result<Vec<R>, RepositoryError>;
}

/// Course as seen by the orchestrator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub tenant_id: TenantId,
    pub name: String,
}

/// Course catalog port
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    async fn find_course(&self, tenant_id: TenantId, course_id: CourseId) -> Result<Option<Course>, RepositoryError>;
}

/// Learner as seen by the orchestrator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: StudentId,
    pub tenant_id: TenantId,
    pub name: String,
}

/// Student directory port
#[async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn find_student(&self, tenant_id: TenantId, student_id: StudentId)
        -> Result<Option<StudentRecord>, RepositoryError>;

    /// Whether the student already holds the course's certification
    async fn is_certified(&self, student_id: StudentId, course_id: CourseId) -> Result<bool, RepositoryError>;

    /// Grant the course's certification; granting twice is a no-op
    async fn record_certification(&self, student_id: StudentId, course_id: CourseId) -> Result<(), RepositoryError>;
}

/// Create-charge request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChargeRequest {
    pub idempotency_key: IdempotencyKey,
    pub external_reference: RecordRef,
    pub description: String,
    pub payer: Payer,
    pub amount: Cents,
    pub installments: Installments,
    pub payment_method: PaymentMethod,
    pub due_date: NaiveDate,
}

/// Gateway-side state of a freshly created charge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    /// Awaiting payment
    Pending,
    /// Already paid (instant card or PIX)
    Confirmed,
}

/// Create-charge response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChargeReceipt {
    pub transaction_id: String,
    pub status: ChargeStatus,
    pub payment_url: Option<String>,
    pub bank_slip_url: Option<String>,
}

/// Payment gateway port
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a charge. Requests carrying the same idempotency key must yield
    /// at most one charge.
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError>;
}

/// Event publisher port
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish domain events
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("not found")]
    NotFound,
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("status changed concurrently: expected {expected}, found {actual}")]
    Conflict {
        expected: EnrollmentStatus,
        actual: EnrollmentStatus,
    },
    #[error("connection error: {0}")]
    ConnectionError(String),
}
