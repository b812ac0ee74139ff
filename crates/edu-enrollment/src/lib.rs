//! EduPortal Enrollment/Payment Orchestrator
//!
//! Owns the simplified-enrollment state machine end to end, for single
//! learners and for batch invoices covering many certifications.
//!
//! ## Architecture
//!
//! - **Domain Layer**: CPF and other value objects, the `Enrollment` and
//!   `BatchEnrollmentPayment` aggregates, the shared status machine, events
//! - **Application Layer**: `EnrollmentService`, commands and read filters
//! - **Ports Layer**: use-case trait inbound; repositories, course catalog,
//!   student directory, payment gateway and event publisher outbound
//! - **Infrastructure Layer**: in-memory stores, HTTP gateway adapter,
//!   scripted gateway
//!
//! ## Lifecycle
//!
//! ```text
//! pending ──accepted──► waiting_payment ──confirmed──► payment_confirmed ──finalize──► completed
//!    │                        │
//!    ├──rejected──► failed ◄──┤ failed/expired
//!    └──cancel──► cancelled ◄─┘ cancel
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ports;

pub use application::{
    CreateBatchEnrollmentCommand, CreateEnrollmentCommand, EnrollmentFilter, EnrollmentService,
    NotificationOutcome, PayerInput, PaymentNotification, ReconcileOutcome, ServicePorts,
};
pub use config::{ConfigError, EnrollmentConfig, GatewayConfig, PricingPolicy};
pub use domain::aggregates::{
    BatchEnrollmentPayment, Enrollment, EnrollmentStatus, PaymentRecord, RecordKind, RecordRef,
    TransitionEvent, TransitionKind,
};
pub use domain::value_objects::{
    is_valid_cpf, Cents, Cpf, Email, IdempotencyKey, Installments, Payer, PaymentMethod, Phone,
};
pub use error::{EnrollmentError, GatewayError, ValidationError};
pub use ports::inbound::EnrollmentUseCases;
pub use ports::outbound::{
    ChargeReceipt, ChargeRequest, ChargeStatus, Course, CourseCatalog, EventPublisher,
    PaymentGateway, PaymentRecordStore, RepositoryError, StudentDirectory, StudentRecord,
};

/// Course ID
pub type CourseId = uuid::Uuid;
/// Student ID (learner account)
pub type StudentId = uuid::Uuid;
/// Hub/unit ID
pub type PoloId = uuid::Uuid;
/// Enrollment ID
pub type EnrollmentId = uuid::Uuid;
/// Batch payment ID
pub type BatchId = uuid::Uuid;
