//! Data Transfer Objects (DTOs)
//!
//! Commands as they arrive from the HTTP layer, validated into domain drafts
//! before anything is persisted.

use chrono::{Days, NaiveDate};
use edu_common::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::aggregates::{EnrollmentDraft, EnrollmentStatus, RecordRef};
use crate::domain::value_objects::{Cents, Cpf, Email, Installments, Payer, PaymentMethod, Phone};
use crate::error::ValidationError;
use crate::{CourseId, PoloId, StudentId};

const MIN_NAME_LEN: usize = 3;

fn one() -> u32 {
    1
}

// =============================================================================
// Enrollment Commands
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollmentCommand {
    /// Client-chosen id; retries with the same value reach the same enrollment
    #[serde(default)]
    pub request_id: Option<Uuid>,
    pub course_id: CourseId,
    pub student_name: String,
    pub student_email: String,
    pub student_cpf: String,
    #[serde(default)]
    pub student_phone: Option<String>,
    #[serde(default)]
    pub polo_id: Option<PoloId>,
    /// Centavos; the individual unit price when absent
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default = "one")]
    pub installments: u32,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl CreateEnrollmentCommand {
    /// Check every field and build the draft. The first bad field wins.
    pub fn validate(
        &self,
        default_amount: Cents,
        today: NaiveDate,
        default_due_days: u32,
    ) -> Result<EnrollmentDraft, ValidationError> {
        let student_name = self.student_name.trim();
        if student_name.chars().count() < MIN_NAME_LEN {
            return Err(ValidationError::new(
                "studentName",
                format!("must have at least {MIN_NAME_LEN} characters"),
            ));
        }

        let student_email =
            Email::new(self.student_email.as_str()).map_err(|e| ValidationError::new("studentEmail", e.to_string()))?;
        let student_cpf = Cpf::parse(&self.student_cpf).map_err(|e| ValidationError::new("studentCpf", e.to_string()))?;
        let student_phone = self
            .student_phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(Phone::new)
            .transpose()
            .map_err(|e| ValidationError::new("studentPhone", e.to_string()))?;

        let amount = match self.amount {
            Some(cents) => Cents::new(cents).map_err(|e| ValidationError::new("amount", e.to_string()))?,
            None => default_amount,
        };

        let (installments, payment_method) = payment_terms(self.installments, self.payment_method)?;
        let due_date = due_date(self.due_date, today, default_due_days)?;

        Ok(EnrollmentDraft {
            id: self.request_id.unwrap_or_else(Uuid::new_v4),
            course_id: self.course_id,
            student_name: student_name.to_string(),
            student_email,
            student_cpf,
            student_phone,
            polo_id: self.polo_id,
            amount,
            installments,
            payment_method,
            due_date,
        })
    }
}

/// Who pays a batch invoice
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayerInput {
    pub name: String,
    pub document: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl PayerInput {
    fn validate(&self) -> Result<Payer, ValidationError> {
        let name = self.name.trim();
        if name.chars().count() < MIN_NAME_LEN {
            return Err(ValidationError::new(
                "payer.name",
                format!("must have at least {MIN_NAME_LEN} characters"),
            ));
        }
        let document = Cpf::parse(&self.document).map_err(|e| ValidationError::new("payer.document", e.to_string()))?;
        let email = self
            .email
            .as_deref()
            .map(Email::new)
            .transpose()
            .map_err(|e| ValidationError::new("payer.email", e.to_string()))?;

        Ok(Payer {
            name: name.to_string(),
            document,
            email,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchEnrollmentCommand {
    #[serde(default)]
    pub request_id: Option<Uuid>,
    pub course_id: CourseId,
    pub student_ids: Vec<StudentId>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub payer: PayerInput,
    #[serde(default = "one")]
    pub installments: u32,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

/// Batch command after field validation; eligibility is checked separately
#[derive(Clone, Debug)]
pub struct BatchTerms {
    pub id: Uuid,
    pub members: Vec<StudentId>,
    pub payer: Payer,
    pub installments: Installments,
    pub payment_method: PaymentMethod,
    pub due_date: NaiveDate,
}

impl CreateBatchEnrollmentCommand {
    pub fn validate(&self, today: NaiveDate, default_due_days: u32) -> Result<BatchTerms, ValidationError> {
        if self.student_ids.is_empty() {
            return Err(ValidationError::new("studentIds", "at least one student is required"));
        }

        let mut seen = HashSet::with_capacity(self.student_ids.len());
        if let Some(duplicate) = self.student_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(ValidationError::new("studentIds", format!("student {duplicate} listed twice")));
        }

        let payer = self.payer.validate()?;
        let (installments, payment_method) = payment_terms(self.installments, self.payment_method)?;
        let due_date = due_date(self.due_date, today, default_due_days)?;

        Ok(BatchTerms {
            id: self.request_id.unwrap_or_else(Uuid::new_v4),
            members: self.student_ids.clone(),
            payer,
            installments,
            payment_method,
            due_date,
        })
    }
}

fn payment_terms(installments: u32, method: PaymentMethod) -> Result<(Installments, PaymentMethod), ValidationError> {
    let installments = Installments::new(installments).map_err(|e| ValidationError::new("installments", e.to_string()))?;
    Ok((installments, method))
}

fn due_date(requested: Option<NaiveDate>, today: NaiveDate, default_days: u32) -> Result<NaiveDate, ValidationError> {
    match requested {
        Some(date) if date < today => Err(ValidationError::new("dueDate", "cannot be in the past")),
        Some(date) => Ok(date),
        None => today
            .checked_add_days(Days::new(u64::from(default_days)))
            .ok_or_else(|| ValidationError::new("dueDate", "out of range")),
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Narrowing for enrollment listings. Visibility rules apply on top.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentFilter {
    #[serde(default)]
    pub status: Option<EnrollmentStatus>,
    #[serde(default)]
    pub course_id: Option<CourseId>,
    #[serde(default)]
    pub consultant_id: Option<UserId>,
}

// =============================================================================
// Gateway notifications
// =============================================================================

/// What the gateway says happened to a charge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Confirmed,
    Failed { reason: String },
}

impl NotificationOutcome {
    /// Whether a record in `status` already reflects this outcome
    pub fn is_reflected_in(&self, status: EnrollmentStatus) -> bool {
        match self {
            Self::Confirmed => matches!(status, EnrollmentStatus::PaymentConfirmed | EnrollmentStatus::Completed),
            Self::Failed { .. } => status == EnrollmentStatus::Failed,
        }
    }
}

/// Normalized gateway callback
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotification {
    pub transaction_id: String,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub payment_url: Option<String>,
    #[serde(flatten)]
    pub outcome: NotificationOutcome,
}

/// Result of reconciling a notification
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// State moved
    Applied { reference: RecordRef, status: EnrollmentStatus },
    /// Record already reflected the notification
    AlreadyApplied { reference: RecordRef, status: EnrollmentStatus },
    /// No record matches
    Unmatched,
}
