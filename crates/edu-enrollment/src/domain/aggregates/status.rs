//! Enrollment lifecycle shared by single enrollments and batch payments

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::StudentId;

/// Lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Pending,
    WaitingPayment,
    PaymentConfirmed,
    Completed,
    Cancelled,
    Failed,
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 6] = [
        Self::Pending,
        Self::WaitingPayment,
        Self::PaymentConfirmed,
        Self::Completed,
        Self::Cancelled,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::WaitingPayment => "waiting_payment",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// No event leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// The whole transition table. `None` means the edge does not exist.
    pub fn next(self, event: TransitionKind) -> Option<Self> {
        use TransitionKind as T;

        match (self, event) {
            (Self::Pending, T::GatewayAccepted) => Some(Self::WaitingPayment),
            (Self::Pending, T::GatewayRejected) => Some(Self::Failed),
            (Self::WaitingPayment, T::PaymentConfirmed) => Some(Self::PaymentConfirmed),
            (Self::WaitingPayment, T::PaymentFailed) => Some(Self::Failed),
            (Self::PaymentConfirmed, T::Finalize) => Some(Self::Completed),
            (Self::Pending | Self::WaitingPayment, T::Cancel) => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown status: {s}"))
    }
}

/// Event name without payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    GatewayAccepted,
    GatewayRejected,
    PaymentConfirmed,
    PaymentFailed,
    Finalize,
    Cancel,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 6] = [
        Self::GatewayAccepted,
        Self::GatewayRejected,
        Self::PaymentConfirmed,
        Self::PaymentFailed,
        Self::Finalize,
        Self::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GatewayAccepted => "gateway_accepted",
            Self::GatewayRejected => "gateway_rejected",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::PaymentFailed => "payment_failed",
            Self::Finalize => "finalize",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened to a payment record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionEvent {
    /// Gateway created the charge and is awaiting payment
    GatewayAccepted {
        transaction_id: String,
        #[serde(default)]
        payment_url: Option<String>,
        #[serde(default)]
        bank_slip_url: Option<String>,
    },
    /// Gateway refused to create the charge
    GatewayRejected { reason: String },
    /// Gateway reports the charge paid
    PaymentConfirmed,
    /// Gateway reports refusal, overdue or expiry
    PaymentFailed { reason: String },
    /// Back office provisions the learner
    Finalize {
        #[serde(default)]
        student_id: Option<StudentId>,
    },
    /// Operator gives up on the enrollment
    Cancel {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl TransitionEvent {
    pub fn kind(&self) -> TransitionKind {
        match self {
            Self::GatewayAccepted { .. } => TransitionKind::GatewayAccepted,
            Self::GatewayRejected { .. } => TransitionKind::GatewayRejected,
            Self::PaymentConfirmed => TransitionKind::PaymentConfirmed,
            Self::PaymentFailed { .. } => TransitionKind::PaymentFailed,
            Self::Finalize { .. } => TransitionKind::Finalize,
            Self::Cancel { .. } => TransitionKind::Cancel,
        }
    }
}

/// Edge missing from the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot apply {event} while {from}")]
pub struct TransitionRejected {
    pub from: EnrollmentStatus,
    pub event: TransitionKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_edges() {
        let mut edges = Vec::new();
        for from in EnrollmentStatus::ALL {
            for event in TransitionKind::ALL {
                if let Some(to) = from.next(event) {
                    edges.push((from.as_str(), event.as_str(), to.as_str()));
                }
            }
        }
        edges.sort();

        let mut expected = vec![
            ("pending", "gateway_accepted", "waiting_payment"),
            ("pending", "gateway_rejected", "failed"),
            ("pending", "cancel", "cancelled"),
            ("waiting_payment", "payment_confirmed", "payment_confirmed"),
            ("waiting_payment", "payment_failed", "failed"),
            ("waiting_payment", "cancel", "cancelled"),
            ("payment_confirmed", "finalize", "completed"),
        ];
        expected.sort();
        assert_eq!(edges, expected);
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in EnrollmentStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for event in TransitionKind::ALL {
                assert_eq!(from.next(event), None, "{from} --{event}-->");
            }
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "waiting_payment".parse::<EnrollmentStatus>(),
            Ok(EnrollmentStatus::WaitingPayment)
        );
        assert!("paid".parse::<EnrollmentStatus>().is_err());
    }

    #[test]
    fn test_event_wire_format() {
        let event: TransitionEvent =
            serde_json::from_str(r#"{"type":"cancel","reason":"desistência"}"#).unwrap();
        assert_eq!(event.kind(), TransitionKind::Cancel);
        let confirmed: TransitionEvent = serde_json::from_str(r#"{"type":"payment_confirmed"}"#).unwrap();
        assert_eq!(confirmed, TransitionEvent::PaymentConfirmed);
    }
}
