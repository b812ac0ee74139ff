//! Scripted payment gateway
//!
//! Behaves like a real gateway with respect to idempotency keys, with
//! per-call outcomes queued up front.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::GatewayError;
use crate::ports::outbound::{ChargeReceipt, ChargeRequest, ChargeStatus, PaymentGateway};

/// Outcome of the next gateway call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResponse {
    /// Charge created, awaiting payment
    Accept,
    /// Charge created and settled instantly
    AcceptPaid,
    /// Charge refused with this message
    Reject(String),
    /// Transport failure, nothing created
    Unavailable(String),
    /// Charge created but the response was lost
    TimeoutAfterCharge,
}

#[derive(Default)]
struct ScriptState {
    script: VecDeque<ScriptedResponse>,
    charges: HashMap<String, ChargeReceipt>,
    requests: Vec<ChargeRequest>,
}

/// In-process gateway double. Unscripted calls are accepted.
#[derive(Default)]
pub struct ScriptedGateway {
    state: Mutex<ScriptState>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of a future call
    pub fn push(&self, response: ScriptedResponse) {
        self.state.lock().script.push_back(response);
    }

    /// Number of create-charge calls received
    pub fn calls(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Number of distinct charges created
    pub fn charges_created(&self) -> usize {
        self.state.lock().charges.len()
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<ChargeRequest> {
        self.state.lock().requests.clone()
    }

    /// Charge created for an idempotency key
    pub fn charge_for(&self, idempotency_key: &str) -> Option<ChargeReceipt> {
        self.state.lock().charges.get(idempotency_key).cloned()
    }
}

fn receipt(request: &ChargeRequest, status: ChargeStatus) -> ChargeReceipt {
    let transaction_id = format!("pay_{}", &request.idempotency_key.as_str()[..16]);
    ChargeReceipt {
        payment_url: Some(format!("https://checkout.example/i/{transaction_id}")),
        bank_slip_url: None,
        transaction_id,
        status,
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());

        let key = request.idempotency_key.as_str().to_string();
        if let Some(existing) = state.charges.get(&key) {
            return Ok(existing.clone());
        }

        match state.script.pop_front().unwrap_or(ScriptedResponse::Accept) {
            ScriptedResponse::Accept => {
                let created = receipt(request, ChargeStatus::Pending);
                state.charges.insert(key, created.clone());
                Ok(created)
            }
            ScriptedResponse::AcceptPaid => {
                let created = receipt(request, ChargeStatus::Confirmed);
                state.charges.insert(key, created.clone());
                Ok(created)
            }
            ScriptedResponse::Reject(message) => Err(GatewayError::Rejected { message }),
            ScriptedResponse::Unavailable(message) => Err(GatewayError::Unavailable { message }),
            ScriptedResponse::TimeoutAfterCharge => {
                state.charges.insert(key, receipt(request, ChargeStatus::Pending));
                Err(GatewayError::Unavailable {
                    message: "timed out waiting for gateway".into(),
                })
            }
        }
    }
}
