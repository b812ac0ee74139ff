//! HTTP payment gateway adapter
//!
//! `POST {base}/payments` with the API key in `access_token` and the
//! record's idempotency key in `Idempotency-Key`. Amounts go over the wire
//! as exact decimal strings in reais, rendered from cents.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::ports::outbound::{ChargeReceipt, ChargeRequest, ChargeStatus, PaymentGateway};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChargeBody<'a> {
    description: &'a str,
    external_reference: String,
    payer_name: &'a str,
    payer_document: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payer_email: Option<&'a str>,
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
    installments: u8,
    payment_method: &'static str,
    due_date: NaiveDate,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChargeResponse {
    transaction_id: String,
    status: String,
    #[serde(default)]
    payment_url: Option<String>,
    #[serde(default)]
    bank_slip_url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorItem {
    description: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<ErrorItem>,
    #[serde(default)]
    message: Option<String>,
}

/// reqwest-backed [`PaymentGateway`]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Unavailable { message: e.to_string() })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

/// Map the gateway's status vocabulary. Unknown statuses are treated as
/// still pending; the webhook settles them.
fn charge_status(raw: &str) -> Result<ChargeStatus, GatewayError> {
    match raw.to_ascii_uppercase().as_str() {
        "CONFIRMED" | "RECEIVED" | "PAID" | "RECEIVED_IN_CASH" => Ok(ChargeStatus::Confirmed),
        "REFUSED" | "FAILED" | "DECLINED" | "CANCELLED" => Err(GatewayError::Rejected {
            message: format!("charge {raw}"),
        }),
        _ => Ok(ChargeStatus::Pending),
    }
}

/// The gateway's own error text, verbatim when present
fn rejection_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed
            .errors
            .into_iter()
            .map(|e| e.description)
            .collect::<Vec<_>>()
            .join("; "),
        Ok(ErrorResponse { message: Some(message), .. }) => message,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => format!("gateway returned {status}"),
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        let body = ChargeBody {
            description: &request.description,
            external_reference: request.external_reference.to_string(),
            payer_name: &request.payer.name,
            payer_document: request.payer.document.digits(),
            payer_email: request.payer.email.as_ref().map(|e| e.as_str()),
            amount: request.amount.to_decimal(),
            installments: request.installments.count(),
            payment_method: request.payment_method.as_str(),
            due_date: request.due_date,
        };

        let response = self
            .client
            .post(format!("{}/payments", self.base_url))
            .header("access_token", &self.api_key)
            .header("Idempotency-Key", request.idempotency_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable { message: e.to_string() })?;

        let status = response.status();
        if status.is_client_error() {
            let text = response.text().await.unwrap_or_default();
            let message = rejection_message(status, &text);
            warn!(%status, reference = %request.external_reference, %message, "gateway rejected charge");
            return Err(GatewayError::Rejected { message });
        }
        if !status.is_success() {
            return Err(GatewayError::Unavailable {
                message: format!("gateway returned {status}"),
            });
        }

        // The charge exists from here on; an unreadable body is an unknown outcome
        let parsed: ChargeResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Unavailable { message: e.to_string() })?;
        debug!(transaction_id = %parsed.transaction_id, status = %parsed.status, "charge created");

        Ok(ChargeReceipt {
            status: charge_status(&parsed.status)?,
            transaction_id: parsed.transaction_id,
            payment_url: parsed.payment_url,
            bank_slip_url: parsed.bank_slip_url,
        })
    }
}
