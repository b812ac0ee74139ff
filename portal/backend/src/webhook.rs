//! Payment gateway notifications
//!
//! The gateway signs each body as `sha256=<hex(HMAC-SHA256(secret, body))>`
//! in the `X-Webhook-Signature` header.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use edu_enrollment::{PaymentNotification, ReconcileOutcome};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Signature of `body` under `secret`
pub fn sign(secret: &str, body: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

pub fn verify(secret: &str, body: &[u8], provided: Option<&str>) -> Result<(), ApiError> {
    // No secret configured means nothing can be trusted
    if secret.is_empty() {
        tracing::error!("webhook secret not configured, rejecting notification");
        return Err(ApiError::InvalidSignature);
    }
    let Some(provided) = provided else {
        return Err(ApiError::InvalidSignature);
    };
    let expected = sign(secret, body).map_err(|_| ApiError::InvalidSignature)?;
    if bool::from(expected.as_bytes().ct_eq(provided.trim().as_bytes())) {
        Ok(())
    } else {
        Err(ApiError::InvalidSignature)
    }
}

pub async fn payment_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ReconcileOutcome>, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = verify(&state.webhook_secret, &body, signature) {
        tracing::warn!(bytes = body.len(), "payment notification with bad signature");
        return Err(e);
    }

    let notification: PaymentNotification =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    tracing::info!(
        transaction_id = %notification.transaction_id,
        external_reference = notification.external_reference.as_deref().unwrap_or(""),
        "payment notification received"
    );

    let outcome = state.enrollments.reconcile_payment(notification).await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"transactionId":"pay_1","outcome":"confirmed"}"#;

    #[test]
    fn test_sign_and_verify() {
        let signature = sign("s3cret", BODY).unwrap();
        assert!(signature.starts_with("sha256="));
        assert_eq!(signature.len(), "sha256=".len() + 64);

        assert!(verify("s3cret", BODY, Some(&signature)).is_ok());
        assert!(verify("s3cret", BODY, Some(&format!(" {signature} "))).is_ok());
        assert!(verify("other", BODY, Some(&signature)).is_err());
        assert!(verify("s3cret", b"{}", Some(&signature)).is_err());
        assert!(verify("s3cret", BODY, None).is_err());
    }

    #[test]
    fn test_signature_is_keyed_hmac() {
        // RFC 4231 test case 2
        let signature = sign("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_truncated_or_foreign_signatures_fail() {
        let signature = sign("s3cret", BODY).unwrap();
        assert!(verify("s3cret", BODY, Some(&signature[..signature.len() - 1])).is_err());
        assert!(verify("s3cret", BODY, Some("sha256=")).is_err());
        assert!(verify("s3cret", BODY, Some(&signature.replacen("sha256=", "sha1=", 1))).is_err());
    }

    #[test]
    fn test_empty_secret_rejects_everything() {
        let signature = sign("", b"{}").unwrap();
        assert!(matches!(verify("", b"{}", Some(&signature)), Err(ApiError::InvalidSignature)));
    }
}
