//! Payment terms: method, installment count, payer and idempotency key

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::{Cpf, Email};

/// How the learner pays
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Payer chooses on the gateway's checkout page
    #[default]
    Undefined,
    Boleto,
    CreditCard,
    Pix,
}

impl PaymentMethod {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "UNDEFINED",
            Self::Boleto => "BOLETO",
            Self::CreditCard => "CREDIT_CARD",
            Self::Pix => "PIX",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installment count, 1 to 12
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Installments(u8);

impl Installments {
    pub const MAX: u8 = 12;

    pub fn new(count: u32) -> Result<Self, InstallmentsError> {
        match u8::try_from(count) {
            Ok(n) if (1..=Self::MAX).contains(&n) => Ok(Self(n)),
            _ => Err(InstallmentsError(count)),
        }
    }

    /// Single payment
    pub fn single() -> Self {
        Self(1)
    }

    pub fn count(self) -> u8 {
        self.0
    }
}

impl Default for Installments {
    fn default() -> Self {
        Self::single()
    }
}

impl TryFrom<u32> for Installments {
    type Error = InstallmentsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Installments> for u32 {
    fn from(value: Installments) -> Self {
        u32::from(value.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("installments must be between 1 and 12, got {0}")]
pub struct InstallmentsError(pub u32);

/// Who the gateway charges
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payer {
    pub name: String,
    pub document: Cpf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
}

/// Key the gateway uses to collapse repeated charge requests.
///
/// Derived from the record id alone, so every submission of the same
/// enrollment carries the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Hex SHA-256 of the hyphenated id
    pub fn derive(id: Uuid) -> Self {
        let digest = Sha256::digest(id.to_string().as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentMethod::CreditCard).unwrap(), "\"CREDIT_CARD\"");
        let pix: PaymentMethod = serde_json::from_str("\"PIX\"").unwrap();
        assert_eq!(pix, PaymentMethod::Pix);
        assert_eq!(PaymentMethod::default(), PaymentMethod::Undefined);
        assert!(serde_json::from_str::<PaymentMethod>("\"CASH\"").is_err());
    }

    #[test]
    fn test_installments_bounds() {
        assert!(Installments::new(0).is_err());
        assert_eq!(Installments::new(1).unwrap().count(), 1);
        assert_eq!(Installments::new(12).unwrap().count(), 12);
        assert_eq!(Installments::new(13), Err(InstallmentsError(13)));
        assert_eq!(Installments::new(257), Err(InstallmentsError(257)));
    }

    #[test]
    fn test_idempotency_key_is_stable() {
        let id = Uuid::new_v4();
        let key = IdempotencyKey::derive(id);
        assert_eq!(key, IdempotencyKey::derive(id));
        assert_ne!(key, IdempotencyKey::derive(Uuid::new_v4()));
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
