//! Money Value Object
//!
//! Amounts are integer centavos (BRL). Decimal rendering happens only at the
//! gateway boundary.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Strictly positive amount in centavos
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Cents(i64);

impl Cents {
    /// Create a positive amount
    pub fn new(value: i64) -> Result<Self, MoneyError> {
        if value <= 0 {
            return Err(MoneyError::NotPositive(value));
        }
        Ok(Self(value))
    }

    /// Raw centavos
    pub fn value(self) -> i64 {
        self.0
    }

    /// Reais as an exact decimal (`15000` → `150.00`)
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// `self × count`, failing on overflow or zero count
    pub fn times(self, count: usize) -> Result<Self, MoneyError> {
        let count = i64::try_from(count).map_err(|_| MoneyError::Overflow)?;
        let total = self.0.checked_mul(count).ok_or(MoneyError::Overflow)?;
        Self::new(total)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R$ {:.2}", self.to_decimal())
    }
}

impl TryFrom<i64> for Cents {
    type Error = MoneyError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Cents> for i64 {
    fn from(cents: Cents) -> Self {
        cents.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("amount must be a positive number of cents, got {0}")]
    NotPositive(i64),
    #[error("amount overflow")]
    Overflow,
}
