//! Phone Value Object
//!
//! Brazilian phone number: area code plus 8 or 9 digit subscriber number,
//! optionally prefixed with the `55` country code.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Phone number, stored as digits only
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    /// Parse a phone number, ignoring punctuation and spaces
    pub fn new(value: &str) -> Result<Self, PhoneError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(PhoneError::Empty);
        }

        if value
            .chars()
            .any(|c| !(c.is_ascii_digit() || matches!(c, '+' | '(' | ')' | '-' | '.' | ' ')))
        {
            return Err(PhoneError::InvalidCharacters);
        }

        let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
        if !(10..=13).contains(&digits.len()) {
            return Err(PhoneError::InvalidLength(digits.len()));
        }

        Ok(Self(digits))
    }

    /// Digits only
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Phone {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    #[error("phone cannot be empty")]
    Empty,
    #[error("phone contains invalid characters")]
    InvalidCharacters,
    #[error("phone must have 10 to 13 digits, got {0}")]
    InvalidLength(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_formats() {
        let mobile = Phone::new("(11) 98765-4321").unwrap();
        assert_eq!(mobile.as_str(), "11987654321");

        let intl = Phone::new("+55 21 3456-7890").unwrap();
        assert_eq!(intl.as_str(), "552134567890");
    }

    #[test]
    fn test_invalid_phones() {
        assert_eq!(Phone::new("  "), Err(PhoneError::Empty));
        assert_eq!(Phone::new("11 9876x4321"), Err(PhoneError::InvalidCharacters));
        assert_eq!(Phone::new("98765-4321"), Err(PhoneError::InvalidLength(9)));
    }
}
