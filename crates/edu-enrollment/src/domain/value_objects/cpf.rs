//! CPF Value Object
//!
//! Brazilian individual taxpayer number. Eleven digits, the last two being
//! mod-11 check digits over the preceding ones.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const CPF_LEN: usize = 11;

/// Check whether `raw` is a valid CPF.
///
/// Formatting is ignored: every non-digit is stripped first, so
/// `529.982.247-25` and `52998224725` give the same answer. Never panics.
pub fn is_valid_cpf(raw: &str) -> bool {
    let digits: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();
    has_valid_digits(&digits)
}

fn has_valid_digits(digits: &[u32]) -> bool {
    if digits.len() != CPF_LEN {
        return false;
    }

    // Repdigits pass the checksum but are never issued
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

/// Weights run from `len + 1` down to 2
fn check_digit(digits: &[u32]) -> u32 {
    let top = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (top - i as u32))
        .sum();

    match (sum * 10) % 11 {
        10 | 11 => 0,
        r => r,
    }
}

/// Validated CPF, stored as its 11 canonical digits
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cpf(String);

impl Cpf {
    /// Parse any formatting of a valid CPF
    pub fn parse(raw: &str) -> Result<Self, CpfError> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() != CPF_LEN {
            return Err(CpfError::Length(digits.len()));
        }
        if !is_valid_cpf(&digits) {
            return Err(CpfError::Checksum);
        }
        Ok(Self(digits))
    }

    /// The 11 digits, unformatted
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// Masked form for logs: `***.***.*47-25`
    pub fn masked(&self) -> String {
        format!("***.***.*{}-{}", &self.0[7..9], &self.0[9..])
    }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.0;
        write!(f, "{}.{}.{}-{}", &d[..3], &d[3..6], &d[6..9], &d[9..])
    }
}

impl TryFrom<String> for Cpf {
    type Error = CpfError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Cpf> for String {
    fn from(cpf: Cpf) -> Self {
        cpf.0
    }
}

/// CPF parse failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpfError {
    #[error("CPF must have 11 digits, got {0}")]
    Length(usize),
    #[error("CPF check digits do not match")]
    Checksum,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Append both check digits to a 9-digit base
    fn complete(base: &[u32]) -> String {
        let mut digits = base.to_vec();
        digits.push(check_digit(&digits));
        digits.push(check_digit(&digits));
        digits.iter().map(|d| char::from_digit(*d, 10).unwrap()).collect()
    }

    #[test]
    fn test_known_cpfs() {
        assert!(is_valid_cpf("52998224725"));
        assert!(is_valid_cpf("529.982.247-25"));
        assert!(!is_valid_cpf("11111111111"));
        assert!(!is_valid_cpf("111.111.111-11"));
        assert!(!is_valid_cpf("123"));
        assert!(!is_valid_cpf("52998224724"));
        assert!(!is_valid_cpf(""));
    }

    #[test]
    fn test_repdigits_invalid() {
        for d in 0..=9 {
            let cpf: String = std::iter::repeat(char::from_digit(d, 10).unwrap())
                .take(11)
                .collect();
            assert!(!is_valid_cpf(&cpf), "{cpf}");
        }
    }

    #[test]
    fn test_parse_and_display() {
        let cpf = Cpf::parse(" 529.982.247-25 ").unwrap();
        assert_eq!(cpf.digits(), "52998224725");
        assert_eq!(cpf.to_string(), "529.982.247-25");
        assert_eq!(cpf.masked(), "***.***.*47-25");
        assert_eq!(Cpf::parse("123"), Err(CpfError::Length(3)));
        assert_eq!(Cpf::parse("111.111.111-11"), Err(CpfError::Checksum));
    }

    #[test]
    fn test_serde_uses_digits() {
        let cpf = Cpf::parse("529.982.247-25").unwrap();
        let json = serde_json::to_string(&cpf).unwrap();
        assert_eq!(json, "\"52998224725\"");
        let back: Cpf = serde_json::from_str("\"529.982.247-25\"").unwrap();
        assert_eq!(back, cpf);
        assert!(serde_json::from_str::<Cpf>("\"11111111111\"").is_err());
    }

    #[test]
    fn test_non_ascii_is_total() {
        assert!(!is_valid_cpf("٥٢٩٩٨٢٢٤٧٢٥"));
        assert!(!is_valid_cpf("\u{0}\u{FFFF}"));
    }

    proptest! {
        #[test]
        fn prop_formatting_insensitive(
            digits in prop::collection::vec(0u32..10, 11),
            noise in prop::collection::vec(prop::sample::select(vec!['.', '-', ' ', '/', 'x']), 11),
        ) {
            let plain: String = digits.iter().map(|d| char::from_digit(*d, 10).unwrap()).collect();
            let noisy: String = plain.chars().zip(noise).flat_map(|(c, n)| [n, c]).collect();
            prop_assert_eq!(is_valid_cpf(&plain), is_valid_cpf(&noisy));
        }

        #[test]
        fn prop_generated_check_digits_valid(base in prop::collection::vec(0u32..10, 9)) {
            let cpf = complete(&base);
            let repdigit = cpf.chars().all(|c| c == cpf.as_bytes()[0] as char);
            prop_assert_eq!(is_valid_cpf(&cpf), !repdigit);
        }

        #[test]
        fn prop_never_panics(raw in ".*") {
            let _ = is_valid_cpf(&raw);
        }
    }
}
