//! Orchestrator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::value_objects::Cents;

/// Unit prices in centavos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Default amount of a single enrollment
    pub individual_unit_price: i64,
    /// Price of each certification in a batch invoice
    pub batch_unit_price: i64,
}

impl PricingPolicy {
    /// Both prices as validated amounts
    pub fn unit_prices(&self) -> Result<(Cents, Cents), ConfigError> {
        let individual = Cents::new(self.individual_unit_price)
            .map_err(|_| ConfigError::InvalidPrice("individual_unit_price"))?;
        let batch =
            Cents::new(self.batch_unit_price).map_err(|_| ConfigError::InvalidPrice("batch_unit_price"))?;
        Ok((individual, batch))
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            individual_unit_price: 15000,
            batch_unit_price: 9900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    pub pricing: PricingPolicy,
    /// Due date offset when the caller gives none
    pub default_due_days: u32,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            default_due_days: 3,
        }
    }
}

/// Payment gateway endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sandbox.asaas.com/api/v3".into(),
            api_key: String::new(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be a positive number of cents")]
    InvalidPrice(&'static str),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EnrollmentConfig = serde_json::from_str(r#"{"default_due_days": 7}"#).unwrap();
        assert_eq!(config.default_due_days, 7);
        assert_eq!(config.pricing, PricingPolicy::default());
    }

    #[test]
    fn test_prices_must_be_positive() {
        let pricing = PricingPolicy {
            individual_unit_price: 15000,
            batch_unit_price: 0,
        };
        assert!(matches!(pricing.unit_prices(), Err(ConfigError::InvalidPrice("batch_unit_price"))));
        assert!(PricingPolicy::default().unit_prices().is_ok());
    }
}
