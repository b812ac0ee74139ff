//! Portal API configuration
//!
//! Read from the JSON file named by `CONFIG_PATH`, defaults otherwise.
//! Secrets come from the environment when set there.

use std::path::Path;
use std::time::Duration;

use edu_access::UnmatchedRolePolicy;
use edu_enrollment::{ConfigError, EnrollmentConfig, GatewayConfig};
use serde::{Deserialize, Serialize};

/// External identity/session service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub base_url: String,
    /// Session cookie forwarded to the identity service
    pub cookie_name: String,
    pub timeout_secs: u64,
}

impl IdentityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".into(),
            cookie_name: "session".into(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub bind_addr: String,
    pub identity: IdentityConfig,
    pub gateway: GatewayConfig,
    /// Pricing and default due date
    #[serde(flatten)]
    pub enrollment: EnrollmentConfig,
    pub unmatched_role_policy: UnmatchedRolePolicy,
    /// Shared secret the gateway signs notifications with
    pub webhook_secret: String,
    /// Optional JSON seed of courses, students and certifications
    pub catalog_path: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            identity: IdentityConfig::default(),
            gateway: GatewayConfig::default(),
            enrollment: EnrollmentConfig::default(),
            unmatched_role_policy: UnmatchedRolePolicy::default(),
            webhook_secret: String::new(),
            catalog_path: None,
        }
    }
}

impl PortalConfig {
    /// Load from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// File from `CONFIG_PATH` (or defaults), then environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("CONFIG_PATH") {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("GATEWAY_API_KEY").filter(|v| !v.is_empty()) {
            self.gateway.api_key = key;
        }
        if let Some(secret) = lookup("WEBHOOK_SECRET").filter(|v| !v.is_empty()) {
            self.webhook_secret = secret;
        }
        if let Some(addr) = lookup("BIND_ADDR").filter(|v| !v.is_empty()) {
            self.bind_addr = addr;
        }
    }
}
