//! Identity & Session Provider port
//!
//! Authentication lives in an external service. This module is the boundary:
//! a trait the rest of the core depends on, an HTTP adapter for the real
//! service and an in-memory one for development and tests.

use async_trait::async_trait;
use edu_common::{CommonError, TenantId, User, UserId};
use parking_lot::RwLock;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::guard::SessionState;
use crate::portal::UnmatchedRolePolicy;

/// Opaque session cookie value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionCredential(String);

impl SessionCredential {
    /// Wrap a raw cookie value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw cookie value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Pick the named cookie out of a `Cookie:` header
    pub fn from_cookie_header(header: &str, cookie_name: &str) -> Option<Self> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == cookie_name && !value.is_empty())
            .map(|(_, value)| Self::new(value))
    }
}

/// Login payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Login email
    pub email: String,
    /// Password
    pub password: String,
}

/// Registration payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// Password
    pub password: String,
    /// Tenant the account joins
    pub tenant_id: TenantId,
}

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Who logged in
    pub user: User,
    /// Session cookie to hand back to the browser
    pub credential: SessionCredential,
}

/// Identity provider errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Wrong email or password
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Provider refused the request
    #[error("identity provider rejected request: {0}")]
    Rejected(String),
    /// Provider unreachable or answered garbage
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    /// Provider returned a role this platform does not know
    #[error("unrecognized role from identity provider: {0}")]
    UnrecognizedRole(String),
}

impl From<CommonError> for IdentityError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::UnrecognizedRole(role) => Self::UnrecognizedRole(role),
        }
    }
}

/// Identity provider port
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// "Who am I": `None` when the credential is not (or no longer) valid
    async fn current_user(&self, credential: &SessionCredential) -> Result<Option<User>, IdentityError>;

    /// Exchange credentials for a session
    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, IdentityError>;

    /// End a session
    async fn logout(&self, credential: &SessionCredential) -> Result<(), IdentityError>;

    /// Create an account
    async fn register(&self, registration: &Registration) -> Result<User, IdentityError>;
}

/// Resolve the session for a request. A missing credential is anonymous
/// without asking the provider.
pub async fn resolve_session(
    provider: &dyn IdentityProvider,
    credential: Option<&SessionCredential>,
) -> Result<SessionState, IdentityError> {
    let Some(credential) = credential else {
        return Ok(SessionState::Anonymous);
    };

    match provider.current_user(credential).await? {
        Some(user) => Ok(SessionState::Authenticated(user)),
        None => Ok(SessionState::Anonymous),
    }
}

// =============================================================================
// HTTP adapter
// =============================================================================

/// User shape on the wire; role is validated separately
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUser {
    id: UserId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    role: String,
    tenant_id: TenantId,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    message: String,
}

/// Identity provider backed by the external session service
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    cookie_name: String,
    role_policy: UnmatchedRolePolicy,
}

impl HttpIdentityProvider {
    /// Build a client for `base_url`
    pub fn new(
        base_url: impl Into<String>,
        cookie_name: impl Into<String>,
        timeout: Duration,
        role_policy: UnmatchedRolePolicy,
    ) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cookie_name: cookie_name.into(),
            role_policy,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn cookie(&self, credential: &SessionCredential) -> String {
        format!("{}={}", self.cookie_name, credential.as_str())
    }

    fn into_user(&self, wire: WireUser) -> Result<User, IdentityError> {
        let role = self.role_policy.interpret_role(&wire.role)?;
        Ok(User {
            id: wire.id,
            name: wire.name,
            email: wire.email,
            role,
            tenant_id: wire.tenant_id,
        })
    }

    async fn read_user(&self, resp: reqwest::Response) -> Result<User, IdentityError> {
        let wire: WireUser = resp
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        self.into_user(wire)
    }
}

async fn rejection(resp: reqwest::Response) -> IdentityError {
    let status = resp.status();
    if status.is_server_error() {
        return IdentityError::Unavailable(format!("HTTP {}", status));
    }
    let message = resp
        .json::<WireError>()
        .await
        .map(|e| e.message)
        .unwrap_or_default();
    if message.is_empty() {
        IdentityError::Rejected(format!("HTTP {}", status))
    } else {
        IdentityError::Rejected(message)
    }
}

fn transport(err: reqwest::Error) -> IdentityError {
    IdentityError::Unavailable(err.to_string())
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn current_user(&self, credential: &SessionCredential) -> Result<Option<User>, IdentityError> {
        let resp = self
            .client
            .get(self.url("/auth/me"))
            .header(COOKIE, self.cookie(credential))
            .send()
            .await
            .map_err(transport)?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        self.read_user(resp).await.map(Some)
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, IdentityError> {
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(credentials)
            .send()
            .await
            .map_err(transport)?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(IdentityError::InvalidCredentials);
        }
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }

        let credential = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .find_map(|pair| SessionCredential::from_cookie_header(pair, &self.cookie_name))
            .ok_or_else(|| IdentityError::Unavailable("login response carried no session cookie".into()))?;

        let user = self.read_user(resp).await?;
        Ok(LoginOutcome { user, credential })
    }

    async fn logout(&self, credential: &SessionCredential) -> Result<(), IdentityError> {
        let resp = self
            .client
            .post(self.url("/auth/logout"))
            .header(COOKIE, self.cookie(credential))
            .send()
            .await
            .map_err(transport)?;

        // An already-expired session is as logged out as it gets
        if resp.status().is_success() || resp.status() == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(rejection(resp).await)
        }
    }

    async fn register(&self, registration: &Registration) -> Result<User, IdentityError> {
        let resp = self
            .client
            .post(self.url("/auth/register"))
            .json(registration)
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        self.read_user(resp).await
    }
}

// =============================================================================
// In-memory provider
// =============================================================================

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password: String,
}

/// In-memory identity provider (development and tests)
#[derive(Debug, Default, Clone)]
pub struct InMemoryIdentityProvider {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    sessions: Arc<RwLock<HashMap<SessionCredential, UserId>>>,
}

impl InMemoryIdentityProvider {
    /// Empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account and open a session for it
    pub fn with_session(&self, user: User) -> SessionCredential {
        let credential = SessionCredential::new(Uuid::new_v4().simple().to_string());
        self.sessions.write().insert(credential.clone(), user.id);
        self.accounts.write().insert(
            user.email.clone(),
            Account {
                user,
                password: String::new(),
            },
        );
        credential
    }

    fn find_user(&self, user_id: UserId) -> Option<User> {
        self.accounts
            .read()
            .values()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn current_user(&self, credential: &SessionCredential) -> Result<Option<User>, IdentityError> {
        let user_id = self.sessions.read().get(credential).copied();
        Ok(user_id.and_then(|id| self.find_user(id)))
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, IdentityError> {
        let account = self
            .accounts
            .read()
            .get(&credentials.email.to_lowercase())
            .cloned()
            .ok_or(IdentityError::InvalidCredentials)?;

        if account.password.is_empty() || account.password != credentials.password {
            return Err(IdentityError::InvalidCredentials);
        }

        let credential = SessionCredential::new(Uuid::new_v4().simple().to_string());
        self.sessions.write().insert(credential.clone(), account.user.id);
        Ok(LoginOutcome {
            user: account.user,
            credential,
        })
    }

    async fn logout(&self, credential: &SessionCredential) -> Result<(), IdentityError> {
        self.sessions.write().remove(credential);
        Ok(())
    }

    async fn register(&self, registration: &Registration) -> Result<User, IdentityError> {
        let email = registration.email.trim().to_lowercase();
        let mut accounts = self.accounts.write();
        if accounts.contains_key(&email) {
            return Err(IdentityError::Rejected("email already registered".into()));
        }

        // Self-registration always yields a learner account
        let user = User {
            id: Uuid::new_v4(),
            name: registration.name.clone(),
            email: email.clone(),
            role: edu_common::Role::Student,
            tenant_id: registration.tenant_id,
        };
        accounts.insert(
            email,
            Account {
                user: user.clone(),
                password: registration.password.clone(),
            },
        );
        Ok(user)
    }
}
