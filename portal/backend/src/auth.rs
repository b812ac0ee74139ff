//! Session extraction
//!
//! Every request resolves its session through the identity service using the
//! session cookie. Authorization itself happens in the handlers and the
//! orchestrator, never here.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::COOKIE, request::Parts},
};
use edu_access::{resolve_session, SessionCredential, SessionState};

use crate::error::ApiError;
use crate::AppState;

/// Resolved session of the caller; `Anonymous` without a valid cookie
#[derive(Debug, Clone)]
pub struct CurrentSession(pub SessionState);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|header| SessionCredential::from_cookie_header(header, &state.cookie_name));

        let session = resolve_session(state.identity.as_ref(), credential.as_ref()).await?;
        if let Some(user) = session.user() {
            tracing::debug!(user_id = %user.id, role = %user.role, tenant_id = %user.tenant_id, "session resolved");
        }
        Ok(Self(session))
    }
}
