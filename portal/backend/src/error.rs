//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use edu_access::{AccessError, IdentityError};
use edu_enrollment::{EnrollmentError, GatewayError, RepositoryError};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("malformed request: {0}")]
    BadRequest(String),
}

/// JSON error payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_id: Option<Uuid>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            field: None,
            enrollment_id: None,
        }
    }
}

/// Authorization failures never leak their details to the client
fn access_status(err: &AccessError) -> (StatusCode, ErrorBody) {
    match err {
        AccessError::Unauthenticated => (StatusCode::UNAUTHORIZED, ErrorBody::new("authentication required")),
        // Another tenant's data does not exist as far as the caller can tell
        AccessError::CrossTenant { .. } => (StatusCode::NOT_FOUND, ErrorBody::new("not found")),
        AccessError::Forbidden { .. } | AccessError::PortalNotAvailable { .. } | AccessError::NoPortalForRole(_) => {
            (StatusCode::FORBIDDEN, ErrorBody::new("forbidden"))
        }
    }
}

fn enrollment_status(err: &EnrollmentError) -> (StatusCode, ErrorBody) {
    let record_id = err.record_id();
    match err {
        EnrollmentError::Validation(e) => (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                error: e.message.clone(),
                field: Some(e.field),
                enrollment_id: None,
            },
        ),
        EnrollmentError::Access(e) => access_status(e),
        EnrollmentError::Gateway { source, .. } => {
            let status = match source {
                GatewayError::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                GatewayError::Unavailable { .. } => StatusCode::BAD_GATEWAY,
            };
            (
                status,
                ErrorBody {
                    error: source.to_string(),
                    field: None,
                    enrollment_id: record_id,
                },
            )
        }
        EnrollmentError::InvalidTransition { .. } => (
            StatusCode::CONFLICT,
            ErrorBody {
                error: err.to_string(),
                field: None,
                enrollment_id: record_id,
            },
        ),
        EnrollmentError::NotFound { .. } => (StatusCode::NOT_FOUND, ErrorBody::new("not found")),
        EnrollmentError::Repository(RepositoryError::DuplicateKey(_)) => {
            (StatusCode::CONFLICT, ErrorBody::new("duplicate request"))
        }
        EnrollmentError::Repository(e) => {
            tracing::error!(error = %e, "repository failure");
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new("internal error"))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Enrollment(e) => enrollment_status(e),
            ApiError::Access(e) => access_status(e),
            ApiError::Identity(IdentityError::InvalidCredentials) => {
                (StatusCode::UNAUTHORIZED, ErrorBody::new("authentication required"))
            }
            ApiError::Identity(e) => {
                tracing::warn!(error = %e, "identity service failure");
                (StatusCode::SERVICE_UNAVAILABLE, ErrorBody::new("identity service unavailable"))
            }
            ApiError::InvalidSignature => (StatusCode::UNAUTHORIZED, ErrorBody::new(self.to_string())),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, ErrorBody::new(message.clone())),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edu_common::Role;
    use edu_enrollment::{EnrollmentStatus, RecordKind, TransitionKind, ValidationError};

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_status_codes() {
        let id = Uuid::new_v4();
        assert_eq!(
            status_of(EnrollmentError::from(ValidationError::new("studentCpf", "invalid"))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(AccessError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AccessError::Forbidden { role: Role::Student }), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(AccessError::CrossTenant {
                user_tenant: Uuid::new_v4(),
                resource_tenant: Uuid::new_v4(),
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(EnrollmentError::Gateway {
                kind: RecordKind::Enrollment,
                record_id: id,
                source: GatewayError::Rejected { message: "x".into() },
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(EnrollmentError::Gateway {
                kind: RecordKind::Enrollment,
                record_id: id,
                source: GatewayError::Unavailable { message: "x".into() },
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(EnrollmentError::InvalidTransition {
                kind: RecordKind::Batch,
                record_id: id,
                from: EnrollmentStatus::Failed,
                event: TransitionKind::Cancel,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(IdentityError::Unavailable("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
