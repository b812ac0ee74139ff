//! API Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use edu_access::{AuthContext, Decision, Portal};
use edu_enrollment::{
    BatchEnrollmentPayment, CreateBatchEnrollmentCommand, CreateEnrollmentCommand, Enrollment, EnrollmentFilter,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CurrentSession;
use crate::error::ApiError;
use crate::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// =============================================================================
// Portals
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalsView {
    pub portals: Vec<Portal>,
    pub current: Portal,
}

#[derive(Debug, Deserialize)]
pub struct SelectPortalRequest {
    pub portal: String,
}

pub async fn list_portals(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<PortalsView>, ApiError> {
    let mut context = AuthContext::new(session);
    let portals = context.available_portals(&state.portals)?;
    let current = context.restore_portal(&state.portals, state.preferences.as_ref())?;
    Ok(Json(PortalsView { portals, current }))
}

pub async fn select_portal(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(request): Json<SelectPortalRequest>,
) -> Result<Json<Portal>, ApiError> {
    let mut context = AuthContext::new(session);
    let portal = context.select_portal_by_name(&state.portals, state.preferences.as_ref(), &request.portal)?;
    Ok(Json(portal))
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub path: String,
}

/// Route decision for a client-side path, with the advisory portal redirect
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteCheck {
    pub path: String,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
}

pub async fn authorize_path(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<AuthorizeQuery>,
) -> Json<RouteCheck> {
    let mut context = AuthContext::new(session);
    let decision = context.authorize_path(&state.routes, &query.path);

    let redirect = match decision {
        Decision::Render => context
            .restore_portal(&state.portals, state.preferences.as_ref())
            .ok()
            .and_then(|_| context.navigation_correction(&query.path)),
        _ => None,
    };

    Json(RouteCheck {
        path: query.path,
        decision,
        redirect,
    })
}

// =============================================================================
// Enrollments
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub student_id: Uuid,
}

pub async fn create_enrollment(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(command): Json<CreateEnrollmentCommand>,
) -> Result<(StatusCode, Json<Enrollment>), ApiError> {
    let enrollment = state.enrollments.create_enrollment(&session, command).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn list_enrollments(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(filter): Query<EnrollmentFilter>,
) -> Result<Json<Vec<Enrollment>>, ApiError> {
    Ok(Json(state.enrollments.list_enrollments(&session, filter).await?))
}

pub async fn get_enrollment(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<Json<Enrollment>, ApiError> {
    Ok(Json(state.enrollments.get_enrollment(&session, id).await?))
}

pub async fn cancel_enrollment(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    request: Option<Json<CancelRequest>>,
) -> Result<Json<Enrollment>, ApiError> {
    let reason = request.and_then(|Json(r)| r.reason);
    Ok(Json(state.enrollments.cancel_enrollment(&session, id, reason).await?))
}

pub async fn finalize_enrollment(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    Json(request): Json<FinalizeRequest>,
) -> Result<Json<Enrollment>, ApiError> {
    Ok(Json(
        state
            .enrollments
            .finalize_enrollment(&session, id, request.student_id)
            .await?,
    ))
}

pub async fn resubmit_enrollment(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<Json<Enrollment>, ApiError> {
    Ok(Json(state.enrollments.resubmit_enrollment(&session, id).await?))
}

// =============================================================================
// Batches
// =============================================================================

pub async fn create_batch(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(command): Json<CreateBatchEnrollmentCommand>,
) -> Result<(StatusCode, Json<BatchEnrollmentPayment>), ApiError> {
    let batch = state.enrollments.create_batch_enrollment(&session, command).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

pub async fn get_batch(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchEnrollmentPayment>, ApiError> {
    Ok(Json(state.enrollments.get_batch(&session, id).await?))
}

pub async fn cancel_batch(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    request: Option<Json<CancelRequest>>,
) -> Result<Json<BatchEnrollmentPayment>, ApiError> {
    let reason = request.and_then(|Json(r)| r.reason);
    Ok(Json(state.enrollments.cancel_batch(&session, id, reason).await?))
}

pub async fn finalize_batch(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchEnrollmentPayment>, ApiError> {
    Ok(Json(state.enrollments.finalize_batch(&session, id).await?))
}
