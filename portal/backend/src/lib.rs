//! EduPortal API
//!
//! axum surface over the enrollment orchestrator and the portal registry.
//! Sessions come from the external identity service; every operation is
//! authorized by the access guard before it reaches the orchestrator.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use edu_access::{IdentityProvider, PortalPreferenceStore, PortalRegistry, RouteTable};
use edu_enrollment::EnrollmentUseCases;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod webhook;

pub use config::{IdentityConfig, PortalConfig};
pub use error::{ApiError, ErrorBody};

use handlers::*;

#[derive(Clone)]
pub struct AppState {
    pub enrollments: Arc<dyn EnrollmentUseCases>,
    pub identity: Arc<dyn IdentityProvider>,
    pub portals: Arc<PortalRegistry>,
    pub routes: Arc<RouteTable>,
    pub preferences: Arc<dyn PortalPreferenceStore>,
    pub cookie_name: Arc<str>,
    pub webhook_secret: Arc<str>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))

        // Portals
        .route("/api/portals", get(list_portals))
        .route("/api/portals/select", post(select_portal))
        .route("/api/authorize", get(authorize_path))

        // Enrollments
        .route("/api/enrollments", get(list_enrollments).post(create_enrollment))
        .route("/api/enrollments/:id", get(get_enrollment))
        .route("/api/enrollments/:id/cancel", post(cancel_enrollment))
        .route("/api/enrollments/:id/finalize", post(finalize_enrollment))
        .route("/api/enrollments/:id/resubmit", post(resubmit_enrollment))

        // Batches
        .route("/api/enrollments/batch", post(create_batch))
        .route("/api/enrollments/batch/:id", get(get_batch))
        .route("/api/enrollments/batch/:id/cancel", post(cancel_batch))
        .route("/api/enrollments/batch/:id/finalize", post(finalize_batch))

        // Gateway callbacks
        .route("/webhooks/payments", post(webhook::payment_notification))

        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
