//! EduPortal API server

use std::sync::Arc;

use anyhow::Context;
use edu_access::{HttpIdentityProvider, InMemoryPortalPreferences, PortalRegistry, RouteTable};
use edu_enrollment::infrastructure::{
    CatalogSeed, HttpPaymentGateway, InMemoryRecordStore, TracingEventPublisher,
};
use edu_enrollment::{BatchEnrollmentPayment, Enrollment, EnrollmentService, ServicePorts};
use portal_api::{build_router, AppState, PortalConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn build_state(config: &PortalConfig) -> anyhow::Result<AppState> {
    let seed = match &config.catalog_path {
        Some(path) => CatalogSeed::load(path).with_context(|| format!("loading catalog seed {path}"))?,
        None => CatalogSeed::default(),
    };
    let (courses, students) = seed.into_stores();

    let gateway = HttpPaymentGateway::new(&config.gateway).context("building payment gateway client")?;
    let ports = ServicePorts {
        enrollments: Arc::new(InMemoryRecordStore::<Enrollment>::new()),
        batches: Arc::new(InMemoryRecordStore::<BatchEnrollmentPayment>::new()),
        courses: Arc::new(courses),
        students: Arc::new(students),
        gateway: Arc::new(gateway),
        events: Arc::new(TracingEventPublisher),
    };
    let service = EnrollmentService::new(ports, &config.enrollment).context("invalid pricing")?;

    let identity = HttpIdentityProvider::new(
        config.identity.base_url.clone(),
        config.identity.cookie_name.clone(),
        config.identity.timeout(),
        config.unmatched_role_policy,
    )
    .context("building identity client")?;

    if config.webhook_secret.is_empty() {
        tracing::warn!("WEBHOOK_SECRET not set, payment notifications will be rejected");
    }

    let portals = PortalRegistry::new(config.unmatched_role_policy);
    let routes = RouteTable::from_portals(portals.all());

    Ok(AppState {
        enrollments: Arc::new(service),
        identity: Arc::new(identity),
        portals: Arc::new(portals),
        routes: Arc::new(routes),
        preferences: Arc::new(InMemoryPortalPreferences::new()),
        cookie_name: config.identity.cookie_name.as_str().into(),
        webhook_secret: config.webhook_secret.as_str().into(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PortalConfig::from_env().context("loading configuration")?;
    let state = build_state(&config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, gateway = %config.gateway.base_url, "portal API listening");

    axum::serve(listener, app).await?;
    Ok(())
}
