//! Server assembly: wires configuration into the gateway, registrar, job
//! store, and orchestrator, and runs the axum app.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api::{self, AppState, SharedState};
use crate::config::RelayConfig;
use crate::jobs::JobStore;
use crate::translation::TranslationOrchestrator;
use crate::upstream::{ApiGateway, FlowClient, OnshapeClient};
use crate::webhook::WebhookRegistrar;

/// Build shared application state from configuration.
///
/// The gateway is the direct Onshape client unless a Flow proxy is
/// configured, in which case all upstream traffic routes through the Flow.
pub fn build_state(config: &RelayConfig) -> SharedState {
    let gateway: Arc<dyn ApiGateway> = match &config.flow {
        Some(flow) => Arc::new(FlowClient::new(flow, &config.auth)),
        None => Arc::new(OnshapeClient::new(config)),
    };
    let jobs = Arc::new(JobStore::new(config.store_capacity, config.store_ttl));
    let registrar = Arc::new(WebhookRegistrar::new(gateway.clone(), config));
    let orchestrator = TranslationOrchestrator::new(gateway.clone(), registrar, jobs.clone());
    Arc::new(AppState {
        orchestrator,
        gateway,
        jobs,
    })
}

/// Build the application router.
pub fn build_router(state: SharedState) -> Router {
    api::api_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the relay server and run until shutdown.
pub async fn start_server(config: RelayConfig) -> Result<()> {
    let state = build_state(&config);
    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    // The platform must be able to reach the webhook receiver, so bind on
    // all interfaces.
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    let local_addr = listener.local_addr()?;
    info!("glTF relay listening at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Shutting down...");
}
