//! HTTP surface: webhook deliveries, the scheduler endpoint and health
//!
//! Routes:
//! - `POST /webhook` - GitHub App event deliveries
//! - `GET /pr-sisyphus/scheduler` - run a full sweep (hit by an external cron)
//! - `GET /health` - liveness probe

use crate::error::Result;
use crate::platform::InstallationDirectory;
use crate::queue::{PassReport, Reconciler};
use crate::sweep::{SweepOptions, run_sweep};
use crate::webhook::{self, EVENT_HEADER, ReconcileTarget, SIGNATURE_HEADER};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Path of the scheduler endpoint
pub const SCHEDULER_PATH: &str = "/pr-sisyphus/scheduler";

/// Shared state for all handlers
pub struct AppState {
    /// Installation lookup and installation-scoped clients
    pub directory: Arc<dyn InstallationDirectory>,
    /// Queue engine
    pub reconciler: Reconciler,
    /// Sweep fan-out
    pub sweep: SweepOptions,
    /// When set, deliveries must carry a valid `X-Hub-Signature-256`
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Build the HTTP router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_handler))
        .route(SCHEDULER_PATH, get(scheduler_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C
pub async fn run_server(state: Arc<AppState>, addr: &str) -> Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "merge queue listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    info!("server stopped");
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn scheduler_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("scheduled sweep triggered");
    match run_sweep(state.directory.as_ref(), &state.reconciler, &state.sweep).await {
        Ok(report) => {
            info!(
                installations = report.installations,
                repos = report.reconciled.len(),
                failures = report.failures.len(),
                "scheduled sweep completed"
            );
            (StatusCode::OK, "Scheduled sweep completed.")
        }
        Err(e) => {
            error!(error = %e, "scheduled sweep failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Scheduled sweep failed")
        }
    }
}

async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(secret) = state.webhook_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if let Err(e) = webhook::verify_signature(&body, signature, secret) {
            warn!(error = %e, "rejected webhook delivery");
            return (StatusCode::UNAUTHORIZED, "invalid signature");
        }
    }

    let Some(event_name) = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok()) else {
        return (StatusCode::BAD_REQUEST, "missing event header");
    };

    match webhook::dispatch_target(event_name, &body) {
        Ok(Some(target)) => {
            info!(event = event_name, repo = %target.repo, "dispatching reconciliation");
            tokio::spawn(reconcile_target(state, target));
            (StatusCode::ACCEPTED, "reconciliation dispatched")
        }
        Ok(None) => {
            debug!(event = event_name, "ignored webhook delivery");
            (StatusCode::OK, "ignored")
        }
        Err(e) => {
            warn!(event = event_name, error = %e, "unparsable webhook delivery");
            (StatusCode::BAD_REQUEST, "invalid payload")
        }
    }
}

/// Run one pass for a webhook target; errors end up in the log only
async fn reconcile_target(state: Arc<AppState>, target: ReconcileTarget) {
    match run_pass(&state, &target).await {
        Ok(report) => info!(repo = %target.repo, outcome = %report.outcome, "pass finished"),
        Err(e) => error!(repo = %target.repo, error = %e, "pass aborted"),
    }
}

async fn run_pass(state: &AppState, target: &ReconcileTarget) -> Result<PassReport> {
    let platform = state.directory.platform_for(target.installation_id).await?;
    state.reconciler.reconcile(platform.as_ref(), &target.repo).await
}
