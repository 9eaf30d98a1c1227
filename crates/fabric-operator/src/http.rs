//! Probe and metrics endpoints
//!
//! - `GET /health` - liveness; the API server answers a version request
//! - `GET /ready` - readiness; set once the CRDs are reachable
//! - `GET /metrics` - Prometheus exposition

use crate::observability::MetricsState;
use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared readiness flag, flipped once by the binary.
#[derive(Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn set_ready(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub client: kube::Client,
    pub readiness: Readiness,
    pub metrics: Option<MetricsState>,
}

impl FromRef<AppState> for kube::Client {
    fn from_ref(state: &AppState) -> Self {
        state.client.clone()
    }
}

impl FromRef<AppState> for Readiness {
    fn from_ref(state: &AppState) -> Self {
        state.readiness.clone()
    }
}

impl FromRef<AppState> for Option<MetricsState> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP endpoint listening");
    axum::serve(listener, router(state)).await
}

#[tracing::instrument(skip(client))]
pub async fn health_check(State(client): State<kube::Client>) -> Result<&'static str, StatusCode> {
    match tokio::time::timeout(HEALTH_TIMEOUT, client.apiserver_version()).await {
        Ok(Ok(_)) => Ok("OK"),
        Ok(Err(e)) => {
            warn!(error = %e, "API server health check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
        Err(_) => {
            warn!("API server health check timed out");
            Err(StatusCode::REQUEST_TIMEOUT)
        }
    }
}

#[tracing::instrument(skip(readiness))]
pub async fn readiness_check(State(readiness): State<Readiness>) -> Result<&'static str, StatusCode> {
    if readiness.is_ready() {
        Ok("READY")
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[tracing::instrument(skip(metrics))]
pub async fn get_metrics(State(metrics): State<Option<MetricsState>>) -> impl IntoResponse {
    match metrics {
        Some(metrics) => (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            metrics.prometheus_handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [("content-type", "text/plain; charset=utf-8")],
            "Metrics not initialized".to_string(),
        ),
    }
}
