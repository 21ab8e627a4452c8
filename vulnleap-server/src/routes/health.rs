//! Health check endpoint

use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::db;
use crate::state::AppState;

/// Upper bound on the database round-trip during a health check
const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub database: bool,
    pub csrf: bool,
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match tokio::time::timeout(PING_TIMEOUT, db::ping(state.pool())).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Database ping failed");
            false
        }
        Err(_) => {
            tracing::debug!("Database ping timed out");
            false
        }
    };

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime().as_secs(),
        database,
        csrf: crate::csrf::enabled(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
