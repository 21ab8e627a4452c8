//! Route registration
//!
//! - health: liveness and database reachability
//! - csrf: token issuing for forms and scripts

pub mod csrf;
pub mod health;

use axum::http::Uri;
use axum::Router;

use crate::error::ApiError;
use crate::state::AppState;

/// All application routes, before middleware
pub fn main_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(csrf::router())
        .fallback(not_found)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound {
        path: uri.path().to_string(),
    }
}
