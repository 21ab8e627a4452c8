//! CSRF token endpoint

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// GET /csrf-token
///
/// Returns a token for the `X-CSRFToken` header or the `csrf_token` form
/// field, and sets the cookie it is checked against. With protection
/// compiled out the token is empty and no cookie is set.
async fn csrf_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(issued) = state.issue_csrf(&headers) else {
        return Json(CsrfTokenResponse {
            csrf_token: String::new(),
        })
        .into_response();
    };

    let cookie = match HeaderValue::from_str(&issued.set_cookie) {
        Ok(cookie) => cookie,
        Err(e) => {
            return ApiError::Internal {
                message: format!("invalid CSRF cookie header: {}", e),
            }
            .into_response()
        }
    };

    (
        [(header::SET_COOKIE, cookie)],
        Json(CsrfTokenResponse {
            csrf_token: issued.token,
        }),
    )
        .into_response()
}

pub fn router() -> Router<AppState> {
    Router::new().route("/csrf-token", get(csrf_token))
}
