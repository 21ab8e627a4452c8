//! Security response headers
//!
//! Set on every response, overriding anything a handler produced.

use axum::http::{header, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

/// Relaxed for compatibility with inline scripts and the jsDelivr CDN.
pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self' 'unsafe-inline'; \
     script-src 'self' 'unsafe-inline' 'unsafe-eval' https://cdn.jsdelivr.net; \
     style-src 'self' 'unsafe-inline' https://cdn.jsdelivr.net; \
     img-src 'self' data: https:; \
     font-src 'self' https://cdn.jsdelivr.net data:; \
     connect-src 'self'; \
     frame-ancestors 'none'";

pub const FRAME_OPTIONS: &str = "DENY";
pub const CONTENT_TYPE_OPTIONS: &str = "nosniff";
pub const XSS_PROTECTION: &str = "1; mode=block";
pub const REFERRER_POLICY: &str = "strict-origin-when-cross-origin";

/// Only meaningful behind HTTPS, so off unless asked for.
pub const STRICT_TRANSPORT_SECURITY: &str = "max-age=31536000; includeSubDomains";

/// Header name/value pairs always applied
pub fn security_headers() -> [(header::HeaderName, HeaderValue); 5] {
    [
        (
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ),
        (
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static(FRAME_OPTIONS),
        ),
        (
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static(CONTENT_TYPE_OPTIONS),
        ),
        (
            header::X_XSS_PROTECTION,
            HeaderValue::from_static(XSS_PROTECTION),
        ),
        (
            header::REFERRER_POLICY,
            HeaderValue::from_static(REFERRER_POLICY),
        ),
    ]
}

/// Wrap a router so every response carries the security headers.
pub fn apply(router: Router, hsts: bool) -> Router {
    let router = security_headers()
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(name, value))
        });

    if hsts {
        router.layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(STRICT_TRANSPORT_SECURITY),
        ))
    } else {
        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use tower::ServiceExt;

    async fn plain() -> &'static str {
        "hello"
    }

    async fn framed() -> impl IntoResponse {
        ([(header::X_FRAME_OPTIONS, "SAMEORIGIN")], "framed")
    }

    fn app(hsts: bool) -> Router {
        let router = Router::new()
            .route("/", get(plain))
            .route("/framed", get(framed))
            .fallback(|| async { StatusCode::NOT_FOUND });
        apply(router, hsts)
    }

    async fn get_path(app: Router, path: &str) -> axum::response::Response {
        app.oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn all_headers_are_set() {
        let response = get_path(app(false), "/").await;
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        for (name, value) in security_headers() {
            assert_eq!(headers.get(&name), Some(&value), "header {}", name);
        }
        assert!(headers.get(header::STRICT_TRANSPORT_SECURITY).is_none());
    }

    #[tokio::test]
    async fn handler_values_are_overridden() {
        let response = get_path(app(false), "/framed").await;
        assert_eq!(
            response.headers().get(header::X_FRAME_OPTIONS).unwrap(),
            "DENY"
        );
    }

    #[tokio::test]
    async fn unknown_routes_get_headers() {
        let response = get_path(app(false), "/missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
    }

    #[tokio::test]
    async fn hsts_is_opt_in() {
        let response = get_path(app(true), "/").await;
        assert_eq!(
            response
                .headers()
                .get(header::STRICT_TRANSPORT_SECURITY)
                .unwrap(),
            STRICT_TRANSPORT_SECURITY
        );
    }

    #[test]
    fn csp_forbids_framing() {
        assert!(CONTENT_SECURITY_POLICY.ends_with("frame-ancestors 'none'"));
        assert!(!CONTENT_SECURITY_POLICY.contains("  "));
    }
}
