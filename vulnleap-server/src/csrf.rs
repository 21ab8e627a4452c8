//! CSRF protection
//!
//! Double-submit scheme: a random nonce lives in a cookie, and forms carry a
//! signed token `{nonce}.{issued_at}.{signature}` where the signature is
//! HMAC-SHA256 over `{nonce}.{issued_at}` keyed with the application secret.
//! A state-changing request passes when the token verifies, is younger than
//! the time limit and names the same nonce as the cookie.
//!
//! Protection is compiled in with the `csrf` feature (on by default). Without
//! it no middleware is installed and tokens render as empty strings.

#[cfg(feature = "csrf")]
pub use imp::{protect, CsrfConfig, CsrfProtect};

/// A token handed to a client, with the cookie that must accompany it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub nonce: String,
    pub token: String,
    /// Value for the `Set-Cookie` header
    pub set_cookie: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CsrfError {
    #[error("The CSRF token is missing.")]
    TokenMissing,
    #[error("The CSRF session token is missing.")]
    CookieMissing,
    #[error("The CSRF token is invalid.")]
    Malformed,
    #[error("The CSRF token is invalid.")]
    BadSignature,
    #[error("The CSRF token has expired.")]
    Expired,
    #[error("The CSRF tokens do not match.")]
    Mismatch,
    #[error("CSRF token generation failed")]
    Generation,
}

/// Log whether protection is active. Called once at startup.
pub fn log_status() {
    if enabled() {
        tracing::info!("CSRF protection enabled");
    } else {
        tracing::warn!("CSRF protection disabled - built without the `csrf` feature");
    }
}

pub const fn enabled() -> bool {
    cfg!(feature = "csrf")
}

#[cfg(feature = "csrf")]
mod imp {
    use std::sync::Arc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use axum::body::Body;
    use axum::extract::{Request, State};
    use axum::http::{header, HeaderMap, Method};
    use axum::middleware::Next;
    use axum::response::{IntoResponse, Response};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use hmac::{Hmac, Mac};
    use rand::rngs::OsRng;
    use rand::RngCore;
    use sha2::Sha256;

    use super::{CsrfError, IssuedToken};
    use crate::config::SecretKey;
    use crate::error::ApiError;

    type HmacSha256 = Hmac<Sha256>;

    const NONCE_BYTES: usize = 32;

    /// Largest form body buffered while looking for the token field.
    const MAX_FORM_BYTES: usize = 1024 * 1024;

    /// CSRF settings
    #[derive(Debug, Clone)]
    pub struct CsrfConfig {
        pub time_limit: Duration,
        pub cookie_name: String,
        pub field_name: String,
        pub header_names: Vec<String>,
        pub secure_cookie: bool,
    }

    impl Default for CsrfConfig {
        fn default() -> Self {
            Self {
                time_limit: Duration::from_secs(3600),
                cookie_name: "csrf_token".to_string(),
                field_name: "csrf_token".to_string(),
                header_names: vec!["X-CSRFToken".to_string(), "X-CSRF-Token".to_string()],
                secure_cookie: false,
            }
        }
    }

    /// Token issuer and validator keyed on the application secret
    pub struct CsrfProtect {
        key: Vec<u8>,
        config: CsrfConfig,
    }

    impl std::fmt::Debug for CsrfProtect {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("CsrfProtect")
                .field("config", &self.config)
                .finish_non_exhaustive()
        }
    }

    impl CsrfProtect {
        pub fn new(secret: &SecretKey, config: CsrfConfig) -> Self {
            Self {
                key: secret.expose().as_bytes().to_vec(),
                config,
            }
        }

        pub fn config(&self) -> &CsrfConfig {
            &self.config
        }

        /// Issue a token, reusing the client's nonce when it already has one.
        pub fn issue(&self, nonce: Option<&str>) -> Result<IssuedToken, CsrfError> {
            self.issue_at(nonce, unix_now())
        }

        fn issue_at(&self, nonce: Option<&str>, issued_at: u64) -> Result<IssuedToken, CsrfError> {
            let nonce = match nonce {
                Some(nonce) if is_valid_nonce(nonce) => nonce.to_string(),
                _ => new_nonce()?,
            };

            let signature = self.sign(&nonce, issued_at)?;
            let token = format!("{}.{}.{}", nonce, issued_at, signature);
            let set_cookie = self.cookie(&nonce);

            Ok(IssuedToken {
                nonce,
                token,
                set_cookie,
            })
        }

        pub fn validate(&self, token: &str, cookie_nonce: Option<&str>) -> Result<(), CsrfError> {
            self.validate_at(token, cookie_nonce, unix_now())
        }

        fn validate_at(
            &self,
            token: &str,
            cookie_nonce: Option<&str>,
            now: u64,
        ) -> Result<(), CsrfError> {
            if token.is_empty() {
                return Err(CsrfError::TokenMissing);
            }
            let cookie_nonce = cookie_nonce
                .filter(|n| !n.is_empty())
                .ok_or(CsrfError::CookieMissing)?;

            let mut parts = token.split('.');
            let (nonce, issued_at, signature) =
                match (parts.next(), parts.next(), parts.next(), parts.next()) {
                    (Some(n), Some(t), Some(s), None) => (n, t, s),
                    _ => return Err(CsrfError::Malformed),
                };
            let issued_at: u64 = issued_at.parse().map_err(|_| CsrfError::Malformed)?;
            let signature = URL_SAFE_NO_PAD
                .decode(signature)
                .map_err(|_| CsrfError::Malformed)?;

            self.mac(nonce, issued_at)?
                .verify_slice(&signature)
                .map_err(|_| CsrfError::BadSignature)?;

            if now > issued_at.saturating_add(self.config.time_limit.as_secs()) {
                return Err(CsrfError::Expired);
            }
            if nonce != cookie_nonce {
                return Err(CsrfError::Mismatch);
            }
            Ok(())
        }

        /// `Set-Cookie` value carrying the nonce
        pub fn cookie(&self, nonce: &str) -> String {
            let secure = if self.config.secure_cookie { "; Secure" } else { "" };
            format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax{}",
                self.config.cookie_name, nonce, secure
            )
        }

        /// Nonce from the request's `Cookie` header, if present
        pub fn nonce_from_headers(&self, headers: &HeaderMap) -> Option<String> {
            let prefix = format!("{}=", self.config.cookie_name);
            headers
                .get_all(header::COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|v| v.split(';'))
                .map(str::trim)
                .find_map(|kv| kv.strip_prefix(prefix.as_str()))
                .filter(|nonce| !nonce.is_empty())
                .map(str::to_string)
        }

        fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
            self.config
                .header_names
                .iter()
                .filter_map(|name| headers.get(name.as_str()))
                .filter_map(|v| v.to_str().ok())
                .find(|v| !v.is_empty())
                .map(str::to_string)
        }

        fn sign(&self, nonce: &str, issued_at: u64) -> Result<String, CsrfError> {
            let signature = self.mac(nonce, issued_at)?.finalize().into_bytes();
            Ok(URL_SAFE_NO_PAD.encode(signature))
        }

        fn mac(&self, nonce: &str, issued_at: u64) -> Result<HmacSha256, CsrfError> {
            let mut mac =
                HmacSha256::new_from_slice(&self.key).map_err(|_| CsrfError::Generation)?;
            mac.update(nonce.as_bytes());
            mac.update(b".");
            mac.update(issued_at.to_string().as_bytes());
            Ok(mac)
        }
    }

    /// Reject state-changing requests that lack a valid token.
    pub async fn protect(
        State(csrf): State<Arc<CsrfProtect>>,
        request: Request,
        next: Next,
    ) -> Response {
        if is_safe_method(request.method()) {
            return next.run(request).await;
        }

        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let cookie_nonce = csrf.nonce_from_headers(request.headers());

        let (request, token) = match extract_token(&csrf, request).await {
            Ok(found) => found,
            Err(err) => return err.into_response(),
        };

        match csrf.validate(token.as_deref().unwrap_or(""), cookie_nonce.as_deref()) {
            Ok(()) => next.run(request).await,
            Err(err) => {
                tracing::warn!(%method, %path, error = %err, "CSRF validation failed");
                ApiError::Csrf {
                    reason: err.to_string(),
                }
                .into_response()
            }
        }
    }

    /// Token from a header, or from the form body. The body is put back.
    async fn extract_token(
        csrf: &CsrfProtect,
        request: Request,
    ) -> Result<(Request, Option<String>), ApiError> {
        if let Some(token) = csrf.token_from_headers(request.headers()) {
            return Ok((request, Some(token)));
        }

        let is_form = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));
        if !is_form {
            return Ok((request, None));
        }

        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, MAX_FORM_BYTES)
            .await
            .map_err(|e| ApiError::BadRequest {
                message: format!("failed to read form body: {}", e),
            })?;

        let token = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
            .ok()
            .and_then(|fields| {
                fields
                    .into_iter()
                    .find(|(name, _)| *name == csrf.config.field_name)
                    .map(|(_, value)| value)
            });

        Ok((Request::from_parts(parts, Body::from(bytes)), token))
    }

    fn is_safe_method(method: &Method) -> bool {
        matches!(
            *method,
            Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
        )
    }

    fn new_nonce() -> Result<String, CsrfError> {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|_| CsrfError::Generation)?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    fn is_valid_nonce(nonce: &str) -> bool {
        URL_SAFE_NO_PAD
            .decode(nonce)
            .is_ok_and(|bytes| bytes.len() == NONCE_BYTES)
    }

    fn unix_now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_matches_feature() {
        assert_eq!(enabled(), cfg!(feature = "csrf"));
    }

    #[test]
    fn error_messages() {
        assert_eq!(CsrfError::TokenMissing.to_string(), "The CSRF token is missing.");
        assert_eq!(CsrfError::Expired.to_string(), "The CSRF token has expired.");
    }
}
