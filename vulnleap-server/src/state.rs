//! Application state shared across handlers

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use sqlx::MySqlPool;

use crate::config::SecretKey;
use crate::csrf::IssuedToken;
#[cfg(feature = "csrf")]
use crate::csrf::{CsrfConfig, CsrfProtect};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pool: MySqlPool,
    secret_key: SecretKey,
    #[cfg(feature = "csrf")]
    csrf: Arc<CsrfProtect>,
    started_at: Instant,
}

impl AppState {
    pub fn new(pool: MySqlPool, secret_key: SecretKey) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                #[cfg(feature = "csrf")]
                csrf: Arc::new(CsrfProtect::new(&secret_key, CsrfConfig::default())),
                pool,
                secret_key,
                started_at: Instant::now(),
            }),
        }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.inner.pool
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.inner.secret_key
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    #[cfg(feature = "csrf")]
    pub fn csrf(&self) -> Arc<CsrfProtect> {
        Arc::clone(&self.inner.csrf)
    }

    /// Issue a CSRF token for the requesting client.
    ///
    /// `None` when protection is compiled out or token generation failed.
    pub fn issue_csrf(&self, headers: &HeaderMap) -> Option<IssuedToken> {
        #[cfg(feature = "csrf")]
        {
            let nonce = self.inner.csrf.nonce_from_headers(headers);
            match self.inner.csrf.issue(nonce.as_deref()) {
                Ok(issued) => Some(issued),
                Err(err) => {
                    tracing::warn!(error = %err, "Could not issue CSRF token");
                    None
                }
            }
        }

        #[cfg(not(feature = "csrf"))]
        {
            let _ = headers;
            None
        }
    }

    /// Token for embedding in a form; empty when none can be issued.
    pub fn csrf_token(&self, headers: &HeaderMap) -> String {
        self.issue_csrf(headers)
            .map(|issued| issued.token)
            .unwrap_or_default()
    }
}
