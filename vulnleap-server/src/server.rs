//! Axum server setup
//!
//! Middleware order, outermost first:
//! - security headers (so even timeouts and rejections carry them)
//! - request tracing
//! - request timeout
//! - CSRF protection (when compiled in)

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::Result;
use crate::state::AppState;
use crate::{csrf, db, headers, routes};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:5555)
    pub bind_addr: SocketAddr,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Send `Strict-Transport-Security`. Only enable behind HTTPS.
    pub hsts: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5555)),
            timeout_secs: 30,
            hsts: false,
        }
    }
}

/// Build the application router with all routes and middleware
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let app = routes::main_router();

    #[cfg(feature = "csrf")]
    let app = app.layer(axum::middleware::from_fn_with_state(
        state.csrf(),
        csrf::protect,
    ));

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.timeout_secs),
        ));

    let app = app.layer(middleware).with_state(state);

    headers::apply(app, config.hsts)
}

/// Bind the database, build the app and serve until shutdown.
pub async fn run_server(app_config: AppConfig, config: ServerConfig) -> Result<()> {
    if app_config.debug {
        tracing::debug!("Debug mode enabled");
    }

    let pool = db::create_pool(&app_config.database)?;
    tracing::info!(
        database = %app_config.database.redacted_url(),
        ssl_mode = app_config
            .database
            .ssl_mode()
            .map(|m| m.as_str())
            .unwrap_or("DISABLED"),
        "Database bound"
    );

    csrf::log_status();

    let state = AppState::new(pool, app_config.secret_key);
    let app = build_router(state, &config);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}
