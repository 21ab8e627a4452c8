//! vulnleap-server: application bootstrap for the vulnleap web app
//!
//! Assembles configuration from the environment, binds the MySQL pool,
//! installs CSRF protection and security headers, and registers routes.

pub mod config;
pub mod csrf;
pub mod db;
pub mod error;
pub mod headers;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{AppConfig, ConfigError, DatabaseConfig, SecretKey, SslMode};
pub use error::{ApiError, Result, ServerError};
pub use server::{build_router, run_server, ServerConfig};
pub use state::AppState;
