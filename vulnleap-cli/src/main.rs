//! vulnleap - demonstration web app entry point
//!
//! Loads `.env`, sets up logging, reads configuration from the environment
//! and serves the app (default `0.0.0.0:5555`).

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use clap::Parser;
use vulnleap_server::config::parse_debug_flag;
use vulnleap_server::{AppConfig, ServerConfig};

mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "vulnleap",
    author,
    version,
    about = "Demonstration web app: MySQL-backed, CSRF-protected, \
             security headers on every response"
)]
struct Cli {
    /// Address to bind to
    #[arg(long, env = "VULNLEAP_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, short, env = "VULNLEAP_PORT", default_value_t = 5555)]
    port: u16,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Send Strict-Transport-Security (only behind HTTPS)
    #[arg(long)]
    hsts: bool,

    /// Print the resolved configuration and exit without serving
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Missing .env is fine; the environment may already be populated
    dotenvy::dotenv().ok();

    let debug = parse_debug_flag(std::env::var("FLASK_DEBUG").ok().as_deref());
    if let Err(err) = tracing_setup::init(debug) {
        eprintln!("Failed to initialize logging: {:#}", err);
    }

    let app_config = AppConfig::from_env().context("Invalid configuration")?;

    if cli.check_config {
        print_config(&app_config);
        return Ok(());
    }

    let server_config = ServerConfig {
        bind_addr: SocketAddr::new(cli.host, cli.port),
        timeout_secs: cli.timeout,
        hsts: cli.hsts,
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %server_config.bind_addr,
        timeout_secs = server_config.timeout_secs,
        hsts = server_config.hsts,
        "Starting vulnleap"
    );

    vulnleap_server::run_server(app_config, server_config)
        .await
        .context("Server error")?;

    Ok(())
}

fn print_config(config: &AppConfig) {
    let ssl_mode = config
        .database
        .ssl_mode()
        .map(|mode| mode.as_str())
        .unwrap_or("DISABLED");

    println!("database: {}", config.database.redacted_url());
    println!("ssl_mode: {}", ssl_mode);
    println!(
        "secret_key: {}",
        if config.secret_key.is_generated() {
            "generated"
        } else {
            "configured"
        }
    );
    println!("debug: {}", config.debug);
    println!(
        "csrf: {}",
        if vulnleap_server::csrf::enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );
}
