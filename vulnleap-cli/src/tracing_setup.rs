//! Tracing setup for the vulnleap binary
//!
//! Usage:
//!   vulnleap                          # info level
//!   FLASK_DEBUG=1 vulnleap            # debug level
//!   RUST_LOG=vulnleap_server=trace    # fine-grained control, wins over both

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info,sqlx=warn"
    }
}

/// Initialize console logging
pub fn init(debug: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
