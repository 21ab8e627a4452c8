//! Database binding - MySQL connection pool
//!
//! The pool connects lazily: the application starts even when the database
//! is not yet reachable, and connections are opened on first use.

use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlSslMode};
use sqlx::MySqlPool;

use crate::config::{DatabaseConfig, SslMode};

/// Kept low; the app serves a handful of users.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

impl From<SslMode> for MySqlSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Preferred => MySqlSslMode::Preferred,
            SslMode::Required => MySqlSslMode::Required,
            SslMode::VerifyCa => MySqlSslMode::VerifyCa,
            SslMode::VerifyIdentity => MySqlSslMode::VerifyIdentity,
        }
    }
}

/// Driver options for the configured database.
///
/// Built from the individual components rather than by parsing
/// [`DatabaseConfig::url`]: an empty component leaves the driver default in
/// place instead of failing, so a missing `MYSQL_*` variable never stops
/// startup. Without an SSL mode the connection is plain, as for a driver
/// that was given no SSL arguments.
pub fn connect_options(config: &DatabaseConfig) -> Result<MySqlConnectOptions, sqlx::Error> {
    let mut options = MySqlConnectOptions::new();

    if !config.host.is_empty() {
        let (host, port) = split_host_port(&config.host)?;
        options = options.host(host);
        if let Some(port) = port {
            options = options.port(port);
        }
    }
    if !config.user.is_empty() {
        options = options.username(&config.user);
    }
    if !config.password.is_empty() {
        options = options.password(&config.password);
    }
    if !config.database.is_empty() {
        options = options.database(&config.database);
    }

    let ssl_mode = config
        .ssl_mode()
        .map(MySqlSslMode::from)
        .unwrap_or(MySqlSslMode::Disabled);

    Ok(options.ssl_mode(ssl_mode))
}

/// `host`, `host:port` or `[v6]:port`.
fn split_host_port(value: &str) -> Result<(&str, Option<u16>), sqlx::Error> {
    let invalid_port = |port: &str| {
        sqlx::Error::Configuration(format!("invalid port in MYSQL_HOST: '{}'", port).into())
    };

    if let Some(rest) = value.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((host, "")) => Ok((host, None)),
            Some((host, port)) => {
                let port = port.strip_prefix(':').unwrap_or(port);
                port.parse()
                    .map(|p| (host, Some(p)))
                    .map_err(|_| invalid_port(port))
            }
            None => Ok((value, None)),
        };
    }

    match value.split_once(':') {
        // bare IPv6 address, no port
        Some((_, rest)) if rest.contains(':') => Ok((value, None)),
        Some((host, port)) => port
            .parse()
            .map(|p| (host, Some(p)))
            .map_err(|_| invalid_port(port)),
        None => Ok((value, None)),
    }
}

/// Create a lazily-connecting MySQL pool.
pub fn create_pool(config: &DatabaseConfig) -> Result<MySqlPool, sqlx::Error> {
    create_pool_with_options(config, DEFAULT_MAX_CONNECTIONS, DEFAULT_ACQUIRE_TIMEOUT)
}

pub fn create_pool_with_options(
    config: &DatabaseConfig,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<MySqlPool, sqlx::Error> {
    let options = connect_options(config)?;

    tracing::debug!(
        url = %config.redacted_url(),
        ssl_mode = ?config.ssl_mode(),
        max_connections,
        "Configuring database pool"
    );

    Ok(MySqlPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect_lazy_with(options))
}

/// Round-trip a trivial query. Used by the health endpoint.
pub async fn ping(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> DatabaseConfig {
        DatabaseConfig::new("leap", "hunter2", "127.0.0.1:3306", "vulnleap")
    }

    #[test]
    fn options_use_config_components() {
        let options = connect_options(&local()).unwrap();
        assert_eq!(options.get_host(), "127.0.0.1");
        assert_eq!(options.get_port(), 3306);
        assert_eq!(options.get_username(), "leap");
        assert_eq!(options.get_database(), Some("vulnleap"));
    }

    #[test]
    fn ssl_mode_maps_to_driver_modes() {
        assert!(matches!(
            MySqlSslMode::from(SslMode::Required),
            MySqlSslMode::Required
        ));
        assert!(matches!(
            MySqlSslMode::from(SslMode::VerifyCa),
            MySqlSslMode::VerifyCa
        ));
    }

    #[test]
    fn no_ssl_mode_connects_plain() {
        let options = connect_options(&local()).unwrap();
        assert!(matches!(options.get_ssl_mode(), MySqlSslMode::Disabled));
    }

    #[test]
    fn configured_ssl_mode_is_applied() {
        let config = local().with_ssl_mode(Some(SslMode::Required));
        let options = connect_options(&config).unwrap();
        assert!(matches!(options.get_ssl_mode(), MySqlSslMode::Required));
    }

    #[test]
    fn escaped_password_parses() {
        let config = DatabaseConfig::new("leap", "p@ss/word", "localhost", "vulnleap");
        assert!(connect_options(&config).is_ok());
    }

    #[test]
    fn credentials_are_passed_unescaped() {
        let config = DatabaseConfig::new("app user", "p@ss:word/1", "localhost", "app");
        let options = connect_options(&config).unwrap();
        assert_eq!(options.get_username(), "app user");
        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_port(), 3306);
    }

    #[test]
    fn host_port_split() {
        assert_eq!(split_host_port("db").unwrap(), ("db", None));
        assert_eq!(split_host_port("db:3307").unwrap(), ("db", Some(3307)));
        assert_eq!(split_host_port("[::1]:3307").unwrap(), ("::1", Some(3307)));
        assert_eq!(split_host_port("::1").unwrap(), ("::1", None));
        assert!(split_host_port("db:port").is_err());
    }

    #[tokio::test]
    async fn missing_host_does_not_fail_startup() {
        let config = DatabaseConfig::new("leap", "pw", "", "vulnleap");
        let options = connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_username(), "leap");
        assert_eq!(options.get_database(), Some("vulnleap"));

        assert!(create_pool(&config).is_ok());
    }

    #[tokio::test]
    async fn all_variables_missing_still_builds_pool() {
        let config = DatabaseConfig::new("", "", "", "");
        let options = connect_options(&config).unwrap();
        assert_eq!(options.get_database(), None);
        assert!(create_pool(&config).is_ok());
    }

    #[tokio::test]
    async fn pool_is_created_without_database() {
        let pool = create_pool(&local()).unwrap();
        assert_eq!(pool.size(), 0);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn ping_reaches_database() {
        let pool = create_pool(&local()).unwrap();
        ping(&pool).await.expect("ping failed");
    }
}
