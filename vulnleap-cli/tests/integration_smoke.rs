//! Smoke tests for the vulnleap binary

use assert_cmd::Command;
use predicates::prelude::*;

const APP_VARS: [&str; 7] = [
    "MYSQL_USER",
    "MYSQL_PASSWORD",
    "MYSQL_HOST",
    "MYSQL_DB",
    "MYSQL_SSL_MODE",
    "SECRET_KEY",
    "FLASK_DEBUG",
];

fn vulnleap() -> Command {
    let mut cmd = Command::cargo_bin("vulnleap").unwrap();
    for var in APP_VARS {
        cmd.env_remove(var);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help() {
    vulnleap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Port to listen on"))
        .stdout(predicate::str::contains("[default: 5555]"));
}

#[test]
fn test_check_config_assembles_database_url() {
    vulnleap()
        .arg("--check-config")
        .env("MYSQL_USER", "leap")
        .env("MYSQL_PASSWORD", "hunter2")
        .env("MYSQL_HOST", "db")
        .env("MYSQL_DB", "vulnleap")
        .env("SECRET_KEY", "configured-secret")
        .assert()
        .success()
        .stdout(predicate::str::contains("database: mysql://leap:***@db/vulnleap"))
        .stdout(predicate::str::contains("ssl_mode: DISABLED"))
        .stdout(predicate::str::contains("secret_key: configured"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_check_config_generates_missing_secret_key() {
    vulnleap()
        .arg("--check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("secret_key: generated"));
}

#[test]
fn test_check_config_reads_ssl_mode() {
    vulnleap()
        .arg("--check-config")
        .env("MYSQL_SSL_MODE", "required")
        .env("SECRET_KEY", "k")
        .assert()
        .success()
        .stdout(predicate::str::contains("ssl_mode: REQUIRED"));
}

#[test]
fn test_invalid_ssl_mode_fails() {
    vulnleap()
        .arg("--check-config")
        .env("MYSQL_SSL_MODE", "sometimes")
        .env("SECRET_KEY", "k")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_flask_debug_is_reported() {
    vulnleap()
        .arg("--check-config")
        .env("SECRET_KEY", "k")
        .env("FLASK_DEBUG", "True")
        .assert()
        .success()
        .stdout(predicate::str::contains("debug: true"));
}

#[test]
fn test_missing_host_reaches_bind() {
    // TEST-NET-1 address, never assigned locally: binding fails after the
    // database pool and router were built.
    vulnleap()
        .args(["--host", "192.0.2.1", "--port", "5555"])
        .env("MYSQL_USER", "leap")
        .env("MYSQL_PASSWORD", "pw")
        .env("MYSQL_DB", "vulnleap")
        .env("SECRET_KEY", "k")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Starting vulnleap"))
        .stdout(predicate::str::contains("Database bound"))
        .stderr(predicate::str::contains("Server error"))
        .stderr(predicate::str::contains("Database error").not());
}
