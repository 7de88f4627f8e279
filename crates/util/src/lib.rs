pub mod config;

use std::{env, net::SocketAddr};

pub use config::{AppConfig, ConfigError, Environment, DEFAULT_DATABASE_URL};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Loads `.env` into the process environment if one exists. Runs before
/// tracing is installed, so a missing file is silently ignored.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

/// Reads `key`, treating unset and blank values alike.
pub fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Address the cupcake server listens on: `APP_BIND_ADDR`, or
/// [`DEFAULT_BIND_ADDR`] when unset or blank.
pub fn server_bind_address() -> Result<SocketAddr, std::net::AddrParseError> {
    env_var("APP_BIND_ADDR")
        .as_deref()
        .unwrap_or(DEFAULT_BIND_ADDR)
        .parse()
}

#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::LazyLock<std::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(()));
