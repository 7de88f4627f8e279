use std::{fmt, net::SocketAddr};

use super::{env_var, server_bind_address};

/// Connection string used when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://cupcakes.db?mode=rwc";

const DEVELOPMENT_SECRET_KEY: &str = "cupcakes-development-secret";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub secret_key: String,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env_var("APP_ENV") {
            Some(value) => Environment::from_str(&value)?,
            None => Environment::Development,
        };
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;
        let database_url =
            env_var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let secret_key = match env_var("SECRET_KEY") {
            Some(value) => value,
            None if environment == Environment::Production => {
                return Err(ConfigError::MissingSecretKey)
            }
            None => DEVELOPMENT_SECRET_KEY.to_string(),
        };

        Ok(Self {
            bind_addr,
            environment,
            database_url,
            secret_key,
        })
    }
}

// The secret never reaches log output.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("environment", &self.environment)
            .field("database_url", &self.database_url)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    MissingSecretKey,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::MissingSecretKey => write!(f, "SECRET_KEY must be set in production"),
        }
    }
}

impl std::error::Error for ConfigError {}
