//! Configuration management for ProfitBox
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with PROFITBOX_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Secret shipped in `config/development.toml`
const DEV_JWT_SECRET: &str = "development-secret-key";

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    pub server: ServerConfig,

    pub database: DatabaseConfig,

    /// Which ledger store backs the API
    pub store: StoreConfig,

    /// JWT verification settings
    pub jwt: JwtConfig,

    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    /// Volatile, for local demos and tests
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// HS256 secret shared with the identity provider
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("PROFITBOX_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        Self::load_for(&environment)
    }

    /// Load configuration for a named environment.
    ///
    /// There is no built-in JWT secret: it comes from `config/{environment}.toml`
    /// or `PROFITBOX__JWT__SECRET`, and loading fails without one.
    pub fn load_for(environment: &str) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment)?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.url", "postgres://localhost/profitbox")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("store.backend", "postgres")?
            .set_default("log.format", "pretty")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (PROFITBOX_ prefix)
            .add_source(
                Environment::with_prefix("PROFITBOX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.trim().is_empty() {
            return Err(ConfigError::Message("jwt.secret must not be empty".into()));
        }
        if !self.is_development() && self.jwt.secret == DEV_JWT_SECRET {
            return Err(ConfigError::Message(format!(
                "the development JWT secret cannot be used in {}",
                self.environment
            )));
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Config {
    /// Configuration for tests and embedded use: in-memory store, fixed secret
    pub fn for_memory(jwt_secret: &str) -> Self {
        Self {
            environment: "test".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
                min_connections: 0,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
            },
            jwt: JwtConfig {
                secret: jwt_secret.to_string(),
            },
            log: LogConfig {
                format: LogFormat::Pretty,
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_file_supplies_the_secret() {
        let config = Config::load_for("development").unwrap();
        assert_eq!(config.jwt.secret, DEV_JWT_SECRET);
        assert!(config.is_development());
    }

    #[test]
    fn test_no_default_secret_outside_development() {
        assert!(Config::load_for("production").is_err());
    }

    #[test]
    fn test_development_secret_rejected_outside_development() {
        let mut config = Config::for_memory(DEV_JWT_SECRET);
        config.environment = "production".to_string();
        assert!(config.check().is_err());

        config.environment = "development".to_string();
        assert!(config.check().is_ok());

        assert!(Config::for_memory("  ").check().is_err());
        assert!(Config::for_memory("s3cret").check().is_ok());
    }
}
