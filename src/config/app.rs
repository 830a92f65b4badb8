//! Application configuration structures.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::EngineConfig;
use crate::storage::PoolOptions;

use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default exporter port.
pub const DEFAULT_PORT: u16 = 9200;

/// Default connection pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Default connection acquire timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum result cache TTL (1 second).
pub const MIN_CACHE_TTL: Duration = Duration::from_secs(1);

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 9200).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

// =============================================================================
// Database Configuration
// =============================================================================

/// Monitored database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Driver URL. `${VAR}` and `${VAR:-default}` are expanded on load.
    pub dsn: String,

    /// Pooled connections shared by all probes (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout (default: 10s).
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: "sqlite::memory:".to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl DatabaseConfig {
    /// Pool settings for [`SqlxSource::connect`](crate::storage::SqlxSource::connect).
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.max_connections,
            connect_timeout: self.connect_timeout,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    pub database: DatabaseConfig,

    /// Collection engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    ///
    /// # Errors
    /// Returns `ConfigError` if the text cannot be parsed or validated.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.database.dsn = expand_env_vars(&config.database.dsn);
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        if self.server.port == 0 {
            return Err(invalid("server port must be non-zero"));
        }

        if self.database.dsn.trim().is_empty() {
            return Err(invalid("database dsn must not be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(invalid("database max_connections must be positive"));
        }

        if self.database.connect_timeout.is_zero() {
            return Err(invalid("database connect_timeout must be non-zero"));
        }

        if self.engine.data_source.trim().is_empty() {
            return Err(invalid("engine data_source must not be empty"));
        }

        if self.engine.query_timeout.is_zero() {
            return Err(invalid("engine query_timeout must be non-zero"));
        }

        if self.engine.cache_ttl < MIN_CACHE_TTL {
            return Err(ConfigError::ValidationError(format!(
                "engine cache_ttl must be at least {}",
                humantime::format_duration(MIN_CACHE_TTL)
            )));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}
