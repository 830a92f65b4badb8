//! Configuration module for the exporter.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (port, bind address)
//! - Database settings (DSN, pool sizing)
//! - Engine settings (timeouts, cache TTL, probe group toggles)

mod app;
mod validation;

pub use app::{AppConfig, DatabaseConfig, ServerConfig};
pub use validation::{ConfigError, expand_env_vars, parse_duration, redact_dsn};

// Re-export constants
pub use app::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT, MIN_CACHE_TTL};
