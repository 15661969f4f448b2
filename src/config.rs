// Configuration module
// Settings are loaded from environment variables with fallback to defaults

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Gradient applied to gift categories created without one
pub const DEFAULT_GIFT_GRADIENT: &str = "linear-gradient(135deg, #fdfbfb 0%, #ebedee 100%)";

/// Promotions engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum pooled connections
    pub database_max_connections: u32,

    /// Seconds to wait for a pooled connection
    pub database_acquire_timeout_secs: u64,

    /// Catalog cache time-to-live in seconds
    pub catalog_cache_ttl_secs: u64,

    /// Upper bound on a single reservation round-trip, in milliseconds
    pub store_timeout_ms: u64,

    /// Redis connection string for gift events (optional)
    pub redis_url: Option<String>,

    /// Redis channel gift events are published on
    pub gift_events_channel: String,

    /// Gradient used when a gift category is created without one
    pub default_gift_gradient: String,
}

impl PromotionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = PromotionConfig {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingRequired("DATABASE_URL".to_string()))?,

            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", "5")?,

            database_acquire_timeout_secs: parse_var("DATABASE_ACQUIRE_TIMEOUT_SECS", "3")?,

            catalog_cache_ttl_secs: parse_var("CATALOG_CACHE_TTL_SECS", "60")?,

            store_timeout_ms: parse_var("STORE_TIMEOUT_MS", "2000")?,

            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),

            gift_events_channel: env::var("GIFT_EVENTS_CHANNEL")
                .unwrap_or_else(|_| "gift-awarded".to_string()),

            default_gift_gradient: env::var("DEFAULT_GIFT_GRADIENT")
                .unwrap_or_else(|_| DEFAULT_GIFT_GRADIENT.to_string()),
        };

        if config.database_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string()));
        }
        if config.store_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("STORE_TIMEOUT_MS".to_string()));
        }

        Ok(config)
    }

    pub fn catalog_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_cache_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.database_acquire_timeout_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
