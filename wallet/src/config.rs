//! Service configuration.

use std::str::FromStr;
use std::time::Duration;

use fxwallet_fx::RateCacheConfig;

/// Durable store configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection URL.
    pub url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// How long an operation waits for a free connection.
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/fxwallet".to_string(),
            max_connections: 16,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Rate provider and cache configuration.
#[derive(Debug, Clone)]
pub struct RatesConfig {
    /// gRPC address of the exchange rate service.
    pub provider_addr: String,
    /// Lifetime of a cached quote.
    pub cache_ttl: Duration,
    /// Deadline for one provider call.
    pub request_timeout: Duration,
    /// Entry count above which expired quotes are swept.
    pub max_cache_entries: usize,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            provider_addr: "http://localhost:50051".to_string(),
            cache_ttl: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(3),
            max_cache_entries: 1024,
        }
    }
}

impl RatesConfig {
    /// Settings of the shared rate cache.
    pub fn cache_config(&self) -> RateCacheConfig {
        RateCacheConfig {
            ttl: self.cache_ttl,
            max_entries: self.max_cache_entries,
        }
    }
}

/// Main wallet service configuration.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Rate configuration.
    pub rates: RatesConfig,
    /// Deadline for one whole request.
    pub request_timeout: Duration,
    /// Log level.
    pub log_level: String,
    /// Emit JSON log lines.
    pub log_json: bool,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            rates: RatesConfig::default(),
            request_timeout: Duration::from_secs(10),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl WalletConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        if let Some(max) = env_parse("DATABASE_MAX_CONNECTIONS") {
            config.database.max_connections = max;
        }

        if let Some(secs) = env_parse("DATABASE_ACQUIRE_TIMEOUT_SECS") {
            config.database.acquire_timeout = Duration::from_secs(secs);
        }

        if let Ok(addr) = std::env::var("RATES_PROVIDER_ADDR") {
            config.rates.provider_addr = addr;
        }

        if let Some(secs) = env_parse("RATES_CACHE_TTL_SECS") {
            config.rates.cache_ttl = Duration::from_secs(secs);
        }

        if let Some(ms) = env_parse("RATES_TIMEOUT_MS") {
            config.rates.request_timeout = Duration::from_millis(ms);
        }

        if let Some(ms) = env_parse("REQUEST_TIMEOUT_MS") {
            config.request_timeout = Duration::from_millis(ms);
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Some(json) = env_parse("LOG_JSON") {
            config.log_json = json;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }

        if self.database.max_connections == 0 {
            return Err("Database pool needs at least one connection".to_string());
        }

        if self.rates.provider_addr.is_empty() {
            return Err("Rate provider address cannot be empty".to_string());
        }

        if self.rates.cache_ttl.is_zero() {
            return Err("Rate cache TTL cannot be zero".to_string());
        }

        if self.rates.request_timeout.is_zero() {
            return Err("Rate request timeout cannot be zero".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WalletConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rates.cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_cache_config_follows_rates() {
        let mut config = WalletConfig::default();
        config.rates.cache_ttl = Duration::from_secs(60);
        config.rates.max_cache_entries = 8;

        let cache = config.rates.cache_config();
        assert_eq!(cache.ttl, Duration::from_secs(60));
        assert_eq!(cache.max_entries, 8);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = WalletConfig::default();
        config.rates.cache_ttl = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = WalletConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }
}
