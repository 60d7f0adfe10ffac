//! Rate caching with TTL support.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use fxwallet_common::CurrencyPair;
use tokio::time::Instant;
use tracing::debug;

use crate::provider::RateTable;

/// Key of the cached full rate table.
const ALL_RATES_KEY: &str = "exchange_rates";

/// What a cache entry holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedQuote {
    Table(RateTable),
    Rate(String),
}

/// Cached quote entry.
#[derive(Debug, Clone)]
struct CacheEntry {
    quote: CachedQuote,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(quote: CachedQuote, ttl: Duration) -> Self {
        Self {
            quote,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Configuration for rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Lifetime of every cached quote.
    pub ttl: Duration,
    /// Entry count above which expired entries are swept on insert.
    pub max_entries: usize,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            max_entries: 1024,
        }
    }
}

/// Thread-safe rate cache with TTL.
///
/// Each key is read and written atomically; entries are independent of one
/// another. An expired entry is a miss and is never returned.
pub struct RateCache {
    cache: DashMap<String, CacheEntry>,
    config: RateCacheConfig,
}

impl RateCache {
    /// Create a new rate cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(RateCacheConfig::default())
    }

    /// Create a new rate cache with custom configuration.
    pub fn with_config(config: RateCacheConfig) -> Self {
        Self {
            cache: DashMap::new(),
            config,
        }
    }

    /// Configured TTL.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Get the cached rate table if still fresh.
    pub fn get_table(&self) -> Option<RateTable> {
        match self.get(ALL_RATES_KEY) {
            Some(CachedQuote::Table(table)) => Some(table),
            _ => None,
        }
    }

    /// Cache the full rate table.
    pub fn insert_table(&self, table: RateTable) {
        self.insert(ALL_RATES_KEY.to_string(), CachedQuote::Table(table));
    }

    /// Get the cached rate for a pair if still fresh.
    pub fn get_rate(&self, pair: &CurrencyPair) -> Option<String> {
        match self.get(&Self::pair_key(pair)) {
            Some(CachedQuote::Rate(rate)) => Some(rate),
            _ => None,
        }
    }

    /// Cache the rate for a pair.
    pub fn insert_rate(&self, pair: &CurrencyPair, rate: String) {
        self.insert(Self::pair_key(pair), CachedQuote::Rate(rate));
    }

    /// Remove the cached rate for a pair.
    pub fn remove_rate(&self, pair: &CurrencyPair) {
        self.cache.remove(&Self::pair_key(pair));
    }

    /// Clear all cached quotes.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Get the number of entries in cache, expired ones included.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Evict expired entries.
    pub fn evict_expired(&self) {
        self.cache.retain(|_, entry| entry.is_valid());
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let total = self.cache.len();
        let valid = self.cache.iter().filter(|e| e.is_valid()).count();

        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
        }
    }

    fn get(&self, key: &str) -> Option<CachedQuote> {
        if let Some(entry) = self.cache.get(key) {
            if entry.is_valid() {
                debug!(key, "Cache hit");
                return Some(entry.quote.clone());
            }
            debug!(key, "Cache entry expired");
            drop(entry);
            // Only drop the entry if nobody refreshed it in the meantime.
            self.cache.remove_if(key, |_, entry| !entry.is_valid());
        }

        debug!(key, "Cache miss");
        None
    }

    fn insert(&self, key: String, quote: CachedQuote) {
        if self.cache.len() >= self.config.max_entries {
            self.evict_expired();
        }

        self.cache.insert(key, CacheEntry::new(quote, self.config.ttl));
    }

    fn pair_key(pair: &CurrencyPair) -> String {
        format!("exchange_rate:{}:{}", pair.from.code(), pair.to.code())
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

/// Shared rate cache, created once at startup and handed to its users.
pub type SharedRateCache = Arc<RateCache>;
