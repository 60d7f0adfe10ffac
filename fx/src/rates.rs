//! Read-through rate lookups in front of the provider.

use std::str::FromStr;
use std::sync::Arc;

use fxwallet_common::CurrencyPair;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use crate::cache::SharedRateCache;
use crate::error::{FxError, FxResult};
use crate::provider::{RateProvider, RateTable};

/// Parse a quoted rate into an exact decimal.
pub fn parse_rate(rate: &str) -> FxResult<Decimal> {
    match Decimal::from_str(rate.trim()) {
        Ok(value) if value > Decimal::ZERO => Ok(value),
        _ => Err(FxError::InvalidRate(rate.to_string())),
    }
}

/// Rate lookups that consult the shared cache before the provider.
///
/// A miss calls the provider and stores the answer for the cache TTL.
/// Provider failures are returned as-is; stale entries are never used as a
/// fallback.
#[derive(Clone)]
pub struct CachedRates {
    provider: Arc<dyn RateProvider>,
    cache: SharedRateCache,
}

impl CachedRates {
    /// Create lookups over `provider`, sharing `cache`.
    pub fn new(provider: Arc<dyn RateProvider>, cache: SharedRateCache) -> Self {
        Self { provider, cache }
    }

    /// The shared cache handle.
    pub fn cache(&self) -> &SharedRateCache {
        &self.cache
    }

    /// Get the full rate table.
    #[instrument(skip(self))]
    pub async fn get_rates(&self) -> FxResult<RateTable> {
        if let Some(table) = self.cache.get_table() {
            return Ok(table);
        }

        let table = self.provider.get_all_rates().await.map_err(|e| {
            warn!(provider = self.provider.name(), error = %e, "Rate table fetch failed");
            e
        })?;
        debug!(provider = self.provider.name(), entries = table.len(), "Fetched rate table");

        self.cache.insert_table(table.clone());
        Ok(table)
    }

    /// Get the quoted rate for an ordered pair.
    #[instrument(skip(self), fields(pair = %pair))]
    pub async fn get_rate(&self, pair: CurrencyPair) -> FxResult<String> {
        if let Some(rate) = self.cache.get_rate(&pair) {
            return Ok(rate);
        }

        let rate = self.provider.get_rate(&pair).await.map_err(|e| {
            warn!(provider = self.provider.name(), error = %e, "Rate fetch failed");
            e
        })?;
        debug!(provider = self.provider.name(), rate = %rate, "Fetched rate");

        self.cache.insert_rate(&pair, rate.clone());
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{RateCache, RateCacheConfig};
    use crate::provider::MockRateProvider;
    use fxwallet_common::Currency;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn setup() -> (Arc<MockRateProvider>, CachedRates) {
        let provider = Arc::new(MockRateProvider::new());
        provider.set_rate(CurrencyPair::new(Currency::Rub, Currency::Usd), "0.013");

        let mut table = RateTable::new();
        table.insert("RUB".to_string(), "1".to_string());
        table.insert("USD".to_string(), "0.013".to_string());
        table.insert("EUR".to_string(), "0.011".to_string());
        provider.set_table(table);

        let cache = Arc::new(RateCache::with_config(RateCacheConfig::default()));
        let rates = CachedRates::new(provider.clone(), cache);
        (provider, rates)
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("0.013").unwrap(), dec!(0.013));
        assert_eq!(parse_rate(" 90.5 ").unwrap(), dec!(90.5));
        assert!(matches!(parse_rate("abc"), Err(FxError::InvalidRate(_))));
        assert!(matches!(parse_rate("0"), Err(FxError::InvalidRate(_))));
        assert!(matches!(parse_rate("-1.2"), Err(FxError::InvalidRate(_))));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_provider() {
        let (provider, rates) = setup();
        let pair = CurrencyPair::new(Currency::Rub, Currency::Usd);

        let first = rates.get_rate(pair).await.unwrap();
        let second = rates.get_rate(pair).await.unwrap();

        assert_eq!(first, "0.013");
        assert_eq!(first, second);
        assert_eq!(provider.rate_calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_table_is_cached() {
        let (provider, rates) = setup();

        let first = rates.get_rates().await.unwrap();
        let second = rates.get_rates().await.unwrap();

        assert_eq!(first.get("USD").map(String::as_str), Some("0.013"));
        assert_eq!(first, second);
        assert_eq!(provider.table_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_rate_refetches() {
        let (provider, rates) = setup();
        let pair = CurrencyPair::new(Currency::Rub, Currency::Usd);

        rates.get_rate(pair).await.unwrap();
        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        rates.get_rate(pair).await.unwrap();
        assert_eq!(provider.rate_calls(), 1);

        provider.set_rate(pair, "0.012");
        tokio::time::advance(Duration::from_secs(61)).await;
        let refreshed = rates.get_rate(pair).await.unwrap();

        assert_eq!(refreshed, "0.012");
        assert_eq!(provider.rate_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_rate_table_refetches() {
        let (provider, rates) = setup();

        rates.get_rates().await.unwrap();
        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        rates.get_rates().await.unwrap();
        assert_eq!(provider.table_calls(), 1);

        let mut table = RateTable::new();
        table.insert("RUB".to_string(), "1".to_string());
        table.insert("USD".to_string(), "0.012".to_string());
        table.insert("EUR".to_string(), "0.010".to_string());
        provider.set_table(table);
        tokio::time::advance(Duration::from_secs(61)).await;
        let refreshed = rates.get_rates().await.unwrap();

        assert_eq!(refreshed["USD"], "0.012");
        assert_eq!(provider.table_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_stale_fallback_on_provider_failure() {
        let (provider, rates) = setup();
        let pair = CurrencyPair::new(Currency::Rub, Currency::Usd);

        rates.get_rate(pair).await.unwrap();
        provider.set_unavailable(true);
        tokio::time::advance(Duration::from_secs(5 * 60 + 1)).await;

        let result = rates.get_rate(pair).await;
        assert!(matches!(result, Err(FxError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let (provider, rates) = setup();
        provider.set_unavailable(true);

        assert!(rates.get_rates().await.is_err());

        provider.set_unavailable(false);
        assert!(rates.get_rates().await.is_ok());
        assert_eq!(provider.table_calls(), 2);
    }
}
