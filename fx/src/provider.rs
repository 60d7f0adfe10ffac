//! Rate provider trait and test double.

use std::collections::BTreeMap;

use async_trait::async_trait;
use fxwallet_common::CurrencyPair;

use crate::error::FxResult;

/// Full rate table as published by the provider: currency code to rate.
pub type RateTable = BTreeMap<String, String>;

/// External source of exchange rates.
///
/// Rates travel as decimal strings so no precision is lost before they are
/// parsed into exact decimals.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the full rate table.
    async fn get_all_rates(&self) -> FxResult<RateTable>;

    /// Get the rate converting `pair.from` into `pair.to`.
    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<String>;
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockRateProvider;

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use dashmap::DashMap;
    use fxwallet_common::CurrencyPair;
    use parking_lot::RwLock;

    use super::{RateProvider, RateTable};
    use crate::error::{FxError, FxResult};

    /// Scripted rate provider that counts its calls.
    #[derive(Default)]
    pub struct MockRateProvider {
        rates: DashMap<CurrencyPair, String>,
        table: RwLock<RateTable>,
        unavailable: AtomicBool,
        rate_calls: AtomicUsize,
        table_calls: AtomicUsize,
    }

    impl MockRateProvider {
        /// Create a provider with no rates.
        pub fn new() -> Self {
            Self::default()
        }

        /// Set the rate for a currency pair.
        pub fn set_rate(&self, pair: CurrencyPair, rate: impl Into<String>) {
            self.rates.insert(pair, rate.into());
        }

        /// Set the full rate table.
        pub fn set_table(&self, table: RateTable) {
            *self.table.write() = table;
        }

        /// Make every call fail as unavailable.
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        /// Number of `get_rate` calls served so far.
        pub fn rate_calls(&self) -> usize {
            self.rate_calls.load(Ordering::SeqCst)
        }

        /// Number of `get_all_rates` calls served so far.
        pub fn table_calls(&self) -> usize {
            self.table_calls.load(Ordering::SeqCst)
        }

        fn check_available(&self) -> FxResult<()> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(FxError::ProviderUnavailable("mock provider offline".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RateProvider for MockRateProvider {
        fn name(&self) -> &str {
            "MOCK"
        }

        async fn get_all_rates(&self) -> FxResult<RateTable> {
            self.table_calls.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;
            Ok(self.table.read().clone())
        }

        async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<String> {
            self.rate_calls.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;
            self.rates
                .get(pair)
                .map(|r| r.clone())
                .ok_or(FxError::RateNotAvailable(*pair))
        }
    }
}
