//! FxWallet Rate Cache
//!
//! Fetches exchange rates from the external rate service and keeps them in a
//! short-TTL cache so repeated quotes do not reach the provider.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fxwallet_common::{Currency, CurrencyPair};
//! use fxwallet_fx::{CachedRates, GrpcRateProvider, RateCache};
//!
//! let provider = Arc::new(GrpcRateProvider::connect_lazy("http://rates:50051", timeout)?);
//! let rates = CachedRates::new(provider, Arc::new(RateCache::new()));
//!
//! let rate = rates.get_rate(CurrencyPair::new(Currency::Rub, Currency::Usd)).await?;
//! ```

pub mod cache;
pub mod error;
pub mod grpc;
pub mod provider;
pub mod rates;

pub use cache::{RateCache, RateCacheConfig, SharedRateCache};
pub use error::{FxError, FxResult};
pub use grpc::GrpcRateProvider;
pub use provider::{RateProvider, RateTable};
#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateProvider;
pub use rates::{parse_rate, CachedRates};
