//! Rate layer error types.

use fxwallet_common::CurrencyPair;
use thiserror::Error;

/// Errors that can occur while obtaining a rate.
#[derive(Debug, Error)]
pub enum FxError {
    /// The provider has no rate for the requested pair.
    #[error("Rate not available for {0}")]
    RateNotAvailable(CurrencyPair),

    /// The provider could not be reached or did not answer in time.
    #[error("Rate provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider answered with an error.
    #[error("Rate provider error: {0}")]
    ProviderError(String),

    /// The quoted rate is not a positive decimal.
    #[error("Invalid rate: {0:?}")]
    InvalidRate(String),

    /// The provider address is malformed.
    #[error("Invalid rate provider endpoint: {0}")]
    InvalidEndpoint(String),
}

impl FxError {
    /// Get error code for boundary responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::RateNotAvailable(_) => "RATE_NOT_AVAILABLE",
            FxError::ProviderUnavailable(_) => "RATE_PROVIDER_UNAVAILABLE",
            FxError::ProviderError(_) => "RATE_PROVIDER_ERROR",
            FxError::InvalidRate(_) => "INVALID_RATE",
            FxError::InvalidEndpoint(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type for rate operations.
pub type FxResult<T> = Result<T, FxError>;
