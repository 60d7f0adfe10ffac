//! Error types for shared wallet values.

use thiserror::Error;

/// Errors raised while interpreting client-supplied currency or amount values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    /// The currency code is not one of RUB, USD or EUR.
    #[error("Unsupported currency: {0}")]
    Unsupported(String),

    /// The amount cannot be represented as an exact decimal.
    #[error("Amount is not a finite number")]
    NotFinite,
}

impl CurrencyError {
    /// Get error code for boundary responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            CurrencyError::Unsupported(_) => "UNSUPPORTED_CURRENCY",
            CurrencyError::NotFinite => "INVALID_AMOUNT",
        }
    }
}
