//! Service error taxonomy.

use std::collections::BTreeMap;

use fxwallet_common::{Currency, CurrencyError};
use fxwallet_fx::FxError;
use fxwallet_ledger::LedgerError;
use thiserror::Error;

/// How an error should be treated by callers and the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed client input.
    Validation,
    /// Expected rule outcome, never a fault.
    Business,
    /// Rate provider or store failed.
    Dependency,
    /// Anything else.
    Internal,
}

/// Errors returned by the wallet and exchange services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Request fields failed validation.
    #[error("Validation failed")]
    InvalidRequest { fields: BTreeMap<String, String> },

    /// The caller's user id is not a valid identifier.
    #[error("Invalid user id")]
    InvalidUserId,

    /// Amount is zero, negative or too small to convert.
    #[error("Invalid amount, must be greater than zero")]
    InvalidAmount,

    /// Currency code outside the supported set, or a non-finite amount.
    #[error(transparent)]
    Currency(#[from] CurrencyError),

    /// Exchange from a currency into itself.
    #[error("Cannot exchange {0} into itself")]
    SameCurrency(Currency),

    /// Ledger store error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Rate layer error.
    #[error(transparent)]
    Fx(#[from] FxError),

    /// The request ran past its deadline and was abandoned.
    #[error("Request timed out")]
    DeadlineExceeded,
}

impl ServiceError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidRequest { .. }
            | ServiceError::InvalidUserId
            | ServiceError::SameCurrency(_)
            | ServiceError::Currency(CurrencyError::NotFinite) => ErrorKind::Validation,
            ServiceError::InvalidAmount | ServiceError::Currency(_) => ErrorKind::Business,
            ServiceError::Ledger(e) if e.is_business() => ErrorKind::Business,
            ServiceError::Ledger(_) => ErrorKind::Dependency,
            ServiceError::Fx(FxError::InvalidEndpoint(_)) => ErrorKind::Internal,
            ServiceError::Fx(_) | ServiceError::DeadlineExceeded => ErrorKind::Dependency,
        }
    }

    /// Get error code for logs and metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::InvalidRequest { .. } => "VALIDATION_ERROR",
            ServiceError::InvalidUserId => "INVALID_USER_ID",
            ServiceError::InvalidAmount => "INVALID_AMOUNT",
            ServiceError::Currency(e) => e.error_code(),
            ServiceError::SameCurrency(_) => "SAME_CURRENCY",
            ServiceError::Ledger(e) => e.error_code(),
            ServiceError::Fx(e) => e.error_code(),
            ServiceError::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }

    /// HTTP status the boundary reports for this error.
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::Ledger(LedgerError::WalletNotFound(_)) => 404,
            ServiceError::Ledger(LedgerError::UserNotFound(_)) => 401,
            ServiceError::Ledger(LedgerError::Database(_) | LedgerError::Migration(_)) => 500,
            ServiceError::Fx(FxError::ProviderUnavailable(_)) => 503,
            ServiceError::Fx(FxError::RateNotAvailable(_)) => 400,
            ServiceError::DeadlineExceeded => 504,
            _ => match self.kind() {
                ErrorKind::Validation | ErrorKind::Business => 400,
                ErrorKind::Dependency => 502,
                ErrorKind::Internal => 500,
            },
        }
    }

    /// Whether the error is `InsufficientFunds` from the store.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, ServiceError::Ledger(LedgerError::InsufficientFunds { .. }))
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use fxwallet_common::UserId;
    use rust_decimal_macros::dec;

    #[test]
    fn test_business_errors_are_not_faults() {
        let insufficient = ServiceError::from(LedgerError::InsufficientFunds {
            currency: Currency::Rub,
            requested: dec!(600),
        });
        assert_eq!(insufficient.kind(), ErrorKind::Business);
        assert_eq!(insufficient.error_code(), "INSUFFICIENT_FUNDS");
        assert_eq!(insufficient.status(), 400);
        assert!(insufficient.is_insufficient_funds());

        let out_of_range = ServiceError::from(LedgerError::AmountOutOfRange {
            currency: Currency::Usd,
        });
        assert_eq!(out_of_range.kind(), ErrorKind::Business);
        assert_eq!(out_of_range.error_code(), "AMOUNT_OUT_OF_RANGE");
        assert_eq!(out_of_range.status(), 400);

        let unsupported = ServiceError::from(CurrencyError::Unsupported("JPY".into()));
        assert_eq!(unsupported.kind(), ErrorKind::Business);
        assert_eq!(unsupported.error_code(), "UNSUPPORTED_CURRENCY");
    }

    #[test]
    fn test_missing_wallet_is_not_found() {
        let err = ServiceError::from(LedgerError::WalletNotFound(UserId::new()));
        assert_eq!(err.kind(), ErrorKind::Business);
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_provider_failures_are_dependency_errors() {
        let err = ServiceError::from(FxError::ProviderUnavailable("down".into()));
        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert_eq!(err.status(), 503);
    }
}
