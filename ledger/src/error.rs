//! Ledger error types.

use fxwallet_common::{Currency, UserId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur in the ledger store.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No wallet row exists for the user.
    #[error("Wallet not found for user {0}")]
    WalletNotFound(UserId),

    /// The conditional debit did not hold at update time.
    #[error("Insufficient funds: requested {requested} {currency}")]
    InsufficientFunds { currency: Currency, requested: Decimal },

    /// The resulting balance would not fit the balance column.
    #[error("Amount out of range for {currency} balance")]
    AmountOutOfRange { currency: Currency },

    /// Exchange legs name the same balance.
    #[error("Cannot exchange {0} into itself")]
    SameCurrency(Currency),

    /// Username is taken.
    #[error("Username already exists: {0}")]
    UserAlreadyExists(String),

    /// Email is taken.
    #[error("Email already used: {0}")]
    EmailAlreadyUsed(String),

    /// No user with this username.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl LedgerError {
    /// Expected outcomes of a well-formed request, as opposed to store faults.
    pub fn is_business(&self) -> bool {
        !matches!(self, LedgerError::Database(_) | LedgerError::Migration(_))
    }

    /// Get error code for boundary responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::WalletNotFound(_) => "WALLET_NOT_FOUND",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            LedgerError::SameCurrency(_) => "SAME_CURRENCY",
            LedgerError::UserAlreadyExists(_) => "USER_ALREADY_EXISTS",
            LedgerError::EmailAlreadyUsed(_) => "EMAIL_ALREADY_USED",
            LedgerError::UserNotFound(_) => "USER_NOT_FOUND",
            LedgerError::Database(_) => "DATABASE_ERROR",
            LedgerError::Migration(_) => "DATABASE_ERROR",
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
