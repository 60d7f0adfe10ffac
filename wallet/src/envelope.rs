//! JSON shapes at the service boundary.
//!
//! Requests are validated field by field here, results and errors are turned
//! into the bodies clients see. Nothing below this module formats
//! user-facing text.

use std::collections::BTreeMap;

use fxwallet_common::{amount_from_client, within_balance_range, CurrencyError, WalletSnapshot};
use fxwallet_fx::RateTable;
use fxwallet_ledger::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{ErrorKind, ServiceError, ServiceResult};
use crate::exchange_service::ExchangeOutcome;

/// Collects per-field validation failures.
#[derive(Debug, Default)]
struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    fn add(&mut self, field: &str, message: &str) {
        self.0.insert(field.to_string(), message.to_string());
    }

    fn currency(&mut self, field: &str, value: Option<&str>) {
        match value {
            None | Some("") => self.add(field, "is required"),
            Some(code) if code.chars().count() != 3 => {
                self.add(field, "must be exactly 3 characters")
            }
            Some(code) if !code.chars().all(|c| c.is_ascii_alphabetic()) => {
                self.add(field, "is invalid")
            }
            Some(_) => {}
        }
    }

    fn amount(&mut self, field: &str, value: Option<f64>) -> Option<Decimal> {
        match value.map(amount_from_client) {
            None => {
                self.add(field, "is required");
                None
            }
            Some(Err(_)) => {
                self.add(field, "is invalid");
                None
            }
            Some(Ok(amount)) if !within_balance_range(amount) => {
                self.add(field, "is out of range");
                None
            }
            Some(Ok(amount)) => Some(amount),
        }
    }

    fn finish<T>(self, value: Option<T>) -> ServiceResult<T> {
        match value {
            Some(value) if self.0.is_empty() => Ok(value),
            _ => Err(ServiceError::InvalidRequest { fields: self.0 }),
        }
    }
}

/// Body of a deposit or withdrawal request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

/// A deposit or withdrawal that passed field validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTransaction {
    pub amount: Decimal,
    pub currency: String,
}

impl WalletTransaction {
    /// Check the fields and convert the amount to an exact decimal.
    pub fn validate(&self) -> ServiceResult<ValidTransaction> {
        let mut errors = FieldErrors::default();
        errors.currency("currency", self.currency.as_deref());
        let amount = errors.amount("amount", self.amount);

        let currency = self.currency.clone().unwrap_or_default();
        errors.finish(amount.map(|amount| ValidTransaction { amount, currency }))
    }
}

/// Body of an exchange request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub from_currency: Option<String>,
    pub to_currency: Option<String>,
    pub amount: Option<f64>,
}

/// An exchange request that passed field validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidExchange {
    pub from_currency: String,
    pub to_currency: String,
    pub amount: Decimal,
}

impl ExchangeRequest {
    /// Check the fields and convert the amount to an exact decimal.
    pub fn validate(&self) -> ServiceResult<ValidExchange> {
        let mut errors = FieldErrors::default();
        errors.currency("from_currency", self.from_currency.as_deref());
        errors.currency("to_currency", self.to_currency.as_deref());
        let amount = errors.amount("amount", self.amount);

        let from_currency = self.from_currency.clone().unwrap_or_default();
        let to_currency = self.to_currency.clone().unwrap_or_default();
        errors.finish(amount.map(|amount| ValidExchange {
            from_currency,
            to_currency,
            amount,
        }))
    }
}

/// `{"balance": {...}}`
#[derive(Debug, Clone, Serialize)]
pub struct BalanceBody {
    pub balance: WalletSnapshot,
}

/// `{"message": ..., "new_balance": {...}}`
#[derive(Debug, Clone, Serialize)]
pub struct TransactionBody {
    pub message: &'static str,
    pub new_balance: WalletSnapshot,
}

impl TransactionBody {
    pub fn deposited(new_balance: WalletSnapshot) -> Self {
        Self {
            message: "Account topped up successfully",
            new_balance,
        }
    }

    pub fn withdrawn(new_balance: WalletSnapshot) -> Self {
        Self {
            message: "Withdrawal successful",
            new_balance,
        }
    }
}

/// `{"message": ..., "exchanged_amount": ..., "new_balance": {...}}`
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeBody {
    pub message: &'static str,
    pub exchanged_amount: Decimal,
    pub new_balance: WalletSnapshot,
}

impl From<ExchangeOutcome> for ExchangeBody {
    fn from(outcome: ExchangeOutcome) -> Self {
        Self {
            message: "Exchange successful",
            exchanged_amount: outcome.exchanged_amount,
            new_balance: outcome.new_balance,
        }
    }
}

/// `{"rates": {...}}`
#[derive(Debug, Clone, Serialize)]
pub struct RatesBody {
    pub rates: RateTable,
}

/// Inner part of the error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

/// `{"error": {"code": ..., "message": ..., "fields": {...}}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

impl ErrorBody {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code,
                message: message.into(),
                fields: BTreeMap::new(),
            },
        }
    }

    fn with_field(mut self, field: &str, message: &str) -> Self {
        self.error.fields.insert(field.to_string(), message.to_string());
        self
    }

    /// Build the client-facing body for `err`, logging it at a level that
    /// matches its kind.
    pub fn from_error(err: &ServiceError) -> Self {
        let status = err.status();

        match err.kind() {
            ErrorKind::Validation | ErrorKind::Business => {
                debug!(code = err.error_code(), error = %err, "Request rejected");
            }
            ErrorKind::Dependency => {
                warn!(code = err.error_code(), error = %err, "Dependency failure");
            }
            ErrorKind::Internal => {
                error!(code = err.error_code(), error = ?err, "Unhandled service error");
            }
        }

        match err {
            ServiceError::InvalidRequest { fields } => Self {
                error: ErrorDetail {
                    code: status,
                    message: "Validation error".to_string(),
                    fields: fields.clone(),
                },
            },
            ServiceError::InvalidUserId => Self::new(status, "invalid user id"),
            ServiceError::InvalidAmount => {
                Self::new(status, "invalid amount, must be greater than zero")
            }
            ServiceError::Currency(CurrencyError::NotFinite) => {
                Self::new(status, "invalid amount, must be greater than zero")
            }
            ServiceError::Currency(_) => Self::new(status, "unsupported currency"),
            ServiceError::SameCurrency(_) => {
                Self::new(status, "cannot exchange a currency into itself")
            }
            ServiceError::Ledger(ledger) => match ledger {
                LedgerError::WalletNotFound(_) => Self::new(status, "Wallet not found"),
                LedgerError::InsufficientFunds { .. } => Self::new(status, "Insufficient funds"),
                LedgerError::AmountOutOfRange { .. } => Self::new(status, "amount out of range"),
                LedgerError::SameCurrency(_) => {
                    Self::new(status, "cannot exchange a currency into itself")
                }
                LedgerError::UserAlreadyExists(_) => Self::new(status, "username already exists")
                    .with_field("username", "field already exists"),
                LedgerError::EmailAlreadyUsed(_) => Self::new(status, "email already used")
                    .with_field("email", "field already exists"),
                LedgerError::UserNotFound(_) => {
                    Self::new(status, "Invalid username or password")
                }
                LedgerError::Database(_) | LedgerError::Migration(_) => {
                    Self::new(status, "Internal server error")
                }
            },
            ServiceError::Fx(fx) if err.kind() == ErrorKind::Dependency => {
                Self::new(status, fx.to_string())
            }
            ServiceError::Fx(_) => Self::new(status, "Internal server error"),
            ServiceError::DeadlineExceeded => Self::new(status, "Request timed out"),
        }
    }
}

impl From<&ServiceError> for ErrorBody {
    fn from(err: &ServiceError) -> Self {
        Self::from_error(err)
    }
}
