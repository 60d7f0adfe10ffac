//! Monetary types for the wallet.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CurrencyError;

/// Fractional digits kept for every stored or exchanged amount.
pub const AMOUNT_SCALE: u32 = 2;

/// Fractional digits a stored balance can hold.
pub const BALANCE_SCALE: u32 = 10;

/// Exclusive upper bound of a stored balance (10^18), matching the
/// `NUMERIC(28, 10)` balance columns.
pub const MAX_BALANCE: Decimal = Decimal::from_parts(0xA764_0000, 0x0DE0_B6B3, 0, false, 0);

/// Whether `value` fits a balance column without overflow.
pub fn within_balance_range(value: Decimal) -> bool {
    value.abs() < MAX_BALANCE
}

/// Round an amount to the wallet scale, midpoint away from zero.
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Fit a computed amount to the balance column scale, midpoint away from
/// zero. Exact for any product of a wallet amount and a rate quoted with at
/// most `BALANCE_SCALE - AMOUNT_SCALE` fractional digits.
pub fn round_balance(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(BALANCE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a client-supplied floating amount into an exact decimal.
///
/// This is the single place where binary floating point enters the system;
/// the result is rounded once to [`AMOUNT_SCALE`].
pub fn amount_from_client(value: f64) -> Result<Decimal, CurrencyError> {
    if !value.is_finite() {
        return Err(CurrencyError::NotFinite);
    }
    Decimal::from_f64(value)
        .map(round_amount)
        .ok_or(CurrencyError::NotFinite)
}

/// One of the three currencies a wallet holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Rub,
    Usd,
    Eur,
}

impl Currency {
    /// Every supported currency, in balance column order.
    pub const ALL: [Currency; 3] = [Currency::Rub, Currency::Usd, Currency::Eur];

    /// Get the ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Rub => "RUB",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }

    /// Name of the wallet column holding this currency's balance.
    pub fn balance_column(&self) -> &'static str {
        match self {
            Currency::Rub => "balance_rub",
            Currency::Usd => "balance_usd",
            Currency::Eur => "balance_eur",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RUB" => Ok(Currency::Rub),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            _ => Err(CurrencyError::Unsupported(s.to_string())),
        }
    }
}

/// An ordered currency pair: amounts in `from` are converted into `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub from: Currency,
    pub to: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(from: Currency, to: Currency) -> Self {
        Self { from, to }
    }

    /// Whether both legs name the same currency.
    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

/// The three balances of one wallet as committed at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub balance_rub: Decimal,
    pub balance_usd: Decimal,
    pub balance_eur: Decimal,
}

impl WalletSnapshot {
    /// Create a snapshot from explicit balances.
    pub fn new(balance_rub: Decimal, balance_usd: Decimal, balance_eur: Decimal) -> Self {
        Self {
            balance_rub,
            balance_usd,
            balance_eur,
        }
    }

    /// Balance held in the given currency.
    pub fn balance(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Rub => self.balance_rub,
            Currency::Usd => self.balance_usd,
            Currency::Eur => self.balance_eur,
        }
    }

    /// Mutable access to the balance held in the given currency.
    pub fn balance_mut(&mut self, currency: Currency) -> &mut Decimal {
        match currency {
            Currency::Rub => &mut self.balance_rub,
            Currency::Usd => &mut self.balance_usd,
            Currency::Eur => &mut self.balance_eur,
        }
    }

    /// True when no balance is below zero.
    pub fn is_non_negative(&self) -> bool {
        Currency::ALL
            .iter()
            .all(|c| self.balance(*c) >= Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_range() {
        assert_eq!(MAX_BALANCE, dec!(1000000000000000000));
        assert!(within_balance_range(dec!(999999999999999999.99)));
        assert!(!within_balance_range(MAX_BALANCE));
        assert!(!within_balance_range(dec!(70000000000000000000000000000)));
    }

    #[test]
    fn test_currency_parse_is_case_insensitive() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!("Eur".parse::<Currency>().unwrap(), Currency::Eur);
        assert_eq!("RUB".parse::<Currency>().unwrap(), Currency::Rub);
    }

    #[test]
    fn test_unsupported_currency() {
        let err = "JPY".parse::<Currency>().unwrap_err();
        assert_eq!(err, CurrencyError::Unsupported("JPY".to_string()));
        assert_eq!(err.error_code(), "UNSUPPORTED_CURRENCY");
    }

    #[test]
    fn test_currency_serializes_as_code() {
        let json = serde_json::to_string(&Currency::Usd).unwrap();
        assert_eq!(json, "\"USD\"");
    }

    #[test]
    fn test_amount_from_client_rounds_once() {
        assert_eq!(amount_from_client(10.0).unwrap(), dec!(10));
        assert_eq!(amount_from_client(0.1).unwrap(), dec!(0.1));
        assert_eq!(amount_from_client(12.345678).unwrap(), dec!(12.35));
        assert_eq!(amount_from_client(-5.0).unwrap(), dec!(-5));
    }

    #[test]
    fn test_amount_from_client_rejects_non_finite() {
        assert_eq!(amount_from_client(f64::NAN), Err(CurrencyError::NotFinite));
        assert_eq!(amount_from_client(f64::INFINITY), Err(CurrencyError::NotFinite));
    }

    #[test]
    fn test_round_amount_midpoint_away_from_zero() {
        assert_eq!(round_amount(dec!(0.125)), dec!(0.13));
        assert_eq!(round_amount(dec!(13.000)), dec!(13.00));
    }

    #[test]
    fn test_snapshot_balance_access() {
        let mut snapshot = WalletSnapshot::new(dec!(1000), dec!(0), dec!(0));
        *snapshot.balance_mut(Currency::Usd) += dec!(13.00);

        assert_eq!(snapshot.balance(Currency::Rub), dec!(1000));
        assert_eq!(snapshot.balance(Currency::Usd), dec!(13.00));
        assert!(snapshot.is_non_negative());

        *snapshot.balance_mut(Currency::Eur) -= dec!(0.01);
        assert!(!snapshot.is_non_negative());
    }

    #[test]
    fn test_balance_columns_are_distinct() {
        let columns: std::collections::HashSet<_> =
            Currency::ALL.iter().map(|c| c.balance_column()).collect();
        assert_eq!(columns.len(), 3);
    }
}
