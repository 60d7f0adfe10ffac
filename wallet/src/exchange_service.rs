//! Currency exchange as Quote, Compute, Commit.
//!
//! Quote and Compute perform no durable writes. Commit is a single atomic
//! ledger update, so an exchange either moves both balances or neither.
//!
//! The quoted rate may come from the cache and be up to one TTL old. It is
//! not re-checked against the provider at commit time.

use std::sync::Arc;

use fxwallet_common::{round_amount, round_balance, Currency, CurrencyPair, UserId, WalletSnapshot};
use fxwallet_fx::{parse_rate, CachedRates, RateTable};
use fxwallet_ledger::LedgerStore;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::{ServiceError, ServiceResult};
use crate::wallet_service::ensure_positive;

/// Result of a committed exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeOutcome {
    /// Amount credited to the destination balance.
    pub exchanged_amount: Decimal,
    /// Amount debited from the source balance.
    pub debited_amount: Decimal,
    /// Rate the credit was computed with.
    pub rate: Decimal,
    /// Wallet after the commit.
    pub new_balance: WalletSnapshot,
}

/// Source and destination amounts of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Conversion {
    debit: Decimal,
    credit: Decimal,
}

/// Multiply the source amount by the rate with exact decimals.
///
/// The debit carries the only rounding step; the credit is the exact
/// product, fitted to the balance column scale.
fn compute(amount: Decimal, rate: Decimal) -> ServiceResult<Conversion> {
    let debit = round_amount(amount);
    if debit <= Decimal::ZERO {
        return Err(ServiceError::InvalidAmount);
    }

    let credit = debit
        .checked_mul(rate)
        .map(round_balance)
        .ok_or(ServiceError::InvalidAmount)?;

    Ok(Conversion { debit, credit })
}

/// Rate queries and currency exchange.
#[derive(Clone)]
pub struct ExchangeService {
    rates: CachedRates,
    ledger: Arc<dyn LedgerStore>,
}

impl ExchangeService {
    /// Create a service quoting through `rates` and committing to `ledger`.
    pub fn new(rates: CachedRates, ledger: Arc<dyn LedgerStore>) -> Self {
        Self { rates, ledger }
    }

    /// Full rate table, cache-backed.
    pub async fn get_rates(&self) -> ServiceResult<RateTable> {
        Ok(self.rates.get_rates().await?)
    }

    /// Quoted rate for an ordered pair of currency codes, cache-backed.
    pub async fn get_rate(&self, from: &str, to: &str) -> ServiceResult<String> {
        let pair = CurrencyPair::new(from.parse()?, to.parse()?);
        Ok(self.rates.get_rate(pair).await?)
    }

    /// Convert `amount` of `from` into `to` in the user's wallet.
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn exchange(
        &self,
        user_id: UserId,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> ServiceResult<ExchangeOutcome> {
        let amount = ensure_positive(amount)?;
        let from: Currency = from.parse()?;
        let to: Currency = to.parse()?;
        let pair = CurrencyPair::new(from, to);
        if pair.is_identity() {
            return Err(ServiceError::SameCurrency(from));
        }

        // Quote
        let quoted = self.rates.get_rate(pair).await?;
        let rate = parse_rate(&quoted)?;

        // Compute
        let Conversion { debit, credit } = compute(amount, rate)?;
        debug!(%pair, %rate, %debit, %credit, "Exchange computed");

        // Commit
        let new_balance = self
            .ledger
            .exchange(user_id, from, to, debit, credit)
            .await
            .map_err(|e| {
                debug!(%pair, error = %e, "Exchange rejected at commit");
                ServiceError::from(e)
            })?;

        info!(%pair, %rate, %debit, %credit, "Exchange committed");

        Ok(ExchangeOutcome {
            exchanged_amount: credit,
            debited_amount: debit,
            rate,
            new_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxwallet_common::CurrencyError;
    use fxwallet_fx::{FxError, MockRateProvider, RateCache};
    use fxwallet_ledger::{LedgerError, MemoryLedgerStore};
    use rust_decimal_macros::dec;

    struct Fixture {
        user: UserId,
        provider: Arc<MockRateProvider>,
        store: Arc<MemoryLedgerStore>,
        service: ExchangeService,
    }

    fn setup(start: WalletSnapshot) -> Fixture {
        let provider = Arc::new(MockRateProvider::new());
        provider.set_rate(CurrencyPair::new(Currency::Rub, Currency::Usd), "0.013");
        provider.set_rate(CurrencyPair::new(Currency::Usd, Currency::Eur), "0.925");

        let store = Arc::new(MemoryLedgerStore::new());
        let user = UserId::new();
        store.open_wallet(user, start);

        let rates = CachedRates::new(provider.clone(), Arc::new(RateCache::new()));
        let service = ExchangeService::new(rates, store.clone());

        Fixture {
            user,
            provider,
            store,
            service,
        }
    }

    #[test]
    fn test_compute_credits_exact_product() {
        let conversion = compute(dec!(10.005), dec!(0.925)).unwrap();
        assert_eq!(conversion.debit, dec!(10.01));
        assert_eq!(conversion.credit, dec!(9.25925));

        assert_eq!(compute(dec!(1.00), dec!(0.013)).unwrap().credit, dec!(0.013));
        assert_eq!(compute(dec!(0.38), dec!(0.013)).unwrap().credit, dec!(0.00494));

        assert!(matches!(
            compute(dec!(0.004), dec!(0.013)),
            Err(ServiceError::InvalidAmount)
        ));
    }

    #[tokio::test]
    async fn test_sub_cent_credit_is_committed() {
        let f = setup(WalletSnapshot::new(dec!(100), Decimal::ZERO, Decimal::ZERO));

        let outcome = f.service.exchange(f.user, "RUB", "USD", dec!(0.38)).await.unwrap();

        assert_eq!(outcome.exchanged_amount, dec!(0.00494));
        assert_eq!(
            f.store.get_balance(f.user).await.unwrap(),
            WalletSnapshot::new(dec!(99.62), dec!(0.00494), Decimal::ZERO)
        );
    }

    #[tokio::test]
    async fn test_rub_to_usd() {
        let f = setup(WalletSnapshot::new(dec!(1000), Decimal::ZERO, Decimal::ZERO));

        let outcome = f.service.exchange(f.user, "RUB", "USD", dec!(1000)).await.unwrap();

        assert_eq!(outcome.exchanged_amount, dec!(13.00));
        assert_eq!(outcome.rate, dec!(0.013));
        assert_eq!(
            outcome.new_balance,
            WalletSnapshot::new(Decimal::ZERO, dec!(13.00), Decimal::ZERO)
        );
    }

    #[tokio::test]
    async fn test_balances_move_by_exact_amounts() {
        let start = WalletSnapshot::new(Decimal::ZERO, dec!(50.00), dec!(1.00));
        let f = setup(start);

        let outcome = f.service.exchange(f.user, "usd", "eur", dec!(20.5)).await.unwrap();
        let after = f.store.get_balance(f.user).await.unwrap();

        assert_eq!(after.balance_usd, start.balance_usd - outcome.debited_amount);
        assert_eq!(after.balance_eur, start.balance_eur + outcome.exchanged_amount);
        assert_eq!(after.balance_rub, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_insufficient_funds_changes_nothing() {
        let start = WalletSnapshot::new(dec!(100), Decimal::ZERO, Decimal::ZERO);
        let f = setup(start);

        let result = f.service.exchange(f.user, "RUB", "USD", dec!(1000)).await;

        assert!(matches!(
            result,
            Err(ServiceError::Ledger(LedgerError::InsufficientFunds { .. }))
        ));
        assert_eq!(f.store.get_balance(f.user).await.unwrap(), start);
    }

    #[tokio::test]
    async fn test_unsupported_currency_skips_quote() {
        let f = setup(WalletSnapshot::default());

        let result = f.service.exchange(f.user, "RUB", "JPY", dec!(10)).await;

        assert!(matches!(
            result,
            Err(ServiceError::Currency(CurrencyError::Unsupported(_)))
        ));
        assert_eq!(f.provider.rate_calls(), 0);
    }

    #[tokio::test]
    async fn test_same_currency_is_rejected() {
        let f = setup(WalletSnapshot::new(dec!(10), Decimal::ZERO, Decimal::ZERO));

        let result = f.service.exchange(f.user, "RUB", "rub", dec!(5)).await;

        assert!(matches!(result, Err(ServiceError::SameCurrency(Currency::Rub))));
        assert_eq!(f.provider.rate_calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let f = setup(WalletSnapshot::new(dec!(1000), Decimal::ZERO, Decimal::ZERO));
        f.provider.set_unavailable(true);

        let result = f.service.exchange(f.user, "RUB", "USD", dec!(10)).await;

        assert!(matches!(
            result,
            Err(ServiceError::Fx(FxError::ProviderUnavailable(_)))
        ));
        assert_eq!(f.store.get_balance(f.user).await.unwrap().balance_rub, dec!(1000));
    }

    #[tokio::test]
    async fn test_bad_quote_is_rejected() {
        let f = setup(WalletSnapshot::new(dec!(1000), Decimal::ZERO, Decimal::ZERO));
        f.provider
            .set_rate(CurrencyPair::new(Currency::Eur, Currency::Rub), "not-a-number");

        let result = f.service.exchange(f.user, "EUR", "RUB", dec!(1)).await;
        assert!(matches!(result, Err(ServiceError::Fx(FxError::InvalidRate(_)))));
    }

    #[tokio::test]
    async fn test_rate_lookup_is_cached() {
        let f = setup(WalletSnapshot::default());

        assert_eq!(f.service.get_rate("RUB", "USD").await.unwrap(), "0.013");
        assert_eq!(f.service.get_rate("rub", "usd").await.unwrap(), "0.013");
        assert_eq!(f.provider.rate_calls(), 1);
    }
}
