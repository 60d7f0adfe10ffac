//! Deposits, withdrawals and balance reads.

use std::sync::Arc;

use fxwallet_common::{Currency, UserId, WalletSnapshot};
use fxwallet_ledger::LedgerStore;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::error::{ServiceError, ServiceResult};

/// Reject zero and negative amounts.
pub(crate) fn ensure_positive(amount: Decimal) -> ServiceResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::InvalidAmount);
    }
    Ok(amount)
}

/// Business-rule gate in front of the ledger for single-currency operations.
#[derive(Clone)]
pub struct WalletService {
    ledger: Arc<dyn LedgerStore>,
}

impl WalletService {
    /// Create a service over `ledger`.
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Current balances of the user's wallet.
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn get_balance(&self, user_id: UserId) -> ServiceResult<WalletSnapshot> {
        Ok(self.ledger.get_balance(user_id).await?)
    }

    /// Credit `amount` of `currency` to the wallet.
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn deposit(
        &self,
        user_id: UserId,
        currency: &str,
        amount: Decimal,
    ) -> ServiceResult<WalletSnapshot> {
        let amount = ensure_positive(amount)?;
        let currency: Currency = currency.parse()?;

        let snapshot = self.ledger.deposit(user_id, currency, amount).await?;
        info!(%currency, %amount, "Deposit applied");
        Ok(snapshot)
    }

    /// Debit `amount` of `currency` from the wallet if funds suffice.
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn withdraw(
        &self,
        user_id: UserId,
        currency: &str,
        amount: Decimal,
    ) -> ServiceResult<WalletSnapshot> {
        let amount = ensure_positive(amount)?;
        let currency: Currency = currency.parse()?;

        match self.ledger.withdraw(user_id, currency, amount).await {
            Ok(snapshot) => {
                info!(%currency, %amount, "Withdrawal applied");
                Ok(snapshot)
            }
            Err(e) => {
                debug!(%currency, %amount, error = %e, "Withdrawal rejected");
                Err(e.into())
            }
        }
    }
}
