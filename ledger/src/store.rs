//! Ledger store traits.

use async_trait::async_trait;
use fxwallet_common::{Currency, UserId, WalletSnapshot};
use rust_decimal::Decimal;

use crate::error::LedgerResult;
use crate::mutation::Mutation;
use crate::user::{NewUser, UserRecord};

/// Durable wallet state with atomic conditional balance updates.
///
/// Implementations must apply each [`Mutation`] as one atomic unit per wallet
/// row: concurrent mutations against the same wallet are each evaluated
/// against the balance committed at the instant of their own update.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Read the current balances of a wallet.
    async fn get_balance(&self, user_id: UserId) -> LedgerResult<WalletSnapshot>;

    /// Apply a mutation and return the post-update snapshot.
    async fn apply(&self, user_id: UserId, mutation: Mutation) -> LedgerResult<WalletSnapshot>;

    /// Credit `amount` to one balance.
    async fn deposit(
        &self,
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
    ) -> LedgerResult<WalletSnapshot> {
        self.apply(user_id, Mutation::Deposit { currency, amount })
            .await
    }

    /// Debit `amount` from one balance if it stays non-negative.
    async fn withdraw(
        &self,
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
    ) -> LedgerResult<WalletSnapshot> {
        self.apply(user_id, Mutation::Withdraw { currency, amount })
            .await
    }

    /// Debit one balance and credit another, both or neither.
    async fn exchange(
        &self,
        user_id: UserId,
        from: Currency,
        to: Currency,
        debit: Decimal,
        credit: Decimal,
    ) -> LedgerResult<WalletSnapshot> {
        self.apply(
            user_id,
            Mutation::Exchange {
                from,
                to,
                debit,
                credit,
            },
        )
        .await
    }
}

/// Users and their implicit wallets.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user together with a zero-balance wallet.
    async fn create_user(&self, new_user: NewUser) -> LedgerResult<UserId>;

    /// Look a user up by username.
    async fn find_user_by_username(&self, username: &str) -> LedgerResult<UserRecord>;
}
