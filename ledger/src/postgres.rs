//! Postgres-backed ledger store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxwallet_common::{UserId, WalletSnapshot};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::mutation::Mutation;
use crate::store::{LedgerStore, UserStore};
use crate::user::{NewUser, UserRecord};

const UNIQUE_VIOLATION: &str = "23505";
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
const USERNAME_CONSTRAINT: &str = "users_username_key";
const EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Debug, FromRow)]
struct WalletRow {
    balance_rub: Decimal,
    balance_usd: Decimal,
    balance_eur: Decimal,
}

impl From<WalletRow> for WalletSnapshot {
    fn from(row: WalletRow) -> Self {
        WalletSnapshot::new(row.balance_rub, row.balance_usd, row.balance_eur)
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            id: UserId::from_uuid(row.id),
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

/// Ledger store over a shared Postgres connection pool.
///
/// Connections are checked out per statement and returned afterwards.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> LedgerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        info!(max_connections, "Connected to wallet database");
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> LedgerResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Wallet schema up to date");
        Ok(())
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn wallet_exists(&self, user_id: UserId) -> LedgerResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM wallets WHERE user_id = $1)")
                .bind(*user_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

/// Map a unique-constraint violation on `users` to its business error.
fn map_registration_error(err: sqlx::Error, new_user: &NewUser) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            match db_err.constraint() {
                Some(USERNAME_CONSTRAINT) => {
                    return LedgerError::UserAlreadyExists(new_user.username.clone())
                }
                Some(EMAIL_CONSTRAINT) => {
                    return LedgerError::EmailAlreadyUsed(new_user.email.clone())
                }
                _ => {}
            }
        }
    }
    LedgerError::Database(err)
}

/// Map a numeric overflow of a balance column to its business error.
fn map_update_error(err: sqlx::Error, mutation: &Mutation) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) {
            let currency = match *mutation {
                Mutation::Deposit { currency, .. } | Mutation::Withdraw { currency, .. } => currency,
                Mutation::Exchange { to, .. } => to,
            };
            return LedgerError::AmountOutOfRange { currency };
        }
    }
    LedgerError::Database(err)
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    #[instrument(skip(self))]
    async fn get_balance(&self, user_id: UserId) -> LedgerResult<WalletSnapshot> {
        let row: Option<WalletRow> = sqlx::query_as(
            "SELECT balance_rub, balance_usd, balance_eur FROM wallets WHERE user_id = $1",
        )
        .bind(*user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(WalletSnapshot::from)
            .ok_or(LedgerError::WalletNotFound(user_id))
    }

    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    async fn apply(&self, user_id: UserId, mutation: Mutation) -> LedgerResult<WalletSnapshot> {
        mutation.validate()?;
        mutation.check_range()?;

        let sql = mutation.statement();
        let mut query = sqlx::query_as::<_, WalletRow>(&sql);
        for amount in mutation.amounts() {
            query = query.bind(amount);
        }
        let row = query
            .bind(*user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_update_error(e, &mutation))?;

        if let Some(row) = row {
            debug!("Wallet updated");
            return Ok(row.into());
        }

        // No row came back: either the wallet is missing or the guard failed.
        // Wallets are never deleted, so an existing row means the guard failed.
        let Some((currency, requested)) = mutation.debit_leg() else {
            return Err(LedgerError::WalletNotFound(user_id));
        };
        if self.wallet_exists(user_id).await? {
            debug!(%currency, %requested, "Conditional update rejected");
            Err(LedgerError::InsufficientFunds {
                currency,
                requested,
            })
        } else {
            Err(LedgerError::WalletNotFound(user_id))
        }
    }
}

#[async_trait]
impl UserStore for PgLedgerStore {
    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    async fn create_user(&self, new_user: NewUser) -> LedgerResult<UserId> {
        let mut tx = self.pool.begin().await?;

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_registration_error(e, &new_user))?;

        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1)")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(user_id = %id, "User registered with empty wallet");
        Ok(UserId::from_uuid(id))
    }

    #[instrument(skip(self))]
    async fn find_user_by_username(&self, username: &str) -> LedgerResult<UserRecord> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRecord::from)
            .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxwallet_common::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_non_database_update_error_stays_internal() {
        let mutation = Mutation::Deposit {
            currency: Currency::Usd,
            amount: dec!(10),
        };

        let err = map_update_error(sqlx::Error::PoolTimedOut, &mutation);
        assert!(matches!(err, LedgerError::Database(_)));
        assert!(!err.is_business());
    }
}
