//! In-process ledger store.
//!
//! Holds the same atomicity contract as the Postgres store: each mutation runs
//! under the exclusive lock of its wallet's map shard, so the sufficiency
//! check and the write are never observed apart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use fxwallet_common::{UserId, WalletSnapshot};
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::error::{LedgerError, LedgerResult};
use crate::mutation::Mutation;
use crate::store::{LedgerStore, UserStore};
use crate::user::{NewUser, UserRecord};

/// Ledger store kept entirely in memory.
#[derive(Default)]
pub struct MemoryLedgerStore {
    wallets: DashMap<UserId, WalletSnapshot>,
    /// Users by username. Registration holds this lock for its whole
    /// duration so username and email uniqueness are checked atomically.
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryLedgerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a wallet with the given balances, replacing any existing one.
    pub fn open_wallet(&self, user_id: UserId, snapshot: WalletSnapshot) {
        self.wallets.insert(user_id, snapshot);
    }

    /// Number of wallets held.
    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    /// Snapshots of every wallet.
    pub fn wallets(&self) -> Vec<(UserId, WalletSnapshot)> {
        self.wallets
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    fn apply_locked(&self, user_id: UserId, mutation: &Mutation) -> LedgerResult<WalletSnapshot> {
        let mut wallet = self
            .wallets
            .get_mut(&user_id)
            .ok_or(LedgerError::WalletNotFound(user_id))?;

        let next = mutation.apply(&wallet)?;
        *wallet = next;
        Ok(next)
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get_balance(&self, user_id: UserId) -> LedgerResult<WalletSnapshot> {
        self.wallets
            .get(&user_id)
            .map(|wallet| *wallet)
            .ok_or(LedgerError::WalletNotFound(user_id))
    }

    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    async fn apply(&self, user_id: UserId, mutation: Mutation) -> LedgerResult<WalletSnapshot> {
        let result = self.apply_locked(user_id, &mutation);
        if let Err(e) = &result {
            debug!(error = %e, "Mutation rejected");
        }
        result
    }
}

#[async_trait]
impl UserStore for MemoryLedgerStore {
    async fn create_user(&self, new_user: NewUser) -> LedgerResult<UserId> {
        let mut users = self.users.lock();

        if users.contains_key(&new_user.username) {
            return Err(LedgerError::UserAlreadyExists(new_user.username));
        }
        if users.values().any(|u| u.email == new_user.email) {
            return Err(LedgerError::EmailAlreadyUsed(new_user.email));
        }

        let id = UserId::new();
        self.wallets.insert(id, WalletSnapshot::default());
        users.insert(
            new_user.username.clone(),
            UserRecord {
                id,
                username: new_user.username,
                email: new_user.email,
                password_hash: new_user.password_hash,
                created_at: Utc::now(),
            },
        );

        info!(user_id = %id, "User registered with empty wallet");
        Ok(id)
    }

    async fn find_user_by_username(&self, username: &str) -> LedgerResult<UserRecord> {
        self.users
            .lock()
            .get(username)
            .cloned()
            .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))
    }
}
