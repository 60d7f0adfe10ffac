//! The capability set handed to request handlers.

use std::sync::Arc;

use fxwallet_common::UserId;
use fxwallet_fx::{CachedRates, GrpcRateProvider, RateCache, RateProvider, SharedRateCache};
use fxwallet_ledger::{
    LedgerStore, MemoryLedgerStore, NewUser, PgLedgerStore, UserRecord, UserStore,
};
use tracing::{info, instrument};

use crate::config::WalletConfig;
use crate::error::ServiceResult;
use crate::exchange_service::ExchangeService;
use crate::wallet_service::WalletService;

/// Wallet, exchange and user capabilities sharing one store and one rate
/// cache.
#[derive(Clone)]
pub struct Services {
    pub wallet: WalletService,
    pub exchange: ExchangeService,
    users: Arc<dyn UserStore>,
}

impl Services {
    /// Assemble the services from their dependencies.
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        users: Arc<dyn UserStore>,
        provider: Arc<dyn RateProvider>,
        cache: SharedRateCache,
    ) -> Self {
        let rates = CachedRates::new(provider, cache);
        Self {
            wallet: WalletService::new(ledger.clone()),
            exchange: ExchangeService::new(rates, ledger),
            users,
        }
    }

    /// Services over an in-process store. The store handle is returned for
    /// seeding and inspection.
    pub fn in_memory(
        provider: Arc<dyn RateProvider>,
        cache: SharedRateCache,
    ) -> (Self, Arc<MemoryLedgerStore>) {
        let store = Arc::new(MemoryLedgerStore::new());
        let services = Self::new(store.clone(), store.clone(), provider, cache);
        (services, store)
    }

    /// Connect to the database and the rate service described by `config`.
    pub async fn connect(config: &WalletConfig) -> ServiceResult<Self> {
        let provider = Arc::new(GrpcRateProvider::connect_lazy(
            &config.rates.provider_addr,
            config.rates.request_timeout,
        )?);
        info!(provider_addr = %config.rates.provider_addr, "Rate service configured");

        Self::connect_with(config, provider).await
    }

    /// Connect to the database described by `config`, quoting through
    /// `provider`.
    pub async fn connect_with(
        config: &WalletConfig,
        provider: Arc<dyn RateProvider>,
    ) -> ServiceResult<Self> {
        let store = Arc::new(
            PgLedgerStore::connect(
                &config.database.url,
                config.database.max_connections,
                config.database.acquire_timeout,
            )
            .await?,
        );
        store.migrate().await?;

        let cache = Arc::new(RateCache::with_config(config.rates.cache_config()));

        info!(
            cache_ttl_secs = config.rates.cache_ttl.as_secs(),
            "Services connected"
        );

        Ok(Self::new(store.clone(), store, provider, cache))
    }

    /// Register a user with an empty wallet.
    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    pub async fn register_user(&self, new_user: NewUser) -> ServiceResult<UserId> {
        Ok(self.users.create_user(new_user).await?)
    }

    /// Look up a registered user.
    pub async fn find_user(&self, username: &str) -> ServiceResult<UserRecord> {
        Ok(self.users.find_user_by_username(username).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use fxwallet_common::{Currency, CurrencyPair, WalletSnapshot};
    use fxwallet_fx::MockRateProvider;
    use fxwallet_ledger::LedgerError;
    use rust_decimal_macros::dec;

    fn services() -> (Services, Arc<MockRateProvider>) {
        let provider = Arc::new(MockRateProvider::new());
        provider.set_rate(CurrencyPair::new(Currency::Usd, Currency::Rub), "92.5");
        let (services, _) = Services::in_memory(provider.clone(), Arc::new(RateCache::new()));
        (services, provider)
    }

    #[tokio::test]
    async fn test_registered_user_has_empty_wallet() {
        let (services, _) = services();

        let id = services
            .register_user(NewUser::new("alice", "alice@example.com", "hash"))
            .await
            .unwrap();

        assert_eq!(
            services.wallet.get_balance(id).await.unwrap(),
            WalletSnapshot::default()
        );
        assert_eq!(services.find_user("alice").await.unwrap().id, id);
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let (services, _) = services();
        services
            .register_user(NewUser::new("alice", "alice@example.com", "hash"))
            .await
            .unwrap();

        let result = services
            .register_user(NewUser::new("alice", "other@example.com", "hash"))
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Ledger(LedgerError::UserAlreadyExists(_)))
        ));

        let result = services
            .register_user(NewUser::new("bob", "alice@example.com", "hash"))
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Ledger(LedgerError::EmailAlreadyUsed(_)))
        ));
    }

    #[tokio::test]
    async fn test_services_share_one_ledger() {
        let (services, provider) = services();
        let id = services
            .register_user(NewUser::new("carol", "carol@example.com", "hash"))
            .await
            .unwrap();

        services.wallet.deposit(id, "USD", dec!(10)).await.unwrap();
        let outcome = services.exchange.exchange(id, "USD", "RUB", dec!(4)).await.unwrap();

        assert_eq!(outcome.exchanged_amount, dec!(370.00));
        assert_eq!(
            services.wallet.get_balance(id).await.unwrap(),
            WalletSnapshot::new(dec!(370.00), dec!(6), dec!(0))
        );
        assert_eq!(provider.rate_calls(), 1);
    }
}
