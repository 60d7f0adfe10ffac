//! Request handlers.
//!
//! Each handler takes the caller's user id as the opaque string handed over
//! by the identity layer, runs one service call under the request deadline
//! and answers with a status and a JSON body. Dropping a handler future
//! abandons any in-flight store or provider call; a ledger update either
//! committed in full or not at all.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fxwallet_common::UserId;
use fxwallet_ledger::NewUser;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::envelope::{
    BalanceBody, ErrorBody, ExchangeBody, ExchangeRequest, RatesBody, TransactionBody,
    WalletTransaction,
};
use crate::error::{ServiceError, ServiceResult};
use crate::services::Services;

/// Status code and JSON body of a handled request.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    fn ok<T: Serialize>(body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status: 200, body },
            Err(e) => {
                warn!(error = %e, "Response serialization failed");
                Self {
                    status: 500,
                    body: json!({"error": {"code": 500, "message": "Internal server error"}}),
                }
            }
        }
    }

    fn error(err: &ServiceError) -> Self {
        let body = ErrorBody::from_error(err);
        Self {
            status: body.error.code,
            body: serde_json::to_value(&body).unwrap_or(Value::Null),
        }
    }

    fn from_result<T: Serialize>(result: ServiceResult<T>) -> Self {
        match result {
            Ok(body) => Self::ok(&body),
            Err(err) => Self::error(&err),
        }
    }

    /// Whether the request succeeded.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Boundary over the service capability set.
#[derive(Clone)]
pub struct Api {
    services: Arc<Services>,
    request_timeout: Duration,
}

impl Api {
    /// Create handlers with the given per-request deadline.
    pub fn new(services: Arc<Services>, request_timeout: Duration) -> Self {
        Self {
            services,
            request_timeout,
        }
    }

    /// The services behind the handlers.
    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    async fn run<T, F>(&self, fut: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| ServiceError::DeadlineExceeded)?
    }

    fn user_id(raw: &str) -> ServiceResult<UserId> {
        UserId::parse(raw).map_err(|_| ServiceError::InvalidUserId)
    }

    /// Register a user whose password is already hashed.
    #[instrument(skip(self, new_user))]
    pub async fn register(&self, new_user: NewUser) -> Reply {
        let result = self
            .run(self.services.register_user(new_user))
            .await
            .map(|_| json!({"message": "User registered successfully"}));
        Reply::from_result(result)
    }

    /// `{"balance": {...}}`
    #[instrument(skip(self))]
    pub async fn balance(&self, user_id: &str) -> Reply {
        let result = async {
            let user_id = Self::user_id(user_id)?;
            let balance = self.run(self.services.wallet.get_balance(user_id)).await?;
            Ok(BalanceBody { balance })
        }
        .await;
        Reply::from_result(result)
    }

    /// Top up one balance.
    #[instrument(skip(self, request))]
    pub async fn deposit(&self, user_id: &str, request: &WalletTransaction) -> Reply {
        let result = async {
            let user_id = Self::user_id(user_id)?;
            let tx = request.validate()?;
            let snapshot = self
                .run(self.services.wallet.deposit(user_id, &tx.currency, tx.amount))
                .await?;
            Ok(TransactionBody::deposited(snapshot))
        }
        .await;
        Reply::from_result(result)
    }

    /// Withdraw from one balance.
    #[instrument(skip(self, request))]
    pub async fn withdraw(&self, user_id: &str, request: &WalletTransaction) -> Reply {
        let result = async {
            let user_id = Self::user_id(user_id)?;
            let tx = request.validate()?;
            let snapshot = self
                .run(self.services.wallet.withdraw(user_id, &tx.currency, tx.amount))
                .await?;
            Ok(TransactionBody::withdrawn(snapshot))
        }
        .await;
        Reply::from_result(result)
    }

    /// `{"rates": {...}}`
    #[instrument(skip(self))]
    pub async fn rates(&self) -> Reply {
        let result = self
            .run(self.services.exchange.get_rates())
            .await
            .map(|rates| RatesBody { rates });
        Reply::from_result(result)
    }

    /// Exchange between two balances at the quoted rate.
    #[instrument(skip(self, request))]
    pub async fn exchange(&self, user_id: &str, request: &ExchangeRequest) -> Reply {
        let result = async {
            let user_id = Self::user_id(user_id)?;
            let req = request.validate()?;
            let outcome = self
                .run(self.services.exchange.exchange(
                    user_id,
                    &req.from_currency,
                    &req.to_currency,
                    req.amount,
                ))
                .await?;
            Ok(ExchangeBody::from(outcome))
        }
        .await;
        Reply::from_result(result)
    }
}
