//! Simulation controller.

use std::sync::Arc;
use std::time::Instant;

use fxwallet::{ErrorKind, ServiceResult, Services};
use fxwallet_common::{Currency, UserId};
use fxwallet_ledger::NewUser;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::metrics::{Outcome, SimulationMetrics};
use crate::scenario::{Operation, Scenario, CONTENTION_AMOUNT};

/// Drives a scenario against the services.
pub struct SimulationController {
    services: Arc<Services>,
    scenario: Scenario,
    seed: u64,
    users: Vec<UserId>,
    initial_balance: Decimal,
    metrics: Arc<Mutex<SimulationMetrics>>,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(services: Arc<Services>, scenario: Scenario, seed: Option<u64>) -> Self {
        Self {
            services,
            scenario,
            seed: seed.unwrap_or_else(rand::random),
            users: Vec::new(),
            initial_balance: Decimal::ZERO,
            metrics: Arc::new(Mutex::new(SimulationMetrics::new())),
        }
    }

    /// Register `user_count` users and fund every balance with
    /// `initial_balance`.
    pub async fn initialize(&mut self, user_count: usize, initial_balance: Decimal) -> anyhow::Result<()> {
        info!(users = user_count, %initial_balance, seed = self.seed, "Initializing simulation");

        // Usernames stay unique across runs against a persistent database.
        let run = UserId::new().to_string();
        let run = &run[..8];

        for i in 0..user_count {
            let username = format!("sim-{run}-{i:05}");
            let id = self
                .services
                .register_user(NewUser::new(
                    username.clone(),
                    format!("{username}@simulator.local"),
                    "unused",
                ))
                .await?;

            // Deposits must be positive; a zero start leaves the wallet empty.
            if !initial_balance.is_zero() {
                for currency in Currency::ALL {
                    self.services
                        .wallet
                        .deposit(id, currency.code(), initial_balance)
                        .await?;
                }
            }
            self.users.push(id);
        }

        self.initial_balance = initial_balance;
        Ok(())
    }

    /// Run `operations` operations spread over `concurrency` tasks.
    pub async fn run(&self, operations: usize, concurrency: usize) -> anyhow::Result<()> {
        if self.users.is_empty() {
            return Err(anyhow::anyhow!("Simulation has no wallets"));
        }

        info!(
            scenario = self.scenario.name(),
            description = self.scenario.description(),
            operations,
            concurrency,
            "Running scenario"
        );

        let concurrency = concurrency.max(1);
        let handles: Vec<_> = (0..concurrency)
            .map(|task| {
                // Spread the remainder over the first tasks.
                let count = operations / concurrency + usize::from(task < operations % concurrency);
                let services = self.services.clone();
                let users = self.users.clone();
                let metrics = self.metrics.clone();
                let scenario = self.scenario;
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(task as u64));

                tokio::spawn(async move {
                    let mut local = SimulationMetrics::new();
                    for _ in 0..count {
                        let (wallet, op) = scenario.next_operation(&mut rng, users.len());
                        let started = Instant::now();
                        let outcome = match execute(&services, users[wallet], op).await {
                            Ok(()) => Outcome::Success,
                            Err(e) => match e.kind() {
                                ErrorKind::Validation | ErrorKind::Business => {
                                    debug!(?op, error = %e, "Operation rejected");
                                    Outcome::Rejected
                                }
                                ErrorKind::Dependency | ErrorKind::Internal => {
                                    warn!(?op, error = %e, "Operation failed");
                                    Outcome::Failed
                                }
                            },
                        };
                        local.record(outcome, started.elapsed());
                    }
                    metrics.lock().merge(&local);
                })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            result?;
        }

        Ok(())
    }

    /// Check the ledger invariants after a run.
    pub async fn verify(&self) -> anyhow::Result<()> {
        for user in &self.users {
            let snapshot = self.services.wallet.get_balance(*user).await?;
            if !snapshot.is_non_negative() {
                return Err(anyhow::anyhow!(
                    "Wallet {} went negative: {:?}",
                    user,
                    snapshot
                ));
            }
        }

        if self.scenario == Scenario::Contention {
            let successes = Decimal::from(self.metrics.lock().successful_operations);
            let snapshot = self.services.wallet.get_balance(self.users[0]).await?;
            let expected = self.initial_balance - successes * CONTENTION_AMOUNT;

            if snapshot.balance_usd != expected {
                return Err(anyhow::anyhow!(
                    "Contended wallet holds {} USD, expected {}",
                    snapshot.balance_usd,
                    expected
                ));
            }
        }

        info!(wallets = self.users.len(), "Ledger invariants hold");
        Ok(())
    }

    /// Get simulation metrics.
    pub fn get_metrics(&self) -> SimulationMetrics {
        self.metrics.lock().clone()
    }
}

async fn execute(services: &Services, user: UserId, op: Operation) -> ServiceResult<()> {
    match op {
        Operation::Deposit { currency, amount } => {
            services.wallet.deposit(user, currency.code(), amount).await?;
        }
        Operation::Withdraw { currency, amount } => {
            services.wallet.withdraw(user, currency.code(), amount).await?;
        }
        Operation::Exchange { from, to, amount } => {
            services
                .exchange
                .exchange(user, from.code(), to.code(), amount)
                .await?;
        }
    }
    Ok(())
}
