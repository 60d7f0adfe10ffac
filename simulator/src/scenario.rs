//! Simulation scenarios.

use fxwallet_common::Currency;
use rand::Rng;
use rust_decimal::Decimal;

/// Amount every contention withdrawal asks for.
pub const CONTENTION_AMOUNT: Decimal = Decimal::from_parts(1000, 0, 0, false, 2);

/// One operation issued against a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Deposit { currency: Currency, amount: Decimal },
    Withdraw { currency: Currency, amount: Decimal },
    Exchange { from: Currency, to: Currency, amount: Decimal },
}

/// A simulation scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Random deposits, withdrawals and exchanges over every wallet.
    Random,
    /// Every task withdraws from the first wallet until it runs dry.
    Contention,
}

impl Scenario {
    /// Load a scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "random" => Ok(Self::Random),
            "contention" => Ok(Self::Contention),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Random => "random",
            Scenario::Contention => "contention",
        }
    }

    /// Description.
    pub fn description(&self) -> &'static str {
        match self {
            Scenario::Random => "Mixed deposits, withdrawals and exchanges across all wallets",
            Scenario::Contention => "Concurrent withdrawals racing on a single wallet",
        }
    }

    /// Pick the next wallet index and operation.
    pub fn next_operation<R: Rng>(&self, rng: &mut R, wallets: usize) -> (usize, Operation) {
        match self {
            Scenario::Contention => (
                0,
                Operation::Withdraw {
                    currency: Currency::Usd,
                    amount: CONTENTION_AMOUNT,
                },
            ),
            Scenario::Random => {
                let wallet = rng.gen_range(0..wallets);
                // Cents, so amounts already sit on the wallet scale.
                let amount = Decimal::new(rng.gen_range(1..100_000), 2);
                let currency = random_currency(rng);

                let op = match rng.gen_range(0..3) {
                    0 => Operation::Deposit { currency, amount },
                    1 => Operation::Withdraw { currency, amount },
                    _ => {
                        let mut to = random_currency(rng);
                        while to == currency {
                            to = random_currency(rng);
                        }
                        Operation::Exchange {
                            from: currency,
                            to,
                            amount,
                        }
                    }
                };
                (wallet, op)
            }
        }
    }
}

fn random_currency<R: Rng>(rng: &mut R) -> Currency {
    Currency::ALL[rng.gen_range(0..Currency::ALL.len())]
}
