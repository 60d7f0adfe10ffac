//! FxWallet Services
//!
//! Business rules in front of the ledger store: deposits and withdrawals,
//! currency exchange against quoted rates, and the boundary that turns
//! results into JSON envelopes.

pub mod api;
pub mod config;
pub mod envelope;
pub mod error;
pub mod exchange_service;
pub mod services;
pub mod telemetry;
pub mod wallet_service;

pub use api::{Api, Reply};
pub use config::WalletConfig;
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use exchange_service::{ExchangeOutcome, ExchangeService};
pub use services::Services;
pub use wallet_service::WalletService;
