//! FxWallet Ledger Store
//!
//! Sole owner of durable wallet balances. Every balance change is a single
//! atomic conditional update: the sufficiency check and the write commit
//! together or not at all.

pub mod error;
pub mod mutation;
pub mod store;
pub mod user;
pub mod postgres;
pub mod memory;

pub use error::{LedgerError, LedgerResult};
pub use mutation::Mutation;
pub use store::{LedgerStore, UserStore};
pub use user::{NewUser, UserRecord};
pub use postgres::PgLedgerStore;
pub use memory::MemoryLedgerStore;
