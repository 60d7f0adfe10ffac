//! FxWallet Common Types
//!
//! This crate contains shared types used across the wallet backend,
//! including user identifiers, the supported currency set, balance
//! snapshots and the money rounding policy.

pub mod identifiers;
pub mod monetary;
pub mod error;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
