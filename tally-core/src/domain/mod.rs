//! Core domain entities
//!
//! All ledger entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
pub mod currency;
mod entry;
pub mod money;
pub mod result;
mod transfer;

pub use account::{Account, NewAccount};
pub use entry::Entry;
pub use transfer::{Transfer, TransferFilter, TransferParams, TransferRequest, TransferResult};
