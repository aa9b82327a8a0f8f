//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core services
//! depend only on these traits, not on concrete stores.

mod store;

pub use store::{LedgerStore, LedgerTx};
