//! Adapter implementations
//!
//! Adapters implement the store port with concrete technologies:
//! - DuckDB for persistent ledgers
//! - In-process tables with row locks for tests and embedding

pub mod duckdb;
pub mod memory;

pub use self::duckdb::DuckDbStore;
pub use self::memory::InMemoryStore;
