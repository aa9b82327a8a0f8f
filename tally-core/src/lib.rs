//! Tally Core - double-entry ledger with atomic transfers
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core ledger entities (Account, Entry, Transfer)
//! - **ports**: Trait definitions for the transactional store
//! - **services**: Business logic orchestration (transfers, status, demo data)
//! - **adapters**: Store implementations (DuckDB, in-memory)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod logging;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use adapters::duckdb::DuckDbStore;
use config::Config;
use services::{DemoService, StatusService, TransferService};

// Re-export commonly used types at crate root
pub use domain::result::{Error, ErrorKind, OperationResult, Result};
pub use domain::{
    Account, Entry, NewAccount, Transfer, TransferFilter, TransferParams, TransferRequest,
    TransferResult,
};

/// Main context for Tally operations
///
/// Holds the configuration, the store and every service wired to it.
pub struct TallyContext {
    pub config: Config,
    pub store: Arc<DuckDbStore>,
    pub transfer_service: TransferService<DuckDbStore>,
    pub status_service: StatusService<DuckDbStore>,
    pub demo_service: DemoService<DuckDbStore>,
}

impl TallyContext {
    /// Open (or create) the ledger in `tally_dir`
    pub fn new(tally_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(tally_dir)?;
        let config = Config::load(tally_dir)?;

        let db_path = tally_dir.join(&config.database_file);
        let store = Arc::new(DuckDbStore::new(&db_path)?);
        store.ensure_schema()?;

        let transfer_service = TransferService::new(Arc::clone(&store))
            .with_overdraft_policy(config.overdraft_policy);
        let status_service = StatusService::new(Arc::clone(&store));
        let demo_service = DemoService::new(Arc::clone(&store));

        Ok(Self {
            config,
            store,
            transfer_service,
            status_service,
            demo_service,
        })
    }
}
