//! Ledger store port - transactional storage abstraction

use crate::domain::result::Result;
use crate::domain::{Account, Entry, NewAccount, Transfer, TransferFilter};

/// Operations available inside one store transaction.
///
/// Every effect is staged in the enclosing transaction and becomes visible to
/// others only when [`LedgerStore::run_atomically`] commits.
pub trait LedgerTx {
    /// Insert a transfer record
    fn create_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
    ) -> Result<Transfer>;

    /// Insert an entry holding a signed delta for one account
    fn create_entry(&mut self, account_id: i64, amount: i64) -> Result<Entry>;

    /// Read an account, taking an exclusive lock on its row.
    ///
    /// The lock is held until the transaction commits or rolls back. Blocks
    /// while another transaction holds the same row. Returns
    /// [`Error::NotFound`](crate::Error::NotFound) when the row is absent.
    fn get_account_for_update(&mut self, account_id: i64) -> Result<Account>;

    /// Add `delta` to the account balance and return the updated row.
    ///
    /// Takes the row lock if the transaction does not hold it yet.
    fn add_account_balance(&mut self, account_id: i64, delta: i64) -> Result<Account>;
}

/// Transactional ledger storage.
///
/// `run_atomically` is the transaction coordinator; the remaining methods are
/// the single-statement accessors used by boundary layers and reports.
pub trait LedgerStore: Send + Sync {
    /// Run `work` inside one transaction.
    ///
    /// Commits when `work` returns `Ok`. Any `Err` (or a panic) rolls back
    /// every staged write and releases every lock taken by the transaction.
    fn run_atomically<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T>;

    // === Accounts ===

    fn create_account(&self, account: &NewAccount) -> Result<Account>;

    fn get_account(&self, id: i64) -> Result<Option<Account>>;

    /// Accounts ordered by id
    fn list_accounts(&self, limit: usize, offset: usize) -> Result<Vec<Account>>;

    // === Transfers ===

    fn get_transfer(&self, id: i64) -> Result<Option<Transfer>>;

    /// Transfers matching the filter, ordered by id
    fn list_transfers(&self, filter: &TransferFilter) -> Result<Vec<Transfer>>;

    fn count_transfers(&self) -> Result<i64>;

    // === Entries ===

    /// Entries of one account, ordered by id
    fn list_entries(&self, account_id: i64, limit: usize, offset: usize) -> Result<Vec<Entry>>;

    fn count_entries(&self) -> Result<i64>;
}
