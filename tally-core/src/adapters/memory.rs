//! In-memory ledger store with per-row exclusive locks
//!
//! Committed rows live behind one `Mutex`; row locks live in a separate lock
//! table so that transactions touching disjoint accounts never wait for each
//! other. A transaction stages its writes locally and publishes them in one
//! step on commit. Dropping an uncommitted transaction discards the staged
//! writes and releases its locks, which covers both `Err` returns and panics.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, trace};

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Entry, NewAccount, Transfer, TransferFilter};
use crate::ports::{LedgerStore, LedgerTx};

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
}

/// Exclusive row locks keyed by account id
#[derive(Debug, Default)]
struct RowLocks {
    held: Mutex<HashSet<i64>>,
    released: Condvar,
}

impl RowLocks {
    fn acquire(&self, account_id: i64) -> Result<()> {
        let mut held = self
            .held
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))?;
        while held.contains(&account_id) {
            trace!(account_id, "waiting for row lock");
            held = self
                .released
                .wait(held)
                .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))?;
        }
        held.insert(account_id);
        Ok(())
    }

    fn release_all(&self, account_ids: &[i64]) {
        if account_ids.is_empty() {
            return;
        }
        // Release even when poisoned: a waiter must never outlive the holder.
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        for id in account_ids {
            held.remove(id);
        }
        drop(held);
        self.released.notify_all();
    }
}

/// Ledger store keeping everything in process memory
#[derive(Debug)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    locks: RowLocks,
    next_account_id: AtomicI64,
    next_entry_id: AtomicI64,
    next_transfer_id: AtomicI64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            locks: RowLocks::default(),
            next_account_id: AtomicI64::new(1),
            next_entry_id: AtomicI64::new(1),
            next_transfer_id: AtomicI64::new(1),
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }
}

/// One open transaction against an [`InMemoryStore`]
struct MemoryTx<'a> {
    store: &'a InMemoryStore,
    locked: Vec<i64>,
    accounts: HashMap<i64, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl<'a> MemoryTx<'a> {
    fn new(store: &'a InMemoryStore) -> Self {
        Self {
            store,
            locked: Vec::new(),
            accounts: HashMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
        }
    }

    fn lock_row(&mut self, account_id: i64) -> Result<()> {
        if !self.locked.contains(&account_id) {
            self.store.locks.acquire(account_id)?;
            self.locked.push(account_id);
        }
        Ok(())
    }

    /// Current view of a locked row: staged version first, then committed
    fn read_locked(&self, account_id: i64) -> Result<Account> {
        if let Some(account) = self.accounts.get(&account_id) {
            return Ok(account.clone());
        }
        self.store
            .tables()?
            .accounts
            .get(&account_id)
            .cloned()
            .ok_or_else(|| Error::account_not_found(account_id))
    }

    /// Publish staged rows. Locks are released by `Drop` once the tables
    /// guard is gone.
    fn commit(mut self) -> Result<()> {
        let mut tables = self.store.tables()?;
        for transfer in self.transfers.drain(..) {
            tables.transfers.insert(transfer.id, transfer);
        }
        for entry in self.entries.drain(..) {
            tables.entries.insert(entry.id, entry);
        }
        for (id, account) in self.accounts.drain() {
            tables.accounts.insert(id, account);
        }
        Ok(())
    }
}

impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        self.store.locks.release_all(&self.locked);
    }
}

impl LedgerTx for MemoryTx<'_> {
    fn create_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
    ) -> Result<Transfer> {
        let transfer = Transfer {
            id: self.store.next_transfer_id.fetch_add(1, Ordering::SeqCst),
            from_account_id,
            to_account_id,
            amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    fn create_entry(&mut self, account_id: i64, amount: i64) -> Result<Entry> {
        let entry = Entry {
            id: self.store.next_entry_id.fetch_add(1, Ordering::SeqCst),
            account_id,
            amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    fn get_account_for_update(&mut self, account_id: i64) -> Result<Account> {
        self.lock_row(account_id)?;
        self.read_locked(account_id)
    }

    fn add_account_balance(&mut self, account_id: i64, delta: i64) -> Result<Account> {
        self.lock_row(account_id)?;
        let mut account = self.read_locked(account_id)?;
        account.balance = account
            .balance
            .checked_add(delta)
            .ok_or_else(|| Error::database(format!("balance overflow on account {}", account_id)))?;
        self.accounts.insert(account_id, account.clone());
        Ok(account)
    }
}

impl LedgerStore for InMemoryStore {
    fn run_atomically<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T>,
    {
        let mut tx = MemoryTx::new(self);
        match work(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                debug!(locks = tx.locked.len(), "rolling back in-memory transaction");
                Err(e)
            }
        }
    }

    fn create_account(&self, account: &NewAccount) -> Result<Account> {
        account.validate().map_err(Error::validation)?;
        let created = Account {
            id: self.next_account_id.fetch_add(1, Ordering::SeqCst),
            owner: account.owner.clone(),
            balance: account.balance,
            currency: account.currency.clone(),
            created_at: Utc::now(),
        };
        self.tables()?.accounts.insert(created.id, created.clone());
        Ok(created)
    }

    fn get_account(&self, id: i64) -> Result<Option<Account>> {
        Ok(self.tables()?.accounts.get(&id).cloned())
    }

    fn list_accounts(&self, limit: usize, offset: usize) -> Result<Vec<Account>> {
        Ok(self
            .tables()?
            .accounts
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn get_transfer(&self, id: i64) -> Result<Option<Transfer>> {
        Ok(self.tables()?.transfers.get(&id).cloned())
    }

    fn list_transfers(&self, filter: &TransferFilter) -> Result<Vec<Transfer>> {
        Ok(self
            .tables()?
            .transfers
            .values()
            .filter(|t| filter.matches(t))
            .skip(filter.offset)
            .take(filter.limit)
            .cloned()
            .collect())
    }

    fn count_transfers(&self) -> Result<i64> {
        Ok(self.tables()?.transfers.len() as i64)
    }

    fn list_entries(&self, account_id: i64, limit: usize, offset: usize) -> Result<Vec<Entry>> {
        Ok(self
            .tables()?
            .entries
            .values()
            .filter(|e| e.account_id == account_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn count_entries(&self) -> Result<i64> {
        Ok(self.tables()?.entries.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn store_with_account(balance: i64) -> (InMemoryStore, Account) {
        let store = InMemoryStore::new();
        let account = store
            .create_account(&NewAccount::new("alice", balance, "USD"))
            .unwrap();
        (store, account)
    }

    #[test]
    fn test_commit_publishes_staged_writes() {
        let (store, account) = store_with_account(100);

        let updated = store
            .run_atomically(|tx| {
                tx.create_entry(account.id, 25)?;
                tx.add_account_balance(account.id, 25)
            })
            .unwrap();

        assert_eq!(updated.balance, 125);
        assert_eq!(store.get_account(account.id).unwrap().unwrap().balance, 125);
        assert_eq!(store.count_entries().unwrap(), 1);
    }

    #[test]
    fn test_error_discards_staged_writes() {
        let (store, account) = store_with_account(100);

        let result: Result<()> = store.run_atomically(|tx| {
            tx.create_transfer(account.id, account.id, 10)?;
            tx.create_entry(account.id, -10)?;
            tx.add_account_balance(account.id, -10)?;
            Err(Error::database("boom"))
        });

        assert!(result.is_err());
        assert_eq!(store.get_account(account.id).unwrap().unwrap().balance, 100);
        assert_eq!(store.count_entries().unwrap(), 0);
        assert_eq!(store.count_transfers().unwrap(), 0);
    }

    #[test]
    fn test_missing_account_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .run_atomically(|tx| tx.get_account_for_update(42))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        // The lock taken on the missing row must be gone after rollback.
        let err = store
            .run_atomically(|tx| tx.add_account_balance(42, 1))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_reads_inside_transaction_see_own_writes() {
        let (store, account) = store_with_account(10);

        let seen = store
            .run_atomically(|tx| {
                tx.add_account_balance(account.id, 5)?;
                tx.get_account_for_update(account.id)
            })
            .unwrap();

        assert_eq!(seen.balance, 15);
    }

    #[test]
    fn test_row_lock_blocks_until_commit() {
        let (store, account) = store_with_account(0);
        let store = Arc::new(store);
        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store
                    .run_atomically(|tx| {
                        tx.get_account_for_update(account.id)?;
                        locked_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        tx.add_account_balance(account.id, 1)
                    })
                    .unwrap();
            })
        };

        locked_rx.recv().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let waiter = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let account = store
                    .run_atomically(|tx| tx.add_account_balance(account.id, 1))
                    .unwrap();
                done_tx.send(account.balance).unwrap();
            })
        };

        // The waiter cannot finish while the holder keeps the row.
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

        release_tx.send(()).unwrap();
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 2);

        holder.join().unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn test_panic_inside_transaction_releases_locks() {
        let (store, account) = store_with_account(0);
        let store = Arc::new(store);

        let panicking = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let _ = store.run_atomically(|tx| -> Result<()> {
                    tx.add_account_balance(account.id, 100)?;
                    panic!("work failed");
                });
            })
        };
        assert!(panicking.join().is_err());

        let account = store
            .run_atomically(|tx| tx.add_account_balance(account.id, 1))
            .unwrap();
        assert_eq!(account.balance, 1);
    }

    #[test]
    fn test_list_transfers_and_entries_paging() {
        let store = InMemoryStore::new();
        let a = store.create_account(&NewAccount::new("a", 0, "USD")).unwrap();
        let b = store.create_account(&NewAccount::new("b", 0, "USD")).unwrap();

        store
            .run_atomically(|tx| {
                for _ in 0..4 {
                    tx.create_transfer(a.id, b.id, 1)?;
                    tx.create_entry(a.id, -1)?;
                }
                tx.create_transfer(b.id, a.id, 1)?;
                Ok(())
            })
            .unwrap();

        let from_a = store
            .list_transfers(&TransferFilter::new(10).from_account(a.id))
            .unwrap();
        assert_eq!(from_a.len(), 4);

        let page = store
            .list_transfers(&TransferFilter::new(2).from_account(a.id).offset(3))
            .unwrap();
        assert_eq!(page.len(), 1);

        assert_eq!(store.list_entries(a.id, 3, 0).unwrap().len(), 3);
        assert!(store.list_entries(b.id, 10, 0).unwrap().is_empty());
    }

    #[test]
    fn test_create_account_rejects_blank_owner() {
        let store = InMemoryStore::new();
        let err = store
            .create_account(&NewAccount::new(" ", 0, "USD"))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
