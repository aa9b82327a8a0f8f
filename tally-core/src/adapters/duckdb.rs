//! DuckDB ledger store implementation
//!
//! One connection guarded by a `Mutex`. A ledger transaction holds the guard
//! from `BEGIN` until `COMMIT`/`ROLLBACK`, so transactions on one store are
//! serialized and every row read inside a transaction is exclusively held.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection};
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Entry, NewAccount, Transfer, TransferFilter};
use crate::ports::{LedgerStore, LedgerTx};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock on file")
}

/// DuckDB-backed ledger store
pub struct DuckDbStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbStore {
    /// Open (or create) the database file at `db_path`.
    ///
    /// Retries with exponential backoff while another process holds the
    /// file lock.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) if attempt + 1 < MAX_RETRIES && is_retryable_error(&e.to_string()) => {
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    warn!(
                        attempt = attempt + 1,
                        max = MAX_RETRIES,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "database busy, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Extension autoloading stays off; the ledger needs none.
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run pending migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock();
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// A panic inside a transaction poisons the mutex after the duckdb
    /// `Transaction` has rolled back on drop, so the connection is still usable.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An open DuckDB transaction
struct DuckDbTx<'a> {
    conn: &'a Connection,
}

impl LedgerTx for DuckDbTx<'_> {
    fn create_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
    ) -> Result<Transfer> {
        let sql = format!(
            "INSERT INTO transfers (from_account_id, to_account_id, amount, created_at)
             VALUES (?, ?, ?, ?) RETURNING {}",
            TRANSFER_COLUMNS
        );
        let transfer = self.conn.query_row(
            &sql,
            params![from_account_id, to_account_id, amount, now_rfc3339()],
            row_to_transfer,
        )?;
        Ok(transfer)
    }

    fn create_entry(&mut self, account_id: i64, amount: i64) -> Result<Entry> {
        let sql = format!(
            "INSERT INTO entries (account_id, amount, created_at) VALUES (?, ?, ?) RETURNING {}",
            ENTRY_COLUMNS
        );
        let entry = self
            .conn
            .query_row(&sql, params![account_id, amount, now_rfc3339()], row_to_entry)?;
        Ok(entry)
    }

    fn get_account_for_update(&mut self, account_id: i64) -> Result<Account> {
        // The connection guard held by the enclosing transaction is the row lock.
        let sql = format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS);
        self.conn
            .query_row(&sql, [account_id], row_to_account)
            .map(Some)
            .or_else(no_rows_as_none)?
            .ok_or_else(|| Error::account_not_found(account_id))
    }

    fn add_account_balance(&mut self, account_id: i64, delta: i64) -> Result<Account> {
        let sql = format!(
            "UPDATE accounts SET balance = balance + ? WHERE id = ? RETURNING {}",
            ACCOUNT_COLUMNS
        );
        self.conn
            .query_row(&sql, params![delta, account_id], row_to_account)
            .map(Some)
            .or_else(no_rows_as_none)?
            .ok_or_else(|| Error::account_not_found(account_id))
    }
}

impl LedgerStore for DuckDbStore {
    fn run_atomically<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let outcome = {
            let mut ledger_tx = DuckDbTx { conn: &tx };
            work(&mut ledger_tx)
        };

        match outcome {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                debug!(error = %e, "rolling back DuckDB transaction");
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    fn create_account(&self, account: &NewAccount) -> Result<Account> {
        account.validate().map_err(Error::validation)?;
        let conn = self.lock();
        let sql = format!(
            "INSERT INTO accounts (owner, balance, currency, created_at) VALUES (?, ?, ?, ?)
             RETURNING {}",
            ACCOUNT_COLUMNS
        );
        let created = conn.query_row(
            &sql,
            params![account.owner, account.balance, account.currency, now_rfc3339()],
            row_to_account,
        )?;
        Ok(created)
    }

    fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let conn = self.lock();
        let sql = format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS);
        let account = conn
            .query_row(&sql, [id], row_to_account)
            .map(Some)
            .or_else(no_rows_as_none)?;
        Ok(account)
    }

    fn list_accounts(&self, limit: usize, offset: usize) -> Result<Vec<Account>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {} FROM accounts ORDER BY id LIMIT ? OFFSET ?",
            ACCOUNT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let accounts = stmt
            .query_map(params![to_sql_count(limit), to_sql_count(offset)], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    fn get_transfer(&self, id: i64) -> Result<Option<Transfer>> {
        let conn = self.lock();
        let sql = format!("SELECT {} FROM transfers WHERE id = ?", TRANSFER_COLUMNS);
        let transfer = conn
            .query_row(&sql, [id], row_to_transfer)
            .map(Some)
            .or_else(no_rows_as_none)?;
        Ok(transfer)
    }

    fn list_transfers(&self, filter: &TransferFilter) -> Result<Vec<Transfer>> {
        let conn = self.lock();
        let mut conditions = Vec::new();
        if let Some(id) = filter.from_account_id {
            conditions.push(format!("from_account_id = {}", id));
        }
        if let Some(id) = filter.to_account_id {
            conditions.push(format!("to_account_id = {}", id));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT {} FROM transfers {} ORDER BY id LIMIT ? OFFSET ?",
            TRANSFER_COLUMNS, where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let transfers = stmt
            .query_map(
                params![to_sql_count(filter.limit), to_sql_count(filter.offset)],
                row_to_transfer,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(transfers)
    }

    fn count_transfers(&self) -> Result<i64> {
        let conn = self.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM transfers", [], |row| row.get(0))?;
        Ok(count)
    }

    fn list_entries(&self, account_id: i64, limit: usize, offset: usize) -> Result<Vec<Entry>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {} FROM entries WHERE account_id = ? ORDER BY id LIMIT ? OFFSET ?",
            ENTRY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(
                params![account_id, to_sql_count(limit), to_sql_count(offset)],
                row_to_entry,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn count_entries(&self) -> Result<i64> {
        let conn = self.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn row_to_account(row: &duckdb::Row) -> duckdb::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        owner: row.get(1)?,
        balance: row.get(2)?,
        currency: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
    })
}

fn row_to_entry(row: &duckdb::Row) -> duckdb::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        account_id: row.get(1)?,
        amount: row.get(2)?,
        created_at: timestamp_column(row, 3)?,
    })
}

fn row_to_transfer(row: &duckdb::Row) -> duckdb::Result<Transfer> {
    Ok(Transfer {
        id: row.get(0)?,
        from_account_id: row.get(1)?,
        to_account_id: row.get(2)?,
        amount: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
    })
}

fn timestamp_column(row: &duckdb::Row, idx: usize) -> duckdb::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn no_rows_as_none<T>(err: duckdb::Error) -> duckdb::Result<Option<T>> {
    match err {
        duckdb::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// LIMIT/OFFSET bind value; `usize::MAX` means "no limit"
fn to_sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn store() -> DuckDbStore {
        let store = DuckDbStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store
    }

    #[test]
    fn test_create_and_get_account() {
        let store = store();
        let created = store
            .create_account(&NewAccount::new("alice", 100, "usd"))
            .unwrap();

        assert!(created.id > 0);
        assert_eq!(created.currency, "USD");

        let fetched = store.get_account(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(store.get_account(created.id + 100).unwrap().is_none());
    }

    #[test]
    fn test_add_account_balance_returns_updated_row() {
        let store = store();
        let account = store
            .create_account(&NewAccount::new("bob", 50, "EUR"))
            .unwrap();

        let updated = store
            .run_atomically(|tx| tx.add_account_balance(account.id, -20))
            .unwrap();

        assert_eq!(updated.balance, 30);
        assert_eq!(store.get_account(account.id).unwrap().unwrap().balance, 30);
    }

    #[test]
    fn test_missing_row_is_not_found() {
        let store = store();
        let err = store
            .run_atomically(|tx| tx.get_account_for_update(999))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = store
            .run_atomically(|tx| tx.add_account_balance(999, 5))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_panic_inside_transaction_releases_lock() {
        let store = Arc::new(store());
        let account = store.create_account(&NewAccount::new("alice", 100, "USD")).unwrap();

        let panicking = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let _ = store.run_atomically(|tx| -> Result<()> {
                    tx.add_account_balance(account.id, 50)?;
                    panic!("work failed");
                });
            })
        };
        assert!(panicking.join().is_err());

        assert_eq!(store.get_account(account.id).unwrap().unwrap().balance, 100);
        let updated = store
            .run_atomically(|tx| tx.add_account_balance(account.id, 1))
            .unwrap();
        assert_eq!(updated.balance, 101);
    }

    #[test]
    fn test_rollback_discards_inserts() {
        let store = store();
        let account = store
            .create_account(&NewAccount::new("carol", 10, "CAD"))
            .unwrap();

        let result: Result<()> = store.run_atomically(|tx| {
            tx.create_transfer(account.id, account.id, 5)?;
            tx.create_entry(account.id, 5)?;
            tx.add_account_balance(account.id, 5)?;
            Err(Error::database("abort"))
        });

        assert!(result.is_err());
        assert_eq!(store.count_transfers().unwrap(), 0);
        assert_eq!(store.count_entries().unwrap(), 0);
        assert_eq!(store.get_account(account.id).unwrap().unwrap().balance, 10);
    }

    #[test]
    fn test_non_positive_transfer_amount_rejected_by_schema() {
        let store = store();
        let err = store
            .run_atomically(|tx| tx.create_transfer(1, 2, 0))
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[test]
    fn test_list_transfers_filters() {
        let store = store();
        let a = store.create_account(&NewAccount::new("a", 0, "USD")).unwrap();
        let b = store.create_account(&NewAccount::new("b", 0, "USD")).unwrap();

        store
            .run_atomically(|tx| {
                for _ in 0..3 {
                    tx.create_transfer(a.id, b.id, 10)?;
                }
                tx.create_transfer(b.id, a.id, 10)?;
                Ok(())
            })
            .unwrap();

        let all = store.list_transfers(&TransferFilter::new(usize::MAX)).unwrap();
        assert_eq!(all.len(), 4);

        let a_to_b = store
            .list_transfers(&TransferFilter::new(10).from_account(a.id).to_account(b.id))
            .unwrap();
        assert_eq!(a_to_b.len(), 3);

        let into_a = store
            .list_transfers(&TransferFilter::new(10).to_account(a.id))
            .unwrap();
        assert_eq!(into_a.len(), 1);

        let page = store
            .list_transfers(&TransferFilter::new(2).offset(1))
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, all[1].id);
    }

    #[test]
    fn test_retryable_error_detection() {
        assert!(is_retryable_error("database is locked"));
        assert!(is_retryable_error(
            "IO Error: Could not set lock on file \"tally.duckdb\""
        ));
        assert!(!is_retryable_error("Catalog Error: Table with name x does not exist"));
    }
}
