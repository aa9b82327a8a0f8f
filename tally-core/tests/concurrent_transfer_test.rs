//! Concurrent transfer tests
//!
//! Many threads moving money over a small set of accounts at once. Balances
//! must add up afterwards and opposite-direction transfers must never
//! deadlock.
//!
//! Run with: cargo test --test concurrent_transfer_test -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use tally_core::adapters::duckdb::DuckDbStore;
use tally_core::adapters::memory::InMemoryStore;
use tally_core::ports::LedgerStore;
use tally_core::services::TransferService;
use tally_core::{NewAccount, TransferParams};

/// Transfers per direction in the deadlock tests
const TRANSFERS_PER_DIRECTION: usize = 10;

/// Threads in the ring test
const THREAD_COUNT: usize = 6;

/// Transfers per thread in the ring test
const ITERATIONS_PER_THREAD: usize = 20;

/// Upper bound for a run; exceeding it is reported as a deadlock
const DEADLOCK_TIMEOUT: Duration = Duration::from_secs(30);

const AMOUNT: i64 = 10;
const INITIAL_BALANCE: i64 = 1_000;

fn duckdb_store(temp_dir: &TempDir) -> Arc<DuckDbStore> {
    let store = DuckDbStore::new(&temp_dir.path().join("concurrent.duckdb")).unwrap();
    store.ensure_schema().unwrap();
    Arc::new(store)
}

fn open_accounts<S: LedgerStore>(store: &S, count: usize) -> Vec<i64> {
    (0..count)
        .map(|i| {
            store
                .create_account(&NewAccount::new(format!("owner{}", i), INITIAL_BALANCE, "USD"))
                .unwrap()
                .id
        })
        .collect()
}

fn balance<S: LedgerStore>(store: &S, id: i64) -> i64 {
    store.get_account(id).unwrap().unwrap().balance
}

/// Run every transfer on its own thread, all released by one barrier.
/// Panics if they do not all finish within [`DEADLOCK_TIMEOUT`].
fn run_all<S: LedgerStore + 'static>(store: &Arc<S>, transfers: Vec<TransferParams>) {
    let service = Arc::new(TransferService::new(Arc::clone(store)));
    let barrier = Arc::new(Barrier::new(transfers.len()));
    let (done_tx, done_rx) = mpsc::channel();
    let total = transfers.len();

    for params in transfers {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        let done_tx = done_tx.clone();
        thread::spawn(move || {
            barrier.wait();
            let outcome = service.execute_transfer(&params).map(|_| ());
            let _ = done_tx.send(outcome);
        });
    }
    drop(done_tx);

    let start = Instant::now();
    for finished in 0..total {
        let remaining = DEADLOCK_TIMEOUT.saturating_sub(start.elapsed());
        match done_rx.recv_timeout(remaining) {
            Ok(outcome) => outcome.expect("transfer failed"),
            Err(e) => panic!("only {}/{} transfers finished: {}", finished, total, e),
        }
    }
    println!("{} transfers finished in {:?}", total, start.elapsed());
}

// ============================================================================
// Lost updates
// ============================================================================

fn assert_no_lost_updates<S: LedgerStore + 'static>(store: Arc<S>) {
    let ids = open_accounts(&*store, 2);
    let (x, y) = (ids[0], ids[1]);
    let count = 8;

    run_all(&store, vec![TransferParams::new(x, y, AMOUNT); count]);

    assert_eq!(balance(&*store, x), INITIAL_BALANCE - count as i64 * AMOUNT);
    assert_eq!(balance(&*store, y), INITIAL_BALANCE + count as i64 * AMOUNT);
    assert_eq!(store.count_transfers().unwrap(), count as i64);
    assert_eq!(store.count_entries().unwrap(), 2 * count as i64);
}

#[test]
fn test_concurrent_same_direction_duckdb() {
    let temp_dir = TempDir::new().unwrap();
    assert_no_lost_updates(duckdb_store(&temp_dir));
}

#[test]
fn test_concurrent_same_direction_memory() {
    assert_no_lost_updates(Arc::new(InMemoryStore::new()));
}

// ============================================================================
// Deadlock freedom
// ============================================================================

fn assert_opposite_directions_finish<S: LedgerStore + 'static>(store: Arc<S>) {
    let ids = open_accounts(&*store, 2);
    let (x, y) = (ids[0], ids[1]);

    let transfers = (0..2 * TRANSFERS_PER_DIRECTION)
        .map(|i| {
            if i % 2 == 0 {
                TransferParams::new(x, y, AMOUNT)
            } else {
                TransferParams::new(y, x, AMOUNT)
            }
        })
        .collect();
    run_all(&store, transfers);

    assert_eq!(balance(&*store, x), INITIAL_BALANCE);
    assert_eq!(balance(&*store, y), INITIAL_BALANCE);
    assert_eq!(
        store.count_transfers().unwrap(),
        2 * TRANSFERS_PER_DIRECTION as i64
    );
}

#[test]
fn test_opposite_directions_do_not_deadlock_duckdb() {
    let temp_dir = TempDir::new().unwrap();
    assert_opposite_directions_finish(duckdb_store(&temp_dir));
}

#[test]
fn test_opposite_directions_do_not_deadlock_memory() {
    assert_opposite_directions_finish(Arc::new(InMemoryStore::new()));
}

// ============================================================================
// Ring of accounts
// ============================================================================

/// Each thread walks the ring in its own direction, so every adjacent pair
/// sees traffic both ways. The sum of balances must not change.
#[test]
fn test_ring_transfers_conserve_total() {
    let store = Arc::new(InMemoryStore::new());
    let ids = Arc::new(open_accounts(&*store, 4));
    let service = Arc::new(TransferService::new(Arc::clone(&store)));
    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let success_count = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = mpsc::channel();

    for thread_id in 0..THREAD_COUNT {
        let ids = Arc::clone(&ids);
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        let success_count = Arc::clone(&success_count);
        let done_tx = done_tx.clone();

        thread::spawn(move || {
            barrier.wait();
            let n = ids.len();
            for i in 0..ITERATIONS_PER_THREAD {
                let from = (thread_id + i) % n;
                let to = if thread_id % 2 == 0 { (from + 1) % n } else { (from + n - 1) % n };
                service
                    .execute_transfer(&TransferParams::new(ids[from], ids[to], AMOUNT))
                    .expect("ring transfer failed");
                success_count.fetch_add(1, Ordering::SeqCst);
            }
            let _ = done_tx.send(thread_id);
        });
    }
    drop(done_tx);

    for _ in 0..THREAD_COUNT {
        done_rx
            .recv_timeout(DEADLOCK_TIMEOUT)
            .expect("ring transfers deadlocked");
    }

    let expected = THREAD_COUNT * ITERATIONS_PER_THREAD;
    assert_eq!(success_count.load(Ordering::SeqCst), expected);
    let total: i64 = ids.iter().map(|id| balance(&*store, *id)).sum();
    assert_eq!(total, INITIAL_BALANCE * ids.len() as i64);
    assert_eq!(store.count_entries().unwrap(), 2 * expected as i64);
}
