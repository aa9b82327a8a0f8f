//! Stress command - random concurrent transfers followed by a ledger check

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use serde::Serialize;
use tally_core::adapters::memory::InMemoryStore;
use tally_core::domain::currency::USD;
use tally_core::ports::LedgerStore;
use tally_core::services::{random_money, random_owner, TransferService};
use tally_core::{Error, ErrorKind, NewAccount, TransferParams};
use tracing::warn;

use super::get_context;
use crate::output;

const MAX_AMOUNT: i64 = 100;

#[derive(Debug, Serialize)]
struct StressReport {
    accounts: usize,
    transfers: usize,
    committed: usize,
    rejected: usize,
    failed: usize,
    elapsed_ms: u128,
    balance_before: i64,
    balance_after: i64,
    new_transfers: i64,
    new_entries: i64,
}

impl StressReport {
    fn balanced(&self) -> bool {
        self.balance_before == self.balance_after
            && self.new_entries == 2 * self.new_transfers
            && self.new_transfers == self.committed as i64
    }
}

pub fn run(
    accounts: usize,
    transfers: usize,
    threads: usize,
    memory: bool,
    json: bool,
) -> Result<()> {
    if accounts < 2 {
        bail!(Error::validation("--accounts must be at least 2"));
    }
    if threads == 0 {
        bail!(Error::validation("--threads must be at least 1"));
    }

    let report = if memory {
        let store = Arc::new(InMemoryStore::new());
        let service = TransferService::new(Arc::clone(&store));
        stress(&store, &service, accounts, transfers, threads, json)?
    } else {
        let ctx = get_context()?;
        stress(&ctx.store, &ctx.transfer_service, accounts, transfers, threads, json)?
    };

    if !json {
        println!(
            "{} committed, {} rejected, {} failed in {} ms",
            report.committed, report.rejected, report.failed, report.elapsed_ms
        );
    }

    if !report.balanced() {
        bail!(
            "ledger check failed: balance {} -> {}, {} transfers, {} entries",
            report.balance_before,
            report.balance_after,
            report.new_transfers,
            report.new_entries
        );
    }
    if json {
        output::json(&report)?;
    } else {
        output::success("Ledger balanced");
    }
    Ok(())
}

fn stress<S: LedgerStore>(
    store: &Arc<S>,
    service: &TransferService<S>,
    account_count: usize,
    transfer_count: usize,
    threads: usize,
    quiet: bool,
) -> Result<StressReport> {
    let mut rng = rand::thread_rng();
    let mut ids = Vec::with_capacity(account_count);
    for _ in 0..account_count {
        let account = NewAccount::new(random_owner(&mut rng), random_money(&mut rng), USD);
        ids.push(store.create_account(&account)?.id);
    }

    let balance_before = total_balance(store.as_ref(), &ids)?;
    let transfers_before = store.count_transfers()?;
    let entries_before = store.count_entries()?;

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(transfer_count as u64)
    };
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} transfers ({per_sec})")?
            .progress_chars("=> "),
    );
    progress.enable_steady_tick(Duration::from_millis(100));

    let next = AtomicUsize::new(0);
    let committed = AtomicUsize::new(0);
    let rejected = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                let mut rng = rand::thread_rng();
                while next.fetch_add(1, Ordering::Relaxed) < transfer_count {
                    let from = rng.gen_range(0..ids.len());
                    let mut to = rng.gen_range(0..ids.len() - 1);
                    if to >= from {
                        to += 1;
                    }
                    let params =
                        TransferParams::new(ids[from], ids[to], rng.gen_range(1..=MAX_AMOUNT));
                    match service.execute_transfer(&params) {
                        Ok(_) => committed.fetch_add(1, Ordering::Relaxed),
                        Err(e) if e.kind() == ErrorKind::InsufficientFunds => {
                            rejected.fetch_add(1, Ordering::Relaxed)
                        }
                        Err(e) => {
                            warn!(error = %e, "stress transfer failed");
                            failed.fetch_add(1, Ordering::Relaxed)
                        }
                    };
                    progress.inc(1);
                }
            });
        }
    });
    progress.finish_and_clear();

    Ok(StressReport {
        accounts: account_count,
        transfers: transfer_count,
        committed: committed.into_inner(),
        rejected: rejected.into_inner(),
        failed: failed.into_inner(),
        elapsed_ms: start.elapsed().as_millis(),
        balance_before,
        balance_after: total_balance(store.as_ref(), &ids)?,
        new_transfers: store.count_transfers()? - transfers_before,
        new_entries: store.count_entries()? - entries_before,
    })
}

fn total_balance<S: LedgerStore>(store: &S, ids: &[i64]) -> Result<i64> {
    let mut total: i64 = 0;
    for id in ids {
        let account = store.get_account(*id)?.ok_or_else(|| Error::account_not_found(*id))?;
        total = total
            .checked_add(account.balance)
            .ok_or_else(|| anyhow!("balance total overflows at account {}", id))?;
    }
    Ok(total)
}
