//! Status service - ledger-wide summaries

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use crate::ports::LedgerStore;

const PAGE_SIZE: usize = 500;

/// Status service for ledger summaries
pub struct StatusService<S> {
    store: Arc<S>,
}

impl<S: LedgerStore> StatusService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Counts plus per-currency balance totals.
    ///
    /// Transfers never change a currency total, so these totals only move
    /// when accounts are created.
    pub fn get_status(&self) -> Result<StatusSummary> {
        let mut totals: BTreeMap<String, CurrencyTotal> = BTreeMap::new();
        let mut total_accounts = 0;
        let mut offset = 0;

        loop {
            let page = self
                .store
                .list_accounts(PAGE_SIZE, offset)
                .context("failed to list accounts")?;
            for account in &page {
                let total = totals
                    .entry(account.currency.clone())
                    .or_insert_with(|| CurrencyTotal {
                        currency: account.currency.clone(),
                        accounts: 0,
                        balance: 0,
                    });
                total.accounts += 1;
                total.balance = total.balance.checked_add(account.balance).ok_or_else(|| {
                    anyhow!("{} balance total overflows at account {}", account.currency, account.id)
                })?;
            }
            total_accounts += page.len() as i64;
            if page.len() < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        Ok(StatusSummary {
            total_accounts,
            total_transfers: self.store.count_transfers().context("failed to count transfers")?,
            total_entries: self.store.count_entries().context("failed to count entries")?,
            currencies: totals.into_values().collect(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_accounts: i64,
    pub total_transfers: i64,
    pub total_entries: i64,
    pub currencies: Vec<CurrencyTotal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyTotal {
    pub currency: String,
    pub accounts: i64,
    pub balance: i64,
}
