//! Transfer service - atomic money movement between two accounts
//!
//! Every transfer runs inside one store transaction: insert the transfer,
//! insert both entries, then lock and adjust both balances. Rows are always
//! locked in ascending account id order, whatever the direction of the
//! transfer, so two transfers over the same pair of accounts can never wait
//! on each other in a cycle.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::OverdraftPolicy;
use crate::domain::currency::is_supported_currency;
use crate::domain::result::{Error, Result};
use crate::domain::{Account, TransferParams, TransferRequest, TransferResult};
use crate::ports::{LedgerStore, LedgerTx};

/// Transfer orchestrator
pub struct TransferService<S> {
    store: Arc<S>,
    overdraft_policy: OverdraftPolicy,
}

impl<S: LedgerStore> TransferService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            overdraft_policy: OverdraftPolicy::default(),
        }
    }

    pub fn with_overdraft_policy(mut self, policy: OverdraftPolicy) -> Self {
        self.overdraft_policy = policy;
        self
    }

    /// Move `params.amount` from one account to another.
    ///
    /// Errors:
    /// - [`Error::Validation`] for a non-positive amount or id, before any
    ///   store call
    /// - [`Error::NotFound`] when either account does not exist
    /// - [`Error::InsufficientFunds`] when the source ends negative under
    ///   [`OverdraftPolicy::Reject`]
    /// - [`Error::Database`] for any store failure
    ///
    /// On error nothing from this call is visible in the store.
    pub fn execute_transfer(&self, params: &TransferParams) -> Result<TransferResult> {
        params.validate().map_err(Error::validation)?;

        debug!(
            from_account_id = params.from_account_id,
            to_account_id = params.to_account_id,
            amount = params.amount,
            "starting transfer"
        );

        let policy = self.overdraft_policy;
        let outcome = self
            .store
            .run_atomically(|tx| apply_transfer(tx, params, policy));

        match &outcome {
            Ok(result) => info!(
                transfer_id = result.transfer.id,
                from_account_id = params.from_account_id,
                to_account_id = params.to_account_id,
                amount = params.amount,
                "transfer committed"
            ),
            Err(e) => warn!(
                from_account_id = params.from_account_id,
                to_account_id = params.to_account_id,
                kind = ?e.kind(),
                error = %e,
                "transfer rolled back"
            ),
        }

        outcome
    }

    /// Boundary entry point: check the request against the stored accounts,
    /// then execute it.
    ///
    /// Rejects unsupported currencies and currency mismatches with
    /// [`Error::Validation`]. The source account is looked up first; the
    /// destination is not read when the source is missing.
    pub fn submit(&self, request: &TransferRequest) -> Result<TransferResult> {
        if !is_supported_currency(&request.currency) {
            return Err(Error::validation(format!(
                "unsupported currency: {}",
                request.currency
            )));
        }
        let params = request.params();
        params.validate().map_err(Error::validation)?;

        self.valid_account(params.from_account_id, &request.currency)?;
        self.valid_account(params.to_account_id, &request.currency)?;

        self.execute_transfer(&params)
    }

    fn valid_account(&self, account_id: i64, currency: &str) -> Result<Account> {
        let account = self
            .store
            .get_account(account_id)?
            .ok_or_else(|| Error::account_not_found(account_id))?;
        if account.currency != currency {
            return Err(Error::validation(format!(
                "account {} currency mismatch: {} vs {}",
                account_id, account.currency, currency
            )));
        }
        Ok(account)
    }
}

fn apply_transfer(
    tx: &mut dyn LedgerTx,
    params: &TransferParams,
    policy: OverdraftPolicy,
) -> Result<TransferResult> {
    let TransferParams {
        from_account_id,
        to_account_id,
        amount,
    } = *params;

    let transfer = tx.create_transfer(from_account_id, to_account_id, amount)?;
    let from_entry = tx.create_entry(from_account_id, -amount)?;
    let to_entry = tx.create_entry(to_account_id, amount)?;

    let (from_account, to_account) = if params.is_self_transfer() {
        tx.get_account_for_update(from_account_id)?;
        let account = tx.add_account_balance(from_account_id, 0)?;
        (account.clone(), account)
    } else if from_account_id < to_account_id {
        add_money(tx, from_account_id, -amount, to_account_id, amount)?
    } else {
        let (to_account, from_account) =
            add_money(tx, to_account_id, amount, from_account_id, -amount)?;
        (from_account, to_account)
    };

    if policy == OverdraftPolicy::Reject && !params.is_self_transfer() && from_account.balance < 0
    {
        return Err(Error::InsufficientFunds {
            account_id: from_account_id,
            balance: from_account.balance + amount,
            amount,
        });
    }

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

/// Lock both rows, then apply both deltas. `first_id` must be the smaller id.
fn add_money(
    tx: &mut dyn LedgerTx,
    first_id: i64,
    first_delta: i64,
    second_id: i64,
    second_delta: i64,
) -> Result<(Account, Account)> {
    debug_assert!(first_id < second_id);
    tx.get_account_for_update(first_id)?;
    tx.get_account_for_update(second_id)?;
    let first = tx.add_account_balance(first_id, first_delta)?;
    let second = tx.add_account_balance(second_id, second_delta)?;
    Ok((first, second))
}
