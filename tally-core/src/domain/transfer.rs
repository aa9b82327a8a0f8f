//! Transfer domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::currency::normalize_currency;
use super::{Account, Entry};

/// Immutable record of money moved from one account to another.
/// Every transfer owns exactly two entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    /// Always strictly positive
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Input of the transfer orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

impl TransferParams {
    pub fn new(from_account_id: i64, to_account_id: i64, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    pub fn is_self_transfer(&self) -> bool {
        self.from_account_id == self.to_account_id
    }

    /// Reject input that must never reach the store
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.amount <= 0 {
            return Err("amount must be positive");
        }
        if self.from_account_id <= 0 {
            return Err("from_account_id must be positive");
        }
        if self.to_account_id <= 0 {
            return Err("to_account_id must be positive");
        }
        Ok(())
    }
}

/// A transfer as requested by a caller, including the currency the caller
/// expects both accounts to hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub currency: String,
    pub amount: i64,
}

impl TransferRequest {
    pub fn new(from_account_id: i64, to_account_id: i64, currency: &str, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            currency: normalize_currency(currency),
            amount,
        }
    }

    pub fn params(&self) -> TransferParams {
        TransferParams::new(self.from_account_id, self.to_account_id, self.amount)
    }
}

/// Outcome of one committed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Filter for listing transfers. A transfer matches when every provided
/// side matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferFilter {
    pub from_account_id: Option<i64>,
    pub to_account_id: Option<i64>,
    pub limit: usize,
    pub offset: usize,
}

impl TransferFilter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn from_account(mut self, account_id: i64) -> Self {
        self.from_account_id = Some(account_id);
        self
    }

    pub fn to_account(mut self, account_id: i64) -> Self {
        self.to_account_id = Some(account_id);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, transfer: &Transfer) -> bool {
        self.from_account_id.map_or(true, |id| transfer.from_account_id == id)
            && self.to_account_id.map_or(true, |id| transfer.to_account_id == id)
    }
}
