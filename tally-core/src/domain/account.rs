//! Account domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::currency::normalize_currency;

/// A ledger account
///
/// `balance` is held in minor currency units (cents for USD).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub balance: i64,
    /// ISO 4217 currency code, normalized to uppercase
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
}

impl NewAccount {
    pub fn new(owner: impl Into<String>, balance: i64, currency: &str) -> Self {
        Self {
            owner: owner.into(),
            balance,
            currency: normalize_currency(currency),
        }
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.owner.trim().is_empty() {
            return Err("owner cannot be empty");
        }
        if self.currency.trim().is_empty() {
            return Err("currency cannot be empty");
        }
        Ok(())
    }
}
