//! Entry domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One leg of a transfer: a signed delta applied to a single account.
/// Positive amounts are credits, negative amounts debits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}
