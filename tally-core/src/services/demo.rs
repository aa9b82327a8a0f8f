//! Demo service - random sample accounts
//!
//! Seeds a ledger with accounts for trying the CLI and for stress runs.

use std::sync::Arc;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::domain::currency::SUPPORTED_CURRENCIES;
use crate::domain::{Account, NewAccount};
use crate::ports::LedgerStore;

const OWNER_LEN: usize = 6;
const MAX_BALANCE: i64 = 1000;

/// Demo service for seeding sample data
pub struct DemoService<S> {
    store: Arc<S>,
}

impl<S: LedgerStore> DemoService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create `count` random accounts
    pub fn seed(&self, count: usize) -> Result<Vec<Account>> {
        self.seed_with(&mut rand::thread_rng(), count)
    }

    /// Like [`seed`](Self::seed) with a caller-provided generator
    pub fn seed_with(&self, rng: &mut impl Rng, count: usize) -> Result<Vec<Account>> {
        let mut accounts = Vec::with_capacity(count);
        for _ in 0..count {
            let new_account = NewAccount::new(random_owner(rng), random_money(rng), random_currency(rng));
            let account = self
                .store
                .create_account(&new_account)
                .with_context(|| format!("failed to create account for {}", new_account.owner))?;
            accounts.push(account);
        }
        info!(count, "seeded demo accounts");
        Ok(accounts)
    }
}

/// Six random lowercase letters
pub fn random_owner(rng: &mut impl Rng) -> String {
    (0..OWNER_LEN)
        .map(|_| char::from(b'a' + rng.gen_range(0..26u8)))
        .collect()
}

/// A balance in `0..=1000` minor units
pub fn random_money(rng: &mut impl Rng) -> i64 {
    rng.gen_range(0..=MAX_BALANCE)
}

pub fn random_currency(rng: &mut impl Rng) -> &'static str {
    SUPPORTED_CURRENCIES.choose(rng).copied().unwrap_or("USD")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::currency::is_supported_currency;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_values_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let owner = random_owner(&mut rng);
            assert_eq!(owner.len(), OWNER_LEN);
            assert!(owner.chars().all(|c| c.is_ascii_lowercase()));
            assert!((0..=MAX_BALANCE).contains(&random_money(&mut rng)));
            assert!(is_supported_currency(random_currency(&mut rng)));
        }
    }

    #[test]
    fn test_seed_creates_accounts() {
        let store = Arc::new(InMemoryStore::new());
        let demo = DemoService::new(Arc::clone(&store));

        let accounts = demo.seed_with(&mut StdRng::seed_from_u64(7), 5).unwrap();

        assert_eq!(accounts.len(), 5);
        assert_eq!(store.list_accounts(100, 0).unwrap(), accounts);
    }
}
