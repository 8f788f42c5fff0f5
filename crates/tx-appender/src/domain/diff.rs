//! Balance-diff engine.
//!
//! A transaction's balance effect is computed as a [`BalanceDiff`]: signed
//! per-(address, asset) deltas that combine associatively. Diffs from the
//! transactions of one batch accumulate in order into a [`DiffStorage`]
//! working set; [`DiffApplier`] validates a candidate diff against
//! durable balances plus the working set (no effective balance may go
//! negative) and flushes accumulated changes into durable storage at
//! batch end.
//!
//! All arithmetic is overflow-checked; a wrap is a consensus bug, not a
//! recoverable condition, and surfaces as [`AppendError::Overflow`].

use std::collections::BTreeMap;

use shared_types::{Address, AssetId};

use crate::error::{AppendError, Result};
use crate::ports::outbound::Storage;

/// One balance account: an address and an asset (`None` = native token).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountKey {
    /// Account address.
    pub address: Address,
    /// Asset, `None` for the native token.
    pub asset: Option<AssetId>,
}

impl AccountKey {
    /// Native-token account of an address.
    pub fn native(address: Address) -> Self {
        Self {
            address,
            asset: None,
        }
    }

    /// Asset account of an address.
    pub fn asset(address: Address, asset: AssetId) -> Self {
        Self {
            address,
            asset: Some(asset),
        }
    }
}

impl std::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.asset {
            Some(asset) => write!(f, "{}/{}", self.address, asset),
            None => write!(f, "{}/native", self.address),
        }
    }
}

/// A single signed delta with its miner-reward marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffEntry {
    /// Signed balance change.
    pub delta: i64,
    /// True when the delta is a generator-fee/reward credit.
    pub miner_reward: bool,
}

/// Per-account balance deltas of one transaction (or of the block's
/// miner-reward seed diff).
#[derive(Debug, Clone, Default)]
pub struct BalanceDiff {
    entries: BTreeMap<AccountKey, DiffEntry>,
}

impl BalanceDiff {
    /// An empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a delta for an account, combining with any existing entry.
    pub fn add(&mut self, key: AccountKey, delta: i64) -> Result<()> {
        self.add_entry(key, delta, false)
    }

    /// Adds a generator-fee/reward credit for an account.
    pub fn add_miner_reward(&mut self, key: AccountKey, delta: i64) -> Result<()> {
        self.add_entry(key, delta, true)
    }

    fn add_entry(&mut self, key: AccountKey, delta: i64, miner_reward: bool) -> Result<()> {
        let entry = self.entries.entry(key).or_default();
        entry.delta = entry.delta.checked_add(delta).ok_or(AppendError::Overflow)?;
        entry.miner_reward |= miner_reward;
        Ok(())
    }

    /// Iterates entries in account order.
    pub fn iter(&self) -> impl Iterator<Item = (&AccountKey, &DiffEntry)> {
        self.entries.iter()
    }

    /// True when the diff touches no account.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of touched accounts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Distinct addresses touched by this diff, in order.
    pub fn addresses(&self) -> Vec<Address> {
        let mut out: Vec<Address> = Vec::new();
        for key in self.entries.keys() {
            if out.last() != Some(&key.address) && !out.contains(&key.address) {
                out.push(key.address);
            }
        }
        out
    }
}

/// Working set: accumulated, not-yet-durable deltas of the current batch.
#[derive(Debug, Default)]
pub struct DiffStorage {
    totals: BTreeMap<AccountKey, i64>,
}

impl DiffStorage {
    /// An empty working set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a transaction diff into the working set.
    pub fn save_diff(&mut self, diff: &BalanceDiff) -> Result<()> {
        for (key, entry) in diff.iter() {
            let total = self.totals.entry(*key).or_default();
            *total = total.checked_add(entry.delta).ok_or(AppendError::Overflow)?;
        }
        Ok(())
    }

    /// Accumulated delta for one account.
    pub fn delta(&self, key: &AccountKey) -> i64 {
        self.totals.get(key).copied().unwrap_or(0)
    }

    /// Snapshot of all accumulated changes, in account order.
    pub fn all_changes(&self) -> Vec<(AccountKey, i64)> {
        self.totals.iter().map(|(k, v)| (*k, *v)).collect()
    }

    /// Clears the working set.
    pub fn reset(&mut self) {
        self.totals.clear();
    }
}

/// Validates diffs against effective balances and applies batch changes
/// to durable storage.
#[derive(Debug, Default)]
pub struct DiffApplier;

impl DiffApplier {
    /// Checks that applying `diff` on top of the working set leaves no
    /// account's effective balance negative.
    ///
    /// Effective balance = durable balance + working-set delta + candidate
    /// delta, computed in 128-bit to keep the check itself overflow-free.
    pub fn validate_tx_diff<S: Storage + ?Sized>(
        &self,
        storage: &S,
        diff: &BalanceDiff,
        working: &DiffStorage,
    ) -> Result<()> {
        for (key, entry) in diff.iter() {
            let durable = storage.balance(&key.address, key.asset.as_ref())? as i128;
            let effective = durable + working.delta(key) as i128 + entry.delta as i128;
            if effective < 0 {
                return Err(AppendError::InsufficientBalance {
                    account: key.to_string(),
                    result: effective as i64,
                });
            }
        }
        Ok(())
    }

    /// Writes a batch of accumulated changes into durable balances.
    pub fn apply_balances_changes<S: Storage + ?Sized>(
        &self,
        storage: &mut S,
        changes: &[(AccountKey, i64)],
    ) -> Result<()> {
        for (key, delta) in changes {
            let durable = storage.balance(&key.address, key.asset.as_ref())? as i128;
            let next = durable + *delta as i128;
            if next < 0 {
                return Err(AppendError::InsufficientBalance {
                    account: key.to_string(),
                    result: next as i64,
                });
            }
            let next = u64::try_from(next).map_err(|_| AppendError::Overflow)?;
            storage.set_balance(&key.address, key.asset.as_ref(), next)?;
        }
        Ok(())
    }
}
