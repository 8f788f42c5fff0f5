//! Duplicate transaction-id tracking.
//!
//! A transaction id must be unique across the whole chain: the transient
//! recent-set (ids committed within the current batch) is consulted first,
//! then durable storage. Two historical exceptions are preserved exactly;
//! they are consensus-visible chain data, not bugs to fix:
//!
//! - legacy `Payment` transactions are permanently exempt;
//! - alias registrations inside the configured timestamp window tolerate
//!   duplicate ids (early mainnet blocks contain such duplicates).

use std::collections::HashSet;

use shared_types::{Transaction, TxId, TxKind};

use crate::config::ChainParameters;
use crate::error::{AppendError, Result};
use crate::ports::outbound::Storage;

/// Ids of transactions committed within the current batch.
#[derive(Debug, Default)]
pub struct RecentIds(HashSet<TxId>);

impl RecentIds {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the id was committed in this batch.
    pub fn contains(&self, id: &TxId) -> bool {
        self.0.contains(id)
    }

    /// Marks an id as committed in this batch.
    pub fn insert(&mut self, id: TxId) {
        self.0.insert(id);
    }

    /// Number of ids committed in this batch.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no id has been committed yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Clears the set at a batch boundary.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

fn check_duplicate_impl<S: Storage + ?Sized>(
    storage: &S,
    id: TxId,
    recent: &RecentIds,
) -> Result<()> {
    // Check recent first: cheap, and catches intra-batch duplicates that
    // durable storage cannot see yet.
    if recent.contains(&id) {
        return Err(AppendError::Duplicate(id));
    }
    if storage.transaction_exists(&id)? {
        return Err(AppendError::Duplicate(id));
    }
    Ok(())
}

/// Rejects a transaction whose id was already applied, subject to the two
/// historical exceptions. `block_timestamp` is the timestamp of the block
/// being validated against.
pub fn check_duplicate<S: Storage + ?Sized>(
    storage: &S,
    params: &ChainParameters,
    tx: &Transaction,
    recent: &RecentIds,
    block_timestamp: u64,
) -> Result<()> {
    match tx.kind() {
        // Payment transactions are deprecated and exempt.
        TxKind::Payment => return Ok(()),
        TxKind::CreateAlias
            if (params.alias_window_start..=params.alias_window_end)
                .contains(&block_timestamp) =>
        {
            // Inside this window alias registrations may carry duplicate
            // ids; historical chain data depends on accepting them.
            return Ok(());
        }
        _ => {}
    }
    let id = tx.id()?;
    check_duplicate_impl(storage, id, recent).map_err(|err| {
        if tx.kind() == TxKind::CreateAlias {
            match err {
                AppendError::Duplicate(id) => AppendError::AliasTaken(id),
                other => other,
            }
        } else {
            err
        }
    })
}
