//! Inbound (driving) port of the appending pipeline.
//!
//! Consumed by the block-application loop (confirming blocks) and the
//! unconfirmed-pool manager (speculative admission). Both callers must
//! serialize access: the pipeline holds per-batch mutable state and does
//! no internal locking.

use shared_types::{BlockVersion, Transaction};

use crate::domain::appender::AppendBlockParams;
use crate::error::Result;

/// Transaction-appending API.
pub trait AppendApi {
    /// Validates and commits every transaction of a block, in order,
    /// aborting the whole block on the first error.
    fn append_block(&mut self, params: AppendBlockParams<'_>) -> Result<()>;

    /// Speculatively validates one pool candidate against the current
    /// block. Failures are wrapped as non-fatal rejections; the caller is
    /// expected to discard the transaction.
    fn validate_next_tx(
        &mut self,
        tx: &Transaction,
        current_timestamp: u64,
        parent_timestamp: u64,
        block_version: BlockVersion,
        accept_failed: bool,
    ) -> Result<()>;

    /// Clears all per-batch transient state: recent ids, the diff working
    /// set, and the script counters. Called at pool-session boundaries.
    fn reset(&mut self);
}
