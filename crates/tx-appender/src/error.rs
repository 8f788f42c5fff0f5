//! Error types for the transaction-appending pipeline.

use shared_types::{BlockId, TxId, TxKind, TypesError};
use thiserror::Error;

/// Result type alias for appending operations.
pub type Result<T> = std::result::Result<T, AppendError>;

/// Errors that can occur while appending transactions.
#[derive(Debug, Error)]
pub enum AppendError {
    /// Modern-encoding transaction seen before block format v5 activation.
    #[error("bad transaction version {version} before block format v5 activation")]
    UnsupportedVersion {
        /// Envelope version of the offending transaction.
        version: u8,
    },

    /// Transaction id already present in the recent set or durable storage.
    #[error("transaction with id {0} already in state")]
    Duplicate(TxId),

    /// Duplicate id of an alias registration: the alias is taken.
    #[error("alias already taken, transaction with id {0} already in state")]
    AliasTaken(TxId),

    /// Sender address could not be resolved under the local chain scheme.
    #[error("failed to resolve sender address: {0}")]
    InvalidAddress(String),

    /// Transaction signature or structural data verification failed.
    #[error("tx signature or data verification failed: {0}")]
    VerificationFailed(String),

    /// An account, order, or asset script rejected the transaction.
    #[error("script failure: {0}")]
    ScriptFailure(String),

    /// Applying a diff would drive an effective balance negative.
    #[error("insufficient balance: {account} would end at {result}")]
    InsufficientBalance {
        /// Rendered (address, asset) pair.
        account: String,
        /// The negative effective balance the diff would produce.
        result: i64,
    },

    /// More script runs in the block than the pre-complexity ceiling allows.
    #[error("more scripts runs in block than allowed: {runs} > {limit}")]
    ScriptRunsExceeded {
        /// Runs including the candidate transaction.
        runs: u64,
        /// Per-block ceiling.
        limit: u64,
    },

    /// Cumulative script complexity exceeded the per-block ceiling.
    #[error("complexity of scripts ({complexity}) in block '{block}' exceeds limit of {limit}")]
    ComplexityExceeded {
        /// Block being appended.
        block: BlockId,
        /// Accumulated complexity.
        complexity: u64,
        /// Per-block ceiling.
        limit: u64,
    },

    /// A non-fallible kind reached the fallible handler.
    #[error("transaction kind {0} is not fallible")]
    NotFallible(TxKind),

    /// A bridged transaction whose inner sub-kind cannot be resolved.
    #[error("failed to resolve bridged transaction kind: {0}")]
    UnresolvableBridgedKind(String),

    /// Write failure after validation passed. Internal-invariant severity:
    /// retrying risks double-application, so this is never retried.
    #[error("transaction commitment failed: {0}")]
    Commit(String),

    /// Storage collaborator failure.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Script runtime collaborator failure.
    #[error("script runtime failure: {0}")]
    Runtime(String),

    /// Balance delta arithmetic overflowed.
    #[error("balance diff arithmetic overflow")]
    Overflow,

    /// Entity-level encoding or identity failure.
    #[error(transparent)]
    Types(#[from] TypesError),

    /// Pool-mode wrapper: the candidate is currently invalid, the system
    /// itself is fine. Callers discard the transaction and move on.
    #[error("transaction rejected: {0}")]
    TxRejected(#[source] Box<AppendError>),
}

impl AppendError {
    /// True when the error condemns one transaction rather than signalling
    /// a broken node (storage, runtime, or commit faults).
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            Self::Commit(_) | Self::Storage(_) | Self::Runtime(_)
        )
    }

    /// Wraps a pool-mode failure as a non-fatal informational rejection.
    pub fn into_rejection(self) -> Self {
        match self {
            rejected @ Self::TxRejected(_) => rejected,
            other => Self::TxRejected(Box::new(other)),
        }
    }
}
