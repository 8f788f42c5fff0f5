//! Signature and structural verification.
//!
//! Pure per-transaction checks: structural validity of the envelope and
//! payload, the transaction's own Ed25519 signature, and the signatures of
//! embedded exchange orders. Pure means no chain state is consulted, which
//! is what makes the block-mode fan-out safe to parallelize.

use shared_types::{Transaction, TxPayload};

use crate::error::{AppendError, Result};

/// One unit of verification work.
///
/// The flags encode which signatures actually need checking: an account
/// controlled by a verifier script authorizes through the script instead
/// of a signature, so its check is skipped.
#[derive(Debug, Clone)]
pub struct VerifyTask {
    /// Transaction to verify.
    pub tx: Transaction,
    /// Check the transaction's own signature.
    pub check_tx_sig: bool,
    /// Check the first embedded order's signature (exchange only).
    pub check_order1: bool,
    /// Check the second embedded order's signature (exchange only).
    pub check_order2: bool,
}

/// Runs the structural and signature checks a task asks for.
pub fn check_transaction(task: &VerifyTask) -> Result<()> {
    task.tx
        .validate()
        .map_err(|e| AppendError::VerificationFailed(e.to_string()))?;
    if task.check_tx_sig {
        task.tx
            .verify_signature()
            .map_err(|e| AppendError::VerificationFailed(e.to_string()))?;
    }
    if let TxPayload::Exchange(ex) = &task.tx.payload {
        if task.check_order1 {
            ex.order1
                .verify_signature()
                .map_err(|e| AppendError::VerificationFailed(format!("first order: {e}")))?;
        }
        if task.check_order2 {
            ex.order2
                .verify_signature()
                .map_err(|e| AppendError::VerificationFailed(format!("second order: {e}")))?;
        }
    }
    Ok(())
}
