//! Error types for chain primitives.

use thiserror::Error;

/// Errors raised while encoding, identifying, or verifying entities.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Canonical encoding failed.
    #[error("canonical encoding failed: {0}")]
    Encode(String),

    /// Signature bytes do not form a valid Ed25519 signature, or the
    /// signature does not verify against the sender key.
    #[error("signature verification failed")]
    BadSignature,

    /// Public key bytes do not decode to a valid Ed25519 point.
    #[error("malformed public key")]
    BadPublicKey,

    /// An address declared for another chain scheme was used locally.
    #[error("address scheme mismatch: declared {declared:#04x}, local {local:#04x}")]
    SchemeMismatch {
        /// Scheme byte the address was minted for.
        declared: u8,
        /// Scheme byte of this chain.
        local: u8,
    },

    /// Structural validation of a transaction or order failed.
    #[error("invalid {entity}: {reason}")]
    InvalidStructure {
        /// What was being validated.
        entity: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl TypesError {
    pub(crate) fn structure(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidStructure {
            entity,
            reason: reason.into(),
        }
    }
}
