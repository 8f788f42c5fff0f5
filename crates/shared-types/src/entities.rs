//! # Core Chain Primitives
//!
//! Defines the primitive identifiers and block-level entities shared by
//! every crate in the workspace.
//!
//! ## Clusters
//!
//! - **Identifiers**: `Hash`, `TxId`, `AssetId`, `BlockId`, `Address`
//! - **Keys & Signatures**: `PublicKey`, `Signature`
//! - **Blocks**: `BlockHeader`, `BlockInfo`, `BlockVersion`

use serde::{Deserialize, Serialize};

use crate::errors::TypesError;

/// A 32-byte hash (SHA-256).
pub type Hash = [u8; 32];

/// A 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// Content-derived transaction identifier.
///
/// Computed as the SHA-256 digest of the transaction's canonical unsigned
/// encoding. Uniqueness of this value across the whole chain is a hard
/// invariant enforced by the appending pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(pub Hash);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_hex(f, &self.0)
    }
}

/// Identifier of an issued asset (the id of its issue transaction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub Hash);

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_hex(f, &self.0)
    }
}

/// Block identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct BlockId(pub Hash);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_hex(f, &self.0)
    }
}

fn write_hex(f: &mut std::fmt::Formatter<'_>, bytes: &[u8]) -> std::fmt::Result {
    for b in bytes {
        write!(f, "{b:02x}")?;
    }
    Ok(())
}

/// An account address: a chain-scheme byte plus a 20-byte key hash.
///
/// The scheme byte binds an address to one chain; translating a foreign
/// address into the local scheme is fallible and must be checked wherever
/// an address crosses a chain boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    /// Chain scheme byte this address belongs to.
    pub scheme: u8,
    /// Keccak-256 derived key hash (last 20 bytes).
    pub hash: [u8; 20],
}

impl Address {
    /// Derives the address of a public key under the given chain scheme.
    pub fn from_public_key(scheme: u8, pk: &PublicKey) -> Self {
        use sha3::{Digest, Keccak256};

        let digest = Keccak256::digest(pk);
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&digest[12..]);
        Self { scheme, hash }
    }

    /// Re-binds an externally supplied key hash to the local chain scheme.
    ///
    /// Fails when the declared scheme does not match: an address minted for
    /// another chain must never be silently accepted here.
    pub fn translate(declared_scheme: u8, hash: [u8; 20], local_scheme: u8) -> Result<Self, TypesError> {
        if declared_scheme != local_scheme {
            return Err(TypesError::SchemeMismatch {
                declared: declared_scheme,
                local: local_scheme,
            });
        }
        Ok(Self {
            scheme: local_scheme,
            hash,
        })
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02x}:", self.scheme)?;
        write_hex(f, &self.hash)
    }
}

/// Block format version. Format v5 introduces the modern wire encoding
/// for transactions and failed-transaction recording.
pub type BlockVersion = u8;

/// The header of a block.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Block format version.
    pub version: BlockVersion,
    /// Block identifier.
    pub id: BlockId,
    /// Hash of the parent block.
    pub parent_id: BlockId,
    /// Unix timestamp (milliseconds) when the block was generated.
    pub timestamp: u64,
    /// Public key of the block generator (miner).
    pub generator: PublicKey,
}

/// Resolved information about a block at a given height, used as script
/// and diff-computation context.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BlockInfo {
    /// Chain height of the block.
    pub height: u64,
    /// Block timestamp (milliseconds).
    pub timestamp: u64,
    /// Generator public key.
    pub generator: PublicKey,
}
