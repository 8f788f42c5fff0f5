//! # Shared Types
//!
//! Chain primitives shared by every crate in the workspace: identifiers,
//! keys and signatures, block entities, consensus feature switches, and
//! the closed transaction enumeration with its kind-specific payloads.
//!
//! ## Module Structure
//!
//! - [`entities`]: hashes, addresses, asset/block/transaction ids, blocks
//! - [`tx`]: transactions, payloads, orders, canonical encoding, signing
//! - [`features`]: consensus feature identifiers
//! - [`errors`]: entity-level error type

pub mod entities;
pub mod errors;
pub mod features;
pub mod tx;

pub use entities::{
    Address, AssetId, BlockHeader, BlockId, BlockInfo, BlockVersion, Hash, PublicKey, Signature,
    TxId,
};
pub use errors::TypesError;
pub use features::Feature;
pub use tx::{
    BridgedTransaction, ExchangeData, InvokePayment, Order, OrderSide, Transaction, TxKind,
    TxPayload, MODERN_TX_VERSION, PRICE_SCALE,
};
