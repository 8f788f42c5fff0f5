//! # Transaction-Appending Pipeline
//!
//! Decides, transaction by transaction and block by block, whether a
//! transaction is valid against current chain state, computes its balance
//! effects, orchestrates account/asset/invoke script execution, and
//! commits the result: durably to the chain, or speculatively to the
//! unconfirmed-transaction pool.
//!
//! ## Entry Points
//!
//! | Call | Mode | Commit target |
//! |------|------|---------------|
//! | [`TxAppender::append_block`] | block confirmation | durable storage |
//! | [`TxAppender::validate_next_tx`] | pool admission | in-memory pool |
//! | [`TxAppender::reset`] | batch boundary | — |
//!
//! Both entry points funnel through one dispatch core, so pool admission
//! and block confirmation can never diverge in verdict for the same
//! transaction against the same state.
//!
//! ## Key Invariants
//!
//! 1. **Id uniqueness**: no two applied transactions ever share an id
//!    (two narrow historical exceptions are preserved as chain data).
//! 2. **Ordered accumulation**: diffs apply in block order; each
//!    transaction validates against all earlier diffs of its batch.
//! 3. **No negative balances**: a committed diff never drives any
//!    account's effective balance below zero.
//! 4. **Counter discipline**: script-run and complexity counters are
//!    monotonic within a block and reset exactly once per batch.
//! 5. **Failed-but-recorded**: a failed fallible transaction consumes its
//!    id slot and fee but applies no payload effects.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  adapters/ - in-memory storage, verification worker pool    │
//! └─────────────────────────────────────────────────────────────┘
//!                        ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ports/inbound.rs  - AppendApi                              │
//! │  ports/outbound.rs - Storage, FeatureOracle, ScriptRuntime, │
//! │                      AddressIndex, TxVerifier               │
//! └─────────────────────────────────────────────────────────────┘
//!                        ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────┐
//! │  domain/ - appender, checker, diff engine, differ,          │
//! │            duplicates, fallible handler, script gateway     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! Transactions within a batch are processed strictly sequentially;
//! later transactions' validity depends on earlier ones' balance effects.
//! Only block-mode signature verification is parallel, fanned out to
//! [`adapters::VerifierPool`]; those checks are pure per-transaction
//! functions. The caller serializes access to the pipeline object itself.

#![warn(missing_docs)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;

mod error;

pub use config::ChainParameters;
pub use domain::{AppendBlockParams, TxAppender};
pub use error::{AppendError, Result};
pub use ports::{AddressIndex, AppendApi, FeatureOracle, ScriptRuntime, Storage, TxVerifier};
