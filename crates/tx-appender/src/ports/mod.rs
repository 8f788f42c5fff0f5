//! Hexagonal ports: the pipeline's driving API and driven collaborators.

pub mod inbound;
pub mod outbound;

pub use inbound::AppendApi;
pub use outbound::{AddressIndex, FeatureOracle, ScriptRuntime, Storage, TxVerifier};
