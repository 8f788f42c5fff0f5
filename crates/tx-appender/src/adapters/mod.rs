//! Adapters: concrete implementations of the outbound ports.

pub mod memory;
pub mod verifier;

pub use memory::{FeatureSchedule, MemoryStorage};
pub use verifier::{SyncVerifier, VerifierHandle, VerifierPool};
