//! Chain parameters.
//!
//! Everything here is consensus-critical configuration resolved once at
//! node start and treated as immutable: the address scheme byte, the
//! historical alias-duplication window, and the block reward.

use serde::{Deserialize, Serialize};

/// Static parameters of the chain this node validates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainParameters {
    /// Address scheme byte; binds addresses and bridged transactions to
    /// this chain.
    pub scheme: u8,
    /// Start of the historical window (block timestamps, inclusive) in
    /// which alias registrations with duplicate ids are tolerated.
    ///
    /// Early mainnet blocks contain such duplicates; rejecting them now
    /// would make the historical chain unreplayable.
    pub alias_window_start: u64,
    /// End of the alias-duplication window (inclusive).
    pub alias_window_end: u64,
    /// Per-block generator reward in native-token units, credited once
    /// the reward-distribution feature is active.
    pub block_reward: u64,
}

impl ChainParameters {
    /// Mainnet parameters.
    pub fn mainnet() -> Self {
        Self {
            scheme: b'L',
            alias_window_start: 1_522_463_241_035,
            alias_window_end: 1_530_161_445_559,
            block_reward: 600_000_000,
        }
    }

    /// Parameters for an isolated test chain: distinct scheme byte and a
    /// closed alias window.
    pub fn custom(scheme: u8) -> Self {
        Self {
            scheme,
            alias_window_start: 0,
            alias_window_end: 0,
            block_reward: 600_000_000,
        }
    }
}
