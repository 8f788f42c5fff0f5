//! Consensus feature switches.
//!
//! Validation rules change at chain-height-gated activation points. Every
//! rule change is keyed by one of these identifiers; the activation state
//! is resolved through the feature oracle once per block or pool-validation
//! attempt and threaded through the pipeline as plain booleans.

use serde::{Deserialize, Serialize};

/// Chain-wide consensus feature identifiers.
///
/// The numeric values are part of consensus (they appear in activation
/// votes recorded on-chain) and must never be reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum Feature {
    /// Account verifier scripts; also introduces the script-runs-per-block
    /// ceiling.
    SmartAccounts = 4,
    /// Order placement by script-controlled accounts.
    SmartAccountTrading = 5,
    /// Decentralized applications: invokable scripts and smart assets.
    /// Switches limit enforcement from run counting to complexity.
    DApps = 11,
    /// Block format v5: modern transaction wire encoding and recording of
    /// failed-but-accepted transactions.
    BlockV5 = 15,
    /// Script VM version 5; raises the per-block complexity ceiling.
    ScriptVmV5 = 16,
    /// Script VM version 6; turns the complexity ceiling from a warning
    /// into a hard rejection.
    ScriptVmV6 = 17,
    /// Assorted consensus tightenings threaded into script context.
    ConsensusImprovements = 18,
    /// Block reward distribution between generator and beneficiaries;
    /// also gates bridged sub-kind resolution rules.
    BlockRewardDistribution = 19,
    /// One-shot expression invocation transactions.
    InvokeExpression = 20,
    /// Split of block fees between consecutive generators (40/60).
    NgFeeDistribution = 2,
}

impl Feature {
    /// Numeric consensus identifier.
    pub fn id(self) -> u16 {
        self as u16
    }
}
