//! Per-batch validation context.
//!
//! A block append (or one speculative pool validation) resolves every
//! consensus feature flag exactly once, packs the results into an explicit
//! parameter object, and threads that object through each transaction of
//! the batch. Nothing in the context mutates mid-batch except the shared
//! state-actions counter.

use std::cell::Cell;

use shared_types::{Address, AssetId, BlockHeader, BlockId, BlockInfo, BlockVersion, PublicKey};

use crate::domain::diff::BalanceDiff;
use crate::ports::outbound::TxVerifier;

/// Context for state-dependent transaction checks, built once per block
/// or per pool-validation attempt.
#[derive(Debug, Clone)]
pub struct CheckerInfo {
    /// Timestamp of the block being validated against.
    pub current_timestamp: u64,
    /// Timestamp of its parent, zero at genesis.
    pub parent_timestamp: u64,
    /// Id of the block being validated against.
    pub block_id: BlockId,
    /// Format version of that block.
    pub block_version: BlockVersion,
    /// Chain height of the validation attempt.
    pub height: u64,
    /// Script VM v5 activation state.
    pub vm_v5_activated: bool,
    /// Script VM v6 activation state.
    pub vm_v6_activated: bool,
    /// Reward-distribution activation state.
    pub block_reward_distribution_activated: bool,
}

/// Counter of state-modifying actions issued within one block, shared
/// across the whole batch. Issue-like script actions draw nonces from it.
#[derive(Debug, Default)]
pub struct StateActionsCounter(Cell<u32>);

impl StateActionsCounter {
    /// Creates a fresh counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next action nonce, advancing the counter.
    pub fn next_nonce(&self) -> u32 {
        let n = self.0.get();
        self.0.set(n + 1);
        n
    }

    /// Current value.
    pub fn value(&self) -> u32 {
        self.0.get()
    }
}

/// Everything a single transaction append needs to know about its batch.
pub struct AppendParams<'a> {
    /// State-dependent check context.
    pub checker_info: CheckerInfo,
    /// Script and diff-computation block context.
    pub block_info: BlockInfo,
    /// Header of the block being appended (or the current block when
    /// validating the pool).
    pub block: &'a BlockHeader,
    /// Whether failed exchange/invoke transactions are accepted on-chain.
    pub accept_failed: bool,
    /// Block format v5 activation state (gates modern encoding and
    /// failed-transaction acceptance).
    pub block_v5_activated: bool,
    /// Script VM v5 activation state.
    pub vm_v5_activated: bool,
    /// Script VM v6 activation state.
    pub vm_v6_activated: bool,
    /// Consensus-improvements activation state.
    pub consensus_improvements_activated: bool,
    /// Reward-distribution activation state.
    pub block_reward_distribution_activated: bool,
    /// Invoke-expression activation state.
    pub invoke_expression_activated: bool,
    /// True when admitting a pool candidate, false when confirming a block.
    pub validating_utx: bool,
    /// Shared per-block state-actions counter.
    pub state_actions: &'a StateActionsCounter,
    /// Public key of the generator of the block being appended.
    pub miner_pk: PublicKey,
    /// Verification fan-out; must be present exactly when confirming a
    /// block (`validating_utx == false`).
    pub verifier: Option<&'a dyn TxVerifier>,
}

impl<'a> AppendParams<'a> {
    /// Slim context handed to the script runtime.
    pub fn script_context(&self) -> ScriptContext<'_> {
        ScriptContext {
            block_info: &self.block_info,
            block_id: self.checker_info.block_id,
            height: self.checker_info.height,
            accept_failed: self.accept_failed,
            validating_utx: self.validating_utx,
            vm_v5_activated: self.vm_v5_activated,
            vm_v6_activated: self.vm_v6_activated,
            consensus_improvements_activated: self.consensus_improvements_activated,
            block_reward_distribution_activated: self.block_reward_distribution_activated,
            state_actions: self.state_actions,
        }
    }
}

/// Context passed into every script execution.
pub struct ScriptContext<'a> {
    /// Block the script runs against.
    pub block_info: &'a BlockInfo,
    /// Id of that block.
    pub block_id: BlockId,
    /// Chain height.
    pub height: u64,
    /// Whether failed transactions are accepted.
    pub accept_failed: bool,
    /// Pool-admission mode flag.
    pub validating_utx: bool,
    /// Script VM v5 activation state.
    pub vm_v5_activated: bool,
    /// Script VM v6 activation state.
    pub vm_v6_activated: bool,
    /// Consensus-improvements activation state.
    pub consensus_improvements_activated: bool,
    /// Reward-distribution activation state.
    pub block_reward_distribution_activated: bool,
    /// Shared per-block state-actions counter.
    pub state_actions: &'a StateActionsCounter,
}

/// Extra context for the fallible (exchange/invoke) path.
pub struct FallibleInfo<'a> {
    /// The batch context.
    pub params: &'a AppendParams<'a>,
    /// Whether the sender account carries a verifier script.
    pub sender_scripted: bool,
    /// Resolved sender address.
    pub sender_address: Address,
    /// Accept-failed flag for this attempt; the exchange handler forces it
    /// off while block format v5 is inactive.
    pub accept_failed: bool,
    /// Resolved sub-kind for bridged transactions.
    pub bridged_kind: Option<BridgedKind>,
}

/// Resolved inner sub-kind of a bridged transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgedKind {
    /// Plain native-token transfer.
    Transfer,
    /// Transfer of an issued asset through its bridge contract.
    AssetTransfer(AssetId),
    /// D-app invocation.
    Invoke,
}

/// Data extracted by the state-dependent checker.
#[derive(Debug, Clone, Default)]
pub struct CheckerData {
    /// Scripted assets touched by the transaction, in check order.
    pub smart_assets: Vec<AssetId>,
}

/// The attempted effect of one transaction.
///
/// `status == false` marks a failed-but-recorded outcome: the transaction
/// still occupies its id slot and consumes its fee, but carries no payload
/// effects. Only the fallible kinds ever produce it.
#[derive(Debug)]
pub struct ApplicationResult {
    /// True for a fully applied transaction.
    pub status: bool,
    /// Script runs consumed by this transaction.
    pub script_runs: u64,
    /// Balance changes to commit.
    pub changes: BalanceDiff,
    /// Checker output carried through to commit.
    pub checker_data: CheckerData,
}

impl ApplicationResult {
    /// A successful application.
    pub fn succeeded(script_runs: u64, changes: BalanceDiff, checker_data: CheckerData) -> Self {
        Self {
            status: true,
            script_runs,
            changes,
            checker_data,
        }
    }

    /// A failed-but-recorded application (fee-only changes).
    pub fn failed(script_runs: u64, changes: BalanceDiff, checker_data: CheckerData) -> Self {
        Self {
            status: false,
            script_runs,
            changes,
            checker_data,
        }
    }
}

/// Result of one account/order/asset script execution.
#[derive(Debug, Clone, Copy)]
pub struct ScriptExecution {
    /// Script verdict.
    pub passed: bool,
    /// Computational cost consumed.
    pub complexity: u64,
}

/// Result of an invocation applied by the script VM.
#[derive(Debug, Clone, Default)]
pub struct InvocationResult {
    /// Computational cost consumed by the invocation.
    pub complexity: u64,
    /// Number of state actions the invocation issued.
    pub state_actions: u32,
}
