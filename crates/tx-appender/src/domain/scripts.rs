//! Script invocation gateway.
//!
//! [`ScriptCaller`] is the single doorway to the script VM. It owns the
//! two complexity accumulators: the cost of the transaction currently
//! being validated (`recent`) and the committed block total. A
//! transaction's cost folds into the block total only when the
//! transaction commits; an aborted transaction's cost is discarded.
//!
//! Limit enforcement has two eras. Before d-apps, blocks are limited by a
//! simple script-run count. After d-apps, the limit is cumulative
//! complexity with two tiers: warn-only until script VM v6 activates,
//! hard rejection after.

use shared_types::{Address, AssetId, BlockId, Feature, Order, Transaction};

use crate::domain::context::{ApplicationResult, InvocationResult, ScriptContext, ScriptExecution};
use crate::error::{AppendError, Result};
use crate::ports::outbound::{FeatureOracle, ScriptRuntime};

/// Script runs allowed per block before complexity limiting takes over.
pub const MAX_SCRIPT_RUNS_IN_BLOCK: u64 = 100;

/// Complexity ceiling per block.
pub const MAX_COMPLEXITY_IN_BLOCK: u64 = 1_000_000;

/// Complexity ceiling per block once script VM v5 is active.
pub const MAX_COMPLEXITY_IN_BLOCK_VM_V5: u64 = 2_500_000;

/// Complexity ceiling for the given VM era.
pub fn max_complexity_in_block(vm_v5_activated: bool) -> u64 {
    if vm_v5_activated {
        MAX_COMPLEXITY_IN_BLOCK_VM_V5
    } else {
        MAX_COMPLEXITY_IN_BLOCK
    }
}

/// Gateway to the script VM with complexity accounting.
#[derive(Debug)]
pub struct ScriptCaller<R> {
    runtime: R,
    total_complexity: u64,
    recent_complexity: u64,
}

impl<R: ScriptRuntime> ScriptCaller<R> {
    /// Wraps a script runtime.
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            total_complexity: 0,
            recent_complexity: 0,
        }
    }

    /// Runs the sender's verifier script against a transaction. A negative
    /// verdict is a hard failure: verifier scripts cannot fail softly.
    pub fn call_account_script_tx(
        &mut self,
        account: &Address,
        tx: &Transaction,
        ctx: &ScriptContext<'_>,
    ) -> Result<()> {
        let exec = self.runtime.run_account_script_tx(account, tx, ctx)?;
        self.recent_complexity += exec.complexity;
        if !exec.passed {
            return Err(AppendError::ScriptFailure(format!(
                "account script rejected transaction from {account}"
            )));
        }
        Ok(())
    }

    /// Runs an order placer's verifier script against the order.
    pub fn call_account_script_order(
        &mut self,
        account: &Address,
        order: &Order,
        ctx: &ScriptContext<'_>,
    ) -> Result<()> {
        let exec = self.runtime.run_account_script_order(account, order, ctx)?;
        self.recent_complexity += exec.complexity;
        if !exec.passed {
            return Err(AppendError::ScriptFailure(format!(
                "account script rejected order from {account}"
            )));
        }
        Ok(())
    }

    /// Runs an asset's script. The verdict is returned to the caller: in
    /// the fallible path a negative result downgrades to a failed
    /// application instead of aborting.
    pub fn call_asset_script(
        &mut self,
        asset: &AssetId,
        tx: &Transaction,
        ctx: &ScriptContext<'_>,
    ) -> Result<ScriptExecution> {
        let exec = self.runtime.run_asset_script(asset, tx, ctx)?;
        self.recent_complexity += exec.complexity;
        Ok(exec)
    }

    /// Applies an invoke-style transaction through the VM.
    pub fn apply_invoke(
        &mut self,
        tx: &Transaction,
        ctx: &ScriptContext<'_>,
    ) -> Result<(InvocationResult, ApplicationResult)> {
        let (invocation, application) = self.runtime.apply_invoke(tx, ctx)?;
        self.recent_complexity += invocation.complexity;
        Ok((invocation, application))
    }

    /// Folds the current transaction's cost into the block total. Called
    /// exactly once per committed transaction.
    pub fn commit_recent_complexity(&mut self) {
        self.total_complexity += self.recent_complexity;
        self.recent_complexity = 0;
    }

    /// Discards the current transaction's cost (transaction aborted).
    pub fn discard_recent_complexity(&mut self) {
        self.recent_complexity = 0;
    }

    /// Resets both accumulators at a block boundary.
    pub fn reset_complexity(&mut self) {
        self.total_complexity = 0;
        self.recent_complexity = 0;
    }

    /// Committed complexity of the current block. Does not include the
    /// not-yet-committed transaction's cost.
    pub fn total_complexity(&self) -> u64 {
        self.total_complexity
    }
}

/// Enforces per-block script limits against the running totals.
///
/// `script_runs` must already include the candidate transaction's runs.
/// `total_complexity` is the committed block total: the candidate's own
/// cost joins it only at commit, so the complexity tier always lags one
/// transaction.
pub fn check_scripts_limits<F: FeatureOracle + ?Sized>(
    features: &F,
    total_complexity: u64,
    script_runs: u64,
    block_id: BlockId,
) -> Result<()> {
    let smart_accounts = features.is_activated(Feature::SmartAccounts)?;
    let dapps = features.is_activated(Feature::DApps)?;
    if dapps {
        let vm_v5 = features.is_activated(Feature::ScriptVmV5)?;
        let limit = max_complexity_in_block(vm_v5);
        if total_complexity > limit {
            if features.is_activated(Feature::ScriptVmV6)? {
                return Err(AppendError::ComplexityExceeded {
                    block: block_id,
                    complexity: total_complexity,
                    limit,
                });
            }
            tracing::warn!(
                complexity = total_complexity,
                limit,
                block = %block_id,
                "complexity of scripts in block exceeds limit"
            );
        }
        return Ok(());
    }
    if smart_accounts && script_runs > MAX_SCRIPT_RUNS_IN_BLOCK {
        return Err(AppendError::ScriptRunsExceeded {
            runs: script_runs,
            limit: MAX_SCRIPT_RUNS_IN_BLOCK,
        });
    }
    Ok(())
}
