//! Fallible-transaction handling.
//!
//! Exchange and invoke-style transactions are the only kinds that may be
//! recorded on-chain as failed yet fee-consuming. This module implements
//! their handlers: account and order scripts stay hard failures, asset
//! scripts and balance insufficiency downgrade to a failed-but-recorded
//! outcome once the accept-failed rules are in force.

use shared_types::{Feature, Transaction, TxKind, TxPayload};

use crate::domain::appender::TxAppender;
use crate::domain::context::{
    ApplicationResult, BridgedKind, FallibleInfo, InvocationResult,
};
use crate::error::{AppendError, Result};
use crate::ports::outbound::{FeatureOracle, ScriptRuntime, Storage};

impl<S, F, R> TxAppender<S, F, R>
where
    S: Storage,
    F: FeatureOracle,
    R: ScriptRuntime,
{
    /// Fee-sufficiency pre-check: under accept-failed, the fee must be
    /// payable even when the transaction later fails, so an insufficient
    /// fee is a hard reject.
    pub(crate) fn check_tx_fees(&self, tx: &Transaction, info: &FallibleInfo<'_>) -> Result<()> {
        match tx.kind() {
            TxKind::Exchange
            | TxKind::InvokeScript
            | TxKind::InvokeExpression
            | TxKind::Bridged => {}
            other => return Err(AppendError::NotFallible(other)),
        }
        let dctx = self.differ_context(info.params)?;
        let fee_diff = self.differ.fee_validation_diff(tx, &dctx)?;
        self.diff_applier
            .validate_tx_diff(&self.storage, &fee_diff, &self.diff_stor)
    }

    /// Run-count quirk of exchange transactions: before d-apps activation
    /// no runs are counted at all, even for scripts that executed.
    /// Historical chain data depends on this.
    fn count_exchange_script_runs(&self, runs: u64) -> Result<u64> {
        if !self.features.is_activated(Feature::DApps)? {
            return Ok(0);
        }
        Ok(runs)
    }

    pub(crate) fn handle_exchange(
        &mut self,
        tx: &Transaction,
        info: &FallibleInfo<'_>,
    ) -> Result<ApplicationResult> {
        let TxPayload::Exchange(ex) = &tx.payload else {
            return Err(AppendError::NotFallible(tx.kind()));
        };
        // Failed transactions are never accepted before block format v5.
        let accept_failed = info.params.block_v5_activated && info.accept_failed;
        let ctx = info.params.script_context();
        let mut script_runs = 0u64;

        // Accounts and orders scripts first; these must not fail.
        if info.sender_scripted {
            self.scripts
                .call_account_script_tx(&info.sender_address, tx, &ctx)?;
            script_runs += 1;
        }
        if self.features.is_activated(Feature::SmartAccountTrading)? {
            let order1_sender = ex.order1.sender_address(self.params.scheme);
            if self.storage.account_has_verifier(&order1_sender)? {
                self.scripts
                    .call_account_script_order(&order1_sender, &ex.order1, &ctx)
                    .map_err(|e| {
                        AppendError::ScriptFailure(format!("script failure on first order: {e}"))
                    })?;
                script_runs += 1;
            }
            let order2_sender = ex.order2.sender_address(self.params.scheme);
            if self.storage.account_has_verifier(&order2_sender)? {
                self.scripts
                    .call_account_script_order(&order2_sender, &ex.order2, &ctx)
                    .map_err(|e| {
                        AppendError::ScriptFailure(format!("script failure on second order: {e}"))
                    })?;
                script_runs += 1;
            }
        }

        // Validate against state and extract smart assets.
        let checker_data = self.checker.check_tx(
            &self.storage,
            tx,
            &info.params.checker_info,
            info.params.invoke_expression_activated,
        )?;
        script_runs += checker_data.smart_assets.len() as u64;
        let script_runs = self.count_exchange_script_runs(script_runs)?;

        // Balance changes for both outcomes.
        let dctx = self.differ_context(info.params)?;
        let failed_changes = self.differ.failed_diff(tx, &dctx)?;
        let successful_changes = self.differ.create_diff(tx, &dctx, None)?;

        let smart_assets = checker_data.smart_assets.clone();
        for asset in &smart_assets {
            match self.scripts.call_asset_script(asset, tx, &ctx) {
                Err(err) => {
                    if !accept_failed {
                        return Err(err);
                    }
                    return Ok(ApplicationResult::failed(
                        script_runs,
                        failed_changes,
                        checker_data,
                    ));
                }
                Ok(exec) if !exec.passed => {
                    if !accept_failed {
                        return Err(AppendError::ScriptFailure(format!(
                            "negative asset script result for {asset}"
                        )));
                    }
                    return Ok(ApplicationResult::failed(
                        script_runs,
                        failed_changes,
                        checker_data,
                    ));
                }
                Ok(_) => {}
            }
        }
        if accept_failed {
            // The failed diff was already covered by the fee pre-check;
            // only the successful diff needs a balance check here. Not
            // enough balance means fail, not abort.
            if self
                .diff_applier
                .validate_tx_diff(&self.storage, &successful_changes, &self.diff_stor)
                .is_err()
            {
                return Ok(ApplicationResult::failed(
                    script_runs,
                    failed_changes,
                    checker_data,
                ));
            }
        }
        Ok(ApplicationResult::succeeded(
            script_runs,
            successful_changes,
            checker_data,
        ))
    }

    pub(crate) fn handle_invoke(
        &mut self,
        tx: &Transaction,
        info: &FallibleInfo<'_>,
    ) -> Result<(InvocationResult, ApplicationResult)> {
        match tx.kind() {
            TxKind::InvokeScript | TxKind::InvokeExpression => {}
            TxKind::Bridged if info.bridged_kind == Some(BridgedKind::Invoke) => {}
            other => return Err(AppendError::NotFallible(other)),
        }
        // State-dependent checks (activation gates, recipient scheme,
        // timestamps) run here; payload semantics belong to the VM.
        self.checker.check_tx(
            &self.storage,
            tx,
            &info.params.checker_info,
            info.params.invoke_expression_activated,
        )?;
        let ctx = info.params.script_context();
        self.scripts.apply_invoke(tx, &ctx).map_err(|err| {
            if let Ok(id) = tx.id() {
                tracing::debug!(tx = %id, %err, "failed to apply invoke transaction to state");
            }
            err
        })
    }

    pub(crate) fn handle_fallible(
        &mut self,
        tx: &Transaction,
        info: &FallibleInfo<'_>,
    ) -> Result<(Option<InvocationResult>, ApplicationResult)> {
        if info.accept_failed {
            self.check_tx_fees(tx, info)?;
        }
        match tx.kind() {
            TxKind::InvokeScript | TxKind::InvokeExpression | TxKind::Bridged => {
                let (invocation, application) = self.handle_invoke(tx, info)?;
                Ok((Some(invocation), application))
            }
            TxKind::Exchange => {
                let application = self.handle_exchange(tx, info)?;
                Ok((None, application))
            }
            other => Err(AppendError::NotFallible(other)),
        }
    }

    pub(crate) fn handle_invoke_or_exchange(
        &mut self,
        tx: &Transaction,
        info: &FallibleInfo<'_>,
    ) -> Result<(Option<InvocationResult>, ApplicationResult)> {
        self.handle_fallible(tx, info).map_err(|err| {
            if let Ok(id) = tx.id() {
                tracing::debug!(tx = %id, %err, "fallible validation failed");
            }
            err
        })
    }
}
