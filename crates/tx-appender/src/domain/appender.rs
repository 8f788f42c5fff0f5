//! # Block/Pool Appender
//!
//! [`TxAppender`] is the orchestrator of the appending pipeline. Its two
//! public entry points, [`TxAppender::append_block`] for confirming a
//! block and [`TxAppender::validate_next_tx`] for speculative pool
//! admission, funnel through the same per-transaction dispatch core,
//! `append_tx`. That identity is the component's core correctness
//! property: pool admission and block confirmation must never diverge in
//! verdict for the same transaction against the same chain state.
//!
//! ## Per-transaction state machine
//!
//! 1. Reject modern-encoding transactions before block format v5.
//! 2. Reject duplicate ids (recent set, then durable storage).
//! 3. Resolve the sender address; reject on scheme-translation failure.
//! 4. Look up whether the sender carries a verifier script.
//! 5. Verify signature/structure: inline in pool mode, fanned out to the
//!    verification pool in block mode; the signature check is skipped for
//!    script-controlled accounts.
//! 6. Dispatch by kind: fallible path for exchange/invoke, sub-kind
//!    resolution then the matching path for bridged, default path
//!    otherwise.
//! 7. Validate the resulting diff for negative balances where the
//!    fallible path has not already done so.
//! 8. Enforce script-run/complexity limits against the block totals.
//! 9. Commit: record the id, fold counters, save the diff, write the
//!    transaction (durable or pool).
//! 10. Record address→transaction index entries (block mode, if enabled).
//!
//! Failures at steps 1–6 abort the append with no partial state; the
//! fallible path converts specific later failures into failed-but-recorded
//! outcomes instead.
//!
//! All per-batch mutable state (recent ids, diff working set, script
//! counters) lives on this object and is confined to a single append
//! call; the caller serializes access.

use shared_types::{
    BlockHeader, BlockInfo, BlockVersion, Feature, Transaction, TxKind, TxPayload,
};

use crate::config::ChainParameters;
use crate::domain::checker::{self, TransactionChecker};
use crate::domain::context::{
    AppendParams, ApplicationResult, BridgedKind, CheckerData, CheckerInfo, FallibleInfo,
    StateActionsCounter,
};
use crate::domain::diff::{DiffApplier, DiffStorage};
use crate::domain::differ::{BlockDiffer, DifferContext, TransactionDiffer};
use crate::domain::duplicates::{self, RecentIds};
use crate::domain::scripts::{self, ScriptCaller};
use crate::domain::verify::{self, VerifyTask};
use crate::error::{AppendError, Result};
use crate::ports::inbound::AppendApi;
use crate::ports::outbound::{AddressIndex, FeatureOracle, ScriptRuntime, Storage, TxVerifier};

/// Parameters of one block append.
pub struct AppendBlockParams<'a> {
    /// Block body, in consensus order.
    pub transactions: &'a [Transaction],
    /// Header of the block being appended.
    pub block: &'a BlockHeader,
    /// Parent header, absent at genesis.
    pub parent: Option<&'a BlockHeader>,
    /// Height the block lands at.
    pub height: u64,
    /// Verification fan-out for this block.
    pub verifier: &'a dyn TxVerifier,
}

/// The transaction-appending pipeline.
pub struct TxAppender<S, F, R> {
    pub(crate) storage: S,
    pub(crate) features: F,
    pub(crate) scripts: ScriptCaller<R>,
    pub(crate) address_index: Option<Box<dyn AddressIndex>>,
    pub(crate) params: ChainParameters,
    pub(crate) checker: TransactionChecker,
    pub(crate) differ: TransactionDiffer,
    pub(crate) block_differ: BlockDiffer,
    pub(crate) diff_stor: DiffStorage,
    pub(crate) diff_applier: DiffApplier,
    pub(crate) recent_ids: RecentIds,
    pub(crate) total_script_runs: u64,
}

impl<S, F, R> TxAppender<S, F, R>
where
    S: Storage,
    F: FeatureOracle,
    R: ScriptRuntime,
{
    /// Assembles a pipeline over its collaborators.
    pub fn new(storage: S, features: F, runtime: R, params: ChainParameters) -> Self {
        let scheme = params.scheme;
        let block_reward = params.block_reward;
        Self {
            storage,
            features,
            scripts: ScriptCaller::new(runtime),
            address_index: None,
            checker: TransactionChecker::new(scheme),
            differ: TransactionDiffer::new(scheme),
            block_differ: BlockDiffer::new(scheme, block_reward),
            diff_stor: DiffStorage::new(),
            diff_applier: DiffApplier,
            recent_ids: RecentIds::new(),
            total_script_runs: 0,
            params,
        }
    }

    /// Enables address→transaction index recording.
    pub fn with_address_index(mut self, index: Box<dyn AddressIndex>) -> Self {
        self.address_index = Some(index);
        self
    }

    /// Shared view of the storage collaborator.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutable view of the storage collaborator; callers use this between
    /// appends for setup, never during one.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Mutable view of the feature oracle.
    pub fn features_mut(&mut self) -> &mut F {
        &mut self.features
    }

    /// Script runs committed in the current block so far.
    pub fn total_script_runs(&self) -> u64 {
        self.total_script_runs
    }

    /// Ids committed in the current batch.
    pub fn recent_ids(&self) -> &RecentIds {
        &self.recent_ids
    }

    pub(crate) fn differ_context(&self, params: &AppendParams<'_>) -> Result<DifferContext> {
        Ok(DifferContext {
            miner: params.miner_pk,
            ng_active: self.features.is_activated(Feature::NgFeeDistribution)?,
        })
    }

    fn order_is_scripted(&self, order: &shared_types::Order) -> Result<bool> {
        self.storage
            .account_has_verifier(&order.sender_address(self.params.scheme))
    }

    /// The last stable block, which stands in for the block currently
    /// being built during pool validation.
    fn current_block_header(&self) -> Result<BlockHeader> {
        self.storage
            .block_header_at(self.storage.adding_block_height())
    }

    fn current_block_info(&self) -> Result<BlockInfo> {
        self.storage
            .block_info_at(self.storage.adding_block_height())
    }

    fn check_modern_encoding(&self, tx: &Transaction, block_v5_activated: bool) -> Result<()> {
        if !tx.uses_modern_encoding() || block_v5_activated {
            return Ok(());
        }
        Err(AppendError::UnsupportedVersion {
            version: tx.version,
        })
    }

    /// Which embedded order signatures need checking: a script-controlled
    /// order account authorizes through its script instead.
    fn needs_order_sig_checks(&self, tx: &Transaction) -> Result<(bool, bool)> {
        if let TxPayload::Exchange(ex) = &tx.payload {
            let check1 = !self.order_is_scripted(&ex.order1)?;
            let check2 = !self.order_is_scripted(&ex.order2)?;
            return Ok((check1, check2));
        }
        Ok((false, false))
    }

    fn verify_tx_sig_and_data(
        &self,
        tx: &Transaction,
        params: &AppendParams<'_>,
        account_scripted: bool,
    ) -> Result<()> {
        // A verifier script subsumes the sender's signature check.
        let check_tx_sig = !account_scripted;
        let (check_order1, check_order2) = self.needs_order_sig_checks(tx)?;
        let task = VerifyTask {
            tx: tx.clone(),
            check_tx_sig,
            check_order1,
            check_order2,
        };
        if params.validating_utx {
            // Fanning out buys nothing in the pool: each candidate is
            // checked individually anyway.
            return verify::check_transaction(&task);
        }
        let verifier = params.verifier.ok_or_else(|| {
            AppendError::Runtime("verification fan-out is required in block mode".into())
        })?;
        verifier.submit(task)
    }

    /// Script validation for kinds that cannot fail softly.
    fn check_transaction_scripts(
        &mut self,
        tx: &Transaction,
        account_scripted: bool,
        params: &AppendParams<'_>,
    ) -> Result<(u64, CheckerData)> {
        let ctx = params.script_context();
        let mut script_runs = 0u64;
        if account_scripted {
            let sender = tx
                .sender_address(self.params.scheme)
                .map_err(|e| AppendError::InvalidAddress(e.to_string()))?;
            self.scripts.call_account_script_tx(&sender, tx, &ctx)?;
            script_runs += 1;
        }
        let checker_data = self.checker.check_tx(
            &self.storage,
            tx,
            &params.checker_info,
            params.invoke_expression_activated,
        )?;
        let dapps_activated = self.features.is_activated(Feature::DApps)?;
        for asset in &checker_data.smart_assets {
            let exec = self.scripts.call_asset_script(asset, tx, &ctx)?;
            if !exec.passed {
                return Err(AppendError::ScriptFailure(format!(
                    "negative asset script result for {asset}"
                )));
            }
            if tx.kind() == TxKind::SetAssetScript && !dapps_activated {
                // The replaced script's own approving run is not counted
                // before d-apps activation.
                continue;
            }
            script_runs += 1;
        }
        Ok((script_runs, checker_data))
    }

    /// Default path: run scripts, check against state, compute the diff.
    /// Always succeeds or aborts; no failed-but-recorded outcome here.
    fn handle_default_transaction(
        &mut self,
        tx: &Transaction,
        params: &AppendParams<'_>,
        account_scripted: bool,
        bridged_kind: Option<&BridgedKind>,
    ) -> Result<ApplicationResult> {
        let (script_runs, checker_data) =
            self.check_transaction_scripts(tx, account_scripted, params)?;
        let dctx = self.differ_context(params)?;
        let changes = self.differ.create_diff(tx, &dctx, bridged_kind)?;
        Ok(ApplicationResult::succeeded(
            script_runs,
            changes,
            checker_data,
        ))
    }

    /// Commits a validated transaction: id slot, counters, diff, write.
    /// Failure here is an internal-invariant violation (validation
    /// already passed) and is never retried.
    fn commit_tx_application(
        &mut self,
        tx: &Transaction,
        params: &AppendParams<'_>,
        application: &ApplicationResult,
    ) -> Result<()> {
        let id = tx
            .id()
            .map_err(|e| AppendError::Commit(format!("failed to get tx id: {e}")))?;
        self.recent_ids.insert(id);
        self.total_script_runs += application.script_runs;
        self.scripts.commit_recent_complexity();
        self.diff_stor
            .save_diff(&application.changes)
            .map_err(|e| AppendError::Commit(format!("failed to save balance diff: {e}")))?;
        if params.validating_utx {
            self.storage
                .write_transaction_to_mem(tx, !application.status)
                .map_err(|e| {
                    AppendError::Commit(format!("failed to write transaction to in-mem storage: {e}"))
                })?;
        } else {
            self.block_differ
                .count_miner_fee(tx)
                .map_err(|e| AppendError::Commit(format!("failed to count miner fee: {e}")))?;
            self.storage
                .write_transaction(tx, !application.status)
                .map_err(|e| {
                    AppendError::Commit(format!("failed to write transaction to storage: {e}"))
                })?;
        }
        Ok(())
    }

    /// Appends one transaction under an assembled batch context.
    pub fn append_tx(&mut self, tx: &Transaction, params: &AppendParams<'_>) -> Result<()> {
        let result = self.append_tx_inner(tx, params);
        // The transaction's script cost is either already folded into the
        // block total (commit) or dies with the transaction.
        self.scripts.discard_recent_complexity();
        result
    }

    fn append_tx_inner(&mut self, tx: &Transaction, params: &AppendParams<'_>) -> Result<()> {
        let block_id = params.checker_info.block_id;
        self.check_modern_encoding(tx, params.block_v5_activated)?;
        duplicates::check_duplicate(
            &self.storage,
            &self.params,
            tx,
            &self.recent_ids,
            params.block.timestamp,
        )?;
        let sender_address = tx
            .sender_address(self.params.scheme)
            .map_err(|e| AppendError::InvalidAddress(e.to_string()))?;
        let account_scripted = self.storage.account_has_verifier(&sender_address)?;
        self.verify_tx_sig_and_data(tx, params, account_scripted)?;

        let mut invocation = None;
        let (application, validate_balance) = match tx.kind() {
            TxKind::Exchange | TxKind::InvokeScript | TxKind::InvokeExpression => {
                let info = FallibleInfo {
                    params,
                    sender_scripted: account_scripted,
                    sender_address,
                    accept_failed: params.accept_failed,
                    bridged_kind: None,
                };
                let (inv, application) = self.handle_invoke_or_exchange(tx, &info)?;
                invocation = inv;
                // Under accept-failed the fallible path validated balances
                // already; otherwise the pool still checks below.
                (application, params.validating_utx && !params.accept_failed)
            }
            TxKind::Bridged => {
                let TxPayload::Bridged(bridged) = &tx.payload else {
                    return Err(AppendError::UnresolvableBridgedKind(
                        "bridged kind tag without bridged payload".into(),
                    ));
                };
                let kind = checker::resolve_bridged_kind(
                    &self.storage,
                    bridged,
                    self.params.scheme,
                    params.block_reward_distribution_activated,
                )?;
                match kind {
                    BridgedKind::Invoke => {
                        let info = FallibleInfo {
                            params,
                            sender_scripted: account_scripted,
                            sender_address,
                            accept_failed: params.accept_failed,
                            bridged_kind: Some(kind),
                        };
                        let (inv, application) = self.handle_invoke_or_exchange(tx, &info)?;
                        invocation = inv;
                        (application, false)
                    }
                    transfer_kind => {
                        let application = self.handle_default_transaction(
                            tx,
                            params,
                            account_scripted,
                            Some(&transfer_kind),
                        )?;
                        (application, true)
                    }
                }
            }
            _ => {
                let application =
                    self.handle_default_transaction(tx, params, account_scripted, None)?;
                // Non-fallible kinds validate immediately in both modes.
                (application, true)
            }
        };

        if validate_balance {
            self.diff_applier
                .validate_tx_diff(&self.storage, &application.changes, &self.diff_stor)?;
        }
        scripts::check_scripts_limits(
            &self.features,
            self.scripts.total_complexity(),
            self.total_script_runs + application.script_runs,
            block_id,
        )?;
        if let Some(invocation) = &invocation {
            tracing::debug!(
                complexity = invocation.complexity,
                state_actions = invocation.state_actions,
                "invocation applied"
            );
        }

        let tx_id = tx.id()?;
        if let Err(err) = self.commit_tx_application(tx, params, &application) {
            tracing::error!(
                tx = %tx_id,
                %err,
                "failed to commit transaction after successful validation; this should NEVER happen"
            );
            return Err(err);
        }
        if !params.validating_utx {
            if let Some(index) = self.address_index.as_deref_mut() {
                for address in application.changes.addresses() {
                    index.record_tx_for_address(&address, &tx_id, &block_id)?;
                }
            }
        }
        Ok(())
    }

    fn append_block_inner(&mut self, params: &AppendBlockParams<'_>) -> Result<()> {
        let vm_v5_activated = self.features.is_activated(Feature::ScriptVmV5)?;
        let vm_v6_activated = self.features.is_activated(Feature::ScriptVmV6)?;
        let block_reward_distribution_activated = self
            .features
            .is_activated(Feature::BlockRewardDistribution)?;
        let checker_info = CheckerInfo {
            current_timestamp: params.block.timestamp,
            parent_timestamp: params.parent.map(|p| p.timestamp).unwrap_or(0),
            block_id: params.block.id,
            block_version: params.block.version,
            height: params.height,
            vm_v5_activated,
            vm_v6_activated,
            block_reward_distribution_activated,
        };
        let state_actions = StateActionsCounter::new();

        // Seed the working set with the generator's fee/reward diff so the
        // very first transaction already validates against it.
        let miner_diff = self.block_differ.miner_reward_diff(
            &self.storage,
            &self.features,
            params.block,
            params.parent,
        )?;
        self.diff_stor.save_diff(&miner_diff)?;

        let block_info = self.current_block_info()?;
        let block_v5_activated = self.features.is_activated(Feature::BlockV5)?;
        let consensus_improvements_activated = self
            .features
            .is_activated(Feature::ConsensusImprovements)?;
        let invoke_expression_activated =
            self.features.is_activated(Feature::InvokeExpression)?;

        for tx in params.transactions {
            let append_params = AppendParams {
                checker_info: checker_info.clone(),
                block_info: block_info.clone(),
                block: params.block,
                accept_failed: block_v5_activated,
                block_v5_activated,
                vm_v5_activated,
                vm_v6_activated,
                consensus_improvements_activated,
                block_reward_distribution_activated,
                invoke_expression_activated,
                validating_utx: false,
                state_actions: &state_actions,
                miner_pk: params.block.generator,
                verifier: Some(params.verifier),
            };
            self.append_tx(tx, &append_params)?;
        }
        // Persist this block's fee distribution; the next block's
        // generator diff claims its share from it.
        self.block_differ
            .save_cur_fee_distr(&mut self.storage, &params.block.id)
    }

    /// Validates and commits every transaction of a block in strict
    /// order, aborting the whole block on the first error. Counters reset
    /// on exit either way.
    #[tracing::instrument(skip_all, fields(block = %params.block.id, txs = params.transactions.len()))]
    pub fn append_block(&mut self, params: AppendBlockParams<'_>) -> Result<()> {
        let result = self.append_block_inner(&params);
        self.scripts.reset_complexity();
        self.total_script_runs = 0;
        result
    }

    fn validate_next_tx_inner(
        &mut self,
        tx: &Transaction,
        current_timestamp: u64,
        parent_timestamp: u64,
        block_version: BlockVersion,
        accept_failed: bool,
    ) -> Result<()> {
        let block = self.current_block_header()?;
        let mut block_info = self.current_block_info()?;
        block_info.timestamp = current_timestamp;
        let vm_v5_activated = self.features.is_activated(Feature::ScriptVmV5)?;
        let vm_v6_activated = self.features.is_activated(Feature::ScriptVmV6)?;
        let block_reward_distribution_activated = self
            .features
            .is_activated(Feature::BlockRewardDistribution)?;
        let checker_info = CheckerInfo {
            current_timestamp,
            parent_timestamp,
            block_id: block.id,
            block_version,
            height: block_info.height,
            vm_v5_activated,
            vm_v6_activated,
            block_reward_distribution_activated,
        };
        let block_v5_activated = self.features.is_activated(Feature::BlockV5)?;
        let consensus_improvements_activated = self
            .features
            .is_activated(Feature::ConsensusImprovements)?;
        let invoke_expression_activated =
            self.features.is_activated(Feature::InvokeExpression)?;
        let state_actions = StateActionsCounter::new();

        let append_params = AppendParams {
            checker_info,
            block_info: block_info.clone(),
            block: &block,
            accept_failed,
            block_v5_activated,
            vm_v5_activated,
            vm_v6_activated,
            consensus_improvements_activated,
            block_reward_distribution_activated,
            invoke_expression_activated,
            validating_utx: true,
            state_actions: &state_actions,
            miner_pk: block.generator,
            verifier: None,
        };
        self.append_tx(tx, &append_params)
    }

    /// Speculatively validates one pool candidate against the current
    /// block. A failure condemns the candidate, not the node: it comes
    /// back wrapped as a non-fatal rejection.
    pub fn validate_next_tx(
        &mut self,
        tx: &Transaction,
        current_timestamp: u64,
        parent_timestamp: u64,
        block_version: BlockVersion,
        accept_failed: bool,
    ) -> Result<()> {
        self.validate_next_tx_inner(
            tx,
            current_timestamp,
            parent_timestamp,
            block_version,
            accept_failed,
        )
        .map_err(AppendError::into_rejection)
    }

    /// Clears all per-batch transient state.
    pub fn reset(&mut self) {
        self.scripts.reset_complexity();
        self.total_script_runs = 0;
        self.recent_ids.clear();
        self.diff_stor.reset();
        self.block_differ.reset();
    }

    /// Flushes every accumulated working-set change into durable balances
    /// and clears the batch state.
    pub fn apply_all_diffs(&mut self) -> Result<()> {
        self.recent_ids.clear();
        let changes = self.diff_stor.all_changes();
        self.diff_stor.reset();
        self.diff_applier
            .apply_balances_changes(&mut self.storage, &changes)
    }
}

impl<S, F, R> AppendApi for TxAppender<S, F, R>
where
    S: Storage,
    F: FeatureOracle,
    R: ScriptRuntime,
{
    fn append_block(&mut self, params: AppendBlockParams<'_>) -> Result<()> {
        TxAppender::append_block(self, params)
    }

    fn validate_next_tx(
        &mut self,
        tx: &Transaction,
        current_timestamp: u64,
        parent_timestamp: u64,
        block_version: BlockVersion,
        accept_failed: bool,
    ) -> Result<()> {
        TxAppender::validate_next_tx(
            self,
            tx,
            current_timestamp,
            parent_timestamp,
            block_version,
            accept_failed,
        )
    }

    fn reset(&mut self) {
        TxAppender::reset(self);
    }
}
