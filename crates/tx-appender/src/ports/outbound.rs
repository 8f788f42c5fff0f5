//! Outbound (driven) ports of the appending pipeline.
//!
//! These traits define the collaborators the pipeline depends on but does
//! not own: durable storage, the feature-activation oracle, the script
//! virtual machine, the optional address→transaction index, and the
//! block-mode verification fan-out.

use shared_types::{Address, AssetId, BlockHeader, BlockId, BlockInfo, Feature, Transaction, TxId};

use crate::domain::context::{ApplicationResult, InvocationResult, ScriptContext, ScriptExecution};
use crate::domain::differ::FeeDistribution;
use crate::domain::verify::VerifyTask;
use crate::error::Result;

/// Durable chain storage: the append-only transaction log, balance
/// tables, script flags, and per-block fee bookkeeping.
///
/// Block lookups are against the newest (not-yet-finalized) view;
/// `adding_block_height` names the height the pipeline is currently
/// working on top of.
pub trait Storage: Send + Sync {
    /// Whether a transaction with this id exists in durable storage.
    fn transaction_exists(&self, id: &TxId) -> Result<bool>;

    /// Appends a transaction to durable storage, recording its outcome.
    fn write_transaction(&mut self, tx: &Transaction, failed: bool) -> Result<()>;

    /// Writes a speculatively admitted transaction to the in-memory pool
    /// area. Pool-mode only; carries no durable state effects.
    fn write_transaction_to_mem(&mut self, tx: &Transaction, failed: bool) -> Result<()>;

    /// Header of the newest block at the given height.
    fn block_header_at(&self, height: u64) -> Result<BlockHeader>;

    /// Block info at the given height.
    fn block_info_at(&self, height: u64) -> Result<BlockInfo>;

    /// Height the pipeline is currently appending against.
    fn adding_block_height(&self) -> u64;

    /// Durable balance of an account (`None` asset = native token).
    fn balance(&self, address: &Address, asset: Option<&AssetId>) -> Result<u64>;

    /// Overwrites the durable balance of an account.
    fn set_balance(&mut self, address: &Address, asset: Option<&AssetId>, value: u64) -> Result<()>;

    /// Whether the account carries a verifier script.
    fn account_has_verifier(&self, address: &Address) -> Result<bool>;

    /// Whether the account hosts an invokable d-app script.
    fn account_is_dapp(&self, address: &Address) -> Result<bool>;

    /// Whether the asset carries a script (smart asset).
    fn asset_is_scripted(&self, asset: &AssetId) -> Result<bool>;

    /// Asset bridged under the given external contract hash, if any.
    fn asset_by_contract(&self, contract: &[u8; 20]) -> Result<Option<AssetId>>;

    /// Persists a finished block's fee distribution.
    fn save_fee_distribution(&mut self, block: &BlockId, distr: &FeeDistribution) -> Result<()>;

    /// Fee distribution of a stored block; empty if never saved.
    fn fee_distribution(&self, block: &BlockId) -> Result<FeeDistribution>;
}

/// Feature-activation oracle.
pub trait FeatureOracle: Send + Sync {
    /// Whether the feature is active at the current (newest) height.
    fn is_activated(&self, feature: Feature) -> Result<bool>;

    /// Whether the feature is active at the given height.
    fn is_activated_at(&self, feature: Feature, height: u64) -> Result<bool>;
}

/// The script virtual machine, invoked as a black box.
pub trait ScriptRuntime: Send + Sync {
    /// Runs an account's verifier script against a transaction.
    fn run_account_script_tx(
        &self,
        account: &Address,
        tx: &Transaction,
        ctx: &ScriptContext<'_>,
    ) -> Result<ScriptExecution>;

    /// Runs an account's verifier script against an order it placed.
    fn run_account_script_order(
        &self,
        account: &Address,
        order: &shared_types::Order,
        ctx: &ScriptContext<'_>,
    ) -> Result<ScriptExecution>;

    /// Runs an asset's script against a transaction moving that asset.
    fn run_asset_script(
        &self,
        asset: &AssetId,
        tx: &Transaction,
        ctx: &ScriptContext<'_>,
    ) -> Result<ScriptExecution>;

    /// Applies an invoke-style transaction. A soft failure is reported
    /// inside the returned [`ApplicationResult`]; an `Err` aborts the
    /// whole transaction.
    fn apply_invoke(
        &self,
        tx: &Transaction,
        ctx: &ScriptContext<'_>,
    ) -> Result<(InvocationResult, ApplicationResult)>;
}

/// Optional address→transaction index for API consumers.
pub trait AddressIndex: Send + Sync {
    /// Records that a transaction touched an address in a block.
    fn record_tx_for_address(
        &mut self,
        address: &Address,
        tx_id: &TxId,
        block_id: &BlockId,
    ) -> Result<()>;
}

/// Block-mode verification fan-out: accepts tasks for asynchronous
/// signature/structural checking. Sending blocks when the underlying
/// channel is full; failures surface later through the pool's result
/// side, outside the append call.
pub trait TxVerifier: Send + Sync {
    /// Queues one verification task.
    fn submit(&self, task: VerifyTask) -> Result<()>;
}
