//! In-memory storage and feature-oracle adapters.
//!
//! Back the outbound ports with plain maps. Used by the test suites and
//! by embedders that want a self-contained pipeline (tooling, simulation);
//! a production node plugs its persistent engine in instead.
//!
//! `write_transaction` applies the non-balance state effects of committed
//! transactions (verifier installation, asset registration, alias
//! registration) so that later transactions of the same chain observe
//! them. Balances are only touched through `set_balance`, which the
//! pipeline drives at batch-flush time.

use std::collections::{HashMap, HashSet};

use shared_types::{
    Address, AssetId, BlockHeader, BlockId, BlockInfo, Feature, Transaction, TxId, TxPayload,
};

use crate::domain::differ::FeeDistribution;
use crate::error::{AppendError, Result};
use crate::ports::outbound::{FeatureOracle, Storage};

/// Map-backed [`Storage`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    scheme: u8,
    blocks: Vec<(BlockHeader, BlockInfo)>,
    transactions: HashMap<TxId, bool>,
    pool: HashMap<TxId, bool>,
    balances: HashMap<(Address, Option<AssetId>), u64>,
    verifiers: HashSet<Address>,
    dapps: HashSet<Address>,
    assets: HashMap<AssetId, bool>,
    asset_contracts: HashMap<[u8; 20], AssetId>,
    aliases: HashSet<String>,
    fee_distrs: HashMap<BlockId, FeeDistribution>,
}

impl MemoryStorage {
    /// Creates empty storage for the given chain scheme.
    pub fn new(scheme: u8) -> Self {
        Self {
            scheme,
            ..Self::default()
        }
    }

    /// Appends a block to the stored chain; heights are 1-based.
    pub fn push_block(&mut self, header: BlockHeader, info: BlockInfo) {
        self.blocks.push((header, info));
    }

    /// Registers an asset, optionally scripted.
    pub fn register_asset(&mut self, asset: AssetId, scripted: bool) {
        self.assets.insert(asset, scripted);
    }

    /// Maps an external bridge contract hash to an asset.
    pub fn register_asset_contract(&mut self, contract: [u8; 20], asset: AssetId) {
        self.asset_contracts.insert(contract, asset);
        self.assets.entry(asset).or_insert(false);
    }

    /// Marks an account as hosting a d-app script.
    pub fn register_dapp(&mut self, address: Address) {
        self.dapps.insert(address);
    }

    /// Installs a verifier script flag on an account.
    pub fn install_verifier(&mut self, address: Address) {
        self.verifiers.insert(address);
    }

    /// Credits an account, creating it as needed.
    pub fn credit(&mut self, address: Address, asset: Option<AssetId>, amount: u64) {
        *self.balances.entry((address, asset)).or_default() += amount;
    }

    /// Outcome of a durably stored transaction, if present.
    pub fn stored_outcome(&self, id: &TxId) -> Option<bool> {
        self.transactions.get(id).copied()
    }

    /// Outcome of a pool-admitted transaction, if present.
    pub fn pool_outcome(&self, id: &TxId) -> Option<bool> {
        self.pool.get(id).copied()
    }

    /// Whether an alias was registered.
    pub fn alias_registered(&self, alias: &str) -> bool {
        self.aliases.contains(alias)
    }

    fn apply_state_effects(&mut self, tx: &Transaction) -> Result<()> {
        let sender = tx.sender_address(self.scheme)?;
        match &tx.payload {
            TxPayload::SetScript { script } => {
                if script.is_some() {
                    self.verifiers.insert(sender);
                } else {
                    self.verifiers.remove(&sender);
                }
            }
            TxPayload::Issue { script, .. } => {
                let asset = AssetId(tx.id()?.0);
                self.assets.insert(asset, script.is_some());
            }
            TxPayload::SetAssetScript { asset, .. } => {
                self.assets.insert(*asset, true);
            }
            TxPayload::CreateAlias { alias } => {
                self.aliases.insert(alias.clone());
            }
            _ => {}
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn transaction_exists(&self, id: &TxId) -> Result<bool> {
        Ok(self.transactions.contains_key(id))
    }

    fn write_transaction(&mut self, tx: &Transaction, failed: bool) -> Result<()> {
        let id = tx.id()?;
        self.transactions.insert(id, failed);
        if !failed {
            self.apply_state_effects(tx)?;
        }
        Ok(())
    }

    fn write_transaction_to_mem(&mut self, tx: &Transaction, failed: bool) -> Result<()> {
        let id = tx.id()?;
        self.pool.insert(id, failed);
        Ok(())
    }

    fn block_header_at(&self, height: u64) -> Result<BlockHeader> {
        self.blocks
            .get(height.wrapping_sub(1) as usize)
            .map(|(h, _)| h.clone())
            .ok_or_else(|| AppendError::Storage(format!("no block at height {height}")))
    }

    fn block_info_at(&self, height: u64) -> Result<BlockInfo> {
        self.blocks
            .get(height.wrapping_sub(1) as usize)
            .map(|(_, i)| i.clone())
            .ok_or_else(|| AppendError::Storage(format!("no block info at height {height}")))
    }

    fn adding_block_height(&self) -> u64 {
        self.blocks.len() as u64
    }

    fn balance(&self, address: &Address, asset: Option<&AssetId>) -> Result<u64> {
        Ok(self
            .balances
            .get(&(*address, asset.copied()))
            .copied()
            .unwrap_or(0))
    }

    fn set_balance(&mut self, address: &Address, asset: Option<&AssetId>, value: u64) -> Result<()> {
        self.balances.insert((*address, asset.copied()), value);
        Ok(())
    }

    fn account_has_verifier(&self, address: &Address) -> Result<bool> {
        Ok(self.verifiers.contains(address))
    }

    fn account_is_dapp(&self, address: &Address) -> Result<bool> {
        Ok(self.dapps.contains(address))
    }

    fn asset_is_scripted(&self, asset: &AssetId) -> Result<bool> {
        Ok(self.assets.get(asset).copied().unwrap_or(false))
    }

    fn asset_by_contract(&self, contract: &[u8; 20]) -> Result<Option<AssetId>> {
        Ok(self.asset_contracts.get(contract).copied())
    }

    fn save_fee_distribution(&mut self, block: &BlockId, distr: &FeeDistribution) -> Result<()> {
        self.fee_distrs.insert(*block, *distr);
        Ok(())
    }

    fn fee_distribution(&self, block: &BlockId) -> Result<FeeDistribution> {
        Ok(self.fee_distrs.get(block).copied().unwrap_or_default())
    }
}

/// Map-backed [`FeatureOracle`]: features activate at fixed heights.
#[derive(Debug, Default)]
pub struct FeatureSchedule {
    activations: HashMap<Feature, u64>,
    height: u64,
}

impl FeatureSchedule {
    /// An empty schedule: nothing active.
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates a feature from genesis.
    pub fn activate(&mut self, feature: Feature) {
        self.activations.insert(feature, 0);
    }

    /// Activates a feature from the given height.
    pub fn activate_at(&mut self, feature: Feature, height: u64) {
        self.activations.insert(feature, height);
    }

    /// Moves the oracle's notion of the current height.
    pub fn set_height(&mut self, height: u64) {
        self.height = height;
    }
}

impl FeatureOracle for FeatureSchedule {
    fn is_activated(&self, feature: Feature) -> Result<bool> {
        self.is_activated_at(feature, self.height)
    }

    fn is_activated_at(&self, feature: Feature, height: u64) -> Result<bool> {
        Ok(self
            .activations
            .get(&feature)
            .map(|h| *h <= height)
            .unwrap_or(false))
    }
}
