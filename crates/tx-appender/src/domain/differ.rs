//! Diff computation.
//!
//! [`TransactionDiffer`] turns a transaction into its balance diff, pure
//! given the transaction and context. [`BlockDiffer`] keeps the per-block
//! fee bookkeeping: under the NG-style fee split a block's generator
//! receives 40% of its own block's fees immediately (inside each
//! transaction diff) and 60% of the previous block's fees through the
//! persisted fee distribution, seeded as the very first diff of the next
//! block.

use serde::{Deserialize, Serialize};

use shared_types::{
    Address, BlockHeader, BlockId, Feature, PublicKey, Transaction, TxPayload,
};

use crate::domain::context::BridgedKind;
use crate::domain::diff::{AccountKey, BalanceDiff};
use crate::error::{AppendError, Result};
use crate::ports::outbound::{FeatureOracle, Storage};

/// Total fees collected by one block, persisted per block id so the next
/// block's generator diff can claim its share.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeDistribution {
    /// Sum of all transaction fees in the block, native units.
    pub total_fee: u64,
}

/// Share of a fee credited to the block's own generator under NG.
fn current_block_fee_part(fee: u64) -> u64 {
    fee * 2 / 5
}

fn signed(v: u64) -> Result<i64> {
    i64::try_from(v).map_err(|_| AppendError::Overflow)
}

/// Context for per-transaction diff computation.
#[derive(Debug, Clone, Copy)]
pub struct DifferContext {
    /// Generator of the block the transaction lands in.
    pub miner: PublicKey,
    /// Whether the NG fee split is active.
    pub ng_active: bool,
}

/// Computes balance diffs for single transactions.
#[derive(Debug, Clone, Copy)]
pub struct TransactionDiffer {
    scheme: u8,
}

impl TransactionDiffer {
    /// Creates a differ for the given chain scheme.
    pub fn new(scheme: u8) -> Self {
        Self { scheme }
    }

    /// Debits the fee from the sender and credits the generator's share.
    fn apply_fee(
        &self,
        diff: &mut BalanceDiff,
        sender: Address,
        tx: &Transaction,
        ctx: &DifferContext,
    ) -> Result<()> {
        diff.add(AccountKey::native(sender), -signed(tx.fee)?)?;
        let miner = Address::from_public_key(self.scheme, &ctx.miner);
        let part = if ctx.ng_active {
            current_block_fee_part(tx.fee)
        } else {
            tx.fee
        };
        if part > 0 {
            diff.add_miner_reward(AccountKey::native(miner), signed(part)?)?;
        }
        Ok(())
    }

    /// Full balance diff of a successful transaction.
    ///
    /// `bridged_kind` must be the resolved sub-kind for bridged transfer
    /// payloads; invoke-style payloads contribute fee-only diffs here, as
    /// their payload effects arrive through the VM's application result.
    pub fn create_diff(
        &self,
        tx: &Transaction,
        ctx: &DifferContext,
        bridged_kind: Option<&BridgedKind>,
    ) -> Result<BalanceDiff> {
        let sender = tx.sender_address(self.scheme)?;
        let mut diff = BalanceDiff::new();
        self.apply_fee(&mut diff, sender, tx, ctx)?;

        match &tx.payload {
            TxPayload::Payment { recipient, amount } => {
                diff.add(AccountKey::native(sender), -signed(*amount)?)?;
                diff.add(AccountKey::native(*recipient), signed(*amount)?)?;
            }
            TxPayload::Transfer {
                recipient,
                asset,
                amount,
            } => {
                diff.add(
                    AccountKey {
                        address: sender,
                        asset: *asset,
                    },
                    -signed(*amount)?,
                )?;
                diff.add(
                    AccountKey {
                        address: *recipient,
                        asset: *asset,
                    },
                    signed(*amount)?,
                )?;
            }
            TxPayload::Issue { quantity, .. } => {
                let asset_id = shared_types::AssetId(tx.id()?.0);
                diff.add(AccountKey::asset(sender, asset_id), signed(*quantity)?)?;
            }
            TxPayload::CreateAlias { .. }
            | TxPayload::SetScript { .. }
            | TxPayload::SetAssetScript { .. }
            | TxPayload::InvokeScript { .. }
            | TxPayload::InvokeExpression { .. } => {}
            TxPayload::Exchange(ex) => {
                let buyer = ex.buy_order().sender_address(self.scheme);
                let seller = ex.sell_order().sender_address(self.scheme);
                let matcher = sender;
                let spend = ex.spend_amount().ok_or(AppendError::Overflow)?;

                let amount_asset = ex.order1.amount_asset;
                let price_asset = ex.order1.price_asset;
                diff.add(
                    AccountKey {
                        address: buyer,
                        asset: amount_asset,
                    },
                    signed(ex.amount)?,
                )?;
                diff.add(
                    AccountKey {
                        address: seller,
                        asset: amount_asset,
                    },
                    -signed(ex.amount)?,
                )?;
                diff.add(
                    AccountKey {
                        address: buyer,
                        asset: price_asset,
                    },
                    -signed(spend)?,
                )?;
                diff.add(
                    AccountKey {
                        address: seller,
                        asset: price_asset,
                    },
                    signed(spend)?,
                )?;
                // Matcher fees are always native.
                diff.add(AccountKey::native(buyer), -signed(ex.buy_matcher_fee)?)?;
                diff.add(AccountKey::native(seller), -signed(ex.sell_matcher_fee)?)?;
                diff.add(
                    AccountKey::native(matcher),
                    signed(ex.buy_matcher_fee)?.checked_add(signed(ex.sell_matcher_fee)?)
                        .ok_or(AppendError::Overflow)?,
                )?;
            }
            TxPayload::Bridged(bridged) => match bridged_kind {
                Some(BridgedKind::Transfer) => {
                    let recipient = Address {
                        scheme: self.scheme,
                        hash: bridged.to,
                    };
                    diff.add(AccountKey::native(sender), -signed(bridged.amount)?)?;
                    diff.add(AccountKey::native(recipient), signed(bridged.amount)?)?;
                }
                Some(BridgedKind::AssetTransfer(asset)) => {
                    let recipient = Address {
                        scheme: self.scheme,
                        hash: bridged.to,
                    };
                    diff.add(AccountKey::asset(sender, *asset), -signed(bridged.amount)?)?;
                    diff.add(AccountKey::asset(recipient, *asset), signed(bridged.amount)?)?;
                }
                Some(BridgedKind::Invoke) => {}
                None => {
                    return Err(AppendError::UnresolvableBridgedKind(
                        "diff requested before sub-kind resolution".into(),
                    ))
                }
            },
        }
        Ok(diff)
    }

    /// Fee-only diff of a failed-but-recorded transaction.
    pub fn failed_diff(&self, tx: &Transaction, ctx: &DifferContext) -> Result<BalanceDiff> {
        let sender = tx.sender_address(self.scheme)?;
        let mut diff = BalanceDiff::new();
        self.apply_fee(&mut diff, sender, tx, ctx)?;
        Ok(diff)
    }

    /// Fee diff used for the fee-sufficiency pre-check of fallible kinds.
    /// The fee must be payable even when the transaction later fails.
    pub fn fee_validation_diff(&self, tx: &Transaction, ctx: &DifferContext) -> Result<BalanceDiff> {
        self.failed_diff(tx, ctx)
    }
}

/// Per-block fee bookkeeping and the miner-reward seed diff.
#[derive(Debug)]
pub struct BlockDiffer {
    scheme: u8,
    block_reward: u64,
    cur_distr: FeeDistribution,
}

impl BlockDiffer {
    /// Creates a block differ for the given scheme and reward size.
    pub fn new(scheme: u8, block_reward: u64) -> Self {
        Self {
            scheme,
            block_reward,
            cur_distr: FeeDistribution::default(),
        }
    }

    /// Folds a committed transaction's fee into the current distribution.
    /// Failed transactions count too: their fee is consumed.
    pub fn count_miner_fee(&mut self, tx: &Transaction) -> Result<()> {
        self.cur_distr.total_fee = self
            .cur_distr
            .total_fee
            .checked_add(tx.fee)
            .ok_or(AppendError::Overflow)?;
        Ok(())
    }

    /// The very first diff of a block: the generator's carried 60% share
    /// of the parent block's fees (NG) plus the block reward, each gated
    /// by its feature.
    pub fn miner_reward_diff<S, F>(
        &self,
        storage: &S,
        features: &F,
        block: &BlockHeader,
        parent: Option<&BlockHeader>,
    ) -> Result<BalanceDiff>
    where
        S: Storage + ?Sized,
        F: FeatureOracle + ?Sized,
    {
        let mut diff = BalanceDiff::new();
        let miner = Address::from_public_key(self.scheme, &block.generator);
        if features.is_activated(Feature::NgFeeDistribution)? {
            if let Some(parent) = parent {
                let prev = storage.fee_distribution(&parent.id)?;
                let carried = prev.total_fee - current_block_fee_part(prev.total_fee);
                if carried > 0 {
                    diff.add_miner_reward(AccountKey::native(miner), signed(carried)?)?;
                }
            }
        }
        if features.is_activated(Feature::BlockRewardDistribution)? {
            diff.add_miner_reward(AccountKey::native(miner), signed(self.block_reward)?)?;
        }
        Ok(diff)
    }

    /// Persists the finished block's fee distribution and starts a new one.
    pub fn save_cur_fee_distr<S: Storage + ?Sized>(
        &mut self,
        storage: &mut S,
        block_id: &BlockId,
    ) -> Result<()> {
        storage.save_fee_distribution(block_id, &self.cur_distr)?;
        self.cur_distr = FeeDistribution::default();
        Ok(())
    }

    /// Drops any in-progress distribution.
    pub fn reset(&mut self) {
        self.cur_distr = FeeDistribution::default();
    }

    /// Current in-progress distribution.
    pub fn current_distribution(&self) -> FeeDistribution {
        self.cur_distr
    }
}
