//! State-dependent transaction checks.
//!
//! Where [`crate::domain::verify`] is pure, this checker consults chain
//! state: timestamp drift against the block being validated, recipient
//! scheme membership, activation gates, and the collection of scripted
//! (smart) assets a transaction touches: the list the script gateway
//! later runs, in order.

use shared_types::{
    Address, AssetId, BridgedTransaction, Transaction, TxPayload,
};

use crate::domain::context::{BridgedKind, CheckerData, CheckerInfo};
use crate::error::{AppendError, Result};
use crate::ports::outbound::Storage;

/// How far (ms) a transaction timestamp may lag the parent block.
pub const MAX_TX_TIME_BACK_MS: u64 = 7_200_000;

/// How far (ms) a transaction timestamp may run ahead of its block.
pub const MAX_TX_TIME_FORWARD_MS: u64 = 5_400_000;

/// Validates transactions against current chain state and extracts the
/// data later stages need.
#[derive(Debug, Clone, Copy)]
pub struct TransactionChecker {
    scheme: u8,
}

impl TransactionChecker {
    /// Creates a checker for the given chain scheme.
    pub fn new(scheme: u8) -> Self {
        Self { scheme }
    }

    fn check_timestamps(&self, tx: &Transaction, info: &CheckerInfo) -> Result<()> {
        if info.parent_timestamp > 0
            && tx.timestamp + MAX_TX_TIME_BACK_MS < info.parent_timestamp
        {
            return Err(AppendError::VerificationFailed(format!(
                "transaction timestamp {} is too far in the past of parent block {}",
                tx.timestamp, info.parent_timestamp
            )));
        }
        if tx.timestamp > info.current_timestamp + MAX_TX_TIME_FORWARD_MS {
            return Err(AppendError::VerificationFailed(format!(
                "transaction timestamp {} is too far in the future of block {}",
                tx.timestamp, info.current_timestamp
            )));
        }
        Ok(())
    }

    fn check_recipient(&self, recipient: &Address) -> Result<()> {
        if recipient.scheme != self.scheme {
            return Err(AppendError::InvalidAddress(format!(
                "recipient {recipient} belongs to another chain"
            )));
        }
        Ok(())
    }

    fn smart_asset<S: Storage + ?Sized>(
        &self,
        storage: &S,
        asset: Option<&AssetId>,
        out: &mut Vec<AssetId>,
    ) -> Result<()> {
        if let Some(asset) = asset {
            if !out.contains(asset) && storage.asset_is_scripted(asset)? {
                out.push(*asset);
            }
        }
        Ok(())
    }

    /// Checks a transaction against state and collects its smart assets.
    pub fn check_tx<S: Storage + ?Sized>(
        &self,
        storage: &S,
        tx: &Transaction,
        info: &CheckerInfo,
        invoke_expression_activated: bool,
    ) -> Result<CheckerData> {
        self.check_timestamps(tx, info)?;
        let mut smart_assets = Vec::new();
        match &tx.payload {
            TxPayload::Payment { recipient, .. } => {
                self.check_recipient(recipient)?;
            }
            TxPayload::Transfer {
                recipient, asset, ..
            } => {
                self.check_recipient(recipient)?;
                self.smart_asset(storage, asset.as_ref(), &mut smart_assets)?;
            }
            TxPayload::Issue { .. } | TxPayload::CreateAlias { .. } | TxPayload::SetScript { .. } => {}
            TxPayload::SetAssetScript { asset, .. } => {
                // Only an already scripted asset may have its script
                // replaced; the current script approves the change.
                if !storage.asset_is_scripted(asset)? {
                    return Err(AppendError::VerificationFailed(format!(
                        "asset {asset} is not scripted, cannot replace its script"
                    )));
                }
                smart_assets.push(*asset);
            }
            TxPayload::Exchange(ex) => {
                self.smart_asset(storage, ex.order1.amount_asset.as_ref(), &mut smart_assets)?;
                self.smart_asset(storage, ex.order1.price_asset.as_ref(), &mut smart_assets)?;
            }
            TxPayload::InvokeScript { dapp, .. } => {
                self.check_recipient(dapp)?;
            }
            TxPayload::InvokeExpression { .. } => {
                if !invoke_expression_activated {
                    return Err(AppendError::VerificationFailed(
                        "invoke-expression transactions are not activated".into(),
                    ));
                }
            }
            TxPayload::Bridged(_) => {}
        }
        Ok(CheckerData { smart_assets })
    }
}

/// Resolves the inner sub-kind of a bridged transaction against state.
pub fn resolve_bridged_kind<S: Storage + ?Sized>(
    storage: &S,
    bridged: &BridgedTransaction,
    scheme: u8,
    block_reward_distribution_activated: bool,
) -> Result<BridgedKind> {
    if bridged.data.is_empty() {
        return Ok(BridgedKind::Transfer);
    }
    if let Some(asset) = storage.asset_by_contract(&bridged.to)? {
        if !block_reward_distribution_activated {
            return Err(AppendError::UnresolvableBridgedKind(
                "bridged asset transfers are not accepted yet".into(),
            ));
        }
        return Ok(BridgedKind::AssetTransfer(asset));
    }
    let target = Address {
        scheme,
        hash: bridged.to,
    };
    if storage.account_is_dapp(&target)? {
        return Ok(BridgedKind::Invoke);
    }
    Err(AppendError::UnresolvableBridgedKind(format!(
        "call data addressed to {target}, which is neither an asset contract nor a d-app"
    )))
}
