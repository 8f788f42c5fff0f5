//! # Transaction Entities
//!
//! The closed transaction enumeration, kind-specific payloads, and the
//! embedded order type used by exchange transactions.
//!
//! ## Identity & Signing
//!
//! A transaction's identity is content-derived: `id()` hashes the canonical
//! bincode encoding of the unsigned body (everything except the proof), so
//! two transactions with equal bodies always collide. Signatures cover the
//! same body bytes.
//!
//! ## Wire Encoding Eras
//!
//! Envelope versions below [`MODERN_TX_VERSION`] use the legacy binary
//! encoding; versions at or above it (and the inherently modern kinds
//! `InvokeExpression` and `Bridged`) use the protobuf-era encoding, which
//! is only accepted on-chain after block format v5 activates.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};

use crate::entities::{Address, AssetId, PublicKey, Signature, TxId};
use crate::errors::TypesError;

/// First envelope version that uses the protobuf-era wire encoding.
pub const MODERN_TX_VERSION: u8 = 3;

/// Fixed-point denominator for order prices: a price of `PRICE_SCALE`
/// trades one amount-asset unit for one price-asset unit.
pub const PRICE_SCALE: u64 = 100_000_000;

/// Transaction kind tag, used for dispatch and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    /// Legacy direct payment. Deprecated; kept for historical replay.
    Payment,
    /// Token or asset transfer.
    Transfer,
    /// Asset issuance.
    Issue,
    /// Alias registration.
    CreateAlias,
    /// Install or clear the sender's account verifier script.
    SetScript,
    /// Replace the script of a smart asset.
    SetAssetScript,
    /// Order-matching trade between two counterparties.
    Exchange,
    /// D-app function invocation.
    InvokeScript,
    /// One-shot expression invocation.
    InvokeExpression,
    /// Externally-signed transaction bridged from another chain.
    Bridged,
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Payment => "payment",
            Self::Transfer => "transfer",
            Self::Issue => "issue",
            Self::CreateAlias => "create-alias",
            Self::SetScript => "set-script",
            Self::SetAssetScript => "set-asset-script",
            Self::Exchange => "exchange",
            Self::InvokeScript => "invoke-script",
            Self::InvokeExpression => "invoke-expression",
            Self::Bridged => "bridged",
        };
        f.write_str(name)
    }
}

/// Buy/sell side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    /// Buying the amount asset, paying in the price asset.
    Buy,
    /// Selling the amount asset, receiving the price asset.
    Sell,
}

/// A matcher-submitted order embedded in an exchange transaction.
///
/// `None` as an asset id denotes the native token.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order format version.
    pub version: u8,
    /// Public key of the account that placed the order.
    pub sender: PublicKey,
    /// Public key of the matcher allowed to execute the order.
    pub matcher: PublicKey,
    /// Asset being traded.
    pub amount_asset: Option<AssetId>,
    /// Asset the price is denominated in.
    pub price_asset: Option<AssetId>,
    /// Buy or sell.
    pub side: OrderSide,
    /// Maximum amount of the amount asset to trade.
    pub amount: u64,
    /// Price in price-asset units per [`PRICE_SCALE`] amount-asset units.
    pub price: u64,
    /// Fee promised to the matcher.
    pub matcher_fee: u64,
    /// Order placement timestamp (milliseconds).
    pub timestamp: u64,
    /// Expiration timestamp (milliseconds).
    pub expiration: u64,
    /// Ed25519 signature over the order body.
    #[serde_as(as = "Bytes")]
    pub proof: Signature,
}

/// Unsigned view serialized for order ids and signatures.
#[derive(Serialize)]
struct OrderBody<'a> {
    version: u8,
    sender: &'a PublicKey,
    matcher: &'a PublicKey,
    amount_asset: &'a Option<AssetId>,
    price_asset: &'a Option<AssetId>,
    side: OrderSide,
    amount: u64,
    price: u64,
    matcher_fee: u64,
    timestamp: u64,
    expiration: u64,
}

impl Order {
    fn body_bytes(&self) -> Result<Vec<u8>, TypesError> {
        bincode::serialize(&OrderBody {
            version: self.version,
            sender: &self.sender,
            matcher: &self.matcher,
            amount_asset: &self.amount_asset,
            price_asset: &self.price_asset,
            side: self.side,
            amount: self.amount,
            price: self.price,
            matcher_fee: self.matcher_fee,
            timestamp: self.timestamp,
            expiration: self.expiration,
        })
        .map_err(|e| TypesError::Encode(e.to_string()))
    }

    /// Address of the order's sender under the given chain scheme.
    pub fn sender_address(&self, scheme: u8) -> Address {
        Address::from_public_key(scheme, &self.sender)
    }

    /// Verifies the order's Ed25519 signature against its sender key.
    pub fn verify_signature(&self) -> Result<(), TypesError> {
        verify_ed25519(&self.sender, &self.body_bytes()?, &self.proof)
    }

    /// Signs the order body, replacing the proof.
    pub fn sign(&mut self, key: &SigningKey) -> Result<(), TypesError> {
        let body = self.body_bytes()?;
        self.proof = key.sign(&body).to_bytes();
        Ok(())
    }

    /// Structural validity independent of chain state.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.amount == 0 {
            return Err(TypesError::structure("order", "zero amount"));
        }
        if self.price == 0 {
            return Err(TypesError::structure("order", "zero price"));
        }
        if self.amount_asset == self.price_asset {
            return Err(TypesError::structure("order", "amount and price asset coincide"));
        }
        if self.expiration < self.timestamp {
            return Err(TypesError::structure("order", "expired before placement"));
        }
        Ok(())
    }
}

/// Payload of an exchange transaction: two matched counterparty orders
/// plus the executed amount and price agreed by the matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeData {
    /// First order (conventionally the buy side, but not required).
    pub order1: Order,
    /// Second order.
    pub order2: Order,
    /// Executed amount of the amount asset.
    pub amount: u64,
    /// Executed price.
    pub price: u64,
    /// Portion of the buy order's matcher fee charged by this trade.
    pub buy_matcher_fee: u64,
    /// Portion of the sell order's matcher fee charged by this trade.
    pub sell_matcher_fee: u64,
}

impl ExchangeData {
    /// The buy-side order.
    pub fn buy_order(&self) -> &Order {
        if self.order1.side == OrderSide::Buy {
            &self.order1
        } else {
            &self.order2
        }
    }

    /// The sell-side order.
    pub fn sell_order(&self) -> &Order {
        if self.order1.side == OrderSide::Sell {
            &self.order1
        } else {
            &self.order2
        }
    }

    /// Price-asset volume of the executed trade.
    pub fn spend_amount(&self) -> Option<u64> {
        (self.amount as u128)
            .checked_mul(self.price as u128)
            .map(|v| v / PRICE_SCALE as u128)
            .and_then(|v| u64::try_from(v).ok())
    }
}

/// An asset payment attached to an invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokePayment {
    /// Paid asset, `None` for the native token.
    pub asset: Option<AssetId>,
    /// Paid amount.
    pub amount: u64,
}

/// An externally-signed transaction bridged from another chain.
///
/// The inner sub-kind (plain transfer, asset transfer, invocation) is not
/// encoded in the payload; the pipeline resolves it against chain state
/// before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgedTransaction {
    /// Scheme byte of the chain the external signer targeted. Must match
    /// the local scheme or the transaction is unmappable here.
    pub target_scheme: u8,
    /// Destination key hash on this chain.
    pub to: [u8; 20],
    /// Native-token amount carried by the call.
    pub amount: u64,
    /// Call data; empty for a plain transfer.
    pub data: Vec<u8>,
}

/// Kind-specific transaction payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TxPayload {
    /// Legacy direct payment.
    Payment {
        /// Funds recipient.
        recipient: Address,
        /// Native-token amount.
        amount: u64,
    },
    /// Token or asset transfer.
    Transfer {
        /// Funds recipient.
        recipient: Address,
        /// Transferred asset, `None` for the native token.
        asset: Option<AssetId>,
        /// Transferred amount.
        amount: u64,
    },
    /// Asset issuance. A script makes the new asset a smart asset.
    Issue {
        /// Asset name.
        name: String,
        /// Issued quantity.
        quantity: u64,
        /// Decimal places, at most 8.
        decimals: u8,
        /// Whether more units may be issued later.
        reissuable: bool,
        /// Optional asset script.
        script: Option<Vec<u8>>,
    },
    /// Alias registration.
    CreateAlias {
        /// Requested alias, 4–30 lowercase alphanumerics.
        alias: String,
    },
    /// Install (`Some`) or clear (`None`) the sender's verifier script.
    SetScript {
        /// Compiled verifier script.
        script: Option<Vec<u8>>,
    },
    /// Replace the script of an existing smart asset.
    SetAssetScript {
        /// Asset whose script is replaced.
        asset: AssetId,
        /// New script; must not be empty (a smart asset cannot be
        /// downgraded to a plain one).
        script: Vec<u8>,
    },
    /// Order-matching trade.
    Exchange(ExchangeData),
    /// D-app function invocation.
    InvokeScript {
        /// D-app account address.
        dapp: Address,
        /// Callable function name.
        function: String,
        /// Attached payments.
        payments: Vec<InvokePayment>,
    },
    /// One-shot expression invocation.
    InvokeExpression {
        /// Compiled expression.
        expression: Vec<u8>,
    },
    /// Bridged externally-signed transaction.
    Bridged(BridgedTransaction),
}

/// A chain transaction: common envelope plus kind-specific payload.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Envelope format version.
    pub version: u8,
    /// Sender's public key.
    pub sender: PublicKey,
    /// Fee in native-token units.
    pub fee: u64,
    /// Transaction timestamp (milliseconds).
    pub timestamp: u64,
    /// Ed25519 signature over the unsigned body.
    #[serde_as(as = "Bytes")]
    pub proof: Signature,
    /// Kind-specific payload.
    pub payload: TxPayload,
}

/// Unsigned view serialized for transaction ids and signatures.
#[derive(Serialize)]
struct TxBody<'a> {
    version: u8,
    sender: &'a PublicKey,
    fee: u64,
    timestamp: u64,
    payload: &'a TxPayload,
}

impl Transaction {
    /// Kind tag of this transaction.
    pub fn kind(&self) -> TxKind {
        match &self.payload {
            TxPayload::Payment { .. } => TxKind::Payment,
            TxPayload::Transfer { .. } => TxKind::Transfer,
            TxPayload::Issue { .. } => TxKind::Issue,
            TxPayload::CreateAlias { .. } => TxKind::CreateAlias,
            TxPayload::SetScript { .. } => TxKind::SetScript,
            TxPayload::SetAssetScript { .. } => TxKind::SetAssetScript,
            TxPayload::Exchange(_) => TxKind::Exchange,
            TxPayload::InvokeScript { .. } => TxKind::InvokeScript,
            TxPayload::InvokeExpression { .. } => TxKind::InvokeExpression,
            TxPayload::Bridged(_) => TxKind::Bridged,
        }
    }

    fn body_bytes(&self) -> Result<Vec<u8>, TypesError> {
        bincode::serialize(&TxBody {
            version: self.version,
            sender: &self.sender,
            fee: self.fee,
            timestamp: self.timestamp,
            payload: &self.payload,
        })
        .map_err(|e| TypesError::Encode(e.to_string()))
    }

    /// Content-derived transaction id: SHA-256 of the unsigned body.
    pub fn id(&self) -> Result<TxId, TypesError> {
        let body = self.body_bytes()?;
        Ok(TxId(Sha256::digest(&body).into()))
    }

    /// Whether this transaction uses the protobuf-era wire encoding.
    pub fn uses_modern_encoding(&self) -> bool {
        matches!(
            self.kind(),
            TxKind::InvokeExpression | TxKind::Bridged
        ) || self.version >= MODERN_TX_VERSION
    }

    /// Resolves the sender's address under the local chain scheme.
    ///
    /// For bridged transactions this re-binds the external sender to the
    /// local scheme, which fails when the transaction was signed for a
    /// different chain.
    pub fn sender_address(&self, scheme: u8) -> Result<Address, TypesError> {
        if let TxPayload::Bridged(bridged) = &self.payload {
            let derived = Address::from_public_key(bridged.target_scheme, &self.sender);
            return Address::translate(bridged.target_scheme, derived.hash, scheme);
        }
        Ok(Address::from_public_key(scheme, &self.sender))
    }

    /// Verifies the transaction's own Ed25519 signature.
    pub fn verify_signature(&self) -> Result<(), TypesError> {
        verify_ed25519(&self.sender, &self.body_bytes()?, &self.proof)
    }

    /// Signs the unsigned body, replacing the proof.
    pub fn sign(&mut self, key: &SigningKey) -> Result<(), TypesError> {
        let body = self.body_bytes()?;
        self.proof = key.sign(&body).to_bytes();
        Ok(())
    }

    /// Structural validity independent of chain state.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.fee == 0 {
            return Err(TypesError::structure("transaction", "zero fee"));
        }
        match &self.payload {
            TxPayload::Payment { amount, .. } | TxPayload::Transfer { amount, .. } => {
                if *amount == 0 {
                    return Err(TypesError::structure("transaction", "zero amount"));
                }
            }
            TxPayload::Issue {
                name,
                quantity,
                decimals,
                ..
            } => {
                if !(4..=16).contains(&name.len()) {
                    return Err(TypesError::structure("issue", "name length out of range"));
                }
                if *quantity == 0 {
                    return Err(TypesError::structure("issue", "zero quantity"));
                }
                if *decimals > 8 {
                    return Err(TypesError::structure("issue", "too many decimals"));
                }
            }
            TxPayload::CreateAlias { alias } => {
                if !(4..=30).contains(&alias.len())
                    || !alias
                        .bytes()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
                {
                    return Err(TypesError::structure("alias", "malformed alias"));
                }
            }
            TxPayload::SetScript { .. } => {}
            TxPayload::SetAssetScript { script, .. } => {
                if script.is_empty() {
                    return Err(TypesError::structure("set-asset-script", "empty script"));
                }
            }
            TxPayload::Exchange(ex) => {
                ex.order1.validate()?;
                ex.order2.validate()?;
                if ex.order1.side == ex.order2.side {
                    return Err(TypesError::structure("exchange", "orders on the same side"));
                }
                if ex.order1.amount_asset != ex.order2.amount_asset
                    || ex.order1.price_asset != ex.order2.price_asset
                {
                    return Err(TypesError::structure("exchange", "order asset pairs differ"));
                }
                if ex.order1.matcher != ex.order2.matcher {
                    return Err(TypesError::structure("exchange", "orders name different matchers"));
                }
                if ex.amount == 0 || ex.price == 0 {
                    return Err(TypesError::structure("exchange", "zero executed amount or price"));
                }
                if ex.amount > ex.buy_order().amount || ex.amount > ex.sell_order().amount {
                    return Err(TypesError::structure("exchange", "executed amount exceeds order"));
                }
                if ex.spend_amount().is_none() {
                    return Err(TypesError::structure("exchange", "price volume overflow"));
                }
            }
            TxPayload::InvokeScript { function, payments, .. } => {
                if function.is_empty() {
                    return Err(TypesError::structure("invoke-script", "empty function name"));
                }
                if payments.iter().any(|p| p.amount == 0) {
                    return Err(TypesError::structure("invoke-script", "zero payment"));
                }
            }
            TxPayload::InvokeExpression { expression } => {
                if expression.is_empty() {
                    return Err(TypesError::structure("invoke-expression", "empty expression"));
                }
            }
            TxPayload::Bridged(bridged) => {
                if bridged.amount == 0 && bridged.data.is_empty() {
                    return Err(TypesError::structure("bridged", "neither value nor call data"));
                }
            }
        }
        Ok(())
    }
}

fn verify_ed25519(pk: &PublicKey, body: &[u8], proof: &Signature) -> Result<(), TypesError> {
    let key = VerifyingKey::from_bytes(pk).map_err(|_| TypesError::BadPublicKey)?;
    let sig = ed25519_dalek::Signature::from_bytes(proof);
    key.verify(body, &sig).map_err(|_| TypesError::BadSignature)
}
