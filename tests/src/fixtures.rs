//! Shared fixtures: a self-contained test chain over the in-memory
//! adapters, deterministic keys, transaction builders, and a scriptable
//! fake VM.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use ed25519_dalek::SigningKey;

use shared_types::{
    Address, AssetId, BlockHeader, BlockId, BlockInfo, BridgedTransaction, ExchangeData, Order,
    OrderSide, Transaction, TxId, TxPayload, PRICE_SCALE,
};
use tx_appender::adapters::{FeatureSchedule, MemoryStorage, SyncVerifier};
use tx_appender::domain::{
    ApplicationResult, CheckerData, DifferContext, InvocationResult, ScriptContext,
    ScriptExecution, TransactionDiffer,
};
use tx_appender::ports::outbound::{AddressIndex, ScriptRuntime};
use tx_appender::{AppendBlockParams, AppendError, ChainParameters, Result, TxAppender};

/// Chain scheme byte used by every fixture.
pub const SCHEME: u8 = b'C';

/// Genesis timestamp (ms).
pub const T0: u64 = 1_650_000_000_000;

/// Standard fee used by fixture transactions.
pub const FEE: u64 = 100_000;

/// Installs a log subscriber once per test process; honors `RUST_LOG`.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Deterministic signing key.
pub fn key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

/// Address of a fixture key.
pub fn addr(k: &SigningKey) -> Address {
    Address::from_public_key(SCHEME, &k.verifying_key().to_bytes())
}

/// Behavior of an invoke application in the fake VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeOutcome {
    /// Applies successfully.
    Succeed,
    /// Fails softly: recorded on-chain as failed, fee-only effects.
    SoftFail,
    /// The VM errors out; the whole transaction aborts.
    HardError,
}

#[derive(Debug)]
struct RuntimeBehavior {
    account_pass: bool,
    failing_assets: HashSet<AssetId>,
    complexity: u64,
    invoke_outcome: InvokeOutcome,
}

/// Scriptable fake script VM with shared, mutable behavior.
#[derive(Debug, Clone)]
pub struct TestRuntime {
    inner: Arc<Mutex<RuntimeBehavior>>,
}

impl Default for TestRuntime {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RuntimeBehavior {
                account_pass: true,
                failing_assets: HashSet::new(),
                complexity: 10,
                invoke_outcome: InvokeOutcome::Succeed,
            })),
        }
    }
}

impl TestRuntime {
    /// Makes account/order scripts reject everything.
    pub fn reject_accounts(&self) {
        self.inner.lock().unwrap().account_pass = false;
    }

    /// Makes one asset's script return a negative result.
    pub fn fail_asset(&self, asset: AssetId) {
        self.inner.lock().unwrap().failing_assets.insert(asset);
    }

    /// Sets the outcome of invoke applications.
    pub fn set_invoke_outcome(&self, outcome: InvokeOutcome) {
        self.inner.lock().unwrap().invoke_outcome = outcome;
    }

    /// Sets the complexity charged per script run.
    pub fn set_complexity(&self, complexity: u64) {
        self.inner.lock().unwrap().complexity = complexity;
    }
}

impl ScriptRuntime for TestRuntime {
    fn run_account_script_tx(
        &self,
        _account: &Address,
        _tx: &Transaction,
        _ctx: &ScriptContext<'_>,
    ) -> Result<ScriptExecution> {
        let inner = self.inner.lock().unwrap();
        Ok(ScriptExecution {
            passed: inner.account_pass,
            complexity: inner.complexity,
        })
    }

    fn run_account_script_order(
        &self,
        _account: &Address,
        _order: &Order,
        _ctx: &ScriptContext<'_>,
    ) -> Result<ScriptExecution> {
        let inner = self.inner.lock().unwrap();
        Ok(ScriptExecution {
            passed: inner.account_pass,
            complexity: inner.complexity,
        })
    }

    fn run_asset_script(
        &self,
        asset: &AssetId,
        _tx: &Transaction,
        _ctx: &ScriptContext<'_>,
    ) -> Result<ScriptExecution> {
        let inner = self.inner.lock().unwrap();
        Ok(ScriptExecution {
            passed: !inner.failing_assets.contains(asset),
            complexity: inner.complexity,
        })
    }

    fn apply_invoke(
        &self,
        tx: &Transaction,
        ctx: &ScriptContext<'_>,
    ) -> Result<(InvocationResult, ApplicationResult)> {
        let (outcome, complexity) = {
            let inner = self.inner.lock().unwrap();
            (inner.invoke_outcome, inner.complexity)
        };
        if outcome == InvokeOutcome::HardError {
            return Err(AppendError::Runtime("invoke application failed".into()));
        }
        // The fake VM's payload effects are fee-only; real payload deltas
        // belong to the VM collaborator, not to this pipeline.
        let differ = TransactionDiffer::new(SCHEME);
        let dctx = DifferContext {
            miner: ctx.block_info.generator,
            ng_active: false,
        };
        let changes = differ.failed_diff(tx, &dctx)?;
        // One issue-like action per mocked invocation, drawn from the
        // shared per-block counter.
        ctx.state_actions.next_nonce();
        let invocation = InvocationResult {
            complexity,
            state_actions: ctx.state_actions.value(),
        };
        let application = match outcome {
            InvokeOutcome::Succeed => ApplicationResult::succeeded(1, changes, CheckerData::default()),
            _ => ApplicationResult::failed(1, changes, CheckerData::default()),
        };
        Ok((invocation, application))
    }
}

/// Address index recording into a shared vector.
#[derive(Debug, Default, Clone)]
pub struct RecordingIndex {
    records: Arc<Mutex<Vec<(Address, TxId, BlockId)>>>,
}

impl RecordingIndex {
    /// Snapshot of recorded entries.
    pub fn records(&self) -> Vec<(Address, TxId, BlockId)> {
        self.records.lock().unwrap().clone()
    }
}

impl AddressIndex for RecordingIndex {
    fn record_tx_for_address(
        &mut self,
        address: &Address,
        tx_id: &TxId,
        block_id: &BlockId,
    ) -> Result<()> {
        self.records.lock().unwrap().push((*address, *tx_id, *block_id));
        Ok(())
    }
}

/// A self-contained chain: pipeline + in-memory collaborators, plus a
/// handle to steer the fake VM after construction.
pub struct TestChain {
    /// The pipeline under test.
    pub appender: TxAppender<MemoryStorage, FeatureSchedule, TestRuntime>,
    /// Steering handle into the fake VM.
    pub runtime: TestRuntime,
    /// Generator key of every fixture block.
    pub miner: SigningKey,
    height: u64,
    last_header: BlockHeader,
}

impl TestChain {
    /// A chain with one genesis block and no features active.
    pub fn new() -> Self {
        init_tracing();
        let miner = key(99);
        let genesis = BlockHeader {
            version: 4,
            id: BlockId([1u8; 32]),
            parent_id: BlockId::default(),
            timestamp: T0,
            generator: miner.verifying_key().to_bytes(),
        };
        let mut storage = MemoryStorage::new(SCHEME);
        storage.push_block(
            genesis.clone(),
            BlockInfo {
                height: 1,
                timestamp: T0,
                generator: genesis.generator,
            },
        );
        let runtime = TestRuntime::default();
        let appender = TxAppender::new(
            storage,
            FeatureSchedule::new(),
            runtime.clone(),
            ChainParameters::custom(SCHEME),
        );
        Self {
            appender,
            runtime,
            miner,
            height: 1,
            last_header: genesis,
        }
    }

    /// Attaches an address index to the pipeline.
    pub fn with_index(mut self, index: RecordingIndex) -> Self {
        self.appender = self.appender.with_address_index(Box::new(index));
        self
    }

    /// Activates a feature from genesis.
    pub fn activate(&mut self, feature: shared_types::Feature) {
        self.appender.features_mut().activate(feature);
    }

    /// Credits a native-token balance.
    pub fn fund(&mut self, address: Address, amount: u64) {
        self.appender.storage_mut().credit(address, None, amount);
    }

    /// Credits an asset balance.
    pub fn fund_asset(&mut self, address: Address, asset: AssetId, amount: u64) {
        self.appender.storage_mut().credit(address, Some(asset), amount);
    }

    /// Header the next fixture block would carry.
    pub fn next_header(&self) -> BlockHeader {
        let height = self.height + 1;
        let mut id = [0u8; 32];
        id[0] = height as u8;
        BlockHeader {
            version: 4,
            id: BlockId(id),
            parent_id: self.last_header.id,
            timestamp: T0 + height * 60_000,
            generator: self.miner.verifying_key().to_bytes(),
        }
    }

    /// Appends a block of transactions with inline verification. On
    /// success the block joins the stored chain.
    pub fn append_block(&mut self, transactions: &[Transaction]) -> Result<BlockHeader> {
        self.append_block_with(transactions, &SyncVerifier)
    }

    /// Appends a block through an explicit verification fan-out.
    pub fn append_block_with(
        &mut self,
        transactions: &[Transaction],
        verifier: &dyn tx_appender::TxVerifier,
    ) -> Result<BlockHeader> {
        let block = self.next_header();
        self.appender.append_block(AppendBlockParams {
            transactions,
            block: &block,
            parent: Some(&self.last_header),
            height: self.height + 1,
            verifier,
        })?;
        self.height += 1;
        let info = BlockInfo {
            height: self.height,
            timestamp: block.timestamp,
            generator: block.generator,
        };
        self.appender.storage_mut().push_block(block.clone(), info);
        self.last_header = block.clone();
        Ok(block)
    }

    /// Speculatively validates one pool candidate.
    pub fn pool_validate(&mut self, tx: &Transaction) -> Result<()> {
        self.pool_validate_accepting_failed(tx, false)
    }

    /// Pool validation with an explicit accept-failed flag.
    pub fn pool_validate_accepting_failed(
        &mut self,
        tx: &Transaction,
        accept_failed: bool,
    ) -> Result<()> {
        self.appender.validate_next_tx(
            tx,
            self.last_header.timestamp + 2_000,
            self.last_header.timestamp,
            5,
            accept_failed,
        )
    }

    /// Unwraps a pool rejection down to its cause.
    pub fn rejection_cause(err: AppendError) -> AppendError {
        match err {
            AppendError::TxRejected(inner) => *inner,
            other => other,
        }
    }
}

impl Default for TestChain {
    fn default() -> Self {
        Self::new()
    }
}

fn envelope(sender: &SigningKey, payload: TxPayload) -> Transaction {
    let mut tx = Transaction {
        version: 2,
        sender: sender.verifying_key().to_bytes(),
        fee: FEE,
        timestamp: T0 + 1_000,
        proof: [0u8; 64],
        payload,
    };
    tx.sign(sender).unwrap();
    tx
}

/// A signed native-token transfer.
pub fn transfer(sender: &SigningKey, recipient: Address, amount: u64) -> Transaction {
    envelope(
        sender,
        TxPayload::Transfer {
            recipient,
            asset: None,
            amount,
        },
    )
}

/// A signed asset transfer.
pub fn transfer_asset(
    sender: &SigningKey,
    recipient: Address,
    asset: AssetId,
    amount: u64,
) -> Transaction {
    envelope(
        sender,
        TxPayload::Transfer {
            recipient,
            asset: Some(asset),
            amount,
        },
    )
}

/// A signed verifier-script installation.
pub fn set_script(sender: &SigningKey, script: Option<Vec<u8>>) -> Transaction {
    envelope(sender, TxPayload::SetScript { script })
}

/// A signed alias registration.
pub fn create_alias(sender: &SigningKey, alias: &str) -> Transaction {
    envelope(
        sender,
        TxPayload::CreateAlias {
            alias: alias.into(),
        },
    )
}

/// A signed d-app invocation.
pub fn invoke_script(sender: &SigningKey, dapp: Address) -> Transaction {
    envelope(
        sender,
        TxPayload::InvokeScript {
            dapp,
            function: "call".into(),
            payments: vec![],
        },
    )
}

/// A signed expression invocation.
pub fn invoke_expression(sender: &SigningKey) -> Transaction {
    envelope(
        sender,
        TxPayload::InvokeExpression {
            expression: vec![0xDE, 0xAD],
        },
    )
}

/// A signed bridged transaction.
pub fn bridged(sender: &SigningKey, target_scheme: u8, to: [u8; 20], amount: u64, data: Vec<u8>) -> Transaction {
    envelope(
        sender,
        TxPayload::Bridged(BridgedTransaction {
            target_scheme,
            to,
            amount,
            data,
        }),
    )
}

/// One signed order of an exchange.
pub fn order(
    sender: &SigningKey,
    matcher: &SigningKey,
    side: OrderSide,
    amount_asset: Option<AssetId>,
    price_asset: Option<AssetId>,
    amount: u64,
    price: u64,
) -> Order {
    let mut o = Order {
        version: 1,
        sender: sender.verifying_key().to_bytes(),
        matcher: matcher.verifying_key().to_bytes(),
        amount_asset,
        price_asset,
        side,
        amount,
        price,
        matcher_fee: 1_000,
        timestamp: T0 + 500,
        expiration: T0 + 86_400_000,
        proof: [0u8; 64],
    };
    o.sign(sender).unwrap();
    o
}

/// A signed exchange assembled from explicit orders.
pub fn exchange_from_orders(
    matcher: &SigningKey,
    order1: Order,
    order2: Order,
    amount: u64,
    price: u64,
) -> Transaction {
    envelope(
        matcher,
        TxPayload::Exchange(ExchangeData {
            order1,
            order2,
            amount,
            price,
            buy_matcher_fee: 500,
            sell_matcher_fee: 500,
        }),
    )
}

/// A signed exchange of `amount` units at par price between two orders.
pub fn exchange(
    matcher: &SigningKey,
    buyer: &SigningKey,
    seller: &SigningKey,
    amount_asset: AssetId,
    amount: u64,
) -> Transaction {
    let buy = order(
        buyer,
        matcher,
        OrderSide::Buy,
        Some(amount_asset),
        None,
        amount,
        PRICE_SCALE,
    );
    let sell = order(
        seller,
        matcher,
        OrderSide::Sell,
        Some(amount_asset),
        None,
        amount,
        PRICE_SCALE,
    );
    envelope(
        matcher,
        TxPayload::Exchange(ExchangeData {
            order1: buy,
            order2: sell,
            amount,
            price: PRICE_SCALE,
            buy_matcher_fee: 500,
            sell_matcher_fee: 500,
        }),
    )
}
