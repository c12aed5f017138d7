//! Scripted in-memory implementations of the wallet and chain client traits.
//!
//! Every mock records its calls and answers from a script that tests set up
//! front. Individual calls can be parked on a [Gate] to force an ordering
//! between overlapping requests.

use async_trait::async_trait;
use fourmica_traits::{
    Address, ChainReader, ChainWriter, DepositEvent, Error, Result, TxHash, TxReceipt,
    UserAssetRecord, WalletAdapter, WalletEvent, B256, U256,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, Notify};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Gate
// ============================================================================

/// Holds one mocked call until the test releases it.
///
/// The call signals [Gate::entered] as soon as it starts, then waits for
/// [Gate::release]. Both sides use stored permits, so the order in which the
/// test and the call reach the gate does not matter.
#[derive(Debug, Default)]
pub struct Gate {
    entered: Notify,
    released: Notify,
}

impl Gate {
    /// Creates a closed gate
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Waits until a call is parked on this gate
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets the parked call continue
    pub fn release(&self) {
        self.released.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.released.notified().await;
    }
}

async fn pass_gate(gates: &Mutex<HashMap<GateKey, Arc<Gate>>>, key: GateKey) {
    let gate = lock(gates).remove(&key);
    if let Some(gate) = gate {
        gate.pass().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GateKey {
    NativeBalance(Address),
    TokenBalance(Address),
    UserAssets(Address),
    Receipt,
}

// ============================================================================
// Wallet
// ============================================================================

/// A call observed by [MockWallet]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletCall {
    /// `connect()`
    Connect,
    /// `disconnect(namespace)`
    Disconnect(String),
    /// `switch_network(chain_id)`
    SwitchNetwork(u64),
    /// `request(method, ..)`
    Request(String),
}

#[derive(Debug)]
struct WalletState {
    account: Address,
    connected: bool,
    chain_id: u64,
    registered_chains: Vec<u64>,
    connect_error: Option<Error>,
    disconnect_error: Option<Error>,
    calls: Vec<WalletCall>,
}

/// Scripted [WalletAdapter]
#[derive(Debug)]
pub struct MockWallet {
    state: Mutex<WalletState>,
    events: broadcast::Sender<WalletEvent>,
}

impl MockWallet {
    /// A disconnected wallet holding `account`, sitting on `chain_id`, that
    /// can switch to any of `registered_chains`
    pub fn new(account: Address, chain_id: u64, registered_chains: &[u64]) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(WalletState {
                account,
                connected: false,
                chain_id,
                registered_chains: registered_chains.to_vec(),
                connect_error: None,
                disconnect_error: None,
                calls: Vec::new(),
            }),
            events,
        }
    }

    /// Makes the next `connect()` fail with `error`
    pub fn fail_next_connect(&self, error: Error) {
        lock(&self.state).connect_error = Some(error);
    }

    /// Makes the next `disconnect()` fail with `error`; the session stays open
    pub fn fail_next_disconnect(&self, error: Error) {
        lock(&self.state).disconnect_error = Some(error);
    }

    /// Simulates the user picking another account in the wallet UI
    pub fn set_account(&self, account: Address) {
        lock(&self.state).account = account;
        self.emit(WalletEvent::AccountsChanged(Some(account)));
    }

    /// Simulates the user moving the wallet to another chain outside the dapp
    pub fn set_chain(&self, chain_id: u64) {
        lock(&self.state).chain_id = chain_id;
        self.emit(WalletEvent::ChainChanged(chain_id));
    }

    /// Calls seen so far
    pub fn calls(&self) -> Vec<WalletCall> {
        lock(&self.state).calls.clone()
    }

    /// Chain ids passed to `switch_network`, in order
    pub fn switch_requests(&self) -> Vec<u64> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|call| match call {
                WalletCall::SwitchNetwork(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletAdapter for MockWallet {
    async fn connect(&self) -> Result<Address> {
        let mut state = lock(&self.state);
        state.calls.push(WalletCall::Connect);
        if let Some(error) = state.connect_error.take() {
            return Err(error);
        }
        state.connected = true;
        Ok(state.account)
    }

    async fn disconnect(&self, namespace: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(WalletCall::Disconnect(namespace.to_string()));
        if let Some(error) = state.disconnect_error.take() {
            return Err(error);
        }
        state.connected = false;
        Ok(())
    }

    fn account(&self) -> Option<Address> {
        let state = lock(&self.state);
        state.connected.then_some(state.account)
    }

    fn chain_id(&self) -> Option<u64> {
        let state = lock(&self.state);
        state.connected.then_some(state.chain_id)
    }

    async fn switch_network(&self, chain_id: u64) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(WalletCall::SwitchNetwork(chain_id));
        if !state.registered_chains.contains(&chain_id) {
            return Err(Error::NetworkNotRegistered { chain_id });
        }
        state.chain_id = chain_id;
        Ok(())
    }

    async fn request(&self, method: &str, _params: Value) -> Result<Value> {
        lock(&self.state).calls.push(WalletCall::Request(method.to_string()));
        Ok(Value::Null)
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

// ============================================================================
// Chain reader
// ============================================================================

/// A call observed by [MockChainReader]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCall {
    /// `user_all_assets(contract, user)`
    UserAllAssets(Address),
    /// `native_balance(user)`
    NativeBalance(Address),
    /// `token_balance(token, user)`
    TokenBalance(Address),
    /// `allowance(token, owner, spender)`
    Allowance(Address),
    /// `deposit_events(contract, user)`
    DepositEvents(Address),
}

#[derive(Debug, Default)]
struct ReaderState {
    native_balances: HashMap<Address, U256>,
    token_balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address), U256>,
    assets: HashMap<Address, Vec<UserAssetRecord>>,
    events: HashMap<Address, Vec<DepositEvent>>,
    failing: HashMap<&'static str, Error>,
    calls: Vec<ReadCall>,
}

/// Scripted [ChainReader].
///
/// Unscripted balances and allowances read as zero; unscripted records and
/// events read as empty.
#[derive(Debug, Default)]
pub struct MockChainReader {
    state: Mutex<ReaderState>,
    gates: Mutex<HashMap<GateKey, Arc<Gate>>>,
}

impl MockChainReader {
    /// Creates an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Native balance of `user`
    pub fn set_native_balance(&self, user: Address, balance: U256) {
        lock(&self.state).native_balances.insert(user, balance);
    }

    /// `balanceOf(user)` on `token`
    pub fn set_token_balance(&self, token: Address, user: Address, balance: U256) {
        lock(&self.state).token_balances.insert((token, user), balance);
    }

    /// `allowance(owner, ..)` on `token`
    pub fn set_allowance(&self, token: Address, owner: Address, allowance: U256) {
        lock(&self.state).allowances.insert((token, owner), allowance);
    }

    /// Records returned by `getUserAllAssets(user)`
    pub fn set_user_assets(&self, user: Address, records: Vec<UserAssetRecord>) {
        lock(&self.state).assets.insert(user, records);
    }

    /// `CollateralDeposited` logs for `user`
    pub fn set_deposit_events(&self, user: Address, events: Vec<DepositEvent>) {
        lock(&self.state).events.insert(user, events);
    }

    /// Makes every call of `method` fail with `error` until [Self::heal] is called.
    ///
    /// `method` is one of `user_all_assets`, `native_balance`,
    /// `token_balance`, `allowance`, `deposit_events`.
    pub fn fail(&self, method: &'static str, error: Error) {
        lock(&self.state).failing.insert(method, error);
    }

    /// Clears every scripted failure
    pub fn heal(&self) {
        lock(&self.state).failing.clear();
    }

    /// Parks the next `native_balance(user)` call on a gate
    pub fn hold_native_balance(&self, user: Address) -> Arc<Gate> {
        self.hold(GateKey::NativeBalance(user))
    }

    /// Parks the next `token_balance(token, ..)` call on a gate
    pub fn hold_token_balance(&self, token: Address) -> Arc<Gate> {
        self.hold(GateKey::TokenBalance(token))
    }

    /// Parks the next `user_all_assets(.., user)` call on a gate
    pub fn hold_user_assets(&self, user: Address) -> Arc<Gate> {
        self.hold(GateKey::UserAssets(user))
    }

    /// Calls seen so far
    pub fn calls(&self) -> Vec<ReadCall> {
        lock(&self.state).calls.clone()
    }

    /// Number of `deposit_events` calls seen so far
    pub fn deposit_event_queries(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ReadCall::DepositEvents(_)))
            .count()
    }

    fn hold(&self, key: GateKey) -> Arc<Gate> {
        let gate = Gate::new();
        lock(&self.gates).insert(key, gate.clone());
        gate
    }

    fn record(&self, call: ReadCall, method: &'static str) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        match state.failing.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn user_all_assets(&self, _contract: Address, user: Address) -> Result<Vec<UserAssetRecord>> {
        self.record(ReadCall::UserAllAssets(user), "user_all_assets")?;
        pass_gate(&self.gates, GateKey::UserAssets(user)).await;
        Ok(lock(&self.state).assets.get(&user).cloned().unwrap_or_default())
    }

    async fn native_balance(&self, user: Address) -> Result<U256> {
        self.record(ReadCall::NativeBalance(user), "native_balance")?;
        pass_gate(&self.gates, GateKey::NativeBalance(user)).await;
        Ok(lock(&self.state)
            .native_balances
            .get(&user)
            .copied()
            .unwrap_or_default())
    }

    async fn token_balance(&self, token: Address, user: Address) -> Result<U256> {
        self.record(ReadCall::TokenBalance(token), "token_balance")?;
        pass_gate(&self.gates, GateKey::TokenBalance(token)).await;
        Ok(lock(&self.state)
            .token_balances
            .get(&(token, user))
            .copied()
            .unwrap_or_default())
    }

    async fn allowance(&self, token: Address, owner: Address, _spender: Address) -> Result<U256> {
        self.record(ReadCall::Allowance(token), "allowance")?;
        Ok(lock(&self.state)
            .allowances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn deposit_events(&self, _contract: Address, user: Address) -> Result<Vec<DepositEvent>> {
        self.record(ReadCall::DepositEvents(user), "deposit_events")?;
        Ok(lock(&self.state).events.get(&user).cloned().unwrap_or_default())
    }
}

// ============================================================================
// Chain writer
// ============================================================================

/// A transaction submitted to [MockChainWriter]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentTx {
    /// `approve(spender, amount)` on `token`
    Approve {
        /// Token contract
        token: Address,
        /// Approved spender
        spender: Address,
        /// Approved amount
        amount: U256,
    },
    /// Payable `deposit()`
    DepositNative {
        /// Core contract
        contract: Address,
        /// Attached value
        amount: U256,
    },
    /// `depositStablecoin(token, amount)`
    DepositStablecoin {
        /// Core contract
        contract: Address,
        /// Deposited token
        token: Address,
        /// Deposited amount
        amount: U256,
    },
}

#[derive(Debug, Default)]
struct WriterState {
    sent: Vec<SentTx>,
    submit_error: Option<Error>,
    receipt_error: Option<Error>,
    revert_next: bool,
}

/// Scripted [ChainWriter].
///
/// Submissions succeed with hashes holding their 1-based sequence number and receipts report success
/// unless scripted otherwise. A successful `approve` can optionally write the
/// approved amount into a [MockChainReader], like a real chain would.
#[derive(Debug, Default)]
pub struct MockChainWriter {
    state: Mutex<WriterState>,
    gates: Mutex<HashMap<GateKey, Arc<Gate>>>,
    link: Option<(Arc<MockChainReader>, Address)>,
}

impl MockChainWriter {
    /// Creates a writer whose transactions change nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer that applies `owner`'s confirmed approvals to `reader`
    pub fn linked(reader: Arc<MockChainReader>, owner: Address) -> Self {
        Self {
            link: Some((reader, owner)),
            ..Self::default()
        }
    }

    /// Makes the next submission fail with `error`
    pub fn fail_next_submit(&self, error: Error) {
        lock(&self.state).submit_error = Some(error);
    }

    /// Makes the next receipt wait fail with `error`
    pub fn fail_next_receipt(&self, error: Error) {
        lock(&self.state).receipt_error = Some(error);
    }

    /// Makes the next receipt report a reverted transaction
    pub fn revert_next(&self) {
        lock(&self.state).revert_next = true;
    }

    /// Parks the next receipt wait on a gate
    pub fn hold_receipt(&self) -> Arc<Gate> {
        let gate = Gate::new();
        lock(&self.gates).insert(GateKey::Receipt, gate.clone());
        gate
    }

    /// Transactions submitted so far
    pub fn sent(&self) -> Vec<SentTx> {
        lock(&self.state).sent.clone()
    }

    fn submit(&self, tx: SentTx) -> Result<TxHash> {
        let mut state = lock(&self.state);
        if let Some(error) = state.submit_error.take() {
            return Err(error);
        }
        state.sent.push(tx);
        Ok(TxHash(B256::from(U256::from(state.sent.len()).to_be_bytes::<32>())))
    }
}

#[async_trait]
impl ChainWriter for MockChainWriter {
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash> {
        self.submit(SentTx::Approve {
            token,
            spender,
            amount,
        })
    }

    async fn deposit_native(&self, contract: Address, amount: U256) -> Result<TxHash> {
        self.submit(SentTx::DepositNative { contract, amount })
    }

    async fn deposit_stablecoin(&self, contract: Address, token: Address, amount: U256) -> Result<TxHash> {
        self.submit(SentTx::DepositStablecoin {
            contract,
            token,
            amount,
        })
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt> {
        pass_gate(&self.gates, GateKey::Receipt).await;

        let (success, tx) = {
            let mut state = lock(&self.state);
            if let Some(error) = state.receipt_error.take() {
                return Err(error);
            }
            let success = !std::mem::take(&mut state.revert_next);
            let index = U256::from_be_bytes(hash.0 .0).saturating_to::<usize>();
            (success, index.checked_sub(1).and_then(|i| state.sent.get(i).copied()))
        };

        if let (true, Some((reader, owner)), Some(SentTx::Approve { token, amount, .. })) =
            (success, &self.link, tx)
        {
            reader.set_allowance(token, *owner, amount);
        }

        Ok(TxReceipt {
            hash,
            success,
            block_number: Some(1),
        })
    }
}
