use crate::{EvmReader, EvmWriter};

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use fourmica_error::{Error, Result};
use fourmica_provider::{ProviderConfig, RpcClient};
use fourmica_traits::{
    ChainReader, ChainWriter, DepositEvent, TxHash, TxReceipt, UserAssetRecord, WalletAdapter,
    WalletEvent,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

const EIP155_NAMESPACE: &str = "eip155";
const EVENT_CAPACITY: usize = 16;

struct Network {
    client: RpcClient,
    reader: EvmReader,
    writer: EvmWriter,
}

#[derive(Debug, Clone, Copy)]
struct SessionState {
    connected: bool,
    chain_id: u64,
}

/// Builder for [LocalWalletAdapter]
#[derive(Default)]
pub struct LocalWalletAdapterBuilder {
    signer: Option<PrivateKeySigner>,
    networks: Vec<(u64, ProviderConfig)>,
    initial_chain: Option<u64>,
}

impl LocalWalletAdapterBuilder {
    /// Creates a builder with no signer and no networks
    pub fn new() -> Self {
        Self::default()
    }

    /// Key used for the account and for signing
    pub fn signer(&mut self, signer: PrivateKeySigner) -> &mut Self {
        self.signer = Some(signer);
        self
    }

    /// Registers a network the wallet can switch to
    pub fn network(&mut self, chain_id: u64, config: ProviderConfig) -> &mut Self {
        self.networks.push((chain_id, config));
        self
    }

    /// Chain the wallet starts on; defaults to the first registered network
    pub fn initial_chain(&mut self, chain_id: u64) -> &mut Self {
        self.initial_chain = Some(chain_id);
        self
    }

    /// Builds the adapter
    pub fn build(&mut self) -> Result<LocalWalletAdapter> {
        let signer = self
            .signer
            .take()
            .ok_or_else(|| Error::NotConfigured("wallet signer was not provided".to_string()))?;

        let mut networks = BTreeMap::new();
        for (chain_id, config) in self.networks.drain(..) {
            let reader = EvmReader::connect(&config.url)?;
            let writer = EvmWriter::connect(&config.url, signer.clone())?;
            let client = RpcClient::new(config).map_err(|e| e.into_error("wallet_addEthereumChain"))?;
            networks.insert(
                chain_id,
                Network {
                    client,
                    reader,
                    writer,
                },
            );
        }

        let chain_id = match self.initial_chain {
            Some(id) if networks.contains_key(&id) => id,
            Some(id) => return Err(Error::NetworkNotRegistered { chain_id: id }),
            None => *networks
                .keys()
                .next()
                .ok_or_else(|| Error::NotConfigured("wallet has no networks".to_string()))?,
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(LocalWalletAdapter {
            signer,
            networks,
            state: Mutex::new(SessionState {
                connected: false,
                chain_id,
            }),
            events,
        })
    }
}

/// A wallet backed by a local private key and a set of JSON-RPC endpoints.
///
/// Behaves like an injected browser wallet: it must be connected before it
/// exposes an account, it only switches to networks it was configured with,
/// and it answers the wallet-scoped EIP-1193 methods itself while forwarding
/// everything else to the active network's node.
///
/// It also implements [ChainReader] and [ChainWriter], routing every call to
/// whichever network the wallet is on at the time of the call.
pub struct LocalWalletAdapter {
    signer: PrivateKeySigner,
    networks: BTreeMap<u64, Network>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<WalletEvent>,
}

impl LocalWalletAdapter {
    /// Returns the builder for the [LocalWalletAdapter].
    pub fn builder() -> LocalWalletAdapterBuilder {
        LocalWalletAdapterBuilder::new()
    }

    /// Signer address, whether or not the wallet is connected
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Chain ids this wallet can switch to
    pub fn registered_chains(&self) -> Vec<u64> {
        self.networks.keys().copied().collect()
    }

    /// Read client for the active network
    pub fn reader(&self) -> Result<EvmReader> {
        Ok(self.active_network()?.reader.clone())
    }

    /// Signing client for the active network
    pub fn writer(&self) -> Result<EvmWriter> {
        Ok(self.active_network()?.writer.clone())
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_network(&self) -> Result<&Network> {
        let chain_id = self.state().chain_id;
        self.networks
            .get(&chain_id)
            .ok_or(Error::NetworkNotRegistered { chain_id })
    }

    fn emit(&self, event: WalletEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletAdapter for LocalWalletAdapter {
    async fn connect(&self) -> Result<Address> {
        let address = self.address();
        let newly_connected = {
            let mut state = self.state();
            let was = state.connected;
            state.connected = true;
            !was
        };
        if newly_connected {
            tracing::info!(%address, "wallet connected");
            self.emit(WalletEvent::AccountsChanged(Some(address)));
        }
        Ok(address)
    }

    async fn disconnect(&self, namespace: &str) -> Result<()> {
        if namespace != EIP155_NAMESPACE {
            return Err(Error::InvalidInput(format!("unsupported namespace '{namespace}'")));
        }
        let was_connected = std::mem::replace(&mut self.state().connected, false);
        if was_connected {
            tracing::info!("wallet disconnected");
            self.emit(WalletEvent::Disconnected);
        }
        Ok(())
    }

    fn account(&self) -> Option<Address> {
        self.state().connected.then(|| self.signer.address())
    }

    fn chain_id(&self) -> Option<u64> {
        let state = self.state();
        state.connected.then_some(state.chain_id)
    }

    async fn switch_network(&self, chain_id: u64) -> Result<()> {
        if !self.networks.contains_key(&chain_id) {
            tracing::warn!(chain_id, "switch requested to unregistered network");
            return Err(Error::NetworkNotRegistered { chain_id });
        }
        let previous = std::mem::replace(&mut self.state().chain_id, chain_id);
        if previous != chain_id {
            tracing::info!(from = previous, to = chain_id, "wallet switched network");
            self.emit(WalletEvent::ChainChanged(chain_id));
        }
        Ok(())
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        match method {
            "eth_requestAccounts" => {
                let address = self.connect().await?;
                Ok(json!([address]))
            }
            "eth_accounts" => Ok(json!(self.account().into_iter().collect::<Vec<_>>())),
            "eth_chainId" => Ok(json!(format!("{:#x}", self.state().chain_id))),
            "wallet_switchEthereumChain" => {
                let chain_id = parse_switch_params(&params)?;
                self.switch_network(chain_id).await?;
                Ok(Value::Null)
            }
            _ => {
                let network = self.active_network()?;
                network
                    .client
                    .rpc_call::<_, Value>(method, params)
                    .await
                    .map_err(|e| e.into_error(method))
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl ChainReader for LocalWalletAdapter {
    async fn user_all_assets(&self, contract: Address, user: Address) -> Result<Vec<UserAssetRecord>> {
        self.active_network()?.reader.user_all_assets(contract, user).await
    }

    async fn native_balance(&self, user: Address) -> Result<U256> {
        self.active_network()?.reader.native_balance(user).await
    }

    async fn token_balance(&self, token: Address, user: Address) -> Result<U256> {
        self.active_network()?.reader.token_balance(token, user).await
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        self.active_network()?.reader.allowance(token, owner, spender).await
    }

    async fn deposit_events(&self, contract: Address, user: Address) -> Result<Vec<DepositEvent>> {
        self.active_network()?.reader.deposit_events(contract, user).await
    }
}

#[async_trait]
impl ChainWriter for LocalWalletAdapter {
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash> {
        self.active_network()?.writer.approve(token, spender, amount).await
    }

    async fn deposit_native(&self, contract: Address, amount: U256) -> Result<TxHash> {
        self.active_network()?.writer.deposit_native(contract, amount).await
    }

    async fn deposit_stablecoin(&self, contract: Address, token: Address, amount: U256) -> Result<TxHash> {
        self.active_network()?
            .writer
            .deposit_stablecoin(contract, token, amount)
            .await
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt> {
        self.active_network()?.writer.wait_for_receipt(hash).await
    }
}

/// Reads `[{ "chainId": "0x..." }]`.
fn parse_switch_params(params: &Value) -> Result<u64> {
    let raw = params
        .get(0)
        .and_then(|p| p.get("chainId"))
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidInput("missing chainId".to_string()))?;
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| Error::InvalidInput(format!("chainId '{raw}' is not hex")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| Error::InvalidInput(format!("chainId '{raw}': {e}")))
}
