use crate::bindings::{Core4Mica, IERC20};
use crate::error::{from_contract, from_transport};

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use fourmica_error::{Error, Result};
use fourmica_traits::{ChainReader, DepositEvent, TxHash, UserAssetRecord};

/// Read-only chain client over HTTP.
#[derive(Clone)]
pub struct EvmReader {
    provider: DynProvider,
}

impl EvmReader {
    /// Connects a read provider to `rpc_url`.
    pub fn connect(rpc_url: &str) -> Result<Self> {
        let url: Url = rpc_url
            .parse()
            .map_err(|e| Error::NotConfigured(format!("Invalid RPC URL '{rpc_url}': {e}")))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider })
    }

    /// Wraps an existing provider
    pub fn from_provider(provider: DynProvider) -> Self {
        Self { provider }
    }

    /// Chain id reported by the node
    pub async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| from_transport("eth_chainId", e))
    }
}

#[async_trait]
impl ChainReader for EvmReader {
    async fn user_all_assets(&self, contract: Address, user: Address) -> Result<Vec<UserAssetRecord>> {
        let core = Core4Mica::new(contract, &self.provider);
        let assets = core
            .getUserAllAssets(user)
            .call()
            .await
            .map_err(|e| from_contract("getUserAllAssets", e))?;

        Ok(assets.into_iter().map(asset_record).collect())
    }

    async fn native_balance(&self, user: Address) -> Result<U256> {
        self.provider
            .get_balance(user)
            .await
            .map_err(|e| from_transport("eth_getBalance", e))
    }

    async fn token_balance(&self, token: Address, user: Address) -> Result<U256> {
        IERC20::new(token, &self.provider)
            .balanceOf(user)
            .call()
            .await
            .map_err(|e| from_contract("balanceOf", e))
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        IERC20::new(token, &self.provider)
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| from_contract("allowance", e))
    }

    async fn deposit_events(&self, contract: Address, user: Address) -> Result<Vec<DepositEvent>> {
        let filter = Filter::new()
            .address(contract)
            .event_signature(Core4Mica::CollateralDeposited::SIGNATURE_HASH)
            .topic1(user.into_word())
            .from_block(BlockNumberOrTag::Earliest)
            .to_block(BlockNumberOrTag::Latest);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| from_transport("eth_getLogs", e))?;

        let events = decode_deposit_events(&logs);
        tracing::debug!(%contract, %user, count = events.len(), "fetched deposit events");
        Ok(events)
    }
}

fn asset_record(info: Core4Mica::UserAssetInfo) -> UserAssetRecord {
    UserAssetRecord {
        asset: info.asset,
        collateral: info.collateral,
        withdrawal_request_timestamp: info.withdrawalRequestTimestamp,
        withdrawal_request_amount: info.withdrawalRequestAmount,
    }
}

/// Decodes `CollateralDeposited` logs, skipping any that do not decode.
fn decode_deposit_events(logs: &[Log]) -> Vec<DepositEvent> {
    logs.iter()
        .filter_map(|log| match Core4Mica::CollateralDeposited::decode_log(&log.inner) {
            Ok(decoded) => Some(DepositEvent {
                user: decoded.data.user,
                asset: decoded.data.asset,
                amount: decoded.data.amount,
                block_number: log.block_number,
                tx_hash: log.transaction_hash.map(TxHash),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable CollateralDeposited log");
                None
            }
        })
        .collect()
}
