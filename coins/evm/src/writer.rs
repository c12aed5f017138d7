use crate::bindings::{Core4Mica, IERC20};
use crate::error::{from_contract, from_pending};

use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use fourmica_error::{Error, Result};
use fourmica_traits::{ChainWriter, TxHash, TxReceipt};

/// Transaction client that signs with a local key.
#[derive(Clone)]
pub struct EvmWriter {
    provider: DynProvider,
    from: Address,
}

impl EvmWriter {
    /// Connects a signing provider for `signer` to `rpc_url`.
    pub fn connect(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self> {
        let url: Url = rpc_url
            .parse()
            .map_err(|e| Error::NotConfigured(format!("Invalid RPC URL '{rpc_url}': {e}")))?;
        let from = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();
        Ok(Self { provider, from })
    }

    /// Address transactions are sent from
    pub fn from_address(&self) -> Address {
        self.from
    }
}

#[async_trait]
impl ChainWriter for EvmWriter {
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash> {
        let pending = IERC20::new(token, &self.provider)
            .approve(spender, amount)
            .send()
            .await
            .map_err(|e| from_contract("approve", e))?;
        let hash = TxHash(*pending.tx_hash());
        tracing::info!(%token, %spender, %amount, %hash, "approve submitted");
        Ok(hash)
    }

    async fn deposit_native(&self, contract: Address, amount: U256) -> Result<TxHash> {
        let pending = Core4Mica::new(contract, &self.provider)
            .deposit()
            .value(amount)
            .send()
            .await
            .map_err(|e| from_contract("deposit", e))?;
        let hash = TxHash(*pending.tx_hash());
        tracing::info!(%contract, %amount, %hash, "native deposit submitted");
        Ok(hash)
    }

    async fn deposit_stablecoin(&self, contract: Address, token: Address, amount: U256) -> Result<TxHash> {
        let pending = Core4Mica::new(contract, &self.provider)
            .depositStablecoin(token, amount)
            .send()
            .await
            .map_err(|e| from_contract("depositStablecoin", e))?;
        let hash = TxHash(*pending.tx_hash());
        tracing::info!(%contract, %token, %amount, %hash, "stablecoin deposit submitted");
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), hash.0)
            .get_receipt()
            .await
            .map_err(|e| from_pending("eth_getTransactionReceipt", e))?;
        Ok(TxReceipt {
            hash: TxHash(receipt.transaction_hash),
            success: receipt.status(),
            block_number: receipt.block_number,
        })
    }
}
