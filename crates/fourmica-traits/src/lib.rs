//! # 4mica Traits
//!
//! Shared types and the client traits the registration controller is written
//! against. The controller never talks to a wallet or node directly: it holds
//! a [`WalletAdapter`], a [`ChainReader`] and a [`ChainWriter`], so tests can
//! inject scripted mocks and production code can plug in the alloy clients
//! from `fourmica_evm`.
//!
//! ## Core Traits
//!
//! - [`WalletAdapter`] - connect/disconnect, active account and chain, network switching
//! - [`ChainReader`] - balances, allowances, collateral records and deposit events
//! - [`ChainWriter`] - approve and deposit transactions, receipt waiting
//!
//! ## Example
//!
//! ```ignore
//! use fourmica_traits::prelude::*;
//!
//! async fn owned<R: ChainReader>(reader: &R, user: Address) -> Result<U256> {
//!     reader.native_balance(user).await
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

mod amount;
pub use amount::{format_units, Amount, AmountError};

pub use alloy_primitives::{Address, B256, U256};
pub use fourmica_error::{Error, ErrorKind, Result};

/// Represents a transaction hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub B256);

impl TxHash {
    /// Returns the underlying 32 bytes
    pub fn as_b256(&self) -> &B256 {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<B256> for TxHash {
    fn from(hash: B256) -> Self {
        Self(hash)
    }
}

/// The part of a mined receipt the controller cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Transaction hash
    pub hash: TxHash,
    /// False when the transaction reverted
    pub success: bool,
    /// Block the transaction landed in
    pub block_number: Option<u64>,
}

/// One entry of `getUserAllAssets(user)` on the Core4Mica contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAssetRecord {
    /// Asset address (zero address for the native asset)
    pub asset: Address,
    /// Locked collateral
    pub collateral: U256,
    /// Unix time of a pending withdrawal request, zero if none
    pub withdrawal_request_timestamp: U256,
    /// Amount of a pending withdrawal request, zero if none
    pub withdrawal_request_amount: U256,
}

impl UserAssetRecord {
    /// True if the record shows collateral or a pending withdrawal
    pub fn is_active(&self) -> bool {
        !self.collateral.is_zero()
            || !self.withdrawal_request_amount.is_zero()
            || !self.withdrawal_request_timestamp.is_zero()
    }
}

/// A decoded `CollateralDeposited(user, asset, amount)` log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    /// Depositor
    pub user: Address,
    /// Deposited asset
    pub asset: Address,
    /// Deposited amount in base units
    pub amount: U256,
    /// Block the log was emitted in
    pub block_number: Option<u64>,
    /// Emitting transaction
    pub tx_hash: Option<TxHash>,
}

/// Account/chain notifications pushed by a wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletEvent {
    /// The selected account changed; `None` when the wallet exposes no account
    AccountsChanged(Option<Address>),
    /// The wallet moved to another chain id
    ChainChanged(u64),
    /// The wallet session ended
    Disconnected,
}

/// A connected wallet, as seen by the dapp.
///
/// Mirrors what browser wallet-connection SDKs expose: connection management,
/// the active account and chain, network switching, and a raw EIP-1193
/// `request`. Event subscription is a broadcast channel; dropping the
/// receiver is the `removeListener`.
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Opens a session and returns the selected account
    async fn connect(&self) -> Result<Address>;

    /// Ends the session for `namespace` (e.g. `"eip155"`)
    async fn disconnect(&self, namespace: &str) -> Result<()>;

    /// Currently selected account, if connected
    fn account(&self) -> Option<Address>;

    /// Chain id the wallet is currently on, if connected
    fn chain_id(&self) -> Option<u64>;

    /// Asks the wallet to move to `chain_id`.
    ///
    /// Fails with [`Error::NetworkNotRegistered`] when the wallet has no
    /// network for that id.
    async fn switch_network(&self, chain_id: u64) -> Result<()>;

    /// Raw EIP-1193 request
    async fn request(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value>;

    /// Subscribes to account/chain notifications
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// Read-only access to the chain the wallet is on
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `getUserAllAssets(user)` on the Core4Mica contract
    async fn user_all_assets(&self, contract: Address, user: Address) -> Result<Vec<UserAssetRecord>>;

    /// Native balance of `user`
    async fn native_balance(&self, user: Address) -> Result<U256>;

    /// ERC-20 `balanceOf(user)`
    async fn token_balance(&self, token: Address, user: Address) -> Result<U256>;

    /// ERC-20 `allowance(owner, spender)`
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;

    /// All `CollateralDeposited` logs of `contract` whose indexed user is `user`,
    /// across the full block range
    async fn deposit_events(&self, contract: Address, user: Address) -> Result<Vec<DepositEvent>>;
}

/// Transaction submission on behalf of the connected account
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// ERC-20 `approve(spender, amount)` on `token`
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash>;

    /// Payable `deposit()` on the Core4Mica contract
    async fn deposit_native(&self, contract: Address, amount: U256) -> Result<TxHash>;

    /// `depositStablecoin(token, amount)` on the Core4Mica contract
    async fn deposit_stablecoin(&self, contract: Address, token: Address, amount: U256) -> Result<TxHash>;

    /// Waits until `hash` is mined
    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt>;
}

// Shared handles: one client can serve as wallet, reader and writer at once.

#[async_trait]
impl<T: WalletAdapter + ?Sized> WalletAdapter for Arc<T> {
    async fn connect(&self) -> Result<Address> {
        (**self).connect().await
    }

    async fn disconnect(&self, namespace: &str) -> Result<()> {
        (**self).disconnect(namespace).await
    }

    fn account(&self) -> Option<Address> {
        (**self).account()
    }

    fn chain_id(&self) -> Option<u64> {
        (**self).chain_id()
    }

    async fn switch_network(&self, chain_id: u64) -> Result<()> {
        (**self).switch_network(chain_id).await
    }

    async fn request(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        (**self).request(method, params).await
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        (**self).subscribe()
    }
}

#[async_trait]
impl<T: ChainReader + ?Sized> ChainReader for Arc<T> {
    async fn user_all_assets(&self, contract: Address, user: Address) -> Result<Vec<UserAssetRecord>> {
        (**self).user_all_assets(contract, user).await
    }

    async fn native_balance(&self, user: Address) -> Result<U256> {
        (**self).native_balance(user).await
    }

    async fn token_balance(&self, token: Address, user: Address) -> Result<U256> {
        (**self).token_balance(token, user).await
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        (**self).allowance(token, owner, spender).await
    }

    async fn deposit_events(&self, contract: Address, user: Address) -> Result<Vec<DepositEvent>> {
        (**self).deposit_events(contract, user).await
    }
}

#[async_trait]
impl<T: ChainWriter + ?Sized> ChainWriter for Arc<T> {
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash> {
        (**self).approve(token, spender, amount).await
    }

    async fn deposit_native(&self, contract: Address, amount: U256) -> Result<TxHash> {
        (**self).deposit_native(contract, amount).await
    }

    async fn deposit_stablecoin(&self, contract: Address, token: Address, amount: U256) -> Result<TxHash> {
        (**self).deposit_stablecoin(contract, token, amount).await
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt> {
        (**self).wait_for_receipt(hash).await
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        format_units, Address, Amount, AmountError, ChainReader, ChainWriter, DepositEvent, Error,
        ErrorKind, Result, TxHash, TxReceipt, UserAssetRecord, WalletAdapter, WalletEvent, B256,
        U256,
    };
}
