//! Session state owned by the controller, and the derived view handed to the
//! display layer.

use crate::config::{AssetKey, AssetOption, ChainOption};
use fourmica_traits::{format_units, Address, Amount, AmountError, TxHash, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the approve/deposit sequence stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Nothing in progress
    #[default]
    Idle,
    /// Approval submitted, waiting for confirmation
    Approving,
    /// Deposit submitted, waiting for confirmation
    Depositing,
    /// Last deposit confirmed
    Success,
    /// Last transaction failed; see `last_error`
    Error,
}

impl TxStatus {
    /// True while a transaction is in flight
    pub fn is_busy(self) -> bool {
        matches!(self, TxStatus::Approving | TxStatus::Depositing)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxStatus::Idle => "idle",
            TxStatus::Approving => "approving",
            TxStatus::Depositing => "depositing",
            TxStatus::Success => "success",
            TxStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// A precondition that keeps approve or deposit from running.
///
/// Blockers are persistent notices, not errors: they clear as soon as the
/// session changes to satisfy them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Blocker {
    /// No wallet account
    NotConnected,
    /// Wallet is on another network than the selected chain
    WrongNetwork,
    /// The selected chain has no Core4Mica address
    ContractNotConfigured,
    /// Approve was requested for the native asset
    NotAToken,
    /// The selected token has no address on this chain
    TokenNotConfigured,
    /// The amount field does not hold a valid amount
    InvalidAmount,
    /// Allowance is below the amount
    NeedsApproval,
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Blocker::NotConnected => "Connect a wallet",
            Blocker::WrongNetwork => "Switch to the selected network",
            Blocker::ContractNotConfigured => "Contract address is not configured",
            Blocker::NotAToken => "Native assets do not need approval",
            Blocker::TokenNotConfigured => "Token address is not configured",
            Blocker::InvalidAmount => "Enter a valid amount",
            Blocker::NeedsApproval => "Approve the token first",
        };
        f.write_str(text)
    }
}

/// Mutable state of one registration page visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSession {
    /// Chain id picked in the selector
    pub selected_chain: u64,
    /// Asset picked in the selector
    pub selected_asset: AssetKey,
    /// Wallet account, if connected
    pub connected_account: Option<Address>,
    /// Network the wallet is on, if connected
    pub active_chain_id: Option<u64>,
    /// Raw text of the amount field
    pub amount_input: String,
    /// `amount_input` at the selected asset's precision
    pub parsed_amount: Result<Amount, AmountError>,
    /// Balance of the selected asset, once read
    pub balance: Option<U256>,
    /// Allowance granted to the contract, once read (tokens only)
    pub allowance: Option<U256>,
    /// Transaction state machine
    pub tx_status: TxStatus,
    /// Hash of the most recent submission
    pub last_tx_hash: Option<TxHash>,
    /// Sanitized error of the most recent failed command
    pub last_error: Option<String>,
    /// Sanitized error of the most recent failed balance/allowance read
    pub read_error: Option<String>,
    /// Whether the account has collateral history on the selected chain
    pub is_registered: bool,
}

impl RegistrationSession {
    /// A disconnected session on `chain`, with its first asset selected
    pub fn new(chain: &ChainOption) -> Self {
        let selected_asset = chain.default_asset().unwrap_or(AssetKey::Native);
        Self {
            selected_chain: chain.id,
            selected_asset,
            connected_account: None,
            active_chain_id: None,
            amount_input: String::new(),
            parsed_amount: Err(AmountError::Empty),
            balance: None,
            allowance: None,
            tx_status: TxStatus::Idle,
            last_tx_hash: None,
            last_error: None,
            read_error: None,
            is_registered: false,
        }
    }

    /// Re-parses `amount_input` at `asset`'s precision
    pub fn reparse(&mut self, asset: Option<&AssetOption>) {
        self.parsed_amount = match asset {
            Some(asset) => Amount::parse(&self.amount_input, asset.decimals),
            None => Err(AmountError::NotANumber),
        };
    }

    /// Drops reads tied to the previous account/asset/chain
    pub fn clear_reads(&mut self) {
        self.balance = None;
        self.allowance = None;
        self.read_error = None;
    }

    /// True when the wallet is on the selected chain
    pub fn on_selected_chain(&self) -> bool {
        self.active_chain_id == Some(self.selected_chain)
    }

    /// Token asset, allowance known, and allowance below the parsed amount
    pub fn needs_approval(&self, asset: &AssetOption) -> bool {
        if asset.is_native() {
            return false;
        }
        match (self.allowance, &self.parsed_amount) {
            (Some(allowance), Ok(amount)) => allowance < amount.value,
            _ => false,
        }
    }

    fn common_blocker(&self, chain: &ChainOption) -> Option<Blocker> {
        if self.connected_account.is_none() {
            return Some(Blocker::NotConnected);
        }
        if !self.on_selected_chain() {
            return Some(Blocker::WrongNetwork);
        }
        if chain.contract.is_none() {
            return Some(Blocker::ContractNotConfigured);
        }
        None
    }

    /// First reason approve cannot run, if any
    pub fn approve_blocker(&self, chain: &ChainOption) -> Option<Blocker> {
        if let Some(blocker) = self.common_blocker(chain) {
            return Some(blocker);
        }
        let Some(asset) = chain.asset(self.selected_asset) else {
            return Some(Blocker::TokenNotConfigured);
        };
        if asset.is_native() {
            return Some(Blocker::NotAToken);
        }
        if asset.token_address().is_none() {
            return Some(Blocker::TokenNotConfigured);
        }
        if self.parsed_amount.is_err() {
            return Some(Blocker::InvalidAmount);
        }
        None
    }

    /// First reason deposit cannot run, if any
    pub fn deposit_blocker(&self, chain: &ChainOption) -> Option<Blocker> {
        if let Some(blocker) = self.common_blocker(chain) {
            return Some(blocker);
        }
        let Some(asset) = chain.asset(self.selected_asset) else {
            return Some(Blocker::TokenNotConfigured);
        };
        if !asset.is_native() && asset.token_address().is_none() {
            return Some(Blocker::TokenNotConfigured);
        }
        if self.parsed_amount.is_err() {
            return Some(Blocker::InvalidAmount);
        }
        if self.needs_approval(asset) {
            return Some(Blocker::NeedsApproval);
        }
        None
    }

    /// Everything the display layer renders, derived against `chain`
    pub fn snapshot(&self, chain: &ChainOption) -> SessionSnapshot {
        let asset = chain.asset(self.selected_asset);
        let decimals = asset.map_or(18, |a| a.decimals);
        let deposit_blocker = self.deposit_blocker(chain);

        SessionSnapshot {
            selected_chain: self.selected_chain,
            chain_label: chain.label.clone(),
            selected_asset: self.selected_asset,
            asset_symbol: asset.map(|a| a.symbol.clone()).unwrap_or_default(),
            connected_account: self.connected_account,
            active_chain_id: self.active_chain_id,
            amount_input: self.amount_input.clone(),
            parsed_amount: self.parsed_amount.as_ref().ok().map(|a| a.value),
            amount_error: self.parsed_amount.as_ref().err().map(ToString::to_string),
            balance: self.balance,
            balance_display: self.balance.map(|b| format_units(b, decimals)),
            allowance: self.allowance,
            allowance_display: self.allowance.map(|a| format_units(a, decimals)),
            tx_status: self.tx_status,
            last_tx_hash: self.last_tx_hash,
            explorer_tx_url: self.last_tx_hash.map(|h| chain.explorer_tx_url(&h)),
            last_error: self.last_error.clone(),
            read_error: self.read_error.clone(),
            is_registered: self.is_registered,
            needs_approval: asset.is_some_and(|a| self.needs_approval(a)),
            can_deposit: !self.tx_status.is_busy() && deposit_blocker.is_none(),
            deposit_blocker,
            network_mismatch: self.connected_account.is_some() && !self.on_selected_chain(),
            config_warning: chain.config_warning(),
        }
    }
}

/// Read-only view of the session plus the values derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Chain id picked in the selector
    pub selected_chain: u64,
    /// Label of the selected chain
    pub chain_label: String,
    /// Asset picked in the selector
    pub selected_asset: AssetKey,
    /// Ticker of the selected asset
    pub asset_symbol: String,
    /// Wallet account, if connected
    pub connected_account: Option<Address>,
    /// Network the wallet is on, if connected
    pub active_chain_id: Option<u64>,
    /// Raw text of the amount field
    pub amount_input: String,
    /// Amount in base units, when valid
    pub parsed_amount: Option<U256>,
    /// Inline validation message, when invalid
    pub amount_error: Option<String>,
    /// Balance in base units
    pub balance: Option<U256>,
    /// Balance in whole units
    pub balance_display: Option<String>,
    /// Allowance in base units
    pub allowance: Option<U256>,
    /// Allowance in whole units
    pub allowance_display: Option<String>,
    /// Transaction state machine
    pub tx_status: TxStatus,
    /// Hash of the most recent submission
    pub last_tx_hash: Option<TxHash>,
    /// Explorer link for `last_tx_hash`
    pub explorer_tx_url: Option<String>,
    /// Sanitized command error
    pub last_error: Option<String>,
    /// Sanitized balance/allowance read error
    pub read_error: Option<String>,
    /// Registration status
    pub is_registered: bool,
    /// Token allowance below the amount
    pub needs_approval: bool,
    /// Deposit button enabled
    pub can_deposit: bool,
    /// First unmet deposit precondition
    pub deposit_blocker: Option<Blocker>,
    /// Wallet connected but on another network
    pub network_mismatch: bool,
    /// Missing contract configuration notice
    pub config_warning: Option<String>,
}

impl SessionSnapshot {
    /// JSON export for the display layer
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
