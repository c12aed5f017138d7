//! Supported networks and the assets that can be deposited on each.

use fourmica_error::{Error, Result};
use fourmica_traits::{Address, TxHash};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ethereum Sepolia
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
/// Polygon Amoy
pub const AMOY_CHAIN_ID: u64 = 80_002;

/// Circle's USDC on Sepolia
pub const SEPOLIA_USDC: Address = Address::new([
    0x1c, 0x7d, 0x4b, 0x19, 0x6c, 0xb0, 0xc7, 0xb0, 0x1d, 0x74, 0x3f, 0xbc, 0x61, 0x16, 0xa9, 0x02,
    0x37, 0x9c, 0x72, 0x38,
]);
/// Circle's USDC on Amoy
pub const AMOY_USDC: Address = Address::new([
    0x41, 0xe9, 0x4e, 0xb0, 0x19, 0xc0, 0x76, 0x2f, 0x9b, 0xfc, 0xf9, 0xfb, 0x1e, 0x58, 0x72, 0x5b,
    0xfb, 0x0e, 0x75, 0x82,
]);

/// Identifies an asset within a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKey {
    /// The chain's gas token
    Native,
    /// USD Coin
    Usdc,
}

/// How an asset is paid into the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Attached as value to the payable `deposit()`
    Native,
    /// ERC-20 moved by `depositStablecoin` after an approval
    Token {
        /// Token contract, `None` when not deployed/configured on this chain
        address: Option<Address>,
    },
}

/// One payable asset on a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetOption {
    /// Key within the chain's asset map
    pub key: AssetKey,
    /// Native or token
    pub kind: AssetKind,
    /// Ticker shown to the user
    pub symbol: String,
    /// Decimal precision
    pub decimals: u8,
}

impl AssetOption {
    /// A native asset
    pub fn native(symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            key: AssetKey::Native,
            kind: AssetKind::Native,
            symbol: symbol.into(),
            decimals,
        }
    }

    /// A token asset
    pub fn token(key: AssetKey, symbol: impl Into<String>, decimals: u8, address: Option<Address>) -> Self {
        Self {
            key,
            kind: AssetKind::Token { address },
            symbol: symbol.into(),
            decimals,
        }
    }

    /// True for the chain's gas token
    pub fn is_native(&self) -> bool {
        matches!(self.kind, AssetKind::Native)
    }

    /// Token contract, if this is a configured token
    pub fn token_address(&self) -> Option<Address> {
        match self.kind {
            AssetKind::Token { address } => address,
            AssetKind::Native => None,
        }
    }
}

/// A supported network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOption {
    /// EIP-155 chain id
    pub id: u64,
    /// Display label
    pub label: String,
    /// Compact label for selectors
    pub short_label: String,
    /// Block explorer base URL, without trailing slash
    pub explorer_url: String,
    /// Core4Mica deployment, `None` when unconfigured
    pub contract: Option<Address>,
    /// Environment variable that configures [Self::contract]
    pub contract_env: String,
    /// Token address override variable for USDC, if any
    pub usdc_env: Option<String>,
    /// Payable assets, in display order
    pub assets: BTreeMap<AssetKey, AssetOption>,
}

impl ChainOption {
    /// Creates a chain with no contract and no assets
    pub fn new(
        id: u64,
        label: impl Into<String>,
        short_label: impl Into<String>,
        explorer_url: impl Into<String>,
    ) -> Self {
        let explorer_url: String = explorer_url.into();
        Self {
            id,
            label: label.into(),
            short_label: short_label.into(),
            explorer_url: explorer_url.trim_end_matches('/').to_string(),
            contract: None,
            contract_env: String::new(),
            usdc_env: None,
            assets: BTreeMap::new(),
        }
    }

    /// Sets the Core4Mica address
    pub fn with_contract(mut self, contract: Option<Address>) -> Self {
        self.contract = contract;
        self
    }

    /// Names the environment variable holding the Core4Mica address
    pub fn with_contract_env(mut self, var: impl Into<String>) -> Self {
        self.contract_env = var.into();
        self
    }

    /// Names the environment variable overriding the USDC address
    pub fn with_usdc_env(mut self, var: impl Into<String>) -> Self {
        self.usdc_env = Some(var.into());
        self
    }

    /// Adds or replaces an asset
    pub fn with_asset(mut self, asset: AssetOption) -> Self {
        self.assets.insert(asset.key, asset);
        self
    }

    /// Looks up an asset
    pub fn asset(&self, key: AssetKey) -> Option<&AssetOption> {
        self.assets.get(&key)
    }

    /// First asset in display order
    pub fn default_asset(&self) -> Option<AssetKey> {
        self.assets.keys().next().copied()
    }

    /// Explorer link for a transaction on this chain
    pub fn explorer_tx_url(&self, hash: &TxHash) -> String {
        format!("{}/tx/{}", self.explorer_url, hash)
    }

    /// Persistent notice shown while the contract address is missing
    pub fn config_warning(&self) -> Option<String> {
        if self.contract.is_some() {
            return None;
        }
        Some(format!(
            "Core4Mica contract address is not configured for {}; set {}",
            self.label, self.contract_env
        ))
    }
}

/// The chains a registration page offers, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainTable {
    chains: Vec<ChainOption>,
}

impl ChainTable {
    /// Validates and wraps `chains`.
    ///
    /// Every chain needs at least one asset and a unique id.
    pub fn new(chains: Vec<ChainOption>) -> Result<Self> {
        if chains.is_empty() {
            return Err(Error::NotConfigured("no chains configured".to_string()));
        }
        for (i, chain) in chains.iter().enumerate() {
            if chain.assets.is_empty() {
                return Err(Error::NotConfigured(format!("{} has no assets", chain.label)));
            }
            if chains[..i].iter().any(|c| c.id == chain.id) {
                return Err(Error::InvalidInput(format!("duplicate chain id {}", chain.id)));
            }
        }
        Ok(Self { chains })
    }

    /// Sepolia and Amoy with their public USDC deployments and no contract addresses
    pub fn defaults() -> Self {
        Self {
            chains: vec![
                ChainOption::new(
                    SEPOLIA_CHAIN_ID,
                    "Ethereum Sepolia",
                    "Sepolia",
                    "https://sepolia.etherscan.io",
                )
                .with_contract_env("CORE4MICA_ADDRESS_SEPOLIA")
                .with_usdc_env("CORE4MICA_USDC_SEPOLIA")
                .with_asset(AssetOption::native("ETH", 18))
                .with_asset(AssetOption::token(AssetKey::Usdc, "USDC", 6, Some(SEPOLIA_USDC))),
                ChainOption::new(
                    AMOY_CHAIN_ID,
                    "Polygon Amoy",
                    "Amoy",
                    "https://amoy.polygonscan.com",
                )
                .with_contract_env("CORE4MICA_ADDRESS_AMOY")
                .with_usdc_env("CORE4MICA_USDC_AMOY")
                .with_asset(AssetOption::native("POL", 18))
                .with_asset(AssetOption::token(AssetKey::Usdc, "USDC", 6, Some(AMOY_USDC))),
            ],
        }
    }

    /// [Self::defaults] with addresses taken from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "failed to load .env file");
            }
        }
        Self::defaults().with_overrides(|var| std::env::var(var).ok())
    }

    /// Applies contract and token addresses from `lookup`.
    ///
    /// Empty values leave the entry unset; malformed values are logged and
    /// also leave it unset.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        for chain in &mut self.chains {
            if !chain.contract_env.is_empty() {
                chain.contract = read_address(&chain.contract_env, &lookup);
            }
            if let Some(var) = chain.usdc_env.clone() {
                if let Some(raw) = lookup(&var) {
                    if let Some(usdc) = chain.assets.get_mut(&AssetKey::Usdc) {
                        usdc.kind = AssetKind::Token {
                            address: parse_address(&var, &raw),
                        };
                    }
                }
            }
        }
        self
    }

    /// Looks up a chain by id
    pub fn get(&self, chain_id: u64) -> Option<&ChainOption> {
        self.chains.iter().find(|c| c.id == chain_id)
    }

    /// First chain in display order
    pub fn first(&self) -> &ChainOption {
        // non-empty by construction
        &self.chains[0]
    }

    /// All chains in display order
    pub fn iter(&self) -> impl Iterator<Item = &ChainOption> {
        self.chains.iter()
    }
}

fn read_address(var: &str, lookup: &impl Fn(&str) -> Option<String>) -> Option<Address> {
    lookup(var).and_then(|raw| parse_address(var, &raw))
}

fn parse_address(var: &str, raw: &str) -> Option<Address> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<Address>() {
        Ok(address) => Some(address),
        Err(e) => {
            tracing::warn!(var, value = raw, error = %e, "ignoring malformed address");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_have_no_contracts() {
        let table = ChainTable::defaults();
        assert_eq!(table.first().id, SEPOLIA_CHAIN_ID);
        assert!(table.iter().all(|c| c.contract.is_none()));
        assert_eq!(table.iter().count(), 2);
    }

    #[test]
    fn test_default_assets() {
        let table = ChainTable::defaults();
        let sepolia = table.get(SEPOLIA_CHAIN_ID).unwrap();
        assert_eq!(sepolia.default_asset(), Some(AssetKey::Native));
        assert_eq!(sepolia.asset(AssetKey::Native).unwrap().decimals, 18);
        let usdc = sepolia.asset(AssetKey::Usdc).unwrap();
        assert_eq!(usdc.decimals, 6);
        assert_eq!(usdc.token_address(), Some(SEPOLIA_USDC));

        let amoy = table.get(AMOY_CHAIN_ID).unwrap();
        assert_eq!(amoy.asset(AssetKey::Native).unwrap().symbol, "POL");
    }

    #[test]
    fn test_usdc_constants_match_checksummed_text() {
        let sepolia: Address = "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238".parse().unwrap();
        let amoy: Address = "0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582".parse().unwrap();
        assert_eq!(SEPOLIA_USDC, sepolia);
        assert_eq!(AMOY_USDC, amoy);
    }

    #[test]
    fn test_overrides_set_contract() {
        let table = ChainTable::defaults().with_overrides(lookup(&[(
            "CORE4MICA_ADDRESS_SEPOLIA",
            "0x00000000000000000000000000000000000000c4",
        )]));
        let sepolia = table.get(SEPOLIA_CHAIN_ID).unwrap();
        assert_eq!(sepolia.contract, Some(Address::with_last_byte(0xc4)));
        assert!(sepolia.config_warning().is_none());
        assert!(table.get(AMOY_CHAIN_ID).unwrap().contract.is_none());
    }

    #[test]
    fn test_empty_and_malformed_overrides_leave_unset() {
        let table = ChainTable::defaults().with_overrides(lookup(&[
            ("CORE4MICA_ADDRESS_SEPOLIA", "   "),
            ("CORE4MICA_ADDRESS_AMOY", "not-an-address"),
        ]));
        assert!(table.iter().all(|c| c.contract.is_none()));
    }

    #[test]
    fn test_usdc_override() {
        let table = ChainTable::defaults().with_overrides(lookup(&[
            ("CORE4MICA_USDC_AMOY", "0x000000000000000000000000000000000000005d"),
            ("CORE4MICA_USDC_SEPOLIA", ""),
        ]));
        let amoy_usdc = table.get(AMOY_CHAIN_ID).unwrap().asset(AssetKey::Usdc).unwrap();
        assert_eq!(amoy_usdc.token_address(), Some(Address::with_last_byte(0x5d)));
        let sepolia_usdc = table.get(SEPOLIA_CHAIN_ID).unwrap().asset(AssetKey::Usdc).unwrap();
        assert_eq!(sepolia_usdc.token_address(), None);
        assert!(!sepolia_usdc.is_native());
    }

    #[test]
    fn test_config_warning_names_variable() {
        let table = ChainTable::defaults();
        assert_eq!(
            table.get(AMOY_CHAIN_ID).unwrap().config_warning().unwrap(),
            "Core4Mica contract address is not configured for Polygon Amoy; set CORE4MICA_ADDRESS_AMOY"
        );
    }

    #[test]
    fn test_explorer_tx_url() {
        let chain = ChainOption::new(1, "Mainnet", "ETH", "https://etherscan.io/");
        let hash = TxHash(fourmica_traits::B256::repeat_byte(0x11));
        assert_eq!(
            chain.explorer_tx_url(&hash),
            format!("https://etherscan.io/tx/0x{}", "11".repeat(32))
        );
    }

    #[test]
    fn test_table_validation() {
        assert!(ChainTable::new(vec![]).is_err());
        let bare = ChainOption::new(1, "A", "A", "https://a");
        assert!(ChainTable::new(vec![bare.clone()]).is_err());

        let ok = bare.with_asset(AssetOption::native("ETH", 18));
        assert!(ChainTable::new(vec![ok.clone()]).is_ok());
        let err = ChainTable::new(vec![ok.clone(), ok]).unwrap_err();
        assert_eq!(err.kind(), fourmica_error::ErrorKind::InvalidInput);
    }
}
