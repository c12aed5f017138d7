//! # 4mica Registration
//!
//! The agent-registration flow of the 4mica site: connect a wallet, pick a
//! network and an asset, approve and deposit collateral into the Core4Mica
//! contract, and show whether the account is registered.
//!
//! [RegistrationController] owns the session and exposes commands; the
//! display layer renders [SessionSnapshot]s. The controller is generic over
//! the wallet and chain client traits from `fourmica_traits`, so it runs the
//! same against `fourmica_evm` or scripted mocks.
//!
//! ## Example
//!
//! ```ignore
//! use fourmica_registration::prelude::*;
//!
//! let controller = RegistrationController::new(ChainTable::from_env(), wallet, reader, writer);
//! controller.connect().await?;
//! controller.select_asset(AssetKey::Usdc).await?;
//! controller.set_amount("25");
//! if controller.snapshot().needs_approval {
//!     controller.approve().await;
//! }
//! controller.deposit().await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub use config::{AssetKey, AssetKind, AssetOption, ChainOption, ChainTable};
mod controller;
pub use controller::{CommandOutcome, IgnoreReason, RegistrationController, EVM_NAMESPACE};
mod session;
pub use session::{Blocker, RegistrationSession, SessionSnapshot, TxStatus};

pub use fourmica_error::{Error, ErrorKind, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{AMOY_CHAIN_ID, SEPOLIA_CHAIN_ID};
    pub use crate::{
        AssetKey, AssetKind, AssetOption, Blocker, ChainOption, ChainTable, CommandOutcome,
        Error, ErrorKind, IgnoreReason, RegistrationController, Result, SessionSnapshot, TxStatus,
    };
    pub use fourmica_traits::{Address, ChainReader, ChainWriter, WalletAdapter, WalletEvent, U256};
}
