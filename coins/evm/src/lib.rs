//! # 4mica EVM Clients
//!
//! Alloy-backed implementations of the `fourmica_traits` seams:
//!
//! - [EvmReader] reads balances, allowances, collateral records and
//!   `CollateralDeposited` logs through an HTTP provider.
//! - [EvmWriter] signs and sends `approve`, `deposit` and `depositStablecoin`
//!   with a local key, and waits for receipts.
//! - [LocalWalletAdapter] plays the part of an injected wallet for scripts and
//!   tests: connect/disconnect, a fixed set of switchable networks, events.
//!
//! Contract bindings live in [bindings] and are generated with `sol!`.
//!
//! ### Reading collateral
//! ```no_run
//! # use fourmica_evm::prelude::*;
//! # async fn read() -> std::result::Result<(), fourmica_evm::Error> {
//! let reader = EvmReader::connect("https://ethereum-sepolia-rpc.publicnode.com")?;
//! let contract: Address = "0x0000000000000000000000000000000000000001".parse().unwrap();
//! let user: Address = "0xFf7FD50BF684eb853787179cc9c784b55Ac68699".parse().unwrap();
//! let records = reader.user_all_assets(contract, user).await?;
//! println!("registered: {}", records.iter().any(|r| r.is_active()));
//! # Ok(())
//! # }
//! ```
//!
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
mod error;
mod reader;
pub use reader::EvmReader;
mod writer;
pub use writer::EvmWriter;
mod wallet;
pub use wallet::{LocalWalletAdapter, LocalWalletAdapterBuilder};

pub use alloy;
pub use fourmica_error::Error;

/// Re-export fourmica-traits for convenience
pub use fourmica_traits;

/// Glob-importable items for working with the EVM clients
pub mod prelude {
    pub use crate::{EvmReader, EvmWriter, LocalWalletAdapter, LocalWalletAdapterBuilder};
    pub use alloy::signers::local::PrivateKeySigner;
    pub use fourmica_traits::prelude::*;
}
