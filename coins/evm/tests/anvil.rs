//! Integration tests against a local Anvil node.
//!
//! Install Anvil with: `cargo install --git https://github.com/foundry-rs/foundry anvil`
//!
//! Run with: `cargo test -p fourmica_evm --test anvil`

use alloy::node_bindings::Anvil;
use fourmica_evm::prelude::*;
use fourmica_provider::ProviderConfig;
use serde_json::json;

/// Check if Anvil is available
fn anvil_available() -> bool {
    std::process::Command::new("anvil")
        .arg("--version")
        .output()
        .is_ok()
}

#[tokio::test]
async fn test_reader_chain_id_and_balance() {
    if !anvil_available() {
        println!("Skipping - Anvil not available");
        return;
    }
    let anvil = Anvil::new().spawn();
    let reader = EvmReader::connect(&anvil.endpoint()).unwrap();

    assert_eq!(reader.chain_id().await.unwrap(), 31337);

    // Anvil default accounts hold 10000 ETH
    let balance = reader.native_balance(anvil.addresses()[0]).await.unwrap();
    assert!(balance > U256::ZERO);
}

#[tokio::test]
async fn test_no_deposit_events_for_fresh_account() {
    if !anvil_available() {
        println!("Skipping - Anvil not available");
        return;
    }
    let anvil = Anvil::new().spawn();
    let reader = EvmReader::connect(&anvil.endpoint()).unwrap();

    let events = reader
        .deposit_events(Address::repeat_byte(0x44), anvil.addresses()[1])
        .await
        .unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_user_all_assets_on_empty_address_fails() {
    if !anvil_available() {
        println!("Skipping - Anvil not available");
        return;
    }
    let anvil = Anvil::new().spawn();
    let reader = EvmReader::connect(&anvil.endpoint()).unwrap();

    // No code at the address, so the return data cannot be decoded.
    let result = reader
        .user_all_assets(Address::repeat_byte(0x44), anvil.addresses()[0])
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_native_deposit_is_mined() {
    if !anvil_available() {
        println!("Skipping - Anvil not available");
        return;
    }
    let anvil = Anvil::new().spawn();
    let signer: PrivateKeySigner = anvil.keys()[0].clone().into();
    let writer = EvmWriter::connect(&anvil.endpoint(), signer).unwrap();
    let target = anvil.addresses()[2];

    let hash = writer
        .deposit_native(target, U256::from(1_000_000_000_000_000u64))
        .await
        .unwrap();
    let receipt = writer.wait_for_receipt(hash).await.unwrap();

    assert_eq!(receipt.hash, hash);
    assert!(receipt.success);
    assert!(receipt.block_number.is_some());
}

#[tokio::test]
async fn test_wallet_adapter_forwards_node_requests() {
    if !anvil_available() {
        println!("Skipping - Anvil not available");
        return;
    }
    let anvil = Anvil::new().spawn();
    let signer: PrivateKeySigner = anvil.keys()[0].clone().into();
    let wallet = LocalWalletAdapter::builder()
        .signer(signer)
        .network(31337, ProviderConfig::new(anvil.endpoint()).without_rate_limit())
        .build()
        .unwrap();

    wallet.connect().await.unwrap();
    let block = wallet.request("eth_blockNumber", json!([])).await.unwrap();
    assert!(block.as_str().is_some_and(|b| b.starts_with("0x")));

    let balance = wallet.reader().unwrap().native_balance(wallet.address()).await.unwrap();
    assert!(balance > U256::ZERO);
}
