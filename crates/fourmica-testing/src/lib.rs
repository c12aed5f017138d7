//! # 4mica Testing Infrastructure
//!
//! Testing utilities for the 4mica registration SDK:
//! - Scripted mock wallet and chain clients with call recording
//! - Gates that hold a mocked call until the test releases it
//! - Edge case amount strings and fixtures
//! - Property-based testing strategies
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fourmica_testing::*;
//!
//! let reader = Arc::new(MockChainReader::new());
//! reader.set_user_assets(ALICE, vec![active_record(Address::ZERO)]);
//!
//! proptest! {
//!     #[test]
//!     fn test_parse(input in valid_amount_text(6)) {
//!         // ...
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use fourmica_traits::{Address, DepositEvent, UserAssetRecord, U256};
use proptest::prelude::*;

mod mocks;
pub use mocks::{
    Gate, MockChainReader, MockChainWriter, MockWallet, ReadCall, SentTx, WalletCall,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Default test account
pub const ALICE: Address = Address::repeat_byte(0xa1);

/// Second test account
pub const BOB: Address = Address::repeat_byte(0xb0);

/// Stand-in Core4Mica deployment
pub const CORE_CONTRACT: Address = Address::repeat_byte(0xc4);

/// Stand-in USDC deployment
pub const USDC_TOKEN: Address = Address::repeat_byte(0x5d);

/// A record with locked collateral for `asset`
pub fn active_record(asset: Address) -> UserAssetRecord {
    UserAssetRecord {
        asset,
        collateral: U256::from(1_000_000u64),
        withdrawal_request_timestamp: U256::ZERO,
        withdrawal_request_amount: U256::ZERO,
    }
}

/// A record with every field zero
pub fn empty_record(asset: Address) -> UserAssetRecord {
    UserAssetRecord {
        asset,
        collateral: U256::ZERO,
        withdrawal_request_timestamp: U256::ZERO,
        withdrawal_request_amount: U256::ZERO,
    }
}

/// A historical deposit by `user`
pub fn deposit_event(user: Address, amount: u64) -> DepositEvent {
    DepositEvent {
        user,
        asset: Address::ZERO,
        amount: U256::from(amount),
        block_number: Some(1),
        tx_hash: None,
    }
}

// ============================================================================
// Edge Case Amounts
// ============================================================================

/// Amount strings that sit on parsing boundaries
pub struct EdgeCaseAmounts;

impl EdgeCaseAmounts {
    /// Smallest USDC amount
    pub const USDC_MIN: &'static str = "0.000001";

    /// One digit past USDC precision
    pub const USDC_TOO_PRECISE: &'static str = "0.0000001";

    /// Half an ether
    pub const HALF_ETHER: &'static str = "0.5";

    /// Strings that must never produce a valid amount at any precision
    pub fn invalid() -> Vec<&'static str> {
        vec![
            "",
            "   ",
            "0",
            "0.0",
            "-1",
            "-0.5",
            "abc",
            "1,5",
            "1.2.3",
            ".",
            "1e6",
            "0x10",
            "+1",
            "NaN",
            "Infinity",
        ]
    }

    /// A string one past the uint256 range at zero decimals
    pub fn overflow() -> String {
        // 2^256 = 115792089237316195423570985008687907853269984665640564039457584007913129639936
        "115792089237316195423570985008687907853269984665640564039457584007913129639936"
            .to_string()
    }
}

// ============================================================================
// Property-Based Testing Strategies
// ============================================================================

/// Generates a valid amount string for `decimals` with its expected base-unit value
pub fn valid_amount_text(decimals: u8) -> impl Strategy<Value = (String, U256)> {
    let scale = U256::from(10u64).pow(U256::from(decimals));
    (0u64..1_000_000_000, 0..=decimals as usize)
        .prop_flat_map(move |(whole, frac_len)| {
            let max_frac = 10u64.saturating_pow(frac_len as u32);
            (Just(whole), Just(frac_len), 0..max_frac.max(1))
        })
        .prop_filter("amount must be positive", |(whole, _, frac)| *whole > 0 || *frac > 0)
        .prop_map(move |(whole, frac_len, frac)| {
            let text = if frac_len == 0 {
                whole.to_string()
            } else {
                format!("{whole}.{frac:0width$}", width = frac_len)
            };
            let frac_scale = U256::from(10u64).pow(U256::from(decimals as usize - frac_len));
            let value = U256::from(whole) * scale + U256::from(frac) * frac_scale;
            (text, value)
        })
}

/// Generates strings with more fractional digits than `decimals` allows
pub fn excess_precision_text(decimals: u8) -> impl Strategy<Value = String> {
    (0u64..1_000, 1u64..10).prop_map(move |(whole, last)| {
        format!("{whole}.{}{last}", "0".repeat(decimals as usize))
    })
}

/// Generates strings that contain a character no amount may contain
pub fn non_numeric_text() -> impl Strategy<Value = String> {
    "[0-9]{0,4}[a-zA-Z,_+*/][0-9]{0,4}"
}

/// Generates an arbitrary uint256 base-unit value
pub fn base_units() -> impl Strategy<Value = U256> {
    any::<[u8; 32]>().prop_map(|bytes| U256::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fourmica_traits::{format_units, Amount, AmountError};

    #[test]
    fn test_edge_case_amounts_are_invalid() {
        for text in EdgeCaseAmounts::invalid() {
            assert!(Amount::parse(text, 18).is_err(), "{text:?} should be rejected");
        }
    }

    #[test]
    fn test_usdc_boundaries() {
        assert_eq!(
            Amount::parse(EdgeCaseAmounts::USDC_MIN, 6).unwrap().value,
            U256::from(1u8)
        );
        assert_eq!(
            Amount::parse(EdgeCaseAmounts::USDC_TOO_PRECISE, 6),
            Err(AmountError::TooManyDecimals { max: 6 })
        );
    }

    #[test]
    fn test_overflow_string() {
        assert_eq!(
            Amount::parse(&EdgeCaseAmounts::overflow(), 0),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn test_record_fixtures() {
        assert!(active_record(Address::ZERO).is_active());
        assert!(!empty_record(Address::ZERO).is_active());
    }

    proptest! {
        #[test]
        fn test_valid_text_parses_to_expected_value((text, value) in valid_amount_text(6)) {
            let amount = Amount::parse(&text, 6).unwrap();
            prop_assert_eq!(amount.value, value);
        }

        #[test]
        fn test_valid_text_parses_at_eighteen_decimals((text, value) in valid_amount_text(18)) {
            prop_assert_eq!(Amount::parse(&text, 18).map(|a| a.value), Ok(value));
        }

        #[test]
        fn test_excess_precision_rejected(text in excess_precision_text(6)) {
            prop_assert_eq!(Amount::parse(&text, 6), Err(AmountError::TooManyDecimals { max: 6 }));
        }

        #[test]
        fn test_non_numeric_rejected(text in non_numeric_text()) {
            prop_assert!(Amount::parse(&text, 18).is_err());
        }

        #[test]
        fn test_formatted_balance_parses_back(value in base_units(), decimals in 0u8..=18) {
            prop_assume!(!value.is_zero());
            let text = format_units(value, decimals);
            prop_assert_eq!(Amount::parse(&text, decimals).map(|a| a.value), Ok(value));
        }
    }
}
