//! ABI bindings for the contracts the registration page touches.

use alloy::sol;

sol! {
    /// Core4Mica collateral contract, reduced to the deposit path.
    #[sol(rpc)]
    contract Core4Mica {
        struct UserAssetInfo {
            address asset;
            uint256 collateral;
            uint256 withdrawalRequestTimestamp;
            uint256 withdrawalRequestAmount;
        }

        /// Every asset position of `user`.
        function getUserAllAssets(address user) external view returns (UserAssetInfo[] memory);

        /// Deposit native collateral.
        function deposit() external payable;

        /// Deposit `amount` of an allow-listed stablecoin; needs a prior approval.
        function depositStablecoin(address token, uint256 amount) external;

        event CollateralDeposited(address indexed user, address indexed asset, uint256 amount);
    }
}

sol! {
    /// Minimal ERC-20 surface: balance, allowance and approve.
    #[sol(rpc)]
    contract IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, U256};
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn test_deposit_selector() {
        let encoded = Core4Mica::depositCall {}.abi_encode();
        // deposit() selector is 0xd0e30db0
        assert_eq!(encoded, vec![0xd0, 0xe3, 0x0d, 0xb0]);
    }

    #[test]
    fn test_deposit_stablecoin_encoding() {
        let call = Core4Mica::depositStablecoinCall {
            token: address!("1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"),
            amount: U256::from(1_000_000u64),
        };
        assert_eq!(
            Core4Mica::depositStablecoinCall::SIGNATURE,
            "depositStablecoin(address,uint256)"
        );
        // 4 selector + 32 token + 32 amount
        assert_eq!(call.abi_encode().len(), 68);
    }

    #[test]
    fn test_get_user_all_assets_signature() {
        assert_eq!(
            Core4Mica::getUserAllAssetsCall::SIGNATURE,
            "getUserAllAssets(address)"
        );
    }

    #[test]
    fn test_collateral_deposited_signature() {
        assert_eq!(
            Core4Mica::CollateralDeposited::SIGNATURE,
            "CollateralDeposited(address,address,uint256)"
        );
    }

    #[test]
    fn test_approve_encoding() {
        let call = IERC20::approveCall {
            spender: address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045"),
            amount: U256::from(5u8),
        };
        let encoded = call.abi_encode();
        // approve(address,uint256) selector is 0x095ea7b3
        assert_eq!(&encoded[0..4], &[0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(encoded.len(), 68);
    }

    #[test]
    fn test_allowance_selector() {
        let call = IERC20::allowanceCall {
            owner: address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045"),
            spender: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        };
        // allowance(address,address) selector is 0xdd62ed3e
        assert_eq!(&call.abi_encode()[0..4], &[0xdd, 0x62, 0xed, 0x3e]);
    }
}
