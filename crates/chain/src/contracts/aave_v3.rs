//! Aave V3-style lending pool interface (§6.1).
//!
//! Covers the two pool-level reads/writes the agent depends on:
//! `getUserAccountData` for health-factor and collateral/debt totals, and
//! `liquidationCall` for the direct (non flash-loan) liquidation path used
//! by the `V2DirectOverAaveFlash`/`V3DirectOverAaveFlash` strategies when
//! reasoning about reference pricing, plus the `LiquidationCall` event used
//! to detect a lost-race confirmation.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    /// Aave V3 protocol data provider (subset: per-reserve liquidation
    /// parameters, §4.2's `reserveConfigCache`).
    #[sol(rpc)]
    interface IProtocolDataProvider {
        function getReserveConfigurationData(address asset) external view returns (
            uint256 decimals,
            uint256 ltv,
            uint256 liquidationThreshold,
            uint256 liquidationBonus,
            uint256 reserveFactor,
            bool usageAsCollateralEnabled,
            bool borrowingEnabled,
            bool stableBorrowRateEnabled,
            bool isActive,
            bool isFrozen
        );
    }

    /// Aave V3 Pool interface (subset used by the agent).
    interface IPool {
        event Supply(address indexed reserve, address user, address indexed onBehalfOf, uint256 amount, uint16 indexed referralCode);
        event Withdraw(address indexed reserve, address indexed user, address indexed to, uint256 amount);
        event Borrow(address indexed reserve, address user, address indexed onBehalfOf, uint256 amount, uint8 interestRateMode, uint256 borrowRate, uint16 indexed referralCode);
        event Repay(address indexed reserve, address indexed user, address indexed repayer, uint256 amount, bool useATokens);
        event LiquidationCall(address indexed collateralAsset, address indexed debtAsset, address indexed user, uint256 debtToCover, uint256 liquidatedCollateralAmount, address liquidator, bool receiveAToken);

        /// `totalDebtBase`/`totalCollateralBase` are denominated in the pool's
        /// base currency (8-decimal USD on Aave V3 forks); `healthFactor` is
        /// WAD-scaled with `type(uint256).max` meaning "no debt".
        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );

        /// Liquidate a position directly against the pool (no flash loan).
        function liquidationCall(
            address collateralAsset,
            address debtAsset,
            address user,
            uint256 debtToCover,
            bool receiveAToken
        ) external;
    }
}

/// Event signature constants for the pool's Aave-style events.
pub mod aave_v3_signatures {
    use super::*;

    /// keccak256("Supply(address,address,address,uint256,uint16)")
    pub const SUPPLY: B256 = B256::new([
        0x2b, 0x62, 0x77, 0x36, 0xbc, 0xa1, 0x5c, 0xd5, 0x38, 0x1d, 0xcf, 0x80, 0xb0, 0xbf, 0x11,
        0xfd, 0x19, 0x7d, 0x01, 0xa0, 0x37, 0xc5, 0x2b, 0x92, 0x7a, 0x88, 0x1a, 0x10, 0xfb, 0x73,
        0xba, 0x61,
    ]);

    /// keccak256("Withdraw(address,address,address,uint256)")
    pub const WITHDRAW: B256 = B256::new([
        0x31, 0x15, 0xd1, 0x44, 0x9a, 0x7b, 0x73, 0x2c, 0x98, 0x6c, 0xba, 0x18, 0x24, 0x4e, 0x89,
        0x7a, 0x45, 0x0f, 0x61, 0xe1, 0xbb, 0x8d, 0x58, 0x9c, 0xd2, 0xe6, 0x9e, 0x6c, 0x89, 0x24,
        0xf9, 0xf7,
    ]);

    /// keccak256("Borrow(address,address,address,uint256,uint8,uint256,uint16)")
    pub const BORROW: B256 = B256::new([
        0xb3, 0xd0, 0x84, 0x82, 0x0f, 0xb1, 0xa9, 0xde, 0xcf, 0xfb, 0x17, 0x64, 0x36, 0xbd, 0x02,
        0x55, 0x8d, 0x15, 0xfa, 0xc9, 0xb0, 0xdd, 0xfe, 0xd8, 0xc4, 0x65, 0xbc, 0x73, 0x59, 0xd7,
        0xdc, 0xe0,
    ]);

    /// keccak256("Repay(address,address,address,uint256,bool)")
    pub const REPAY: B256 = B256::new([
        0xa5, 0x34, 0xc8, 0xdb, 0xe7, 0x1f, 0x87, 0x1f, 0x9f, 0x35, 0x30, 0xe9, 0x7a, 0x74, 0x60,
        0x1f, 0xea, 0x17, 0xb4, 0x26, 0xca, 0xe0, 0x2e, 0x1c, 0x5a, 0xee, 0x42, 0xc9, 0x6c, 0x78,
        0x40, 0x51,
    ]);

    /// keccak256("LiquidationCall(address,address,address,uint256,uint256,address,bool)")
    pub const LIQUIDATION_CALL: B256 = B256::new([
        0xe4, 0x13, 0xa3, 0x21, 0xe8, 0x68, 0x1d, 0x83, 0x1f, 0x4d, 0xbc, 0xcb, 0xca, 0x79, 0x0d,
        0x29, 0x52, 0xb5, 0x6f, 0x97, 0x79, 0x08, 0xe4, 0x5b, 0xe3, 0x73, 0x35, 0x53, 0x3e, 0x00,
        0x52, 0x86,
    ]);

    /// Get all pool event signatures.
    pub fn pool_signatures() -> Vec<B256> {
        vec![SUPPLY, WITHDRAW, BORROW, REPAY, LIQUIDATION_CALL]
    }
}

/// Encode a direct (non flash-loan) pool liquidation call.
pub fn encode_pool_liquidation(
    collateral: Address,
    debt: Address,
    user: Address,
    debt_to_cover: U256,
    receive_atoken: bool,
) -> Bytes {
    let call = IPool::liquidationCallCall {
        collateralAsset: collateral,
        debtAsset: debt,
        user,
        debtToCover: debt_to_cover,
        receiveAToken: receive_atoken,
    };
    Bytes::from(call.abi_encode())
}

/// Encode a `getUserAccountData` read, for batching through the aggregator
/// contract (§6.3) or calling directly.
pub fn encode_get_user_account_data(user: Address) -> Bytes {
    Bytes::from(IPool::getUserAccountDataCall { user }.abi_encode())
}

/// Encode a `getReserveConfigurationData` read for the `reserveConfigCache`
/// (§4.2), for batching through the aggregator contract.
pub fn encode_get_reserve_configuration_data(asset: Address) -> Bytes {
    Bytes::from(IProtocolDataProvider::getReserveConfigurationDataCall { asset }.abi_encode())
}

/// A borrower's account snapshot as returned by `getUserAccountData`: base
/// values in the oracle's numeraire (8 fractional digits), `healthFactor`
/// WAD-scaled with `U256::MAX` meaning "no debt" (§6.1).
#[derive(Debug, Clone, Copy)]
pub struct UserAccountData {
    pub total_collateral_base: U256,
    pub total_debt_base: U256,
    pub available_borrows_base: U256,
    pub current_liquidation_threshold: U256,
    pub ltv: U256,
    pub health_factor: U256,
}

/// Decode a `getUserAccountData` return value, for both direct calls and
/// `aggregate3`-batched reads (C9, C10, C11 step 1).
pub fn decode_get_user_account_data(data: &[u8]) -> anyhow::Result<UserAccountData> {
    let ret = IPool::getUserAccountDataCall::abi_decode_returns(data, true)
        .map_err(|e| anyhow::anyhow!("malformed getUserAccountData return: {e}"))?;
    Ok(UserAccountData {
        total_collateral_base: ret.totalCollateralBase,
        total_debt_base: ret.totalDebtBase,
        available_borrows_base: ret.availableBorrowsBase,
        current_liquidation_threshold: ret.currentLiquidationThreshold,
        ltv: ret.ltv,
        health_factor: ret.healthFactor,
    })
}

/// Per-reserve liquidation parameters decoded from
/// `getReserveConfigurationData`, in basis points.
#[derive(Debug, Clone, Copy)]
pub struct ReserveConfig {
    pub liquidation_threshold_bps: u16,
    pub liquidation_bonus_bps: u16,
}

/// Decode a `getReserveConfigurationData` return value. Aave expresses both
/// fields in bps already (e.g. `8000` = 80% threshold, `10500` = 5% bonus
/// over par), so only a narrowing cast is needed.
pub fn decode_get_reserve_configuration_data(data: &[u8]) -> anyhow::Result<ReserveConfig> {
    let ret = IProtocolDataProvider::getReserveConfigurationDataCall::abi_decode_returns(data, true)
        .map_err(|e| anyhow::anyhow!("malformed getReserveConfigurationData return: {e}"))?;
    Ok(ReserveConfig {
        liquidation_threshold_bps: ret.liquidationThreshold.to::<u64>().min(u16::MAX as u64) as u16,
        liquidation_bonus_bps: ret
            .liquidationBonus
            .to::<u64>()
            .saturating_sub(10_000)
            .min(u16::MAX as u64) as u16,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_event_signatures_are_nonzero() {
        let sigs = aave_v3_signatures::pool_signatures();
        assert_eq!(sigs.len(), 5);
        assert!(!aave_v3_signatures::SUPPLY.is_zero());
        assert!(!aave_v3_signatures::LIQUIDATION_CALL.is_zero());
    }

    #[test]
    fn encode_pool_liquidation_is_nonempty() {
        let calldata = encode_pool_liquidation(
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            U256::from(1000),
            false,
        );
        assert!(!calldata.is_empty());
    }

    #[test]
    fn encode_get_user_account_data_matches_selector() {
        let calldata = encode_get_user_account_data(Address::repeat_byte(1));
        assert_eq!(&calldata[..4], &IPool::getUserAccountDataCall::SELECTOR);
    }

    #[test]
    fn encode_get_reserve_configuration_data_matches_selector() {
        let calldata = encode_get_reserve_configuration_data(Address::repeat_byte(2));
        assert_eq!(
            &calldata[..4],
            &IProtocolDataProvider::getReserveConfigurationDataCall::SELECTOR
        );
    }

    #[test]
    fn user_account_data_round_trips_through_abi() {
        let call = IPool::getUserAccountDataCall { user: Address::repeat_byte(3) };
        let encoded = call.abi_encode();
        assert_eq!(&encoded[..4], &IPool::getUserAccountDataCall::SELECTOR);

        let returns = IPool::getUserAccountDataReturn {
            totalCollateralBase: U256::from(1_000_00000000u64),
            totalDebtBase: U256::from(500_00000000u64),
            availableBorrowsBase: U256::from(100_00000000u64),
            currentLiquidationThreshold: U256::from(8000u64),
            ltv: U256::from(7500u64),
            healthFactor: U256::from(2u64) * U256::from(10u64).pow(U256::from(18u64)),
        };
        let encoded_returns = alloy::sol_types::SolValue::abi_encode(&(
            returns.totalCollateralBase,
            returns.totalDebtBase,
            returns.availableBorrowsBase,
            returns.currentLiquidationThreshold,
            returns.ltv,
            returns.healthFactor,
        ));
        let decoded = decode_get_user_account_data(&encoded_returns).unwrap();
        assert_eq!(decoded.total_debt_base, U256::from(500_00000000u64));
        assert_eq!(decoded.health_factor, returns.healthFactor);
    }
}
