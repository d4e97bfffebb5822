//! DEX venue interfaces used by the liquidity probe (C3, §4.3).
//!
//! Three venue shapes: V2 constant-product routers, V3 concentrated-liquidity
//! pools (read via `slot0`, quoted locally as a ranking approximation, see
//! `DESIGN.md`'s open-question resolution on `sqrtPriceX96`), and Curve-style
//! stable pools quoted via `get_dy`.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    /// Uniswap V2-style router (subset: view-only quoting).
    #[sol(rpc)]
    interface IV2Router {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
    }

    /// Uniswap V3-style pool (subset: current price read).
    #[sol(rpc)]
    interface IV3Pool {
        function slot0() external view returns (
            uint160 sqrtPriceX96,
            int24 tick,
            uint16 observationIndex,
            uint16 observationCardinality,
            uint16 observationCardinalityNext,
            uint8 feeProtocol,
            bool unlocked
        );
        function token0() external view returns (address);
        function token1() external view returns (address);
        function fee() external view returns (uint24);
    }

    /// Curve-style stable pool (subset: `get_dy` quoting by signed index).
    #[sol(rpc)]
    interface IStablePool {
        function get_dy(int128 i, int128 j, uint256 dx) external view returns (uint256 dy);
        function coins(uint256 i) external view returns (address);
    }
}

/// Encode a `getAmountsOut` read for an `aggregate3` batch.
pub fn encode_v2_amounts_out(amount_in: U256, path: Vec<Address>) -> Bytes {
    Bytes::from(IV2Router::getAmountsOutCall { amountIn: amount_in, path }.abi_encode())
}

/// Encode a `slot0` read for an `aggregate3` batch.
pub fn encode_v3_slot0() -> Bytes {
    Bytes::from(IV3Pool::slot0Call {}.abi_encode())
}

/// Encode a `get_dy` read for a stable pool, by signed coin index.
pub fn encode_stable_get_dy(idx_in: i8, idx_out: i8, amount_in: U256) -> Bytes {
    Bytes::from(
        IStablePool::get_dyCall {
            i: alloy::primitives::Signed::<128, 2>::try_from(idx_in as i128).unwrap_or_default(),
            j: alloy::primitives::Signed::<128, 2>::try_from(idx_out as i128).unwrap_or_default(),
            dx: amount_in,
        }
        .abi_encode(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_v2_amounts_out_is_nonempty() {
        let path = vec![Address::repeat_byte(1), Address::repeat_byte(2)];
        let calldata = encode_v2_amounts_out(U256::from(1_000_000u64), path);
        assert!(!calldata.is_empty());
    }

    #[test]
    fn encode_v3_slot0_matches_selector() {
        let calldata = encode_v3_slot0();
        assert_eq!(&calldata[..4], &IV3Pool::slot0Call::SELECTOR);
    }

    #[test]
    fn encode_stable_get_dy_is_nonempty() {
        let calldata = encode_stable_get_dy(0, 1, U256::from(500u64));
        assert!(!calldata.is_empty());
    }
}
