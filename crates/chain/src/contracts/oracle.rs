//! Protocol price oracle interface (C2, §6.4).
//!
//! The agent reads prices from a single Aave-style oracle contract that
//! answers for every listed asset, not one Chainlink feed per asset — see
//! `common.rs`'s `IAggregator` for the Chainlink shape kept around for test
//! fixtures only.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolValue};

sol! {
    /// Aave V3-style price oracle (subset: batch-friendly single asset read).
    #[sol(rpc)]
    interface IPriceOracle {
        function getAssetPrice(address asset) external view returns (uint256);
        function getSourceOfAsset(address asset) external view returns (address);
    }
}

/// Encode a `getAssetPrice` read for an `aggregate3` batch.
pub fn encode_get_asset_price(asset: Address) -> Bytes {
    Bytes::from(IPriceOracle::getAssetPriceCall { asset }.abi_encode())
}

/// Decode a `getAssetPrice` return value.
pub fn decode_get_asset_price(data: &[u8]) -> anyhow::Result<U256> {
    U256::abi_decode(data, true).map_err(|e| anyhow::anyhow!("malformed getAssetPrice return: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolCall;

    #[test]
    fn encode_get_asset_price_matches_selector() {
        let calldata = encode_get_asset_price(Address::repeat_byte(1));
        assert_eq!(&calldata[..4], &IPriceOracle::getAssetPriceCall::SELECTOR);
    }
}
