//! Balances-reader contract: per-asset collateral/debt breakdown.
//!
//! `getUserAccountData` (§6.1) only returns aggregated totals; building
//! `Position.collaterals`/`Position.debts` needs a per-reserve balance list,
//! which this helper contract provides directly with its price already
//! attached, avoiding a separate oracle round trip per asset.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    #[derive(Debug)]
    struct BalanceEntry {
        address underlying;
        uint256 amount;
        uint256 price;
        uint256 decimals;
    }

    #[sol(rpc)]
    interface IBalancesReader {
        function getAllSuppliedBalancesWithPrices(address pool, address user) external view returns (BalanceEntry[] memory);
        function getAllBorrowedBalancesWithPrices(address pool, address user) external view returns (BalanceEntry[] memory);
    }
}

/// One reserve's balance, as returned by either `BalancesReader` method.
#[derive(Debug, Clone, Copy)]
pub struct BalanceEntryData {
    pub underlying: Address,
    pub amount: U256,
    pub price: U256,
    pub decimals: u8,
}

impl From<BalanceEntry> for BalanceEntryData {
    fn from(entry: BalanceEntry) -> Self {
        Self {
            underlying: entry.underlying,
            amount: entry.amount,
            price: entry.price,
            decimals: entry.decimals.to::<u8>(),
        }
    }
}

/// Encode a `getAllSuppliedBalancesWithPrices` read, for batching through
/// `aggregate3`.
pub fn encode_get_supplied_balances(pool: Address, user: Address) -> Bytes {
    Bytes::from(IBalancesReader::getAllSuppliedBalancesWithPricesCall { pool, user }.abi_encode())
}

/// Encode a `getAllBorrowedBalancesWithPrices` read, for batching through
/// `aggregate3`.
pub fn encode_get_borrowed_balances(pool: Address, user: Address) -> Bytes {
    Bytes::from(IBalancesReader::getAllBorrowedBalancesWithPricesCall { pool, user }.abi_encode())
}

/// Decode either method's return value — both share the same
/// `BalanceEntry[]` shape.
pub fn decode_balances(data: &[u8]) -> anyhow::Result<Vec<BalanceEntryData>> {
    let ret = IBalancesReader::getAllSuppliedBalancesWithPricesCall::abi_decode_returns(data, true)
        .map_err(|e| anyhow::anyhow!("malformed balances return: {e}"))?;
    Ok(ret._0.into_iter().map(BalanceEntryData::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_supplied_matches_selector() {
        let calldata = encode_get_supplied_balances(Address::repeat_byte(1), Address::repeat_byte(2));
        assert_eq!(
            &calldata[..4],
            &IBalancesReader::getAllSuppliedBalancesWithPricesCall::SELECTOR
        );
    }

    #[test]
    fn encode_borrowed_matches_selector() {
        let calldata = encode_get_borrowed_balances(Address::repeat_byte(1), Address::repeat_byte(2));
        assert_eq!(
            &calldata[..4],
            &IBalancesReader::getAllBorrowedBalancesWithPricesCall::SELECTOR
        );
    }

    #[test]
    fn decode_balances_round_trips() {
        let entries = vec![
            BalanceEntry {
                underlying: Address::repeat_byte(3),
                amount: U256::from(1_000_000u64),
                price: U256::from(100_000_000u64),
                decimals: U256::from(6u64),
            },
            BalanceEntry {
                underlying: Address::repeat_byte(4),
                amount: U256::from(2_000_000_000_000_000_000u64),
                price: U256::from(200_000_000_000u64),
                decimals: U256::from(18u64),
            },
        ];
        let encoded = alloy::sol_types::SolValue::abi_encode(&(entries,));
        let decoded = decode_balances(&encoded).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].decimals, 6);
        assert_eq!(decoded[1].decimals, 18);
    }
}
