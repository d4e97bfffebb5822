//! On-chain liquidation executor contract (C11, §6.2).
//!
//! The deployed contract exposes three overloads distinguished by flash
//! source, each taking the same liquidation/swap parameter shapes:
//!
//! - `executeWithFlashPool` — Aave-style flash loan from the lending pool.
//! - `executeWithV2FlashSwap` — flash swap against a V2 pair.
//! - `executeWithV3Flash` — flash against a V3 pool.
//!
//! `SwapParams.path` is encoded differently per `swapKind`; [`encode_path`]
//! and [`decode_path`] are exact inverses of each other (R1).

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolValue};
use anyhow::{anyhow, Result};

sol! {
    #[derive(Debug, Clone)]
    struct LiquidationParams {
        address collateralAsset;
        address debtAsset;
        address user;
        uint256 amount;
        uint256 transferAmount;
        uint256 debtToCover;
    }

    #[derive(Debug, Clone)]
    struct SwapParams {
        uint8 swapKind;
        address router;
        bytes path;
        uint256 amountIn;
        uint256 amountOutMin;
        bytes adapters;
    }

    /// On-chain liquidation executor (§6.2).
    #[sol(rpc)]
    interface ILiquidationExecutor {
        function executeWithFlashPool(
            LiquidationParams params,
            SwapParams primarySwap,
            SwapParams residualSwap,
            address receiver
        ) external returns (uint256 profit);

        function executeWithV2FlashSwap(
            address pairAddress,
            LiquidationParams params,
            SwapParams primarySwap,
            SwapParams residualSwap,
            address receiver
        ) external returns (uint256 profit);

        function executeWithV3Flash(
            address poolAddress,
            LiquidationParams params,
            SwapParams primarySwap,
            SwapParams residualSwap,
            address receiver
        ) external returns (uint256 profit);
    }
}

/// Which DEX shape a [`SwapParams`] targets; selects `path` encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SwapKind {
    V2 = 0,
    V3 = 1,
    NativeAggregator = 2,
    ExternalAggregator = 3,
}

impl SwapKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::V2),
            1 => Some(Self::V3),
            2 => Some(Self::NativeAggregator),
            3 => Some(Self::ExternalAggregator),
            _ => None,
        }
    }
}

/// A decoded swap path, independent of `swapKind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapPath {
    /// V2: ordered token hop list.
    Tokens(Vec<Address>),
    /// V3: `(token, fee)` pairs terminated by the final token.
    V3Hops(Vec<Address>, Vec<u32>),
    /// Stable pool or aggregator call: `(token0, token1, innerCalldata)`.
    Tuple(Address, Address, Bytes),
}

/// Encode a swap path per `swapKind` (R1: `decode_path(encode_path(p)) == p`).
pub fn encode_path(kind: SwapKind, path: &SwapPath) -> Result<Bytes> {
    match (kind, path) {
        (SwapKind::V2, SwapPath::Tokens(tokens)) => {
            let mut out = Vec::with_capacity(tokens.len() * 20);
            for t in tokens {
                out.extend_from_slice(t.as_slice());
            }
            Ok(Bytes::from(out))
        }
        (SwapKind::V3, SwapPath::V3Hops(tokens, fees)) => {
            if tokens.len() != fees.len() + 1 {
                return Err(anyhow!("v3 path needs one more token than fee"));
            }
            let mut out = Vec::with_capacity(tokens.len() * 20 + fees.len() * 3);
            for (i, t) in tokens.iter().enumerate() {
                out.extend_from_slice(t.as_slice());
                if i < fees.len() {
                    let fee = fees[i] & 0xFF_FFFF;
                    out.push((fee >> 16) as u8);
                    out.push((fee >> 8) as u8);
                    out.push(fee as u8);
                }
            }
            Ok(Bytes::from(out))
        }
        (SwapKind::NativeAggregator, SwapPath::Tuple(t0, t1, inner))
        | (SwapKind::ExternalAggregator, SwapPath::Tuple(t0, t1, inner)) => {
            Ok(Bytes::from((*t0, *t1, inner.clone()).abi_encode()))
        }
        _ => Err(anyhow!("swap kind does not match path variant")),
    }
}

/// Decode a swap path produced by [`encode_path`] for the given `swapKind`.
pub fn decode_path(kind: SwapKind, path: &Bytes) -> Result<SwapPath> {
    match kind {
        SwapKind::V2 => {
            if path.len() % 20 != 0 || path.is_empty() {
                return Err(anyhow!("malformed v2 path: {} bytes", path.len()));
            }
            let tokens = path.chunks_exact(20).map(Address::from_slice).collect();
            Ok(SwapPath::Tokens(tokens))
        }
        SwapKind::V3 => {
            if path.len() < 20 || (path.len() - 20) % 23 != 0 {
                return Err(anyhow!("malformed v3 path: {} bytes", path.len()));
            }
            let mut tokens = vec![Address::from_slice(&path[0..20])];
            let mut fees = Vec::new();
            let mut offset = 20;
            while offset < path.len() {
                let fee = ((path[offset] as u32) << 16)
                    | ((path[offset + 1] as u32) << 8)
                    | (path[offset + 2] as u32);
                fees.push(fee);
                tokens.push(Address::from_slice(&path[offset + 3..offset + 23]));
                offset += 23;
            }
            Ok(SwapPath::V3Hops(tokens, fees))
        }
        SwapKind::NativeAggregator | SwapKind::ExternalAggregator => {
            let (t0, t1, inner) = <(Address, Address, Bytes)>::abi_decode(path, true)
                .map_err(|e| anyhow!("malformed tuple path: {e}"))?;
            Ok(SwapPath::Tuple(t0, t1, inner))
        }
    }
}

/// Convenience constructor matching `swapKind` and `path` consistently.
pub fn build_swap_params(
    kind: SwapKind,
    router: Address,
    path: &SwapPath,
    amount_in: U256,
    amount_out_min: U256,
    adapters: Bytes,
) -> Result<SwapParams> {
    Ok(SwapParams {
        swapKind: kind as u8,
        router,
        path: encode_path(kind, path)?,
        amountIn: amount_in,
        amountOutMin: amount_out_min,
        adapters,
    })
}

pub fn encode_execute_with_flash_pool(
    params: LiquidationParams,
    primary_swap: SwapParams,
    residual_swap: SwapParams,
    receiver: Address,
) -> Bytes {
    Bytes::from(
        ILiquidationExecutor::executeWithFlashPoolCall {
            params,
            primarySwap: primary_swap,
            residualSwap: residual_swap,
            receiver,
        }
        .abi_encode(),
    )
}

pub fn encode_execute_with_v2_flash_swap(
    pair_address: Address,
    params: LiquidationParams,
    primary_swap: SwapParams,
    residual_swap: SwapParams,
    receiver: Address,
) -> Bytes {
    Bytes::from(
        ILiquidationExecutor::executeWithV2FlashSwapCall {
            pairAddress: pair_address,
            params,
            primarySwap: primary_swap,
            residualSwap: residual_swap,
            receiver,
        }
        .abi_encode(),
    )
}

pub fn encode_execute_with_v3_flash(
    pool_address: Address,
    params: LiquidationParams,
    primary_swap: SwapParams,
    residual_swap: SwapParams,
    receiver: Address,
) -> Bytes {
    Bytes::from(
        ILiquidationExecutor::executeWithV3FlashCall {
            poolAddress: pool_address,
            params,
            primarySwap: primary_swap,
            residualSwap: residual_swap,
            receiver,
        }
        .abi_encode(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    #[test]
    fn v2_path_round_trips() {
        let path = SwapPath::Tokens(vec![addr(1), addr(2), addr(3)]);
        let encoded = encode_path(SwapKind::V2, &path).unwrap();
        assert_eq!(encoded.len(), 60);
        assert_eq!(decode_path(SwapKind::V2, &encoded).unwrap(), path);
    }

    #[test]
    fn v3_path_round_trips() {
        let path = SwapPath::V3Hops(vec![addr(1), addr(2)], vec![3000]);
        let encoded = encode_path(SwapKind::V3, &path).unwrap();
        assert_eq!(encoded.len(), 20 + 3 + 20);
        assert_eq!(decode_path(SwapKind::V3, &encoded).unwrap(), path);
    }

    #[test]
    fn v3_multi_hop_path_round_trips() {
        let path = SwapPath::V3Hops(vec![addr(1), addr(2), addr(3)], vec![500, 3000]);
        let encoded = encode_path(SwapKind::V3, &path).unwrap();
        assert_eq!(decode_path(SwapKind::V3, &encoded).unwrap(), path);
    }

    #[test]
    fn tuple_path_round_trips() {
        let inner = Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]);
        let path = SwapPath::Tuple(addr(4), addr(5), inner);
        let encoded = encode_path(SwapKind::NativeAggregator, &path).unwrap();
        assert_eq!(
            decode_path(SwapKind::NativeAggregator, &encoded).unwrap(),
            path
        );
    }

    #[test]
    fn malformed_v2_path_is_rejected() {
        let bad = Bytes::from(vec![0u8; 19]);
        assert!(decode_path(SwapKind::V2, &bad).is_err());
    }

    #[test]
    fn encode_execute_with_flash_pool_selector_is_stable() {
        let params = LiquidationParams {
            collateralAsset: addr(1),
            debtAsset: addr(2),
            user: addr(3),
            amount: U256::from(100u64),
            transferAmount: U256::from(100u64),
            debtToCover: U256::from(50u64),
        };
        let swap = build_swap_params(
            SwapKind::V2,
            addr(6),
            &SwapPath::Tokens(vec![addr(2), addr(1)]),
            U256::from(50u64),
            U256::from(40u64),
            Bytes::new(),
        )
        .unwrap();
        let calldata =
            encode_execute_with_flash_pool(params, swap.clone(), swap, addr(7));
        assert_eq!(
            &calldata[..4],
            &ILiquidationExecutor::executeWithFlashPoolCall::SELECTOR
        );
    }
}
