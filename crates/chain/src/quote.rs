//! Liquidity probe: batched DEX quoting across the three venue shapes (C3,
//! §4.3).
//!
//! All quotes for one sizing pass are packed into as few `aggregate3` calls
//! as the configured chunk limit allows (P10: at most `ceil(N / chunkLimit)`
//! aggregator calls), with `allowFailure = true` so one bad pool can't sink
//! the whole batch — a failed sub-call is simply absent from the result map,
//! and its caller falls back to the next-priority strategy.

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use std::collections::HashMap;

use crate::contracts::common::{BatchCall, IMulticall3};
use crate::contracts::venues::{encode_stable_get_dy, encode_v2_amounts_out, encode_v3_slot0, IV2Router, IV3Pool};
use crate::rpc::RpcGateway;

/// Default number of sub-calls packed into one `aggregate3` round trip.
pub const DEFAULT_CHUNK_LIMIT: usize = 50;

/// One venue to probe for a given `(amount_in, pool)` pair.
#[derive(Debug, Clone)]
pub enum ProbeRequest {
    V2 { pool: Address, router: Address, token_in: Address, token_out: Address, amount_in: U256 },
    V3 { pool: Address, fee_micro: u32 },
    Stable { pool: Address, idx_in: i8, idx_out: i8, amount_in: U256 },
}

impl ProbeRequest {
    fn pool(&self) -> Address {
        match self {
            Self::V2 { pool, .. } | Self::V3 { pool, .. } | Self::Stable { pool, .. } => *pool,
        }
    }

    fn target_and_calldata(&self) -> (Address, alloy::primitives::Bytes) {
        match self {
            Self::V2 { router, token_in, token_out, amount_in, .. } => (
                *router,
                encode_v2_amounts_out(*amount_in, vec![*token_in, *token_out]),
            ),
            Self::V3 { pool, .. } => (*pool, encode_v3_slot0()),
            Self::Stable { pool, idx_in, idx_out, amount_in, .. } => {
                (*pool, encode_stable_get_dy(*idx_in, *idx_out, *amount_in))
            }
        }
    }
}

/// A quote as read back from one venue, ranking-comparable within this
/// sizing pass only (not a guaranteed execution price — see the V3
/// `sqrtPriceX96` open-question resolution in `DESIGN.md`).
#[derive(Debug, Clone, Copy)]
pub struct VenueQuote {
    pub pool: Address,
    pub amount_out: U256,
}

/// Batches DEX reads through the Multicall3-style aggregator contract.
pub struct LiquidityProbe {
    chunk_limit: usize,
}

impl LiquidityProbe {
    pub fn new() -> Self {
        Self { chunk_limit: DEFAULT_CHUNK_LIMIT }
    }

    pub fn with_chunk_limit(chunk_limit: usize) -> Self {
        Self { chunk_limit: chunk_limit.max(1) }
    }

    /// Run every request through the aggregator in chunks, decoding each
    /// venue shape appropriately. Requests whose sub-call fails (revert, or
    /// `allowFailure` short-circuit) are simply absent from the result.
    pub async fn quote_many(
        &self,
        gateway: &RpcGateway,
        requests: &[ProbeRequest],
        v2_amount_in: U256,
    ) -> Result<HashMap<Address, VenueQuote>> {
        let mut out = HashMap::with_capacity(requests.len());
        let multicall = gateway.multicall_address();

        for chunk in requests.chunks(self.chunk_limit) {
            let calls: Vec<BatchCall> = chunk
                .iter()
                .map(|r| {
                    let (target, call_data) = r.target_and_calldata();
                    BatchCall { target, allow_failure: true, call_data }
                })
                .collect();

            let results = gateway
                .with_read_provider(|provider| {
                    let calls = calls.clone();
                    async move {
                        let contract = IMulticall3::new(multicall, provider);
                        let ret = contract
                            .aggregate3(calls.into_iter().map(Into::into).collect())
                            .call()
                            .await
                            .context("aggregate3 call failed")?;
                        Ok(ret.returnData)
                    }
                })
                .await?;

            for (req, result) in chunk.iter().zip(results.iter()) {
                if !result.success {
                    continue;
                }
                if let Some(quote) = decode_one(req, &result.returnData, v2_amount_in) {
                    out.insert(req.pool(), quote);
                }
            }
        }

        Ok(out)
    }
}

impl Default for LiquidityProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_one(req: &ProbeRequest, data: &[u8], v2_amount_in: U256) -> Option<VenueQuote> {
    match req {
        ProbeRequest::V2 { pool, .. } => {
            let amounts = IV2Router::getAmountsOutCall::abi_decode_returns(data, true).ok()?;
            amounts.last().copied().map(|amount_out| VenueQuote { pool: *pool, amount_out })
        }
        ProbeRequest::V3 { pool, fee_micro } => {
            let slot0 = IV3Pool::slot0Call::abi_decode_returns(data, true).ok()?;
            let amount_out = v3_local_quote(slot0.sqrtPriceX96, v2_amount_in, *fee_micro);
            Some(VenueQuote { pool: *pool, amount_out })
        }
        ProbeRequest::Stable { pool, .. } => {
            let dy = crate::contracts::venues::IStablePool::get_dyCall::abi_decode_returns(data, true).ok()?;
            Some(VenueQuote { pool: *pool, amount_out: dy })
        }
    }
}

/// Ranking-only V3 local quote from the pool's current `sqrtPriceX96`
/// (§9 open question 2): `amountOut = amountIn * (sqrtPrice^2 / 2^192) *
/// (1 - fee/1e6)`. Never the figure submitted on-chain — the executor always
/// widens by the slippage-tier tolerance before setting `amountOutMin`.
fn v3_local_quote(sqrt_price_x96: alloy::primitives::Uint<160, 3>, amount_in: U256, fee_micro: u32) -> U256 {
    let sqrt_price = U256::from(sqrt_price_x96);
    // price = (sqrtPriceX96^2) / 2^192, scaled by keeping amount_in's
    // precision: amountOut = amountIn * sqrtPrice^2 / 2^192.
    let numerator = amount_in.saturating_mul(sqrt_price).saturating_mul(sqrt_price);
    let denominator = U256::from(1u8) << 192;
    let raw_out = numerator / denominator;
    let fee_factor = U256::from(1_000_000u32.saturating_sub(fee_micro));
    (raw_out * fee_factor) / U256::from(1_000_000u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v3_local_quote_applies_fee() {
        // sqrtPriceX96 representing price = 1 (i.e. sqrtPrice = 2^96)
        let one_x96: alloy::primitives::Uint<160, 3> = alloy::primitives::Uint::from(1u8) << 96;
        let amount_in = U256::from(1_000_000u64);
        let out_no_fee = v3_local_quote(one_x96, amount_in, 0);
        assert_eq!(out_no_fee, amount_in);

        let out_with_fee = v3_local_quote(one_x96, amount_in, 3000);
        assert!(out_with_fee < out_no_fee);
    }

    #[test]
    fn chunk_limit_is_at_least_one() {
        let probe = LiquidityProbe::with_chunk_limit(0);
        assert_eq!(probe.chunk_limit, 1);
    }
}
