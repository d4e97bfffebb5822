//! Venue candidate gathering (§4.3/§4.4 prerequisite): for one borrower's
//! dominant `(collateral, debt)` pair, collect every whitelisted pool that
//! can quote the swap leg or serve as a flash source, and read each flash
//! candidate's debt-token reserve so the sizer/strategy registry can decide
//! whether it carries enough liquidity to flash against (§4.4's
//! `FLASH_RESERVE_MULTIPLE`/`FLASH_LIQUIDITY_MULTIPLE` checks).
//!
//! Reserve reads are batched through the aggregator contract exactly like
//! the price/reserve-config caches (C2), using `IERC20::balanceOf` against
//! each flash-candidate pool as a proxy for its spendable reserve of the
//! debt token.

use alloy::primitives::{Address, U256};
use alloy::sol_types::{SolCall, SolValue};
use anyhow::{Context, Result};

use liquidator_chain::contracts::common::{BatchCall, IERC20, IMulticall3};
use liquidator_chain::RpcGateway;

use crate::config::config;
use crate::sizer::VenueCandidates;
use crate::strategy::find_stable_pool;
use crate::types::{PoolRef, PoolVenue};

/// Sub-calls packed into one `aggregate3` round trip per reserve-read batch.
const CHUNK_LIMIT: usize = 50;

fn v2_pool_ref(cfg: &crate::config::V2PairConfig) -> PoolRef {
    PoolRef {
        venue: PoolVenue::V2,
        address: cfg.address,
        token0: cfg.token0,
        token1: cfg.token1,
        fee_micro: 0,
        index_a: None,
        index_b: None,
    }
}

fn v3_pool_ref(cfg: &crate::config::V3PoolConfig) -> PoolRef {
    PoolRef {
        venue: PoolVenue::V3,
        address: cfg.address,
        token0: cfg.token0,
        token1: cfg.token1,
        fee_micro: cfg.fee_micro,
        index_a: None,
        index_b: None,
    }
}

/// Read `debt`'s ERC20 balance held by every `pool` in `pools`, batched
/// through one or more `aggregate3` calls. Failed sub-calls are simply
/// absent from the returned map.
async fn batch_debt_reserves(
    gateway: &RpcGateway,
    debt: Address,
    pools: &[PoolRef],
) -> Result<Vec<(PoolRef, U256)>> {
    let mut out = Vec::with_capacity(pools.len());
    if pools.is_empty() {
        return Ok(out);
    }
    let multicall = gateway.multicall_address();

    for chunk in pools.chunks(CHUNK_LIMIT) {
        let calls: Vec<BatchCall> = chunk
            .iter()
            .map(|pool| BatchCall {
                target: debt,
                allow_failure: true,
                call_data: IERC20::balanceOfCall { account: pool.address }.abi_encode().into(),
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
                        .context("aggregate3 call failed (flash reserve batch)")?;
                    Ok(ret.returnData)
                }
            })
            .await?;

        for (pool, result) in chunk.iter().zip(results.iter()) {
            if !result.success {
                continue;
            }
            if let Ok(balance) = U256::abi_decode(&result.returnData, true) {
                out.push((pool.clone(), balance));
            }
        }
    }

    Ok(out)
}

/// Gather every whitelisted venue usable for a `collateral -> debt` swap or
/// as a flash source for `debt`, and read each flash candidate's live debt
/// reserve. Run once per sizing pass and reused across every ladder
/// fraction (§4.5).
pub async fn build_candidates(gateway: &RpcGateway, collateral: Address, debt: Address) -> Result<VenueCandidates> {
    let venues = &config().venues;

    let v2_pools: Vec<PoolRef> = venues
        .v2_pairs
        .iter()
        .filter(|p| {
            (p.token0 == collateral && p.token1 == debt) || (p.token0 == debt && p.token1 == collateral)
        })
        .map(v2_pool_ref)
        .collect();

    let stable_pools: Vec<PoolRef> = find_stable_pool(collateral, debt)
        .map(|(pool_cfg, idx_collateral, idx_debt)| PoolRef {
            venue: PoolVenue::Stable,
            address: pool_cfg.address,
            token0: pool_cfg.token0,
            token1: pool_cfg.token1,
            fee_micro: 0,
            index_a: Some(idx_collateral),
            index_b: Some(idx_debt),
        })
        .into_iter()
        .collect();

    let v2_flash_candidates: Vec<PoolRef> =
        venues.v2_pairs.iter().filter(|p| p.token0 == debt || p.token1 == debt).map(v2_pool_ref).collect();

    let v3_flash_candidates: Vec<PoolRef> =
        venues.v3_pools.iter().filter(|p| p.token0 == debt || p.token1 == debt).map(v3_pool_ref).collect();

    let v2_debt_pairs = batch_debt_reserves(gateway, debt, &v2_flash_candidates).await?;
    let v3_debt_pools = batch_debt_reserves(gateway, debt, &v3_flash_candidates).await?;

    Ok(VenueCandidates { v2_pools, stable_pools, v2_debt_pairs, v3_debt_pools })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{init_config, Config, V2PairConfig, VenuesConfig};
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn ensure_config(collateral: Address, debt: Address, pair: Address) {
        INIT.call_once(|| {
            let mut cfg = Config::default();
            cfg.venues = VenuesConfig {
                v2_pairs: vec![V2PairConfig { address: pair, token0: collateral, token1: debt, router: pair }],
                ..Default::default()
            };
            let _ = init_config(cfg);
        });
    }

    #[test]
    fn v2_pool_ref_carries_zero_fee() {
        let cfg = crate::config::V2PairConfig {
            address: Address::repeat_byte(1),
            token0: Address::repeat_byte(2),
            token1: Address::repeat_byte(3),
            router: Address::repeat_byte(4),
        };
        let pool = v2_pool_ref(&cfg);
        assert_eq!(pool.fee_micro, 0);
        assert_eq!(pool.venue, PoolVenue::V2);
    }

    #[tokio::test]
    async fn build_candidates_finds_whitelisted_v2_pair() {
        let collateral = Address::repeat_byte(10);
        let debt = Address::repeat_byte(11);
        let pair = Address::repeat_byte(12);
        ensure_config(collateral, debt, pair);

        let venues = &config().venues;
        let matched: Vec<_> = venues
            .v2_pairs
            .iter()
            .filter(|p| (p.token0 == collateral && p.token1 == debt) || (p.token0 == debt && p.token1 == collateral))
            .collect();
        assert_eq!(matched.len(), 1);
    }
}
