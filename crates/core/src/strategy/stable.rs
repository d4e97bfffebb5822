//! `StableKittyOverAaveFlash` and `StableKittyOverV3Flash` (§4.4 priorities
//! 1 and 2): both assets are stable and a whitelisted stable pool exists for
//! the pair. The first borrows the debt via the money-market flash loan, the
//! second via a whitelisted V3 pool's flash; both swap collateral back to
//! debt through the stable pool's `exchange`.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use liquidator_chain::contracts::venues::IStablePool;
use liquidator_chain::{build_swap_params, FlashSource, SwapKind, SwapPath};

use crate::config::config;
use crate::config::StablePoolConfig;
use crate::types::{AssetId, PoolRef, PoolVenue, StrategyId};
use crate::u256_math::apply_basis_points_up;

use super::{liquidation_params, residual_swap, BuiltStrategy, Strategy, StrategyInput};

/// §9 open question 4: exact `(token0, token1)` match first, then the
/// reversed `(token1, token0)`, stopping at the first hit — the one
/// canonical ordering the spec settles on where the source had two
/// diverging `findStableKittyPool` implementations.
pub fn find_stable_pool(a: AssetId, b: AssetId) -> Option<(StablePoolConfig, u8, u8)> {
    let pools = &config().venues.stable_pools;
    for pool in pools.values() {
        if pool.token0 == a && pool.token1 == b {
            return Some((pool.clone(), pool.idx0, pool.idx1));
        }
    }
    for pool in pools.values() {
        if pool.token0 == b && pool.token1 == a {
            return Some((pool.clone(), pool.idx1, pool.idx0));
        }
    }
    None
}

fn both_stable(input: &StrategyInput, assets: &crate::assets::AssetRegistry) -> bool {
    assets.is_stable(input.collateral_asset) && assets.is_stable(input.debt_asset)
}

fn build_stable_swap(
    pool: &StablePoolConfig,
    idx_collateral: u8,
    idx_debt: u8,
    amount_in: U256,
    min_out: U256,
) -> liquidator_chain::SwapParams {
    let inner = Bytes::from(
        IStablePool::get_dyCall {
            i: alloy::primitives::Signed::<128, 2>::try_from(idx_collateral as i128).unwrap_or_default(),
            j: alloy::primitives::Signed::<128, 2>::try_from(idx_debt as i128).unwrap_or_default(),
            dx: amount_in,
        }
        .abi_encode(),
    );
    build_swap_params(
        SwapKind::NativeAggregator,
        pool.address,
        &SwapPath::Tuple(pool.token0, pool.token1, inner),
        amount_in,
        min_out,
        Bytes::new(),
    )
    .expect("stable swap path always encodes")
}

pub struct StableKittyOverAaveFlash;

impl Strategy for StableKittyOverAaveFlash {
    fn id(&self) -> StrategyId {
        StrategyId::StableKittyOverAaveFlash
    }

    fn can_handle(&self, input: &StrategyInput) -> bool {
        let assets = &crate::assets::REGISTRY;
        both_stable(input, assets) && find_stable_pool(input.collateral_asset, input.debt_asset).is_some()
    }

    fn build(&self, input: &StrategyInput) -> Option<BuiltStrategy> {
        let (pool_cfg, idx_c, idx_d) = find_stable_pool(input.collateral_asset, input.debt_asset)?;
        let (pool, quote) = input.best_quote.clone()?;
        if pool.venue != PoolVenue::Stable || pool.address != pool_cfg.address {
            return None;
        }
        let fee_bps: u32 = 5 + 4;
        let min_out = quote.amount_out.max(apply_basis_points_up(input.debt_to_cover, fee_bps as u16));
        let primary = build_stable_swap(&pool_cfg, idx_c, idx_d, input.expected_collateral_seized, min_out);
        let residual = residual_swap(
            SwapKind::NativeAggregator,
            pool_cfg.address,
            Bytes::new(),
            U256::ZERO,
            Bytes::new(),
        );
        Some(BuiltStrategy {
            strategy_id: self.id(),
            flash_source: FlashSource::Pool,
            params: liquidation_params(input, pool_cfg.address),
            primary_swap: primary,
            residual_swap: residual,
            fee_bps,
        })
    }
}

pub struct StableKittyOverV3Flash;

impl Strategy for StableKittyOverV3Flash {
    fn id(&self) -> StrategyId {
        StrategyId::StableKittyOverV3Flash
    }

    fn can_handle(&self, input: &StrategyInput) -> bool {
        let assets = &crate::assets::REGISTRY;
        both_stable(input, assets)
            && find_stable_pool(input.collateral_asset, input.debt_asset).is_some()
            && !input.v3_debt_pools.is_empty()
    }

    fn build(&self, input: &StrategyInput) -> Option<BuiltStrategy> {
        let (pool_cfg, idx_c, idx_d) = find_stable_pool(input.collateral_asset, input.debt_asset)?;
        let (v3_pool, _liquidity) = input.v3_debt_pools.first().cloned()?;
        let (pool, quote) = input.best_quote.clone()?;
        if pool.venue != PoolVenue::Stable || pool.address != pool_cfg.address {
            return None;
        }
        let fee_bps = v3_pool.fee_micro / 100 + 4;
        let min_out = quote.amount_out.max(apply_basis_points_up(input.debt_to_cover, fee_bps as u16));
        let primary = build_stable_swap(&pool_cfg, idx_c, idx_d, input.expected_collateral_seized, min_out);
        let residual = residual_swap(
            SwapKind::NativeAggregator,
            pool_cfg.address,
            Bytes::new(),
            U256::ZERO,
            Bytes::new(),
        );
        Some(BuiltStrategy {
            strategy_id: self.id(),
            flash_source: FlashSource::V3Pool(v3_pool.address),
            params: liquidation_params(input, pool_cfg.address),
            primary_swap: primary,
            residual_swap: residual,
            fee_bps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{init_config, Config, StablePoolConfig, VenuesConfig};
    use alloy::primitives::Address;
    use std::collections::HashMap;

    fn ensure_config(usdf: Address, stgusdc: Address, pool: Address) {
        let mut cfg = Config::default();
        let mut pools = HashMap::new();
        pools.insert(
            "usdf-stgusdc".to_string(),
            StablePoolConfig { address: pool, token0: usdf, token1: stgusdc, idx0: 0, idx1: 1 },
        );
        cfg.venues = VenuesConfig { stable_pools: pools, ..Default::default() };
        let _ = init_config(cfg);
    }

    #[test]
    fn finds_exact_order_before_reversed() {
        let usdf = Address::repeat_byte(1);
        let stgusdc = Address::repeat_byte(2);
        let pool = Address::repeat_byte(3);
        ensure_config(usdf, stgusdc, pool);

        let (found, idx_a, idx_b) = find_stable_pool(usdf, stgusdc).unwrap();
        assert_eq!(found.address, pool);
        assert_eq!((idx_a, idx_b), (0, 1));

        let (found_rev, idx_a_rev, idx_b_rev) = find_stable_pool(stgusdc, usdf).unwrap();
        assert_eq!(found_rev.address, pool);
        assert_eq!((idx_a_rev, idx_b_rev), (1, 0));
    }
}
