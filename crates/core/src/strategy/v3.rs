//! `V3Flash` and `V3DirectOverAaveFlash` (§4.4 priorities 4 and 6): a
//! whitelisted V3 pool carries the debt token with enough liquidity to flash
//! directly, or otherwise still supplies the flash leg while the swap back
//! to debt goes through a plain V2 path.

use alloy::primitives::U256;
use liquidator_chain::{build_swap_params, FlashSource, SwapKind, SwapPath};

use crate::types::{PoolVenue, StrategyId};
use crate::u256_math::apply_basis_points_up;

use super::{liquidation_params, residual_swap, BuiltStrategy, Strategy, StrategyInput};

/// A whitelisted V3 pool is usable as a flash source only if its liquidity
/// reading is at least twice what this liquidation needs (§4.4, mirroring
/// `V2FlashSwap`'s reserve multiple).
const FLASH_LIQUIDITY_MULTIPLE: u64 = 2;

fn v2_swap_path(input: &StrategyInput) -> SwapPath {
    SwapPath::Tokens(vec![input.collateral_asset, input.debt_asset])
}

fn build_primary_residual(
    input: &StrategyInput,
    fee_bps: u32,
) -> Option<(liquidator_chain::SwapParams, liquidator_chain::SwapParams)> {
    let (pool, quote) = input.best_quote.clone()?;
    if pool.venue != PoolVenue::V2 {
        return None;
    }
    let min_out = quote.amount_out.max(apply_basis_points_up(input.debt_to_cover, fee_bps as u16));
    let primary = build_swap_params(
        SwapKind::V2,
        pool.address,
        &v2_swap_path(input),
        input.expected_collateral_seized,
        min_out,
        alloy::primitives::Bytes::new(),
    )
    .ok()?;
    let residual = residual_swap(
        SwapKind::V2,
        pool.address,
        alloy::primitives::Bytes::new(),
        U256::ZERO,
        alloy::primitives::Bytes::new(),
    );
    Some((primary, residual))
}

pub struct V3Flash;

impl Strategy for V3Flash {
    fn id(&self) -> StrategyId {
        StrategyId::V3Flash
    }

    fn can_handle(&self, input: &StrategyInput) -> bool {
        input
            .v3_debt_pools
            .iter()
            .any(|(_, liquidity)| *liquidity >= input.debt_to_cover.saturating_mul(U256::from(FLASH_LIQUIDITY_MULTIPLE)))
    }

    fn build(&self, input: &StrategyInput) -> Option<BuiltStrategy> {
        let (v3_pool, _) = input
            .v3_debt_pools
            .iter()
            .find(|(_, liquidity)| *liquidity >= input.debt_to_cover.saturating_mul(U256::from(FLASH_LIQUIDITY_MULTIPLE)))
            .cloned()?;
        let fee_bps = v3_pool.fee_micro / 100;
        let (primary, residual) = build_primary_residual(input, fee_bps)?;
        Some(BuiltStrategy {
            strategy_id: self.id(),
            flash_source: FlashSource::V3Pool(v3_pool.address),
            params: liquidation_params(input, v3_pool.address),
            primary_swap: primary,
            residual_swap: residual,
            fee_bps,
        })
    }
}

pub struct V3DirectOverAaveFlash;

impl Strategy for V3DirectOverAaveFlash {
    fn id(&self) -> StrategyId {
        StrategyId::V3DirectOverAaveFlash
    }

    fn can_handle(&self, input: &StrategyInput) -> bool {
        !input.v3_debt_pools.is_empty()
            && input.best_quote.as_ref().map(|(p, _)| p.venue == PoolVenue::V2).unwrap_or(false)
    }

    fn build(&self, input: &StrategyInput) -> Option<BuiltStrategy> {
        let (v3_pool, _) = input.v3_debt_pools.first().cloned()?;
        let fee_bps: u32 = 5 + 30;
        let (primary, residual) = build_primary_residual(input, fee_bps)?;
        Some(BuiltStrategy {
            strategy_id: self.id(),
            flash_source: FlashSource::V3Pool(v3_pool.address),
            params: liquidation_params(input, v3_pool.address),
            primary_swap: primary,
            residual_swap: residual,
            fee_bps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PoolRef, Quote};
    use alloy::primitives::Address;

    fn v3_pool(address: Address, fee_micro: u32) -> PoolRef {
        PoolRef {
            venue: PoolVenue::V3,
            address,
            token0: Address::repeat_byte(1),
            token1: Address::repeat_byte(2),
            fee_micro,
            index_a: None,
            index_b: None,
        }
    }

    fn base_input() -> StrategyInput {
        StrategyInput {
            borrower: Address::ZERO,
            collateral_asset: Address::repeat_byte(1),
            debt_asset: Address::repeat_byte(2),
            collateral_decimals: 18,
            debt_decimals: 6,
            debt_to_cover: U256::from(1_000u64),
            expected_collateral_seized: U256::from(900u64),
            debt_reserve_in_pool: U256::from(10_000u64),
            v2_debt_pairs: vec![],
            v3_debt_pools: vec![],
            best_quote: None,
            aggregator_quote: None,
            receiver: Address::ZERO,
        }
    }

    #[test]
    fn v3_flash_requires_double_liquidity() {
        let strat = V3Flash;
        let mut input = base_input();
        input.v3_debt_pools = vec![(v3_pool(Address::repeat_byte(7), 3000), U256::from(1_500u64))];
        assert!(!strat.can_handle(&input));
        input.v3_debt_pools = vec![(v3_pool(Address::repeat_byte(7), 3000), U256::from(2_000u64))];
        assert!(strat.can_handle(&input));
    }

    #[test]
    fn v3_flash_fee_is_pool_fee_only() {
        let strat = V3Flash;
        let mut input = base_input();
        input.v3_debt_pools = vec![(v3_pool(Address::repeat_byte(7), 3000), U256::from(2_000u64))];
        let v2_quote_pool = PoolRef {
            venue: PoolVenue::V2,
            address: Address::repeat_byte(9),
            token0: Address::repeat_byte(1),
            token1: Address::repeat_byte(2),
            fee_micro: 0,
            index_a: None,
            index_b: None,
        };
        input.best_quote = Some((
            v2_quote_pool,
            Quote { venue: PoolVenue::V2, pool: Address::repeat_byte(9), amount_in: U256::from(900u64), amount_out: U256::from(1_010u64), fee_bps: 30 },
        ));
        let built = strat.build(&input).unwrap();
        assert_eq!(built.fee_bps, 30);
    }
}
