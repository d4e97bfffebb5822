//! `V2FlashSwap` and `V2DirectOverAaveFlash` (§4.4 priorities 3 and 5): a
//! whitelisted V2 pair carries the debt token with enough reserve to flash
//! (priority 3) or, failing that, the money-market flash loan plus a plain
//! V2 swap back (priority 5).

use alloy::primitives::U256;
use liquidator_chain::{build_swap_params, FlashSource, SwapKind, SwapPath};

use crate::types::{PoolVenue, StrategyId};
use crate::u256_math::apply_basis_points_up;

use super::{liquidation_params, residual_swap, BuiltStrategy, Strategy, StrategyInput};

/// A whitelisted V2 pair is usable as a flash source only if its reserve of
/// the debt token is at least twice what this liquidation needs (§4.4).
const FLASH_RESERVE_MULTIPLE: u64 = 2;

fn v2_swap_path(input: &StrategyInput) -> SwapPath {
    SwapPath::Tokens(vec![input.collateral_asset, input.debt_asset])
}

pub struct V2FlashSwap;

impl Strategy for V2FlashSwap {
    fn id(&self) -> StrategyId {
        StrategyId::V2FlashSwap
    }

    fn can_handle(&self, input: &StrategyInput) -> bool {
        input
            .v2_debt_pairs
            .iter()
            .any(|(_, reserve)| *reserve >= input.debt_to_cover.saturating_mul(U256::from(FLASH_RESERVE_MULTIPLE)))
    }

    fn build(&self, input: &StrategyInput) -> Option<BuiltStrategy> {
        let (pair, _) = input
            .v2_debt_pairs
            .iter()
            .find(|(_, reserve)| *reserve >= input.debt_to_cover.saturating_mul(U256::from(FLASH_RESERVE_MULTIPLE)))
            .cloned()?;
        let (pool, quote) = input.best_quote.clone()?;
        if pool.venue != PoolVenue::V2 {
            return None;
        }
        let fee_bps: u32 = 30;
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
        Some(BuiltStrategy {
            strategy_id: self.id(),
            flash_source: FlashSource::V2Pair(pair.address),
            params: liquidation_params(input, pair.address),
            primary_swap: primary,
            residual_swap: residual,
            fee_bps,
        })
    }
}

pub struct V2DirectOverAaveFlash;

impl Strategy for V2DirectOverAaveFlash {
    fn id(&self) -> StrategyId {
        StrategyId::V2DirectOverAaveFlash
    }

    fn can_handle(&self, input: &StrategyInput) -> bool {
        let assets = &crate::assets::REGISTRY;
        !(assets.is_stable(input.collateral_asset) && assets.is_stable(input.debt_asset))
            && input.best_quote.as_ref().map(|(p, _)| p.venue == PoolVenue::V2).unwrap_or(false)
    }

    fn build(&self, input: &StrategyInput) -> Option<BuiltStrategy> {
        let (pool, quote) = input.best_quote.clone()?;
        if pool.venue != PoolVenue::V2 {
            return None;
        }
        let fee_bps: u32 = 5 + 30;
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
        Some(BuiltStrategy {
            strategy_id: self.id(),
            flash_source: FlashSource::Pool,
            params: liquidation_params(input, pool.address),
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

    fn v2_pool(address: Address) -> PoolRef {
        PoolRef {
            venue: PoolVenue::V2,
            address,
            token0: Address::repeat_byte(1),
            token1: Address::repeat_byte(2),
            fee_micro: 0,
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
    fn v2_flash_swap_requires_double_reserve() {
        let strat = V2FlashSwap;
        let mut input = base_input();
        input.v2_debt_pairs = vec![(v2_pool(Address::repeat_byte(9)), U256::from(1_500u64))];
        assert!(!strat.can_handle(&input));
        input.v2_debt_pairs = vec![(v2_pool(Address::repeat_byte(9)), U256::from(2_000u64))];
        assert!(strat.can_handle(&input));
    }

    #[test]
    fn v2_flash_swap_builds_with_quote() {
        let strat = V2FlashSwap;
        let mut input = base_input();
        let pair = v2_pool(Address::repeat_byte(9));
        input.v2_debt_pairs = vec![(pair.clone(), U256::from(2_000u64))];
        input.best_quote = Some((
            pair,
            Quote { venue: PoolVenue::V2, pool: Address::repeat_byte(9), amount_in: U256::from(900u64), amount_out: U256::from(1_010u64), fee_bps: 30 },
        ));
        let built = strat.build(&input).unwrap();
        assert_eq!(built.fee_bps, 30);
    }
}
