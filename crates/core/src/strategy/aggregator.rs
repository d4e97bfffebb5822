//! `AggregatorOverAaveFlash` (§4.4 priority 99/7): the fallback strategy,
//! applicable whenever an external aggregator key is configured regardless
//! of venue topology. The money-market flash loan funds the liquidation and
//! the collateral is swapped back through whatever route the aggregator
//! found, submitted on-chain as an `ExternalAggregator` swap leg.

use alloy::primitives::{Bytes, U256};
use liquidator_chain::{build_swap_params, FlashSource, SwapKind, SwapPath};

use crate::types::StrategyId;
use crate::u256_math::apply_basis_points_up;

use super::{liquidation_params, residual_swap, BuiltStrategy, Strategy, StrategyInput};

pub struct AggregatorOverAaveFlash;

impl Strategy for AggregatorOverAaveFlash {
    fn id(&self) -> StrategyId {
        StrategyId::AggregatorOverAaveFlash
    }

    fn can_handle(&self, input: &StrategyInput) -> bool {
        input.aggregator_quote.is_some()
    }

    fn build(&self, input: &StrategyInput) -> Option<BuiltStrategy> {
        let quote = input.aggregator_quote.clone()?;
        let fee_bps: u32 = 5;
        let min_out = quote.to_amount_min.max(apply_basis_points_up(input.debt_to_cover, fee_bps as u16));
        let primary = build_swap_params(
            SwapKind::ExternalAggregator,
            quote.transaction_to,
            &SwapPath::Tuple(input.collateral_asset, input.debt_asset, quote.transaction_data),
            input.expected_collateral_seized,
            min_out,
            Bytes::new(),
        )
        .ok()?;
        let residual = residual_swap(
            SwapKind::ExternalAggregator,
            quote.transaction_to,
            Bytes::new(),
            U256::ZERO,
            Bytes::new(),
        );
        Some(BuiltStrategy {
            strategy_id: self.id(),
            flash_source: FlashSource::Pool,
            params: liquidation_params(input, quote.transaction_to),
            primary_swap: primary,
            residual_swap: residual,
            fee_bps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::AggregatorQuoteData;
    use alloy::primitives::Address;

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
    fn without_aggregator_quote_cannot_handle() {
        let strat = AggregatorOverAaveFlash;
        assert!(!strat.can_handle(&base_input()));
    }

    #[test]
    fn builds_external_aggregator_swap_when_quoted() {
        let strat = AggregatorOverAaveFlash;
        let mut input = base_input();
        input.aggregator_quote = Some(AggregatorQuoteData {
            to_amount_min: U256::from(1_010u64),
            transaction_to: Address::repeat_byte(5),
            transaction_data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
        });
        assert!(strat.can_handle(&input));
        let built = strat.build(&input).unwrap();
        assert_eq!(built.fee_bps, 5);
        assert!(matches!(built.flash_source, FlashSource::Pool));
    }
}
