//! Strategy registry (C4, §4.4): the closed set of liquidation strategies,
//! each with a can-handle predicate, a parameter builder, a fixed flash
//! source, a chosen swap venue, and a fee model. Strategies are tried in
//! ascending priority order (ties broken by higher projected profit, done by
//! the caller since only it knows profit across candidates).
//!
//! Grounded on the teacher's closed-sum-type dispatch idiom (design note
//! "dynamic dispatch across strategies"): one `Strategy` trait, iterated over
//! a fixed `Vec<Box<dyn Strategy>>` built in priority order, no open
//! polymorphism.

mod aggregator;
mod stable;
mod v2;
mod v3;

pub use stable::find_stable_pool;

use alloy::primitives::{Address, Bytes, U256};
use liquidator_chain::{FlashSource, LiquidationParams, SwapKind, SwapParams};

use crate::types::{AssetId, BorrowerId, PoolRef, Quote, StrategyId};

/// Everything a strategy needs to decide applicability and build its
/// liquidation call for one borrower at one candidate `debtToCover` size.
/// Assembled by the adaptive sizer (C5) from the probe/cache reads it has
/// already done for this ladder fraction.
pub struct StrategyInput {
    pub borrower: BorrowerId,
    pub collateral_asset: AssetId,
    pub debt_asset: AssetId,
    pub collateral_decimals: u8,
    pub debt_decimals: u8,
    pub debt_to_cover: U256,
    pub expected_collateral_seized: U256,
    /// Available reserve of the debt asset held by the pool's receipt-token
    /// holder (I1's `availableReserveOfDebtInPool`).
    pub debt_reserve_in_pool: U256,
    /// `(pool, reserve_of_debt_token)` for every whitelisted V2 pair that
    /// carries the debt token, as read by the probe for this pass.
    pub v2_debt_pairs: Vec<(PoolRef, U256)>,
    /// `(pool, liquidity)` for every whitelisted V3 pool that carries the
    /// debt token.
    pub v3_debt_pools: Vec<(PoolRef, U256)>,
    /// Best available collateral->debt quote at this size, per venue kind,
    /// keyed by the pool that produced it. `None` if the probe found
    /// nothing usable.
    pub best_quote: Option<(PoolRef, Quote)>,
    /// A pre-fetched external aggregator quote, when the aggregator client
    /// is configured. Fetching it requires an HTTP round trip, so the sizer
    /// does it ahead of time and hands the result in here rather than
    /// having `Strategy::build` (a synchronous call) reach out itself.
    pub aggregator_quote: Option<AggregatorQuoteData>,
    pub receiver: Address,
}

/// The subset of `liquidator_api::AggregatorQuote` a strategy needs to build
/// an `ExternalAggregator` swap leg.
#[derive(Debug, Clone)]
pub struct AggregatorQuoteData {
    pub to_amount_min: U256,
    pub transaction_to: Address,
    pub transaction_data: Bytes,
}

/// A fully-built, ABI-ready liquidation plan for one strategy.
#[derive(Debug, Clone)]
pub struct BuiltStrategy {
    pub strategy_id: StrategyId,
    pub flash_source: FlashSource,
    pub params: LiquidationParams,
    pub primary_swap: SwapParams,
    pub residual_swap: SwapParams,
    /// Sum of basis points in this strategy's fee model (flash fee + swap
    /// fee), used by P2's `amountOutMin >= debtToCover + flashFee` check.
    pub fee_bps: u32,
}

/// One liquidation strategy (§4.4).
pub trait Strategy: Send + Sync {
    fn id(&self) -> StrategyId;

    /// Whether this strategy's preconditions hold for `input`.
    fn can_handle(&self, input: &StrategyInput) -> bool;

    /// Build the ABI-ready liquidation call, or `None` if a precondition
    /// that `can_handle` can't see cheaply (e.g. a missing quote) fails at
    /// build time.
    fn build(&self, input: &StrategyInput) -> Option<BuiltStrategy>;
}

/// I1 requires `transferAmount`/`amount` mirror `debtToCover` in the
/// on-chain params the executor contract expects; kept as a helper so every
/// strategy builds `LiquidationParams` identically.
fn liquidation_params(input: &StrategyInput, pool: Address) -> LiquidationParams {
    let _ = pool;
    LiquidationParams {
        collateralAsset: input.collateral_asset,
        debtAsset: input.debt_asset,
        user: input.borrower,
        amount: input.expected_collateral_seized,
        transferAmount: input.expected_collateral_seized,
        debtToCover: input.debt_to_cover,
    }
}

/// §9 open question 1: the residual swap always carries `amountIn = 0`,
/// telling the on-chain contract to sweep its observed post-liquidation
/// balance rather than a caller-predicted amount.
fn residual_swap(kind: SwapKind, router: Address, path: Bytes, min_out: U256, adapters: Bytes) -> SwapParams {
    SwapParams {
        swapKind: kind as u8,
        router,
        path,
        amountIn: U256::ZERO,
        amountOutMin: min_out,
        adapters,
    }
}

/// The registry, built once with every strategy in ascending-priority order.
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyRegistry {
    /// Build the full closed set, already sorted by `StrategyId::priority`.
    /// `aggregator_enabled` reflects whether an aggregator API key was
    /// configured (§4.4: `AggregatorOverAaveFlash` only applies then).
    pub fn new(aggregator_enabled: bool) -> Self {
        let mut strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(stable::StableKittyOverAaveFlash),
            Box::new(stable::StableKittyOverV3Flash),
            Box::new(v2::V2FlashSwap),
            Box::new(v3::V3Flash),
            Box::new(v2::V2DirectOverAaveFlash),
            Box::new(v3::V3DirectOverAaveFlash),
        ];
        if aggregator_enabled {
            strategies.push(Box::new(aggregator::AggregatorOverAaveFlash));
        }
        strategies.sort_by_key(|s| s.id().priority());
        Self { strategies }
    }

    /// Every strategy whose `can_handle` holds, in priority order (§4.4's
    /// tie-break: lower priority number first; profit tie-breaking among
    /// equal priorities is the caller's job since only it compares profit
    /// across strategies).
    pub fn applicable<'a>(&'a self, input: &StrategyInput) -> Vec<&'a dyn Strategy> {
        self.strategies
            .iter()
            .filter(|s| s.can_handle(input))
            .map(|s| s.as_ref())
            .collect()
    }

    /// Build every applicable strategy that actually builds, in priority
    /// order (a `can_handle` pass can still fail to build, e.g. a missing
    /// quote at build time). The executor needs the full ordered candidate
    /// list to advance to the next strategy on a revert (§4.11 step 3)
    /// instead of only ever trying one.
    pub fn build_all(&self, input: &StrategyInput) -> Vec<BuiltStrategy> {
        self.applicable(input).into_iter().filter_map(|s| s.build(input)).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_without_aggregator_has_six_strategies() {
        let registry = StrategyRegistry::new(false);
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn registry_with_aggregator_has_seven_strategies() {
        let registry = StrategyRegistry::new(true);
        assert_eq!(registry.len(), 7);
    }

    #[test]
    fn strategies_are_priority_sorted() {
        let registry = StrategyRegistry::new(true);
        let priorities: Vec<u8> = registry.strategies.iter().map(|s| s.id().priority()).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);
    }
}
