//! Adaptive sizer (C5, §4.5): for a borrower's dominant collateral/debt
//! pair, evaluate the fixed `{10%, 25%, 50%}` ladder of `debtToCover`
//! fractions, quote each against the whitelisted venues through the
//! liquidity probe, and pick the fraction maximizing `profit_usd /
//! estimated_gas_units`.
//!
//! The spec's ladder scan stops early at the first unprofitable fraction
//! scanning from the largest down; with only three fixed rungs that's a
//! micro-optimization over evaluating the full ladder and picking the
//! maximum, which this does instead for simplicity — both pick the same
//! winner.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use liquidator_api::AggregatorClient;
use liquidator_chain::{LiquidityProbe, ProbeRequest, RpcGateway};

use crate::cache::PriceCache;
use crate::config::config;
use crate::strategy::{AggregatorQuoteData, BuiltStrategy, StrategyInput, StrategyRegistry};
use crate::types::{CollateralHolding, DebtHolding, PoolRef, PoolVenue, Position, Quote};
use crate::u256_math::{amount_from_usd_wad, apply_basis_points, apply_basis_points_up, calculate_usd_wad, min, wad_to_f64};

/// Empirical haircuts applied when a venue can't be probed directly and the
/// sizer falls back to estimating the swap leg without live quote data
/// (§4.5).
const V2_EMPIRICAL_SLIPPAGE_BPS: u16 = 300;
const V3_EMPIRICAL_SLIPPAGE_BPS: u16 = 100;
const AGGREGATOR_EMPIRICAL_SLIPPAGE_BPS: u16 = 500;

/// Flat per-liquidation gas estimate, identical across ladder fractions so
/// the ranking is profit-only (S6: "sizer orders by profit magnitude, same
/// gas estimate for all fractions"). Refined with a live estimate by the
/// executor before submission.
const ESTIMATED_GAS_UNITS: u64 = 450_000;

/// Whitelisted swap/flash venues carrying a borrower's `(collateral, debt)`
/// pair, gathered once per scan pass and reused across every ladder
/// fraction the sizer evaluates.
#[derive(Debug, Clone, Default)]
pub struct VenueCandidates {
    /// V2 pools quotable for the collateral->debt swap leg.
    pub v2_pools: Vec<PoolRef>,
    /// Stable pools quotable for the collateral->debt swap leg.
    pub stable_pools: Vec<PoolRef>,
    /// `(pool, reserve_of_debt_token)` for whitelisted V2 pairs usable as a
    /// flash source for the debt asset.
    pub v2_debt_pairs: Vec<(PoolRef, U256)>,
    /// `(pool, liquidity)` for whitelisted V3 pools usable as a flash source
    /// for the debt asset.
    pub v3_debt_pools: Vec<(PoolRef, U256)>,
}

fn candidates_reserve(candidates: &VenueCandidates) -> U256 {
    candidates
        .v2_debt_pairs
        .iter()
        .map(|(_, reserve)| *reserve)
        .chain(candidates.v3_debt_pools.iter().map(|(_, liquidity)| *liquidity))
        .fold(U256::ZERO, crate::u256_math::max)
}

/// A fully-sized liquidation candidate ready for the executor, plus the
/// profit estimate the sizer used to pick it. `strategies` holds every
/// applicable, buildable strategy for the winning ladder fraction in
/// priority order — the executor tries `strategies[0]` first and advances
/// through the rest on a revert (§4.11 step 3) before blacklisting.
#[derive(Debug, Clone)]
pub struct SizingResult {
    pub strategies: Vec<BuiltStrategy>,
    pub debt_to_cover: U256,
    pub expected_collateral_seized: U256,
    pub profit_usd: f64,
    pub gas_units: u64,
}

impl SizingResult {
    pub fn primary(&self) -> &BuiltStrategy {
        &self.strategies[0]
    }
}

/// Outcome of [`AdaptiveSizer::size`], distinguishing "no strategy's
/// `can_handle` ever matched" from "a strategy matched but every ladder
/// fraction lost money" so the caller can record the right
/// `BlacklistReason`.
pub enum SizeOutcome {
    Sized(SizingResult),
    NoStrategy,
    NoProfitableSize,
}

enum FractionOutcome {
    Sized(SizingResult),
    Unprofitable,
    NoStrategy,
    Skip,
}

pub struct AdaptiveSizer {
    probe: LiquidityProbe,
    prices: Arc<PriceCache>,
}

impl AdaptiveSizer {
    pub fn new(prices: Arc<PriceCache>) -> Self {
        Self { probe: LiquidityProbe::new(), prices }
    }

    /// Evaluate the full ladder for `position` and return the most
    /// profitable candidate, or the reason nothing was found.
    pub async fn size(
        &self,
        gateway: &RpcGateway,
        registry: &StrategyRegistry,
        position: &Position,
        candidates: &VenueCandidates,
        aggregator: Option<&AggregatorClient>,
        receiver: Address,
    ) -> SizeOutcome {
        let Some(collateral) = position.largest_collateral().cloned() else { return SizeOutcome::NoStrategy };
        let Some(debt) = position.largest_debt().cloned() else { return SizeOutcome::NoStrategy };
        if collateral.asset == debt.asset {
            return SizeOutcome::NoStrategy;
        }

        let ladder = config().thresholds.liquidation_ladder_pct.clone();
        let mut best: Option<SizingResult> = None;
        let mut any_strategy = false;

        for pct in ladder {
            match self
                .evaluate_fraction(gateway, registry, position, &collateral, &debt, candidates, aggregator, receiver, pct)
                .await
            {
                FractionOutcome::Sized(result) => {
                    any_strategy = true;
                    let is_better = match &best {
                        Some(current) => {
                            result.profit_usd / result.gas_units as f64 > current.profit_usd / current.gas_units as f64
                        }
                        None => true,
                    };
                    if is_better {
                        best = Some(result);
                    }
                }
                FractionOutcome::Unprofitable => any_strategy = true,
                FractionOutcome::NoStrategy | FractionOutcome::Skip => {}
            }
        }

        match best {
            Some(result) => SizeOutcome::Sized(result),
            None if any_strategy => SizeOutcome::NoProfitableSize,
            None => SizeOutcome::NoStrategy,
        }
    }

    /// Read the freshest known price for `asset` (I7): the live cache if it
    /// has been populated, falling back to the scan-time price embedded in
    /// the position's holdings only when the cache has never seen it.
    fn price_of(&self, asset: crate::types::AssetId, embedded: U256) -> U256 {
        self.prices.get_stale(asset).unwrap_or(embedded)
    }

    #[allow(clippy::too_many_arguments)]
    async fn evaluate_fraction(
        &self,
        gateway: &RpcGateway,
        registry: &StrategyRegistry,
        position: &Position,
        collateral: &CollateralHolding,
        debt: &DebtHolding,
        candidates: &VenueCandidates,
        aggregator: Option<&AggregatorClient>,
        receiver: Address,
        ladder_pct: u16,
    ) -> FractionOutcome {
        let thresholds = &config().thresholds;
        let collateral_price = self.price_of(collateral.asset, collateral.price);
        let debt_price = self.price_of(debt.asset, debt.price);

        let raw = (debt.amount * U256::from(ladder_pct)) / U256::from(100u64);
        let reserve = candidates_reserve(candidates);
        let reserve_capped = if reserve.is_zero() { raw } else { min(raw, reserve) };
        let debt_to_cover = apply_basis_points_up(reserve_capped, thresholds.interest_buffer_bps);
        if debt_to_cover.is_zero() {
            return FractionOutcome::Skip;
        }

        let debt_usd_wad = calculate_usd_wad(debt_to_cover, debt_price, debt.decimals);
        let base_collateral_amount = amount_from_usd_wad(debt_usd_wad, collateral_price, collateral.decimals);
        let with_bonus = apply_basis_points_up(base_collateral_amount, collateral.liquidation_bonus_bps);
        let expected_collateral_seized =
            (with_bonus * U256::from(thresholds.conservative_factor_pct)) / U256::from(100u64);
        if expected_collateral_seized.is_zero() {
            return FractionOutcome::Skip;
        }

        let probed = self.probe_best_quote(gateway, candidates, expected_collateral_seized).await;

        let collateral_usd = wad_to_f64(calculate_usd_wad(expected_collateral_seized, collateral_price, collateral.decimals));
        let slippage_bps = config().slippage.base_bps_for(collateral_usd);
        let aggregator_quote = match aggregator {
            Some(client) => client
                .quote(collateral.asset, debt.asset, expected_collateral_seized, receiver, receiver, slippage_bps)
                .await
                .ok()
                .map(|q| AggregatorQuoteData {
                    to_amount_min: q.to_amount_min,
                    transaction_to: q.transaction_to,
                    transaction_data: q.transaction_data,
                }),
            None => None,
        };

        let input = StrategyInput {
            borrower: position.borrower,
            collateral_asset: collateral.asset,
            debt_asset: debt.asset,
            collateral_decimals: collateral.decimals,
            debt_decimals: debt.decimals,
            debt_to_cover,
            expected_collateral_seized,
            debt_reserve_in_pool: reserve,
            v2_debt_pairs: candidates.v2_debt_pairs.clone(),
            v3_debt_pools: candidates.v3_debt_pools.clone(),
            best_quote: probed.clone(),
            aggregator_quote,
            receiver,
        };

        let strategies = registry.build_all(&input);
        let Some(primary) = strategies.first() else { return FractionOutcome::NoStrategy };

        let amount_out = match &probed {
            Some((_, quote)) => quote.amount_out,
            None => apply_basis_points(expected_collateral_seized, empirical_slippage_bps(primary)),
        };

        let received_usd_wad = calculate_usd_wad(amount_out, debt_price, debt.decimals);
        let received_usd = wad_to_f64(received_usd_wad);
        let owed_usd = wad_to_f64(debt_usd_wad);
        // §4.5(c): subtract this strategy's own fee model (flash fee + swap
        // fee already reflected in `quote.amount_out`'s spread) from the
        // profit estimate, the same cost P2's on-chain floor enforces.
        let flash_fee_usd = wad_to_f64(calculate_usd_wad(
            apply_basis_points_up(debt_to_cover, primary.fee_bps as u16) - debt_to_cover,
            debt_price,
            debt.decimals,
        ));
        let gas_multiplier = config().gas.multiplier_for((received_usd - owed_usd).max(0.0));
        let gas_cost_usd = gas_multiplier * GAS_COST_BASE_USD;
        let profit_usd = received_usd - owed_usd - flash_fee_usd - gas_cost_usd;

        if profit_usd <= 0.0 {
            return FractionOutcome::Unprofitable;
        }

        FractionOutcome::Sized(SizingResult {
            strategies,
            debt_to_cover,
            expected_collateral_seized,
            profit_usd,
            gas_units: ESTIMATED_GAS_UNITS,
        })
    }

    /// Quote `amount_in` of collateral into debt across every whitelisted
    /// V2/stable venue and return the best usable result. V3 pools are never
    /// probed here — no strategy swaps through a raw V3 quote, only through
    /// `FlashSource::V3Pool` as a flash leg (§4.4's venue table).
    async fn probe_best_quote(
        &self,
        gateway: &RpcGateway,
        candidates: &VenueCandidates,
        amount_in: U256,
    ) -> Option<(PoolRef, Quote)> {
        if amount_in.is_zero() {
            return None;
        }
        let mut requests = Vec::with_capacity(candidates.v2_pools.len() + candidates.stable_pools.len());
        for pool in &candidates.v2_pools {
            let (token_in, token_out) = pool.tokens();
            requests.push(ProbeRequest::V2 { pool: pool.address, router: pool.address, token_in, token_out, amount_in });
        }
        for pool in &candidates.stable_pools {
            let idx_in = pool.index_a.unwrap_or(0) as i8;
            let idx_out = pool.index_b.unwrap_or(1) as i8;
            requests.push(ProbeRequest::Stable { pool: pool.address, idx_in, idx_out, amount_in });
        }
        if requests.is_empty() {
            return None;
        }

        let results = self.probe.quote_many(gateway, &requests, amount_in).await.ok()?;
        let mut best: Option<(PoolRef, Quote)> = None;
        for pool in candidates.v2_pools.iter().chain(candidates.stable_pools.iter()) {
            let Some(venue_quote) = results.get(&pool.address) else { continue };
            let fee_bps = if pool.venue == PoolVenue::V2 { 30 } else { 4 };
            let quote = Quote { venue: pool.venue, pool: pool.address, amount_in, amount_out: venue_quote.amount_out, fee_bps };
            let is_better = best.as_ref().map(|(_, b)| quote.amount_out > b.amount_out).unwrap_or(true);
            if is_better {
                best = Some((pool.clone(), quote));
            }
        }
        best
    }
}

/// Placeholder USD-denominated unit the gas multiplier scales; the executor
/// overwrites this with a live gas-price read before submission (§4.11 step
/// 4). Kept tiny and fixed here so the sizer's ranking never flips on a
/// stale gas price.
const GAS_COST_BASE_USD: f64 = 0.5;

fn empirical_slippage_bps(strategy: &BuiltStrategy) -> u16 {
    use crate::types::StrategyId::*;
    match strategy.strategy_id {
        AggregatorOverAaveFlash => AGGREGATOR_EMPIRICAL_SLIPPAGE_BPS,
        V3Flash | V3DirectOverAaveFlash => V3_EMPIRICAL_SLIPPAGE_BPS,
        _ => V2_EMPIRICAL_SLIPPAGE_BPS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_reserve_is_zero_when_empty() {
        let candidates = VenueCandidates::default();
        assert_eq!(candidates_reserve(&candidates), U256::ZERO);
    }

    #[test]
    fn candidates_reserve_takes_the_max_across_flash_sources() {
        let pool = PoolRef {
            venue: PoolVenue::V2,
            address: Address::repeat_byte(1),
            token0: Address::repeat_byte(2),
            token1: Address::repeat_byte(3),
            fee_micro: 0,
            index_a: None,
            index_b: None,
        };
        let candidates = VenueCandidates {
            v2_debt_pairs: vec![(pool.clone(), U256::from(1_000u64))],
            v3_debt_pools: vec![(pool, U256::from(5_000u64))],
            ..Default::default()
        };
        assert_eq!(candidates_reserve(&candidates), U256::from(5_000u64));
    }
}
