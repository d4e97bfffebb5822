//! Background prepared-liquidation builder (C7, §4.6).
//!
//! Runs off the per-block trigger (C10) whenever a hot borrower's health
//! factor drops below `timing.prepare_below_hf_bps` (1.05 by default) and no
//! fresh `PreparedLiquidation` already covers it. Builds the same
//! strategy/sizing pipeline the executor's slow path would run at trigger
//! time, but ahead of it, so the fast path only has to re-check freshness and
//! submit pre-encoded calldata (I3).

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolValue;
use anyhow::Result;
use tracing::{debug, info, warn};

use liquidator_api::AggregatorClient;
use liquidator_chain::{FlashSource, RpcGateway};

use crate::cache::{PriceCache, ReserveConfigCache};
use crate::config::config;
use crate::prepared::{PreparedCache, PreparingGuard};
use crate::sizer::{AdaptiveSizer, SizeOutcome};
use crate::strategy::{BuiltStrategy, StrategyRegistry};
use crate::types::{BorrowerId, PoolRef, PoolVenue, Position, PreparedLiquidation};
use crate::venues;

/// Encode a flash source as the `PoolRef` `PreparedLiquidation.pool` stores,
/// so the fast path can reconstruct it without re-running the strategy
/// registry (§9 storage convention: the prepared entry's `pool` field always
/// names the flash source, never the swap venue).
fn flash_pool_ref(flash_source: FlashSource) -> PoolRef {
    let (venue, address) = match flash_source {
        FlashSource::Pool => (PoolVenue::V2, Address::ZERO),
        FlashSource::V2Pair(addr) => (PoolVenue::V2, addr),
        FlashSource::V3Pool(addr) => (PoolVenue::V3, addr),
    };
    PoolRef { venue, address, token0: Address::ZERO, token1: Address::ZERO, fee_micro: 0, index_a: None, index_b: None }
}

/// Inverse of [`flash_pool_ref`]: a zero-address `V2`-venue entry means the
/// money-market flash loan, otherwise the venue names the flash source kind.
pub fn flash_source_from_pool(pool: &PoolRef) -> FlashSource {
    match pool.venue {
        PoolVenue::V3 => FlashSource::V3Pool(pool.address),
        _ if pool.address.is_zero() => FlashSource::Pool,
        _ => FlashSource::V2Pair(pool.address),
    }
}

pub struct Preparer {
    registry: Arc<StrategyRegistry>,
    sizer: AdaptiveSizer,
    prices: Arc<PriceCache>,
    reserve_configs: Arc<ReserveConfigCache>,
    prepared: Arc<PreparedCache>,
    aggregator: Option<Arc<AggregatorClient>>,
}

impl Preparer {
    pub fn new(
        registry: Arc<StrategyRegistry>,
        prices: Arc<PriceCache>,
        reserve_configs: Arc<ReserveConfigCache>,
        prepared: Arc<PreparedCache>,
        aggregator: Option<Arc<AggregatorClient>>,
    ) -> Self {
        Self { registry, sizer: AdaptiveSizer::new(prices.clone()), prices, reserve_configs, prepared, aggregator }
    }

    /// Build and cache a `PreparedLiquidation` for `position`, unless one is
    /// already fresh or another task is already preparing this borrower.
    /// Returns `true` if a new entry was inserted.
    pub async fn prepare(&self, gateway: &RpcGateway, position: &Position) -> Result<bool> {
        if self.prepared.get_valid(&position.borrower).is_some() {
            return Ok(false);
        }
        let Some(_guard) = PreparingGuard::acquire(&self.prepared, position.borrower) else {
            debug!(borrower = %position.borrower, "preparation already in flight, skipping");
            return Ok(false);
        };

        let Some(collateral) = position.largest_collateral() else { return Ok(false) };
        let Some(debt) = position.largest_debt() else { return Ok(false) };
        if collateral.asset == debt.asset {
            return Ok(false);
        }

        // Keep the price/reserve-config caches warm for the two assets this
        // borrower's dominant pair needs, so the sizer's USD math (and every
        // strategy's `can_handle`) reads a recent value.
        let _ = self.prices.refresh_one(gateway, collateral.asset).await;
        let _ = self.prices.refresh_one(gateway, debt.asset).await;
        let _ = self.reserve_configs.batch_refresh(gateway, &[collateral.asset, debt.asset]).await;

        let candidates = venues::build_candidates(gateway, collateral.asset, debt.asset).await?;

        let receiver = config().chain.profit_receiver;
        let sizing = match self
            .sizer
            .size(gateway, &self.registry, position, &candidates, self.aggregator.as_deref(), receiver)
            .await
        {
            SizeOutcome::Sized(sizing) => sizing,
            SizeOutcome::NoStrategy => {
                debug!(borrower = %position.borrower, "no applicable strategy, skipping preparation");
                return Ok(false);
            }
            SizeOutcome::NoProfitableSize => {
                debug!(borrower = %position.borrower, "no profitable strategy at any ladder fraction, skipping preparation");
                return Ok(false);
            }
        };

        let primary = sizing.primary();
        let prepared = build_prepared_liquidation(position.borrower, primary, sizing.debt_to_cover, sizing.expected_collateral_seized, sizing.profit_usd);
        info!(
            borrower = %position.borrower,
            strategy = ?primary.strategy_id,
            profit_usd = sizing.profit_usd,
            "prepared liquidation cached"
        );
        self.prepared.insert(prepared);
        Ok(true)
    }
}

fn build_prepared_liquidation(
    borrower: BorrowerId,
    strategy: &BuiltStrategy,
    debt_to_cover: U256,
    expected_collateral_seized: U256,
    estimated_profit_usd: f64,
) -> PreparedLiquidation {
    PreparedLiquidation {
        borrower,
        strategy: strategy.strategy_id,
        pool: flash_pool_ref(strategy.flash_source),
        collateral_asset: strategy.params.collateralAsset,
        debt_asset: strategy.params.debtAsset,
        debt_to_cover,
        expected_collateral_seized,
        encoded_swap_primary: strategy.primary_swap.abi_encode(),
        encoded_swap_residual: strategy.residual_swap.abi_encode(),
        estimated_profit_usd,
        created_at: std::time::Instant::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_pool_ref_round_trips_pool_source() {
        let pool = flash_pool_ref(FlashSource::Pool);
        assert!(matches!(flash_source_from_pool(&pool), FlashSource::Pool));
    }

    #[test]
    fn flash_pool_ref_round_trips_v2_pair() {
        let addr = Address::repeat_byte(7);
        let pool = flash_pool_ref(FlashSource::V2Pair(addr));
        match flash_source_from_pool(&pool) {
            FlashSource::V2Pair(a) => assert_eq!(a, addr),
            other => panic!("expected V2Pair, got {other:?}"),
        }
    }

    #[test]
    fn flash_pool_ref_round_trips_v3_pool() {
        let addr = Address::repeat_byte(8);
        let pool = flash_pool_ref(FlashSource::V3Pool(addr));
        match flash_source_from_pool(&pool) {
            FlashSource::V3Pool(a) => assert_eq!(a, addr),
            other => panic!("expected V3Pool, got {other:?}"),
        }
    }
}
