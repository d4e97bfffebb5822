//! Simulate-then-submit execution engine (C11, §4.11).
//!
//! Turns a candidate `(Position, Option<PreparedLiquidation>)` into an
//! on-chain transaction. Prefers the prepared fast path (I3) when a fresh
//! entry covers the borrower; otherwise falls back to running the strategy
//! registry (C4) and adaptive sizer (C5) from scratch, exactly as the
//! preparer would. Every attempt is re-simulated via a static call before
//! submission, with slippage escalated across a fixed tolerance ladder on a
//! swap-shaped revert.
//!
//! Grounded on the teacher's `Liquidator::execute_staged`/`build_and_execute`
//! pair: fast path vs. from-scratch path, profitability re-check before
//! submission, and `execute_with_retry`'s non-retryable-error classification
//! (here: HF-recovered and no-profitable-size never retry; a swap-shaped
//! revert retries with wider slippage; anything else is terminal).

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolValue;
use anyhow::{Context, Result};
use dashmap::DashSet;
use tracing::{info, warn};

use liquidator_api::{AggregatorClient, Notifier};
use liquidator_chain::contracts::aave_v3::{decode_get_user_account_data, encode_get_user_account_data};
use liquidator_chain::{FlashSource, LiquidationCall, LiquidationParams, LiquidatorContract, RpcGateway, SwapParams, TransactionSender};

use crate::assets::REGISTRY;
use crate::blacklist::Blacklist;
use crate::cache::{PriceCache, ReserveConfigCache};
use crate::config::config;
use crate::prepared::PreparedCache;
use crate::preparer::flash_source_from_pool;
use crate::sizer::{AdaptiveSizer, SizeOutcome};
use crate::strategy::StrategyRegistry;
use crate::types::{BlacklistReason, BorrowerId, Position, PreparedLiquidation};
use crate::u256_math;
use crate::venues;

/// Gas limit budgeted for a liquidation submission, mirroring the teacher's
/// fixed `DEFAULT_LIQUIDATION_GAS_LIMIT` (complex multi-hop liquidations
/// observed around 1.57M gas).
const EXECUTION_GAS_LIMIT: u64 = 1_600_000;

/// Slippage escalation steps tried within one execution attempt (§4.11 step
/// 5). Index 0 is the base tier's tolerance; later indices widen it.
const MAX_SLIPPAGE_ATTEMPTS: usize = 3;

/// Terminal (or near-terminal) result of one `Executor::execute` call.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// HF rose back above 1 between promotion and the freshness re-check.
    Recovered,
    /// Another task is already executing this borrower.
    AlreadyInFlight,
    /// The borrower is currently blacklisted (I5).
    Blacklisted,
    /// No strategy applied, or every ladder fraction was unprofitable.
    NoStrategy,
    /// A non-swap revert with no further fallback; recorded in C8.
    SimulationReverted,
    /// Every slippage tier still reverted; recorded in C8.
    SwapFailed,
    /// The transaction landed but reverted on-chain; recorded in C8.
    ExecutionReverted,
    /// Confirmed on-chain.
    Confirmed { tx_hash: B256, profit_usd: f64 },
}

/// One strategy's ABI-ready liquidation call, a single rung in
/// `ExecutionPlan::candidates`.
#[derive(Clone)]
struct StrategyCandidate {
    flash_source: FlashSource,
    params: LiquidationParams,
    /// `amountOutMin` here is the *raw* expected amount (zero tolerance
    /// pre-applied, per the strategies' build-time convention); the executor
    /// widens it per slippage-tier attempt before every simulation.
    primary_swap: SwapParams,
    residual_swap: SwapParams,
}

/// A priority-ordered set of strategy candidates for one borrower at one
/// sizing, plus the bookkeeping needed to escalate slippage within a
/// candidate and advance to the next candidate across a revert (§4.11 step
/// 3). `candidates[0]` is tried first.
struct ExecutionPlan {
    candidates: Vec<StrategyCandidate>,
    debt_asset: Address,
    debt_to_cover: U256,
    profit_usd: f64,
}

/// Outcome of [`Executor::plan_from_scratch`], distinguishing "no
/// applicable strategy" from "no profitable fraction" so the caller can
/// record the right `BlacklistReason` (§4.8).
enum PlanOutcome {
    Plan(ExecutionPlan),
    NoStrategy,
    NoProfitableSize,
}

pub struct Executor {
    registry: Arc<StrategyRegistry>,
    sizer: AdaptiveSizer,
    prices: Arc<PriceCache>,
    reserve_configs: Arc<ReserveConfigCache>,
    prepared: Arc<PreparedCache>,
    blacklist: Arc<Blacklist>,
    aggregator: Option<Arc<AggregatorClient>>,
    notifier: Arc<Notifier>,
    contracts: HashMap<Address, Arc<LiquidatorContract>>,
    sender: Arc<TransactionSender>,
    inflight: DashSet<BorrowerId>,
}

impl Executor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<StrategyRegistry>,
        prices: Arc<PriceCache>,
        reserve_configs: Arc<ReserveConfigCache>,
        prepared: Arc<PreparedCache>,
        blacklist: Arc<Blacklist>,
        aggregator: Option<Arc<AggregatorClient>>,
        notifier: Arc<Notifier>,
        contracts: HashMap<Address, Arc<LiquidatorContract>>,
        sender: Arc<TransactionSender>,
    ) -> Self {
        Self {
            registry,
            sizer: AdaptiveSizer::new(prices.clone()),
            prices,
            reserve_configs,
            prepared,
            blacklist,
            aggregator,
            notifier,
            contracts,
            sender,
            inflight: DashSet::new(),
        }
    }

    pub fn is_inflight(&self, borrower: &BorrowerId) -> bool {
        self.inflight.contains(borrower)
    }

    /// Run the full §4.11 pipeline for one candidate. Enforces single-inflight
    /// per borrower (§5) by itself, so callers may spawn this concurrently
    /// for distinct borrowers without their own bookkeeping.
    pub async fn execute(&self, gateway: &RpcGateway, position: &Position) -> Result<ExecutionOutcome> {
        if !self.inflight.insert(position.borrower) {
            return Ok(ExecutionOutcome::AlreadyInFlight);
        }
        let outcome = self.execute_inner(gateway, position).await;
        self.inflight.remove(&position.borrower);
        outcome
    }

    async fn execute_inner(&self, gateway: &RpcGateway, position: &Position) -> Result<ExecutionOutcome> {
        let borrower = position.borrower;

        if self.blacklist.is_blacklisted(&borrower) {
            return Ok(ExecutionOutcome::Blacklisted);
        }

        // Step 1: freshness gate.
        let raw = gateway
            .static_call(position.pool, encode_get_user_account_data(borrower))
            .await
            .context("freshness re-check failed")?;
        let account = decode_get_user_account_data(&raw).context("malformed getUserAccountData return")?;
        if account.health_factor >= u256_math::WAD {
            info!(borrower = %borrower, "health factor recovered above 1, aborting execution");
            self.prepared.invalidate(&borrower);
            return Ok(ExecutionOutcome::Recovered);
        }

        // Step 2: strategy selection, preferring the prepared fast path.
        let (mut plan, mut from_prepared) = match self.prepared.get_valid(&borrower) {
            Some(prepared) => (Self::plan_from_prepared(&prepared)?, true),
            None => match self.plan_from_scratch(gateway, position).await? {
                PlanOutcome::Plan(plan) => (plan, false),
                PlanOutcome::NoStrategy => {
                    self.blacklist.record_failure(borrower, BlacklistReason::NoStrategy);
                    return Ok(ExecutionOutcome::NoStrategy);
                }
                PlanOutcome::NoProfitableSize => {
                    self.blacklist.record_failure(borrower, BlacklistReason::NoProfitableSize);
                    return Ok(ExecutionOutcome::NoStrategy);
                }
            },
        };

        let Some(contract) = self.contracts.get(&position.pool) else {
            anyhow::bail!("no liquidator contract configured for pool {}", position.pool);
        };

        // Steps 3-5: simulate, escalating slippage within a candidate on a
        // swap-shaped revert and advancing to the next applicable strategy
        // (in priority order) on any other revert, or once a candidate's
        // slippage ladder is exhausted (§4.11 step 3).
        let size_usd = self.swap_size_usd(plan.debt_asset, plan.debt_to_cover);
        let mut calldata: Option<Bytes> = None;
        let mut last_was_swap_failure = true;

        loop {
            for candidate in &plan.candidates {
                let mut found = false;
                for attempt in 0..MAX_SLIPPAGE_ATTEMPTS {
                    let tolerance_bps = config().slippage.tolerance_bps(size_usd, attempt);
                    let call = build_call(candidate, tolerance_bps);
                    let encoded = call.encode();

                    match gateway.static_call(contract.address, encoded.clone()).await {
                        Ok(_) => {
                            calldata = Some(encoded);
                            found = true;
                            break;
                        }
                        Err(e) => {
                            if !is_swap_failure(&e) {
                                warn!(borrower = %borrower, error = %e, "simulation reverted, not a swap failure, advancing strategy");
                                last_was_swap_failure = false;
                                break;
                            }
                            last_was_swap_failure = true;
                            warn!(borrower = %borrower, attempt, tolerance_bps, error = %e, "swap-shaped revert, escalating slippage");
                        }
                    }
                }
                if found {
                    break;
                }
            }
            if calldata.is_some() {
                break;
            }

            // Every candidate in this plan reverted. If this came from the
            // prepared fast path, fall through to a from-scratch rebuild so
            // the full priority-ordered strategy set gets a chance before
            // blacklisting, instead of only ever trying the one strategy
            // cached ahead of time.
            if from_prepared {
                match self.plan_from_scratch(gateway, position).await? {
                    PlanOutcome::Plan(rebuilt) => {
                        plan = rebuilt;
                        from_prepared = false;
                        continue;
                    }
                    _ => break,
                }
            }
            break;
        }

        let Some(calldata) = calldata else {
            self.prepared.invalidate(&borrower);
            return if last_was_swap_failure {
                self.blacklist.record_failure(borrower, BlacklistReason::SwapFailed);
                Ok(ExecutionOutcome::SwapFailed)
            } else {
                self.blacklist.record_failure(borrower, BlacklistReason::SimulationReverted);
                Ok(ExecutionOutcome::SimulationReverted)
            };
        };

        // Step 4 (gas pricing) + step 6 (submission).
        let multiplier = config().gas.multiplier_for(plan.profit_usd);
        let gas_price = (self.sender.gas_price() as f64 * multiplier) as u128;

        info!(
            borrower = %borrower,
            from_prepared,
            profit_usd = plan.profit_usd,
            gas_price_gwei = gas_price / 1_000_000_000,
            "submitting liquidation"
        );

        match contract.execute_preencoded_priced(calldata, EXECUTION_GAS_LIMIT, gas_price).await {
            Ok(tx_hash) => {
                self.blacklist.clear(&borrower);
                self.prepared.invalidate(&borrower);
                self.notifier
                    .info(format!("liquidated {borrower} tx={tx_hash:#x} profit=${:.2}", plan.profit_usd))
                    .await;
                Ok(ExecutionOutcome::Confirmed { tx_hash, profit_usd: plan.profit_usd })
            }
            Err(e) => {
                let message = e.to_string();
                if message.contains("reverted") {
                    warn!(borrower = %borrower, error = %e, "liquidation transaction reverted");
                    self.blacklist.record_failure(borrower, BlacklistReason::ExecutionReverted);
                    self.prepared.invalidate(&borrower);
                    self.notifier.alert(format!("liquidation reverted for {borrower}: {e}")).await;
                    Ok(ExecutionOutcome::ExecutionReverted)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Reconstruct an [`ExecutionPlan`] from a prepared entry (I3 fast path),
    /// decoding the swap legs the preparer ABI-encoded ahead of time. A
    /// prepared entry only ever carries the one strategy the preparer picked
    /// — if it reverts, `execute_inner` falls through to
    /// [`Self::plan_from_scratch`] for the full candidate list.
    fn plan_from_prepared(prepared: &PreparedLiquidation) -> Result<ExecutionPlan> {
        let primary_swap = SwapParams::abi_decode(&prepared.encoded_swap_primary, true)
            .context("malformed prepared primary swap")?;
        let residual_swap = SwapParams::abi_decode(&prepared.encoded_swap_residual, true)
            .context("malformed prepared residual swap")?;
        let params = LiquidationParams {
            collateralAsset: prepared.collateral_asset,
            debtAsset: prepared.debt_asset,
            user: prepared.borrower,
            amount: prepared.expected_collateral_seized,
            transferAmount: prepared.expected_collateral_seized,
            debtToCover: prepared.debt_to_cover,
        };
        let candidate = StrategyCandidate {
            flash_source: flash_source_from_pool(&prepared.pool),
            params,
            primary_swap,
            residual_swap,
        };
        Ok(ExecutionPlan {
            candidates: vec![candidate],
            debt_asset: prepared.debt_asset,
            debt_to_cover: prepared.debt_to_cover,
            profit_usd: prepared.estimated_profit_usd,
        })
    }

    /// Slow path: run the strategy registry and adaptive sizer fresh,
    /// exactly as [`crate::preparer::Preparer::prepare`] does ahead of time.
    async fn plan_from_scratch(&self, gateway: &RpcGateway, position: &Position) -> Result<PlanOutcome> {
        let Some(collateral) = position.largest_collateral() else { return Ok(PlanOutcome::NoStrategy) };
        let Some(debt) = position.largest_debt() else { return Ok(PlanOutcome::NoStrategy) };
        if collateral.asset == debt.asset {
            return Ok(PlanOutcome::NoStrategy);
        }

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
            SizeOutcome::NoStrategy => return Ok(PlanOutcome::NoStrategy),
            SizeOutcome::NoProfitableSize => return Ok(PlanOutcome::NoProfitableSize),
        };

        let candidates = sizing
            .strategies
            .into_iter()
            .map(|built| StrategyCandidate {
                flash_source: built.flash_source,
                params: built.params,
                primary_swap: built.primary_swap,
                residual_swap: built.residual_swap,
            })
            .collect();

        Ok(PlanOutcome::Plan(ExecutionPlan {
            candidates,
            debt_asset: debt.asset,
            debt_to_cover: sizing.debt_to_cover,
            profit_usd: sizing.profit_usd,
        }))
    }

    /// USD value of the debt-side swap size, used to pick the base slippage
    /// tier (§4.11 step 5). Falls back to `0.0` (tightest tier) if the price
    /// or decimals aren't cached yet.
    fn swap_size_usd(&self, debt_asset: Address, debt_to_cover: U256) -> f64 {
        let Some(price) = self.prices.get_stale(debt_asset) else { return 0.0 };
        let Some(decimals) = REGISTRY.cached_decimals(debt_asset) else { return 0.0 };
        u256_math::calculate_usd_f64(debt_to_cover, price, decimals)
    }
}

/// Build the submittable [`LiquidationCall`] for one slippage-tier attempt,
/// widening both swap legs' `amountOutMin` from the candidate's raw (zero
/// tolerance) expectation.
fn build_call(candidate: &StrategyCandidate, tolerance_bps: u16) -> LiquidationCall {
    let mut primary_swap = candidate.primary_swap.clone();
    primary_swap.amountOutMin = u256_math::apply_basis_points(primary_swap.amountOutMin, tolerance_bps);

    let mut residual_swap = candidate.residual_swap.clone();
    if !residual_swap.amountOutMin.is_zero() {
        residual_swap.amountOutMin = u256_math::apply_basis_points(residual_swap.amountOutMin, tolerance_bps);
    }

    LiquidationCall {
        flash_source: candidate.flash_source,
        params: candidate.params.clone(),
        primary_swap,
        residual_swap,
        receiver: config().chain.profit_receiver,
    }
}

/// Heuristic classification of a static-call revert as swap-shaped (worth
/// retrying with wider slippage) vs. anything else (terminal). Router and
/// stable-pool implementations the strategies target commonly surface
/// `INSUFFICIENT_OUTPUT_AMOUNT`/`Too little received`-style reasons on a
/// slippage miss.
fn is_swap_failure(error: &anyhow::Error) -> bool {
    let message = error.to_string().to_ascii_lowercase();
    message.contains("insufficient_output")
        || message.contains("too little received")
        || message.contains("slippage")
        || message.contains("min amount")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, Bytes};
    use liquidator_chain::SwapParams;

    fn raw_swap(amount_out_min: u64) -> SwapParams {
        SwapParams {
            swapKind: 0,
            router: Address::ZERO,
            path: Bytes::new(),
            amountIn: U256::ZERO,
            amountOutMin: U256::from(amount_out_min),
            adapters: Bytes::new(),
        }
    }

    fn sample_candidate() -> StrategyCandidate {
        StrategyCandidate {
            flash_source: FlashSource::Pool,
            params: LiquidationParams {
                collateralAsset: Address::ZERO,
                debtAsset: Address::ZERO,
                user: Address::ZERO,
                amount: U256::from(1u64),
                transferAmount: U256::from(1u64),
                debtToCover: U256::from(1u64),
            },
            primary_swap: raw_swap(1000),
            residual_swap: raw_swap(0),
        }
    }

    #[test]
    fn build_call_widens_only_nonzero_min_out() {
        let _ = crate::config::init_config(crate::config::Config::default());
        let candidate = sample_candidate();
        let call = build_call(&candidate, 200); // 2%
        assert_eq!(call.primary_swap.amountOutMin, U256::from(980u64));
        assert_eq!(call.residual_swap.amountOutMin, U256::ZERO);
    }

    #[test]
    fn swap_failure_heuristic_matches_common_router_reasons() {
        let err = anyhow::anyhow!("execution reverted: INSUFFICIENT_OUTPUT_AMOUNT");
        assert!(is_swap_failure(&err));
        let err = anyhow::anyhow!("execution reverted: custom error 0x1234");
        assert!(!is_swap_failure(&err));
    }
}
