//! Core data model: borrower positions, pool references, strategies, quotes,
//! prepared liquidations and the blacklist entry shape.
//!
//! Every type here is a plain data holder; behavior lives in the modules that
//! own a collection of these (tracker, prepared cache, blacklist, strategy
//! registry).

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::time::Instant;

/// Opaque account identifier. Unique key throughout the crate.
pub type BorrowerId = Address;

/// Opaque token identifier. Decimals/stable-flag/oracle source live in the
/// asset registry, keyed by this.
pub type AssetId = Address;

/// A single collateral or debt leg: `(AssetId, Amount)` plus the USD value
/// computed from the latest observed price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralHolding {
    pub asset: AssetId,
    pub amount: U256,
    pub price: U256,
    pub decimals: u8,
    pub value_usd_wad: U256,
    /// Liquidation threshold in basis points (e.g. 8000 = 80%).
    pub liquidation_threshold_bps: u16,
    /// Liquidation bonus in basis points (e.g. 500 = 5%).
    pub liquidation_bonus_bps: u16,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtHolding {
    pub asset: AssetId,
    pub amount: U256,
    pub price: U256,
    pub decimals: u8,
    pub value_usd_wad: U256,
}

/// Which AMM family a pool belongs to; determines quoting math and flash
/// protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolVenue {
    V2,
    V3,
    Stable,
}

/// Reference to a swap pool, sufficient to quote and to encode a swap call
/// against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRef {
    pub venue: PoolVenue,
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    /// Fee in millionths (V3 fee tiers: 500/3000/10000). Zero for V2/Stable.
    pub fee_micro: u32,
    /// Stable-pool coin index of token0, when `venue == Stable`.
    pub index_a: Option<u8>,
    /// Stable-pool coin index of token1, when `venue == Stable`.
    pub index_b: Option<u8>,
}

impl PoolRef {
    /// The pool's two tokens in canonical `(token0, token1)` order.
    pub fn tokens(&self) -> (Address, Address) {
        (self.token0, self.token1)
    }

    /// Whether `asset` is one of this pool's two tokens.
    pub fn contains(&self, asset: Address) -> bool {
        self.token0 == asset || self.token1 == asset
    }
}

/// Closed set of liquidation execution strategies, ordered by ascending
/// priority (lower tried first) in the registry, not by declaration order
/// here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyId {
    StableKittyOverAaveFlash,
    StableKittyOverV3Flash,
    V2FlashSwap,
    V3Flash,
    V2DirectOverAaveFlash,
    V3DirectOverAaveFlash,
    AggregatorOverAaveFlash,
}

impl StrategyId {
    /// Fixed priority order; lower value is attempted first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::StableKittyOverAaveFlash => 1,
            Self::StableKittyOverV3Flash => 2,
            Self::V2FlashSwap => 3,
            Self::V3Flash => 4,
            Self::V2DirectOverAaveFlash => 5,
            Self::V3DirectOverAaveFlash => 6,
            Self::AggregatorOverAaveFlash => 7,
        }
    }
}

/// Result of quoting a swap against one pool for one candidate amount.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub venue: PoolVenue,
    pub pool: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_bps: u32,
}

impl Quote {
    /// A quote is usable iff its output exceeds input plus all fees,
    /// expressed in the same numeraire by the caller before calling this.
    pub fn is_usable(&self, all_fees: U256) -> bool {
        self.amount_out > self.amount_in.saturating_add(all_fees)
    }
}

/// A fully-prepared liquidation call, ready to submit as soon as its trigger
/// fires, subject to the TTL in `created_at`.
#[derive(Debug, Clone)]
pub struct PreparedLiquidation {
    pub borrower: BorrowerId,
    pub strategy: StrategyId,
    pub pool: PoolRef,
    pub collateral_asset: AssetId,
    pub debt_asset: AssetId,
    pub debt_to_cover: U256,
    pub expected_collateral_seized: U256,
    pub encoded_swap_primary: Vec<u8>,
    pub encoded_swap_residual: Vec<u8>,
    pub estimated_profit_usd: f64,
    pub created_at: Instant,
}

impl PreparedLiquidation {
    /// I3: a prepared liquidation is valid only within `ttl` of creation.
    pub fn is_fresh(&self, ttl: std::time::Duration) -> bool {
        self.created_at.elapsed() <= ttl
    }
}

/// Why a borrower is currently blacklisted (§4.8, §7 reason tags).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlacklistReason {
    /// No registered strategy's `canHandle` matched the position.
    NoStrategy,
    /// Every ladder fraction the sizer tried was unprofitable.
    NoProfitableSize,
    /// A static-call simulation reverted for a reason other than HF-recovered
    /// or swap-failed, and no further strategy was applicable.
    SimulationReverted,
    /// The submitted transaction reverted on-chain.
    ExecutionReverted,
    /// Every slippage tier produced a reverting swap.
    SwapFailed,
    /// Simulation succeeded but yielded non-positive profit.
    NegativeReward,
}

/// I5: tracks repeated failures for a borrower so the bot stops wasting gas
/// on pathological positions.
#[derive(Debug, Clone)]
pub struct BlacklistEntry {
    pub failures: u32,
    pub last_attempt_at: Instant,
    pub reason: BlacklistReason,
}

impl BlacklistEntry {
    pub fn new(reason: BlacklistReason) -> Self {
        Self {
            failures: 1,
            last_attempt_at: Instant::now(),
            reason,
        }
    }

    pub fn record_failure(&mut self, reason: BlacklistReason) {
        self.failures += 1;
        self.last_attempt_at = Instant::now();
        self.reason = reason;
    }

    /// I5: blacklisted iff at least 3 failures within `ttl` of the last one.
    pub fn is_active(&self, ttl: std::time::Duration, min_failures: u32) -> bool {
        self.failures >= min_failures && self.last_attempt_at.elapsed() <= ttl
    }
}

/// I4: a borrower tracked by the hot-position tracker — last scan showed
/// `1 <= HF < 1.10` and `totalDebtValue >= MIN_DEBT_USD`.
#[derive(Debug, Clone)]
pub struct Position {
    pub borrower: BorrowerId,
    pub pool: Address,
    pub health_factor_wad: U256,
    pub total_debt_value_base_wad: U256,
    pub last_observed_block: u64,
    pub collaterals: SmallVec<[CollateralHolding; 4]>,
    pub debts: SmallVec<[DebtHolding; 4]>,
    pub last_updated: Instant,
}

impl Position {
    pub fn new(borrower: BorrowerId, pool: Address) -> Self {
        Self {
            borrower,
            pool,
            health_factor_wad: U256::MAX,
            total_debt_value_base_wad: U256::ZERO,
            last_observed_block: 0,
            collaterals: SmallVec::new(),
            debts: SmallVec::new(),
            last_updated: Instant::now(),
        }
    }

    /// I4 warmth test: `1 <= HF < 1.10`.
    pub fn is_warm(&self) -> bool {
        crate::u256_math::is_warm_wad(self.health_factor_wad)
    }

    pub fn is_liquidatable(&self) -> bool {
        crate::u256_math::is_liquidatable_wad(self.health_factor_wad)
    }

    pub fn largest_collateral(&self) -> Option<&CollateralHolding> {
        self.collaterals
            .iter()
            .filter(|c| c.enabled)
            .max_by_key(|c| c.value_usd_wad)
    }

    pub fn largest_debt(&self) -> Option<&DebtHolding> {
        self.debts.iter().max_by_key(|d| d.value_usd_wad)
    }

    /// Single-asset self-collateralized or largest-collateral-equals-largest-debt
    /// positions can't be liquidated by swapping collateral for debt.
    pub fn is_bad_debt(&self, dust_threshold_usd_wad: U256) -> bool {
        let total_collateral: U256 = self.collaterals.iter().map(|c| c.value_usd_wad).sum();
        if total_collateral < dust_threshold_usd_wad {
            return true;
        }
        if let (Some(collateral), Some(debt)) = (self.largest_collateral(), self.largest_debt()) {
            if collateral.asset == debt.asset {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_band_boundaries() {
        let mut pos = Position::new(Address::ZERO, Address::ZERO);
        pos.health_factor_wad = crate::u256_math::WAD;
        assert!(pos.is_warm());
        pos.health_factor_wad = crate::u256_math::WARM_UPPER_WAD;
        assert!(!pos.is_warm());
    }

    #[test]
    fn bad_debt_when_collateral_equals_debt_asset() {
        let token = Address::repeat_byte(1);
        let mut pos = Position::new(Address::ZERO, Address::ZERO);
        pos.collaterals.push(CollateralHolding {
            asset: token,
            amount: U256::from(1000u64),
            price: U256::from(1u64),
            decimals: 18,
            value_usd_wad: U256::from(1000u64) * crate::u256_math::WAD,
            liquidation_threshold_bps: 8000,
            liquidation_bonus_bps: 500,
            enabled: true,
        });
        pos.debts.push(DebtHolding {
            asset: token,
            amount: U256::from(500u64),
            price: U256::from(1u64),
            decimals: 18,
            value_usd_wad: U256::from(500u64) * crate::u256_math::WAD,
        });
        assert!(pos.is_bad_debt(U256::ZERO));
    }

    #[test]
    fn strategy_priority_ordering() {
        assert!(StrategyId::StableKittyOverAaveFlash.priority() < StrategyId::V2FlashSwap.priority());
        assert!(StrategyId::V3Flash.priority() < StrategyId::V2DirectOverAaveFlash.priority());
    }
}
