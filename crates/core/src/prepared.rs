//! Prepared-liquidation cache (C7, I3).
//!
//! Pre-computed, signed-ready liquidation parameters for hot positions,
//! built asynchronously by [`crate::preparer`] as soon as a tracked
//! borrower's HF drops below `prepare_below_hf_bps`. Entries expire after
//! `PREPARED_TTL` (30s default); concurrent preparation for the same
//! borrower is suppressed with a "preparing" sentinel set.

use dashmap::{DashMap, DashSet};
use std::time::Duration;

use crate::config::config;
use crate::types::{BorrowerId, PreparedLiquidation};

pub struct PreparedCache {
    entries: DashMap<BorrowerId, PreparedLiquidation>,
    preparing: DashSet<BorrowerId>,
}

impl PreparedCache {
    pub fn new() -> Self {
        Self { entries: DashMap::new(), preparing: DashSet::new() }
    }

    fn ttl(&self) -> Duration {
        config().timing.prepared_ttl()
    }

    /// I3: a valid, fresh prepared liquidation for the fast path, or `None`
    /// if absent or stale (the caller falls back to the slow path; a stale
    /// hit is also purged here so it isn't handed out again).
    pub fn get_valid(&self, borrower: &BorrowerId) -> Option<PreparedLiquidation> {
        let ttl = self.ttl();
        match self.entries.get(borrower) {
            Some(entry) if entry.is_fresh(ttl) => Some(entry.clone()),
            Some(_) => {
                drop(self.entries.remove(borrower));
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, prepared: PreparedLiquidation) {
        self.entries.insert(prepared.borrower, prepared);
    }

    /// Invalidate on execution or on detected staleness (§4.11 step 7,
    /// §7 "Prepared-entry stale").
    pub fn invalidate(&self, borrower: &BorrowerId) {
        self.entries.remove(borrower);
    }

    /// Claim the "preparing" sentinel for `borrower`; returns `false` if
    /// another task already holds it, in which case the caller should skip
    /// preparation rather than duplicate the in-flight work.
    pub fn try_begin_preparing(&self, borrower: BorrowerId) -> bool {
        self.preparing.insert(borrower)
    }

    /// Release the sentinel once preparation finishes, successfully or not.
    pub fn finish_preparing(&self, borrower: &BorrowerId) {
        self.preparing.remove(borrower);
    }

    pub fn is_preparing(&self, borrower: &BorrowerId) -> bool {
        self.preparing.contains(borrower)
    }

    /// Drop expired entries; called periodically by the coordinator.
    pub fn sweep_expired(&self) {
        let ttl = self.ttl();
        self.entries.retain(|_, p| p.is_fresh(ttl));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for PreparedCache {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard releasing the "preparing" sentinel on drop, including on the
/// early-return paths of a failed preparation.
pub struct PreparingGuard<'a> {
    cache: &'a PreparedCache,
    borrower: BorrowerId,
}

impl<'a> PreparingGuard<'a> {
    /// Attempt to claim the sentinel; `None` if already in flight.
    pub fn acquire(cache: &'a PreparedCache, borrower: BorrowerId) -> Option<Self> {
        if cache.try_begin_preparing(borrower) {
            Some(Self { cache, borrower })
        } else {
            None
        }
    }
}

impl Drop for PreparingGuard<'_> {
    fn drop(&mut self) {
        self.cache.finish_preparing(&self.borrower);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{init_config, Config};
    use crate::types::{PoolRef, PoolVenue, StrategyId};
    use alloy::primitives::{Address, U256};
    use std::time::{Duration as StdDuration, Instant};

    fn ensure_config() {
        let _ = init_config(Config::default());
    }

    fn sample(borrower: Address, created_at: Instant) -> PreparedLiquidation {
        PreparedLiquidation {
            borrower,
            strategy: StrategyId::V2FlashSwap,
            pool: PoolRef {
                venue: PoolVenue::V2,
                address: Address::ZERO,
                token0: Address::ZERO,
                token1: Address::ZERO,
                fee_micro: 0,
                index_a: None,
                index_b: None,
            },
            collateral_asset: Address::ZERO,
            debt_asset: Address::ZERO,
            debt_to_cover: U256::ZERO,
            expected_collateral_seized: U256::ZERO,
            encoded_swap_primary: vec![],
            encoded_swap_residual: vec![],
            estimated_profit_usd: 1.0,
            created_at,
        }
    }

    #[test]
    fn stale_entry_is_purged_on_read() {
        ensure_config();
        let cache = PreparedCache::new();
        let borrower = Address::repeat_byte(5);
        let stale_time = Instant::now() - StdDuration::from_secs(60);
        cache.insert(sample(borrower, stale_time));
        assert!(cache.get_valid(&borrower).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn fresh_entry_is_returned() {
        ensure_config();
        let cache = PreparedCache::new();
        let borrower = Address::repeat_byte(6);
        cache.insert(sample(borrower, Instant::now()));
        assert!(cache.get_valid(&borrower).is_some());
    }

    #[test]
    fn preparing_guard_prevents_duplicate_work() {
        let cache = PreparedCache::new();
        let borrower = Address::repeat_byte(8);
        let guard1 = PreparingGuard::acquire(&cache, borrower);
        assert!(guard1.is_some());
        assert!(PreparingGuard::acquire(&cache, borrower).is_none());
        drop(guard1);
        assert!(PreparingGuard::acquire(&cache, borrower).is_some());
    }
}
