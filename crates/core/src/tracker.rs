//! Hot-position tracker (C6, I4).
//!
//! Holds the set of borrowers whose last observation showed `1 <= HF < 1.10`
//! with `totalDebtValue >= MIN_DEBT_USD`. Populated by the full scanner's
//! Warm cohort (§4.9) and refreshed in place by the block trigger's quick
//! check (§4.10). Entries not updated for `hot_position_ttl` are evicted.

use alloy::primitives::U256;
use dashmap::DashMap;
use std::time::Duration;

use crate::config::config;
use crate::types::{BorrowerId, Position};
use crate::u256_math;

/// Process-wide hot-position map.
pub struct HotTracker {
    positions: DashMap<BorrowerId, Position>,
}

impl HotTracker {
    pub fn new() -> Self {
        Self { positions: DashMap::new() }
    }

    fn ttl(&self) -> Duration {
        config().timing.hot_position_ttl()
    }

    fn min_debt_usd_wad(&self) -> U256 {
        u256_math::f64_to_wad(config().thresholds.min_debt_usd)
    }

    /// Insert or replace an entry, applying I4's warm-band + min-debt test.
    /// If the position no longer qualifies, it is removed instead (covers
    /// both HF recovery above the warm band and HF dropping below 1, which
    /// belongs to the Liquidatable cohort, not the tracker).
    pub fn upsert(&self, position: Position) {
        let borrower = position.borrower;
        if position.is_warm() && position.total_debt_value_base_wad >= self.min_debt_usd_wad() {
            self.positions.insert(borrower, position);
        } else {
            self.positions.remove(&borrower);
        }
    }

    pub fn remove(&self, borrower: &BorrowerId) {
        self.positions.remove(borrower);
    }

    pub fn get(&self, borrower: &BorrowerId) -> Option<Position> {
        self.positions.get(borrower).map(|e| e.clone())
    }

    pub fn contains(&self, borrower: &BorrowerId) -> bool {
        self.positions.contains_key(borrower)
    }

    /// All currently-tracked borrowers, for the block trigger's per-block
    /// quick-check fan-out.
    pub fn borrowers(&self) -> Vec<BorrowerId> {
        self.positions.iter().map(|e| *e.key()).collect()
    }

    /// I4: drop entries whose `last_updated` is older than the TTL. Called
    /// by the coordinator on a steady cadence (and opportunistically by the
    /// block trigger after each quick check).
    pub fn evict_stale(&self) -> usize {
        let ttl = self.ttl();
        let before = self.positions.len();
        self.positions.retain(|_, p| p.last_updated.elapsed() <= ttl);
        before - self.positions.len()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Top-N by `totalDebt / HF` priority score, matching the scanner's Warm
    /// cohort ordering (§4.9), for status reporting (§4.12).
    pub fn top_n_by_priority(&self, n: usize) -> Vec<Position> {
        let mut all: Vec<Position> = self.positions.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| priority_score(b).total_cmp(&priority_score(a)));
        all.truncate(n);
        all
    }
}

fn priority_score(p: &Position) -> f64 {
    let debt = u256_math::wad_to_f64(p.total_debt_value_base_wad);
    let hf = u256_math::wad_to_f64(p.health_factor_wad).max(f64::EPSILON);
    debt / hf
}

impl Default for HotTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{init_config, Config};
    use alloy::primitives::Address;

    fn ensure_config() {
        let _ = init_config(Config::default());
    }

    fn warm_position(borrower: Address, hf_wad: U256, debt_usd: u64) -> Position {
        let mut p = Position::new(borrower, Address::ZERO);
        p.health_factor_wad = hf_wad;
        p.total_debt_value_base_wad = U256::from(debt_usd) * u256_math::WAD;
        p
    }

    #[test]
    fn upsert_rejects_below_min_debt() {
        ensure_config();
        let tracker = HotTracker::new();
        let borrower = Address::repeat_byte(1);
        tracker.upsert(warm_position(borrower, u256_math::WAD, 0));
        assert!(!tracker.contains(&borrower));
    }

    #[test]
    fn upsert_accepts_warm_band() {
        ensure_config();
        let tracker = HotTracker::new();
        let borrower = Address::repeat_byte(2);
        tracker.upsert(warm_position(borrower, u256_math::WAD, 100));
        assert!(tracker.contains(&borrower));
    }

    #[test]
    fn upsert_evicts_on_recovery_above_band() {
        ensure_config();
        let tracker = HotTracker::new();
        let borrower = Address::repeat_byte(3);
        tracker.upsert(warm_position(borrower, u256_math::WAD, 100));
        assert!(tracker.contains(&borrower));
        tracker.upsert(warm_position(borrower, u256_math::WARM_UPPER_WAD, 100));
        assert!(!tracker.contains(&borrower));
    }
}
