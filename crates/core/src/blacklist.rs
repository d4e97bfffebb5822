//! Failure blacklist (C8, I5).
//!
//! A borrower with `failures >= 3` within the last `blacklist_ttl` is skipped
//! entirely by the executor. Entries expire on TTL and are purged outright
//! on a successful execution.

use dashmap::DashMap;
use std::time::Duration;

use crate::config::config;
use crate::types::{BlacklistEntry, BlacklistReason, BorrowerId};

const MIN_FAILURES: u32 = 3;

/// Process-wide failure tracker, one entry per borrower.
pub struct Blacklist {
    entries: DashMap<BorrowerId, BlacklistEntry>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    fn ttl(&self) -> Duration {
        config().timing.blacklist_ttl()
    }

    /// Record a failed attempt, tagged with its cause.
    pub fn record_failure(&self, borrower: BorrowerId, reason: BlacklistReason) {
        self.entries
            .entry(borrower)
            .and_modify(|e| e.record_failure(reason))
            .or_insert_with(|| BlacklistEntry::new(reason));
    }

    /// I5: active iff at least 3 failures within the TTL of the last one.
    pub fn is_blacklisted(&self, borrower: &BorrowerId) -> bool {
        self.entries
            .get(borrower)
            .map(|e| e.is_active(self.ttl(), MIN_FAILURES))
            .unwrap_or(false)
    }

    /// A successful execution purges the entry outright (P6).
    pub fn clear(&self, borrower: &BorrowerId) {
        self.entries.remove(borrower);
    }

    /// Drop entries whose TTL has lapsed; called periodically by the
    /// coordinator so the map doesn't grow unbounded with expired rows.
    pub fn sweep_expired(&self) {
        let ttl = self.ttl();
        self.entries.retain(|_, e| e.last_attempt_at.elapsed() <= ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Blacklist {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    fn setup_config() {
        let _ = crate::config::init_config(crate::config::Config::default());
    }

    #[test]
    fn blacklists_after_three_failures() {
        setup_config();
        let bl = Blacklist::new();
        let user = Address::repeat_byte(7);
        assert!(!bl.is_blacklisted(&user));
        bl.record_failure(user, BlacklistReason::SimulationReverted);
        bl.record_failure(user, BlacklistReason::SimulationReverted);
        assert!(!bl.is_blacklisted(&user));
        bl.record_failure(user, BlacklistReason::ExecutionReverted);
        assert!(bl.is_blacklisted(&user));
    }

    #[test]
    fn success_clears_entry() {
        setup_config();
        let bl = Blacklist::new();
        let user = Address::repeat_byte(9);
        for _ in 0..3 {
            bl.record_failure(user, BlacklistReason::NoStrategy);
        }
        assert!(bl.is_blacklisted(&user));
        bl.clear(&user);
        assert!(!bl.is_blacklisted(&user));
    }
}
