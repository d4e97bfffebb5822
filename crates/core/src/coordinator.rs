//! Top-level orchestration (C12, §4.12).
//!
//! Wires every other component together and drives the agent's background
//! loops: the per-block hot-position trigger (C10) feeding the executor
//! pool (C11), the periodic full scan (C9) feeding both the executor and
//! the hot tracker (C6), a steady sweep of every TTL-gated cache, and an
//! hourly structured status report. Mirrors the teacher's top-level
//! `Scanner::run` — one `tokio::spawn` per subsystem plus an mpsc channel
//! carrying liquidation candidates into a single consumer loop — adapted to
//! this agent's scan/trigger/executor split.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tracing::{error, info, warn};

use liquidator_api::Notifier;
use liquidator_chain::{RpcGateway, TransactionSender};

use crate::blacklist::Blacklist;
use crate::config::config;
use crate::executor::Executor;
use crate::prepared::PreparedCache;
use crate::scanner::Scanner;
use crate::tracker::HotTracker;
use crate::trigger::BlockTrigger;
use crate::types::Position;

/// Consecutive failed full-scan passes before a silent log line escalates to
/// an alert notification.
const CONSECUTIVE_SCAN_ERROR_ALERT_THRESHOLD: u32 = 3;

/// Cadence for expiring stale blacklist/prepared/tracker entries. Much
/// shorter than any of those TTLs so expiry is prompt without re-scanning
/// the whole map on every loop tick.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Borrowers surfaced in the hourly status report's exposure sample.
const STATUS_REPORT_TOP_N: usize = 5;

pub struct Coordinator {
    gateway: Arc<RpcGateway>,
    scanner: Arc<Scanner>,
    tracker: Arc<HotTracker>,
    trigger: Arc<BlockTrigger>,
    executor: Arc<Executor>,
    prepared: Arc<PreparedCache>,
    blacklist: Arc<Blacklist>,
    notifier: Arc<Notifier>,
    sender: Arc<TransactionSender>,
    shutdown_tx: watch::Sender<bool>,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<RpcGateway>,
        scanner: Arc<Scanner>,
        tracker: Arc<HotTracker>,
        trigger: Arc<BlockTrigger>,
        executor: Arc<Executor>,
        prepared: Arc<PreparedCache>,
        blacklist: Arc<Blacklist>,
        notifier: Arc<Notifier>,
        sender: Arc<TransactionSender>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { gateway, scanner, tracker, trigger, executor, prepared, blacklist, notifier, sender, shutdown_tx }
    }

    /// Signal every background loop to stop. `run` returns once the current
    /// iteration of each loop notices and the spawned tasks are aborted.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Spawn every background loop and block until [`Self::request_shutdown`]
    /// is called.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!(profile = %config().profile, "starting coordinator");

        let (promote_tx, promote_rx) = mpsc::channel::<Position>(256);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let mut handles = Vec::new();

        let trigger_self = self.clone();
        let trigger_promote = promote_tx.clone();
        handles.push(tokio::spawn(async move {
            trigger_self.trigger.run(trigger_self.gateway.clone(), trigger_promote).await;
        }));

        let executor_self = self.clone();
        handles.push(tokio::spawn(async move {
            executor_self.executor_loop(promote_rx).await;
        }));

        let scan_self = self.clone();
        handles.push(tokio::spawn(async move {
            scan_self.scan_cycle(promote_tx).await;
        }));

        let sweep_self = self.clone();
        handles.push(tokio::spawn(async move {
            sweep_self.sweep_cycle().await;
        }));

        let report_self = self.clone();
        handles.push(tokio::spawn(async move {
            report_self.report_cycle().await;
        }));

        let _ = shutdown_rx.changed().await;
        info!("shutdown requested, stopping background tasks");
        for handle in handles {
            handle.abort();
        }
        Ok(())
    }

    /// Drain promoted positions one at a time, pausing `executor_pause`
    /// between attempts (§4.12's backpressure) so a burst of simultaneous
    /// crossings doesn't spend every RPC/gas budget on the first one. A
    /// borrower already in flight (raced by the scan cycle and the block
    /// trigger promoting the same borrower) is skipped, not queued twice.
    async fn executor_loop(&self, mut promote_rx: mpsc::Receiver<Position>) {
        while let Some(position) = promote_rx.recv().await {
            if self.executor.is_inflight(&position.borrower) {
                continue;
            }
            match self.executor.execute(&self.gateway, &position).await {
                Ok(outcome) => {
                    info!(borrower = %position.borrower, outcome = ?outcome, "execution attempt complete");
                }
                Err(e) => {
                    warn!(borrower = %position.borrower, error = %e, "execution attempt errored");
                    self.notifier.alert(format!("execution error for {}: {e}", position.borrower)).await;
                }
            }
            tokio::time::sleep(config().timing.executor_pause()).await;
        }
    }

    /// Periodic full scan (C9): the Liquidatable cohort goes straight to the
    /// executor, the Warm cohort seeds the hot tracker as a side effect of
    /// `Scanner::scan` itself.
    async fn scan_cycle(&self, promote: mpsc::Sender<Position>) {
        let mut ticker = interval(config().timing.loop_interval());
        let mut consecutive_errors = 0u32;
        loop {
            ticker.tick().await;
            match self.scanner.scan(&self.gateway, &self.tracker).await {
                Ok(report) => {
                    consecutive_errors = 0;
                    for position in report.liquidatable {
                        let _ = promote.send(position).await;
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    error!(error = %e, consecutive_errors, "full scan failed");
                    if consecutive_errors >= CONSECUTIVE_SCAN_ERROR_ALERT_THRESHOLD {
                        self.notifier
                            .alert(format!("{consecutive_errors} consecutive full-scan failures, last: {e}"))
                            .await;
                    }
                }
            }
        }
    }

    /// Expire stale entries across every TTL-gated cache (I3-I5) plus the
    /// notifier's own rate-limit dedupe table.
    async fn sweep_cycle(&self) {
        let mut ticker = interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            self.blacklist.sweep_expired();
            self.prepared.sweep_expired();
            let evicted = self.tracker.evict_stale();
            self.notifier.sweep_expired();
            if evicted > 0 {
                info!(evicted, "evicted stale hot-tracker entries");
            }
        }
    }

    /// Hourly structured status report (§4.12): cache sizes, the
    /// liquidator's own balance, and the current top-N warmest borrowers.
    async fn report_cycle(&self) {
        let mut ticker = interval(config().timing.report_interval());
        loop {
            ticker.tick().await;

            let balance = match self.sender.get_balance().await {
                Ok(b) => Some(b),
                Err(e) => {
                    warn!(error = %e, "failed to fetch liquidator balance for status report");
                    None
                }
            };

            let top = self.tracker.top_n_by_priority(STATUS_REPORT_TOP_N);
            let top_borrowers: Vec<String> = top
                .iter()
                .map(|p| format!("{}(hf={})", p.borrower, p.health_factor_wad))
                .collect();

            info!(
                liquidator_address = %self.sender.address,
                balance_wei = ?balance,
                tracked = self.tracker.len(),
                blacklisted = self.blacklist.len(),
                prepared_inflight = self.prepared.len(),
                top_borrowers = ?top_borrowers,
                "[STATUS] hourly report"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_interval_is_well_under_every_ttl() {
        let _ = crate::config::init_config(crate::config::Config::default());
        assert!(SWEEP_INTERVAL < config().timing.blacklist_ttl());
        assert!(SWEEP_INTERVAL < config().timing.prepared_ttl() + Duration::from_secs(30));
    }
}
