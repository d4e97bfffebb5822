//! Per-block hot-position re-check (C10, §4.10).
//!
//! Subscribes to new block headers and, for every block, re-reads
//! `getUserAccountData` for the hot-position tracker's current borrower set
//! in one batched `aggregate3` round trip. A borrower whose health factor
//! just crossed below 1 is handed to the executor immediately, preferring
//! the prepared fast path (I3) when one is fresh. A borrower still above 1
//! but under `prepare_below_hf_bps` with no fresh prepared entry is handed to
//! the background preparer instead. Block handling is serialized by an
//! atomic last-handled-block guard so a late or out-of-order block (e.g. a
//! stale poll racing the websocket stream) is dropped rather than
//! reprocessed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use liquidator_chain::contracts::aave_v3::{decode_get_user_account_data, encode_get_user_account_data};
use liquidator_chain::contracts::common::{BatchCall, IMulticall3};
use liquidator_chain::RpcGateway;

use crate::config::config;
use crate::prepared::PreparedCache;
use crate::preparer::Preparer;
use crate::tracker::HotTracker;
use crate::types::Position;
use crate::u256_math;

/// Sub-calls packed into one `aggregate3` round trip per quick-check batch
/// (P10).
const CHUNK_LIMIT: usize = 50;

/// Per-block re-check of the hot-position tracker (C10).
pub struct BlockTrigger {
    tracker: Arc<HotTracker>,
    prepared: Arc<PreparedCache>,
    preparer: Arc<Preparer>,
    last_handled_block: AtomicU64,
}

impl BlockTrigger {
    pub fn new(tracker: Arc<HotTracker>, prepared: Arc<PreparedCache>, preparer: Arc<Preparer>) -> Self {
        Self { tracker, prepared, preparer, last_handled_block: AtomicU64::new(0) }
    }

    /// Drive the per-block loop until the gateway's block subscription is
    /// permanently exhausted, falling back to fixed-interval polling in the
    /// meantime. `promote` receives the full `Position` (inheriting the
    /// balances the scanner attached) for every borrower whose HF just
    /// crossed below 1, for the executor pool to pick up.
    pub async fn run(&self, gateway: Arc<RpcGateway>, promote: mpsc::Sender<Position>) {
        let mut stream = gateway.subscribe_blocks().await;
        loop {
            match stream.next().await {
                Some(block) => {
                    if let Err(e) = self.handle_block(&gateway, block, &promote).await {
                        warn!(block, error = %e, "block handler failed, continuing");
                    }
                }
                None => {
                    warn!("block subscription exhausted, degrading to polling");
                    self.poll_loop(&gateway, &promote).await;
                    return;
                }
            }
        }
    }

    /// Fixed-interval fallback once the websocket subscription gives up.
    async fn poll_loop(&self, gateway: &Arc<RpcGateway>, promote: &mpsc::Sender<Position>) {
        loop {
            tokio::time::sleep(gateway.poll_interval()).await;
            let block = match gateway
                .with_read_provider(|provider| async move {
                    use alloy::providers::Provider;
                    provider.get_block_number().await.map_err(|e| anyhow::anyhow!("get_block_number failed: {e}"))
                })
                .await
            {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "polling get_block_number failed");
                    continue;
                }
            };
            if let Err(e) = self.handle_block(gateway, block, promote).await {
                warn!(block, error = %e, "block handler failed, continuing");
            }
        }
    }

    /// Process one block: drop it outright if it's not newer than the last
    /// one handled, otherwise re-check every tracked borrower.
    async fn handle_block(
        &self,
        gateway: &Arc<RpcGateway>,
        block: u64,
        promote: &mpsc::Sender<Position>,
    ) -> anyhow::Result<()> {
        let prev = self.last_handled_block.fetch_max(block, Ordering::SeqCst);
        if block <= prev {
            debug!(block, prev, "dropping lagged block");
            return Ok(());
        }

        let borrowers = self.tracker.borrowers();
        if borrowers.is_empty() {
            return Ok(());
        }
        let positions: Vec<Position> = borrowers.iter().filter_map(|b| self.tracker.get(b)).collect();

        let prepare_below_wad =
            u256_math::WAD * alloy::primitives::U256::from(config().timing.prepare_below_hf_bps) / u256_math::BPS_DENOMINATOR;

        for chunk in positions.chunks(CHUNK_LIMIT) {
            let calls: Vec<BatchCall> = chunk
                .iter()
                .map(|p| BatchCall { target: p.pool, allow_failure: true, call_data: encode_get_user_account_data(p.borrower) })
                .collect();

            let multicall = gateway.multicall_address();
            let results = gateway
                .with_read_provider(|provider| {
                    let calls = calls.clone();
                    async move {
                        let contract = IMulticall3::new(multicall, provider);
                        let ret = contract
                            .aggregate3(calls.into_iter().map(Into::into).collect())
                            .call()
                            .await
                            .context("aggregate3 call failed (block trigger quick check)")?;
                        Ok(ret.returnData)
                    }
                })
                .await?;

            for (prior, result) in chunk.iter().zip(results.iter()) {
                if !result.success {
                    continue;
                }
                let Ok(account) = decode_get_user_account_data(&result.returnData) else { continue };

                let was_warm_or_above = prior.health_factor_wad >= u256_math::WAD;
                let now_below_one = account.health_factor < u256_math::WAD;

                let mut updated = prior.clone();
                updated.health_factor_wad = account.health_factor;
                updated.total_debt_value_base_wad = u256_math::base8_to_wad(account.total_debt_base);
                updated.last_observed_block = block;
                updated.last_updated = Instant::now();
                self.tracker.upsert(updated.clone());

                if was_warm_or_above && now_below_one {
                    info!(borrower = %prior.borrower, block, "borrower crossed below HF 1, promoting to executor");
                    let _ = promote.send(updated.clone()).await;
                    continue;
                }

                if account.health_factor < prepare_below_wad
                    && self.prepared.get_valid(&prior.borrower).is_none()
                    && !self.prepared.is_preparing(&prior.borrower)
                {
                    let preparer = self.preparer.clone();
                    let gateway = gateway.clone();
                    let position = updated;
                    tokio::spawn(async move {
                        if let Err(e) = preparer.prepare(&gateway, &position).await {
                            warn!(borrower = %position.borrower, error = %e, "background preparation failed");
                        }
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{init_config, Config};
    use alloy::primitives::U256;

    fn ensure_config() {
        let _ = init_config(Config::default());
    }

    #[test]
    fn last_handled_block_drops_non_increasing() {
        ensure_config();
        let guard = AtomicU64::new(10);
        let prev = guard.fetch_max(10, Ordering::SeqCst);
        assert_eq!(prev, 10);
        assert!(10 <= prev);
    }

    #[test]
    fn warm_then_below_one_is_a_crossing() {
        ensure_config();
        let hf_before = u256_math::WAD;
        let hf_after = u256_math::WAD - U256::from(1u64);
        assert!(hf_before >= u256_math::WAD);
        assert!(hf_after < u256_math::WAD);
    }
}
