//! Full position scan (C9, §4.9).
//!
//! Pages the subgraph indexer for the complete borrower list, then for each
//! configured pool batches `getUserAccountData` reads through `aggregate3` in
//! chunks of 50 (P10) and classifies the result into three cohorts:
//! Liquidatable (`0 < HF <= 1`), Warm (`1 <= HF < 1.10` above the minimum
//! debt floor) and Healthy (everything else). The Warm cohort seeds the
//! hot-position tracker (C6) so the block trigger (C10) only has to re-check
//! a small set of borrowers per block instead of the whole universe.
//!
//! Per-reserve balances for the Liquidatable/Warm cohorts are fetched with
//! bounded concurrency — the balances reader takes one `(pool, user)` pair
//! per call and can't be folded into the account-data aggregate3 batch.

use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use smallvec::SmallVec;
use tracing::{info, warn};

use liquidator_api::IndexerClient;
use liquidator_chain::contracts::aave_v3::{decode_get_user_account_data, encode_get_user_account_data, UserAccountData};
use liquidator_chain::contracts::balances::{decode_balances, encode_get_borrowed_balances, encode_get_supplied_balances};
use liquidator_chain::contracts::common::{BatchCall, IMulticall3};
use liquidator_chain::RpcGateway;

use crate::cache::ReserveConfigCache;
use crate::config::config;
use crate::tracker::HotTracker;
use crate::types::{BorrowerId, CollateralHolding, DebtHolding, Position};
use crate::u256_math;

/// Sub-calls packed into one `aggregate3` round trip per account-data batch
/// (P10).
const CHUNK_LIMIT: usize = 50;

/// Bounded concurrency for the per-borrower balances fetch.
const BALANCES_CONCURRENCY: usize = 20;

/// Result of one full pool-wide scan pass.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// `0 < HF <= 1`, sorted by `totalDebtValue` descending — biggest bounty
    /// first.
    pub liquidatable: Vec<Position>,
    /// `1 <= HF < 1.10` with `totalDebtValue >= min_debt_usd`, sorted by
    /// `totalDebtValue / HF` descending — closest-and-biggest first.
    pub warm: Vec<Position>,
    pub healthy_count: usize,
    pub total_scanned: usize,
    pub scan_duration_ms: u128,
}

pub struct Scanner {
    indexer: IndexerClient,
    reserve_configs: Arc<ReserveConfigCache>,
}

impl Scanner {
    pub fn new(indexer: IndexerClient, reserve_configs: Arc<ReserveConfigCache>) -> Self {
        Self { indexer, reserve_configs }
    }

    /// Run one complete scan pass across every configured pool, updating
    /// `tracker` from the Warm cohort in place.
    pub async fn scan(&self, gateway: &RpcGateway, tracker: &HotTracker) -> Result<ScanReport> {
        let start = Instant::now();
        let users = self.indexer.fetch_all_users().await.context("indexer fetch_all_users failed")?;
        let block = self.current_block(gateway).await.unwrap_or(0);
        info!(borrowers = users.len(), block, "indexer returned borrower list");

        let min_debt_usd_wad = u256_math::f64_to_wad(config().thresholds.min_debt_usd);

        let mut liquidatable = Vec::new();
        let mut warm = Vec::new();
        let mut healthy_count = 0usize;
        let mut total_scanned = 0usize;

        for &pool in &config().pools.pools_list {
            for chunk in users.chunks(CHUNK_LIMIT) {
                let accounts = match self.batch_account_data(gateway, pool, chunk).await {
                    Ok(a) => a,
                    Err(e) => {
                        warn!(pool = %pool, error = %e, "account-data batch failed, skipping chunk");
                        continue;
                    }
                };

                for (&borrower, account) in chunk.iter().zip(accounts.into_iter()) {
                    let Some(account) = account else { continue };
                    if account.total_debt_base.is_zero() {
                        continue;
                    }
                    total_scanned += 1;

                    let mut position = Position::new(borrower, pool);
                    position.health_factor_wad = account.health_factor;
                    position.total_debt_value_base_wad = u256_math::base8_to_wad(account.total_debt_base);
                    position.last_observed_block = block;

                    if position.is_liquidatable() {
                        liquidatable.push(position);
                    } else if position.is_warm() && position.total_debt_value_base_wad >= min_debt_usd_wad {
                        warm.push(position);
                    } else {
                        healthy_count += 1;
                    }
                }
            }
        }

        // Per-reserve balances only matter for the two cohorts a strategy
        // might actually act on; the Healthy cohort is never inspected
        // again before the next scan.
        self.attach_balances(gateway, &mut liquidatable).await;
        self.attach_balances(gateway, &mut warm).await;

        liquidatable.sort_by(|a, b| b.total_debt_value_base_wad.cmp(&a.total_debt_value_base_wad));
        warm.sort_by(|a, b| priority_score(b).total_cmp(&priority_score(a)));

        for position in &warm {
            tracker.upsert(position.clone());
        }

        let scan_duration_ms = start.elapsed().as_millis();
        info!(
            liquidatable = liquidatable.len(),
            warm = warm.len(),
            healthy = healthy_count,
            total_scanned,
            scan_duration_ms,
            "scan pass complete"
        );

        Ok(ScanReport { liquidatable, warm, healthy_count, total_scanned, scan_duration_ms })
    }

    async fn current_block(&self, gateway: &RpcGateway) -> Result<u64> {
        gateway
            .with_read_provider(|provider| async move {
                use alloy::providers::Provider;
                provider.get_block_number().await.map_err(|e| anyhow::anyhow!("get_block_number failed: {e}"))
            })
            .await
    }

    /// Batch `getUserAccountData` for `users` against `pool` through
    /// `aggregate3`, one `Option` per input user (`None` on a failed
    /// sub-call, aligned by index).
    async fn batch_account_data(
        &self,
        gateway: &RpcGateway,
        pool: Address,
        users: &[BorrowerId],
    ) -> Result<Vec<Option<UserAccountData>>> {
        let multicall = gateway.multicall_address();
        let calls: Vec<BatchCall> = users
            .iter()
            .map(|&user| BatchCall { target: pool, allow_failure: true, call_data: encode_get_user_account_data(user) })
            .collect();

        let results = gateway
            .with_read_provider(|provider| {
                let calls = calls.clone();
                async move {
                    let contract = IMulticall3::new(multicall, provider);
                    let ret = contract
                        .aggregate3(calls.into_iter().map(Into::into).collect())
                        .call()
                        .await
                        .context("aggregate3 call failed (account data batch)")?;
                    Ok(ret.returnData)
                }
            })
            .await?;

        Ok(results
            .iter()
            .map(|r| if r.success { decode_get_user_account_data(&r.returnData).ok() } else { None })
            .collect())
    }

    /// Fetch and attach `collaterals`/`debts` for every position in `batch`,
    /// bounded to `BALANCES_CONCURRENCY` in-flight requests at a time.
    async fn attach_balances(&self, gateway: &RpcGateway, batch: &mut [Position]) {
        let fetched: Vec<_> = stream::iter(batch.iter().map(|p| (p.borrower, p.pool)))
            .map(|(borrower, pool)| async move { (borrower, self.fetch_balances(gateway, pool, borrower).await) })
            .buffer_unordered(BALANCES_CONCURRENCY)
            .collect()
            .await;

        for (borrower, result) in fetched {
            let Ok((collaterals, debts)) = result else { continue };
            if let Some(position) = batch.iter_mut().find(|p| p.borrower == borrower) {
                position.collaterals = collaterals;
                position.debts = debts;
            }
        }
    }

    /// Read both balance legs for `(pool, user)` in one `aggregate3` round
    /// trip, then attach each reserve's liquidation threshold/bonus from the
    /// reserve-config cache (refreshing any asset not yet cached).
    async fn fetch_balances(
        &self,
        gateway: &RpcGateway,
        pool: Address,
        user: Address,
    ) -> Result<(SmallVec<[CollateralHolding; 4]>, SmallVec<[DebtHolding; 4]>)> {
        let reader = config().pools.balances_reader_address;
        if reader.is_zero() {
            return Ok((SmallVec::new(), SmallVec::new()));
        }
        let multicall = gateway.multicall_address();

        let calls = vec![
            BatchCall { target: reader, allow_failure: true, call_data: encode_get_supplied_balances(pool, user) },
            BatchCall { target: reader, allow_failure: true, call_data: encode_get_borrowed_balances(pool, user) },
        ];

        let results = gateway
            .with_read_provider(|provider| {
                let calls = calls.clone();
                async move {
                    let contract = IMulticall3::new(multicall, provider);
                    let ret = contract
                        .aggregate3(calls.into_iter().map(Into::into).collect())
                        .call()
                        .await
                        .context("aggregate3 call failed (balances)")?;
                    Ok(ret.returnData)
                }
            })
            .await?;

        let supplied = results
            .first()
            .filter(|r| r.success)
            .map(|r| decode_balances(&r.returnData))
            .transpose()?
            .unwrap_or_default();
        let borrowed = results
            .get(1)
            .filter(|r| r.success)
            .map(|r| decode_balances(&r.returnData))
            .transpose()?
            .unwrap_or_default();

        let assets: Vec<Address> = supplied.iter().chain(borrowed.iter()).map(|e| e.underlying).collect();
        let _ = self.reserve_configs.batch_refresh(gateway, &assets).await;

        let collaterals = supplied
            .into_iter()
            .filter(|e| !e.amount.is_zero())
            .map(|e| {
                let cfg = self.reserve_configs.get_fresh(e.underlying).or_else(|| self.reserve_configs.get_stale(e.underlying));
                CollateralHolding {
                    asset: e.underlying,
                    amount: e.amount,
                    price: e.price,
                    decimals: e.decimals,
                    value_usd_wad: u256_math::calculate_usd_wad(e.amount, e.price, e.decimals),
                    liquidation_threshold_bps: cfg.map(|c| c.liquidation_threshold_bps).unwrap_or(0),
                    liquidation_bonus_bps: cfg.map(|c| c.liquidation_bonus_bps).unwrap_or(0),
                    // `getReserveConfigurationData`'s usage-as-collateral flag
                    // isn't decoded (§4.2); a zero liquidation threshold is
                    // the closest available proxy for "not usable as
                    // collateral".
                    enabled: cfg.map(|c| c.liquidation_threshold_bps > 0).unwrap_or(false),
                }
            })
            .collect();

        let debts = borrowed
            .into_iter()
            .filter(|e| !e.amount.is_zero())
            .map(|e| DebtHolding {
                asset: e.underlying,
                amount: e.amount,
                price: e.price,
                decimals: e.decimals,
                value_usd_wad: u256_math::calculate_usd_wad(e.amount, e.price, e.decimals),
            })
            .collect();

        Ok((collaterals, debts))
    }
}

fn priority_score(p: &Position) -> f64 {
    let debt = u256_math::wad_to_f64(p.total_debt_value_base_wad);
    let hf = u256_math::wad_to_f64(p.health_factor_wad).max(f64::EPSILON);
    debt / hf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{init_config, Config};
    use alloy::primitives::{address, U256};

    fn ensure_config() {
        let _ = init_config(Config::default());
    }

    #[test]
    fn priority_score_rewards_lower_health_factor() {
        let mut a = Position::new(address!("0000000000000000000000000000000000000001"), Address::ZERO);
        a.health_factor_wad = u256_math::WAD;
        a.total_debt_value_base_wad = U256::from(1000u64) * u256_math::WAD;

        let mut b = Position::new(address!("0000000000000000000000000000000000000002"), Address::ZERO);
        b.health_factor_wad = u256_math::WARM_UPPER_WAD - U256::from(1u64);
        b.total_debt_value_base_wad = U256::from(1000u64) * u256_math::WAD;

        assert!(priority_score(&a) > priority_score(&b));
    }

    #[test]
    fn scan_report_defaults_are_empty() {
        ensure_config();
        let report = ScanReport::default();
        assert!(report.liquidatable.is_empty());
        assert!(report.warm.is_empty());
        assert_eq!(report.healthy_count, 0);
    }
}
