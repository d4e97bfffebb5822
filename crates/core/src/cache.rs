//! Price & reserve-config cache (C2, §4.2).
//!
//! Both caches are simple TTL-gated `DashMap`s refreshed in batches through
//! the Multicall3-style aggregator (§6.3). On a refresh failure for one
//! asset, the previous cached value (however stale) is served rather than
//! dropped — a candidate only gets skipped outright when no price has ever
//! been observed for it (§7 "oracle read failed").

use alloy::primitives::U256;
use anyhow::{Context, Result};
use dashmap::DashMap;
use std::time::{Duration, Instant};

use liquidator_chain::contracts::aave_v3::{
    decode_get_reserve_configuration_data, encode_get_reserve_configuration_data, ReserveConfig,
};
use liquidator_chain::contracts::common::{BatchCall, IMulticall3};
use liquidator_chain::contracts::oracle::{decode_get_asset_price, encode_get_asset_price};
use liquidator_chain::RpcGateway;

use crate::config::config;
use crate::types::AssetId;

/// Sub-calls packed into one `aggregate3` round trip per refresh batch (P10).
const CHUNK_LIMIT: usize = 50;

struct CachedPrice {
    price: U256,
    cached_at: Instant,
}

/// Process-wide oracle price cache, one entry per asset.
pub struct PriceCache {
    prices: DashMap<AssetId, CachedPrice>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self { prices: DashMap::new() }
    }

    fn ttl(&self) -> Duration {
        config().timing.price_cache_ttl()
    }

    /// A price fresh within the TTL, or `None`.
    pub fn get_fresh(&self, asset: AssetId) -> Option<U256> {
        self.prices
            .get(&asset)
            .filter(|p| p.cached_at.elapsed() <= self.ttl())
            .map(|p| p.price)
    }

    /// Whatever is cached, fresh or not — the §7 stale-price fallback.
    pub fn get_stale(&self, asset: AssetId) -> Option<U256> {
        self.prices.get(&asset).map(|p| p.price)
    }

    fn store(&self, asset: AssetId, price: U256) {
        self.prices.insert(asset, CachedPrice { price, cached_at: Instant::now() });
    }

    /// Refresh every asset's price in aggregator-batched chunks. Sub-calls
    /// that fail are simply left with their previous (possibly stale or
    /// absent) cache entry.
    pub async fn batch_refresh(&self, gateway: &RpcGateway, assets: &[AssetId]) -> Result<()> {
        let oracle = config().pools.oracle_address;
        let multicall = gateway.multicall_address();

        for chunk in assets.chunks(CHUNK_LIMIT) {
            let calls: Vec<BatchCall> = chunk
                .iter()
                .map(|asset| BatchCall {
                    target: oracle,
                    allow_failure: true,
                    call_data: encode_get_asset_price(*asset),
                })
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
                            .context("aggregate3 call failed (price batch)")?;
                        Ok(ret.returnData)
                    }
                })
                .await?;

            for (asset, result) in chunk.iter().zip(results.iter()) {
                if !result.success {
                    continue;
                }
                if let Ok(price) = decode_get_asset_price(&result.returnData) {
                    self.store(*asset, price);
                }
            }
        }

        Ok(())
    }

    /// Single-asset convenience wrapping a one-element batch.
    pub async fn refresh_one(&self, gateway: &RpcGateway, asset: AssetId) -> Result<U256> {
        self.batch_refresh(gateway, &[asset]).await?;
        self.get_stale(asset).ok_or_else(|| anyhow::anyhow!("no price observed for {asset}"))
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}

struct CachedReserveConfig {
    config: ReserveConfig,
    cached_at: Instant,
}

/// Process-wide per-reserve liquidation-parameter cache.
pub struct ReserveConfigCache {
    configs: DashMap<AssetId, CachedReserveConfig>,
}

impl ReserveConfigCache {
    pub fn new() -> Self {
        Self { configs: DashMap::new() }
    }

    fn ttl(&self) -> Duration {
        config().timing.reserve_cfg_ttl()
    }

    pub fn get_fresh(&self, asset: AssetId) -> Option<ReserveConfig> {
        self.configs
            .get(&asset)
            .filter(|c| c.cached_at.elapsed() <= self.ttl())
            .map(|c| c.config)
    }

    pub fn get_stale(&self, asset: AssetId) -> Option<ReserveConfig> {
        self.configs.get(&asset).map(|c| c.config)
    }

    pub async fn batch_refresh(&self, gateway: &RpcGateway, assets: &[AssetId]) -> Result<()> {
        let provider_addr = config().pools.reserve_data_provider_address;
        let multicall = gateway.multicall_address();

        for chunk in assets.chunks(CHUNK_LIMIT) {
            let calls: Vec<BatchCall> = chunk
                .iter()
                .map(|asset| BatchCall {
                    target: provider_addr,
                    allow_failure: true,
                    call_data: encode_get_reserve_configuration_data(*asset),
                })
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
                            .context("aggregate3 call failed (reserve config batch)")?;
                        Ok(ret.returnData)
                    }
                })
                .await?;

            for (asset, result) in chunk.iter().zip(results.iter()) {
                if !result.success {
                    continue;
                }
                if let Ok(cfg) = decode_get_reserve_configuration_data(&result.returnData) {
                    self.configs.insert(*asset, CachedReserveConfig { config: cfg, cached_at: Instant::now() });
                }
            }
        }

        Ok(())
    }
}

impl Default for ReserveConfigCache {
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

    #[test]
    fn fresh_read_after_store() {
        ensure_config();
        let cache = PriceCache::new();
        let asset = Address::repeat_byte(1);
        assert!(cache.get_fresh(asset).is_none());
        cache.store(asset, U256::from(100_000_000u64));
        assert_eq!(cache.get_fresh(asset), Some(U256::from(100_000_000u64)));
        assert_eq!(cache.get_stale(asset), Some(U256::from(100_000_000u64)));
    }
}
