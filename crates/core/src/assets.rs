//! Token metadata registry (§3 `AssetId`).
//!
//! Unlike the teacher's hardcoded per-chain asset table, this agent is meant
//! to run against whatever reserve list the operator configures, so decimals
//! are learned from the ERC20 contract itself the first time an asset is
//! seen and cached for the life of the process; "is stable" is a config
//! fact (an asset only gets stable-pool routing if the operator listed it in
//! `venues.stable_assets`), and the oracle to query is the single Aave-style
//! oracle address from `pools.oracle_address` — there is one oracle contract
//! for every asset, not one per asset as in the teacher's table.

use crate::config;
use crate::types::AssetId;
use alloy::providers::Provider;
use anyhow::{Context, Result};
use dashmap::DashMap;
use liquidator_chain::contracts::common::IERC20;
use std::sync::LazyLock;

/// Cached facts about one asset.
#[derive(Debug, Clone, Copy)]
pub struct AssetInfo {
    pub decimals: u8,
    pub is_stable: bool,
}

/// Process-wide decimals cache plus config-derived stable-asset lookup.
pub struct AssetRegistry {
    decimals: DashMap<AssetId, u8>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self { decimals: DashMap::new() }
    }

    pub fn is_stable(&self, asset: AssetId) -> bool {
        config().venues.stable_assets.contains(&asset)
    }

    /// The single oracle contract this protocol deployment reads prices
    /// from.
    pub fn oracle_address(&self) -> alloy::primitives::Address {
        config().pools.oracle_address
    }

    /// Look up cached decimals without touching the network.
    pub fn cached_decimals(&self, asset: AssetId) -> Option<u8> {
        self.decimals.get(&asset).map(|d| *d)
    }

    pub fn info(&self, asset: AssetId) -> Option<AssetInfo> {
        self.cached_decimals(asset).map(|decimals| AssetInfo { decimals, is_stable: self.is_stable(asset) })
    }

    /// Return cached decimals, or read and cache them via `decimals()`.
    pub async fn decimals<P: Provider + Clone>(&self, provider: P, asset: AssetId) -> Result<u8> {
        if let Some(d) = self.cached_decimals(asset) {
            return Ok(d);
        }
        let token = IERC20::new(asset, provider);
        let decimals = token
            .decimals()
            .call()
            .await
            .with_context(|| format!("reading decimals() for {asset}"))?;
        self.decimals.insert(asset, decimals);
        Ok(decimals)
    }

    pub fn seed_decimals(&self, asset: AssetId, decimals: u8) {
        self.decimals.insert(asset, decimals);
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global asset metadata cache.
pub static REGISTRY: LazyLock<AssetRegistry> = LazyLock::new(AssetRegistry::new);

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn seeded_decimals_are_cached() {
        let registry = AssetRegistry::new();
        let usdc = address!("0000000000000000000000000000000000000001");
        assert!(registry.cached_decimals(usdc).is_none());
        registry.seed_decimals(usdc, 6);
        assert_eq!(registry.cached_decimals(usdc), Some(6));
    }
}
