//! Runtime configuration for the liquidation agent (spec §6.7).
//!
//! The configuration tree mirrors the operator surface exactly: chain
//! endpoints, the indexer, per-pool contract addresses, the whitelisted DEX
//! venues, the sizing/fee constants, and the timing/TTL knobs. Every field
//! has a sensible default via `#[serde(default = "fn")]` so a profile TOML
//! file only needs to override what differs from production defaults.
//! Secrets (`liquidatorKey`, `aggregatorApiKey`) are never read from TOML —
//! they come from the environment via `dotenvy`, loaded in [`loader`].

mod loader;

pub use loader::{config, init_config, load_from_file};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Top-level configuration object, one per running agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Profile name, surfaced in logs and the status report only.
    #[serde(default = "default_profile")]
    pub profile: String,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub indexer: IndexerConfig,

    #[serde(default)]
    pub pools: PoolsConfig,

    #[serde(default)]
    pub venues: VenuesConfig,

    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub gas: GasTiersConfig,

    #[serde(default)]
    pub slippage: SlippageTiersConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Secrets, populated from the environment after the TOML profile loads.
    /// Never (de)serialized to/from the profile file itself.
    #[serde(skip)]
    pub secrets: Secrets,
}

fn default_profile() -> String {
    "production".to_string()
}

/// RPC endpoints (C1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Public/default read endpoint.
    #[serde(default = "default_read_rpc")]
    pub read_rpc_url: String,
    /// Private/paid endpoint; also the only endpoint used for submission.
    #[serde(default = "default_tx_rpc")]
    pub tx_rpc_url: String,
    /// WebSocket endpoint for the new-block subscription.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Aggregator-call (`aggregate3`) contract address.
    #[serde(default)]
    pub multicall_address: Address,
    /// Per-RPC-call deadline.
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// Block-subscription reconnect backoff, doubling from this floor...
    #[serde(default = "default_ws_backoff_floor_ms")]
    pub ws_backoff_floor_ms: u64,
    /// ...capped at this ceiling, for up to 10 attempts before degrading to
    /// polling.
    #[serde(default = "default_ws_backoff_ceiling_ms")]
    pub ws_backoff_ceiling_ms: u64,
    /// Polling interval used once the block subscription has degraded.
    #[serde(default = "default_poll_fallback_ms")]
    pub poll_fallback_ms: u64,
    /// Destination for swept collateral/residual proceeds after a
    /// liquidation (the `receiver` argument on every executor overload).
    #[serde(default)]
    pub profit_receiver: Address,
}

fn default_read_rpc() -> String {
    "http://127.0.0.1:8545".to_string()
}
fn default_tx_rpc() -> String {
    "http://127.0.0.1:8545".to_string()
}
fn default_ws_url() -> String {
    "ws://127.0.0.1:8546".to_string()
}
fn default_rpc_timeout_ms() -> u64 {
    15_000
}
fn default_ws_backoff_floor_ms() -> u64 {
    1_000
}
fn default_ws_backoff_ceiling_ms() -> u64 {
    30_000
}
fn default_poll_fallback_ms() -> u64 {
    12_000
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            read_rpc_url: default_read_rpc(),
            tx_rpc_url: default_tx_rpc(),
            ws_url: default_ws_url(),
            multicall_address: Address::ZERO,
            rpc_timeout_ms: default_rpc_timeout_ms(),
            ws_backoff_floor_ms: default_ws_backoff_floor_ms(),
            ws_backoff_ceiling_ms: default_ws_backoff_ceiling_ms(),
            poll_fallback_ms: default_poll_fallback_ms(),
            profit_receiver: Address::ZERO,
        }
    }
}

impl ChainConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
    pub fn ws_backoff_floor(&self) -> Duration {
        Duration::from_millis(self.ws_backoff_floor_ms)
    }
    pub fn ws_backoff_ceiling(&self) -> Duration {
        Duration::from_millis(self.ws_backoff_ceiling_ms)
    }
    pub fn poll_fallback(&self) -> Duration {
        Duration::from_millis(self.poll_fallback_ms)
    }
}

/// Subgraph/indexer client (§6.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    #[serde(default = "default_indexer_url")]
    pub url: String,
    /// Page size for the `(first, skip)` GraphQL pagination.
    #[serde(default = "default_indexer_page_size")]
    pub page_size: u32,
    #[serde(default = "default_indexer_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_indexer_url() -> String {
    "https://api.thegraph.com/subgraphs/name/placeholder/liquidations".to_string()
}
fn default_indexer_page_size() -> u32 {
    100
}
fn default_indexer_timeout_ms() -> u64 {
    30_000
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            url: default_indexer_url(),
            page_size: default_indexer_page_size(),
            timeout_ms: default_indexer_timeout_ms(),
        }
    }
}

impl IndexerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Money-market pool addressing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolsConfig {
    /// Every pool the scanner covers.
    #[serde(default)]
    pub pools_list: Vec<Address>,
    /// On-chain liquidation contract deployed per pool (they are not shared
    /// across pools since each wraps a specific flash-loan provider).
    #[serde(default)]
    pub liquidation_contract_per_pool: HashMap<Address, Address>,
    #[serde(default)]
    pub oracle_address: Address,
    #[serde(default)]
    pub reserve_data_provider_address: Address,
    /// Per-reserve collateral/debt breakdown helper (§4.9, §4.7); optional —
    /// when unset, position building falls back to the pool's aggregated
    /// totals alone with no per-asset breakdown.
    #[serde(default)]
    pub balances_reader_address: Address,
}

/// DEX venues the strategy registry and liquidity probe are allowed to use.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenuesConfig {
    #[serde(default)]
    pub stable_assets: HashSet<Address>,
    #[serde(default)]
    pub stable_pools: HashMap<String, StablePoolConfig>,
    #[serde(default)]
    pub v2_pairs: Vec<V2PairConfig>,
    #[serde(default)]
    pub v3_pools: Vec<V3PoolConfig>,
    /// Present only if an external-aggregator key was supplied; enables
    /// `AggregatorOverAaveFlash` as a fallback strategy.
    #[serde(default)]
    pub aggregator_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StablePoolConfig {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub idx0: u8,
    pub idx1: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V2PairConfig {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    /// The router contract `getAmountsOut` is called against (not the pair
    /// itself); typically shared across every pair of one DEX fork.
    #[serde(default)]
    pub router: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V3PoolConfig {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    /// Fee tier in millionths (e.g. 3000 = 0.3%).
    pub fee_micro: u32,
}

/// Sizing and fee constants (I1, I2, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_min_debt_usd")]
    pub min_debt_usd: f64,
    #[serde(default = "default_close_factor_pct")]
    pub close_factor_pct: u16,
    #[serde(default = "default_interest_buffer_bps")]
    pub interest_buffer_bps: u16,
    #[serde(default = "default_conservative_factor_pct")]
    pub conservative_factor_pct: u16,
    #[serde(default = "default_ladder_pct")]
    pub liquidation_ladder_pct: Vec<u16>,
}

fn default_min_debt_usd() -> f64 {
    1.0
}
fn default_close_factor_pct() -> u16 {
    50
}
fn default_interest_buffer_bps() -> u16 {
    10
}
fn default_conservative_factor_pct() -> u16 {
    99
}
fn default_ladder_pct() -> Vec<u16> {
    vec![10, 25, 50]
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            min_debt_usd: default_min_debt_usd(),
            close_factor_pct: default_close_factor_pct(),
            interest_buffer_bps: default_interest_buffer_bps(),
            conservative_factor_pct: default_conservative_factor_pct(),
            liquidation_ladder_pct: default_ladder_pct(),
        }
    }
}

/// Cadences and TTLs (I3-I5, §4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_loop_interval_s")]
    pub loop_interval_seconds: u64,
    #[serde(default = "default_report_interval_h")]
    pub report_interval_hours: u64,
    #[serde(default = "default_price_cache_ttl_ms")]
    pub price_cache_ttl_ms: u64,
    #[serde(default = "default_reserve_cfg_ttl_ms")]
    pub reserve_cfg_ttl_ms: u64,
    #[serde(default = "default_prepared_ttl_ms")]
    pub prepared_ttl_ms: u64,
    #[serde(default = "default_blacklist_ttl_ms")]
    pub blacklist_ttl_ms: u64,
    #[serde(default = "default_hot_ttl_ms")]
    pub hot_position_ttl_ms: u64,
    #[serde(default = "default_warm_hf_upper_bps")]
    pub warm_hf_upper_bps: u32,
    #[serde(default = "default_prepare_hf_bps")]
    pub prepare_below_hf_bps: u32,
    #[serde(default = "default_executor_pause_ms")]
    pub executor_pause_ms: u64,
}

fn default_loop_interval_s() -> u64 {
    60
}
fn default_report_interval_h() -> u64 {
    1
}
fn default_price_cache_ttl_ms() -> u64 {
    7_000
}
fn default_reserve_cfg_ttl_ms() -> u64 {
    60_000
}
fn default_prepared_ttl_ms() -> u64 {
    30_000
}
fn default_blacklist_ttl_ms() -> u64 {
    300_000
}
fn default_hot_ttl_ms() -> u64 {
    300_000
}
fn default_warm_hf_upper_bps() -> u32 {
    11_000
}
fn default_prepare_hf_bps() -> u32 {
    10_500
}
fn default_executor_pause_ms() -> u64 {
    5_000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            loop_interval_seconds: default_loop_interval_s(),
            report_interval_hours: default_report_interval_h(),
            price_cache_ttl_ms: default_price_cache_ttl_ms(),
            reserve_cfg_ttl_ms: default_reserve_cfg_ttl_ms(),
            prepared_ttl_ms: default_prepared_ttl_ms(),
            blacklist_ttl_ms: default_blacklist_ttl_ms(),
            hot_position_ttl_ms: default_hot_ttl_ms(),
            warm_hf_upper_bps: default_warm_hf_upper_bps(),
            prepare_below_hf_bps: default_prepare_hf_bps(),
            executor_pause_ms: default_executor_pause_ms(),
        }
    }
}

impl TimingConfig {
    pub fn loop_interval(&self) -> Duration {
        Duration::from_secs(self.loop_interval_seconds)
    }
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_hours * 3600)
    }
    pub fn price_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.price_cache_ttl_ms)
    }
    pub fn reserve_cfg_ttl(&self) -> Duration {
        Duration::from_millis(self.reserve_cfg_ttl_ms)
    }
    pub fn prepared_ttl(&self) -> Duration {
        Duration::from_millis(self.prepared_ttl_ms)
    }
    pub fn blacklist_ttl(&self) -> Duration {
        Duration::from_millis(self.blacklist_ttl_ms)
    }
    pub fn hot_position_ttl(&self) -> Duration {
        Duration::from_millis(self.hot_position_ttl_ms)
    }
    pub fn executor_pause(&self) -> Duration {
        Duration::from_millis(self.executor_pause_ms)
    }
}

/// One rung of the gas-multiplier ladder: applies while `profit_usd < max_usd`
/// (the last entry should have `max_usd = f64::INFINITY`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GasTier {
    pub max_usd: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasTiersConfig {
    #[serde(default = "default_gas_tiers")]
    pub tiers: Vec<GasTier>,
}

fn default_gas_tiers() -> Vec<GasTier> {
    vec![
        GasTier { max_usd: 5.0, multiplier: 1.5 },
        GasTier { max_usd: 50.0, multiplier: 2.5 },
        GasTier { max_usd: 200.0, multiplier: 4.0 },
        GasTier { max_usd: 1_000.0, multiplier: 5.0 },
        GasTier { max_usd: 5_000.0, multiplier: 6.0 },
        GasTier { max_usd: f64::INFINITY, multiplier: 8.0 },
    ]
}

impl Default for GasTiersConfig {
    fn default() -> Self {
        Self { tiers: default_gas_tiers() }
    }
}

impl GasTiersConfig {
    /// §4.11 step 4: `gasTier(profitUSD)`.
    pub fn multiplier_for(&self, profit_usd: f64) -> f64 {
        self.tiers
            .iter()
            .find(|t| profit_usd < t.max_usd)
            .map(|t| t.multiplier)
            .unwrap_or_else(|| self.tiers.last().map(|t| t.multiplier).unwrap_or(1.0))
    }
}

/// One rung of the slippage-tolerance ladder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlippageTier {
    pub max_usd: f64,
    pub bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlippageTiersConfig {
    #[serde(default = "default_slippage_tiers")]
    pub tiers: Vec<SlippageTier>,
    /// Escalation multipliers applied on successive `swap-failed` retries
    /// within one execution attempt (§4.11 step 5).
    #[serde(default = "default_slippage_escalation")]
    pub escalation: Vec<f64>,
}

fn default_slippage_tiers() -> Vec<SlippageTier> {
    vec![
        SlippageTier { max_usd: 100.0, bps: 200 },
        SlippageTier { max_usd: 1_000.0, bps: 300 },
        SlippageTier { max_usd: 10_000.0, bps: 500 },
        SlippageTier { max_usd: 50_000.0, bps: 700 },
        SlippageTier { max_usd: f64::INFINITY, bps: 1_000 },
    ]
}

fn default_slippage_escalation() -> Vec<f64> {
    vec![1.0, 1.5, 2.5]
}

impl Default for SlippageTiersConfig {
    fn default() -> Self {
        Self { tiers: default_slippage_tiers(), escalation: default_slippage_escalation() }
    }
}

impl SlippageTiersConfig {
    pub fn base_bps_for(&self, size_usd: f64) -> u16 {
        self.tiers
            .iter()
            .find(|t| size_usd < t.max_usd)
            .map(|t| t.bps)
            .unwrap_or_else(|| self.tiers.last().map(|t| t.bps).unwrap_or(1_000))
    }

    /// Tolerance in bps at escalation step `attempt` (0-indexed, clamped to
    /// the last defined step).
    pub fn tolerance_bps(&self, size_usd: f64, attempt: usize) -> u16 {
        let base = self.base_bps_for(size_usd) as f64;
        let factor = self
            .escalation
            .get(attempt)
            .or_else(|| self.escalation.last())
            .copied()
            .unwrap_or(1.0);
        (base * factor).round() as u16
    }
}

/// Two notification destinations; delivery failures are logged, never fatal
/// (§6.7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub alert_webhook: Option<String>,
    pub info_webhook: Option<String>,
}

/// Values that only ever come from the environment, never from a committed
/// profile file.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub liquidator_key: Option<String>,
    pub aggregator_api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_tier_boundaries() {
        let cfg = GasTiersConfig::default();
        assert_eq!(cfg.multiplier_for(2.0), 1.5);
        assert_eq!(cfg.multiplier_for(49.0), 2.5);
        assert_eq!(cfg.multiplier_for(1_000_000.0), 8.0);
    }

    #[test]
    fn slippage_tier_escalation() {
        let cfg = SlippageTiersConfig::default();
        assert_eq!(cfg.tolerance_bps(50.0, 0), 200);
        assert_eq!(cfg.tolerance_bps(50.0, 1), 300);
        assert_eq!(cfg.tolerance_bps(50.0, 2), 500);
        // beyond the defined escalation steps, stays at the last factor
        assert_eq!(cfg.tolerance_bps(50.0, 5), 500);
    }
}
