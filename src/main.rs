//! Liquidation agent entry point.
//!
//! Loads the runtime configuration, wires every component together, and
//! hands control to the coordinator's background loops until the process is
//! signalled to stop.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidator_api::{AggregatorClient, IndexerClient, Notifier};
use liquidator_chain::{GatewayConfig, LiquidatorContract, RpcGateway, TransactionSender};
use liquidator_core::{
    config, init_config, Blacklist, BlockTrigger, Config, Coordinator, Executor, HotTracker,
    PreparedCache, Preparer, PriceCache, ReserveConfigCache, Scanner, StrategyRegistry,
};

/// Environment variable names. Everything else lives in the TOML profile.
mod env {
    pub const CONFIG_PATH: &str = "LIQUIDATOR_CONFIG";
    pub const CHAIN_ID: &str = "CHAIN_ID";
    pub const PRIVATE_KEY: &str = "LIQUIDATOR_PRIVATE_KEY";
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,liquidator_core=debug,liquidator_chain=debug")),
        )
        .init();

    let cfg = load_config()?;
    info!(profile = %cfg.profile, "configuration loaded");
    init_config(cfg);

    let chain_id: u64 = std::env::var(env::CHAIN_ID).ok().and_then(|v| v.parse().ok()).unwrap_or(1);

    info!("wiring components");
    let coordinator = Arc::new(initialize_components(chain_id).await?);

    info!("starting coordinator");
    coordinator.run().await
}

/// Select a TOML profile via `LIQUIDATOR_CONFIG`, falling back to built-in
/// defaults (and a warning) when unset or unreadable — useful for local
/// smoke-testing against a fork without a committed profile file.
fn load_config() -> Result<Config> {
    match std::env::var(env::CONFIG_PATH) {
        Ok(path) => liquidator_core::config::load_from_file(&path),
        Err(_) => {
            warn!("{} not set, using built-in defaults", env::CONFIG_PATH);
            Ok(Config::default())
        }
    }
}

async fn initialize_components(chain_id: u64) -> Result<Coordinator> {
    let cfg = config();

    let gateway_cfg = GatewayConfig {
        read_rpc_url: cfg.chain.read_rpc_url.clone(),
        tx_rpc_url: cfg.chain.tx_rpc_url.clone(),
        ws_url: cfg.chain.ws_url.clone(),
        multicall_address: cfg.chain.multicall_address,
        rpc_timeout_ms: cfg.chain.rpc_timeout_ms,
        ws_backoff_floor_ms: cfg.chain.ws_backoff_floor_ms,
        ws_backoff_ceiling_ms: cfg.chain.ws_backoff_ceiling_ms,
        poll_fallback_ms: cfg.chain.poll_fallback_ms,
    };
    let gateway = Arc::new(RpcGateway::new(&gateway_cfg));
    info!(read = %cfg.chain.read_rpc_url, tx = %cfg.chain.tx_rpc_url, "RPC gateway ready");

    let private_key = cfg
        .secrets
        .liquidator_key
        .clone()
        .with_context(|| format!("missing {} in environment", env::PRIVATE_KEY))?;
    let sender = Arc::new(TransactionSender::new(&private_key, &cfg.chain.tx_rpc_url, chain_id).await?);
    info!(address = %sender.address, "transaction sender ready");

    let contracts: HashMap<_, _> = cfg
        .pools
        .liquidation_contract_per_pool
        .iter()
        .map(|(pool, liquidator)| (*pool, Arc::new(LiquidatorContract::with_sender(*liquidator, sender.clone()))))
        .collect();
    info!(pools = contracts.len(), "liquidator contracts registered");

    let aggregator = cfg.venues.aggregator_base_url.clone().map(|base_url| {
        Arc::new(AggregatorClient::new(base_url, cfg.secrets.aggregator_api_key.clone(), chain_id))
    });
    info!(enabled = aggregator.is_some(), "external swap aggregator");

    let registry = Arc::new(StrategyRegistry::new(aggregator.is_some()));
    let prices = Arc::new(PriceCache::new());
    let reserve_configs = Arc::new(ReserveConfigCache::new());
    let prepared = Arc::new(PreparedCache::new());
    let blacklist = Arc::new(Blacklist::new());
    let tracker = Arc::new(HotTracker::new());
    let notifier = Arc::new(Notifier::new(cfg.notifications.alert_webhook.clone(), cfg.notifications.info_webhook.clone()));

    let indexer = IndexerClient::new(cfg.indexer.url.clone(), cfg.indexer.page_size, cfg.indexer.timeout());
    let scanner = Arc::new(Scanner::new(indexer, reserve_configs.clone()));

    let preparer = Arc::new(Preparer::new(registry.clone(), prices.clone(), reserve_configs.clone(), prepared.clone(), aggregator.clone()));
    let trigger = Arc::new(BlockTrigger::new(tracker.clone(), prepared.clone(), preparer));

    let executor = Arc::new(Executor::new(
        registry,
        prices,
        reserve_configs,
        prepared.clone(),
        blacklist.clone(),
        aggregator,
        notifier.clone(),
        contracts,
        sender.clone(),
    ));

    Ok(Coordinator::new(gateway, scanner, tracker, trigger, executor, prepared, blacklist, notifier, sender))
}

fn print_banner() {
    println!(
        r#"
    ╦  ╦┌─┐ ╦ ╦┬┌┬┐┌─┐┌┬┐┌─┐┬─┐
    ║  ║│─┼┐║ ║││ │ ├─┤ │ │ │├┬┘
    ╩═╝╩└─┘└╚═╝┴ ┴ ┴ ┴ ┴ └─┘┴└─
    liquidation agent
    "#
    );
}
