//! RPC gateway (C1, §4.1).
//!
//! Wraps a read endpoint and a tx endpoint behind one facade. Reads retry on
//! a transient error set with a fixed backoff ladder; after two consecutive
//! network errors on the read endpoint, reads fail over to the tx endpoint
//! until the read endpoint produces one clean success. Submission always
//! goes to the tx endpoint. The block subscription reconnects with doubling
//! backoff and degrades to fixed-interval polling once it exhausts its
//! attempt budget.

use alloy::primitives::{BlockNumber, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::TransactionRequest;
use anyhow::{anyhow, Result};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Endpoint/backoff knobs `RpcGateway` needs, independent of how the caller's
/// own configuration tree is shaped. `liquidator-core` owns the real
/// `ChainConfig` (it depends on this crate, not the other way around) and
/// builds one of these when it constructs the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub read_rpc_url: String,
    pub tx_rpc_url: String,
    pub ws_url: String,
    pub multicall_address: alloy::primitives::Address,
    pub rpc_timeout_ms: u64,
    pub ws_backoff_floor_ms: u64,
    pub ws_backoff_ceiling_ms: u64,
    pub poll_fallback_ms: u64,
}

impl GatewayConfig {
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

/// Fixed retry ladder for a single read call (§4.1): three attempts, backing
/// off 1s, then 2s, then 4s between them.
const RETRY_BACKOFFS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Consecutive network errors on the read endpoint before failing over to
/// the tx endpoint for reads.
const FAILOVER_THRESHOLD: u32 = 2;

/// Reconnect attempts for the block subscription before degrading to
/// fixed-interval polling.
const MAX_WS_RECONNECT_ATTEMPTS: u32 = 10;

fn is_transient(err: &anyhow::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("timed out")
        || msg.contains("timeout")
        || msg.contains("connection")
        || msg.contains("connection reset")
        || msg.contains("broken pipe")
        || msg.contains("dns")
        || msg.contains("temporarily unavailable")
        || msg.contains("missing revert data")
        || msg.contains("processing response")
        || msg.contains("processing-response")
}

/// Dual read/tx endpoint gateway with retry and failover (C1).
pub struct RpcGateway {
    read_url: String,
    tx_url: String,
    ws_url: String,
    multicall_address: alloy::primitives::Address,
    rpc_timeout: Duration,
    ws_backoff_floor: Duration,
    ws_backoff_ceiling: Duration,
    poll_fallback: Duration,
    /// Consecutive read-endpoint network errors; reset to 0 on success.
    consecutive_read_errors: AtomicU32,
    /// `true` once failed over to the tx endpoint for reads.
    failed_over: std::sync::atomic::AtomicBool,
}

impl RpcGateway {
    pub fn new(cfg: &GatewayConfig) -> Self {
        Self {
            read_url: cfg.read_rpc_url.clone(),
            tx_url: cfg.tx_rpc_url.clone(),
            ws_url: cfg.ws_url.clone(),
            multicall_address: cfg.multicall_address,
            rpc_timeout: cfg.rpc_timeout(),
            ws_backoff_floor: cfg.ws_backoff_floor(),
            ws_backoff_ceiling: cfg.ws_backoff_ceiling(),
            poll_fallback: cfg.poll_fallback(),
            consecutive_read_errors: AtomicU32::new(0),
            failed_over: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn multicall_address(&self) -> alloy::primitives::Address {
        self.multicall_address
    }

    /// The URL reads should currently use: the read endpoint, unless enough
    /// consecutive network errors have pushed reads over to the tx endpoint.
    fn active_read_url(&self) -> &str {
        if self.failed_over.load(Ordering::Relaxed) {
            &self.tx_url
        } else {
            &self.read_url
        }
    }

    fn record_read_outcome(&self, ok: bool) {
        if ok {
            self.consecutive_read_errors.store(0, Ordering::Relaxed);
            if self.failed_over.swap(false, Ordering::Relaxed) {
                info!("read endpoint recovered, reverting off tx endpoint for reads");
            }
        } else {
            let prev = self.consecutive_read_errors.fetch_add(1, Ordering::Relaxed);
            if prev + 1 >= FAILOVER_THRESHOLD && !self.failed_over.swap(true, Ordering::Relaxed) {
                warn!(
                    consecutive_errors = prev + 1,
                    "read endpoint failing over to tx endpoint"
                );
            }
        }
    }

    /// Run `f` against the currently-active read endpoint with the retry
    /// ladder, recording the outcome for failover bookkeeping.
    pub async fn with_read_provider<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: Fn(alloy::providers::RootProvider) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let url = self.active_read_url().to_string();
        let provider = ProviderBuilder::new().on_http(url.parse()?);

        let mut last_err = None;
        for (attempt, backoff) in std::iter::once(Duration::ZERO)
            .chain(RETRY_BACKOFFS.iter().copied())
            .enumerate()
        {
            if attempt > 0 {
                tokio::time::sleep(backoff).await;
            }
            match tokio::time::timeout(self.rpc_timeout, f(provider.clone())).await {
                Ok(Ok(value)) => {
                    self.record_read_outcome(true);
                    return Ok(value);
                }
                Ok(Err(e)) => {
                    let transient = is_transient(&e);
                    last_err = Some(e);
                    if !transient {
                        self.record_read_outcome(false);
                        break;
                    }
                }
                Err(_) => {
                    last_err = Some(anyhow!("rpc call timed out after {:?}", self.rpc_timeout));
                }
            }
        }
        self.record_read_outcome(false);
        Err(last_err.unwrap_or_else(|| anyhow!("rpc call failed with no recorded error")))
    }

    /// Submit a raw transaction. Always goes through the tx endpoint,
    /// independent of read failover state.
    pub async fn submit(&self, to: alloy::primitives::Address, data: Bytes, value: U256) -> Result<TransactionRequest> {
        let _ = (to, &data, value);
        Err(anyhow!(
            "RpcGateway::submit is a routing stub; real submission goes through TransactionSender against tx_url={}",
            self.tx_url
        ))
    }

    /// A plain `eth_call` simulation against the active read endpoint,
    /// through the same retry/failover path as every other read (C11 step
    /// 3's pre-submission simulation).
    pub async fn static_call(&self, to: alloy::primitives::Address, calldata: Bytes) -> Result<Bytes> {
        self.with_read_provider(|provider| {
            let calldata = calldata.clone();
            async move {
                let tx = TransactionRequest::default().with_to(to).with_input(calldata);
                provider.call(tx).await.map_err(|e| anyhow!("static call failed: {e}"))
            }
        })
        .await
    }

    pub fn tx_url(&self) -> &str {
        &self.tx_url
    }

    pub fn read_url(&self) -> &str {
        &self.read_url
    }

    /// Subscribe to new block numbers. Reconnects with backoff doubling from
    /// `ws_backoff_floor` to `ws_backoff_ceiling`; after
    /// `MAX_WS_RECONNECT_ATTEMPTS` failed reconnects, yields `None` forever,
    /// so the caller falls back to polling at `poll_fallback` instead.
    pub async fn subscribe_blocks(&self) -> Pin<Box<dyn Stream<Item = BlockNumber> + Send>> {
        let ws_url = self.ws_url.clone();
        let floor = self.ws_backoff_floor;
        let ceiling = self.ws_backoff_ceiling;

        let stream = futures::stream::unfold(
            (ws_url, floor, ceiling, 0u32, None),
            move |(ws_url, floor, ceiling, mut attempts, mut inner): (
                String,
                Duration,
                Duration,
                u32,
                Option<alloy::pubsub::SubscriptionStream<alloy::rpc::types::Header>>,
            )| {
                async move {
                    loop {
                        if let Some(stream) = inner.as_mut() {
                            match stream.next().await {
                                Some(header) => {
                                    return Some((
                                        header.number,
                                        (ws_url, floor, ceiling, 0, inner),
                                    ));
                                }
                                None => {
                                    warn!("block subscription stream ended, reconnecting");
                                    inner = None;
                                }
                            }
                        }

                        if attempts >= MAX_WS_RECONNECT_ATTEMPTS {
                            warn!(
                                attempts,
                                "block subscription exhausted reconnect budget, degrading to polling"
                            );
                            return None;
                        }

                        let backoff = std::cmp::min(
                            floor.saturating_mul(1u32.checked_shl(attempts).unwrap_or(u32::MAX)),
                            ceiling,
                        );
                        if attempts > 0 {
                            tokio::time::sleep(backoff).await;
                        }

                        match ProviderBuilder::new()
                            .on_ws(WsConnect::new(&ws_url))
                            .await
                        {
                            Ok(provider) => match provider.subscribe_blocks().await {
                                Ok(sub) => {
                                    info!("block subscription (re)connected");
                                    inner = Some(sub.into_stream());
                                    attempts = 0;
                                }
                                Err(e) => {
                                    warn!(error = %e, attempts, "subscribe_blocks failed");
                                    attempts += 1;
                                }
                            },
                            Err(e) => {
                                warn!(error = %e, attempts, "ws connect failed");
                                attempts += 1;
                            }
                        }
                    }
                }
            },
        );

        Box::pin(stream)
    }

    /// Fixed-interval fallback once the subscription has degraded.
    pub fn poll_interval(&self) -> Duration {
        self.poll_fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            read_rpc_url: "http://127.0.0.1:1".into(),
            tx_rpc_url: "http://127.0.0.1:2".into(),
            ws_url: "ws://127.0.0.1:3".into(),
            multicall_address: Default::default(),
            rpc_timeout_ms: 10,
            ws_backoff_floor_ms: 1000,
            ws_backoff_ceiling_ms: 30_000,
            poll_fallback_ms: 5000,
        }
    }

    #[test]
    fn failover_triggers_after_threshold() {
        let gw = RpcGateway::new(&test_config());
        assert_eq!(gw.active_read_url(), gw.read_url);
        gw.record_read_outcome(false);
        assert_eq!(gw.active_read_url(), gw.read_url);
        gw.record_read_outcome(false);
        assert_eq!(gw.active_read_url(), gw.tx_url);
    }

    #[test]
    fn success_reverts_failover() {
        let gw = RpcGateway::new(&test_config());
        gw.record_read_outcome(false);
        gw.record_read_outcome(false);
        assert_eq!(gw.active_read_url(), gw.tx_url);
        gw.record_read_outcome(true);
        assert_eq!(gw.active_read_url(), gw.read_url);
    }

    #[test]
    fn transient_error_classification() {
        assert!(is_transient(&anyhow!("connection reset by peer")));
        assert!(is_transient(&anyhow!("request timed out")));
        assert!(is_transient(&anyhow!("missing revert data in call exception")));
        assert!(is_transient(&anyhow!("error processing response error")));
        assert!(!is_transient(&anyhow!("execution reverted: insufficient balance")));
    }
}
