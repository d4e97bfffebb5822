//! External swap aggregator client (C4's `AggregatorOverAaveFlash` fallback,
//! §6.6).
//!
//! An HTTPS endpoint taking `{chainId, fromToken, toToken, fromAmount,
//! fromAddress, toAddress, slippage}` and returning a transaction request
//! plus an output estimate. The agent never submits that calldata directly —
//! it is repackaged as a `{token0, token1, calldata}` tuple path for the
//! on-chain liquidation contract with `swapKind = ExternalAggregator`
//! (`liquidator_chain::contracts::liquidation::SwapKind`).

use alloy::primitives::{Address, Bytes, U256};
use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Cached quote, keyed by the rounded request so near-identical ladder
/// fractions reuse one HTTP round trip within a sizing pass.
#[derive(Clone)]
struct CachedQuote {
    quote: AggregatorQuote,
    cached_at: Instant,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    from_token: Address,
    to_token: Address,
    amount_bucket: u64,
}

/// A quote from the external aggregator, repackaged for the on-chain
/// liquidation contract's `ExternalAggregator` swap kind.
#[derive(Debug, Clone)]
pub struct AggregatorQuote {
    pub to_amount: U256,
    pub to_amount_min: U256,
    pub price_impact_pct: f64,
    pub gas_cost_usd: f64,
    pub transaction_to: Address,
    pub transaction_data: Bytes,
}

/// External swap aggregator client (§6.6).
#[derive(Clone)]
pub struct AggregatorClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    chain_id: u64,
    cache: Arc<DashMap<CacheKey, CachedQuote>>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for AggregatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorClient")
            .field("base_url", &self.base_url)
            .field("chain_id", &self.chain_id)
            .field("cache_size", &self.cache.len())
            .finish()
    }
}

impl AggregatorClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, chain_id: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            chain_id,
            cache: Arc::new(DashMap::new()),
            cache_ttl: Duration::from_secs(5),
        }
    }

    fn bucket_amount(amount: U256) -> u64 {
        let amount_u128: u128 = amount.to::<u128>();
        if amount_u128 == 0 {
            return 0;
        }
        ((amount_u128 as f64).log10() * 100.0) as u64
    }

    /// Request a quote for `from_token -> to_token`, caching by rounded
    /// amount for the TTL so repeated ladder-fraction probing during one
    /// sizing pass doesn't hammer the HTTP endpoint.
    #[instrument(skip(self), fields(from = %from_token, to = %to_token))]
    pub async fn quote(
        &self,
        from_token: Address,
        to_token: Address,
        from_amount: U256,
        from_address: Address,
        to_address: Address,
        slippage_bps: u16,
    ) -> Result<AggregatorQuote> {
        let key = CacheKey {
            from_token,
            to_token,
            amount_bucket: Self::bucket_amount(from_amount),
        };
        if let Some(cached) = self.cache.get(&key) {
            if cached.cached_at.elapsed() < self.cache_ttl {
                debug!("aggregator quote cache hit");
                return Ok(cached.quote.clone());
            }
        }

        let mut request = self.client.get(format!("{}/quote", self.base_url)).query(&[
            ("chainId", self.chain_id.to_string()),
            ("fromToken", format!("{from_token:#x}")),
            ("toToken", format!("{to_token:#x}")),
            ("fromAmount", from_amount.to_string()),
            ("fromAddress", format!("{from_address:#x}")),
            ("toAddress", format!("{to_address:#x}")),
            ("slippage", (slippage_bps as f64 / 10_000.0).to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.context("aggregator request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("aggregator returned {status}: {body}");
        }

        let body: AggregatorResponse = response.json().await.context("malformed aggregator response")?;
        let quote = AggregatorQuote {
            to_amount: body.estimate.to_amount.parse().unwrap_or(U256::ZERO),
            to_amount_min: body.estimate.to_amount_min.parse().unwrap_or(U256::ZERO),
            price_impact_pct: body.estimate.price_impact,
            gas_cost_usd: body.estimate.gas_costs,
            transaction_to: body.transaction_request.to,
            transaction_data: body.transaction_request.data,
        };

        self.cache.insert(key, CachedQuote { quote: quote.clone(), cached_at: Instant::now() });
        Ok(quote)
    }
}

#[derive(Debug, Deserialize)]
struct AggregatorResponse {
    #[serde(rename = "transactionRequest")]
    transaction_request: TransactionRequestDto,
    estimate: EstimateDto,
}

#[derive(Debug, Deserialize)]
struct TransactionRequestDto {
    to: Address,
    data: Bytes,
}

#[derive(Debug, Deserialize)]
struct EstimateDto {
    #[serde(rename = "toAmount")]
    to_amount: String,
    #[serde(rename = "toAmountMin")]
    to_amount_min: String,
    #[serde(rename = "priceImpact")]
    price_impact: f64,
    #[serde(rename = "gasCosts")]
    gas_costs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_amount_is_zero_for_zero() {
        assert_eq!(AggregatorClient::bucket_amount(U256::ZERO), 0);
    }
}
