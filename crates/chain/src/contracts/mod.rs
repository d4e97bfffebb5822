//! Contract bindings for the lending protocol and its liquidation executor.
//!
//! - [`aave_v3`]: pool reads (`getUserAccountData`) and the direct
//!   `liquidationCall` path (§6.1).
//! - [`balances`]: per-reserve collateral/debt breakdown with attached
//!   prices, used to populate `Position.collaterals`/`Position.debts`.
//! - [`venues`]: DEX venue interfaces used by the liquidity probe (§4.3).
//! - [`liquidation`]: the deployed liquidation executor's three flash-source
//!   overloads (§6.2).
//! - [`common`]: ERC20, Chainlink-style oracle, and the Multicall3-style
//!   aggregator contract (§6.3).

pub mod aave_v3;
pub mod balances;
pub mod common;
pub mod liquidation;
pub mod oracle;
pub mod venues;

pub use common::{BatchCall, Call3, IMulticall3, Result3};
pub use liquidation::{
    build_swap_params, decode_path, encode_path, ILiquidationExecutor, LiquidationParams,
    SwapKind, SwapParams, SwapPath,
};

use alloy::primitives::{Address, Bytes, B256, U256};
use std::sync::Arc;
use std::time::Instant;

use crate::signer::TransactionSender;

pub mod event_signatures {
    pub use super::aave_v3::aave_v3_signatures::*;
    pub use super::common::common_signatures::ANSWER_UPDATED;

    use alloy::primitives::B256;

    pub fn pool_signatures() -> Vec<B256> {
        super::aave_v3::aave_v3_signatures::pool_signatures()
    }
}

/// Which flash source an execution plan uses, determining which of the
/// three executor overloads (§6.2) to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashSource {
    /// Flash loan from the lending pool itself.
    Pool,
    /// Flash swap against a V2 pair.
    V2Pair(Address),
    /// Flash against a V3 pool.
    V3Pool(Address),
}

/// A fully-built call into the liquidation executor contract, ready to
/// simulate or submit.
#[derive(Debug, Clone)]
pub struct LiquidationCall {
    pub flash_source: FlashSource,
    pub params: LiquidationParams,
    pub primary_swap: SwapParams,
    pub residual_swap: SwapParams,
    pub receiver: Address,
}

impl LiquidationCall {
    /// Encode per §6.2's three overloads, dispatching on `flash_source`.
    pub fn encode(&self) -> Bytes {
        match self.flash_source {
            FlashSource::Pool => liquidation::encode_execute_with_flash_pool(
                self.params.clone(),
                self.primary_swap.clone(),
                self.residual_swap.clone(),
                self.receiver,
            ),
            FlashSource::V2Pair(pair) => liquidation::encode_execute_with_v2_flash_swap(
                pair,
                self.params.clone(),
                self.primary_swap.clone(),
                self.residual_swap.clone(),
                self.receiver,
            ),
            FlashSource::V3Pool(pool) => liquidation::encode_execute_with_v3_flash(
                pool,
                self.params.clone(),
                self.primary_swap.clone(),
                self.residual_swap.clone(),
                self.receiver,
            ),
        }
    }
}

/// Liquidation executor contract wrapper with transaction sending.
pub struct LiquidatorContract {
    pub address: Address,
    calldata_cache: parking_lot::RwLock<Option<Bytes>>,
    sender: Option<Arc<TransactionSender>>,
}

impl LiquidatorContract {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            calldata_cache: parking_lot::RwLock::new(None),
            sender: None,
        }
    }

    pub fn with_sender(address: Address, sender: Arc<TransactionSender>) -> Self {
        Self {
            address,
            calldata_cache: parking_lot::RwLock::new(None),
            sender: Some(sender),
        }
    }

    pub fn set_sender(&mut self, sender: Arc<TransactionSender>) {
        self.sender = Some(sender);
    }

    pub fn cached_calldata(&self) -> Option<Bytes> {
        self.calldata_cache.read().clone()
    }

    /// Submit a liquidation call (§4.11 step 6). The caller has already run
    /// a static-call simulation; this performs the real submission via the
    /// tx endpoint.
    pub async fn submit(&self, call: &LiquidationCall) -> anyhow::Result<B256> {
        let encode_start = Instant::now();
        let calldata = call.encode();
        let encode_elapsed = encode_start.elapsed();

        *self.calldata_cache.write() = Some(calldata.clone());

        if let Some(sender) = &self.sender {
            tracing::info!(
                contract = %self.address,
                user = %call.params.user,
                flash_source = ?call.flash_source,
                encode_us = encode_elapsed.as_micros(),
                calldata_len = calldata.len(),
                "[EXECUTOR] Submitting liquidation"
            );

            sender
                .send_transaction(self.address, calldata, U256::ZERO)
                .await
        } else {
            anyhow::bail!(
                "transaction ready but signer not configured. calldata: {} bytes",
                calldata.len()
            )
        }
    }

    /// Execute a liquidation with pre-encoded calldata (I3 fast path).
    pub async fn execute_preencoded(&self, calldata: Bytes) -> anyhow::Result<B256> {
        *self.calldata_cache.write() = Some(calldata.clone());

        if let Some(sender) = &self.sender {
            tracing::info!(
                contract = %self.address,
                calldata_len = calldata.len(),
                "[EXECUTOR] Executing pre-encoded liquidation (fast path)"
            );

            sender
                .send_transaction(self.address, calldata, U256::ZERO)
                .await
        } else {
            anyhow::bail!(
                "transaction ready but signer not configured. calldata: {} bytes",
                calldata.len()
            )
        }
    }

    /// Submit with an explicit gas limit/price, bypassing the sender's cached
    /// gas price (§4.11's profit-tiered gas multiplier and retry escalation).
    pub async fn submit_priced(
        &self,
        call: &LiquidationCall,
        gas_limit: u64,
        gas_price: u128,
    ) -> anyhow::Result<B256> {
        let calldata = call.encode();
        *self.calldata_cache.write() = Some(calldata.clone());

        if let Some(sender) = &self.sender {
            tracing::info!(
                contract = %self.address,
                user = %call.params.user,
                flash_source = ?call.flash_source,
                gas_price_gwei = gas_price / 1_000_000_000,
                calldata_len = calldata.len(),
                "[EXECUTOR] Submitting liquidation (priced)"
            );

            sender
                .send_transaction_priced(self.address, calldata, U256::ZERO, gas_limit, gas_price)
                .await
        } else {
            anyhow::bail!(
                "transaction ready but signer not configured. calldata: {} bytes",
                calldata.len()
            )
        }
    }

    /// Execute pre-encoded calldata with an explicit gas limit/price (fast
    /// path variant of [`Self::submit_priced`]).
    pub async fn execute_preencoded_priced(
        &self,
        calldata: Bytes,
        gas_limit: u64,
        gas_price: u128,
    ) -> anyhow::Result<B256> {
        *self.calldata_cache.write() = Some(calldata.clone());

        if let Some(sender) = &self.sender {
            tracing::info!(
                contract = %self.address,
                calldata_len = calldata.len(),
                gas_price_gwei = gas_price / 1_000_000_000,
                "[EXECUTOR] Executing pre-encoded liquidation (fast path, priced)"
            );

            sender
                .send_transaction_priced(self.address, calldata, U256::ZERO, gas_limit, gas_price)
                .await
        } else {
            anyhow::bail!(
                "transaction ready but signer not configured. calldata: {} bytes",
                calldata.len()
            )
        }
    }
}

/// Pool contract wrapper for event filtering.
pub struct PoolContract {
    pub address: Address,
}

impl PoolContract {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn event_signatures() -> Vec<B256> {
        event_signatures::pool_signatures()
    }
}

/// Oracle aggregator utilities.
pub struct OracleAggregator;

impl OracleAggregator {
    pub fn answer_updated_signature() -> B256 {
        event_signatures::ANSWER_UPDATED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_signatures() {
        let sigs = PoolContract::event_signatures();
        assert_eq!(sigs.len(), 5);

        let answer_sig = OracleAggregator::answer_updated_signature();
        assert!(!answer_sig.is_zero());
    }

    #[test]
    fn liquidation_call_dispatches_on_flash_source() {
        let params = LiquidationParams {
            collateralAsset: Address::ZERO,
            debtAsset: Address::ZERO,
            user: Address::ZERO,
            amount: U256::from(1u64),
            transferAmount: U256::from(1u64),
            debtToCover: U256::from(1u64),
        };
        let swap = build_swap_params(
            SwapKind::V2,
            Address::ZERO,
            &SwapPath::Tokens(vec![Address::ZERO, Address::ZERO]),
            U256::from(1u64),
            U256::from(1u64),
            Bytes::new(),
        )
        .unwrap();

        let pool_call = LiquidationCall {
            flash_source: FlashSource::Pool,
            params: params.clone(),
            primary_swap: swap.clone(),
            residual_swap: swap.clone(),
            receiver: Address::ZERO,
        };
        let v2_call = LiquidationCall {
            flash_source: FlashSource::V2Pair(Address::repeat_byte(9)),
            params,
            primary_swap: swap.clone(),
            residual_swap: swap,
            receiver: Address::ZERO,
        };

        assert_ne!(pool_call.encode(), v2_call.encode());
    }
}
