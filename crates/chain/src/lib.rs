//! Chain interaction layer for the liquidation agent.
//!
//! This crate provides:
//! - Contract bindings for the lending pool, DEX venues, the price oracle,
//!   and the on-chain liquidation executor (§6.1, §4.3, §6.2, §6.4)
//! - The Multicall3-style aggregator contract for batched reads (§6.3)
//! - The dual read/tx RPC gateway with retry, failover, and block
//!   subscription (C1, §4.1)
//! - The liquidity probe's batched DEX quoting (C3, §4.3)
//! - Transaction signing and sending, and gas-strategy selection

pub mod contracts;
mod gas;
mod quote;
mod rpc;
mod signer;

pub use contracts::{
    build_swap_params, event_signatures, BatchCall, Call3, FlashSource, LiquidationCall,
    LiquidationParams, LiquidatorContract, OracleAggregator, PoolContract, Result3, SwapKind,
    SwapParams, SwapPath,
};
pub use gas::{create_gas_strategy, Eip1559GasStrategy, GasParams, GasStrategy, LegacyGasStrategy};
pub use quote::{LiquidityProbe, ProbeRequest, VenueQuote};
pub use rpc::{GatewayConfig, RpcGateway};
pub use signer::TransactionSender;
