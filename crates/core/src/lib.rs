//! Core liquidation logic: the data model, the process-wide caches, and the
//! strategy/sizing/execution decisions built on top of them. The chain-facing
//! reads and writes themselves live in `liquidator-chain`; this crate is
//! transport-agnostic.
//!
//! - [`types`]: borrower positions, pool references, strategies, quotes
//! - [`config`]: runtime configuration (§6.7)
//! - [`assets`]: token decimals/stable-flag/oracle lookup (§3)
//! - [`cache`]: oracle price and per-reserve liquidation-parameter caches (C2)
//! - [`tracker`]: hot-position tracker (C6)
//! - [`prepared`]: prepared-liquidation cache (C7)
//! - [`blacklist`]: failure blacklist (C8)
//! - [`strategy`]: the closed liquidation-strategy registry (C4)
//! - [`sizer`]: adaptive ladder sizing (C5)
//! - [`scanner`]: pool-wide position scan (C9)
//! - [`trigger`]: per-block hot-position re-check (C10)
//! - [`preparer`]: background prepared-liquidation builder (C7)
//! - [`executor`]: simulate-then-submit execution pipeline (C11)
//! - [`coordinator`]: top-level control loop wiring everything together (C12)
//! - [`u256_math`]: fixed-point arithmetic shared by every module above

mod assets;
mod venues;
pub mod blacklist;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod executor;
pub mod prepared;
pub mod preparer;
pub mod scanner;
pub mod sizer;
pub mod strategy;
pub mod tracker;
pub mod trigger;
pub mod types;
pub mod u256_math;

pub use assets::{AssetInfo, AssetRegistry, REGISTRY};
pub use blacklist::Blacklist;
pub use cache::{PriceCache, ReserveConfigCache};
pub use config::{config, init_config, Config};
pub use coordinator::Coordinator;
pub use executor::{ExecutionOutcome, Executor};
pub use prepared::{PreparedCache, PreparingGuard};
pub use preparer::Preparer;
pub use scanner::{ScanReport, Scanner};
pub use sizer::{AdaptiveSizer, SizeOutcome, SizingResult, VenueCandidates};
pub use strategy::{BuiltStrategy, Strategy, StrategyInput, StrategyRegistry};
pub use tracker::HotTracker;
pub use trigger::BlockTrigger;
pub use types::{
    AssetId, BlacklistEntry, BlacklistReason, BorrowerId, CollateralHolding, DebtHolding, PoolRef,
    PoolVenue, Position, PreparedLiquidation, Quote, StrategyId,
};
