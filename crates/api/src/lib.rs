//! External-collaborator clients for the liquidation agent (§6.5, §6.6,
//! §6.7): the subgraph indexer the scanner pages through, the external swap
//! aggregator the lowest-priority strategy falls back to, and the
//! dual-destination notification channel.

mod aggregator;
mod indexer;
mod notify;

pub use aggregator::{AggregatorClient, AggregatorQuote};
pub use indexer::IndexerClient;
pub use notify::{Destination, Notifier};
