//! # Embercore Mempool
//!
//! Bounded, sender-partitioned transaction cache for the Embercore mempool.
//!
//! This crate provides an in-memory store of pending transactions that:
//! - Partitions transactions by sender, keeping each sender's list in nonce order
//! - Enforces per-sender and global size limits (bytes and counts)
//! - Evicts the transactions least likely to be selected when over capacity
//! - Selects the highest-value executable transactions for block construction,
//!   respecting per-sender nonce continuity, account balances, and guardian state
//!
//! ## Architecture
//!
//! The cache keeps two cooperating concurrent maps:
//! - **By hash**: a flat hash → transaction map with global byte/count counters
//! - **By sender**: a sender → nonce-ordered list map with per-sender limits
//!
//! Both maps are sharded; a coarse mutation lock brackets the two-map updates of
//! add and remove, while reads stay lock-free at the façade level. Brief windows
//! of disagreement between the maps are tolerated and converge (see the
//! concurrency tests).
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use embercore_mempool::{CacheConfig, TxCache, WrappedTransaction};
//!
//! let cache = TxCache::new(CacheConfig::default(), host)?;
//!
//! // Add a transaction
//! let (_, added) = cache.add_tx(WrappedTransaction::new(tx, tx_hash, size));
//!
//! // Select transactions for the next block
//! let (txs, gas) = cache.select_transactions(&session, 10_000_000, 30_000,
//!     std::time::Duration::from_millis(50));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod cache;
pub mod config;
pub mod mock;
pub mod traits;
pub mod tx;

mod by_hash;
mod by_sender;
mod eviction;
mod selection;
mod sender_list;
mod session;
mod shard_map;

// Re-export main types at crate root
pub use cache::TxCache;
pub use config::{CacheConfig, SenderConstraints};
pub use mock::{MockMempoolHost, MockSelectionSession, MockTransaction};
pub use traits::{AccountState, Cacher, MempoolHost, SelectionSession, Transaction};
pub use tx::WrappedTransaction;

/// Result type alias for mempool operations
pub type Result<T> = std::result::Result<T, MempoolError>;

/// Errors that can occur in mempool operations
#[derive(Debug, thiserror::Error)]
pub enum MempoolError {
    /// A cache configuration option is missing, zero, or out of bounds
    #[error("invalid cache config: {0}")]
    InvalidConfig(&'static str),

    /// The selection session could not provide the state of an account
    #[error("account state unavailable: {0}")]
    AccountStateUnavailable(String),
}
