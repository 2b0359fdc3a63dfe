//! Collaborator contracts of the transaction cache.
//!
//! This module defines:
//! - [`Transaction`] - the opaque transaction stored by the cache
//! - [`MempoolHost`] - blockchain information needed when a transaction enters
//! - [`SelectionSession`] - blockchain information needed during selection
//! - [`Cacher`] - the generic cache contract the façade implements for
//!   compatibility with callers that are unaware of transaction semantics

use std::sync::Arc;

use embercore_types::{Address, H256};

use crate::Result;

/// The transaction payload held by the cache.
///
/// The cache never inspects transaction internals beyond these getters; fees
/// and transferred values are computed by the [`MempoolHost`].
pub trait Transaction: Send + Sync {
    /// Sender nonce.
    fn nonce(&self) -> u64;

    /// Sender account address.
    fn sender(&self) -> Address;

    /// Gas limit of the transaction.
    fn gas_limit(&self) -> u64;

    /// Gas price offered by the transaction.
    fn gas_price(&self) -> u64;

    /// Payload data.
    fn data(&self) -> &[u8];

    /// Value debited from the sender on execution.
    fn value(&self) -> u128;

    /// Relayer paying the fee on behalf of the sender, if any.
    fn relayer(&self) -> Option<Address> {
        None
    }
}

/// Blockchain information needed when a transaction enters the cache.
pub trait MempoolHost: Send + Sync {
    /// Computes the fee charged to the fee payer. Deterministic given the
    /// transaction fields.
    fn compute_tx_fee(&self, tx: &dyn Transaction) -> u128;

    /// Returns the value debited from the sender. May be zero.
    fn transferred_value(&self, tx: &dyn Transaction) -> u128;
}

/// Account state as reported by a [`SelectionSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountState {
    /// Current account nonce
    pub nonce: u64,
    /// Current account balance
    pub balance: u128,
}

/// Blockchain information consulted during one selection pass.
pub trait SelectionSession: Send + Sync {
    /// Returns the current nonce and balance of an account.
    fn account_state(&self, address: &Address) -> Result<AccountState>;

    /// Reports whether the transaction is incorrectly guarded; such
    /// transactions make their sender ineligible for the rest of the pass.
    fn is_incorrectly_guarded(&self, tx: &dyn Transaction) -> bool;
}

/// Generic cache contract, implemented by the façade for compatibility.
///
/// Members without a meaningful rendition on a transaction cache are inert:
/// they return the default value and log. See the façade implementation.
pub trait Cacher: Send + Sync {
    /// Inserts a value under an arbitrary key. Not supported: transactions
    /// enter through the typed add operation.
    fn put(&self, key: &[u8], value: Arc<dyn Transaction>, size_in_bytes: usize) -> bool;

    /// Gets the unwrapped transaction stored under the given hash.
    fn get(&self, key: &[u8]) -> Option<Arc<dyn Transaction>>;

    /// Checks whether a transaction with the given hash exists.
    fn has(&self, key: &[u8]) -> bool;

    /// Gets the unwrapped transaction without affecting any bookkeeping.
    fn peek(&self, key: &[u8]) -> Option<Arc<dyn Transaction>>;

    /// Checks presence and inserts in one step. Not supported.
    fn has_or_add(&self, key: &[u8], value: Arc<dyn Transaction>, size_in_bytes: usize)
        -> (bool, bool);

    /// Removes the transaction with the given hash, if present.
    fn remove(&self, key: &[u8]);

    /// Returns all transaction hashes.
    fn keys(&self) -> Vec<H256>;

    /// Returns the number of stored transactions.
    fn len(&self) -> usize;

    /// Returns true when no transactions are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reports the size in bytes of the contained values. Not tracked at this
    /// granularity; always zero.
    fn size_in_bytes_contained(&self) -> u64;

    /// Returns the maximum number of transactions the cache intends to hold.
    fn max_size(&self) -> usize;

    /// Registers an on-added handler. Not supported.
    fn register_handler(
        &self,
        handler: Box<dyn Fn(&H256, Arc<dyn Transaction>) + Send + Sync>,
        id: &str,
    );

    /// Unregisters an on-added handler. Not supported.
    fn unregister_handler(&self, id: &str);

    /// Protects the given keys from eviction. This cache does not immunize
    /// entries; the call is a no-op.
    fn immunize_against_eviction(&self, keys: &[H256]);

    /// Removes all transactions.
    fn clear(&self);

    /// Releases resources. Nothing to release for an in-memory cache.
    fn close(&self);
}
