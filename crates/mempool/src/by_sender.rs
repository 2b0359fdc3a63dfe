//! Sender → per-sender list map.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use embercore_types::{Address, H256};

use crate::config::SenderConstraints;
use crate::sender_list::TxListForSender;
use crate::shard_map::ShardMap;
use crate::tx::WrappedTransaction;

/// The per-sender lists of the cache, keyed by sender address.
///
/// Lists are created on first use and removed eagerly once empty. The sender
/// counter is atomic so the eviction trigger can read it without locking.
pub(crate) struct TxBySenderMap {
    backing: ShardMap<Arc<TxListForSender>>,
    counter: AtomicI64,
    sender_constraints: SenderConstraints,
}

impl TxBySenderMap {
    pub fn new(num_shards: u32, sender_constraints: SenderConstraints) -> Self {
        Self {
            backing: ShardMap::new(num_shards),
            counter: AtomicI64::new(0),
            sender_constraints,
        }
    }

    /// Locates or creates the sender's list and inserts the transaction in
    /// nonce order.
    ///
    /// Returns whether the list changed, and the hashes evicted while
    /// enforcing the per-sender constraints.
    pub fn add_tx(&self, tx: Arc<WrappedTransaction>) -> (bool, Vec<H256>) {
        let list = self.get_or_add_list(tx.sender());
        list.add_tx(tx)
    }

    fn get_or_add_list(&self, sender: Address) -> Arc<TxListForSender> {
        self.backing.get_or_insert_with(sender.as_bytes(), || {
            self.counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(TxListForSender::new(sender, self.sender_constraints))
        })
    }

    pub fn get_list(&self, sender: &Address) -> Option<Arc<TxListForSender>> {
        self.backing.get(sender.as_bytes())
    }

    /// Removes from the sender's list every transaction with nonce lower than
    /// or equal to the given transaction's, returning their hashes.
    pub fn remove_txs_with_nonce_lower_or_equal(&self, tx: &WrappedTransaction) -> Vec<H256> {
        let sender = tx.sender();
        let Some(list) = self.backing.get(sender.as_bytes()) else {
            return Vec::new();
        };
        let removed = list.remove_with_nonce_lower_or_equal(tx.nonce());
        self.remove_list_if_empty(&sender, &list);
        removed
    }

    /// Removes from the sender's list every transaction with nonce higher than
    /// or equal to the given nonce, returning their hashes.
    pub fn remove_txs_with_nonce_higher_or_equal(
        &self,
        sender: &Address,
        nonce: u64,
    ) -> Vec<H256> {
        let Some(list) = self.backing.get(sender.as_bytes()) else {
            return Vec::new();
        };
        let removed = list.remove_with_nonce_higher_or_equal(nonce);
        self.remove_list_if_empty(sender, &list);
        removed
    }

    fn remove_list_if_empty(&self, sender: &Address, list: &Arc<TxListForSender>) {
        if list.is_empty() && self.backing.remove(sender.as_bytes()).is_some() {
            self.counter.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Snapshot of all per-sender lists.
    pub fn senders(&self) -> Vec<Arc<TxListForSender>> {
        self.backing.values()
    }

    pub fn count_senders(&self) -> u64 {
        self.counter.load(Ordering::SeqCst).max(0) as u64
    }

    pub fn clear(&self) {
        self.backing.clear();
        self.counter.store(0, Ordering::SeqCst);
    }
}
