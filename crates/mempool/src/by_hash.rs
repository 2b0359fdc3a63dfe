//! Flat hash → transaction map with global counters.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use embercore_types::H256;

use crate::shard_map::ShardMap;
use crate::tx::WrappedTransaction;

/// All transactions of the cache, keyed by hash.
///
/// The byte and count counters are atomic: readers never take a lock, and
/// brief disagreements with the by-sender map during concurrent mutations are
/// tolerated by design.
pub(crate) struct TxByHashMap {
    backing: ShardMap<Arc<WrappedTransaction>>,
    counter: AtomicI64,
    num_bytes: AtomicI64,
}

impl TxByHashMap {
    pub fn new(num_shards: u32) -> Self {
        Self {
            backing: ShardMap::new(num_shards),
            counter: AtomicI64::new(0),
            num_bytes: AtomicI64::new(0),
        }
    }

    /// Inserts the transaction if its hash is absent. Returns whether the map
    /// changed.
    pub fn add_tx(&self, tx: Arc<WrappedTransaction>) -> bool {
        let size = tx.size();
        let added = self
            .backing
            .insert_if_absent(tx.tx_hash().as_bytes(), tx);
        if added {
            self.counter.fetch_add(1, Ordering::SeqCst);
            self.num_bytes.fetch_add(size as i64, Ordering::SeqCst);
        }
        added
    }

    /// Removes and returns the transaction with the given hash.
    pub fn remove_tx(&self, tx_hash: &H256) -> Option<Arc<WrappedTransaction>> {
        let removed = self.backing.remove(tx_hash.as_bytes());
        if let Some(tx) = &removed {
            self.counter.fetch_sub(1, Ordering::SeqCst);
            self.num_bytes.fetch_sub(tx.size() as i64, Ordering::SeqCst);
        }
        removed
    }

    /// Removes a batch of hashes, returning how many were actually present.
    pub fn remove_txs_bulk(&self, tx_hashes: &[H256]) -> usize {
        let mut num_removed = 0;
        for tx_hash in tx_hashes {
            if self.remove_tx(tx_hash).is_some() {
                num_removed += 1;
            }
        }
        num_removed
    }

    pub fn get(&self, tx_hash: &H256) -> Option<Arc<WrappedTransaction>> {
        self.backing.get(tx_hash.as_bytes())
    }

    pub fn has(&self, tx_hash: &H256) -> bool {
        self.backing.contains(tx_hash.as_bytes())
    }

    pub fn keys(&self) -> Vec<H256> {
        self.backing
            .keys()
            .iter()
            .filter_map(|key| H256::from_slice(key).ok())
            .collect()
    }

    /// Visits every transaction, one shard at a time.
    pub fn for_each(&self, mut visit: impl FnMut(&H256, &Arc<WrappedTransaction>)) {
        self.backing.for_each(|_, tx| visit(&tx.tx_hash(), tx));
    }

    pub fn count_tx(&self) -> u64 {
        self.counter.load(Ordering::SeqCst).max(0) as u64
    }

    pub fn num_bytes(&self) -> u64 {
        self.num_bytes.load(Ordering::SeqCst).max(0) as u64
    }

    pub fn clear(&self) {
        self.backing.clear();
        self.counter.store(0, Ordering::SeqCst);
        self.num_bytes.store(0, Ordering::SeqCst);
    }
}
