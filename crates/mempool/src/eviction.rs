//! Capacity-driven eviction of the transactions least likely to be selected.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;

use embercore_types::Address;
use tracing::debug;

use crate::cache::TxCache;
use crate::tx::{rank_for_selection, WrappedTransaction};

/// A short journal of one eviction run, useful for diagnostics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EvictionJournal {
    /// Total transactions evicted by the run
    pub num_evicted: usize,
    /// Transactions evicted by each pass, in pass order
    pub num_evicted_by_pass: Vec<usize>,
}

/// One sender's position in the eviction scan.
///
/// The bunch is the sender's transactions in reverse nonce order: the highest
/// nonce is the least likely to execute and goes first.
struct EvictionCursor {
    bunch: Vec<Arc<WrappedTransaction>>,
    index: usize,
}

impl EvictionCursor {
    fn new(bunch: Vec<Arc<WrappedTransaction>>) -> Option<Self> {
        if bunch.is_empty() {
            None
        } else {
            Some(Self { bunch, index: 0 })
        }
    }

    fn current(&self) -> &Arc<WrappedTransaction> {
        &self.bunch[self.index]
    }

    fn advance(&mut self) -> bool {
        self.index += 1;
        self.index < self.bunch.len()
    }
}

impl PartialEq for EvictionCursor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EvictionCursor {}

impl PartialOrd for EvictionCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EvictionCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap, inverted rank: the worst current transaction surfaces first.
        rank_for_selection(self.current(), other.current()).reverse()
    }
}

impl TxCache {
    /// Runs eviction if capacity is exceeded and no other eviction is running.
    ///
    /// Concurrent adds skip the run entirely (cheap atomic check); the mutex
    /// guarantees mutual exclusion for the eviction body itself.
    pub(crate) fn do_eviction(&self) -> Option<EvictionJournal> {
        if self.is_eviction_in_progress.load(AtomicOrdering::SeqCst) {
            return None;
        }
        if !self.is_capacity_exceeded() {
            return None;
        }

        let _guard = self.eviction_mutex.lock();
        self.is_eviction_in_progress
            .store(true, AtomicOrdering::SeqCst);

        // Re-check: another add may have evicted while we waited on the lock.
        let journal = if self.is_capacity_exceeded() {
            debug!(
                name = %self.name(),
                num_bytes = self.num_bytes(),
                num_txs = self.count_tx(),
                num_senders = self.count_senders(),
                "eviction: begin"
            );

            let journal = self.evict_least_likely_to_select();

            debug!(
                name = %self.name(),
                num_bytes = self.num_bytes(),
                num_txs = self.count_tx(),
                num_senders = self.count_senders(),
                num_evicted = journal.num_evicted,
                "eviction: end"
            );
            Some(journal)
        } else {
            None
        };

        self.is_eviction_in_progress
            .store(false, AtomicOrdering::SeqCst);
        journal
    }

    pub(crate) fn is_capacity_exceeded(&self) -> bool {
        self.num_bytes() > self.config().max_num_bytes
            || self.count_senders() > self.config().max_num_txs
            || self.count_tx() > self.config().max_num_txs
    }

    /// Tolerates concurrent additions and removals; the maps converge.
    fn evict_least_likely_to_select(&self) -> EvictionJournal {
        let senders = self.tx_by_sender.senders();

        // The heap is reused across passes; each sender contributes at most
        // one live cursor.
        let mut heap = BinaryHeap::with_capacity(senders.len());
        for sender_list in &senders {
            // Transactions after gaps are included as well, unlike in selection.
            if let Some(cursor) = EvictionCursor::new(sender_list.txs_reversed()) {
                heap.push(cursor);
            }
        }

        let batch = self.config().num_items_to_preemptively_evict as usize;
        let mut journal = EvictionJournal::default();

        for pass in 0.. {
            if !self.is_capacity_exceeded() {
                break;
            }

            let mut popped: Vec<Arc<WrappedTransaction>> = Vec::with_capacity(batch);
            while popped.len() < batch {
                let Some(mut cursor) = heap.pop() else {
                    break;
                };
                popped.push(Arc::clone(cursor.current()));
                // The next transaction of the same sender competes with the
                // others in being "the worst".
                if cursor.advance() {
                    heap.push(cursor);
                }
            }

            if popped.is_empty() {
                break;
            }

            // Per sender, the lowest nonce seen in this pass; everything at or
            // above it is removed in one operation, so no later nonce of the
            // sender is left stranded.
            let mut lowest_nonce_by_sender: HashMap<Address, u64> = HashMap::new();
            for tx in &popped {
                lowest_nonce_by_sender
                    .entry(tx.sender())
                    .and_modify(|lowest| *lowest = (*lowest).min(tx.nonce()))
                    .or_insert_with(|| tx.nonce());
            }

            let mut evicted_hashes = Vec::with_capacity(popped.len());
            for (sender, nonce) in &lowest_nonce_by_sender {
                evicted_hashes.extend(
                    self.tx_by_sender
                        .remove_txs_with_nonce_higher_or_equal(sender, *nonce),
                );
            }

            self.tx_by_hash.remove_txs_bulk(&evicted_hashes);

            journal.num_evicted += evicted_hashes.len();
            journal.num_evicted_by_pass.push(evicted_hashes.len());

            debug!(pass, num_evicted = evicted_hashes.len(), "eviction pass");
        }

        journal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, MAX_NUM_BYTES, MAX_NUM_BYTES_PER_SENDER};
    use crate::mock::{MockMempoolHost, MockTransaction};
    use embercore_types::H256;

    fn cache_with_count_threshold(max_num_txs: u64, batch: u32) -> TxCache {
        let config = CacheConfig {
            name: "test".to_string(),
            num_shards: 16,
            max_num_bytes: MAX_NUM_BYTES,
            max_num_txs,
            max_num_bytes_per_sender: MAX_NUM_BYTES_PER_SENDER,
            max_num_txs_per_sender: 50_000,
            // The gate stays closed on the add path; tests drive eviction
            // directly.
            eviction_enabled: false,
            num_items_to_preemptively_evict: batch,
        };
        TxCache::new(config, std::sync::Arc::new(MockMempoolHost::new())).unwrap()
    }

    fn add_txs(cache: &TxCache, num_senders: u8, txs_per_sender: u64) {
        for sender_tag in 0..num_senders {
            let sender = Address::from([sender_tag; 20]);
            for nonce in 1..=txs_per_sender {
                let mut hash_bytes = [sender_tag; 32];
                hash_bytes[31] = nonce as u8;
                let tx = crate::tx::WrappedTransaction::new(
                    std::sync::Arc::new(MockTransaction::new(sender, nonce)),
                    H256::from(hash_bytes),
                    128,
                );
                cache.add_tx(tx);
            }
        }
    }

    #[test]
    fn test_eviction_skipped_when_capacity_holds() {
        let cache = cache_with_count_threshold(100, 1);
        add_txs(&cache, 2, 3);

        assert!(cache.do_eviction().is_none());
        assert_eq!(cache.count_tx(), 6);
    }

    #[test]
    fn test_journal_records_passes() {
        let cache = cache_with_count_threshold(4, 3);
        add_txs(&cache, 2, 4);
        assert_eq!(cache.count_tx(), 8);

        let journal = cache.do_eviction().unwrap();

        // 8 over a threshold of 4: two passes of three, then capacity holds.
        assert_eq!(journal.num_evicted_by_pass, vec![3, 3]);
        assert_eq!(journal.num_evicted, 6);
        assert_eq!(cache.count_tx(), 2);
    }

    #[test]
    fn test_single_pass_with_batch_one() {
        let cache = cache_with_count_threshold(4, 1);
        add_txs(&cache, 1, 5);

        let journal = cache.do_eviction().unwrap();
        assert_eq!(journal.num_evicted, 1);
        assert_eq!(cache.count_tx(), 4);
    }
}
