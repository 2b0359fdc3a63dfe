//! Nonce-ordered transaction list of one sender.

use std::cmp::Reverse;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use embercore_types::{Address, H256};
use parking_lot::RwLock;

use crate::config::SenderConstraints;
use crate::tx::WrappedTransaction;

/// The pending transactions of a single sender.
///
/// Items are kept strictly ascending by nonce; equal nonces order by gas price
/// descending, then by hash ascending. Insertion enforces the per-sender
/// constraints by evicting the highest-nonce transactions until the list fits.
///
/// The byte counter is atomic so the cache can aggregate sizes without taking
/// the list lock.
pub(crate) struct TxListForSender {
    sender: Address,
    constraints: SenderConstraints,
    items: RwLock<Vec<Arc<WrappedTransaction>>>,
    num_bytes: AtomicI64,
}

impl TxListForSender {
    pub fn new(sender: Address, constraints: SenderConstraints) -> Self {
        Self {
            sender,
            constraints,
            items: RwLock::new(Vec::new()),
            num_bytes: AtomicI64::new(0),
        }
    }

    fn ordering_key(tx: &WrappedTransaction) -> (u64, Reverse<u64>, H256) {
        (tx.nonce(), Reverse(tx.gas_price()), tx.tx_hash())
    }

    /// Inserts the transaction in nonce order, then shrinks the list until the
    /// per-sender constraints hold.
    ///
    /// Returns whether the list changed, and the hashes evicted by the
    /// constraints (possibly including the incoming transaction itself).
    /// Re-adding a (nonce, hash) pair already present is a no-op.
    pub fn add_tx(&self, tx: Arc<WrappedTransaction>) -> (bool, Vec<H256>) {
        let mut items = self.items.write();

        // Equal-nonce entries are contiguous; look for the same hash there.
        let start = items.partition_point(|t| t.nonce() < tx.nonce());
        let end = items.partition_point(|t| t.nonce() <= tx.nonce());
        if items[start..end].iter().any(|t| t.tx_hash() == tx.tx_hash()) {
            return (false, Vec::new());
        }

        let key = Self::ordering_key(&tx);
        let position = items[start..end]
            .partition_point(|t| Self::ordering_key(t) < key)
            + start;

        self.num_bytes.fetch_add(tx.size() as i64, Ordering::SeqCst);
        items.insert(position, tx);

        let evicted = self.apply_size_constraints(&mut items);
        (true, evicted)
    }

    fn apply_size_constraints(&self, items: &mut Vec<Arc<WrappedTransaction>>) -> Vec<H256> {
        let mut evicted = Vec::new();
        while self.is_over_constraints(items) {
            match items.pop() {
                Some(tx) => {
                    self.num_bytes.fetch_sub(tx.size() as i64, Ordering::SeqCst);
                    evicted.push(tx.tx_hash());
                }
                None => break,
            }
        }
        evicted
    }

    fn is_over_constraints(&self, items: &[Arc<WrappedTransaction>]) -> bool {
        items.len() as u64 > self.constraints.max_num_txs
            || self.num_bytes() > self.constraints.max_num_bytes
    }

    /// Removes every transaction with nonce lower than or equal to the given
    /// one, returning their hashes.
    pub fn remove_with_nonce_lower_or_equal(&self, nonce: u64) -> Vec<H256> {
        let mut items = self.items.write();
        let cut = items.partition_point(|t| t.nonce() <= nonce);
        let removed: Vec<_> = items.drain(..cut).collect();
        self.discount(&removed);
        removed.iter().map(|t| t.tx_hash()).collect()
    }

    /// Removes every transaction with nonce higher than or equal to the given
    /// one, returning their hashes.
    pub fn remove_with_nonce_higher_or_equal(&self, nonce: u64) -> Vec<H256> {
        let mut items = self.items.write();
        let cut = items.partition_point(|t| t.nonce() < nonce);
        let removed = items.split_off(cut);
        self.discount(&removed);
        removed.iter().map(|t| t.tx_hash()).collect()
    }

    fn discount(&self, removed: &[Arc<WrappedTransaction>]) {
        for tx in removed {
            self.num_bytes.fetch_sub(tx.size() as i64, Ordering::SeqCst);
        }
    }

    /// Snapshot of the list in nonce-ascending order.
    pub fn txs(&self) -> Vec<Arc<WrappedTransaction>> {
        self.items.read().clone()
    }

    /// Snapshot of the list in reverse nonce order, the "bunch" consumed by
    /// eviction (highest nonce first).
    pub fn txs_reversed(&self) -> Vec<Arc<WrappedTransaction>> {
        let mut txs = self.items.read().clone();
        txs.reverse();
        txs
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn num_txs(&self) -> u64 {
        self.items.read().len() as u64
    }

    pub fn num_bytes(&self) -> u64 {
        self.num_bytes.load(Ordering::SeqCst).max(0) as u64
    }

    pub fn sender(&self) -> Address {
        self.sender
    }
}
