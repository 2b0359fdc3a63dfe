//! The transaction cache façade.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use embercore_types::{Address, H256};
use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::by_hash::TxByHashMap;
use crate::by_sender::TxBySenderMap;
use crate::config::CacheConfig;
use crate::selection;
use crate::session::SelectionSessionWrapper;
use crate::traits::{Cacher, MempoolHost, SelectionSession, Transaction};
use crate::tx::WrappedTransaction;
use crate::Result;

/// A bounded, sender-partitioned cache of pending transactions.
///
/// The cache owns two cooperating maps (by hash, by sender); each insertion
/// and removal is the exclusive responsibility of the façade, bracketed by a
/// coarse mutation lock so the two-map updates are not interleaved. Read
/// paths never take that lock. All operations are thread-safe.
pub struct TxCache {
    name: String,
    config: CacheConfig,
    host: Arc<dyn MempoolHost>,
    pub(crate) tx_by_hash: TxByHashMap,
    pub(crate) tx_by_sender: TxBySenderMap,
    mut_tx_operation: Mutex<()>,
    pub(crate) eviction_mutex: Mutex<()>,
    pub(crate) is_eviction_in_progress: AtomicBool,
}

impl std::fmt::Debug for TxCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxCache")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TxCache {
    /// Creates a new transaction cache.
    ///
    /// Fails with [`crate::MempoolError::InvalidConfig`] when the
    /// configuration does not verify.
    pub fn new(config: CacheConfig, host: Arc<dyn MempoolHost>) -> Result<Self> {
        debug!(name = %config.name, ?config, "creating transaction cache");
        config.verify()?;

        // The same shard count serves both internal maps.
        let num_shards = config.num_shards;
        let sender_constraints = config.sender_constraints();

        Ok(Self {
            name: config.name.clone(),
            tx_by_hash: TxByHashMap::new(num_shards),
            tx_by_sender: TxBySenderMap::new(num_shards, sender_constraints),
            config,
            host,
            mut_tx_operation: Mutex::new(()),
            eviction_mutex: Mutex::new(()),
            is_eviction_in_progress: AtomicBool::new(false),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Adds a transaction to the cache, evicting others if capacity is
    /// reached.
    ///
    /// Returns `(accepted, changed)`: the first flag is structural acceptance,
    /// the second is true if any of the internal maps observed a change. Under
    /// adversarial concurrent add/remove races the two maps may each reach a
    /// different outcome; the caller still gets `changed = true` if either map
    /// changed, so the on-added notification fires. `changed` may also be true
    /// for a transaction immediately evicted by the per-sender limits.
    pub fn add_tx(&self, mut tx: WrappedTransaction) -> (bool, bool) {
        trace!(
            tx_hash = %tx.tx_hash(),
            sender = %tx.sender(),
            nonce = tx.nonce(),
            "add_tx"
        );

        tx.precompute_fields(self.host.as_ref());
        let tx = Arc::new(tx);

        if self.config.eviction_enabled {
            let _ = self.do_eviction();
        }

        let guard = self.mut_tx_operation.lock();
        let added_in_by_hash = self.tx_by_hash.add_tx(Arc::clone(&tx));
        let (added_in_by_sender, evicted) = self.tx_by_sender.add_tx(Arc::clone(&tx));
        drop(guard);

        if added_in_by_hash != added_in_by_sender {
            // Two concurrent adds of the same transaction can split their wins
            // between the maps; a subsequent add or remove converges them.
            debug!(
                tx_hash = %tx.tx_hash(),
                sender = %tx.sender(),
                added_in_by_hash,
                added_in_by_sender,
                "add_tx: slight maps inconsistency detected"
            );
        }

        if !evicted.is_empty() {
            trace!(
                sender = %tx.sender(),
                num_evicted = evicted.len(),
                "add_tx with per-sender eviction"
            );
            self.tx_by_hash.remove_txs_bulk(&evicted);
        }

        (true, added_in_by_hash || added_in_by_sender)
    }

    /// Gets the transaction with the given hash.
    pub fn get_by_tx_hash(&self, tx_hash: &H256) -> Option<Arc<WrappedTransaction>> {
        self.tx_by_hash.get(tx_hash)
    }

    /// Removes the transaction with the given hash, together with every
    /// same-sender transaction of lower nonce.
    ///
    /// A transaction at nonce `k` only executes after its predecessors;
    /// removing `k` (say, because a block included it) means the earlier
    /// nonces are spent or invalidated as well.
    pub fn remove_tx_by_hash(&self, tx_hash: &H256) -> bool {
        let _guard = self.mut_tx_operation.lock();

        let Some(tx) = self.tx_by_hash.remove_tx(tx_hash) else {
            // Might have been removed in the meantime.
            return false;
        };

        let evicted = self.tx_by_sender.remove_txs_with_nonce_lower_or_equal(&tx);
        if !evicted.is_empty() {
            self.tx_by_hash.remove_txs_bulk(&evicted);
        }

        trace!(tx_hash = %tx_hash, num_evicted = evicted.len(), "remove_tx_by_hash");
        true
    }

    /// Selects the best transactions for the next block.
    ///
    /// Returns up to `max_num` transactions with total gas at most
    /// `gas_requested`, nonce-continuous per sender, honoring account balances
    /// and guardian state as reported by the session. Stops emitting once
    /// `max_duration` has elapsed and returns what was accumulated. Does not
    /// mutate cache state.
    pub fn select_transactions(
        &self,
        session: &dyn SelectionSession,
        gas_requested: u64,
        max_num: usize,
        max_duration: Duration,
    ) -> (Vec<Arc<WrappedTransaction>>, u64) {
        let started = Instant::now();

        debug!(
            name = %self.name,
            num_bytes = self.num_bytes(),
            num_txs = self.count_tx(),
            num_senders = self.count_senders(),
            "selection: begin"
        );

        let mut session_wrapper = SelectionSessionWrapper::new(session);
        let senders = self.tx_by_sender.senders();
        let (transactions, accumulated_gas) = selection::select_transactions(
            &mut session_wrapper,
            senders,
            gas_requested,
            max_num,
            max_duration,
        );

        debug!(
            name = %self.name,
            duration = ?started.elapsed(),
            num_selected = transactions.len(),
            gas = accumulated_gas,
            "selection: end"
        );

        (transactions, accumulated_gas)
    }

    /// Approximate number of bytes stored in the cache.
    pub fn num_bytes(&self) -> u64 {
        self.tx_by_hash.num_bytes()
    }

    /// Number of transactions in the cache.
    pub fn count_tx(&self) -> u64 {
        self.tx_by_hash.count_tx()
    }

    /// Number of senders in the cache.
    pub fn count_senders(&self) -> u64 {
        self.tx_by_sender.count_senders()
    }

    /// Number of transactions in the cache, as usize.
    pub fn len(&self) -> usize {
        self.count_tx() as usize
    }

    /// Whether the cache holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.count_tx() == 0
    }

    /// Visits every transaction in the cache, one shard at a time.
    pub fn for_each_transaction(&self, visit: impl FnMut(&H256, &Arc<WrappedTransaction>)) {
        self.tx_by_hash.for_each(visit);
    }

    /// Nonce-ordered snapshot of one sender's transactions.
    pub fn transactions_for_sender(&self, sender: &Address) -> Vec<Arc<WrappedTransaction>> {
        self.tx_by_sender
            .get_list(sender)
            .map(|list| list.txs())
            .unwrap_or_default()
    }

    /// All transaction hashes in the cache.
    pub fn keys(&self) -> Vec<H256> {
        self.tx_by_hash.keys()
    }

    /// Removes all transactions.
    pub fn clear(&self) {
        let _guard = self.mut_tx_operation.lock();
        self.tx_by_sender.clear();
        self.tx_by_hash.clear();
    }

    /// The maximum number of transactions the cache intends to hold.
    pub fn max_size(&self) -> usize {
        self.config.max_num_txs as usize
    }
}

impl Cacher for TxCache {
    fn put(&self, _key: &[u8], _value: Arc<dyn Transaction>, _size_in_bytes: usize) -> bool {
        error!("TxCache::put is not implemented");
        false
    }

    fn get(&self, key: &[u8]) -> Option<Arc<dyn Transaction>> {
        let tx_hash = H256::from_slice(key).ok()?;
        self.get_by_tx_hash(&tx_hash).map(|tx| Arc::clone(tx.tx()))
    }

    fn has(&self, key: &[u8]) -> bool {
        H256::from_slice(key)
            .map(|tx_hash| self.tx_by_hash.has(&tx_hash))
            .unwrap_or(false)
    }

    fn peek(&self, key: &[u8]) -> Option<Arc<dyn Transaction>> {
        Cacher::get(self, key)
    }

    fn has_or_add(
        &self,
        _key: &[u8],
        _value: Arc<dyn Transaction>,
        _size_in_bytes: usize,
    ) -> (bool, bool) {
        error!("TxCache::has_or_add is not implemented");
        (false, false)
    }

    fn remove(&self, key: &[u8]) {
        if let Ok(tx_hash) = H256::from_slice(key) {
            let _ = self.remove_tx_by_hash(&tx_hash);
        }
    }

    fn keys(&self) -> Vec<H256> {
        TxCache::keys(self)
    }

    fn len(&self) -> usize {
        TxCache::len(self)
    }

    fn size_in_bytes_contained(&self) -> u64 {
        0
    }

    fn max_size(&self) -> usize {
        TxCache::max_size(self)
    }

    fn register_handler(
        &self,
        _handler: Box<dyn Fn(&H256, Arc<dyn Transaction>) + Send + Sync>,
        _id: &str,
    ) {
        error!("TxCache::register_handler is not implemented");
    }

    fn unregister_handler(&self, _id: &str) {
        error!("TxCache::unregister_handler is not implemented");
    }

    fn immunize_against_eviction(&self, _keys: &[H256]) {
        // This cache does not immunize entries.
    }

    fn clear(&self) {
        TxCache::clear(self)
    }

    fn close(&self) {}
}
