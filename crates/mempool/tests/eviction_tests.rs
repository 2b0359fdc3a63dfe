//! Tests for capacity-driven global eviction.

use std::sync::Arc;

use embercore_mempool::config::{MAX_NUM_BYTES, MAX_NUM_BYTES_PER_SENDER, MAX_NUM_TXS_PER_SENDER};
use embercore_mempool::{CacheConfig, MockMempoolHost, MockTransaction, TxCache, WrappedTransaction};
use embercore_types::{Address, H256};

fn config_with_count_threshold(max_num_txs: u64, batch: u32) -> CacheConfig {
    CacheConfig {
        name: "untitled".to_string(),
        num_shards: 16,
        max_num_bytes: MAX_NUM_BYTES,
        max_num_txs,
        max_num_bytes_per_sender: MAX_NUM_BYTES_PER_SENDER,
        max_num_txs_per_sender: MAX_NUM_TXS_PER_SENDER,
        eviction_enabled: true,
        num_items_to_preemptively_evict: batch,
    }
}

fn new_cache(config: CacheConfig) -> TxCache {
    TxCache::new(config, Arc::new(MockMempoolHost::new())).unwrap()
}

fn create_tx(sender_tag: u16, nonce: u64) -> WrappedTransaction {
    let mut sender_bytes = [0u8; 20];
    sender_bytes[..2].copy_from_slice(&sender_tag.to_be_bytes());
    let sender = Address::from(sender_bytes);

    let mut hash_bytes = [0u8; 32];
    hash_bytes[..2].copy_from_slice(&sender_tag.to_be_bytes());
    hash_bytes[24..].copy_from_slice(&nonce.to_be_bytes());

    WrappedTransaction::new(
        Arc::new(MockTransaction::new(sender, nonce)),
        H256::from(hash_bytes),
        128,
    )
}

fn add_many_transactions_with_uniform_distribution(
    cache: &TxCache,
    num_senders: u16,
    num_txs_per_sender: u64,
) {
    for sender_tag in 0..num_senders {
        for nonce in 1..=num_txs_per_sender {
            cache.add_tx(create_tx(sender_tag, nonce));
        }
    }
}

#[test]
fn test_eviction_with_batch_of_one() {
    // Eviction happens if capacity is already exceeded, but not if capacity
    // will be exceeded after the addition: with a batch of one, the cache
    // settles at threshold + 1.
    let cache = new_cache(config_with_count_threshold(100, 1));

    add_many_transactions_with_uniform_distribution(&cache, 11, 10);
    assert_eq!(cache.count_tx(), 101);
}

#[test]
fn test_eviction_with_batch_of_two() {
    let cache = new_cache(config_with_count_threshold(100, 2));

    add_many_transactions_with_uniform_distribution(&cache, 11, 10);
    assert_eq!(cache.count_tx(), 100);
}

#[test]
fn test_eviction_with_small_threshold_and_batch_of_three() {
    let cache = new_cache(config_with_count_threshold(4, 3));

    add_many_transactions_with_uniform_distribution(&cache, 3, 5);
    assert_eq!(cache.count_tx(), 3);
}

#[test]
fn test_no_eviction_below_threshold() {
    let cache = new_cache(config_with_count_threshold(250_000, 1));

    add_many_transactions_with_uniform_distribution(&cache, 100, 100);
    assert_eq!(cache.count_tx(), 10_000);
}

#[test]
fn test_eviction_disabled_lets_the_cache_grow() {
    let mut config = config_with_count_threshold(4, 1);
    config.eviction_enabled = false;
    let cache = new_cache(config);

    add_many_transactions_with_uniform_distribution(&cache, 2, 10);
    assert_eq!(cache.count_tx(), 20);
}

#[test]
fn test_eviction_prefers_lower_priced_transactions() {
    let cache = new_cache(config_with_count_threshold(4, 1));

    let sender_of = |tag: u8| Address::from([tag; 20]);
    let add = |tag: u8, nonce: u64, gas_price: u64| {
        cache.add_tx(WrappedTransaction::new(
            Arc::new(
                MockTransaction::new(sender_of(tag), nonce).with_gas_price(gas_price),
            ),
            H256::from([tag * 16 + nonce as u8; 32]),
            128,
        ));
    };

    // Four well-paying senders, then a cheap one.
    add(1, 1, 4_000_000_000);
    add(2, 1, 3_000_000_000);
    add(3, 1, 2_000_000_000);
    add(4, 1, 2_500_000_000);
    add(5, 1, 1_000_000_000);
    assert_eq!(cache.count_tx(), 5);

    // The next addition triggers eviction; the cheapest transaction goes.
    add(6, 1, 3_500_000_000);

    assert_eq!(cache.count_tx(), 5);
    assert!(cache
        .transactions_for_sender(&sender_of(5))
        .is_empty());
    assert_eq!(cache.transactions_for_sender(&sender_of(1)).len(), 1);
}

#[test]
fn test_eviction_by_num_bytes_threshold() {
    let mut config = config_with_count_threshold(MAX_NUM_TXS_PER_SENDER, 1);
    config.max_num_bytes = 1024;
    let cache = new_cache(config);

    // Eight transactions of 256 bytes: 2048 bytes, twice the threshold.
    add_many_transactions_with_uniform_distribution_sized(&cache, 8, 1, 256);

    // Each subsequent add evicted one transaction once over the byte cap.
    assert!(cache.num_bytes() <= 1024 + 256);
}

fn add_many_transactions_with_uniform_distribution_sized(
    cache: &TxCache,
    num_senders: u16,
    num_txs_per_sender: u64,
    size: u64,
) {
    for sender_tag in 0..num_senders {
        for nonce in 1..=num_txs_per_sender {
            let mut sender_bytes = [0u8; 20];
            sender_bytes[..2].copy_from_slice(&sender_tag.to_be_bytes());
            let mut hash_bytes = [1u8; 32];
            hash_bytes[..2].copy_from_slice(&sender_tag.to_be_bytes());
            hash_bytes[24..].copy_from_slice(&nonce.to_be_bytes());
            cache.add_tx(WrappedTransaction::new(
                Arc::new(MockTransaction::new(Address::from(sender_bytes), nonce)),
                H256::from(hash_bytes),
                size,
            ));
        }
    }
}
