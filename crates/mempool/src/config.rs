//! Cache configuration and limits.

use serde::{Deserialize, Serialize};

use crate::{MempoolError, Result};

/// Upper bound on the shard count of the internal maps.
pub const MAX_NUM_SHARDS: u32 = 256;

/// Upper bound on the global byte capacity (1 GiB).
pub const MAX_NUM_BYTES: u64 = 1 << 30;

/// Upper bound on the per-sender byte capacity (32 MiB).
pub const MAX_NUM_BYTES_PER_SENDER: u64 = 32 << 20;

/// Upper bound on the global transaction (and sender) count capacity.
pub const MAX_NUM_TXS: u64 = 4_000_000;

/// Upper bound on the per-sender transaction count capacity.
pub const MAX_NUM_TXS_PER_SENDER: u64 = 50_000;

/// Transaction cache configuration.
///
/// The same shard count is used for both internal maps. `max_num_txs` doubles
/// as the sender-count trigger for eviction: the cache considers itself over
/// capacity when the number of bytes, transactions, or senders strictly
/// exceeds its threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache identifier, used in logs
    pub name: String,
    /// Shard count for both internal maps
    pub num_shards: u32,
    /// Global byte capacity that triggers eviction
    pub max_num_bytes: u64,
    /// Global transaction-count and sender-count capacity that triggers eviction
    pub max_num_txs: u64,
    /// Byte cap applied to each sender's list on insertion
    pub max_num_bytes_per_sender: u64,
    /// Transaction-count cap applied to each sender's list on insertion
    pub max_num_txs_per_sender: u64,
    /// Gate on the global eviction path
    pub eviction_enabled: bool,
    /// Number of transactions removed per eviction pass
    pub num_items_to_preemptively_evict: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "mempool".to_string(),
            num_shards: 16,
            max_num_bytes: 419_430_400, // 400 MiB
            max_num_txs: 300_000,
            max_num_bytes_per_sender: 12_288_000,
            max_num_txs_per_sender: 5_000,
            eviction_enabled: true,
            num_items_to_preemptively_evict: 50_000,
        }
    }
}

impl CacheConfig {
    /// Validate the configuration.
    ///
    /// Returns [`MempoolError::InvalidConfig`] naming the offending field when
    /// the name is empty, any numeric option is zero, or an option exceeds its
    /// documented upper bound.
    pub fn verify(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(MempoolError::InvalidConfig("name"));
        }
        if self.num_shards == 0 || self.num_shards > MAX_NUM_SHARDS {
            return Err(MempoolError::InvalidConfig("num_shards"));
        }
        if self.max_num_bytes == 0 || self.max_num_bytes > MAX_NUM_BYTES {
            return Err(MempoolError::InvalidConfig("max_num_bytes"));
        }
        if self.max_num_txs == 0 || self.max_num_txs > MAX_NUM_TXS {
            return Err(MempoolError::InvalidConfig("max_num_txs"));
        }
        if self.max_num_bytes_per_sender == 0
            || self.max_num_bytes_per_sender > MAX_NUM_BYTES_PER_SENDER
        {
            return Err(MempoolError::InvalidConfig("max_num_bytes_per_sender"));
        }
        if self.max_num_txs_per_sender == 0
            || self.max_num_txs_per_sender > MAX_NUM_TXS_PER_SENDER
        {
            return Err(MempoolError::InvalidConfig("max_num_txs_per_sender"));
        }
        if self.num_items_to_preemptively_evict == 0 {
            return Err(MempoolError::InvalidConfig("num_items_to_preemptively_evict"));
        }
        Ok(())
    }

    /// Returns the constraints applied to each per-sender list.
    pub fn sender_constraints(&self) -> SenderConstraints {
        SenderConstraints {
            max_num_bytes: self.max_num_bytes_per_sender,
            max_num_txs: self.max_num_txs_per_sender,
        }
    }
}

/// Size limits enforced by a per-sender transaction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderConstraints {
    /// Byte cap for one sender's list
    pub max_num_bytes: u64,
    /// Transaction-count cap for one sender's list
    pub max_num_txs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_verifies() {
        assert!(CacheConfig::default().verify().is_ok());
    }

    #[test]
    fn test_verify_names_offending_field() {
        let config = CacheConfig::default();

        let mut bad = config.clone();
        bad.name = String::new();
        assert!(bad.verify().unwrap_err().to_string().contains("name"));

        let mut bad = config.clone();
        bad.num_shards = 0;
        assert!(bad.verify().unwrap_err().to_string().contains("num_shards"));

        let mut bad = config.clone();
        bad.max_num_bytes = 0;
        assert!(bad
            .verify()
            .unwrap_err()
            .to_string()
            .contains("max_num_bytes"));

        let mut bad = config.clone();
        bad.max_num_txs = 0;
        assert!(bad.verify().unwrap_err().to_string().contains("max_num_txs"));

        let mut bad = config.clone();
        bad.max_num_bytes_per_sender = 0;
        assert!(bad
            .verify()
            .unwrap_err()
            .to_string()
            .contains("max_num_bytes_per_sender"));

        let mut bad = config.clone();
        bad.max_num_txs_per_sender = 0;
        assert!(bad
            .verify()
            .unwrap_err()
            .to_string()
            .contains("max_num_txs_per_sender"));

        let mut bad = config.clone();
        bad.num_items_to_preemptively_evict = 0;
        assert!(bad
            .verify()
            .unwrap_err()
            .to_string()
            .contains("num_items_to_preemptively_evict"));
    }

    #[test]
    fn test_verify_rejects_values_over_bounds() {
        let config = CacheConfig::default();

        let mut bad = config.clone();
        bad.num_shards = MAX_NUM_SHARDS + 1;
        assert!(bad.verify().is_err());

        let mut bad = config.clone();
        bad.max_num_bytes = MAX_NUM_BYTES + 1;
        assert!(bad.verify().is_err());

        let mut bad = config.clone();
        bad.max_num_txs = MAX_NUM_TXS + 1;
        assert!(bad.verify().is_err());

        let mut bad = config.clone();
        bad.max_num_bytes_per_sender = MAX_NUM_BYTES_PER_SENDER + 1;
        assert!(bad.verify().is_err());

        let mut bad = config;
        bad.max_num_txs_per_sender = MAX_NUM_TXS_PER_SENDER + 1;
        assert!(bad.verify().is_err());
    }

    #[test]
    fn test_sender_constraints() {
        let mut config = CacheConfig::default();
        config.max_num_bytes_per_sender = 1024;
        config.max_num_txs_per_sender = 3;

        let constraints = config.sender_constraints();
        assert_eq!(constraints.max_num_bytes, 1024);
        assert_eq!(constraints.max_num_txs, 3);
    }
}
