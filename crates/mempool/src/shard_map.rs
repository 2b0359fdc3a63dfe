//! Generic sharded concurrent map.
//!
//! Keys are hashed onto one of N independent shards, each guarded by its own
//! lock, so operations on different shards never contend. This is the only
//! locking primitive used below the cache façade.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use parking_lot::RwLock;

/// A keyed concurrent container with N independent shards.
///
/// Iteration snapshots one shard at a time, so it observes a consistent view
/// of each shard but not of the map as a whole.
pub(crate) struct ShardMap<V> {
    shards: Vec<Shard<V>>,
}

struct Shard<V> {
    entries: RwLock<HashMap<Vec<u8>, V>>,
}

impl<V: Clone> ShardMap<V> {
    /// Creates a map with the given shard count (at least one).
    pub fn new(num_shards: u32) -> Self {
        let num_shards = num_shards.max(1) as usize;
        let shards = (0..num_shards)
            .map(|_| Shard {
                entries: RwLock::new(HashMap::new()),
            })
            .collect();
        Self { shards }
    }

    fn shard_for(&self, key: &[u8]) -> &Shard<V> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = hasher.finish() as usize % self.shards.len();
        &self.shards[index]
    }

    /// Gets a clone of the value stored under the key.
    pub fn get(&self, key: &[u8]) -> Option<V> {
        self.shard_for(key).entries.read().get(key).cloned()
    }

    /// Checks whether the key is present.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.shard_for(key).entries.read().contains_key(key)
    }

    /// Inserts the value only if the key is absent. Returns whether the
    /// insertion happened.
    pub fn insert_if_absent(&self, key: &[u8], value: V) -> bool {
        let mut entries = self.shard_for(key).entries.write();
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_vec(), value);
        true
    }

    /// Gets the value under the key, inserting the one produced by `make`
    /// first if the key is absent. The factory runs under the shard lock.
    pub fn get_or_insert_with(&self, key: &[u8], make: impl FnOnce() -> V) -> V {
        let mut entries = self.shard_for(key).entries.write();
        entries
            .entry(key.to_vec())
            .or_insert_with(make)
            .clone()
    }

    /// Removes and returns the value under the key.
    pub fn remove(&self, key: &[u8]) -> Option<V> {
        self.shard_for(key).entries.write().remove(key)
    }

    /// Returns the number of entries, summed shard by shard.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.entries.read().len()).sum()
    }

    /// Returns a snapshot of all keys.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        let mut keys = Vec::with_capacity(self.len());
        for shard in &self.shards {
            keys.extend(shard.entries.read().keys().cloned());
        }
        keys
    }

    /// Returns a snapshot of all values.
    pub fn values(&self) -> Vec<V> {
        let mut values = Vec::with_capacity(self.len());
        for shard in &self.shards {
            values.extend(shard.entries.read().values().cloned());
        }
        values
    }

    /// Visits every entry, one shard at a time.
    pub fn for_each(&self, mut visit: impl FnMut(&[u8], &V)) {
        for shard in &self.shards {
            let entries = shard.entries.read();
            for (key, value) in entries.iter() {
                visit(key, value);
            }
        }
    }

    /// Removes all entries.
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.entries.write().clear();
        }
    }
}
