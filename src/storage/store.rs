//! Sharded Store Façade
//!
//! [`ShardedStore`] routes every key to one of a fixed, power-of-two
//! number of [`LruTtlMap`] shards, enforces the configured key/value size
//! limits before any shard is touched, and hosts the snapshot gate that
//! defines the global quiescence point for capture and restore.
//!
//! ## Shard routing
//!
//! The shard index is a pure function of the key bytes: a 32-bit FNV-1a
//! content hash, spread by XOR-ing in its upper half, masked with
//! `shard_count - 1`. Empty keys route to shard 0. The hash is stable
//! across processes, which keeps snapshot images valid after a restart.
//!
//! ## The snapshot gate
//!
//! Every point operation holds the gate in shared mode for the duration of
//! the call; `capture_snapshot` and `restore_snapshot` take it exclusively.
//! The gate is distinct from the per-shard mutexes and is always acquired
//! first, so the lock order is (gate, shard) everywhere and no operation
//! ever holds two shard locks.

use crate::storage::clock::now_millis;
use crate::storage::engine::{LruTtlMap, ShardImage};
use crate::storage::error::{SizeKind, StoreError};
use crate::storage::stats::StatsSnapshot;
use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

/// Point-in-time image of the whole store, ordered by shard index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotImage {
    /// Wall-clock capture instant in epoch milliseconds.
    pub captured_at_ms: i64,
    /// Shard count of the store that produced the image.
    pub shard_count: u32,
    /// Capacity per shard of the store that produced the image.
    pub capacity_per_shard: u32,
    /// One image per shard, index-aligned.
    pub shards: Vec<ShardImage>,
}

impl SnapshotImage {
    /// Total number of entries across all shard images.
    pub fn total_entries(&self) -> usize {
        self.shards.iter().map(|s| s.entries.len()).sum()
    }
}

/// Sharded key-value store with LRU eviction, TTL expiry and coordinated
/// snapshots.
#[derive(Debug)]
pub struct ShardedStore {
    shards: Vec<LruTtlMap>,
    shard_mask: u32,
    capacity_per_shard: usize,
    max_key_bytes: Option<usize>,
    max_value_bytes: Option<usize>,
    /// Router-wide snapshot gate: shared for point operations, exclusive
    /// for capture/restore.
    gate: RwLock<()>,
}

impl ShardedStore {
    /// Creates a store with `shard_count` shards of `capacity_per_shard`
    /// entries each. Size limits of `None` disable the corresponding
    /// check.
    ///
    /// # Panics
    ///
    /// Panics if `shard_count` is not a positive power of two, if
    /// `capacity_per_shard` is zero, or if a limit is `Some(0)`.
    pub fn new(
        shard_count: usize,
        capacity_per_shard: usize,
        max_key_bytes: Option<usize>,
        max_value_bytes: Option<usize>,
    ) -> Self {
        assert!(
            shard_count > 0 && shard_count.is_power_of_two(),
            "shard count must be a positive power of two"
        );
        assert!(capacity_per_shard >= 1, "capacity per shard must be positive");
        assert!(max_key_bytes != Some(0), "max key bytes must be positive");
        assert!(max_value_bytes != Some(0), "max value bytes must be positive");

        let shards = (0..shard_count)
            .map(|_| LruTtlMap::new(capacity_per_shard))
            .collect();
        Self {
            shards,
            shard_mask: (shard_count - 1) as u32,
            capacity_per_shard,
            max_key_bytes,
            max_value_bytes,
            gate: RwLock::new(()),
        }
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Capacity of each shard.
    pub fn capacity_per_shard(&self) -> usize {
        self.capacity_per_shard
    }

    /// Total capacity across all shards.
    pub fn total_capacity(&self) -> usize {
        self.shards.len() * self.capacity_per_shard
    }

    /// 32-bit FNV-1a over the key bytes.
    fn content_hash(key: &[u8]) -> u32 {
        let mut hash: u32 = 0x811c9dc5;
        for &byte in key {
            hash ^= byte as u32;
            hash = hash.wrapping_mul(0x0100_0193);
        }
        hash
    }

    /// Shard index for `key`: content hash, spread, mask.
    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        if key.is_empty() {
            return 0;
        }
        let mut hash = Self::content_hash(key);
        hash ^= hash >> 16;
        (hash & self.shard_mask) as usize
    }

    #[inline]
    fn shard_for(&self, key: &[u8]) -> &LruTtlMap {
        &self.shards[self.shard_index(key)]
    }

    fn check_limits(&self, key: &Bytes, value: &Bytes) -> Result<(), StoreError> {
        if let Some(limit) = self.max_key_bytes {
            if key.len() > limit {
                return Err(StoreError::TooLarge {
                    kind: SizeKind::Key,
                    size: key.len(),
                    limit,
                });
            }
        }
        if let Some(limit) = self.max_value_bytes {
            if value.len() > limit {
                return Err(StoreError::TooLarge {
                    kind: SizeKind::Value,
                    size: value.len(),
                    limit,
                });
            }
        }
        Ok(())
    }

    /// Inserts or overwrites `key`, rejecting oversized keys and values
    /// before any shard is touched.
    pub fn insert(&self, key: Bytes, value: Bytes) -> Result<(), StoreError> {
        self.check_limits(&key, &value)?;
        let _shared = self.gate.read();
        self.shard_for(&key).insert(key, value);
        Ok(())
    }

    /// Returns the live value for `key`, or `None`.
    pub fn get(&self, key: &Bytes) -> Option<Bytes> {
        let _shared = self.gate.read();
        self.shard_for(key).get(key)
    }

    /// Removes `key`; `true` when a live entry was removed.
    pub fn delete(&self, key: &Bytes) -> bool {
        let _shared = self.gate.read();
        self.shard_for(key).delete(key)
    }

    /// Stamps a TTL on `key`; `Ok(false)` when the key is absent.
    pub fn expire(&self, key: &Bytes, ttl_millis: i64) -> Result<bool, StoreError> {
        let _shared = self.gate.read();
        self.shard_for(key).expire(key, ttl_millis)
    }

    /// True when `key` maps to a live entry.
    pub fn contains_key(&self, key: &Bytes) -> bool {
        let _shared = self.gate.read();
        self.shard_for(key).contains_key(key)
    }

    /// Total number of live entries across all shards.
    pub fn size(&self) -> usize {
        let _shared = self.gate.read();
        self.shards.iter().map(|s| s.size()).sum()
    }

    /// Number of live entries in one shard. For monitoring.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn shard_size(&self, index: usize) -> usize {
        let _shared = self.gate.read();
        self.shards[index].size()
    }

    /// Drops every entry from every shard.
    pub fn clear(&self) {
        let _shared = self.gate.read();
        for shard in &self.shards {
            shard.clear();
        }
    }

    /// Runs one expiry sweep over every shard and returns the total number
    /// of entries reclaimed.
    pub fn sweep_expired(&self) -> u64 {
        let _shared = self.gate.read();
        self.shards.iter().map(|s| s.sweep_expired()).sum()
    }

    /// Aggregated operation counters across all shards.
    pub fn stats(&self) -> StatsSnapshot {
        self.shards
            .iter()
            .fold(StatsSnapshot::default(), |acc, shard| {
                acc.merge(&shard.stats().snapshot())
            })
    }

    /// Resets every shard's counters.
    pub fn reset_stats(&self) {
        for shard in &self.shards {
            shard.stats().reset();
        }
    }

    /// Captures a consistent image of the whole store.
    ///
    /// Holding the gate exclusively freezes all point operations, so the
    /// image reflects exactly the entries live when the gate was granted.
    /// Entries found expired during the capture are removed and counted as
    /// expirations.
    pub fn capture_snapshot(&self) -> SnapshotImage {
        let _exclusive = self.gate.write();
        let shards: Vec<ShardImage> = self
            .shards
            .iter()
            .map(|shard| shard.drain_for_snapshot())
            .collect();
        let image = SnapshotImage {
            captured_at_ms: now_millis(),
            shard_count: self.shards.len() as u32,
            capacity_per_shard: self.capacity_per_shard as u32,
            shards,
        };
        debug!(
            entries = image.total_entries(),
            shards = image.shard_count,
            "captured store snapshot"
        );
        image
    }

    /// Replaces the whole store's content with `image`.
    ///
    /// Fails with [`StoreError::ShardCountMismatch`] (store untouched)
    /// when the image was captured with a different shard count. The
    /// image's capacity may differ from ours; current capacity prevails
    /// and any excess falls out via LRU as each shard loads.
    pub fn restore_snapshot(&self, image: &SnapshotImage) -> Result<(), StoreError> {
        if image.shard_count as usize != self.shards.len() {
            return Err(StoreError::ShardCountMismatch {
                image_shards: image.shard_count,
                store_shards: self.shards.len() as u32,
            });
        }
        let _exclusive = self.gate.write();
        for (shard, shard_image) in self.shards.iter().zip(&image.shards) {
            shard.load_from_snapshot(shard_image);
        }
        debug!(
            entries = image.total_entries(),
            shards = image.shard_count,
            "restored store snapshot"
        );
        Ok(())
    }
}
