//! Bounded LRU Map with Inline TTL
//!
//! This module implements the per-shard storage engine: a fixed-capacity
//! map with O(1) least-recently-used eviction and per-key expiration.
//!
//! ## Design Decisions
//!
//! 1. **Arena-backed recency list**: nodes live in a `Vec` and link to each
//!    other through `prev`/`next` indices instead of pointers. Relinking on
//!    every `get` stays O(1) without any cyclic ownership.
//! 2. **Inline TTL**: the expiration instant is a field of the node, right
//!    next to the value. A separate expiration map would double lock
//!    traffic and allow a value and its TTL to drift apart.
//! 3. **Lazy + active expiry**: expired entries are removed by the access
//!    that discovers them, and [`LruTtlMap::sweep_expired`] reclaims the
//!    ones nobody touches.
//! 4. **One mutex per shard**: every operation takes the shard lock once.
//!    Contention is handled a level up by sharding, not by finer locks.
//!
//! ## Recency
//!
//! `get` and `insert` move the touched key to the most-recently-used
//! position. `expire` deliberately does not: stamping a TTL is metadata
//! maintenance, not a use of the value.

use crate::storage::clock::{is_expired_at, now_millis};
use crate::storage::error::StoreError;
use crate::storage::stats::StatsCounters;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Sentinel index meaning "no node".
const NIL: usize = usize::MAX;

/// One entry of a shard image: key, value, optional absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub key: Bytes,
    pub value: Bytes,
    pub expires_at_ms: Option<i64>,
}

/// Consistent copy of one shard's live entries.
///
/// Entries are ordered least-recently-used first so that replaying them
/// through [`LruTtlMap::load_from_snapshot`] reproduces the recency order
/// they were captured with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardImage {
    pub entries: Vec<ImageEntry>,
}

#[derive(Debug)]
struct Node {
    key: Bytes,
    value: Bytes,
    expires_at_ms: Option<i64>,
    prev: usize,
    next: usize,
}

impl Node {
    #[inline]
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms
            .map(|at| is_expired_at(at, now_ms))
            .unwrap_or(false)
    }
}

/// Everything guarded by the shard mutex.
#[derive(Debug)]
struct MapInner {
    /// Key to arena slot.
    index: HashMap<Bytes, usize>,
    /// Node arena; `None` slots are free.
    nodes: Vec<Option<Node>>,
    /// Recycled arena slots.
    free: Vec<usize>,
    /// Most-recently-used node, or `NIL` when empty.
    head: usize,
    /// Least-recently-used node, or `NIL` when empty.
    tail: usize,
}

impl MapInner {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    fn node(&self, idx: usize) -> &Node {
        self.nodes[idx].as_ref().expect("dangling node index")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node {
        self.nodes[idx].as_mut().expect("dangling node index")
    }

    /// Unlinks `idx` from the recency list without freeing it.
    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node(idx);
            (node.prev, node.next)
        };
        if prev != NIL {
            self.node_mut(prev).next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.node_mut(next).prev = prev;
        } else {
            self.tail = prev;
        }
    }

    /// Links `idx` in at the most-recently-used position.
    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = NIL;
            node.next = old_head;
        }
        if old_head != NIL {
            self.node_mut(old_head).prev = idx;
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }

    /// Stores `node` in a free arena slot and returns its index.
    fn alloc(&mut self, node: Node) -> usize {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    /// Fully removes the node at `idx`: unlink, drop from the index, free
    /// the slot. Returns the removed node.
    fn remove(&mut self, idx: usize) -> Node {
        self.detach(idx);
        let node = self.nodes[idx].take().expect("dangling node index");
        self.index.remove(&node.key);
        self.free.push(idx);
        node
    }

    /// Inserts a fresh entry at the MRU position, making room first when
    /// at capacity: expired entries at the tail are reclaimed as
    /// expirations, and at most one live LRU entry is evicted.
    fn insert_fresh(
        &mut self,
        key: Bytes,
        value: Bytes,
        expires_at_ms: Option<i64>,
        capacity: usize,
        now_ms: i64,
    ) -> FreshInsert {
        let mut outcome = FreshInsert::default();
        while self.index.len() >= capacity {
            let lru = self.tail;
            debug_assert_ne!(lru, NIL, "full map must have a tail");
            if self.node(lru).is_expired(now_ms) {
                self.remove(lru);
                outcome.expired_removed += 1;
            } else {
                self.remove(lru);
                outcome.evicted = true;
            }
        }
        let idx = self.alloc(Node {
            key: key.clone(),
            value,
            expires_at_ms,
            prev: NIL,
            next: NIL,
        });
        self.push_front(idx);
        self.index.insert(key, idx);
        outcome
    }

    /// Arena slots holding expired nodes at `now_ms`.
    fn expired_slots(&self, now_ms: i64) -> Vec<usize> {
        self.index
            .values()
            .copied()
            .filter(|&idx| self.node(idx).is_expired(now_ms))
            .collect()
    }
}

/// What making room for a fresh insert removed.
#[derive(Debug, Default)]
struct FreshInsert {
    expired_removed: u64,
    evicted: bool,
}

/// Thread-safe bounded map with LRU eviction and per-key TTL.
///
/// One instance backs each shard of the store. All operations acquire the
/// shard mutex exactly once and do O(1) work besides hashing, except the
/// scan-based [`sweep_expired`](Self::sweep_expired) and the snapshot
/// drain/load paths which are O(n) by nature.
#[derive(Debug)]
pub struct LruTtlMap {
    inner: Mutex<MapInner>,
    capacity: usize,
    stats: StatsCounters,
}

impl LruTtlMap {
    /// Creates a map holding at most `capacity` live entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "capacity must be positive");
        Self {
            inner: Mutex::new(MapInner::with_capacity(capacity)),
            capacity,
            stats: StatsCounters::new(),
        }
    }

    /// Maximum number of live entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// This shard's operation counters.
    pub fn stats(&self) -> &StatsCounters {
        &self.stats
    }

    /// Inserts or overwrites `key`. Overwriting clears any existing TTL.
    /// A fresh insert into a full map evicts the least-recently-used entry.
    pub fn insert(&self, key: Bytes, value: Bytes) {
        self.stats.record_set();
        let now = now_millis();
        let mut inner = self.inner.lock();
        if let Some(&idx) = inner.index.get(&key) {
            let node = inner.node_mut(idx);
            node.value = value;
            node.expires_at_ms = None;
            inner.detach(idx);
            inner.push_front(idx);
            return;
        }
        let outcome = inner.insert_fresh(key, value, None, self.capacity, now);
        if outcome.evicted {
            self.stats.record_eviction();
        }
        self.stats.record_expirations(outcome.expired_removed);
    }

    /// Returns the live value for `key`, moving it to most-recently-used.
    ///
    /// An entry whose expiration has passed is removed on the spot and
    /// reported as a miss; the removal is counted once as an expiration.
    pub fn get(&self, key: &Bytes) -> Option<Bytes> {
        let now = now_millis();
        let mut inner = self.inner.lock();
        let idx = match inner.index.get(key) {
            Some(&idx) => idx,
            None => {
                self.stats.record_get(false);
                return None;
            }
        };
        if inner.node(idx).is_expired(now) {
            inner.remove(idx);
            self.stats.record_expirations(1);
            self.stats.record_get(false);
            return None;
        }
        inner.detach(idx);
        inner.push_front(idx);
        let value = inner.node(idx).value.clone();
        self.stats.record_get(true);
        Some(value)
    }

    /// Removes `key` if present. Returns `true` only when a live
    /// (non-expired) entry was removed; physically dropping an already
    /// expired entry returns `false` and is not counted as an expiration.
    pub fn delete(&self, key: &Bytes) -> bool {
        self.stats.record_delete();
        let now = now_millis();
        let mut inner = self.inner.lock();
        match inner.index.get(key) {
            Some(&idx) => {
                let was_live = !inner.node(idx).is_expired(now);
                inner.remove(idx);
                was_live
            }
            None => false,
        }
    }

    /// Stamps an absolute expiration `ttl_millis` from now on a live key.
    ///
    /// Returns `false` when the key is absent or found already expired (in
    /// which case it is removed). Stamping does not move the key in the
    /// recency order.
    pub fn expire(&self, key: &Bytes, ttl_millis: i64) -> Result<bool, StoreError> {
        if ttl_millis <= 0 {
            return Err(StoreError::InvalidArgument(
                "TTL must be positive".to_string(),
            ));
        }
        self.stats.record_expire();
        let now = now_millis();
        let mut inner = self.inner.lock();
        let idx = match inner.index.get(key) {
            Some(&idx) => idx,
            None => return Ok(false),
        };
        if inner.node(idx).is_expired(now) {
            inner.remove(idx);
            self.stats.record_expirations(1);
            return Ok(false);
        }
        inner.node_mut(idx).expires_at_ms = Some(now + ttl_millis);
        Ok(true)
    }

    /// True when `key` maps to a live entry. Shares the full `get` path so
    /// expired entries are reclaimed and stats stay consistent.
    pub fn contains_key(&self, key: &Bytes) -> bool {
        self.get(key).is_some()
    }

    /// Number of live entries. Sweeps expired entries first so the count
    /// never includes stale ones.
    pub fn size(&self) -> usize {
        let now = now_millis();
        let mut inner = self.inner.lock();
        let removed = Self::sweep_locked(&mut inner, now);
        self.stats.record_expirations(removed);
        inner.index.len()
    }

    /// Drops every entry. Neither evictions nor expirations are counted.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        *inner = MapInner::with_capacity(self.capacity);
    }

    /// Removes every expired entry in one pass and returns how many were
    /// reclaimed.
    pub fn sweep_expired(&self) -> u64 {
        let now = now_millis();
        let mut inner = self.inner.lock();
        let removed = Self::sweep_locked(&mut inner, now);
        self.stats.record_expirations(removed);
        removed
    }

    fn sweep_locked(inner: &mut MapInner, now_ms: i64) -> u64 {
        let expired = inner.expired_slots(now_ms);
        let count = expired.len() as u64;
        for idx in expired {
            inner.remove(idx);
        }
        count
    }

    /// Copies all live entries into a [`ShardImage`], least-recently-used
    /// first. Entries discovered expired are removed and counted as
    /// expirations; the map itself keeps its live content.
    pub fn drain_for_snapshot(&self) -> ShardImage {
        let now = now_millis();
        let mut inner = self.inner.lock();
        let removed = Self::sweep_locked(&mut inner, now);
        self.stats.record_expirations(removed);

        let mut entries = Vec::with_capacity(inner.index.len());
        let mut cursor = inner.tail;
        while cursor != NIL {
            let node = inner.node(cursor);
            entries.push(ImageEntry {
                key: node.key.clone(),
                value: node.value.clone(),
                expires_at_ms: node.expires_at_ms,
            });
            cursor = node.prev;
        }
        ShardImage { entries }
    }

    /// Replaces the map's content with `image`.
    ///
    /// Entries are applied in image order (least-recently-used first), so
    /// the captured recency survives the round trip. Entries whose
    /// expiration is already past are dropped and counted as expirations.
    /// If the image holds more live entries than this map's capacity, the
    /// oldest ones fall out through the regular LRU eviction path.
    pub fn load_from_snapshot(&self, image: &ShardImage) {
        let now = now_millis();
        let mut inner = self.inner.lock();
        *inner = MapInner::with_capacity(self.capacity);

        let mut dropped_expired = 0u64;
        for entry in &image.entries {
            if let Some(at) = entry.expires_at_ms {
                if is_expired_at(at, now) {
                    dropped_expired += 1;
                    continue;
                }
            }
            let outcome = inner.insert_fresh(
                entry.key.clone(),
                entry.value.clone(),
                entry.expires_at_ms,
                self.capacity,
                now,
            );
            if outcome.evicted {
                self.stats.record_eviction();
            }
            dropped_expired += outcome.expired_removed;
        }
        self.stats.record_expirations(dropped_expired);
    }

    /// Keys ordered most-recently-used first. Test support.
    #[cfg(test)]
    fn recency_keys(&self) -> Vec<Bytes> {
        let inner = self.inner.lock();
        let mut keys = Vec::with_capacity(inner.index.len());
        let mut cursor = inner.head;
        while cursor != NIL {
            let node = inner.node(cursor);
            keys.push(node.key.clone());
            cursor = node.next;
        }
        keys
    }
}
