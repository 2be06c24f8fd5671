//! O(1) LFU Cache Engine
//!
//! Generic least-frequently-used cache with batched eviction and an injected
//! asynchronous loader for misses.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                        LfuCache<K, V, L>                           │
//! │                                                                    │
//! │  Mutex<LfuState>                                                   │
//! │  ┌──────────────────────────────────────────────────────────────┐  │
//! │  │  index: HashMap<K, NodeIdx>                                  │  │
//! │  │                                                              │  │
//! │  │  head ──▶ [freq 1] ──▶ [freq 2] ──▶ [freq 7] ──▶ ∅           │  │
//! │  │            │ a, d        │ b          │ c                    │  │
//! │  │            ▲ evict from head      append at tail ▲           │  │
//! │  └──────────────────────────────────────────────────────────────┘  │
//! │                                                                    │
//! │  loader: L  (async fetch on miss, runs outside the lock)           │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Eviction
//!
//! Triggered only when inserting a new key at capacity: `evict_batch` entries
//! are removed, always the oldest entry of the lowest-frequency tier (FIFO
//! tie-break within a tier). A batch larger than the cache simply empties it.
//!
//! # Concurrency
//!
//! All structural mutation happens under one mutex and never suspends; only
//! the loader call awaits, with the lock released. Two concurrent misses for
//! the same key may therefore both reach the backing store, and the later
//! write wins. This matches the engine's origin on a cooperative scheduler
//! and is deliberate; there is no single-flight de-duplication.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::node::{FreqList, NodeIdx};
use super::CacheConfig;
use crate::error::{Error, Result};

/// Fetch-on-miss capability, injected at cache construction
#[async_trait]
pub trait Loader<K, V>: Send + Sync {
    /// Load the value for a key absent from the cache
    async fn load(&self, key: K) -> Result<V>;
}

/// Cache operation counters
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that had to consult the loader
    pub misses: u64,
    /// Completed loader calls
    pub loads: u64,
    /// Entries removed by eviction
    pub evictions: u64,
    /// Distinct keys currently held
    pub entries: usize,
    /// Maximum distinct keys
    pub capacity: usize,
}

/// Engine state guarded by the cache mutex
#[derive(Debug)]
struct LfuState<K, V> {
    /// Key to entry-node shortcut; ownership is held through the tier list
    index: HashMap<K, NodeIdx<K, V>>,
    list: FreqList<K, V>,
    capacity: usize,
    evict_batch: usize,
}

impl<K, V> LfuState<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new(capacity: usize, evict_batch: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            list: FreqList::with_capacity(capacity),
            capacity,
            evict_batch,
        }
    }

    /// Hit path: clone the value and promote the entry one tier
    fn get_promote(&mut self, key: &K) -> Result<Option<V>>
    where
        V: Clone,
    {
        let Some(&idx) = self.index.get(key) else {
            return Ok(None);
        };
        let value = self.list.node(idx)?.value.clone();
        self.promote(idx)?;
        Ok(Some(value))
    }

    /// Insert or overwrite; returns the number of entries evicted
    fn set(&mut self, key: K, value: V) -> Result<usize> {
        if let Some(&idx) = self.index.get(&key) {
            self.list.node_mut(idx)?.value = value;
            self.promote(idx)?;
            return Ok(0);
        }

        let mut evicted = 0;
        if self.index.len() >= self.capacity {
            evicted = self.evict()?;
        }
        self.insert_new(key, value)?;
        Ok(evicted)
    }

    /// Move an entry from its tier to the `freq + 1` tier
    ///
    /// The target tier is reused only when the immediate successor holds
    /// exactly `freq + 1`; otherwise a fresh tier is spliced in after the
    /// current one. The vacated tier is dropped the moment it empties, so a
    /// second promotion to an already-populated frequency never creates a
    /// duplicate tier.
    fn promote(&mut self, idx: NodeIdx<K, V>) -> Result<()> {
        let tier_idx = self
            .list
            .node(idx)?
            .owner
            .ok_or_else(|| Error::CacheInvariant("promote of entry with no owning tier".into()))?;
        let (freq, next) = {
            let tier = self.list.tier(tier_idx)?;
            (tier.freq, tier.next)
        };

        let target = match next {
            Some(n) if self.list.tier(n)?.freq == freq + 1 => n,
            _ => self.list.insert_tier_after(tier_idx, freq + 1)?,
        };

        self.list.detach(idx)?;
        self.list.push_tail(target, idx)?;

        if self.list.tier(tier_idx)?.is_empty() {
            self.list.remove_tier(tier_idx)?;
        }
        Ok(())
    }

    /// Create a new entry at frequency 0
    fn insert_new(&mut self, key: K, value: V) -> Result<()> {
        let tier0 = match self.list.head_tier() {
            Some(head) if self.list.tier(head)?.freq == 0 => head,
            _ => self.list.push_front_tier(0)?,
        };
        let idx = self.list.alloc_node(key.clone(), value);
        self.index.insert(key, idx);
        self.list.push_tail(tier0, idx)
    }

    /// Remove up to `evict_batch` entries, lowest frequency first, FIFO
    /// within a tier. Stops early when the cache empties.
    fn evict(&mut self) -> Result<usize> {
        let mut removed = 0;
        while removed < self.evict_batch {
            let Some(head_tier) = self.list.head_tier() else {
                break;
            };
            match self.list.pop_head(head_tier)? {
                Some(idx) => {
                    let node = self.list.free_node(idx)?;
                    if self.index.remove(&node.key).is_none() {
                        return Err(Error::CacheInvariant(
                            "evicted entry missing from index".into(),
                        ));
                    }
                    removed += 1;
                    if self.list.tier(head_tier)?.is_empty() {
                        self.list.remove_tier(head_tier)?;
                    }
                }
                // An empty tier at the head would itself be an invariant
                // breach; unlink it rather than spin.
                None => self.list.remove_tier(head_tier)?,
            }
        }
        if removed > 0 {
            debug!(removed, remaining = self.index.len(), "evicted entries");
        }
        Ok(removed)
    }

    /// Explicit removal, returning the evicted value
    fn remove(&mut self, key: &K) -> Result<Option<V>> {
        let Some(idx) = self.index.remove(key) else {
            return Ok(None);
        };
        let tier = self.list.detach(idx)?;
        let node = self.list.free_node(idx)?;
        if self.list.tier(tier)?.is_empty() {
            self.list.remove_tier(tier)?;
        }
        Ok(Some(node.value))
    }

    /// Current access count of a key, if cached
    fn frequency(&self, key: &K) -> Result<Option<u64>> {
        let Some(&idx) = self.index.get(key) else {
            return Ok(None);
        };
        let tier_idx = self
            .list
            .node(idx)?
            .owner
            .ok_or_else(|| Error::CacheInvariant("indexed entry with no owning tier".into()))?;
        Ok(Some(self.list.tier(tier_idx)?.freq))
    }

    /// Validate list structure and index agreement
    fn check_invariants(&self) -> Result<()> {
        self.list.check_structure()?;
        if self.index.len() != self.list.node_count() {
            return Err(Error::CacheInvariant(
                "index and entry arena disagree on size".into(),
            ));
        }
        // Every tier is nonempty, so there can never be more tiers than keys
        if self.list.tier_count() > self.index.len() {
            return Err(Error::CacheInvariant("more tiers than entries".into()));
        }
        for (key, &idx) in &self.index {
            if self.list.node(idx)?.key != *key {
                return Err(Error::CacheInvariant("index points at wrong entry".into()));
            }
        }
        Ok(())
    }
}

/// Generic O(1) LFU cache with async fetch-on-miss
#[derive(Debug)]
pub struct LfuCache<K, V, L> {
    state: Mutex<LfuState<K, V>>,
    loader: L,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V, L> LfuCache<K, V, L>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
    L: Loader<K, V>,
{
    /// Create a cache with the given configuration and loader
    ///
    /// Fails for a zero capacity or a zero eviction batch, either of which
    /// would let inserts exceed the capacity bound. A batch larger than the
    /// capacity is accepted: eviction then simply empties the cache.
    pub fn new(config: CacheConfig, loader: L) -> Result<Self> {
        if config.capacity == 0 {
            return Err(Error::Config("capacity must be at least 1".into()));
        }
        if config.evict_batch == 0 {
            return Err(Error::Config("evict_batch must be at least 1".into()));
        }
        if config.evict_batch > config.capacity {
            warn!(
                evict_batch = config.evict_batch,
                capacity = config.capacity,
                "evict_batch exceeds capacity; eviction will empty the cache"
            );
        }

        Ok(Self {
            state: Mutex::new(LfuState::new(config.capacity, config.evict_batch)),
            loader,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Get a value, consulting the loader on miss
    ///
    /// A hit promotes the entry one frequency tier. On a miss the engine lock
    /// is released while the loader runs, the result is inserted at frequency
    /// 0, and the hit path is re-run so the fresh entry reaches frequency 1
    /// before it is returned; an entry is never observably left at 0.
    ///
    /// Concurrent misses for the same key may each invoke the loader; the
    /// later insert overwrites (last write wins) without structural damage.
    pub async fn get(&self, key: K) -> Result<V> {
        if let Some(value) = {
            let mut state = self.state.lock();
            state.get_promote(&key)?
        } {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        // Lock is not held across this await.
        let value = self.loader.load(key.clone()).await?;
        self.loads.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();
        let evicted = state.set(key.clone(), value)?;
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }
        match state.get_promote(&key)? {
            Some(value) => Ok(value),
            None => Err(Error::CacheInvariant("entry missing after insert".into())),
        }
    }

    /// Insert or overwrite a value without consulting the loader
    ///
    /// A new key lands at frequency 0 (evicting first if at capacity); an
    /// existing key is overwritten in place and promoted.
    pub fn insert(&self, key: K, value: V) -> Result<()> {
        let evicted = self.state.lock().set(key, value)?;
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Remove a key, returning its cached value
    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        self.state.lock().remove(key)
    }

    /// Check whether a key is currently cached (no promotion)
    pub fn contains(&self, key: &K) -> bool {
        self.state.lock().index.contains_key(key)
    }

    /// Current access count of a key, if cached
    pub fn frequency(&self, key: &K) -> Result<Option<u64>> {
        self.state.lock().frequency(key)
    }

    /// Number of distinct keys held
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of distinct keys
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Entries removed per eviction event
    pub fn evict_batch(&self) -> usize {
        self.state.lock().evict_batch
    }

    /// Snapshot of operation counters
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: state.index.len(),
            capacity: state.capacity,
        }
    }

    /// Validate internal structure, for tests and debugging
    pub fn check_invariants(&self) -> Result<()> {
        self.state.lock().check_invariants()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    /// Loader deriving the value from the key, counting invocations
    #[derive(Debug)]
    struct KeyLoader {
        loads: AtomicU64,
    }

    impl KeyLoader {
        fn new() -> Self {
            Self {
                loads: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl Loader<u64, String> for KeyLoader {
        async fn load(&self, key: u64) -> Result<String> {
            self.loads.fetch_add(1, Ordering::Relaxed);
            Ok(format!("value-{key}"))
        }
    }

    /// Loader that always fails
    struct FailingLoader;

    #[async_trait]
    impl Loader<u64, String> for FailingLoader {
        async fn load(&self, _key: u64) -> Result<String> {
            Err(Error::Store("store unavailable".into()))
        }
    }

    fn cache(capacity: usize, evict_batch: usize) -> LfuCache<u64, String, KeyLoader> {
        LfuCache::new(
            CacheConfig {
                capacity,
                evict_batch,
            },
            KeyLoader::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result: Result<LfuCache<u64, String, KeyLoader>> = LfuCache::new(
            CacheConfig {
                capacity: 0,
                evict_batch: 1,
            },
            KeyLoader::new(),
        );
        assert_matches!(result, Err(Error::Config(_)));

        let result: Result<LfuCache<u64, String, KeyLoader>> = LfuCache::new(
            CacheConfig {
                capacity: 10,
                evict_batch: 0,
            },
            KeyLoader::new(),
        );
        assert_matches!(result, Err(Error::Config(_)));
    }

    #[tokio::test]
    async fn test_miss_loads_and_promotes_to_one() {
        let cache = cache(10, 1);

        let value = cache.get(1).await.unwrap();
        assert_eq!(value, "value-1");

        // Fresh entries are never observably left at frequency 0
        assert_eq!(cache.frequency(&1).unwrap(), Some(1));
        assert_eq!(cache.loader.loads.load(Ordering::Relaxed), 1);
        cache.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn test_hit_does_not_reload() {
        let cache = cache(10, 1);

        cache.get(1).await.unwrap();
        cache.get(1).await.unwrap();
        cache.get(1).await.unwrap();

        assert_eq!(cache.loader.loads.load(Ordering::Relaxed), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_frequency_monotonicity() {
        let cache = cache(10, 1);

        let mut last = 0;
        for _ in 0..5 {
            cache.get(1).await.unwrap();
            let freq = cache.frequency(&1).unwrap().unwrap();
            assert!(freq >= last);
            last = freq;
        }
        assert_eq!(last, 5);
    }

    #[test]
    fn test_insert_lands_at_frequency_zero() {
        let cache = cache(10, 1);

        cache.insert(1, "one".into()).unwrap();
        assert_eq!(cache.frequency(&1).unwrap(), Some(0));
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_overwrite_promotes() {
        let cache = cache(10, 1);

        cache.insert(1, "one".into()).unwrap();
        cache.insert(1, "uno".into()).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.frequency(&1).unwrap(), Some(1));
        cache.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn test_capacity_bound_holds() {
        let cache = cache(5, 2);

        for key in 0..50 {
            cache.get(key).await.unwrap();
            assert!(cache.len() <= 5);
            cache.check_invariants().unwrap();
        }
        assert!(cache.stats().evictions > 0);
    }

    #[test]
    fn test_lfu_eviction_with_fifo_tie_break() {
        let cache = cache(2, 1);

        cache.insert(1, "a".into()).unwrap();
        cache.insert(2, "b".into()).unwrap();

        // Promote b to frequency 1; a stays at 0 and is the oldest there
        cache.insert(2, "b2".into()).unwrap();

        cache.insert(3, "c".into()).unwrap();
        assert!(!cache.contains(&1), "lowest-frequency oldest entry evicted");
        assert!(cache.contains(&2));
        assert!(cache.contains(&3));
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_fifo_tie_break_within_tier() {
        let cache = cache(3, 1);

        cache.insert(1, "a".into()).unwrap();
        cache.insert(2, "b".into()).unwrap();
        cache.insert(3, "c".into()).unwrap();

        // All at frequency 0; the earliest insert is the victim
        cache.insert(4, "d".into()).unwrap();
        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
        assert!(cache.contains(&3));
        assert!(cache.contains(&4));
    }

    #[tokio::test]
    async fn test_reference_eviction_scenario() {
        // capacity=3, evict_batch=1: a,b,c loaded; a read three more times;
        // b once; inserting d evicts c (lowest frequency, oldest there).
        let cache = cache(3, 1);

        cache.get(1).await.unwrap(); // a: freq 1
        cache.get(2).await.unwrap(); // b: freq 1
        cache.get(3).await.unwrap(); // c: freq 1

        cache.get(1).await.unwrap();
        cache.get(1).await.unwrap();
        cache.get(1).await.unwrap(); // a: freq 4
        cache.get(2).await.unwrap(); // b: freq 2

        cache.get(4).await.unwrap(); // d: miss, evicts c

        assert!(cache.contains(&1));
        assert!(cache.contains(&2));
        assert!(!cache.contains(&3));
        assert!(cache.contains(&4));
        assert_eq!(cache.frequency(&4).unwrap(), Some(1));
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_evict_batch_larger_than_capacity_empties_cache() {
        let cache = cache(3, 10);

        cache.insert(1, "a".into()).unwrap();
        cache.insert(2, "b".into()).unwrap();
        cache.insert(3, "c".into()).unwrap();

        // At capacity: the oversized batch evicts everything, then d lands
        cache.insert(4, "d".into()).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&4));
        assert_eq!(cache.stats().evictions, 3);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_batched_eviction_removes_batch_size() {
        let cache = cache(4, 2);

        for key in 1..=4 {
            cache.insert(key, format!("v{key}")).unwrap();
        }
        cache.insert(5, "v5".into()).unwrap();

        // Two evicted (keys 1 and 2), one inserted
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));
        assert!(cache.contains(&5));
    }

    #[tokio::test]
    async fn test_promotion_reuses_existing_tier() {
        let cache = cache(10, 1);

        // Both keys end up in the frequency-1 tier, then key 1 climbs to 2
        cache.get(1).await.unwrap();
        cache.get(2).await.unwrap();
        cache.get(1).await.unwrap();
        cache.get(2).await.unwrap();

        assert_eq!(cache.frequency(&1).unwrap(), Some(2));
        assert_eq!(cache.frequency(&2).unwrap(), Some(2));
        // check_structure rejects duplicate or empty tiers
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_remove() {
        let cache = cache(10, 1);

        cache.insert(1, "one".into()).unwrap();
        assert_eq!(cache.remove(&1).unwrap(), Some("one".into()));
        assert!(!cache.contains(&1));
        assert_eq!(cache.remove(&1).unwrap(), None);
        assert!(cache.is_empty());
        cache.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn test_loader_failure_propagates_and_caches_nothing() {
        let cache: LfuCache<u64, String, FailingLoader> = LfuCache::new(
            CacheConfig {
                capacity: 10,
                evict_batch: 1,
            },
            FailingLoader,
        )
        .unwrap();

        assert_matches!(cache.get(1).await, Err(Error::Store(_)));
        assert!(cache.is_empty());
        cache.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn test_stats_snapshot() {
        let cache = cache(2, 1);

        cache.get(1).await.unwrap();
        cache.get(1).await.unwrap();
        cache.get(2).await.unwrap();
        cache.get(3).await.unwrap(); // evicts

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 3);
        assert_eq!(stats.loads, 3);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.capacity, 2);
    }
}
