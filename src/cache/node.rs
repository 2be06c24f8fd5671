//! Frequency List Structure
//!
//! The linked structure behind the LFU engine: a global list of frequency
//! tiers in strictly ascending frequency order, where each tier owns a
//! doubly linked sub-list of the cache entries currently at that access
//! count. Entries are appended at the tail on promotion and evicted from the
//! head, giving FIFO tie-break within a tier.
//!
//! All links are arena indices (see [`super::arena`]); a raw pointer never
//! appears. Every primitive here is O(1).
//!
//! # Invariants
//!
//! - An entry is linked into at most one tier's sub-list at a time
//! - A tier with an empty sub-list is unlinked immediately, never kept
//! - No two tiers share a frequency; frequencies ascend along `next`

use crate::cache::arena::{Arena, Idx};
use crate::error::{Error, Result};

/// Index of a cache entry node
pub(crate) type NodeIdx<K, V> = Idx<CacheNode<K, V>>;

/// Index of a frequency tier
pub(crate) type TierIdx<K, V> = Idx<FreqNode<K, V>>;

/// A cached entry, linked into exactly one frequency tier
#[derive(Debug)]
pub(crate) struct CacheNode<K, V> {
    /// Key this entry is indexed under
    pub key: K,
    /// Cached payload
    pub value: V,
    /// Tier currently holding this entry; `None` only mid-splice
    pub owner: Option<TierIdx<K, V>>,
    /// Previous entry within the owner tier's sub-list
    pub prev: Option<NodeIdx<K, V>>,
    /// Next entry within the owner tier's sub-list
    pub next: Option<NodeIdx<K, V>>,
}

impl<K, V> CacheNode<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Self {
            key,
            value,
            owner: None,
            prev: None,
            next: None,
        }
    }
}

/// All cache entries accessed exactly `freq` times
#[derive(Debug)]
pub(crate) struct FreqNode<K, V> {
    /// Access count represented by this tier
    pub freq: u64,
    /// Previous tier in the global ascending-frequency list
    pub prev: Option<TierIdx<K, V>>,
    /// Next tier in the global ascending-frequency list
    pub next: Option<TierIdx<K, V>>,
    /// Oldest-promoted entry at this frequency (eviction candidate)
    pub head: Option<NodeIdx<K, V>>,
    /// Most-recently-promoted entry at this frequency
    pub tail: Option<NodeIdx<K, V>>,
}

impl<K, V> FreqNode<K, V> {
    pub fn new(freq: u64) -> Self {
        Self {
            freq,
            prev: None,
            next: None,
            head: None,
            tail: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// The two arenas plus the lowest-frequency tier pointer
#[derive(Debug)]
pub(crate) struct FreqList<K, V> {
    nodes: Arena<CacheNode<K, V>>,
    tiers: Arena<FreqNode<K, V>>,
    /// Tier with the smallest frequency, or `None` when the cache is empty
    head: Option<TierIdx<K, V>>,
}

impl<K, V> FreqList<K, V> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Arena::with_capacity(capacity),
            tiers: Arena::new(),
            head: None,
        }
    }

    pub fn head_tier(&self) -> Option<TierIdx<K, V>> {
        self.head
    }

    pub fn node(&self, idx: NodeIdx<K, V>) -> Result<&CacheNode<K, V>> {
        self.nodes
            .get(idx)
            .ok_or_else(|| Error::CacheInvariant("entry index not in arena".into()))
    }

    pub fn node_mut(&mut self, idx: NodeIdx<K, V>) -> Result<&mut CacheNode<K, V>> {
        self.nodes
            .get_mut(idx)
            .ok_or_else(|| Error::CacheInvariant("entry index not in arena".into()))
    }

    pub fn tier(&self, idx: TierIdx<K, V>) -> Result<&FreqNode<K, V>> {
        self.tiers
            .get(idx)
            .ok_or_else(|| Error::CacheInvariant("tier index not in arena".into()))
    }

    fn tier_mut(&mut self, idx: TierIdx<K, V>) -> Result<&mut FreqNode<K, V>> {
        self.tiers
            .get_mut(idx)
            .ok_or_else(|| Error::CacheInvariant("tier index not in arena".into()))
    }

    /// Allocate an entry node, not yet linked anywhere
    pub fn alloc_node(&mut self, key: K, value: V) -> NodeIdx<K, V> {
        self.nodes.insert(CacheNode::new(key, value))
    }

    /// Free a detached entry node, returning its contents
    pub fn free_node(&mut self, idx: NodeIdx<K, V>) -> Result<CacheNode<K, V>> {
        self.nodes
            .remove(idx)
            .ok_or_else(|| Error::CacheInvariant("freeing entry not in arena".into()))
    }

    /// Unlink an entry from its owning tier's sub-list
    ///
    /// Returns the former owner so the caller can drop the tier if it is now
    /// empty. Detaching an entry with no owner is an internal bug (a double
    /// detach) and fails loudly.
    pub fn detach(&mut self, idx: NodeIdx<K, V>) -> Result<TierIdx<K, V>> {
        let (owner, prev, next) = {
            let node = self.node(idx)?;
            (node.owner, node.prev, node.next)
        };
        let tier_idx = owner
            .ok_or_else(|| Error::CacheInvariant("detach of entry with no owning tier".into()))?;

        match prev {
            Some(p) => self.node_mut(p)?.next = next,
            None => self.tier_mut(tier_idx)?.head = next,
        }
        match next {
            Some(n) => self.node_mut(n)?.prev = prev,
            None => self.tier_mut(tier_idx)?.tail = prev,
        }

        let node = self.node_mut(idx)?;
        node.owner = None;
        node.prev = None;
        node.next = None;
        Ok(tier_idx)
    }

    /// Append a detached entry at the tail of a tier's sub-list
    pub fn push_tail(&mut self, tier_idx: TierIdx<K, V>, idx: NodeIdx<K, V>) -> Result<()> {
        let old_tail = self.tier(tier_idx)?.tail;

        {
            let node = self.node_mut(idx)?;
            node.owner = Some(tier_idx);
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail {
            Some(t) => self.node_mut(t)?.next = Some(idx),
            None => self.tier_mut(tier_idx)?.head = Some(idx),
        }
        self.tier_mut(tier_idx)?.tail = Some(idx);
        Ok(())
    }

    /// Detach and return the oldest entry of a tier, if any
    pub fn pop_head(&mut self, tier_idx: TierIdx<K, V>) -> Result<Option<NodeIdx<K, V>>> {
        let head = self.tier(tier_idx)?.head;
        if let Some(idx) = head {
            self.detach(idx)?;
        }
        Ok(head)
    }

    /// Insert a new empty tier immediately after an existing one
    pub fn insert_tier_after(&mut self, after: TierIdx<K, V>, freq: u64) -> Result<TierIdx<K, V>> {
        let after_next = self.tier(after)?.next;
        let idx = self.tiers.insert(FreqNode::new(freq));

        {
            let tier = self.tier_mut(idx)?;
            tier.prev = Some(after);
            tier.next = after_next;
        }
        if let Some(next) = after_next {
            self.tier_mut(next)?.prev = Some(idx);
        }
        self.tier_mut(after)?.next = Some(idx);
        Ok(idx)
    }

    /// Insert a new empty tier at the front of the global list
    pub fn push_front_tier(&mut self, freq: u64) -> Result<TierIdx<K, V>> {
        let old_head = self.head;
        let idx = self.tiers.insert(FreqNode::new(freq));

        self.tier_mut(idx)?.next = old_head;
        if let Some(head) = old_head {
            self.tier_mut(head)?.prev = Some(idx);
        }
        self.head = Some(idx);
        Ok(idx)
    }

    /// Unlink and free an empty tier, advancing the head pointer if needed
    pub fn remove_tier(&mut self, tier_idx: TierIdx<K, V>) -> Result<()> {
        let (prev, next) = {
            let tier = self.tier(tier_idx)?;
            if !tier.is_empty() {
                return Err(Error::CacheInvariant(
                    "removing tier with live entries".into(),
                ));
            }
            (tier.prev, tier.next)
        };

        if let Some(p) = prev {
            self.tier_mut(p)?.next = next;
        }
        if let Some(n) = next {
            self.tier_mut(n)?.prev = prev;
        }
        if self.head == Some(tier_idx) {
            self.head = next;
        }
        self.tiers.remove(tier_idx);
        Ok(())
    }

    /// Number of live entry nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of live tiers
    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Validate structural invariants, for tests and debugging
    ///
    /// Walks the full tier list and each sub-list, checking ascending
    /// frequencies, no empty tiers, link symmetry, and owner consistency.
    pub fn check_structure(&self) -> Result<()> {
        let mut seen_tiers = 0usize;
        let mut seen_nodes = 0usize;
        let mut prev_tier: Option<TierIdx<K, V>> = None;
        let mut prev_freq: Option<u64> = None;
        let mut cursor = self.head;

        while let Some(tier_idx) = cursor {
            let tier = self.tier(tier_idx)?;
            seen_tiers += 1;

            if tier.prev != prev_tier {
                return Err(Error::CacheInvariant("tier back-link mismatch".into()));
            }
            if let Some(freq) = prev_freq {
                if tier.freq <= freq {
                    return Err(Error::CacheInvariant(
                        "tier frequencies not strictly ascending".into(),
                    ));
                }
            }
            if tier.is_empty() {
                return Err(Error::CacheInvariant("empty tier left in list".into()));
            }

            let mut prev_node: Option<NodeIdx<K, V>> = None;
            let mut node_cursor = tier.head;
            while let Some(node_idx) = node_cursor {
                let node = self.node(node_idx)?;
                seen_nodes += 1;
                if node.owner != Some(tier_idx) {
                    return Err(Error::CacheInvariant("entry owner mismatch".into()));
                }
                if node.prev != prev_node {
                    return Err(Error::CacheInvariant("entry back-link mismatch".into()));
                }
                prev_node = node_cursor;
                node_cursor = node.next;
            }
            if tier.tail != prev_node {
                return Err(Error::CacheInvariant("tier tail mismatch".into()));
            }

            prev_freq = Some(tier.freq);
            prev_tier = cursor;
            cursor = tier.next;
        }

        if seen_tiers != self.tiers.len() {
            return Err(Error::CacheInvariant("unreachable tier in arena".into()));
        }
        if seen_nodes != self.nodes.len() {
            return Err(Error::CacheInvariant("unreachable entry in arena".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
