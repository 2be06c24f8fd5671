//! Slot Arena
//!
//! Backing storage for the intrusive frequency-list structure. Nodes are
//! addressed by stable typed indices instead of references, so the doubly
//! linked lists become `Option<Idx<_>>` fields with no aliasing or
//! dangling-pointer hazards, while detach/splice stay O(1).
//!
//! Freed slots are recycled through a free list, so a cache that has reached
//! capacity stops allocating.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Stable index into an [`Arena<T>`]
///
/// The marker type prevents an entry index from being used on the tier arena
/// and vice versa.
pub struct Idx<T> {
    raw: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Idx<T> {
    fn new(raw: usize) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Raw slot position (stable for the lifetime of the entry)
    pub fn index(self) -> usize {
        self.raw
    }
}

// Manual impls: derives would bound on `T`, but the index is Copy regardless
// of the element type.
impl<T> Clone for Idx<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Idx<T> {}

impl<T> PartialEq for Idx<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Idx<T> {}

impl<T> Hash for Idx<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Idx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Idx({})", self.raw)
    }
}

/// Slot arena with free-list reuse
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    free_list: Vec<usize>,
    len: usize,
}

impl<T> Arena<T> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Create an arena with reserved capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Insert a value, reusing a freed slot if one is available
    pub fn insert(&mut self, value: T) -> Idx<T> {
        let raw = if let Some(raw) = self.free_list.pop() {
            self.slots[raw] = Some(value);
            raw
        } else {
            self.slots.push(Some(value));
            self.slots.len() - 1
        };
        self.len += 1;
        Idx::new(raw)
    }

    /// Remove and return the value at `idx`
    pub fn remove(&mut self, idx: Idx<T>) -> Option<T> {
        let slot = self.slots.get_mut(idx.raw)?;
        let value = slot.take()?;
        self.free_list.push(idx.raw);
        self.len -= 1;
        Some(value)
    }

    /// Borrow the value at `idx`
    pub fn get(&self, idx: Idx<T>) -> Option<&T> {
        self.slots.get(idx.raw).and_then(|slot| slot.as_ref())
    }

    /// Mutably borrow the value at `idx`
    pub fn get_mut(&mut self, idx: Idx<T>) -> Option<&mut T> {
        self.slots.get_mut(idx.raw).and_then(|slot| slot.as_mut())
    }

    /// Check whether `idx` refers to a live slot
    pub fn contains(&self, idx: Idx<T>) -> bool {
        self.slots
            .get(idx.raw)
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Number of live slots
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the arena holds no values
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live slots
    pub fn iter(&self) -> impl Iterator<Item = (Idx<T>, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(raw, slot)| slot.as_ref().map(|value| (Idx::new(raw), value)))
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
