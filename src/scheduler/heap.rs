//! Indexed binary max-heap.
//!
//! Every inserted element gets a [`Handle`] that stays valid until the element
//! leaves the heap. A side table maps handles to slots, so an arbitrary element
//! can be removed in O(log n) without scanning. Handles are never reused, which
//! makes a stale handle (one whose element was already removed) harmless: it is
//! simply not found.
//!
//! The heap is not synchronized; the scheduler serializes access through its
//! state lock.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scheduler::priority::Rank;

/// Initial number of slots reserved by [`IndexedHeap::new`].
pub const DEFAULT_CAPACITY: usize = 20;

/// Stable back-reference to an element stored in an [`IndexedHeap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u64);

impl Handle {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Slot<P, T> {
    handle: Handle,
    rank: Rank<P>,
    item: T,
}

/// Array-backed max-heap with handle-based removal.
///
/// Invariants:
/// - for every slot `i > 0`, `rank(slots[(i - 1) / 2]) >= rank(slots[i])`
/// - `positions[slots[i].handle] == i` for every occupied slot
/// - a handle absent from `positions` is not in the heap
#[derive(Debug)]
pub struct IndexedHeap<P, T> {
    slots: Vec<Slot<P, T>>,
    positions: HashMap<Handle, usize>,
    next_handle: u64,
}

impl<P: Ord, T> IndexedHeap<P, T> {
    /// Create an empty heap with [`DEFAULT_CAPACITY`] reserved slots.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty heap with `capacity` reserved slots.
    ///
    /// The capacity is only a hint; the heap grows past it on demand.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
            next_handle: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_not_empty(&self) -> bool {
        !self.is_empty()
    }

    /// Check whether `handle` still refers to an element of this heap.
    pub fn contains(&self, handle: Handle) -> bool {
        self.locate(handle).is_some()
    }

    /// Zero-based slot currently occupied by `handle`, `None` once removed.
    pub fn position(&self, handle: Handle) -> Option<usize> {
        self.locate(handle)
    }

    /// Get the element behind `handle`.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.locate(handle).map(|index| &self.slots[index].item)
    }

    /// Add an element and return its handle.
    pub fn insert(&mut self, priority: P, item: T) -> Handle {
        self.insert_with(priority, |_| item)
    }

    /// Add an element built from its own handle.
    ///
    /// Useful when the element needs to know its identity (e.g. for logging or
    /// later lookups by the owner).
    pub fn insert_with<F>(&mut self, priority: P, make: F) -> Handle
    where
        F: FnOnce(Handle) -> T,
    {
        let handle = Handle(self.next_handle);
        self.next_handle += 1;

        let index = self.slots.len();
        self.slots.push(Slot {
            handle,
            rank: Rank::new(priority, handle.0),
            item: make(handle),
        });
        self.positions.insert(handle, index);
        self.swim(index);

        handle
    }

    /// Get the element with the highest rank without removing it.
    pub fn peek_max(&self) -> Option<&T> {
        self.slots.first().map(|slot| &slot.item)
    }

    /// Priority of the element at the root.
    pub fn peek_max_priority(&self) -> Option<&P> {
        self.slots.first().map(|slot| slot.rank.priority())
    }

    /// Remove and return the element with the highest rank.
    pub fn extract_max(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    /// Remove the element behind `handle`.
    ///
    /// Returns `None` for stale or foreign handles and leaves the heap untouched.
    pub fn delete(&mut self, handle: Handle) -> Option<T> {
        let index = self.locate(handle)?;
        Some(self.remove_at(index))
    }

    /// Empty the heap, returning every element in slot order.
    ///
    /// The first element is the former maximum; the rest are in no particular order.
    pub fn delete_all(&mut self) -> Vec<T> {
        self.positions.clear();
        self.slots.drain(..).map(|slot| slot.item).collect()
    }

    /// Iterate over the stored elements in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().map(|slot| &slot.item)
    }

    fn locate(&self, handle: Handle) -> Option<usize> {
        let index = *self.positions.get(&handle)?;
        match self.slots.get(index) {
            Some(slot) if slot.handle == handle => Some(index),
            _ => None,
        }
    }

    fn remove_at(&mut self, index: usize) -> T {
        let removed = self.slots.swap_remove(index);
        self.positions.remove(&removed.handle);

        if index < self.slots.len() {
            self.positions.insert(self.slots[index].handle, index);
            self.resift(index);
        }

        removed.item
    }

    /// Restore order after the element at `index` was replaced.
    fn resift(&mut self, index: usize) {
        if index > 0 && self.outranks(index, parent(index)) {
            self.swim(index);
        } else {
            self.sink(index);
        }
    }

    fn swim(&mut self, mut index: usize) {
        while index > 0 {
            let up = parent(index);
            if !self.outranks(index, up) {
                break;
            }
            self.swap(index, up);
            index = up;
        }
    }

    fn sink(&mut self, mut index: usize) {
        let len = self.slots.len();
        loop {
            let left = 2 * index + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.outranks(right, left) { right } else { left };
            if !self.outranks(child, index) {
                break;
            }
            self.swap(index, child);
            index = child;
        }
    }

    fn outranks(&self, a: usize, b: usize) -> bool {
        self.slots[a].rank > self.slots[b].rank
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.slots.swap(a, b);
        self.positions.insert(self.slots[a].handle, a);
        self.positions.insert(self.slots[b].handle, b);
    }

    #[cfg(test)]
    fn assert_invariants(&self) {
        assert_eq!(self.positions.len(), self.slots.len(), "side table size drifted");
        for (index, slot) in self.slots.iter().enumerate() {
            assert_eq!(self.positions.get(&slot.handle), Some(&index), "stale position for {}", slot.handle);
            if index > 0 {
                assert!(
                    self.slots[parent(index)].rank >= slot.rank,
                    "heap order violated at slot {}",
                    index
                );
            }
        }
    }
}

impl<P: Ord, T> Default for IndexedHeap<P, T> {
    fn default() -> Self {
        Self::new()
    }
}

fn parent(index: usize) -> usize {
    (index - 1) / 2
}
