//! Index-addressed slot arena backing the causal chain.
//!
//! The chain needs stable addresses with O(1) splice and prune. Raw node
//! pointers would force ownership cycles; instead entries live in slots
//! addressed by [`SlotId`], with freed slots recycled through a free list.
//! A `SlotId` stays valid until its entry is removed.

use std::ops::{Index, IndexMut};

/// Stable address of an occupied arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> Arena<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `value`, reusing a freed slot when one is available.
    pub fn insert(&mut self, value: T) -> SlotId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(value);
                SlotId(index)
            }
            None => {
                self.slots.push(Some(value));
                SlotId(self.slots.len() - 1)
            }
        }
    }

    /// Free the slot, returning its value. `None` when already vacant.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let value = self.slots.get_mut(id.0)?.take();
        if value.is_some() {
            self.free.push(id.0);
        }
        value
    }

    #[must_use]
    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.slots.get(id.0)?.as_ref()
    }

    #[must_use]
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.slots.get_mut(id.0)?.as_mut()
    }

    #[must_use]
    pub fn contains(&self, id: SlotId) -> bool {
        self.get(id).is_some()
    }
}

impl<T> Index<SlotId> for Arena<T> {
    type Output = T;

    /// Panics on a vacant slot; only index with ids the caller knows live.
    fn index(&self, id: SlotId) -> &T {
        self.get(id).expect("indexed a vacant arena slot")
    }
}

impl<T> IndexMut<SlotId> for Arena<T> {
    fn index_mut(&mut self, id: SlotId) -> &mut T {
        self.get_mut(id).expect("indexed a vacant arena slot")
    }
}
