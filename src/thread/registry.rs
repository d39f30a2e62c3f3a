//! Fixed-capacity, index-addressed thread table.

use super::{ThreadId, ThreadRecord};
use crate::errors::SpawnError;

/// Thread table with room for `N` records.
///
/// Slots are filled in registration order and never vacated; the index of a
/// slot is the thread's [`ThreadId`].
pub struct ThreadRegistry<const N: usize> {
    slots: [Option<ThreadRecord>; N],
    len: usize,
}

impl<const N: usize> ThreadRegistry<N> {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            slots: [None; N],
            len: 0,
        }
    }

    /// Number of slots.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= N
    }

    /// Append a record, returning its ID.
    ///
    /// Fails without touching any slot when the registry is full.
    pub fn push(&mut self, record: ThreadRecord) -> Result<ThreadId, SpawnError> {
        if self.is_full() {
            return Err(SpawnError::RegistryFull);
        }
        let id = ThreadId::new(self.len);
        self.slots[self.len] = Some(record);
        self.len += 1;
        Ok(id)
    }

    pub fn get(&self, id: ThreadId) -> Option<&ThreadRecord> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut ThreadRecord> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Forget every record.
    pub fn clear(&mut self) {
        self.slots = [None; N];
        self.len = 0;
    }

    /// Populated records in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ThreadId, &ThreadRecord)> {
        self.slots[..self.len]
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|record| (ThreadId::new(index), record)))
    }
}

impl<const N: usize> Default for ThreadRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}
