//! Raw record handles.
//!
//! A [`RecordHandle`] names one allocation record in one heap. It is
//! generation-scoped: releasing the record bumps the slot's generation, so
//! a stale handle is detected in O(1) even after the slot is reused by a
//! newer record.

use std::fmt;

use keel_core::HeapId;

/// Opaque location of an allocation record.
///
/// Handles are `Copy` and cheap to store in game objects. They carry the
/// issuing heap's id; presenting a handle to any other heap fails with
/// [`HeapError::InvalidHandle`](crate::HeapError::InvalidHandle).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct RecordHandle {
    /// The heap that issued this handle.
    pub(crate) heap: HeapId,
    /// Slot index within the heap's slot table.
    pub(crate) slot: u32,
    /// Slot generation when this record was allocated.
    pub(crate) generation: u32,
}

impl RecordHandle {
    pub(crate) fn new(heap: HeapId, slot: u32, generation: u32) -> Self {
        Self {
            heap,
            slot,
            generation,
        }
    }

    /// The id of the heap that issued this handle.
    pub fn heap_id(&self) -> HeapId {
        self.heap
    }

    /// The slot generation this handle belongs to.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RecordHandle(heap={}, slot={}, gen={})",
            self.heap, self.slot, self.generation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let heap = HeapId::next();
        let h = RecordHandle::new(heap, 3, 42);
        assert_eq!(h.heap_id(), heap);
        assert_eq!(h.generation(), 42);
        assert_eq!(h.slot, 3);
    }

    #[test]
    fn handles_from_different_heaps_differ() {
        let a = RecordHandle::new(HeapId::next(), 0, 0);
        let b = RecordHandle::new(HeapId::next(), 0, 0);
        assert_ne!(a, b);
    }
}
