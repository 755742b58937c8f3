//! Strongly-typed identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one heap-backed object within a single heap.
///
/// Object ids are handed out sequentially by the owning heap starting at
/// 1 and are never reused within that heap's lifetime. They are the value
/// stored in reference-typed fields, so they are also the unit of
/// serialization for object graphs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for ObjectId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Counter for unique [`HeapId`] allocation.
static HEAP_INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for a simulation heap.
///
/// Allocated from a monotonic atomic counter via [`HeapId::next`]. Every
/// handle records the id of the heap that issued it, so a handle presented
/// to a different heap is rejected instead of silently aliasing a record
/// that happens to sit in the same slot.
///
/// The id is process-local and never serialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u64);

impl HeapId {
    /// Allocate a fresh, unique heap id. Thread-safe.
    pub fn next() -> Self {
        Self(HEAP_INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing frame counter.
///
/// Incremented exactly once each time the scenario advances one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

impl FrameId {
    /// Frames elapsed since `earlier`, or `None` if `earlier` is in the future.
    pub fn since(self, earlier: FrameId) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FrameId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_ids_are_unique() {
        let a = HeapId::next();
        let b = HeapId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn frame_since() {
        assert_eq!(FrameId(15).since(FrameId(10)), Some(5));
        assert_eq!(FrameId(10).since(FrameId(10)), Some(0));
        assert_eq!(FrameId(9).since(FrameId(10)), None);
    }

    #[test]
    fn object_id_display() {
        assert_eq!(ObjectId(7).to_string(), "#7");
    }
}
