//! The frame clock.
//!
//! The current frame index is a heap field, so it is serialized, hashed
//! and restored together with the rest of the simulation state.

use keel_core::{FrameId, ObjectId};
use keel_heap::{Constructor, HeapError, HeapObject, ScalarField, SimHeap};

use crate::error::SimError;

/// Monotonic frame counter owned by a scenario.
#[derive(Clone, Copy, Debug)]
pub struct FrameClock {
    id: ObjectId,
    frame: ScalarField<u64>,
}

impl FrameClock {
    /// Largest representable frame.
    ///
    /// Frames must fit in the signed launch timestamps weapons store.
    pub const MAX_FRAME: FrameId = FrameId(i64::MAX as u64);

    /// The current frame.
    pub fn current_frame(&self, heap: &SimHeap) -> Result<FrameId, HeapError> {
        self.frame.get(heap).map(FrameId)
    }

    /// Advance by exactly one frame and return the new frame.
    ///
    /// Fails with [`SimError::ClockOverflow`] at [`MAX_FRAME`](Self::MAX_FRAME),
    /// leaving the clock unchanged.
    pub fn advance(&self, heap: &mut SimHeap) -> Result<FrameId, SimError> {
        let now = self.current_frame(heap)?;
        if now >= Self::MAX_FRAME {
            return Err(SimError::ClockOverflow { frame: now });
        }
        let next = FrameId(now.0 + 1);
        self.frame.set(heap, next.0)?;
        Ok(next)
    }
}

impl HeapObject for FrameClock {
    type Args = FrameId;

    fn construct(ctor: &mut Constructor<'_>, start: FrameId) -> Result<Self, HeapError> {
        Ok(Self {
            id: ctor.owner(),
            frame: ctor.field_with("frame", start.0)?,
        })
    }

    fn object_id(&self) -> ObjectId {
        self.id
    }
}
