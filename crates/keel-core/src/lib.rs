//! Core types for the Keel deterministic simulation heap.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental vocabulary used throughout the Keel workspace:
//! object and heap identifiers, the frame index, the fixed-point
//! numeric type, and the value-type tags that describe every field
//! stored in a [`SimHeap`](../keel_heap/struct.SimHeap.html).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod id;
pub mod math;
pub mod value;

pub use id::{FrameId, HeapId, ObjectId};
pub use math::{fixed_sqrt, Fixed, Vec2Fixed};
pub use value::{FieldType, FieldValue, Value, ValueType};
