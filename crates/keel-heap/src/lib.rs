//! Deterministic, serializable simulation heap for Keel.
//!
//! Every piece of simulation state that must be identical across lockstep
//! peers lives in a [`SimHeap`] as an [`AllocationRecord`]: an owner, a
//! name, a type tag and value(s). Game objects hold typed, `Copy` field
//! handles ([`ScalarField`], [`ArrayField`]) instead of the values
//! themselves, so the whole simulation state can be serialized, hashed and
//! restored in one place.
//!
//! # Architecture
//!
//! ```text
//! SimHeap
//! ├── slots: generational Slot[] ──► AllocationRecord
//! ├── index: IndexMap<(owner, name), slot>   (insertion order = snapshot order)
//! └── objects: IndexMap<ObjectId, phase + slots>
//!
//! HeapObject::construct(&mut Constructor, args)
//!     base fields first, then derived fields, all under one ObjectId
//! ```
//!
//! Snapshot bytes are described in [`codec`]; [`hash`] and [`compare`]
//! support desync detection.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod compare;
pub mod config;
pub mod error;
pub mod field;
pub mod handle;
pub mod hash;
pub mod heap;
pub mod object;
pub mod record;

pub use compare::{compare_snapshots, DivergenceKind, DivergenceReport, RecordDivergence};
pub use config::HeapConfig;
pub use error::HeapError;
pub use field::{ArrayField, ScalarField};
pub use handle::RecordHandle;
pub use hash::snapshot_hash;
pub use heap::SimHeap;
pub use object::{Constructor, HeapObject};
pub use record::AllocationRecord;
