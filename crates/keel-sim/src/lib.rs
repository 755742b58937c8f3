//! Frame clock, entity behaviors and weapons built on the Keel heap.
//!
//! A [`Scenario`] owns a [`SimHeap`](keel_heap::SimHeap) and drives it one
//! frame at a time:
//!
//! ```text
//! step()
//! ├── FrameClock::advance          (frame += 1, stored in the heap)
//! └── for entity in roster order
//!     └── for behavior in registration order
//!         └── if behavior.affects(entity.kind()): update_state(ctx, entity)
//! ```
//!
//! Every persistent value (health, build progress, launch timestamps,
//! behavior counters, the frame itself) is a heap field, so
//! [`Scenario::save`], [`Scenario::restore`] and
//! [`Scenario::snapshot_hash`] cover the whole simulation.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod behavior;
pub mod clock;
pub mod config;
pub mod derived;
pub mod entity;
pub mod error;
pub mod scenario;
pub mod weapon;

pub use behavior::{
    Behavior, ConstructionBehavior, IdleBehavior, StepContext, StepReport, ToolBehavior,
};
pub use clock::FrameClock;
pub use config::ScenarioConfig;
pub use derived::{MapQuery, TerrainRecord, TerrainSummary, TerrainWorker};
pub use entity::{BaseArgs, Entity, EntityBase, EntityKind, Structure, StructureSpec, Unit, UnitSpec};
pub use error::{ConfigError, SimError};
pub use scenario::Scenario;
pub use weapon::{
    ConstructionTool, Cooldown, Effect, RepairTool, Tool, ToolSpec, Weapon, WeaponState,
};
