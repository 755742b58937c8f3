//! Keel: a deterministic simulation heap for lockstep strategy games.
//!
//! This facade re-exports the public API of the Keel sub-crates. Most
//! users only need `keel` as a dependency and [`prelude`] in scope.
//!
//! # Quick start
//!
//! ```rust
//! use keel::prelude::*;
//!
//! let mut scenario = Scenario::with_default_behaviors(ScenarioConfig::default()).unwrap();
//! let builder = scenario
//!     .spawn_unit(UnitSpec {
//!         faction: 0,
//!         position: Vec2Fixed::from_ints(0, 0),
//!         max_health: 40,
//!         tool: Some(ToolSpec::Construction {
//!             cooldown: 1,
//!             range: Fixed::from_num(2),
//!             build_rate: 10,
//!         }),
//!     })
//!     .unwrap();
//! let depot = scenario
//!     .spawn_structure(StructureSpec {
//!         faction: 0,
//!         position: Vec2Fixed::from_ints(1, 0),
//!         max_health: 300,
//!         build_cost: 30,
//!         builder: Some(builder),
//!     })
//!     .unwrap();
//!
//! let saved = scenario.save();
//! let report = scenario.run(3).unwrap().unwrap();
//! assert_eq!(report.completed, [depot]);
//!
//! scenario.restore(&saved).unwrap();
//! assert_eq!(scenario.current_frame().unwrap(), FrameId(0));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `keel-core` | IDs, fixed-point math, field value types |
//! | [`heap`] | `keel-heap` | The simulation heap, typed fields, snapshots |
//! | [`sim`] | `keel-sim` | Frame clock, entities, behaviors, weapons, scenarios |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// IDs, fixed-point math and field value types (`keel-core`).
pub use keel_core as types;

/// The simulation heap (`keel-heap`).
///
/// [`heap::SimHeap`] owns every allocation record; [`heap::HeapObject`]
/// types register their fields through a [`heap::Constructor`].
pub use keel_heap as heap;

/// Simulation layer (`keel-sim`).
///
/// [`sim::Scenario`] drives the [`sim::FrameClock`] and dispatches
/// [`sim::Behavior`]s over the entity roster.
pub use keel_sim as sim;

/// Common imports for typical Keel usage.
pub mod prelude {
    // Core types
    pub use keel_core::{Fixed, FrameId, ObjectId, Value, ValueType, Vec2Fixed};

    // Heap
    pub use keel_heap::{
        ArrayField, Constructor, HeapConfig, HeapObject, ScalarField, SimHeap,
    };

    // Errors
    pub use keel_heap::HeapError;
    pub use keel_sim::{ConfigError, SimError};

    // Simulation
    pub use keel_sim::{
        Behavior, Effect, Entity, EntityKind, FrameClock, Scenario, ScenarioConfig, StepContext,
        StepReport, StructureSpec, Tool, ToolSpec, UnitSpec, Weapon, WeaponState,
    };
}
