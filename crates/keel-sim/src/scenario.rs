//! The scenario driver.
//!
//! [`Scenario`] owns one [`SimHeap`], the [`FrameClock`], the ordered
//! entity roster and the behavior list. Each [`step()`](Scenario::step)
//! advances the clock by one frame, then dispatches behaviors.
//!
//! # Failure model
//!
//! A step that fails after the clock has advanced may leave the heap
//! half-updated. The scenario then enters the corrupted state: every
//! further `step` returns [`SimError::Corrupted`] until a successful
//! [`restore()`](Scenario::restore). Failures before any mutation (clock
//! overflow, entity limit) leave the scenario usable.

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use keel_core::{FrameId, ObjectId};
use keel_heap::{HeapObject, SimHeap};

use crate::behavior::{
    self, Behavior, ConstructionBehavior, IdleBehavior, StepContext, StepReport, ToolBehavior,
};
use crate::clock::FrameClock;
use crate::config::ScenarioConfig;
use crate::derived::{TerrainRecord, TerrainSummary};
use crate::entity::{BaseArgs, Entity, Structure, StructureSpec, Unit, UnitSpec};
use crate::error::SimError;
use crate::weapon::Tool;

/// A running simulation.
pub struct Scenario {
    config: ScenarioConfig,
    heap: SimHeap,
    clock: FrameClock,
    entities: IndexMap<ObjectId, Entity>,
    behaviors: Vec<Box<dyn Behavior>>,
    terrain: Option<TerrainRecord>,
    corrupted: Option<FrameId>,
}

impl Scenario {
    /// Create an empty scenario with no behaviors.
    pub fn new(config: ScenarioConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mut heap = SimHeap::new(config.heap.clone())?;
        let clock = heap.construct::<FrameClock>(FrameId(config.start_frame))?;
        Ok(Self {
            config,
            heap,
            clock,
            entities: IndexMap::new(),
            behaviors: Vec::new(),
            terrain: None,
            corrupted: None,
        })
    }

    /// Create a scenario with the standard behaviors, in dispatch order:
    /// [`ToolBehavior`], [`ConstructionBehavior`], [`IdleBehavior`].
    pub fn with_default_behaviors(config: ScenarioConfig) -> Result<Self, SimError> {
        let mut scenario = Self::new(config)?;
        scenario.install::<ToolBehavior>(())?;
        scenario.install::<ConstructionBehavior>(())?;
        scenario.add_behavior(IdleBehavior);
        Ok(scenario)
    }

    // ── Behaviors ───────────────────────────────────────────────

    /// Construct a heap-backed behavior and append it to the dispatch
    /// order. Returns its heap owner id.
    pub fn install<B>(&mut self, args: B::Args) -> Result<ObjectId, SimError>
    where
        B: Behavior + HeapObject + 'static,
    {
        let behavior: B = self.heap.construct(args)?;
        let id = behavior.object_id();
        debug!(behavior = behavior.name(), %id, "installed behavior");
        self.behaviors.push(Box::new(behavior));
        Ok(id)
    }

    /// Append a stateless behavior to the dispatch order.
    pub fn add_behavior(&mut self, behavior: impl Behavior + 'static) {
        debug!(behavior = behavior.name(), "added behavior");
        self.behaviors.push(Box::new(behavior));
    }

    /// Behavior names in dispatch order.
    pub fn behavior_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.behaviors.iter().map(|b| b.name())
    }

    // ── Roster ──────────────────────────────────────────────────

    /// Spawn a unit, equipping its tool if the spec names one.
    pub fn spawn_unit(&mut self, spec: UnitSpec) -> Result<ObjectId, SimError> {
        self.check_capacity()?;
        let mut unit: Unit = self.heap.construct(BaseArgs {
            faction: spec.faction,
            position: spec.position,
            max_health: spec.max_health,
            health: spec.max_health,
        })?;
        let id = unit.object_id();
        if let Some(tool_spec) = spec.tool {
            let equipped = Tool::build(&mut self.heap, id, tool_spec)
                .and_then(|tool| unit.equip(&mut self.heap, tool).map(|_| ()));
            if let Err(e) = equipped {
                Entity::Unit(unit).destroy(&mut self.heap)?;
                return Err(e.into());
            }
        }
        debug!(%id, "spawned unit");
        self.entities.insert(id, Entity::Unit(unit));
        Ok(id)
    }

    /// Spawn a structure.
    pub fn spawn_structure(&mut self, spec: StructureSpec) -> Result<ObjectId, SimError> {
        self.check_capacity()?;
        let structure: Structure = self.heap.construct(spec)?;
        let id = structure.object_id();
        debug!(%id, "spawned structure");
        self.entities.insert(id, Entity::Structure(structure));
        Ok(id)
    }

    /// Remove an entity, releasing it and its tool from the heap.
    ///
    /// Other entities' references to it are left as they are and simply
    /// no longer resolve.
    pub fn despawn(&mut self, id: ObjectId) -> Result<(), SimError> {
        let entity = self
            .entities
            .shift_remove(&id)
            .ok_or(SimError::UnknownEntity { id })?;
        let freed = entity.destroy(&mut self.heap)?;
        debug!(%id, records = freed, "despawned entity");
        Ok(())
    }

    fn check_capacity(&self) -> Result<(), SimError> {
        if self.entities.len() >= self.config.max_entities {
            return Err(SimError::EntityLimit {
                limit: self.config.max_entities,
            });
        }
        Ok(())
    }

    /// An entity by id.
    pub fn entity(&self, id: ObjectId) -> Result<&Entity, SimError> {
        self.entities.get(&id).ok_or(SimError::UnknownEntity { id })
    }

    /// Live entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // ── Stepping ────────────────────────────────────────────────

    /// The current frame.
    pub fn current_frame(&self) -> Result<FrameId, SimError> {
        Ok(self.clock.current_frame(&self.heap)?)
    }

    /// Whether a failed step has left the scenario unusable.
    pub fn is_corrupted(&self) -> bool {
        self.corrupted.is_some()
    }

    /// Advance one frame and run every behavior.
    pub fn step(&mut self) -> Result<StepReport, SimError> {
        if let Some(frame) = self.corrupted {
            return Err(SimError::Corrupted { frame });
        }
        let frame = match self.clock.advance(&mut self.heap) {
            Ok(frame) => frame,
            Err(e @ SimError::ClockOverflow { .. }) => return Err(e),
            Err(e) => {
                let at = self.current_frame().unwrap_or_default();
                return Err(self.mark_corrupted(at, e));
            }
        };

        let mut report = StepReport {
            frame,
            ..StepReport::default()
        };
        let mut ctx = StepContext::new(&mut self.heap, &self.entities, frame, &mut report);
        if let Err(e) = behavior::dispatch(&mut ctx, &mut self.behaviors) {
            return Err(self.mark_corrupted(frame, e));
        }
        trace!(
            %frame,
            entities = report.entities_visited,
            effects = report.effects.len(),
            "step complete"
        );
        Ok(report)
    }

    /// Step `frames` times, returning the last report.
    pub fn run(&mut self, frames: u64) -> Result<Option<StepReport>, SimError> {
        let mut last = None;
        for _ in 0..frames {
            last = Some(self.step()?);
        }
        Ok(last)
    }

    fn mark_corrupted(&mut self, frame: FrameId, cause: SimError) -> SimError {
        warn!(%frame, error = %cause, "step failed; scenario corrupted");
        self.corrupted = Some(frame);
        cause
    }

    // ── Snapshots ───────────────────────────────────────────────

    /// Serialize the whole simulation state.
    pub fn save(&self) -> Vec<u8> {
        self.heap.serialize()
    }

    /// Restore state saved from this scenario with the same roster.
    ///
    /// On success any corruption is cleared. On failure nothing changes.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<(), SimError> {
        self.heap.deserialize(bytes)?;
        if let Some(frame) = self.corrupted.take() {
            debug!(%frame, "cleared corruption by restore");
        }
        debug!(frame = %self.current_frame()?, "restored scenario");
        Ok(())
    }

    /// FNV-1a hash of the simulation state, for lockstep comparison.
    pub fn snapshot_hash(&self) -> u64 {
        keel_heap::snapshot_hash(&self.heap)
    }

    // ── Terrain ─────────────────────────────────────────────────

    /// Register derived terrain data into the heap. Replaces any earlier
    /// terrain record.
    pub fn attach_terrain(&mut self, summary: TerrainSummary) -> Result<ObjectId, SimError> {
        let record: TerrainRecord = self.heap.construct(summary)?;
        if let Some(old) = self.terrain.replace(record) {
            self.heap.destroy(old)?;
        }
        Ok(record.object_id())
    }

    /// The registered terrain record.
    pub fn terrain(&self) -> Option<&TerrainRecord> {
        self.terrain.as_ref()
    }

    // ── Accessors ───────────────────────────────────────────────

    /// The scenario's heap.
    pub fn heap(&self) -> &SimHeap {
        &self.heap
    }

    /// Exclusive heap access for tooling and scripted events.
    ///
    /// Field registration on existing objects is still rejected.
    pub fn heap_mut(&mut self) -> &mut SimHeap {
        &mut self.heap
    }

    /// The configuration the scenario was built with.
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Set an entity's health, clamped to its maximum.
    pub fn set_health(&mut self, id: ObjectId, health: i32) -> Result<i32, SimError> {
        let entity = self.entities.get(&id).ok_or(SimError::UnknownEntity { id })?;
        Ok(entity.base().set_health(&mut self.heap, health)?)
    }
}
