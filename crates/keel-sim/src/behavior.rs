//! Per-frame entity behaviors.
//!
//! Each frame the scenario visits every live entity in insertion order
//! and, for each entity, every behavior in registration order whose
//! [`affects()`](Behavior::affects) list contains the entity's kind.
//! Behaviors match on the [`Entity`] variant and do nothing for variants
//! they do not handle.
//!
//! A behavior's persistent state must be heap fields (so it is covered by
//! snapshots and lockstep hashing). A behavior with no state registers
//! nothing.
//!
//! # Field isolation
//!
//! A [`StepContext`] never hands out the heap mutably. Behaviors read
//! anything through [`StepContext::heap`], but write only through typed
//! handles they hold themselves ([`StepContext::set`],
//! [`StepContext::update`], [`StepContext::set_element`]) or through the
//! public entity operations the context forwards. An entity's private
//! registrations stay private: [`SimHeap::find`] yields a read-only
//! record, not a handle.
//!
//! ```compile_fail
//! use keel_core::{ObjectId, Value};
//! use keel_sim::StepContext;
//!
//! fn reopen_site(ctx: &mut StepContext<'_>, site: ObjectId) {
//!     let record = ctx.heap().find(site, "under_construction").unwrap();
//!     ctx.heap_mut().write(record.handle(), Value::Bool(true)).unwrap();
//! }
//! ```

use indexmap::IndexMap;
use tracing::trace;

use keel_core::{FieldValue, FrameId, ObjectId};
use keel_heap::{ArrayField, Constructor, HeapError, HeapObject, ScalarField, SimHeap};

use crate::entity::{Entity, EntityBase, EntityKind};
use crate::error::SimError;
use crate::weapon::{Effect, Weapon};

/// Per-step summary, returned by [`Scenario::step`](crate::Scenario::step).
///
/// Contains only simulation-derived data, so two peers stepping the same
/// state produce equal reports.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    /// The frame this step produced.
    pub frame: FrameId,
    /// Entities visited by dispatch.
    pub entities_visited: usize,
    /// Successful weapon launches, in dispatch order.
    pub effects: Vec<Effect>,
    /// Structures that finished construction this frame.
    pub completed: Vec<ObjectId>,
    /// Units that did not launch this frame.
    pub idle: usize,
}

/// What a behavior sees while it runs.
pub struct StepContext<'a> {
    heap: &'a mut SimHeap,
    entities: &'a IndexMap<ObjectId, Entity>,
    frame: FrameId,
    report: &'a mut StepReport,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        heap: &'a mut SimHeap,
        entities: &'a IndexMap<ObjectId, Entity>,
        frame: FrameId,
        report: &'a mut StepReport,
    ) -> Self {
        Self {
            heap,
            entities,
            frame,
            report,
        }
    }

    /// The frame being simulated.
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    /// Shared heap access.
    pub fn heap(&self) -> &SimHeap {
        self.heap
    }

    pub(crate) fn heap_mut(&mut self) -> &mut SimHeap {
        self.heap
    }

    /// Write a scalar the behavior registered.
    pub fn set<T: FieldValue>(&mut self, field: ScalarField<T>, value: T) -> Result<(), HeapError> {
        field.set(self.heap, value)
    }

    /// Read, transform and write back a scalar the behavior registered.
    pub fn update<T: FieldValue>(
        &mut self,
        field: ScalarField<T>,
        f: impl FnOnce(T) -> T,
    ) -> Result<T, HeapError> {
        field.update(self.heap, f)
    }

    /// Write one element of an array the behavior registered.
    pub fn set_element<T: FieldValue>(
        &mut self,
        field: ArrayField<T>,
        index: usize,
        value: T,
    ) -> Result<(), HeapError> {
        field.set(self.heap, index, value)
    }

    /// Damage or heal an entity. See [`EntityBase::set_health`].
    pub fn set_health(&mut self, target: &EntityBase, health: i32) -> Result<i32, HeapError> {
        target.set_health(self.heap, health)
    }

    /// All live entities in insertion order.
    ///
    /// The returned map outlives the borrow of `self`, so it can be
    /// iterated while the heap is mutated.
    pub fn entities(&self) -> &'a IndexMap<ObjectId, Entity> {
        self.entities
    }

    /// The step report being built.
    pub fn report(&mut self) -> &mut StepReport {
        self.report
    }
}

/// Per-frame logic applied to entities of the kinds it declares.
pub trait Behavior: Send {
    /// Name for diagnostics.
    fn name(&self) -> &str;

    /// Entity kinds this behavior is invoked for.
    fn affects(&self) -> &[EntityKind];

    /// Update `entity` for the current frame.
    fn update_state(&mut self, ctx: &mut StepContext<'_>, entity: &Entity) -> Result<(), SimError>;
}

/// Run every behavior over every entity for one frame.
pub(crate) fn dispatch(
    ctx: &mut StepContext<'_>,
    behaviors: &mut [Box<dyn Behavior>],
) -> Result<(), SimError> {
    for entity in ctx.entities().values() {
        ctx.report().entities_visited += 1;
        let kind = entity.kind();
        for behavior in behaviors.iter_mut() {
            if behavior.affects().contains(&kind) {
                trace!(behavior = behavior.name(), entity = %entity.id(), "update_state");
                behavior.update_state(ctx, entity)?;
            }
        }
    }
    Ok(())
}

// ── ConstructionBehavior ────────────────────────────────────────

/// Grows structures under construction and completes them when their
/// build progress reaches the build cost.
///
/// While a site is being built its health tracks `max_health * progress /
/// cost` (never below its current value).
pub struct ConstructionBehavior {
    id: ObjectId,
    completed: ScalarField<u32>,
    /// Sites examined since this value was created. Not persisted.
    sites_seen: u64,
}

impl ConstructionBehavior {
    /// Structures completed over the scenario's lifetime.
    pub fn completed(&self, heap: &SimHeap) -> Result<u32, HeapError> {
        self.completed.get(heap)
    }

    /// Sites examined by this instance. Transient: not saved or restored.
    pub fn sites_seen(&self) -> u64 {
        self.sites_seen
    }
}

impl HeapObject for ConstructionBehavior {
    type Args = ();

    fn construct(ctor: &mut Constructor<'_>, _: ()) -> Result<Self, HeapError> {
        Ok(Self {
            id: ctor.owner(),
            completed: ctor.field("completed")?,
            sites_seen: 0,
        })
    }

    fn object_id(&self) -> ObjectId {
        self.id
    }
}

impl Behavior for ConstructionBehavior {
    fn name(&self) -> &str {
        "construction"
    }

    fn affects(&self) -> &[EntityKind] {
        &[EntityKind::Structure]
    }

    fn update_state(&mut self, ctx: &mut StepContext<'_>, entity: &Entity) -> Result<(), SimError> {
        let Entity::Structure(site) = entity else {
            return Ok(());
        };
        let heap = ctx.heap_mut();
        if !site.is_under_construction(heap)? {
            return Ok(());
        }
        self.sites_seen += 1;

        let progress = site.build_progress(heap)?;
        let cost = site.build_cost(heap)?;
        if progress >= cost {
            site.complete(heap)?;
            self.completed.update(heap, |n| n.saturating_add(1))?;
            ctx.report().completed.push(entity.id());
            return Ok(());
        }

        let base = site.base();
        let max = base.max_health(heap)?;
        let target = i64::from(max) * i64::from(progress) / i64::from(cost.max(1));
        let target = i32::try_from(target).unwrap_or(max).max(1);
        if target > base.health(heap)? {
            base.set_health(heap, target)?;
        }
        Ok(())
    }
}

// ── ToolBehavior ────────────────────────────────────────────────

/// Drives every unit's tool.
///
/// The target is the first entity, in scenario order and excluding the
/// carrier, that the tool can target and that is within range. The tool
/// launches only if a target exists and its cooldown allows it.
pub struct ToolBehavior {
    id: ObjectId,
    launches: ScalarField<u64>,
}

impl ToolBehavior {
    /// Launches over the scenario's lifetime.
    pub fn launches(&self, heap: &SimHeap) -> Result<u64, HeapError> {
        self.launches.get(heap)
    }
}

impl HeapObject for ToolBehavior {
    type Args = ();

    fn construct(ctor: &mut Constructor<'_>, _: ()) -> Result<Self, HeapError> {
        Ok(Self {
            id: ctor.owner(),
            launches: ctor.field("launches")?,
        })
    }

    fn object_id(&self) -> ObjectId {
        self.id
    }
}

impl Behavior for ToolBehavior {
    fn name(&self) -> &str {
        "tool"
    }

    fn affects(&self) -> &[EntityKind] {
        &[EntityKind::Unit]
    }

    fn update_state(&mut self, ctx: &mut StepContext<'_>, entity: &Entity) -> Result<(), SimError> {
        let Entity::Unit(unit) = entity else {
            return Ok(());
        };
        let Some(tool) = unit.tool() else {
            return Ok(());
        };
        if !unit.base().is_alive(ctx.heap())? {
            return Ok(());
        }

        let entities = ctx.entities();
        let mut target = None;
        for candidate in entities.values() {
            if candidate.id() == entity.id() || !tool.can_target(ctx.heap(), candidate)? {
                continue;
            }
            let distance = unit.base().distance_to(ctx.heap(), candidate.base())?;
            if tool.is_in_range(ctx.heap(), distance)? {
                target = Some(candidate);
                break;
            }
        }
        let Some(target) = target else {
            return Ok(());
        };

        let now = ctx.frame();
        if tool.can_launch(ctx.heap_mut(), now)? {
            let effect = tool.apply(ctx.heap_mut(), target)?;
            self.launches.update(ctx.heap_mut(), |n| n.saturating_add(1))?;
            ctx.report().effects.push(effect);
        }
        Ok(())
    }
}

// ── IdleBehavior ────────────────────────────────────────────────

/// Counts units with nothing to do this frame. Stateless.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdleBehavior;

impl Behavior for IdleBehavior {
    fn name(&self) -> &str {
        "idle"
    }

    fn affects(&self) -> &[EntityKind] {
        &[EntityKind::Unit]
    }

    fn update_state(&mut self, ctx: &mut StepContext<'_>, entity: &Entity) -> Result<(), SimError> {
        let Entity::Unit(unit) = entity else {
            return Ok(());
        };
        let busy = match unit.tool() {
            Some(tool) => tool.cooldown().last_launch(ctx.heap())? == Some(ctx.frame()),
            None => false,
        };
        if !busy {
            ctx.report().idle += 1;
        }
        Ok(())
    }
}
