//! Units and structures.
//!
//! Every entity is a heap-backed object built by composition: a concrete
//! type holds an [`EntityBase`] and constructs it first. Field handles are
//! private to this module; behaviors and weapons go through the accessor
//! methods.

use keel_core::{Fixed, ObjectId, Vec2Fixed};
use keel_heap::{ArrayField, Constructor, HeapError, HeapObject, ScalarField, SimHeap};

use crate::weapon::Tool;

/// Discriminant used by behaviors to declare what they affect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A mobile unit, possibly carrying a tool.
    Unit,
    /// A static structure, possibly under construction.
    Structure,
}

// ── EntityBase ──────────────────────────────────────────────────

/// Construction parameters shared by all entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BaseArgs {
    /// Owning player or team.
    pub faction: u8,
    /// World position.
    pub position: Vec2Fixed,
    /// Maximum hit points.
    pub max_health: i32,
    /// Initial hit points, clamped to `0..=max_health`.
    pub health: i32,
}

/// Fields common to every entity.
#[derive(Clone, Copy, Debug)]
pub struct EntityBase {
    id: ObjectId,
    faction: ScalarField<u8>,
    health: ScalarField<i32>,
    max_health: ScalarField<i32>,
    position: ArrayField<Fixed>,
}

impl HeapObject for EntityBase {
    type Args = BaseArgs;

    fn construct(ctor: &mut Constructor<'_>, args: BaseArgs) -> Result<Self, HeapError> {
        let max_health = args.max_health.max(0);
        Ok(Self {
            id: ctor.owner(),
            faction: ctor.field_with("faction", args.faction)?,
            health: ctor.field_with("health", args.health.clamp(0, max_health))?,
            max_health: ctor.field_with("max_health", max_health)?,
            position: ctor.array_field_with("position", &[args.position.x, args.position.y])?,
        })
    }

    fn object_id(&self) -> ObjectId {
        self.id
    }
}

impl EntityBase {
    /// Owning player or team.
    pub fn faction(&self, heap: &SimHeap) -> Result<u8, HeapError> {
        self.faction.get(heap)
    }

    /// Current hit points.
    pub fn health(&self, heap: &SimHeap) -> Result<i32, HeapError> {
        self.health.get(heap)
    }

    /// Maximum hit points.
    pub fn max_health(&self, heap: &SimHeap) -> Result<i32, HeapError> {
        self.max_health.get(heap)
    }

    /// Set hit points, clamped to `0..=max_health`. Returns the stored value.
    pub fn set_health(&self, heap: &mut SimHeap, health: i32) -> Result<i32, HeapError> {
        let clamped = health.clamp(0, self.max_health(heap)?);
        self.health.set(heap, clamped)?;
        Ok(clamped)
    }

    /// Whether hit points are above zero.
    pub fn is_alive(&self, heap: &SimHeap) -> Result<bool, HeapError> {
        Ok(self.health(heap)? > 0)
    }

    /// World position.
    pub fn position(&self, heap: &SimHeap) -> Result<Vec2Fixed, HeapError> {
        Ok(Vec2Fixed::new(
            self.position.get(heap, 0)?,
            self.position.get(heap, 1)?,
        ))
    }

    /// Move to `position`.
    pub fn set_position(&self, heap: &mut SimHeap, position: Vec2Fixed) -> Result<(), HeapError> {
        self.position.copy_from(heap, &[position.x, position.y])
    }

    /// Euclidean distance to another entity.
    pub fn distance_to(&self, heap: &SimHeap, other: &EntityBase) -> Result<Fixed, HeapError> {
        Ok(self.position(heap)?.distance(other.position(heap)?))
    }
}

// ── Unit ────────────────────────────────────────────────────────

/// Spawn parameters for a unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitSpec {
    /// Owning player or team.
    pub faction: u8,
    /// Spawn position.
    pub position: Vec2Fixed,
    /// Maximum (and initial) hit points.
    pub max_health: i32,
    /// Tool to equip, if any.
    pub tool: Option<crate::weapon::ToolSpec>,
}

/// A mobile entity that may carry one tool.
#[derive(Debug)]
pub struct Unit {
    base: EntityBase,
    tool_ref: ScalarField<Option<ObjectId>>,
    tool: Option<Tool>,
}

impl HeapObject for Unit {
    type Args = BaseArgs;

    fn construct(ctor: &mut Constructor<'_>, args: BaseArgs) -> Result<Self, HeapError> {
        let base = EntityBase::construct(ctor, args)?;
        Ok(Self {
            base,
            tool_ref: ctor.field("tool")?,
            tool: None,
        })
    }

    fn object_id(&self) -> ObjectId {
        self.base.object_id()
    }
}

impl Unit {
    /// Shared entity fields.
    pub fn base(&self) -> &EntityBase {
        &self.base
    }

    /// The equipped tool.
    pub fn tool(&self) -> Option<&Tool> {
        self.tool.as_ref()
    }

    /// Id of the equipped tool as recorded in the heap.
    pub fn tool_id(&self, heap: &SimHeap) -> Result<Option<ObjectId>, HeapError> {
        self.tool_ref.get(heap)
    }

    /// Equip `tool`, returning the previously equipped one.
    ///
    /// The unit takes ownership first, so the tool is released with the
    /// unit even if recording its id fails.
    pub(crate) fn equip(&mut self, heap: &mut SimHeap, tool: Tool) -> Result<Option<Tool>, HeapError> {
        let id = tool.object_id();
        let previous = self.tool.replace(tool);
        self.tool_ref.set(heap, Some(id))?;
        Ok(previous)
    }

    /// Release the unit and its tool.
    pub(crate) fn destroy(self, heap: &mut SimHeap) -> Result<usize, HeapError> {
        let mut freed = 0;
        if let Some(tool) = self.tool {
            freed += tool.destroy(heap)?;
        }
        Ok(freed + heap.release(self.base.object_id())?)
    }
}

// ── Structure ───────────────────────────────────────────────────

/// Spawn parameters for a structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructureSpec {
    /// Owning player or team.
    pub faction: u8,
    /// Position.
    pub position: Vec2Fixed,
    /// Maximum hit points.
    pub max_health: i32,
    /// Progress needed to finish construction. Zero spawns the structure
    /// already complete at full health.
    pub build_cost: u16,
    /// The unit allowed to build it.
    pub builder: Option<ObjectId>,
}

/// A static entity. While under construction it starts at one hit point
/// and gains health as build progress accumulates.
#[derive(Clone, Copy, Debug)]
pub struct Structure {
    base: EntityBase,
    under_construction: ScalarField<bool>,
    build_progress: ScalarField<u16>,
    build_cost: ScalarField<u16>,
    builder: ScalarField<Option<ObjectId>>,
}

impl HeapObject for Structure {
    type Args = StructureSpec;

    fn construct(ctor: &mut Constructor<'_>, spec: StructureSpec) -> Result<Self, HeapError> {
        let building = spec.build_cost > 0;
        let base = EntityBase::construct(
            ctor,
            BaseArgs {
                faction: spec.faction,
                position: spec.position,
                max_health: spec.max_health,
                health: if building { 1 } else { spec.max_health },
            },
        )?;
        Ok(Self {
            base,
            under_construction: ctor.field_with("under_construction", building)?,
            build_progress: ctor.field("build_progress")?,
            build_cost: ctor.field_with("build_cost", spec.build_cost)?,
            builder: ctor.field_with("builder", spec.builder)?,
        })
    }

    fn object_id(&self) -> ObjectId {
        self.base.object_id()
    }
}

impl Structure {
    /// Shared entity fields.
    pub fn base(&self) -> &EntityBase {
        &self.base
    }

    /// Whether construction is still in progress.
    pub fn is_under_construction(&self, heap: &SimHeap) -> Result<bool, HeapError> {
        self.under_construction.get(heap)
    }

    /// Accumulated build progress.
    pub fn build_progress(&self, heap: &SimHeap) -> Result<u16, HeapError> {
        self.build_progress.get(heap)
    }

    /// Progress required to complete.
    pub fn build_cost(&self, heap: &SimHeap) -> Result<u16, HeapError> {
        self.build_cost.get(heap)
    }

    /// The unit allowed to build this structure.
    pub fn builder(&self, heap: &SimHeap) -> Result<Option<ObjectId>, HeapError> {
        self.builder.get(heap)
    }

    /// Add build progress, capped at the build cost. Returns the new
    /// progress.
    pub fn add_progress(&self, heap: &mut SimHeap, amount: u16) -> Result<u16, HeapError> {
        let cost = self.build_cost(heap)?;
        self.build_progress
            .update(heap, |p| p.saturating_add(amount).min(cost))
    }

    /// Finish construction: clear the flag and restore full health.
    pub fn complete(&self, heap: &mut SimHeap) -> Result<(), HeapError> {
        self.under_construction.set(heap, false)?;
        let max = self.base.max_health(heap)?;
        self.base.set_health(heap, max)?;
        Ok(())
    }
}

// ── Entity ──────────────────────────────────────────────────────

/// Any scenario entity.
#[derive(Debug)]
pub enum Entity {
    /// A unit.
    Unit(Unit),
    /// A structure.
    Structure(Structure),
}

impl Entity {
    /// The variant tag.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Unit(_) => EntityKind::Unit,
            Self::Structure(_) => EntityKind::Structure,
        }
    }

    /// Heap owner id.
    pub fn id(&self) -> ObjectId {
        self.base().object_id()
    }

    /// Shared entity fields.
    pub fn base(&self) -> &EntityBase {
        match self {
            Self::Unit(u) => u.base(),
            Self::Structure(s) => s.base(),
        }
    }

    /// The unit, if this is one.
    pub fn as_unit(&self) -> Option<&Unit> {
        match self {
            Self::Unit(u) => Some(u),
            Self::Structure(_) => None,
        }
    }

    /// The structure, if this is one.
    pub fn as_structure(&self) -> Option<&Structure> {
        match self {
            Self::Structure(s) => Some(s),
            Self::Unit(_) => None,
        }
    }

    /// `true` only for structures still being built.
    pub fn is_under_construction(&self, heap: &SimHeap) -> Result<bool, HeapError> {
        match self {
            Self::Structure(s) => s.is_under_construction(heap),
            Self::Unit(_) => Ok(false),
        }
    }

    /// Release every heap object belonging to this entity.
    pub(crate) fn destroy(self, heap: &mut SimHeap) -> Result<usize, HeapError> {
        match self {
            Self::Unit(u) => u.destroy(heap),
            Self::Structure(s) => heap.destroy(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_heap::HeapConfig;

    fn heap() -> SimHeap {
        SimHeap::new(HeapConfig::default()).unwrap()
    }

    fn base_args(max_health: i32, health: i32) -> BaseArgs {
        BaseArgs {
            faction: 1,
            position: Vec2Fixed::from_ints(3, 4),
            max_health,
            health,
        }
    }

    #[test]
    fn unit_registers_base_then_derived_fields() {
        let mut heap = heap();
        let unit: Unit = heap.construct(base_args(100, 100)).unwrap();
        let names: Vec<_> = heap
            .records_of(unit.object_id())
            .map(|r| r.name().to_owned())
            .collect();
        assert_eq!(names, ["faction", "health", "max_health", "position", "tool"]);
        assert_eq!(unit.base().faction(&heap).unwrap(), 1);
        assert_eq!(unit.tool_id(&heap).unwrap(), None);
    }

    #[test]
    fn health_is_clamped() {
        let mut heap = heap();
        let unit: Unit = heap.construct(base_args(50, 80)).unwrap();
        assert_eq!(unit.base().health(&heap).unwrap(), 50);
        assert_eq!(unit.base().set_health(&mut heap, -5).unwrap(), 0);
        assert!(!unit.base().is_alive(&heap).unwrap());
    }

    #[test]
    fn distance_between_entities() {
        let mut heap = heap();
        let a: Unit = heap.construct(base_args(1, 1)).unwrap();
        let b: Unit = heap.construct(base_args(1, 1)).unwrap();
        b.base()
            .set_position(&mut heap, Vec2Fixed::from_ints(0, 0))
            .unwrap();
        assert_eq!(
            a.base().distance_to(&heap, b.base()).unwrap(),
            Fixed::from_num(5)
        );
    }

    #[test]
    fn structure_under_construction_starts_at_one_health() {
        let mut heap = heap();
        let s: Structure = heap
            .construct(StructureSpec {
                faction: 0,
                position: Vec2Fixed::ZERO,
                max_health: 400,
                build_cost: 10,
                builder: Some(ObjectId(9)),
            })
            .unwrap();
        assert!(s.is_under_construction(&heap).unwrap());
        assert_eq!(s.base().health(&heap).unwrap(), 1);
        assert_eq!(s.add_progress(&mut heap, 7).unwrap(), 7);
        assert_eq!(s.add_progress(&mut heap, 7).unwrap(), 10);
        s.complete(&mut heap).unwrap();
        assert!(!s.is_under_construction(&heap).unwrap());
        assert_eq!(s.base().health(&heap).unwrap(), 400);
        assert_eq!(s.builder(&heap).unwrap(), Some(ObjectId(9)));
    }

    #[test]
    fn zero_cost_structure_is_complete() {
        let mut heap = heap();
        let s: Structure = heap
            .construct(StructureSpec {
                faction: 0,
                position: Vec2Fixed::ZERO,
                max_health: 200,
                build_cost: 0,
                builder: None,
            })
            .unwrap();
        assert!(!s.is_under_construction(&heap).unwrap());
        assert_eq!(s.base().health(&heap).unwrap(), 200);
    }

    #[test]
    fn destroyed_entity_handles_are_invalid() {
        let mut heap = heap();
        let unit: Unit = heap.construct(base_args(10, 10)).unwrap();
        let base = *unit.base();
        let entity = Entity::Unit(unit);
        assert_eq!(entity.destroy(&mut heap).unwrap(), 5);
        assert!(matches!(
            base.health(&heap),
            Err(HeapError::InvalidHandle { .. })
        ));
    }
}
