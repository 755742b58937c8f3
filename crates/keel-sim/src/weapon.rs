//! Weapons and tools: a cooldown state machine plus targeting rules.
//!
//! ```text
//!            can_launch(now) == true
//!   Ready ──────────────────────────► Cooling
//!     ▲       (last launch = now)        │
//!     └──────── now - last >= cooldown ──┘
//! ```
//!
//! The launch timestamp is a heap field starting at [`Cooldown::NEVER`],
//! so cooldowns survive save/restore and match across peers. A negative
//! answer from any query here is an ordinary `Ok(false)`, never an error.

use keel_core::{FrameId, Fixed, ObjectId};
use keel_heap::{Constructor, HeapError, HeapObject, ScalarField, SimHeap};

use crate::entity::Entity;
use crate::error::SimError;

/// Launch readiness of a weapon at a given frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeaponState {
    /// A launch is allowed now.
    Ready,
    /// Cooling down.
    Cooling {
        /// Frames until ready.
        remaining: u64,
    },
}

// ── Cooldown ────────────────────────────────────────────────────

/// Heap-backed launch timer, registered as part of a weapon.
#[derive(Clone, Copy, Debug)]
pub struct Cooldown {
    last_launch: ScalarField<i64>,
    frames: ScalarField<u32>,
}

impl Cooldown {
    /// Launch timestamp of a weapon that has never fired.
    pub const NEVER: i64 = -1;

    /// Register the cooldown fields on the object under construction.
    ///
    /// A cooldown of zero frames behaves as one: at most one launch per
    /// frame.
    pub fn register(ctor: &mut Constructor<'_>, frames: u32) -> Result<Self, HeapError> {
        Ok(Self {
            last_launch: ctor.field_with("frame_of_last_launch", Self::NEVER)?,
            frames: ctor.field_with("cooldown_frames", frames)?,
        })
    }

    /// Configured cooldown length in frames.
    pub fn frames(&self, heap: &SimHeap) -> Result<u32, HeapError> {
        self.frames.get(heap)
    }

    /// Frame of the last launch, `None` before the first.
    pub fn last_launch(&self, heap: &SimHeap) -> Result<Option<FrameId>, HeapError> {
        let last = self.last_launch.get(heap)?;
        Ok(u64::try_from(last).ok().map(FrameId))
    }

    /// Readiness at `now`. Read-only.
    pub fn state(&self, heap: &SimHeap, now: FrameId) -> Result<WeaponState, SimError> {
        let last = self.last_launch.get(heap)?;
        if last == Self::NEVER {
            return Ok(WeaponState::Ready);
        }
        let now = frame_stamp(now)?;
        let cooldown = i64::from(self.frames(heap)?.max(1));
        let elapsed = now.saturating_sub(last);
        if elapsed >= cooldown {
            Ok(WeaponState::Ready)
        } else {
            Ok(WeaponState::Cooling {
                remaining: cooldown.saturating_sub(elapsed).unsigned_abs(),
            })
        }
    }

    /// Launch if ready, recording `now` as the launch frame.
    ///
    /// Returns `true` exactly when the weapon was ready. The check and the
    /// timestamp write happen in one call, so a second call in the same
    /// frame returns `false`.
    pub fn can_launch(&self, heap: &mut SimHeap, now: FrameId) -> Result<bool, SimError> {
        match self.state(heap, now)? {
            WeaponState::Ready => {
                self.last_launch.set(heap, frame_stamp(now)?)?;
                Ok(true)
            }
            WeaponState::Cooling { .. } => Ok(false),
        }
    }
}

fn frame_stamp(now: FrameId) -> Result<i64, SimError> {
    i64::try_from(now.0).map_err(|_| SimError::ClockOverflow { frame: now })
}

// ── Weapon ──────────────────────────────────────────────────────

/// What a successful launch did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Build progress was added to a structure.
    Built {
        /// The structure.
        target: ObjectId,
        /// Progress after the launch.
        progress: u16,
    },
    /// Health was restored to an entity.
    Repaired {
        /// The repaired entity.
        target: ObjectId,
        /// Health after the launch.
        health: i32,
    },
}

/// Targeting and launch rules shared by every weapon.
pub trait Weapon {
    /// The weapon's launch timer.
    fn cooldown(&self) -> &Cooldown;

    /// Maximum engagement distance.
    fn max_range(&self, heap: &SimHeap) -> Result<Fixed, HeapError>;

    /// Whether `candidate` is a valid target for this weapon.
    fn can_target(&self, heap: &SimHeap, candidate: &Entity) -> Result<bool, HeapError>;

    /// Apply one launch to `target`.
    fn apply(&self, heap: &mut SimHeap, target: &Entity) -> Result<Effect, HeapError>;

    /// Whether `distance` is within [`max_range`](Self::max_range).
    fn is_in_range(&self, heap: &SimHeap, distance: Fixed) -> Result<bool, HeapError> {
        Ok(distance <= self.max_range(heap)?)
    }

    /// See [`Cooldown::can_launch`].
    fn can_launch(&self, heap: &mut SimHeap, now: FrameId) -> Result<bool, SimError> {
        self.cooldown().can_launch(heap, now)
    }

    /// See [`Cooldown::state`].
    fn state(&self, heap: &SimHeap, now: FrameId) -> Result<WeaponState, SimError> {
        self.cooldown().state(heap, now)
    }
}

// ── Tools ───────────────────────────────────────────────────────

/// Parameters of a tool to equip on a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolSpec {
    /// Adds build progress to the carrier's own construction sites.
    Construction {
        /// Cooldown in frames.
        cooldown: u32,
        /// Maximum range.
        range: Fixed,
        /// Progress added per launch.
        build_rate: u16,
    },
    /// Restores health to damaged, completed entities.
    Repair {
        /// Cooldown in frames.
        cooldown: u32,
        /// Maximum range.
        range: Fixed,
        /// Health restored per launch.
        amount: i32,
    },
}

/// Fields common to every tool.
#[derive(Clone, Copy, Debug)]
struct ToolBase {
    id: ObjectId,
    carrier: ScalarField<Option<ObjectId>>,
    max_range: ScalarField<Fixed>,
    cooldown: Cooldown,
}

impl HeapObject for ToolBase {
    type Args = (ObjectId, u32, Fixed);

    fn construct(
        ctor: &mut Constructor<'_>,
        (carrier, cooldown, range): Self::Args,
    ) -> Result<Self, HeapError> {
        Ok(Self {
            id: ctor.owner(),
            carrier: ctor.field_with("carrier", Some(carrier))?,
            max_range: ctor.field_with("max_range", range)?,
            cooldown: Cooldown::register(ctor, cooldown)?,
        })
    }

    fn object_id(&self) -> ObjectId {
        self.id
    }
}

/// Lets a unit raise the structures it was assigned to build.
#[derive(Clone, Copy, Debug)]
pub struct ConstructionTool {
    base: ToolBase,
    build_rate: ScalarField<u16>,
}

impl HeapObject for ConstructionTool {
    /// `(carrier, cooldown, range, build_rate)`.
    type Args = (ObjectId, u32, Fixed, u16);

    fn construct(
        ctor: &mut Constructor<'_>,
        (carrier, cooldown, range, build_rate): Self::Args,
    ) -> Result<Self, HeapError> {
        let base = ToolBase::construct(ctor, (carrier, cooldown, range))?;
        Ok(Self {
            base,
            build_rate: ctor.field_with("build_rate", build_rate)?,
        })
    }

    fn object_id(&self) -> ObjectId {
        self.base.object_id()
    }
}

impl Weapon for ConstructionTool {
    fn cooldown(&self) -> &Cooldown {
        &self.base.cooldown
    }

    fn max_range(&self, heap: &SimHeap) -> Result<Fixed, HeapError> {
        self.base.max_range.get(heap)
    }

    fn can_target(&self, heap: &SimHeap, candidate: &Entity) -> Result<bool, HeapError> {
        let Entity::Structure(site) = candidate else {
            return Ok(false);
        };
        if !site.is_under_construction(heap)? {
            return Ok(false);
        }
        let carrier = self.base.carrier.get(heap)?;
        Ok(carrier.is_some() && site.builder(heap)? == carrier)
    }

    fn apply(&self, heap: &mut SimHeap, target: &Entity) -> Result<Effect, HeapError> {
        let rate = self.build_rate.get(heap)?;
        let progress = match target {
            Entity::Structure(site) => site.add_progress(heap, rate)?,
            Entity::Unit(_) => 0,
        };
        Ok(Effect::Built {
            target: target.id(),
            progress,
        })
    }
}

/// Restores health to damaged entities that are not under construction.
#[derive(Clone, Copy, Debug)]
pub struct RepairTool {
    base: ToolBase,
    amount: ScalarField<i32>,
}

impl HeapObject for RepairTool {
    /// `(carrier, cooldown, range, amount)`.
    type Args = (ObjectId, u32, Fixed, i32);

    fn construct(
        ctor: &mut Constructor<'_>,
        (carrier, cooldown, range, amount): Self::Args,
    ) -> Result<Self, HeapError> {
        let base = ToolBase::construct(ctor, (carrier, cooldown, range))?;
        Ok(Self {
            base,
            amount: ctor.field_with("repair_amount", amount)?,
        })
    }

    fn object_id(&self) -> ObjectId {
        self.base.object_id()
    }
}

impl Weapon for RepairTool {
    fn cooldown(&self) -> &Cooldown {
        &self.base.cooldown
    }

    fn max_range(&self, heap: &SimHeap) -> Result<Fixed, HeapError> {
        self.base.max_range.get(heap)
    }

    fn can_target(&self, heap: &SimHeap, candidate: &Entity) -> Result<bool, HeapError> {
        if candidate.is_under_construction(heap)? {
            return Ok(false);
        }
        let base = candidate.base();
        Ok(base.health(heap)? < base.max_health(heap)?)
    }

    fn apply(&self, heap: &mut SimHeap, target: &Entity) -> Result<Effect, HeapError> {
        let base = target.base();
        let amount = self.amount.get(heap)?;
        let health = base.set_health(heap, base.health(heap)?.saturating_add(amount))?;
        Ok(Effect::Repaired {
            target: target.id(),
            health,
        })
    }
}

/// A tool carried by a unit.
#[derive(Clone, Copy, Debug)]
pub enum Tool {
    /// See [`ConstructionTool`].
    Construction(ConstructionTool),
    /// See [`RepairTool`].
    Repair(RepairTool),
}

impl Tool {
    /// Construct the tool described by `spec` for `carrier`.
    pub fn build(heap: &mut SimHeap, carrier: ObjectId, spec: ToolSpec) -> Result<Self, HeapError> {
        Ok(match spec {
            ToolSpec::Construction {
                cooldown,
                range,
                build_rate,
            } => Self::Construction(heap.construct((carrier, cooldown, range, build_rate))?),
            ToolSpec::Repair {
                cooldown,
                range,
                amount,
            } => Self::Repair(heap.construct((carrier, cooldown, range, amount))?),
        })
    }

    /// Heap owner id of the tool object.
    pub fn object_id(&self) -> ObjectId {
        match self {
            Self::Construction(t) => t.object_id(),
            Self::Repair(t) => t.object_id(),
        }
    }

    fn weapon(&self) -> &dyn Weapon {
        match self {
            Self::Construction(t) => t,
            Self::Repair(t) => t,
        }
    }

    pub(crate) fn destroy(self, heap: &mut SimHeap) -> Result<usize, HeapError> {
        match self {
            Self::Construction(t) => heap.destroy(t),
            Self::Repair(t) => heap.destroy(t),
        }
    }
}

impl Weapon for Tool {
    fn cooldown(&self) -> &Cooldown {
        self.weapon().cooldown()
    }

    fn max_range(&self, heap: &SimHeap) -> Result<Fixed, HeapError> {
        self.weapon().max_range(heap)
    }

    fn can_target(&self, heap: &SimHeap, candidate: &Entity) -> Result<bool, HeapError> {
        self.weapon().can_target(heap, candidate)
    }

    fn apply(&self, heap: &mut SimHeap, target: &Entity) -> Result<Effect, HeapError> {
        self.weapon().apply(heap, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{BaseArgs, Structure, StructureSpec, Unit};
    use keel_core::Vec2Fixed;
    use keel_heap::HeapConfig;
    use proptest::prelude::*;

    struct Launcher {
        id: ObjectId,
        cooldown: Cooldown,
    }

    impl HeapObject for Launcher {
        type Args = u32;

        fn construct(ctor: &mut Constructor<'_>, frames: u32) -> Result<Self, HeapError> {
            Ok(Self {
                id: ctor.owner(),
                cooldown: Cooldown::register(ctor, frames)?,
            })
        }

        fn object_id(&self) -> ObjectId {
            self.id
        }
    }

    fn launcher(frames: u32) -> (SimHeap, Launcher) {
        let mut heap = SimHeap::new(HeapConfig::default()).unwrap();
        let l = heap.construct::<Launcher>(frames).unwrap();
        (heap, l)
    }

    #[test]
    fn fresh_weapon_is_ready() {
        let (heap, l) = launcher(5);
        assert_eq!(l.cooldown.last_launch(&heap).unwrap(), None);
        assert_eq!(l.cooldown.state(&heap, FrameId(0)).unwrap(), WeaponState::Ready);
    }

    #[test]
    fn cooldown_five_fired_at_ten() {
        let (mut heap, l) = launcher(5);
        assert!(l.cooldown.can_launch(&mut heap, FrameId(10)).unwrap());
        assert!(!l.cooldown.can_launch(&mut heap, FrameId(14)).unwrap());
        assert_eq!(
            l.cooldown.state(&heap, FrameId(14)).unwrap(),
            WeaponState::Cooling { remaining: 1 }
        );
        assert!(l.cooldown.can_launch(&mut heap, FrameId(15)).unwrap());
        assert_eq!(l.cooldown.last_launch(&heap).unwrap(), Some(FrameId(15)));
    }

    #[test]
    fn second_call_in_same_frame_is_cooling() {
        let (mut heap, l) = launcher(3);
        assert!(l.cooldown.can_launch(&mut heap, FrameId(2)).unwrap());
        assert!(!l.cooldown.can_launch(&mut heap, FrameId(2)).unwrap());
        assert_eq!(l.cooldown.last_launch(&heap).unwrap(), Some(FrameId(2)));
    }

    #[test]
    fn zero_cooldown_allows_one_launch_per_frame() {
        let (mut heap, l) = launcher(0);
        assert!(l.cooldown.can_launch(&mut heap, FrameId(1)).unwrap());
        assert!(!l.cooldown.can_launch(&mut heap, FrameId(1)).unwrap());
        assert!(l.cooldown.can_launch(&mut heap, FrameId(2)).unwrap());
    }

    #[test]
    fn launch_timestamp_is_restored() {
        let (mut heap, l) = launcher(5);
        let saved = heap.serialize();
        l.cooldown.can_launch(&mut heap, FrameId(3)).unwrap();
        heap.deserialize(&saved).unwrap();
        assert_eq!(l.cooldown.last_launch(&heap).unwrap(), None);
    }

    proptest! {
        #[test]
        fn cooling_window_is_exact(cooldown in 1u32..50, fire in 0u64..10_000) {
            let (mut heap, l) = launcher(cooldown);
            prop_assert!(l.cooldown.can_launch(&mut heap, FrameId(fire)).unwrap());
            for dt in 1..u64::from(cooldown) {
                prop_assert!(!l.cooldown.can_launch(&mut heap, FrameId(fire + dt)).unwrap());
            }
            let ready_at = FrameId(fire + u64::from(cooldown));
            prop_assert!(l.cooldown.can_launch(&mut heap, ready_at).unwrap());
            prop_assert_eq!(l.cooldown.last_launch(&heap).unwrap(), Some(ready_at));
        }
    }

    fn unit(heap: &mut SimHeap, health: i32) -> Entity {
        Entity::Unit(
            heap.construct::<Unit>(BaseArgs {
                faction: 0,
                position: Vec2Fixed::ZERO,
                max_health: 100,
                health,
            })
            .unwrap(),
        )
    }

    fn site(heap: &mut SimHeap, builder: Option<ObjectId>) -> Entity {
        Entity::Structure(
            heap.construct::<Structure>(StructureSpec {
                faction: 0,
                position: Vec2Fixed::from_ints(2, 0),
                max_health: 100,
                build_cost: 20,
                builder,
            })
            .unwrap(),
        )
    }

    #[test]
    fn construction_tool_targets_only_its_own_sites() {
        let mut heap = SimHeap::new(HeapConfig::default()).unwrap();
        let builder = unit(&mut heap, 100);
        let mine = site(&mut heap, Some(builder.id()));
        let theirs = site(&mut heap, Some(ObjectId(999)));
        let tool = Tool::build(
            &mut heap,
            builder.id(),
            ToolSpec::Construction {
                cooldown: 2,
                range: Fixed::from_num(3),
                build_rate: 8,
            },
        )
        .unwrap();

        assert!(tool.can_target(&heap, &mine).unwrap());
        assert!(!tool.can_target(&heap, &theirs).unwrap());
        assert!(!tool.can_target(&heap, &builder).unwrap());
        assert_eq!(
            tool.apply(&mut heap, &mine).unwrap(),
            Effect::Built {
                target: mine.id(),
                progress: 8
            }
        );

        mine.as_structure().unwrap().complete(&mut heap).unwrap();
        assert!(!tool.can_target(&heap, &mine).unwrap());
    }

    #[test]
    fn repair_tool_targets_damaged_completed_entities() {
        let mut heap = SimHeap::new(HeapConfig::default()).unwrap();
        let medic = unit(&mut heap, 100);
        let hurt = unit(&mut heap, 40);
        let building = site(&mut heap, None);
        let tool = Tool::build(
            &mut heap,
            medic.id(),
            ToolSpec::Repair {
                cooldown: 1,
                range: Fixed::from_num(1),
                amount: 75,
            },
        )
        .unwrap();

        assert!(!tool.can_target(&heap, &medic).unwrap());
        assert!(tool.can_target(&heap, &hurt).unwrap());
        assert!(!tool.can_target(&heap, &building).unwrap());
        assert_eq!(
            tool.apply(&mut heap, &hurt).unwrap(),
            Effect::Repaired {
                target: hurt.id(),
                health: 100
            }
        );
        assert!(!tool.can_target(&heap, &hurt).unwrap());
    }

    #[test]
    fn range_check_is_inclusive() {
        let mut heap = SimHeap::new(HeapConfig::default()).unwrap();
        let tool = Tool::build(
            &mut heap,
            ObjectId(1),
            ToolSpec::Repair {
                cooldown: 1,
                range: Fixed::from_num(2),
                amount: 1,
            },
        )
        .unwrap();
        assert!(tool.is_in_range(&heap, Fixed::from_num(2)).unwrap());
        assert!(!tool.is_in_range(&heap, Fixed::from_num(2) + Fixed::DELTA).unwrap());
    }

    #[test]
    fn tool_fields_register_base_first() {
        let mut heap = SimHeap::new(HeapConfig::default()).unwrap();
        let tool = Tool::build(
            &mut heap,
            ObjectId(1),
            ToolSpec::Construction {
                cooldown: 1,
                range: Fixed::ONE,
                build_rate: 1,
            },
        )
        .unwrap();
        let names: Vec<_> = heap
            .records_of(tool.object_id())
            .map(|r| r.name().to_owned())
            .collect();
        assert_eq!(
            names,
            [
                "carrier",
                "max_range",
                "frame_of_last_launch",
                "cooldown_frames",
                "build_rate"
            ]
        );
    }
}
