//! Reusable scenario fixtures.
//!
//! - [`TouchBehavior`]: logs every `(frame, entity)` it is invoked for.
//! - [`FailingBehavior`]: fails with a heap error after N calls.
//! - [`builder_and_site`], [`medic_and_patient`]: small populated scenarios.

use std::sync::{Arc, Mutex};

use keel_core::{Fixed, FrameId, ObjectId, Vec2Fixed};
use keel_heap::HeapError;
use keel_sim::{
    Behavior, Entity, EntityKind, Scenario, SimError, StepContext, StructureSpec, ToolSpec,
    UnitSpec,
};

/// Shared log of `(frame, entity)` visits.
pub type TouchLog = Arc<Mutex<Vec<(FrameId, ObjectId)>>>;

/// Records every invocation. Stateless with respect to the heap.
pub struct TouchBehavior {
    pub name: String,
    pub kinds: Vec<EntityKind>,
    pub log: TouchLog,
}

impl TouchBehavior {
    pub fn new(name: impl Into<String>, kinds: &[EntityKind]) -> (Self, TouchLog) {
        let log = TouchLog::default();
        (
            Self {
                name: name.into(),
                kinds: kinds.to_vec(),
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl Behavior for TouchBehavior {
    fn name(&self) -> &str {
        &self.name
    }

    fn affects(&self) -> &[EntityKind] {
        &self.kinds
    }

    fn update_state(&mut self, ctx: &mut StepContext<'_>, entity: &Entity) -> Result<(), SimError> {
        if let Ok(mut log) = self.log.lock() {
            log.push((ctx.frame(), entity.id()));
        }
        Ok(())
    }
}

/// Writes one unit of damage per call, then fails on call number
/// `fail_after + 1` with [`HeapError::InvalidHandle`].
pub struct FailingBehavior {
    pub fail_after: usize,
    calls: usize,
}

impl FailingBehavior {
    pub fn new(fail_after: usize) -> Self {
        Self {
            fail_after,
            calls: 0,
        }
    }
}

impl Behavior for FailingBehavior {
    fn name(&self) -> &str {
        "failing"
    }

    fn affects(&self) -> &[EntityKind] {
        &[EntityKind::Unit, EntityKind::Structure]
    }

    fn update_state(&mut self, ctx: &mut StepContext<'_>, entity: &Entity) -> Result<(), SimError> {
        self.calls += 1;
        if self.calls > self.fail_after {
            return Err(HeapError::InvalidHandle {
                detail: format!("injected failure on call {}", self.calls),
            }
            .into());
        }
        let base = entity.base();
        let health = base.health(ctx.heap())?;
        ctx.set_health(base, health - 1)?;
        Ok(())
    }
}

/// Spawn a builder carrying a construction tool and, one cell away, a
/// site that only it may build. Returns `(builder, site)`.
pub fn builder_and_site(
    scenario: &mut Scenario,
    build_cost: u16,
    cooldown: u32,
    build_rate: u16,
) -> Result<(ObjectId, ObjectId), SimError> {
    let builder = scenario.spawn_unit(UnitSpec {
        faction: 1,
        position: Vec2Fixed::from_ints(0, 0),
        max_health: 50,
        tool: Some(ToolSpec::Construction {
            cooldown,
            range: Fixed::from_num(2),
            build_rate,
        }),
    })?;
    let site = scenario.spawn_structure(StructureSpec {
        faction: 1,
        position: Vec2Fixed::from_ints(1, 0),
        max_health: 500,
        build_cost,
        builder: Some(builder),
    })?;
    Ok((builder, site))
}

/// Spawn a medic with a repair tool and a damaged unit next to it.
/// Returns `(medic, patient)`.
pub fn medic_and_patient(
    scenario: &mut Scenario,
    cooldown: u32,
    amount: i32,
    patient_health: i32,
) -> Result<(ObjectId, ObjectId), SimError> {
    let medic = scenario.spawn_unit(UnitSpec {
        faction: 2,
        position: Vec2Fixed::from_ints(5, 5),
        max_health: 80,
        tool: Some(ToolSpec::Repair {
            cooldown,
            range: Fixed::from_num(3),
            amount,
        }),
    })?;
    let patient = scenario.spawn_unit(UnitSpec {
        faction: 2,
        position: Vec2Fixed::from_ints(6, 6),
        max_health: 100,
        tool: None,
    })?;
    scenario.set_health(patient, patient_health)?;
    Ok((medic, patient))
}
