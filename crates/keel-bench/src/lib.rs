//! Benchmark profiles for the Keel simulation heap.
//!
//! - [`ballast_heap`]: a heap of `n` uniform objects, for raw heap ops
//! - [`skirmish_profile`]: a scenario with builders, sites, medics and
//!   wounded units, for step throughput
//! - [`spread_positions`]: deterministic, collision-free placement

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::HashSet;

use keel_core::{Fixed, ObjectId, Vec2Fixed};
use keel_heap::{
    ArrayField, Constructor, HeapConfig, HeapError, HeapObject, ScalarField, SimHeap,
};
use keel_sim::{Scenario, ScenarioConfig, SimError, StructureSpec, ToolSpec, UnitSpec};

/// Side length of the square map used by [`skirmish_profile`].
pub const MAP_SIDE: u32 = 256;

/// A plain heap object with a mix of field types.
#[derive(Clone, Copy, Debug)]
pub struct Ballast {
    id: ObjectId,
    /// Counter bumped by benches.
    pub counter: ScalarField<u32>,
    /// Fixed-point weight.
    pub weight: ScalarField<Fixed>,
    /// Eight-slot cargo hold.
    pub hold: ArrayField<u16>,
}

impl HeapObject for Ballast {
    type Args = u32;

    fn construct(ctor: &mut Constructor<'_>, seed: u32) -> Result<Self, HeapError> {
        let hold: Vec<u16> = (0..8u16).map(|i| i.wrapping_mul(seed as u16)).collect();
        Ok(Self {
            id: ctor.owner(),
            counter: ctor.field_with("counter", seed)?,
            weight: ctor.field_with("weight", Fixed::from_num(seed % 1000))?,
            hold: ctor.array_field_with("hold", &hold)?,
        })
    }

    fn object_id(&self) -> ObjectId {
        self.id
    }
}

/// Build a heap holding `n` [`Ballast`] objects.
pub fn ballast_heap(n: u32) -> Result<(SimHeap, Vec<Ballast>), HeapError> {
    let mut heap = SimHeap::new(HeapConfig::default())?;
    let objects = (0..n)
        .map(|i| heap.construct::<Ballast>(i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((heap, objects))
}

/// Build a scenario with `squads` squads. Each squad is a builder with
/// its site plus a medic with a wounded patient, six heap objects and
/// four entities in total.
pub fn skirmish_profile(squads: u32, seed: u64) -> Result<Scenario, SimError> {
    let mut scenario = Scenario::with_default_behaviors(ScenarioConfig {
        max_entities: (squads as usize * 4).max(1),
        ..ScenarioConfig::default()
    })?;
    let cells = (MAP_SIDE * MAP_SIDE) as usize;
    // One anchor per squad, the other members offset by one cell.
    for (squad, cell) in spread_positions(cells, squads, seed) {
        let x = (cell as u32 % MAP_SIDE) as i32;
        let y = (cell as u32 / MAP_SIDE) as i32;
        let faction = (squad % 4) as u8;

        let builder = scenario.spawn_unit(UnitSpec {
            faction,
            position: Vec2Fixed::from_ints(x, y),
            max_health: 40,
            tool: Some(ToolSpec::Construction {
                cooldown: 2,
                range: Fixed::from_num(2),
                build_rate: 5,
            }),
        })?;
        scenario.spawn_structure(StructureSpec {
            faction,
            position: Vec2Fixed::from_ints(x + 1, y),
            max_health: 400,
            build_cost: 200,
            builder: Some(builder),
        })?;
        scenario.spawn_unit(UnitSpec {
            faction,
            position: Vec2Fixed::from_ints(x, y + 1),
            max_health: 60,
            tool: Some(ToolSpec::Repair {
                cooldown: 3,
                range: Fixed::from_num(2),
                amount: 1,
            }),
        })?;
        let patient = scenario.spawn_unit(UnitSpec {
            faction,
            position: Vec2Fixed::from_ints(x + 1, y + 1),
            max_health: 1000,
            tool: None,
        })?;
        scenario.set_health(patient, 1)?;
    }
    Ok(scenario)
}

/// Generate `n` distinct cell indices below `cell_count`.
///
/// Returns `(index, cell)` pairs. Placement is a multiplicative hash
/// of the seed with linear probing on collision.
pub fn spread_positions(cell_count: usize, n: u32, seed: u64) -> Vec<(u32, usize)> {
    let mut positions = Vec::with_capacity(n as usize);
    let mut occupied = HashSet::new();
    for i in 0..n.min(cell_count as u32) {
        let mut cell = (seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(u64::from(i).wrapping_mul(1442695040888963407))
            % cell_count as u64) as usize;
        while !occupied.insert(cell) {
            cell = (cell + 1) % cell_count;
        }
        positions.push((i, cell));
    }
    positions
}
