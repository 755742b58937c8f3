//! A small lockstep skirmish: two builders raise a depot while a medic
//! patches up a wounded scout. Two peers step the same scenario and
//! compare snapshot hashes every frame.
//!
//! ```text
//! RUST_LOG=keel_sim=debug cargo run -p keel-sim --example skirmish
//! ```

use std::sync::Arc;

use keel_core::{Fixed, Vec2Fixed};
use keel_sim::{
    Effect, MapQuery, Scenario, ScenarioConfig, SimError, StructureSpec, TerrainWorker, ToolSpec,
    UnitSpec,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// A 32x32 field with a river along row 12.
struct RiverMap;

impl MapQuery for RiverMap {
    fn dimensions(&self) -> (u32, u32) {
        (32, 32)
    }

    fn is_walkable(&self, x: u32, y: u32) -> bool {
        y != 12 || x % 8 == 0
    }
}

fn build() -> Result<Scenario, SimError> {
    let mut scenario = Scenario::with_default_behaviors(ScenarioConfig::default())?;

    let first = scenario.spawn_unit(UnitSpec {
        faction: 1,
        position: Vec2Fixed::from_ints(3, 4),
        max_health: 40,
        tool: Some(ToolSpec::Construction {
            cooldown: 3,
            range: Fixed::from_num(2),
            build_rate: 10,
        }),
    })?;
    scenario.spawn_structure(StructureSpec {
        faction: 1,
        position: Vec2Fixed::from_ints(4, 5),
        max_health: 600,
        build_cost: 120,
        builder: Some(first),
    })?;

    scenario.spawn_unit(UnitSpec {
        faction: 1,
        position: Vec2Fixed::from_ints(10, 10),
        max_health: 60,
        tool: Some(ToolSpec::Repair {
            cooldown: 4,
            range: Fixed::from_num(3),
            amount: 6,
        }),
    })?;
    let scout = scenario.spawn_unit(UnitSpec {
        faction: 1,
        position: Vec2Fixed::from_ints(11, 12),
        max_health: 50,
        tool: None,
    })?;
    scenario.set_health(scout, 8)?;
    Ok(scenario)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut local = build()?;
    let mut remote = build()?;

    let summary = TerrainWorker::spawn(Arc::new(RiverMap))?.wait()?;
    info!(walkable = summary.total_walkable(), "terrain scanned");
    local.attach_terrain(summary.clone())?;
    remote.attach_terrain(summary)?;

    let checkpoint = local.save();
    for _ in 0..60 {
        let report = local.step()?;
        remote.step()?;
        for effect in &report.effects {
            match effect {
                Effect::Built { target, progress } => {
                    info!(frame = %report.frame, %target, progress, "built")
                }
                Effect::Repaired { target, health } => {
                    info!(frame = %report.frame, %target, health, "repaired")
                }
            }
        }
        for id in &report.completed {
            info!(frame = %report.frame, %id, "construction complete");
        }
        let (a, b) = (local.snapshot_hash(), remote.snapshot_hash());
        if a != b {
            return Err(format!("peers diverged at frame {}: {a:#018x} != {b:#018x}", report.frame).into());
        }
    }

    let final_hash = local.snapshot_hash();
    local.restore(&checkpoint)?;
    local.run(60)?;
    info!(
        frame = %local.current_frame()?,
        hash = %format_args!("{final_hash:#018x}"),
        replay_matches = local.snapshot_hash() == final_hash,
        "skirmish finished"
    );
    Ok(())
}
