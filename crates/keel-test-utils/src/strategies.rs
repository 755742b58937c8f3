//! Proptest strategies for spawn specs.

use keel_core::{Fixed, Vec2Fixed};
use keel_sim::{StructureSpec, ToolSpec, UnitSpec};
use proptest::prelude::*;

pub fn arb_position() -> impl Strategy<Value = Vec2Fixed> {
    (-64i32..64, -64i32..64).prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
}

pub fn arb_tool_spec() -> impl Strategy<Value = ToolSpec> {
    prop_oneof![
        (0u32..10, 1i32..8, 1u16..50).prop_map(|(cooldown, range, build_rate)| {
            ToolSpec::Construction {
                cooldown,
                range: Fixed::from_num(range),
                build_rate,
            }
        }),
        (0u32..10, 1i32..8, 1i32..50).prop_map(|(cooldown, range, amount)| ToolSpec::Repair {
            cooldown,
            range: Fixed::from_num(range),
            amount,
        }),
    ]
}

pub fn arb_unit_spec() -> impl Strategy<Value = UnitSpec> {
    (
        any::<u8>(),
        arb_position(),
        1i32..500,
        proptest::option::of(arb_tool_spec()),
    )
        .prop_map(|(faction, position, max_health, tool)| UnitSpec {
            faction,
            position,
            max_health,
            tool,
        })
}

/// Structures without an assigned builder; callers patch `builder` in.
pub fn arb_structure_spec() -> impl Strategy<Value = StructureSpec> {
    (any::<u8>(), arb_position(), 1i32..2000, 0u16..200).prop_map(
        |(faction, position, max_health, build_cost)| StructureSpec {
            faction,
            position,
            max_health,
            build_cost,
            builder: None,
        },
    )
}
