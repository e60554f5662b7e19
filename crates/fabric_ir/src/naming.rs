//! Deterministic names for generated ports and instances.
//!
//! Negative coordinates are spelled with `u`/`v` instead of `x`/`y` so every
//! generated name is a legal Verilog identifier.

use fabric_common::{Orientation, Position};

/// `x1y2`, `u1y0`, `x0v1`, ...
pub fn grid_tag(pos: Position) -> String {
    format!(
        "{}{}{}{}",
        if pos.x >= 0 { 'x' } else { 'u' },
        pos.x.unsigned_abs(),
        if pos.y >= 0 { 'y' } else { 'v' },
        pos.y.unsigned_abs()
    )
}

/// Name of a segment driver or segment bridge port.
pub fn segment_node(
    prefix: &str,
    segment: &str,
    length: u32,
    pos: Position,
    orientation: Orientation,
    section: u32,
) -> String {
    let mut name = format!(
        "{}_{}_{}{}",
        prefix,
        segment,
        grid_tag(pos),
        orientation.initial()
    );
    if length > 1 {
        name.push_str(&format!("_{section}"));
    }
    name
}

/// Name of a block port bridge. `subblock` is only spelled out for IO blocks.
pub fn block_port_bridge(block: &str, pos: Position, subblock: Option<u32>, port: &str) -> String {
    match subblock {
        Some(sub) => format!("blkp_{}_{}_{}_{}", block, grid_tag(pos), sub, port),
        None => format!("blkp_{}_{}_{}", block, grid_tag(pos), port),
    }
}

/// Name of an array-level external IO port.
pub fn external_port(block: &str, pos: Position, subblock: Option<u32>, port: &str) -> String {
    match subblock {
        Some(sub) => format!("ext_{}_{}_{}_{}", block, grid_tag(pos), sub, port),
        None => format!("ext_{}_{}_{}", block, grid_tag(pos), port),
    }
}

/// Name of sub-block instance `index` of a tile.
pub fn sub_block_instance(index: u32, capacity: u32) -> String {
    if capacity > 1 {
        format!("blkinst_{index}")
    } else {
        "blkinst".to_string()
    }
}

/// Name of a connection box instance.
pub fn cbox_instance(pos: Position, orientation: Orientation) -> String {
    format!("cbinst_{}{}", grid_tag(pos), orientation.initial())
}

/// Name of a switch box instance.
pub fn sbox_instance(pos: Position) -> String {
    format!("sbinst_{}", grid_tag(pos))
}

/// Name of a tile or nested array instance.
pub fn element_instance(is_tile: bool, pos: Position) -> String {
    if is_tile {
        format!("tileinst_{}", grid_tag(pos))
    } else {
        format!("arrinst_{}", grid_tag(pos))
    }
}

/// Name of a switch inserted in front of bit `index` of a sink bus.
pub fn switch_instance(instance: Option<&str>, bus: &str, index: u32) -> String {
    match instance {
        Some(inst) => format!("sw_{inst}_{bus}_{index}"),
        None => format!("sw_{bus}_{index}"),
    }
}
