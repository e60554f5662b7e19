//! Builds a complete fabric from a validated architecture description.

use crate::array::{netify_array, sboxify};
use crate::cbox::{BlockFcValue, BlockPortFcValue, FcValue};
use crate::error::{RoutingError, RoutingResult};
use crate::library::{FcConnectionBoxLibrary, WiltonSwitchBoxLibrary};
use crate::sbox::WiltonPattern;
use crate::tile::{cboxify, netify_tile};
use fabric_common::Orientation;
use fabric_config::{
    validate_architecture, ArchitectureConfig, BlockConfig, BlockKind, FcConfig, IoDirection, PortDirectionConfig,
    PortFcConfig, WiltonPatternConfig,
};
use fabric_diagnostics::DiagnosticSink;
use fabric_ir::{Bus, ChannelCoverage, Fabric, GlobalId, IoKind, ModuleId, MuxLibrary, PortDirection};
use std::collections::HashMap;

fn port_fc(config: &PortFcConfig) -> BlockPortFcValue {
    config
        .segment_overrides()
        .fold(BlockPortFcValue::new(FcValue::from(config.default_value())), |fc, (sgmt, v)| {
            fc.with_override(sgmt, FcValue::from(v))
        })
}

fn block_fc(config: &FcConfig) -> BlockFcValue {
    let mut fc = BlockFcValue::new(port_fc(&config.default_in));
    if let Some(out) = &config.default_out {
        fc = fc.with_default_out(port_fc(out));
    }
    config
        .overrides
        .iter()
        .fold(fc, |fc, (port, v)| fc.with_port_override(port, port_fc(v)))
}

fn unknown(kind: &'static str, name: &str) -> RoutingError {
    RoutingError::UnknownReference {
        kind,
        name: name.to_string(),
    }
}

fn create_block(
    fabric: &mut Fabric,
    block: &BlockConfig,
    globals: &HashMap<&str, GlobalId>,
) -> RoutingResult<ModuleId> {
    let id = match block.kind {
        BlockKind::Io => {
            let io = match block.io {
                Some(IoDirection::Input) => IoKind::Input,
                Some(IoDirection::Output) => IoKind::Output,
                Some(IoDirection::Inout) | None => IoKind::Inout,
            };
            fabric.create_io_block(&block.name, io, block.capacity)?
        }
        BlockKind::Logic => fabric.create_logic_block(&block.name, block.width, block.height)?,
    };
    for port in &block.ports {
        if let Some(global) = &port.global {
            let global = *globals.get(global.as_str()).ok_or_else(|| unknown("global", global))?;
            fabric.add_global_port(id, &port.name, global)?;
            continue;
        }
        let direction = match port.direction {
            PortDirectionConfig::Input => PortDirection::Input,
            PortDirectionConfig::Output => PortDirection::Output,
        };
        fabric.add_block_port(
            id,
            &port.name,
            port.width,
            direction,
            port.grid_position(),
            port.orientation(),
        )?;
    }
    for conn in &block.connections {
        let from = fabric.port_named(id, &conn.from)?;
        let to = fabric.port_named(id, &conn.to)?;
        fabric.connect(Bus::port(id, from), Bus::port(id, to))?;
    }
    log::debug!("created block '{}'", block.name);
    Ok(id)
}

/// Compiles `config` into a legalized fabric. Returns the fabric and its
/// top-level array.
///
/// Blocks are wrapped in tiles, connection-boxed and wired; the tiles are
/// placed in a top-level array which is switch-boxed and wired; finally every
/// module left with multi-driver sinks is legalized with configurable muxes.
pub fn compile_architecture(
    config: &ArchitectureConfig,
    sink: &DiagnosticSink,
) -> RoutingResult<(Fabric, ModuleId)> {
    validate_architecture(config)?;
    let mut fabric = Fabric::new();

    let mut segments = Vec::with_capacity(config.segments.len());
    for sgmt in &config.segments {
        segments.push(fabric.create_segment(&sgmt.name, sgmt.width, sgmt.length)?);
    }

    let mut globals = HashMap::new();
    for global in &config.globals {
        let id = fabric.create_global(&global.name, global.width, global.is_clock)?;
        if let Some(position) = global.bound_position() {
            fabric.bind_global(id, position, global.subblock);
        }
        globals.insert(global.name.as_str(), id);
    }

    let mut cboxes = FcConnectionBoxLibrary::new(segments.clone(), BlockFcValue::default());
    let mut blocks = HashMap::new();
    for block in &config.blocks {
        let id = create_block(&mut fabric, block, &globals)?;
        cboxes.set_block_fc(id, block_fc(&block.fc));
        blocks.insert(block.name.as_str(), id);
    }

    let mut tiles = HashMap::new();
    for tile in &config.tiles {
        let block = *blocks.get(tile.block.as_str()).ok_or_else(|| unknown("block", &tile.block))?;
        let orientation = tile.orientation.unwrap_or(Orientation::Auto);
        let id = fabric.create_tile(&tile.name, block, orientation)?;
        // IO tiles face the array interior
        let side = if fabric.module(block).is_io_block() {
            orientation.opposite()
        } else {
            Orientation::Auto
        };
        cboxify(&mut fabric, &mut cboxes, id, side, sink)?;
        netify_tile(&mut fabric, id, sink)?;
        tiles.insert(tile.name.as_str(), id);
    }

    let arch = &config.architecture;
    let coverage = ChannelCoverage {
        north: arch.coverage.north,
        east: arch.coverage.east,
        south: arch.coverage.south,
        west: arch.coverage.west,
    };
    let top = fabric.create_array(&arch.name, arch.width, arch.height, coverage)?;
    for placement in &config.placements {
        let tile = *tiles
            .get(placement.tile.as_str())
            .ok_or_else(|| unknown("tile", &placement.tile))?;
        fabric.instantiate_element(top, tile, placement.grid_position())?;
    }

    let sb = &config.switch_box;
    let pattern = sb.pattern.map(|p| match p {
        WiltonPatternConfig::Classic => WiltonPattern::classic(),
        WiltonPatternConfig::Cfoptimal => WiltonPattern::cfoptimal(),
    });
    let mut sboxes = WiltonSwitchBoxLibrary::new(segments, pattern, sb.cycle_free);
    sboxify(&mut fabric, &mut sboxes, top, true, sb.drive_truncated, sink)?;
    netify_array(&mut fabric, top, true, sink)?;

    let multi: Vec<ModuleId> = fabric
        .modules()
        .filter(|(_, m)| m.is_multi_source())
        .map(|(id, _)| id)
        .collect();
    let mut switches = MuxLibrary::new();
    let mut inserted = 0;
    for module in multi {
        inserted += fabric.switchify(module, &mut switches)?;
    }
    log::info!(
        "compiled '{}': {} connection box(es), {} switch box(es), {} switch(es)",
        arch.name,
        cboxes.len(),
        sboxes.len(),
        inserted
    );
    Ok((fabric, top))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_config::{FcSetting, load_architecture_from_str};
    use fabric_ir::ModuleKind;

    const ARCH: &str = r#"
[architecture]
name = "top"
width = 1
height = 1

[architecture.coverage]
north = true
east = true
south = true
west = true

[[segments]]
name = "l1"
width = 2
length = 1

[[blocks]]
name = "clb"
kind = "logic"

[[blocks.ports]]
name = "i"
direction = "input"
orientation = "west"

[[blocks.ports]]
name = "o"
direction = "output"
orientation = "east"

[[tiles]]
name = "clbtile"
block = "clb"

[[placements]]
tile = "clbtile"
position = [0, 0]
"#;

    #[test]
    fn per_segment_fc_becomes_overrides() {
        let mut segments = std::collections::BTreeMap::new();
        segments.insert("l4".to_string(), FcSetting::Count(1));
        let cfg = PortFcConfig::PerSegment {
            default: FcSetting::Fraction(0.25),
            segments,
        };
        let fc = port_fc(&cfg);
        assert_eq!(fc.default, FcValue::Fraction(0.25));
        assert_eq!(fc.overrides.get("l4"), Some(&FcValue::Count(1)));
    }

    #[test]
    fn single_tile_compiles_to_single_source_modules() {
        let config = load_architecture_from_str(ARCH).unwrap();
        let sink = DiagnosticSink::new();
        let (fabric, top) = compile_architecture(&config, &sink).unwrap();
        assert_eq!(fabric.module(top).name(), "top");
        assert!(fabric.modules().all(|(_, m)| !m.is_multi_source()));
        assert!(fabric
            .modules()
            .any(|(_, m)| matches!(m.kind(), ModuleKind::Switch { .. })));
        assert!(fabric.module(top).instance_by_name("sbinst_x0y0").is_some());
    }

    #[test]
    fn unknown_placement_is_reported() {
        let mut config = load_architecture_from_str(ARCH).unwrap();
        config.placements[0].tile = "dsp".to_string();
        let err = compile_architecture(&config, &DiagnosticSink::new()).unwrap_err();
        assert!(matches!(err, RoutingError::Config(_)));
    }
}
