//! Tile-level passes: connection box placement and tile wiring.

use crate::diagnostics;
use crate::error::{RoutingError, RoutingResult};
use crate::library::ConnectionBoxLibrary;
use fabric_common::{Orientation, Position};
use fabric_diagnostics::DiagnosticSink;
use fabric_ir::{
    naming, BlockPortId, Bus, Fabric, InstanceId, InstanceKey, IrError, ModuleId, NetClass, Port,
    PortDirection, PortKey, RoutingNode, SegmentBridgeId, SegmentBridgeType, TileData,
};

fn tile_data(fabric: &Fabric, tile: ModuleId) -> RoutingResult<TileData> {
    let m = fabric.module(tile);
    m.tile().cloned().ok_or_else(|| {
        IrError::WrongModuleKind {
            module: m.name().to_string(),
            expected: "a tile",
        }
        .into()
    })
}

/// Tile cells on the `orientation` edge of a `width x height` block, each with
/// the channel it faces relative to that cell.
fn edge_cells(orientation: Orientation, width: u32, height: u32) -> Vec<(Position, Position)> {
    let (w, h) = (width as i32, height as i32);
    match orientation {
        Orientation::North => (0..w).map(|x| (Position::new(x, h - 1), Position::ORIGIN)).collect(),
        Orientation::South => (0..w).map(|x| (Position::new(x, 0), Position::new(0, -1))).collect(),
        Orientation::East => (0..h).map(|y| (Position::new(w - 1, y), Position::ORIGIN)).collect(),
        Orientation::West => (0..h).map(|y| (Position::new(0, y), Position::new(-1, 0))).collect(),
        Orientation::Auto => Vec::new(),
    }
}

/// Places connection boxes from `lib` along the edges of `tile`.
///
/// `Auto` serves every edge and is rejected for IO tiles, which only face
/// the array interior. Edge cells that already hold a box are left alone.
pub fn cboxify(
    fabric: &mut Fabric,
    lib: &mut dyn ConnectionBoxLibrary,
    tile: ModuleId,
    orientation: Orientation,
    sink: &DiagnosticSink,
) -> RoutingResult<()> {
    let data = tile_data(fabric, tile)?;
    let sides: Vec<Orientation> = if orientation.is_auto() {
        if fabric.module(data.block).is_io_block() {
            return Err(RoutingError::IoBlockNeedsOrientation {
                tile: fabric.module(tile).name().to_string(),
            });
        }
        Orientation::ALL.to_vec()
    } else {
        vec![orientation]
    };
    for ori in sides {
        for (position, channel) in edge_cells(ori, data.shape.width, data.shape.height) {
            let key = InstanceKey::ConnectionBox(position, ori);
            if fabric.module(tile).instance_by_key(&key).is_some() {
                continue;
            }
            let cbox = lib.get_or_create_cbox(fabric, data.block, ori, position, channel, sink)?;
            fabric.instantiate_cbox(tile, cbox, ori, position)?;
        }
    }
    Ok(())
}

fn sub_block(fabric: &Fabric, tile: ModuleId, index: u32) -> RoutingResult<InstanceId> {
    let m = fabric.module(tile);
    m.instance_by_key(&InstanceKey::SubBlock(index)).ok_or_else(|| {
        IrError::Unknown {
            what: "sub-block",
            name: index.to_string(),
            module: m.name().to_string(),
        }
        .into()
    })
}

/// Lands a connection-box output on one of the two array-level output slots
/// of `tile`.
fn connect_cboxout(
    fabric: &mut Fabric,
    tile: ModuleId,
    pin: Bus,
    node: SegmentBridgeId,
) -> RoutingResult<()> {
    for ty in [SegmentBridgeType::ArrayCboxout, SegmentBridgeType::ArrayCboxout2] {
        let slot: RoutingNode = node.to_bridge_id(ty).into();
        match fabric.module(tile).port_by_key(&PortKey::Node(slot)) {
            Some(port) => {
                let bus = Bus::port(tile, port);
                if fabric.is_undriven_or_driven_by(bus, pin) {
                    if !fabric.is_driven(bus) {
                        fabric.connect(pin, bus)?;
                    }
                    return Ok(());
                }
            }
            None => {
                let port = fabric.get_or_create_node(tile, slot, Some(PortDirection::Output))?;
                fabric.connect(pin, Bus::port(tile, port))?;
                return Ok(());
            }
        }
    }
    Err(RoutingError::ThirdBridge {
        node: RoutingNode::from(node).to_string(),
        module: fabric.module(tile).name().to_string(),
        position: node.position,
    })
}

/// Wires the connection boxes, sub-blocks and IO of `tile`.
///
/// Block-port bridges of the boxes connect to the matching sub-block pins;
/// segment bridges become array-level tile ports (`array_regular` inputs,
/// `array_cboxout{,2}` outputs) resolved later by the enclosing array. IO
/// block pins get dedicated external ports and global pins hierarchical
/// global inputs.
pub fn netify_tile(fabric: &mut Fabric, tile: ModuleId, sink: &DiagnosticSink) -> RoutingResult<()> {
    let data = tile_data(fabric, tile)?;
    let block = data.block;
    let capacity = data.shape.capacity;

    let boxes: Vec<(InstanceId, ModuleId, Position, Orientation)> = fabric
        .module(tile)
        .instances()
        .filter_map(|(id, inst)| match inst.key {
            InstanceKey::ConnectionBox(_, ori) => Some((id, inst.model, inst.position, ori)),
            _ => None,
        })
        .collect();

    for (inst, model, offset, ori) in boxes {
        for (node, pid) in fabric.node_ports(model) {
            let pin = Bus::pin(tile, inst, pid);
            let pin_dir = fabric.module(model).port(pid).direction;
            match node.moved(offset) {
                RoutingNode::BlockPort(id) => {
                    let port = fabric.module(id.block).port(id.port).clone();
                    let own = id.block == block
                        && id.subblock < capacity
                        && port.position == id.position
                        && (port.orientation == ori || port.orientation.is_auto());
                    if own {
                        let sub = sub_block(fabric, tile, id.subblock)?;
                        let block_pin = Bus::pin(tile, sub, id.port);
                        let (from, to) = match port.direction {
                            PortDirection::Input => (pin, block_pin),
                            PortDirection::Output => (block_pin, pin),
                        };
                        if !fabric.is_driven(to) {
                            fabric.connect(from, to)?;
                        }
                    } else if pin_dir == PortDirection::Output {
                        let name = fabric.module(model).port(pid).name.clone();
                        let tile_name = fabric.module(tile).name().to_string();
                        sink.emit(diagnostics::warn_unsupported_bridge(&tile_name, &name, id.position));
                    } else {
                        let port = fabric.get_or_create_node(tile, id.into(), Some(PortDirection::Input))?;
                        fabric.connect(Bus::port(tile, port), pin)?;
                    }
                }
                RoutingNode::SegmentBridge(id) if id.bridge_type == SegmentBridgeType::Cboxin => {
                    let bridge = id.to_bridge_id(SegmentBridgeType::ArrayRegular);
                    let port = fabric.get_or_create_node(tile, bridge.into(), Some(PortDirection::Input))?;
                    fabric.connect(Bus::port(tile, port), pin)?;
                }
                RoutingNode::SegmentBridge(id) if id.bridge_type == SegmentBridgeType::Cboxout => {
                    connect_cboxout(fabric, tile, pin, id)?;
                }
                other => log::trace!("ignoring {} in '{}'", other, fabric.module(model).name()),
            }
        }
    }

    let ports: Vec<(fabric_ir::PortId, Port)> = fabric
        .module(block)
        .ports()
        .filter(|(_, p)| matches!(p.class, NetClass::Io | NetClass::Global))
        .map(|(id, p)| (id, p.clone()))
        .collect();
    let block_name = fabric.module(block).name().to_string();
    for subblock in 0..capacity {
        let sub = sub_block(fabric, tile, subblock)?;
        for (pid, port) in &ports {
            let block_pin = Bus::pin(tile, sub, *pid);
            if port.class == NetClass::Global {
                let Some(global) = port.global else {
                    continue;
                };
                let input = fabric.get_or_create_global_input(tile, global)?;
                fabric.connect(Bus::port(tile, input), block_pin)?;
                continue;
            }
            let key = PortKey::External(BlockPortId::new(Position::ORIGIN, block, *pid, subblock));
            if fabric.module(tile).port_by_key(&key).is_some() {
                continue;
            }
            let name = naming::external_port(
                &block_name,
                Position::ORIGIN,
                (capacity > 1).then_some(subblock),
                &port.name,
            );
            let ext = fabric.add_port(
                tile,
                Port::new(name, port.width, port.direction, NetClass::Io).with_key(key),
            )?;
            let ext = Bus::port(tile, ext);
            match port.direction {
                PortDirection::Input => fabric.connect(ext, block_pin)?,
                PortDirection::Output => fabric.connect(block_pin, ext)?,
            }
        }
    }
    log::debug!(
        "netified tile '{}': {} port(s)",
        fabric.module(tile).name(),
        fabric.module(tile).port_count()
    );
    Ok(())
}
