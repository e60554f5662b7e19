//! Array-level passes and the hierarchical bridge resolvers.
//!
//! An array resolves every routing node whose driving switch box lies inside
//! its own channel coverage. Anything beyond that boundary becomes a bridge
//! port on the array itself, left for the enclosing array to resolve; only
//! the top-level array has no parent and must resolve or drop every pin.
//!
//! The resolvers recurse into nested arrays in the nested array's frame
//! (`node.moved(-instance.position)`) and add bridge ports to the nested
//! model on the way back up.

use crate::diagnostics;
use crate::error::{RoutingError, RoutingResult};
use crate::library::SwitchBoxLibrary;
use crate::sbox::SwitchBoxEnvironment;
use fabric_common::{Dimension, Orientation, Position};
use fabric_diagnostics::DiagnosticSink;
use fabric_ir::{
    naming, ArrayData, BlockPortId, Bus, Fabric, GlobalId, GridCell, InstanceId, InstanceKey, IrError,
    ModuleId, ModuleKind, NetClass, Port, PortDirection, PortId, PortKey, RoutingNode, SboxOccupant,
    SegmentBridgeId, SegmentBridgeType, SegmentId,
};
use std::collections::HashMap;

const ARRAY_CBOXOUT: [SegmentBridgeType; 2] = [SegmentBridgeType::ArrayCboxout, SegmentBridgeType::ArrayCboxout2];
const SBOX_CBOXOUT: [SegmentBridgeType; 2] = [SegmentBridgeType::SboxinCboxout, SegmentBridgeType::SboxinCboxout2];

fn grid(fabric: &Fabric, array: ModuleId) -> RoutingResult<&ArrayData> {
    let m = fabric.module(array);
    m.array().ok_or_else(|| {
        IrError::WrongModuleKind {
            module: m.name().to_string(),
            expected: "an array",
        }
        .into()
    })
}

fn is_array(fabric: &Fabric, module: ModuleId) -> bool {
    matches!(fabric.module(module).kind(), ModuleKind::Array(_))
}

fn node_port(fabric: &Fabric, module: ModuleId, node: impl Into<RoutingNode>) -> Option<PortId> {
    fabric.module(module).port_by_key(&PortKey::Node(node.into()))
}

/// Model and anchor of an instance in `array`.
fn placed(fabric: &Fabric, array: ModuleId, inst: InstanceId) -> (ModuleId, Position) {
    let i = fabric.module(array).instance(inst);
    (i.model, i.position)
}

/// The switch box driving a segment section that starts at `node`.
fn driver_sbox(node: SegmentId) -> Position {
    node.position
        - match node.orientation {
            Orientation::North => Position::new(0, 1),
            Orientation::East => Position::new(1, 0),
            _ => Position::ORIGIN,
        }
}

/// Connects `source` to `sink` unless `sink` is already driven by something
/// else. Returns `false` if the slot is taken.
fn take_slot(fabric: &mut Fabric, sink: Bus, source: Bus) -> RoutingResult<bool> {
    if !fabric.is_undriven_or_driven_by(sink, source) {
        return Ok(false);
    }
    if !fabric.is_driven(sink) {
        fabric.connect(source, sink)?;
    }
    Ok(true)
}

fn third_bridge(fabric: &Fabric, module: ModuleId, node: SegmentBridgeId) -> RoutingError {
    RoutingError::ThirdBridge {
        node: RoutingNode::from(node).to_string(),
        module: fabric.module(module).name().to_string(),
        position: node.position,
    }
}

/// Channels around the switch box at `pos` of a top-level array.
fn top_environment(fabric: &Fabric, array: ModuleId, pos: Position) -> RoutingResult<SwitchBoxEnvironment> {
    let fp = grid(fabric, array)?.footprint();
    Ok(SwitchBoxEnvironment {
        north: fp.covers_channel(pos + Position::new(0, 1), Dimension::Y),
        east: fp.covers_channel(pos + Position::new(1, 0), Dimension::X),
        south: fp.covers_channel(pos, Dimension::Y),
        west: fp.covers_channel(pos, Dimension::X),
    })
}

/// Fills every free switch-box cell the array resolves itself. Returns the
/// number of switch boxes placed.
///
/// Nested arrays are always built for a full environment since their
/// surroundings are unknown; the top-level array trims the environment to the
/// channels that exist.
pub fn sboxify(
    fabric: &mut Fabric,
    lib: &mut dyn SwitchBoxLibrary,
    array: ModuleId,
    top: bool,
    drive_truncated: bool,
    sink: &DiagnosticSink,
) -> RoutingResult<usize> {
    let fp = grid(fabric, array)?.footprint();
    let mut placed = 0;
    for x in -1..fp.width as i32 {
        for y in -1..fp.height as i32 {
            let pos = Position::new(x, y);
            if !fp.covers_sbox(pos) || grid(fabric, array)?.sbox_at(pos).is_some() {
                continue;
            }
            let env = if top {
                top_environment(fabric, array, pos)?
            } else {
                SwitchBoxEnvironment::default()
            };
            let sbox = lib.get_or_create_sbox(fabric, env, drive_truncated, sink)?;
            fabric.instantiate_sbox(array, sbox, pos)?;
            placed += 1;
        }
    }
    log::debug!("placed {} switch box(es) in '{}'", placed, fabric.module(array).name());
    Ok(placed)
}

/// Finds the pin driving segment `node` inside `array`, in the array's frame.
///
/// Sections are tried from `node` back to the segment's first section. A
/// driving switch box outside the array's coverage defers to the parent:
/// with `create_input` an `array_regular` input is created and returned,
/// otherwise the node has no driver here.
pub fn find_segment_driver(
    fabric: &mut Fabric,
    array: ModuleId,
    node: SegmentId,
    create_input: bool,
) -> RoutingResult<Option<Bus>> {
    let fp = grid(fabric, array)?.footprint();
    for back in 0..=node.section {
        let equiv = node - back;
        let pos_sbox = driver_sbox(equiv);
        if !fp.covers_sbox(pos_sbox) {
            if !create_input {
                return Ok(None);
            }
            let bridge = equiv.to_bridge_id(SegmentBridgeType::ArrayRegular);
            let port = fabric.get_or_create_node(array, bridge.into(), Some(PortDirection::Input))?;
            log::trace!(
                "deferring {} in '{}' to the parent",
                RoutingNode::from(equiv),
                fabric.module(array).name()
            );
            return Ok(Some(Bus::port(array, port)));
        }
        let Some(occupant) = grid(fabric, array)?.sbox_at(pos_sbox) else {
            continue;
        };
        match occupant {
            SboxOccupant::SwitchBox(inst) => {
                let (model, offset) = placed(fabric, array, inst);
                if let Some(port) = node_port(fabric, model, equiv.moved(-offset)) {
                    return Ok(Some(Bus::pin(array, inst, port)));
                }
            }
            SboxOccupant::Element(inst) => {
                let (model, offset) = placed(fabric, array, inst);
                if !is_array(fabric, model) {
                    continue;
                }
                let local = equiv.moved(-offset);
                let bridge = local.to_bridge_id(SegmentBridgeType::ArrayRegular);
                if let Some(port) = node_port(fabric, model, bridge) {
                    if fabric.module(model).port(port).direction == PortDirection::Output {
                        return Ok(Some(Bus::pin(array, inst, port)));
                    }
                    continue;
                }
                let Some(driver) = find_segment_driver(fabric, model, local, false)? else {
                    continue;
                };
                let port = fabric.get_or_create_node(model, bridge.into(), Some(PortDirection::Output))?;
                fabric.connect(driver, Bus::port(model, port))?;
                log::trace!(
                    "exposed {} from nested array '{}'",
                    RoutingNode::from(local),
                    fabric.module(model).name()
                );
                return Ok(Some(Bus::pin(array, inst, port)));
            }
        }
    }
    Ok(None)
}

/// Returns `true` if a connection-box output for `node` can land somewhere
/// inside `array`, either on a switch box at some depth or on a new bridge
/// to the parent.
fn cs_bridge_lands(fabric: &Fabric, array: ModuleId, node: SegmentBridgeId) -> RoutingResult<bool> {
    let pos_sbox = driver_sbox(node.to_driver_id());
    let data = grid(fabric, array)?;
    if !data.footprint().covers_sbox(pos_sbox) {
        return Ok(true);
    }
    match data.sbox_at(pos_sbox) {
        None => Ok(false),
        Some(SboxOccupant::SwitchBox(_)) => Ok(true),
        Some(SboxOccupant::Element(inst)) => {
            let (model, offset) = placed(fabric, array, inst);
            if !is_array(fabric, model) {
                return Ok(false);
            }
            cs_bridge_lands(fabric, model, node.moved(-offset))
        }
    }
}

/// Lands connection-box output `source` on the switch box driving `node`.
///
/// Returns `false` when nothing inside `array` can take the connection: the
/// switch box is beyond the array's coverage and `create_output` is off, or
/// the cell holds no switch box. Each switch box accepts at most two
/// connection-box outputs per segment section; a third is an error.
pub fn create_and_connect_cs_bridge(
    fabric: &mut Fabric,
    array: ModuleId,
    source: Bus,
    node: SegmentBridgeId,
    create_output: bool,
) -> RoutingResult<bool> {
    let fp = grid(fabric, array)?.footprint();
    let pos_sbox = driver_sbox(node.to_driver_id());

    if !fp.covers_sbox(pos_sbox) {
        for ty in ARRAY_CBOXOUT {
            let slot = node.to_bridge_id(ty);
            match node_port(fabric, array, slot) {
                Some(port) => {
                    if take_slot(fabric, Bus::port(array, port), source)? {
                        return Ok(true);
                    }
                }
                None if !create_output => return Ok(false),
                None => {
                    let port = fabric.get_or_create_node(array, slot.into(), Some(PortDirection::Output))?;
                    fabric.connect(source, Bus::port(array, port))?;
                    log::trace!(
                        "deferring {} in '{}' to the parent",
                        RoutingNode::from(slot),
                        fabric.module(array).name()
                    );
                    return Ok(true);
                }
            }
        }
        return Err(third_bridge(fabric, array, node));
    }

    let Some(occupant) = grid(fabric, array)?.sbox_at(pos_sbox) else {
        return Ok(false);
    };
    match occupant {
        SboxOccupant::SwitchBox(inst) => {
            let (model, offset) = placed(fabric, array, inst);
            for ty in SBOX_CBOXOUT {
                let slot = node.to_bridge_id(ty).moved(-offset);
                let port = match node_port(fabric, model, slot) {
                    Some(port) => port,
                    None => {
                        let port = fabric.get_or_create_node(model, slot.into(), None)?;
                        fabric.connect(source, Bus::pin(array, inst, port))?;
                        return Ok(true);
                    }
                };
                if take_slot(fabric, Bus::pin(array, inst, port), source)? {
                    return Ok(true);
                }
            }
            Err(third_bridge(fabric, model, node.moved(-offset)))
        }
        SboxOccupant::Element(inst) => {
            let (model, offset) = placed(fabric, array, inst);
            if !is_array(fabric, model) {
                return Ok(false);
            }
            for ty in ARRAY_CBOXOUT {
                let slot = node.to_bridge_id(ty).moved(-offset);
                let port = match node_port(fabric, model, slot) {
                    Some(port) => port,
                    None => {
                        if !cs_bridge_lands(fabric, model, slot)? {
                            return Ok(false);
                        }
                        let port = fabric.get_or_create_node(model, slot.into(), Some(PortDirection::Input))?;
                        if !create_and_connect_cs_bridge(fabric, model, Bus::port(model, port), slot, true)? {
                            return Ok(false);
                        }
                        fabric.connect(source, Bus::pin(array, inst, port))?;
                        return Ok(true);
                    }
                };
                // an output with this key carries the nested array's own boxes
                if fabric.module(model).port(port).direction == PortDirection::Output {
                    continue;
                }
                if take_slot(fabric, Bus::pin(array, inst, port), source)? {
                    return Ok(true);
                }
            }
            Err(third_bridge(fabric, model, node.moved(-offset)))
        }
    }
}

/// Finds the sub-block output behind block-port bridge `node` of `array`.
///
/// A tile exposes the bridge as a tile output fed by its sub-block. A nested
/// array is searched recursively and exposes the bridge as an array output.
/// Uncovered cells defer to the parent when `create_input` is set.
pub fn find_blockport_bridge_driver(
    fabric: &mut Fabric,
    array: ModuleId,
    node: BlockPortId,
    create_input: bool,
) -> RoutingResult<Option<Bus>> {
    let data = grid(fabric, array)?;
    let fp = data.footprint();
    let Some(inst) = data.element_at(node.position) else {
        if !fp.covers_tile(node.position) && create_input {
            let port = fabric.get_or_create_node(array, node.into(), Some(PortDirection::Input))?;
            return Ok(Some(Bus::port(array, port)));
        }
        return Ok(None);
    };
    let (model, offset) = placed(fabric, array, inst);
    let local = node.moved(-offset);

    if let Some(tile) = fabric.module(model).tile().cloned() {
        let port = fabric.module(local.block).port(local.port);
        let valid = local.block == tile.block
            && local.subblock < tile.shape.capacity
            && port.position == local.position
            && port.direction == PortDirection::Output;
        if !valid {
            return Ok(None);
        }
        let bridge = fabric.get_or_create_node(model, local.into(), Some(PortDirection::Output))?;
        let bridge_bus = Bus::port(model, bridge);
        if !fabric.is_driven(bridge_bus) {
            let key = InstanceKey::SubBlock(local.subblock);
            let Some(sub) = fabric.module(model).instance_by_key(&key) else {
                return Ok(None);
            };
            fabric.connect(Bus::pin(model, sub, local.port), bridge_bus)?;
        }
        return Ok(Some(Bus::pin(array, inst, bridge)));
    }

    if !is_array(fabric, model) {
        return Ok(None);
    }
    if let Some(port) = node_port(fabric, model, local) {
        return Ok(match fabric.module(model).port(port).direction {
            PortDirection::Output => Some(Bus::pin(array, inst, port)),
            PortDirection::Input => None,
        });
    }
    let Some(driver) = find_blockport_bridge_driver(fabric, model, local, false)? else {
        return Ok(None);
    };
    let port = fabric.get_or_create_node(model, local.into(), Some(PortDirection::Output))?;
    fabric.connect(driver, Bus::port(model, port))?;
    Ok(Some(Bus::pin(array, inst, port)))
}

struct Pending {
    global: GlobalId,
    pin: Bus,
}

/// Wires the elements and switch boxes of `array`.
///
/// Element bridge pins are resolved with the resolvers above, external IO
/// pins are lifted to array ports, and global inputs are either forwarded
/// (nested arrays) or tied to the external input they are bound to (top
/// level). The top level drops unresolvable pins with a note and fails if a
/// bridge port remains on it.
pub fn netify_array(fabric: &mut Fabric, array: ModuleId, top: bool, sink: &DiagnosticSink) -> RoutingResult<()> {
    let fp = grid(fabric, array)?.footprint();
    let array_name = fabric.module(array).name().to_string();
    let dangling = |fabric: &Fabric, pin: Bus, position: Position| {
        if top {
            sink.emit(diagnostics::note_dangling_boundary(
                &array_name,
                &fabric.describe_bus(pin),
                position,
            ));
        } else {
            log::trace!("leaving {} open in '{}'", fabric.describe_bus(pin), array_name);
        }
    };

    let mut externals: HashMap<(Position, u32), Vec<PortId>> = HashMap::new();
    let mut pending = Vec::new();

    for x in -1..fp.width as i32 {
        for y in -1..fp.height as i32 {
            let pos = Position::new(x, y);
            if let Some(GridCell::Root(inst)) = grid(fabric, array)?.element_cell(pos) {
                let (model, offset) = placed(fabric, array, inst);
                let ports: Vec<(PortId, Port)> = fabric.module(model).ports().map(|(id, p)| (id, p.clone())).collect();
                for (pid, port) in ports {
                    let pin = Bus::pin(array, inst, pid);
                    match &port.key {
                        PortKey::Node(RoutingNode::SegmentBridge(id)) => {
                            let moved = id.moved(offset);
                            match (id.bridge_type, port.direction) {
                                (SegmentBridgeType::ArrayRegular, PortDirection::Input) => {
                                    if fabric.is_driven(pin) {
                                        continue;
                                    }
                                    match find_segment_driver(fabric, array, moved.to_driver_id(), !top)? {
                                        Some(driver) => fabric.connect(driver, pin)?,
                                        None => dangling(fabric, pin, moved.position),
                                    }
                                }
                                (SegmentBridgeType::ArrayCboxout | SegmentBridgeType::ArrayCboxout2, PortDirection::Output) => {
                                    if !create_and_connect_cs_bridge(fabric, array, pin, moved, !top)? {
                                        dangling(fabric, pin, moved.position);
                                    }
                                }
                                _ => {}
                            }
                        }
                        PortKey::Node(RoutingNode::BlockPort(id)) if port.direction == PortDirection::Input => {
                            if fabric.is_driven(pin) {
                                continue;
                            }
                            let moved = id.moved(offset);
                            match find_blockport_bridge_driver(fabric, array, moved, !top)? {
                                Some(driver) => fabric.connect(driver, pin)?,
                                None => dangling(fabric, pin, moved.position),
                            }
                        }
                        PortKey::External(id) => {
                            let moved = id.moved(offset);
                            let key = PortKey::External(moved);
                            if fabric.module(array).port_by_key(&key).is_some() {
                                continue;
                            }
                            let block = fabric.module(moved.block);
                            let capacity = block.block_shape().map_or(1, |s| s.capacity);
                            let name = naming::external_port(
                                block.name(),
                                moved.position,
                                (capacity > 1).then_some(moved.subblock),
                                &block.port(moved.port).name,
                            );
                            let ext = fabric.add_port(
                                array,
                                Port::new(name, port.width, port.direction, NetClass::Io).with_key(key),
                            )?;
                            match port.direction {
                                PortDirection::Input => {
                                    fabric.connect(Bus::port(array, ext), pin)?;
                                    externals.entry((moved.position, moved.subblock)).or_default().push(ext);
                                }
                                PortDirection::Output => fabric.connect(pin, Bus::port(array, ext))?,
                            }
                        }
                        PortKey::Global(global) => pending.push(Pending { global: *global, pin }),
                        _ => {}
                    }
                }
            }

            if let Some(SboxOccupant::SwitchBox(inst)) = grid(fabric, array)?.sbox_at(pos) {
                let (model, offset) = placed(fabric, array, inst);
                for (node, pid) in fabric.node_ports(model) {
                    let RoutingNode::SegmentBridge(id) = node else {
                        continue;
                    };
                    let pin = Bus::pin(array, inst, pid);
                    if id.bridge_type != SegmentBridgeType::SboxinRegular || fabric.is_driven(pin) {
                        continue;
                    }
                    let moved = id.moved(offset);
                    match find_segment_driver(fabric, array, moved.to_driver_id(), !top)? {
                        Some(driver) => fabric.connect(driver, pin)?,
                        None => dangling(fabric, pin, moved.position),
                    }
                }
            }
        }
    }

    for Pending { global, pin } in pending {
        if fabric.is_driven(pin) {
            continue;
        }
        if !top {
            let input = fabric.get_or_create_global_input(array, global)?;
            fabric.connect(Bus::port(array, input), pin)?;
            continue;
        }
        let g = fabric.global(global);
        let Some(binding) = g.binding else {
            return Err(RoutingError::GlobalUnbound { global: g.name.clone() });
        };
        let candidates = externals
            .get(&(binding.position, binding.subblock))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let ext = match candidates {
            [] => {
                return Err(RoutingError::GlobalNoInput {
                    global: g.name.clone(),
                    position: binding.position,
                    subblock: binding.subblock,
                })
            }
            [ext] => *ext,
            _ => {
                return Err(RoutingError::GlobalMultipleInputs {
                    global: g.name.clone(),
                    position: binding.position,
                    subblock: binding.subblock,
                    count: candidates.len(),
                })
            }
        };
        let found = fabric.module(array).port(ext).width;
        if found != g.width {
            return Err(RoutingError::GlobalWidthMismatch {
                global: g.name.clone(),
                expected: g.width,
                found,
                position: binding.position,
            });
        }
        log::debug!("global '{}' enters at {}", g.name, fabric.module(array).port(ext).name);
        fabric.connect(Bus::port(array, ext), pin)?;
    }

    if top {
        let leftover = fabric.module(array).ports().find_map(|(_, p)| {
            p.node().filter(|node| match node {
                RoutingNode::SegmentBridge(id) => id.bridge_type.is_array_bridge(),
                RoutingNode::BlockPort(_) => true,
                RoutingNode::Segment(_) => false,
            })
        });
        if let Some(node) = leftover {
            return Err(RoutingError::UnresolvedNode {
                node: node.to_string(),
                module: array_name,
                position: node.position(),
            });
        }
    }
    log::debug!(
        "netified array '{}': {} port(s)",
        fabric.module(array).name(),
        fabric.module(array).port_count()
    );
    Ok(())
}
