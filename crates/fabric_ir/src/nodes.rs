//! Routing node ports: lookup with section equivalence, validated creation.
//!
//! A multi-section segment can be registered under any of its sections, so a
//! segment-based lookup that misses walks back towards section 0 and then
//! forward towards the far end before giving up. Block port ids only match
//! exactly.

use crate::error::{IrError, IrResult};
use crate::ids::{GlobalId, InstanceId, ModuleId, PortId};
use crate::module::ModuleKind;
use crate::naming;
use crate::net::Bus;
use crate::node::{RoutingNode, SegmentBridgeType};
use crate::port::{NetClass, Port, PortDirection, PortKey};
use crate::Fabric;

impl Fabric {
    /// Generated name of the port representing `node`.
    pub fn node_port_name(&self, node: RoutingNode) -> String {
        match node {
            RoutingNode::Segment(id) => {
                let sgmt = self.segment(id.prototype);
                naming::segment_node(
                    "sgmt",
                    &sgmt.name,
                    sgmt.length,
                    id.position,
                    id.orientation,
                    id.section,
                )
            }
            RoutingNode::SegmentBridge(id) => {
                let sgmt = self.segment(id.prototype);
                naming::segment_node(
                    id.bridge_type.prefix(),
                    &sgmt.name,
                    sgmt.length,
                    id.position,
                    id.orientation,
                    id.section,
                )
            }
            RoutingNode::BlockPort(id) => {
                let block = self.module(id.block);
                let subblock = block.is_io_block().then_some(id.subblock);
                naming::block_port_bridge(
                    block.name(),
                    id.position,
                    subblock,
                    &block.port(id.port).name,
                )
            }
        }
    }

    /// Width of the port representing `node`.
    pub fn node_width(&self, node: RoutingNode) -> u32 {
        match node {
            RoutingNode::Segment(id) => self.segment(id.prototype).width,
            RoutingNode::SegmentBridge(id) => self.segment(id.prototype).width,
            RoutingNode::BlockPort(id) => self.module(id.block).port(id.port).width,
        }
    }

    /// Finds the port registered for `node` or for an equivalent section of
    /// the same segment.
    pub fn find_node(&self, module: ModuleId, node: RoutingNode) -> Option<PortId> {
        let m = self.module(module);
        let lookup = |n: RoutingNode| m.port_by_key(&PortKey::Node(n));
        if let Some(port) = lookup(node) {
            return Some(port);
        }
        let (proto, section) = node.segment()?;
        for k in 1..=i64::from(section) {
            if let Some(port) = node.walk(-k).and_then(lookup) {
                return Some(port);
            }
        }
        let length = self.segment(proto).length;
        for k in 1..i64::from(length.saturating_sub(section)) {
            if let Some(port) = node.walk(k).and_then(lookup) {
                return Some(port);
            }
        }
        None
    }

    /// Finds the pin of `instance` (inside `parent`) for `node`, expressed in
    /// the parent's frame.
    pub fn instance_node(
        &self,
        parent: ModuleId,
        instance: InstanceId,
        node: RoutingNode,
    ) -> Option<Bus> {
        let inst = self.module(parent).instance(instance);
        let port = self.find_node(inst.model, node.moved(-inst.position))?;
        Some(Bus::pin(parent, instance, port))
    }

    /// Lists the routing node ports of `module` in creation order.
    pub fn node_ports(&self, module: ModuleId) -> Vec<(RoutingNode, PortId)> {
        self.module(module)
            .ports()
            .filter_map(|(id, port)| port.node().map(|node| (node, id)))
            .collect()
    }

    fn node_direction(
        &self,
        module: ModuleId,
        node: RoutingNode,
        hint: Option<PortDirection>,
    ) -> IrResult<PortDirection> {
        let m = self.module(module);
        let invalid = || IrError::InvalidNode {
            module: m.name().to_string(),
            node: node.to_string(),
        };
        let conflict = || IrError::DirectionConflict {
            module: m.name().to_string(),
            node: node.to_string(),
        };
        let required = || IrError::DirectionRequired {
            module: m.name().to_string(),
            node: node.to_string(),
        };
        let fixed = |dir: PortDirection| match hint {
            Some(h) if h != dir => Err(conflict()),
            _ => Ok(dir),
        };
        match (m.kind(), node) {
            (ModuleKind::SwitchBox, RoutingNode::Segment(_)) => fixed(PortDirection::Output),
            (ModuleKind::SwitchBox, RoutingNode::SegmentBridge(id))
                if id.bridge_type.is_sbox_input() =>
            {
                fixed(PortDirection::Input)
            }
            (ModuleKind::ConnectionBox { .. }, RoutingNode::SegmentBridge(id)) => {
                match id.bridge_type {
                    SegmentBridgeType::Cboxin => fixed(PortDirection::Input),
                    SegmentBridgeType::Cboxout => fixed(PortDirection::Output),
                    _ => Err(invalid()),
                }
            }
            (ModuleKind::ConnectionBox { .. }, RoutingNode::BlockPort(id)) => {
                let block_dir = self.module(id.block).port(id.port).direction;
                if hint == Some(block_dir) {
                    return Err(conflict());
                }
                Ok(block_dir.opposite())
            }
            (ModuleKind::Tile(_) | ModuleKind::Array(_), RoutingNode::SegmentBridge(id))
                if id.bridge_type.is_array_bridge() =>
            {
                hint.ok_or_else(required)
            }
            (ModuleKind::Tile(_) | ModuleKind::Array(_), RoutingNode::BlockPort(_)) => {
                hint.ok_or_else(required)
            }
            _ => Err(invalid()),
        }
    }

    /// Returns the port for `node` in `module`, creating it on first request.
    ///
    /// Switch boxes accept segment drivers (outputs) and switch-box inputs;
    /// connection boxes accept their input/output bridges and block port
    /// bridges (direction opposite to the block port); tiles and arrays accept
    /// array bridges and block port bridges, both of which need `hint`.
    ///
    /// Creating a `sboxin_cboxout` or `sboxin_cboxout2` input also creates the
    /// segment driver it feeds and connects the two.
    pub fn get_or_create_node(
        &mut self,
        module: ModuleId,
        node: RoutingNode,
        hint: Option<PortDirection>,
    ) -> IrResult<PortId> {
        if let Some(port) = self.find_node(module, node) {
            let m = self.module(module);
            if hint.is_some_and(|h| h != m.port(port).direction) {
                return Err(IrError::DirectionConflict {
                    module: m.name().to_string(),
                    node: node.to_string(),
                });
            }
            return Ok(port);
        }
        let direction = self.node_direction(module, node, hint)?;
        let port = Port::new(
            self.node_port_name(node),
            self.node_width(node),
            direction,
            NetClass::Node,
        )
        .with_key(PortKey::Node(node));
        let id = self.add_port(module, port)?;
        log::trace!("created node port {} in '{}'", node, self.module(module).name());

        if let RoutingNode::SegmentBridge(bridge) = node {
            if matches!(
                bridge.bridge_type,
                SegmentBridgeType::SboxinCboxout | SegmentBridgeType::SboxinCboxout2
            ) {
                let driver = self.get_or_create_node(module, bridge.to_driver_id().into(), None)?;
                self.connect(Bus::port(module, id), Bus::port(module, driver))?;
            }
        }
        Ok(id)
    }

    /// Returns the hierarchical input port for `global` in `module`, creating it
    /// on first request.
    pub fn get_or_create_global_input(&mut self, module: ModuleId, global: GlobalId) -> IrResult<PortId> {
        if let Some(port) = self.module(module).port_by_key(&PortKey::Global(global)) {
            return Ok(port);
        }
        let g = self.global(global);
        let mut port = Port::new(g.name.clone(), g.width, PortDirection::Input, NetClass::Global)
            .with_key(PortKey::Global(global));
        port.global = Some(global);
        self.add_port(module, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{BlockPortId, SegmentId};
    use crate::SegmentProtoId;
    use fabric_common::{Dimension, Orientation, Position};

    fn setup() -> (Fabric, SegmentProtoId) {
        let mut f = Fabric::new();
        let s = f.create_segment("l4", 2, 4).unwrap();
        (f, s)
    }

    #[test]
    fn sbox_driver_is_output_and_named() {
        let (mut f, s) = setup();
        let sb = f.create_switch_box("sb").unwrap();
        let node = SegmentId::new(Position::new(0, 1), s, Orientation::North, 0).into();
        let port = f.get_or_create_node(sb, node, None).unwrap();
        let p = f.module(sb).port(port);
        assert_eq!(p.direction, PortDirection::Output);
        assert_eq!(p.name, "sgmt_l4_x0y1n_0");
        assert_eq!(p.width, 2);
        assert_eq!(f.get_or_create_node(sb, node, None).unwrap(), port);
    }

    #[test]
    fn equivalent_sections_resolve_to_one_port() {
        let (mut f, s) = setup();
        let sb = f.create_switch_box("sb").unwrap();
        let base = SegmentId::new(Position::new(0, 1), s, Orientation::North, 0);
        let port = f.get_or_create_node(sb, base.into(), None).unwrap();
        assert_eq!(f.find_node(sb, (base + 2).into()), Some(port));
        let later = SegmentId::new(Position::new(1, 0), s, Orientation::East, 2);
        let p2 = f.get_or_create_node(sb, later.into(), None).unwrap();
        assert_eq!(f.find_node(sb, (later - 1).into()), Some(p2));
        assert_eq!(f.find_node(sb, (later - 2).into()), Some(p2));
    }

    #[test]
    fn wrong_node_kind_rejected() {
        let (mut f, s) = setup();
        let sb = f.create_switch_box("sb").unwrap();
        let node = SegmentId::new(Position::ORIGIN, s, Orientation::North, 0)
            .to_bridge_id(SegmentBridgeType::Cboxin)
            .into();
        assert!(matches!(
            f.get_or_create_node(sb, node, None).unwrap_err(),
            IrError::InvalidNode { .. }
        ));
    }

    #[test]
    fn conflicting_hint_rejected() {
        let (mut f, s) = setup();
        let sb = f.create_switch_box("sb").unwrap();
        let node = SegmentId::new(Position::ORIGIN, s, Orientation::North, 0).into();
        assert!(matches!(
            f.get_or_create_node(sb, node, Some(PortDirection::Input)).unwrap_err(),
            IrError::DirectionConflict { .. }
        ));
    }

    #[test]
    fn array_bridges_need_a_hint() {
        let (mut f, s) = setup();
        let arr = f
            .create_array("top", 1, 1, crate::ChannelCoverage::default())
            .unwrap();
        let node = SegmentId::new(Position::ORIGIN, s, Orientation::East, 0)
            .to_bridge_id(SegmentBridgeType::ArrayRegular)
            .into();
        assert!(matches!(
            f.get_or_create_node(arr, node, None).unwrap_err(),
            IrError::DirectionRequired { .. }
        ));
        let p = f
            .get_or_create_node(arr, node, Some(PortDirection::Input))
            .unwrap();
        assert!(f.module(arr).port(p).is_input());
    }

    #[test]
    fn cbox_block_port_direction_is_opposite() {
        let (mut f, _) = setup();
        let clb = f.create_logic_block("clb", 1, 1).unwrap();
        let pin = f
            .add_block_port(clb, "in", 3, PortDirection::Input, Position::ORIGIN, Orientation::East)
            .unwrap();
        let cb = f.create_connection_box("cb", Dimension::Y).unwrap();
        let node = BlockPortId::new(Position::ORIGIN, clb, pin, 0).into();
        assert!(f
            .get_or_create_node(cb, node, Some(PortDirection::Input))
            .is_err());
        let p = f.get_or_create_node(cb, node, None).unwrap();
        let port = f.module(cb).port(p);
        assert_eq!(port.direction, PortDirection::Output);
        assert_eq!(port.name, "blkp_clb_x0y0_in");
    }

    #[test]
    fn sboxin_cboxout_feeds_its_driver() {
        let (mut f, s) = setup();
        let sb = f.create_switch_box("sb").unwrap();
        let bridge = SegmentId::new(Position::new(1, 0), s, Orientation::East, 0)
            .to_bridge_id(SegmentBridgeType::SboxinCboxout);
        let p = f.get_or_create_node(sb, bridge.into(), None).unwrap();
        let driver = f.find_node(sb, bridge.to_driver_id().into()).unwrap();
        let sinks = f.get_sinks(crate::BitRef {
            bus: Bus::port(sb, p),
            index: 1,
        });
        assert_eq!(
            sinks,
            vec![crate::BitRef {
                bus: Bus::port(sb, driver),
                index: 1
            }]
        );
    }

    #[test]
    fn global_input_is_cached() {
        let (mut f, _) = setup();
        let g = f.create_global("clk", 1, true).unwrap();
        let arr = f
            .create_array("top", 1, 1, crate::ChannelCoverage::default())
            .unwrap();
        let a = f.get_or_create_global_input(arr, g).unwrap();
        assert_eq!(f.get_or_create_global_input(arr, g).unwrap(), a);
        assert_eq!(f.module(arr).port(a).name, "clk");
    }
}
