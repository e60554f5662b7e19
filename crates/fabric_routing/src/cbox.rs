//! Connection-box population and FC-based track distribution.

use crate::connect::{connect_nodes, ConnectMode};
use crate::error::{RoutingError, RoutingResult};
use fabric_common::{Direction, Orientation, Position};
use fabric_config::FcSetting;
use fabric_diagnostics::DiagnosticSink;
use fabric_ir::{
    BlockPortId, Bus, Fabric, ModuleId, NetClass, Port, PortDirection, PortId, PortKey,
    RoutingNode, SegmentBridgeId, SegmentBridgeType, SegmentProtoId, SegmentPrototype,
};
use std::collections::HashMap;

/// Connectivity of a block port to one segment type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FcValue {
    /// A literal number of tracks, below the segment width.
    Count(u32),
    /// A fraction of the segment width, rounded up.
    Fraction(f64),
}

impl FcValue {
    /// Number of connections towards `segment`. With `all_sections`, every
    /// section of a multi-section segment counts.
    pub fn connections(self, segment: &SegmentPrototype, all_sections: bool) -> RoutingResult<u32> {
        let multiplier = if all_sections { segment.length } else { 1 };
        let invalid = |value: String| RoutingError::InvalidFc {
            value,
            segment: segment.name.clone(),
        };
        match self {
            FcValue::Count(n) if n < segment.width => Ok(n * multiplier),
            FcValue::Count(n) => Err(invalid(n.to_string())),
            FcValue::Fraction(f) if (0.0..=1.0).contains(&f) => {
                Ok((f * f64::from(segment.width * multiplier)).ceil() as u32)
            }
            FcValue::Fraction(f) => Err(invalid(f.to_string())),
        }
    }
}

impl From<FcSetting> for FcValue {
    fn from(setting: FcSetting) -> Self {
        match setting {
            FcSetting::Count(n) => FcValue::Count(n),
            FcSetting::Fraction(f) => FcValue::Fraction(f),
        }
    }
}

/// FC of one block port, with per-segment overrides keyed by segment name.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockPortFcValue {
    /// Value for segments without an override.
    pub default: FcValue,
    /// Per-segment overrides.
    pub overrides: HashMap<String, FcValue>,
}

impl BlockPortFcValue {
    /// A value applying to every segment.
    pub fn new(default: FcValue) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Overrides the value for the segment named `segment`.
    pub fn with_override(mut self, segment: impl Into<String>, value: FcValue) -> Self {
        self.overrides.insert(segment.into(), value);
        self
    }

    /// Number of connections towards `segment`.
    pub fn segment_fc(&self, segment: &SegmentPrototype, all_sections: bool) -> RoutingResult<u32> {
        self.overrides
            .get(&segment.name)
            .copied()
            .unwrap_or(self.default)
            .connections(segment, all_sections)
    }
}

/// FC of a whole block, with per-port overrides keyed by port name.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFcValue {
    /// FC of input ports.
    pub default_in: BlockPortFcValue,
    /// FC of output ports; falls back to `default_in`.
    pub default_out: Option<BlockPortFcValue>,
    /// Per-port overrides.
    pub overrides: HashMap<String, BlockPortFcValue>,
}

impl BlockFcValue {
    /// The same FC for inputs and outputs.
    pub fn new(default_in: BlockPortFcValue) -> Self {
        Self {
            default_in,
            default_out: None,
            overrides: HashMap::new(),
        }
    }

    /// Sets a separate FC for output ports.
    pub fn with_default_out(mut self, default_out: BlockPortFcValue) -> Self {
        self.default_out = Some(default_out);
        self
    }

    /// Overrides the FC of the port named `port`.
    pub fn with_port_override(mut self, port: impl Into<String>, value: BlockPortFcValue) -> Self {
        self.overrides.insert(port.into(), value);
        self
    }

    /// Number of connections between `port` and `segment`.
    pub fn port_fc(&self, port: &Port, segment: &SegmentPrototype, all_sections: bool) -> RoutingResult<u32> {
        let value = match self.overrides.get(&port.name) {
            Some(v) => v,
            None if port.is_input() => &self.default_in,
            None => self.default_out.as_ref().unwrap_or(&self.default_in),
        };
        value.segment_fc(segment, all_sections)
    }
}

impl Default for BlockFcValue {
    fn default() -> Self {
        Self::new(BlockPortFcValue::new(FcValue::Fraction(1.0)))
    }
}

/// Tile cell of the served block ports, in the connection box's frame.
pub(crate) fn port_position(orientation: Orientation, channel: Position) -> Position {
    channel
        - match orientation {
            Orientation::South => Position::new(0, -1),
            Orientation::West => Position::new(-1, 0),
            _ => Position::ORIGIN,
        }
}

fn check_box(
    fabric: &Fabric,
    cbox: ModuleId,
    block: ModuleId,
    orientation: Orientation,
    position: Position,
) -> RoutingResult<()> {
    let dimension = fabric.cbox_dimension(cbox)?;
    if orientation.dimension().map(|d| d.perpendicular()) != Some(dimension) {
        return Err(RoutingError::BoxDimensionMismatch {
            cbox: fabric.module(cbox).name().to_string(),
            dimension,
            orientation,
        });
    }
    fabric.validate_block_edge(block, orientation, position)?;
    Ok(())
}

/// Routable ports of `block` on the `orientation` edge of its tile `position`.
fn served_ports(
    fabric: &Fabric,
    block: ModuleId,
    orientation: Orientation,
    position: Position,
) -> Vec<(PortId, Port)> {
    fabric
        .module(block)
        .ports()
        .filter(|(_, p)| {
            p.class == NetClass::BlockPort
                && p.position == position
                && (p.orientation == orientation || p.orientation.is_auto())
        })
        .map(|(id, p)| (id, p.clone()))
        .collect()
}

fn capacity(fabric: &Fabric, block: ModuleId) -> u32 {
    fabric.module(block).block_shape().map_or(1, |s| s.capacity)
}

/// Registers the segment and block port bridges of a connection box serving
/// the `orientation` edge of tile `position` of `block`. `channel` is the
/// tapped channel relative to the box.
pub fn populate_connection_box(
    fabric: &mut Fabric,
    cbox: ModuleId,
    segments: &[SegmentProtoId],
    block: ModuleId,
    orientation: Orientation,
    position: Position,
    channel: Position,
) -> RoutingResult<()> {
    check_box(fabric, cbox, block, orientation, position)?;
    let dimension = fabric.cbox_dimension(cbox)?;
    for &sgmt in segments {
        let length = fabric.segment(sgmt).length;
        for direction in Direction::ALL {
            let ori = Orientation::compose(dimension, direction);
            let out = SegmentBridgeId::new(channel, sgmt, ori, 0, SegmentBridgeType::Cboxout);
            fabric.get_or_create_node(cbox, out.into(), None)?;
            for section in 0..length {
                let inp = SegmentBridgeId::new(channel, sgmt, ori, section, SegmentBridgeType::Cboxin);
                fabric.get_or_create_node(cbox, inp.into(), None)?;
            }
        }
    }
    let at = port_position(orientation, channel);
    for (port, _) in served_ports(fabric, block, orientation, position) {
        for subblock in 0..capacity(fabric, block) {
            let node = BlockPortId::new(at, block, port, subblock);
            fabric.get_or_create_node(cbox, node.into(), None)?;
        }
    }
    Ok(())
}

fn node_bus(fabric: &Fabric, cbox: ModuleId, node: RoutingNode) -> Option<Bus> {
    fabric
        .module(cbox)
        .port_by_key(&PortKey::Node(node))
        .map(|p| Bus::port(cbox, p))
}

fn fc_node(fabric: &mut Fabric, cbox: ModuleId, node: RoutingNode, create: bool) -> RoutingResult<Option<Bus>> {
    if !create {
        return Ok(node_bus(fabric, cbox, node));
    }
    let port = fabric.get_or_create_node(cbox, node, None)?;
    Ok(Some(Bus::port(cbox, port)))
}

/// Connects a populated connection box according to `fc`.
///
/// Each served port is spread over the tracks of every segment with a
/// rolling index. Input ports count every (section, track) pair of a segment,
/// output ports only the tracks of section 0. Nodes missing from the box are
/// created when `create_if_absent` is set and skipped otherwise.
#[allow(clippy::too_many_arguments)]
pub fn generate_fc(
    fabric: &mut Fabric,
    cbox: ModuleId,
    segments: &[SegmentProtoId],
    block: ModuleId,
    orientation: Orientation,
    fc: &BlockFcValue,
    position: Position,
    channel: Position,
    create_if_absent: bool,
    sink: &DiagnosticSink,
) -> RoutingResult<()> {
    check_box(fabric, cbox, block, orientation, position)?;
    let dimension = fabric.cbox_dimension(cbox)?;
    let at = port_position(orientation, channel);
    let capacity = capacity(fabric, block);
    let mut iti = vec![0u32; segments.len()];
    let mut oti = vec![0u32; segments.len()];
    let mut edges = 0usize;

    for (port_id, port) in served_ports(fabric, block, orientation, position) {
        let input = port.direction == PortDirection::Input;
        for (si, &sgmt) in segments.iter().enumerate() {
            let proto = fabric.segment(sgmt).clone();
            let nc = fc.port_fc(&port, &proto, input)?;
            if nc == 0 {
                continue;
            }
            let imax = if input { proto.length * proto.width } else { proto.width };
            let istep = (imax / nc).max(1);
            for _ in 0..nc {
                for bit in 0..port.width {
                    for subblock in 0..capacity {
                        let idx = if input { iti[si] } else { oti[si] };
                        let (section, track) = if input {
                            (idx % proto.length, idx / proto.length)
                        } else {
                            (0, idx)
                        };
                        let bridge_type = if input {
                            SegmentBridgeType::Cboxin
                        } else {
                            SegmentBridgeType::Cboxout
                        };
                        for direction in Direction::ALL {
                            let ori = Orientation::compose(dimension, direction);
                            let port_node = BlockPortId::new(at, block, port_id, subblock);
                            let sgmt_node = SegmentBridgeId::new(channel, sgmt, ori, section, bridge_type);
                            let port_bus = fc_node(fabric, cbox, port_node.into(), create_if_absent)?;
                            let sgmt_bus = fc_node(fabric, cbox, sgmt_node.into(), create_if_absent)?;
                            let (Some(port_bus), Some(sgmt_bus)) = (port_bus, sgmt_bus) else {
                                log::trace!(
                                    "no {} or {} in '{}', skipped",
                                    RoutingNode::from(port_node),
                                    RoutingNode::from(sgmt_node),
                                    fabric.module(cbox).name()
                                );
                                continue;
                            };
                            let port_bit = fabric.bit(&port_bus.into(), bit)?;
                            let track_bit = fabric.bit(&sgmt_bus.into(), track)?;
                            let (from, to) = if input {
                                (track_bit, port_bit)
                            } else {
                                (port_bit, track_bit)
                            };
                            edges += connect_nodes(fabric, &[from], &[to], ConnectMode::Bitwise, sink)?;
                        }
                        let mut next = idx + istep;
                        if istep > 1 && next >= imax {
                            next += 1;
                        }
                        if input {
                            iti[si] = next % imax;
                        } else {
                            oti[si] = next % imax;
                        }
                    }
                }
            }
        }
    }
    log::debug!(
        "fc distribution in '{}': {} connection(s)",
        fabric.module(cbox).name(),
        edges
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_common::Dimension;
    use fabric_ir::BitRef;

    struct Fixture {
        fabric: Fabric,
        cbox: ModuleId,
        block: ModuleId,
        sgmt: SegmentProtoId,
        input: PortId,
        output: PortId,
    }

    /// A 1x1 logic block with one input and one output on its west edge and
    /// a vertical connection box serving that edge.
    fn west_box(width: u32, length: u32) -> Fixture {
        let mut fabric = Fabric::new();
        let sgmt = fabric.create_segment("l", width, length).unwrap();
        let block = fabric.create_logic_block("clb", 1, 1).unwrap();
        let input = fabric
            .add_block_port(block, "i", 1, PortDirection::Input, Position::ORIGIN, Orientation::West)
            .unwrap();
        let output = fabric
            .add_block_port(block, "o", 1, PortDirection::Output, Position::ORIGIN, Orientation::West)
            .unwrap();
        let cbox = fabric.create_connection_box("cbox_w", Dimension::Y).unwrap();
        Fixture {
            fabric,
            cbox,
            block,
            sgmt,
            input,
            output,
        }
    }

    fn populate(fx: &mut Fixture) {
        populate_connection_box(
            &mut fx.fabric,
            fx.cbox,
            &[fx.sgmt],
            fx.block,
            Orientation::West,
            Position::ORIGIN,
            Position::new(-1, 0),
        )
        .unwrap();
    }

    fn bridge(fx: &Fixture, port: PortId) -> Bus {
        node_bus(
            &fx.fabric,
            fx.cbox,
            BlockPortId::new(Position::ORIGIN, fx.block, port, 0).into(),
        )
        .unwrap()
    }

    fn proto(width: u32, length: u32) -> SegmentPrototype {
        SegmentPrototype {
            name: "l".to_string(),
            width,
            length,
        }
    }

    #[test]
    fn count_must_stay_below_width() {
        assert_eq!(FcValue::Count(1).connections(&proto(2, 2), true).unwrap(), 2);
        assert_eq!(FcValue::Count(1).connections(&proto(2, 2), false).unwrap(), 1);
        assert!(matches!(
            FcValue::Count(4).connections(&proto(4, 1), false),
            Err(RoutingError::InvalidFc { .. })
        ));
    }

    #[test]
    fn fraction_rounds_up_and_is_range_checked() {
        assert_eq!(FcValue::Fraction(0.5).connections(&proto(3, 1), false).unwrap(), 2);
        assert_eq!(FcValue::Fraction(0.25).connections(&proto(4, 2), true).unwrap(), 2);
        assert!(FcValue::Fraction(1.5).connections(&proto(4, 1), false).is_err());
        assert!(FcValue::Fraction(f64::NAN).connections(&proto(4, 1), false).is_err());
    }

    #[test]
    fn port_and_segment_overrides() {
        let fc = BlockFcValue::new(BlockPortFcValue::new(FcValue::Fraction(0.5)))
            .with_default_out(BlockPortFcValue::new(FcValue::Fraction(1.0)))
            .with_port_override(
                "x",
                BlockPortFcValue::new(FcValue::Count(0)).with_override("l", FcValue::Count(3)),
            );
        let seg = proto(4, 1);
        let i = Port::new("i", 1, PortDirection::Input, NetClass::BlockPort);
        let o = Port::new("o", 1, PortDirection::Output, NetClass::BlockPort);
        let x = Port::new("x", 1, PortDirection::Input, NetClass::BlockPort);
        assert_eq!(fc.port_fc(&i, &seg, true).unwrap(), 2);
        assert_eq!(fc.port_fc(&o, &seg, false).unwrap(), 4);
        assert_eq!(fc.port_fc(&x, &seg, true).unwrap(), 3);

        let same = BlockFcValue::new(BlockPortFcValue::new(FcValue::Fraction(0.5)));
        assert_eq!(same.port_fc(&o, &seg, false).unwrap(), 2);
    }

    #[test]
    fn populate_registers_bridges() {
        let mut fx = west_box(2, 2);
        populate(&mut fx);
        let cbox = fx.fabric.module(fx.cbox);
        for ori in [Orientation::North, Orientation::South] {
            let out = SegmentBridgeId::new(Position::new(-1, 0), fx.sgmt, ori, 0, SegmentBridgeType::Cboxout);
            assert!(cbox.port_by_key(&PortKey::Node(out.into())).is_some());
            for section in 0..2 {
                let inp = SegmentBridgeId::new(Position::new(-1, 0), fx.sgmt, ori, section, SegmentBridgeType::Cboxin);
                assert!(cbox.port_by_key(&PortKey::Node(inp.into())).is_some());
            }
        }
        // block input becomes a box output and vice versa
        let i = bridge(&fx, fx.input);
        let o = bridge(&fx, fx.output);
        assert_eq!(fx.fabric.bus_port(i).direction, PortDirection::Output);
        assert_eq!(fx.fabric.bus_port(o).direction, PortDirection::Input);
    }

    #[test]
    fn box_dimension_must_match_edge() {
        let mut fx = west_box(2, 1);
        let horizontal = fx.fabric.create_connection_box("cbox_x", Dimension::X).unwrap();
        let err = populate_connection_box(
            &mut fx.fabric,
            horizontal,
            &[fx.sgmt],
            fx.block,
            Orientation::West,
            Position::ORIGIN,
            Position::new(-1, 0),
        )
        .unwrap_err();
        assert!(matches!(err, RoutingError::BoxDimensionMismatch { .. }));
    }

    #[test]
    fn half_fc_spreads_input_over_even_tracks() {
        let mut fx = west_box(4, 1);
        populate(&mut fx);
        let fc = BlockFcValue::new(BlockPortFcValue::new(FcValue::Fraction(0.5)));
        let sink = DiagnosticSink::new();
        generate_fc(
            &mut fx.fabric,
            fx.cbox,
            &[fx.sgmt],
            fx.block,
            Orientation::West,
            &fc,
            Position::ORIGIN,
            Position::new(-1, 0),
            false,
            &sink,
        )
        .unwrap();
        let i = bridge(&fx, fx.input);
        let sources = fx.fabric.get_multisource(i).unwrap();
        // two tracks in each of the two directions
        assert_eq!(sources[0].len(), 4);
        for ori in [Orientation::North, Orientation::South] {
            let cbi = node_bus(
                &fx.fabric,
                fx.cbox,
                SegmentBridgeId::new(Position::new(-1, 0), fx.sgmt, ori, 0, SegmentBridgeType::Cboxin).into(),
            )
            .unwrap();
            for track in [0, 2] {
                let bit = fx.fabric.bit(&cbi.into(), track).unwrap();
                assert!(sources[0].contains(&bit));
            }
        }
    }

    #[test]
    fn full_fc_output_reaches_every_track() {
        let mut fx = west_box(4, 1);
        populate(&mut fx);
        let fc = BlockFcValue::default();
        let sink = DiagnosticSink::new();
        generate_fc(
            &mut fx.fabric,
            fx.cbox,
            &[fx.sgmt],
            fx.block,
            Orientation::West,
            &fc,
            Position::ORIGIN,
            Position::new(-1, 0),
            false,
            &sink,
        )
        .unwrap();
        let cbo = node_bus(
            &fx.fabric,
            fx.cbox,
            SegmentBridgeId::new(Position::new(-1, 0), fx.sgmt, Orientation::North, 0, SegmentBridgeType::Cboxout)
                .into(),
        )
        .unwrap();
        let sources = fx.fabric.get_multisource(cbo).unwrap();
        assert!(sources.iter().all(|s| s.len() == 1));
        assert!(sink.diagnostics().is_empty());
    }

    fn fc_unpopulated(fx: &mut Fixture, create_if_absent: bool) {
        let sink = DiagnosticSink::new();
        generate_fc(
            &mut fx.fabric,
            fx.cbox,
            &[fx.sgmt],
            fx.block,
            Orientation::West,
            &BlockFcValue::default(),
            Position::ORIGIN,
            Position::new(-1, 0),
            create_if_absent,
            &sink,
        )
        .unwrap();
    }

    #[test]
    fn unpopulated_box_gets_nodes_on_demand() {
        let mut fx = west_box(2, 1);
        fc_unpopulated(&mut fx, true);
        let i = bridge(&fx, fx.input);
        let sources = fx.fabric.get_multisource(i).unwrap();
        assert_eq!(sources[0].len(), 4);
        let o = bridge(&fx, fx.output);
        assert_eq!(fx.fabric.get_sinks(BitRef { bus: o, index: 0 }).len(), 4);
    }

    #[test]
    fn unpopulated_box_stays_empty_without_creation() {
        let mut fx = west_box(2, 1);
        fc_unpopulated(&mut fx, false);
        assert_eq!(fx.fabric.module(fx.cbox).port_count(), 0);
    }
}
