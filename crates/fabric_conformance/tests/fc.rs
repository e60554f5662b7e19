//! Connection-box FC distribution.

use fabric_common::{Orientation, Position};
use fabric_diagnostics::DiagnosticSink;
use fabric_ir::{
    BlockPortId, Bus, Fabric, ModuleId, Net, PortDirection, PortId, PortKey, RoutingNode, SegmentBridgeType,
    SegmentProtoId,
};
use fabric_routing::{
    BlockFcValue, BlockPortFcValue, ConnectionBoxLibrary, FcConnectionBoxLibrary, FcValue, RoutingError,
};

struct EastBox {
    fabric: Fabric,
    block: ModuleId,
    input: PortId,
    output: PortId,
    cbox: ModuleId,
}

/// A 1x1 logic block with a 2-bit input and a 1-bit output on its east edge,
/// boxed by `lib`.
fn east_box(sgmt: (u32, u32), fc: BlockFcValue) -> Result<EastBox, RoutingError> {
    let mut fabric = Fabric::new();
    let s: SegmentProtoId = fabric.create_segment("l", sgmt.0, sgmt.1).unwrap();
    let block = fabric.create_logic_block("clb", 1, 1).unwrap();
    let input = fabric
        .add_block_port(block, "in", 2, PortDirection::Input, Position::ORIGIN, Orientation::East)
        .unwrap();
    let output = fabric
        .add_block_port(block, "out", 1, PortDirection::Output, Position::ORIGIN, Orientation::East)
        .unwrap();
    let mut lib = FcConnectionBoxLibrary::new(vec![s], BlockFcValue::default());
    lib.set_block_fc(block, fc);
    let cbox = lib.get_or_create_cbox(
        &mut fabric,
        block,
        Orientation::East,
        Position::ORIGIN,
        Position::ORIGIN,
        &DiagnosticSink::new(),
    )?;
    Ok(EastBox {
        fabric,
        block,
        input,
        output,
        cbox,
    })
}

fn bridge(b: &EastBox, port: PortId) -> Bus {
    let node = BlockPortId::new(Position::ORIGIN, b.block, port, 0);
    let p = b.fabric.module(b.cbox).port_by_key(&PortKey::Node(node.into())).unwrap();
    Bus::port(b.cbox, p)
}

/// Track index of a driver or sink bit on a segment bridge of the box.
fn track(b: &EastBox, net: &Net, bridge_type: SegmentBridgeType) -> u32 {
    let (bus, index) = match net {
        Net::Slice(s) => (s.bus, s.start),
        Net::Bus(bus) => (*bus, 0),
        other => panic!("unexpected driver {other:?}"),
    };
    match b.fabric.bus_port(bus).node() {
        Some(RoutingNode::SegmentBridge(id)) => assert_eq!(id.bridge_type, bridge_type),
        other => panic!("unexpected node {other:?}"),
    }
    index
}

#[test]
fn half_fc_makes_two_connections_per_direction_and_bit() {
    let fc = BlockFcValue::new(BlockPortFcValue::new(FcValue::Fraction(0.5)));
    let b = east_box((4, 1), fc).unwrap();
    let sources = b.fabric.get_multisource(bridge(&b, b.input)).unwrap();
    assert_eq!(sources.len(), 2);
    for bit in &sources {
        // ceil(0.5 * 4) tracks in each of the two directions
        assert_eq!(bit.len(), 4);
        for net in bit {
            assert!(track(&b, net, SegmentBridgeType::Cboxin) < 4);
        }
    }
    // the rolling index gives the second bit different tracks
    assert_ne!(sources[0], sources[1]);
}

#[test]
fn output_reaches_every_track_at_full_fc() {
    let b = east_box((4, 1), BlockFcValue::default()).unwrap();
    let out = bridge(&b, b.output);
    let mut reached = 0;
    for (_, port) in b.fabric.module(b.cbox).ports() {
        let Some(RoutingNode::SegmentBridge(id)) = port.node() else {
            continue;
        };
        if id.bridge_type != SegmentBridgeType::Cboxout {
            continue;
        }
        let pid = b.fabric.module(b.cbox).port_by_key(&port.key).unwrap();
        for bit in b.fabric.get_multisource(Bus::port(b.cbox, pid)).unwrap() {
            assert_eq!(bit, vec![Net::from(out)]);
            reached += 1;
        }
    }
    // four tracks north and four south
    assert_eq!(reached, 8);
}

#[test]
fn longer_segments_multiply_input_connections() {
    let fc = BlockFcValue::new(BlockPortFcValue::new(FcValue::Count(1)));
    let b = east_box((2, 3), fc).unwrap();
    let sources = b.fabric.get_multisource(bridge(&b, b.input)).unwrap();
    // one track per section, three sections, two directions
    assert!(sources.iter().all(|bit| bit.len() == 6));
}

#[test]
fn fc_count_equal_to_width_is_rejected() {
    let fc = BlockFcValue::new(BlockPortFcValue::new(FcValue::Count(4)));
    let err = east_box((4, 1), fc).err().unwrap();
    assert!(matches!(err, RoutingError::InvalidFc { .. }));
}
