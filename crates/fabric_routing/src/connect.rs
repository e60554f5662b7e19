//! User-level connections inside switch and connection boxes.
//!
//! Routing boxes are captured in multi-source mode, so connecting several
//! sources to one sink only records candidates; [`Fabric::switchify`] turns
//! them into muxes once the box is complete.

use crate::diagnostics;
use crate::error::{RoutingError, RoutingResult};
use fabric_diagnostics::DiagnosticSink;
use fabric_ir::{Bus, BusKind, Fabric, ModuleKind, Net, NetClass, PortDirection, RoutingNode, SegmentBridgeType};

/// How a group of sources is paired with a group of sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Source `i` drives sink `i`. Both sides must have the same length.
    Bitwise,
    /// Every source drives every sink.
    FullyConnected,
}

/// Splits a bus into one net per bit.
pub fn bus_bits(fabric: &Fabric, bus: Bus) -> RoutingResult<Vec<Net>> {
    let net = Net::from(bus);
    (0..fabric.bus_width(bus))
        .map(|i| fabric.bit(&net, i).map_err(RoutingError::from))
        .collect()
}

fn underlying_bus(net: &Net) -> Option<Bus> {
    match net {
        Net::Bus(bus) => Some(*bus),
        Net::Slice(slice) => Some(slice.bus),
        _ => None,
    }
}

fn check_box_node(fabric: &Fabric, net: &Net, as_source: bool) -> RoutingResult<()> {
    let inaccessible = |module: String| RoutingError::InaccessibleNode {
        net: fabric.describe(net),
        module,
    };
    let Some(bus) = underlying_bus(net) else {
        return Err(inaccessible(String::new()));
    };
    let scope = fabric.module(bus.scope);
    let is_box = matches!(
        scope.kind(),
        ModuleKind::SwitchBox | ModuleKind::ConnectionBox { .. }
    );
    let BusKind::Port(port) = bus.kind else {
        return Err(inaccessible(scope.name().to_string()));
    };
    let port = scope.port(port);
    let ok = match port.node() {
        Some(node) if is_box && port.class == NetClass::Node => {
            if as_source {
                port.direction == PortDirection::Input
                    && (node.is_user_accessible() || is_cboxout_landing(node))
            } else {
                port.direction == PortDirection::Output && node.is_user_accessible()
            }
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(inaccessible(scope.name().to_string()))
    }
}

fn is_cboxout_landing(node: RoutingNode) -> bool {
    matches!(
        node,
        RoutingNode::SegmentBridge(id) if matches!(
            id.bridge_type,
            SegmentBridgeType::SboxinCboxout | SegmentBridgeType::SboxinCboxout2
        )
    )
}

/// Connects routing-box node bits. Returns the number of connections recorded.
///
/// Sources must be input node ports of the box (switch-box landings of
/// connection-box outputs included); sinks must be user-accessible output
/// node ports. A bit-wise connection between groups of different length is
/// skipped with a `W001` warning.
pub fn connect_nodes(
    fabric: &mut Fabric,
    sources: &[Net],
    sinks: &[Net],
    mode: ConnectMode,
    sink: &DiagnosticSink,
) -> RoutingResult<usize> {
    for net in sources {
        check_box_node(fabric, net, true)?;
    }
    for net in sinks {
        check_box_node(fabric, net, false)?;
    }
    let pairs: Vec<(Net, Net)> = match mode {
        ConnectMode::Bitwise => {
            if sources.len() != sinks.len() {
                let module = sources
                    .iter()
                    .chain(sinks)
                    .find_map(underlying_bus)
                    .map(|bus| fabric.module(bus.scope).name().to_string())
                    .unwrap_or_default();
                sink.emit(diagnostics::warn_width_mismatch(&module, sources.len(), sinks.len()));
                return Ok(0);
            }
            sources.iter().cloned().zip(sinks.iter().cloned()).collect()
        }
        ConnectMode::FullyConnected => sources
            .iter()
            .flat_map(|s| sinks.iter().map(move |k| (s.clone(), k.clone())))
            .collect(),
    };
    let count = pairs.len();
    for (source, dest) in pairs {
        fabric.connect(source, dest)?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_common::{Orientation, Position};
    use fabric_diagnostics::DiagnosticCode;
    use fabric_ir::{PortId, SegmentBridgeId, SegmentId, SegmentProtoId};

    struct SboxFixture {
        fabric: Fabric,
        sb: fabric_ir::ModuleId,
        input: PortId,
        output: PortId,
    }

    fn fixture(width: u32) -> SboxFixture {
        let mut fabric = Fabric::new();
        let sgmt: SegmentProtoId = fabric.create_segment("l1", width, 1).unwrap();
        let sb = fabric.create_switch_box("sb").unwrap();
        let out = SegmentId::new(Position::new(0, 1), sgmt, Orientation::North, 0);
        let inp = SegmentBridgeId::new(
            Position::new(1, 0),
            sgmt,
            Orientation::West,
            0,
            SegmentBridgeType::SboxinRegular,
        );
        let output = fabric.get_or_create_node(sb, out.into(), None).unwrap();
        let input = fabric.get_or_create_node(sb, inp.into(), None).unwrap();
        SboxFixture {
            fabric,
            sb,
            input,
            output,
        }
    }

    #[test]
    fn bitwise_pairs_bits_in_order() {
        let SboxFixture {
            mut fabric,
            sb,
            input,
            output,
        } = fixture(2);
        let src = bus_bits(&fabric, Bus::port(sb, input)).unwrap();
        let dst = bus_bits(&fabric, Bus::port(sb, output)).unwrap();
        let sink = DiagnosticSink::new();
        let n = connect_nodes(&mut fabric, &src, &dst, ConnectMode::Bitwise, &sink).unwrap();
        assert_eq!(n, 2);
        let sources = fabric.get_multisource(Bus::port(sb, output)).unwrap();
        assert_eq!(sources[0], vec![src[0].clone()]);
        assert_eq!(sources[1], vec![src[1].clone()]);
    }

    #[test]
    fn fully_connected_is_all_to_all() {
        let SboxFixture {
            mut fabric,
            sb,
            input,
            output,
        } = fixture(3);
        let src = bus_bits(&fabric, Bus::port(sb, input)).unwrap();
        let dst = bus_bits(&fabric, Bus::port(sb, output)).unwrap();
        let sink = DiagnosticSink::new();
        let n = connect_nodes(&mut fabric, &src, &dst, ConnectMode::FullyConnected, &sink).unwrap();
        assert_eq!(n, 9);
        let sources = fabric.get_multisource(Bus::port(sb, output)).unwrap();
        assert!(sources.iter().all(|bit| bit.len() == 3));
    }

    #[test]
    fn length_mismatch_warns_and_skips() {
        let SboxFixture {
            mut fabric,
            sb,
            input,
            output,
        } = fixture(2);
        let src = bus_bits(&fabric, Bus::port(sb, input)).unwrap();
        let dst = bus_bits(&fabric, Bus::port(sb, output)).unwrap();
        let sink = DiagnosticSink::new();
        let n = connect_nodes(&mut fabric, &src[..1], &dst, ConnectMode::Bitwise, &sink).unwrap();
        assert_eq!(n, 0);
        assert_eq!(sink.count(DiagnosticCode::WIDTH_MISMATCH), 1);
        assert!(!fabric.is_driven(Bus::port(sb, output)));
    }

    #[test]
    fn output_cannot_be_a_source() {
        let SboxFixture {
            mut fabric,
            sb,
            output,
            ..
        } = fixture(1);
        let out = bus_bits(&fabric, Bus::port(sb, output)).unwrap();
        let sink = DiagnosticSink::new();
        let err = connect_nodes(&mut fabric, &out, &out, ConnectMode::Bitwise, &sink).unwrap_err();
        assert!(matches!(err, RoutingError::InaccessibleNode { .. }));
    }
}
