//! Switch-box population and the Wilton turn pattern.
//!
//! In a switch box's own frame the box sits at `(0, 0)`, the north-east
//! corner of the tile at the same position. A segment leaving the box
//! northwards starts in the vertical channel at `(0, 1)`, eastwards in the
//! horizontal channel at `(1, 0)`; southward and westward segments start in
//! the channels at `(0, 0)`.

use crate::connect::{connect_nodes, ConnectMode};
use crate::error::{RoutingError, RoutingResult};
use fabric_common::{Orientation, Position};
use fabric_diagnostics::DiagnosticSink;
use fabric_ir::{
    Bus, Fabric, ModuleId, Net, PortKey, RoutingNode, SegmentBridgeId, SegmentBridgeType,
    SegmentId, SegmentProtoId,
};
use std::collections::BTreeMap;

/// Which channels exist around a switch box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwitchBoxEnvironment {
    /// A channel leaves the box northwards.
    pub north: bool,
    /// A channel leaves the box eastwards.
    pub east: bool,
    /// A channel leaves the box southwards.
    pub south: bool,
    /// A channel leaves the box westwards.
    pub west: bool,
}

impl Default for SwitchBoxEnvironment {
    fn default() -> Self {
        Self {
            north: true,
            east: true,
            south: true,
            west: true,
        }
    }
}

impl SwitchBoxEnvironment {
    /// Returns `true` if a channel exists towards `orientation`.
    pub fn has(&self, orientation: Orientation) -> bool {
        match orientation {
            Orientation::North => self.north,
            Orientation::East => self.east,
            Orientation::South => self.south,
            Orientation::West => self.west,
            Orientation::Auto => false,
        }
    }

    /// Short tag listing the present channels, e.g. `nesw` or `sw`.
    pub fn tag(&self) -> String {
        Orientation::ALL
            .into_iter()
            .filter(|o| self.has(*o))
            .map(Orientation::initial)
            .collect()
    }
}

/// Input bridge of a segment travelling `orientation` as it arrives at the box.
pub(crate) fn innode(sgmt: SegmentProtoId, orientation: Orientation, section: u32) -> SegmentBridgeId {
    let position = match orientation {
        Orientation::South => Position::new(0, 1),
        Orientation::West => Position::new(1, 0),
        _ => Position::ORIGIN,
    };
    SegmentBridgeId::new(position, sgmt, orientation, section, SegmentBridgeType::SboxinRegular)
}

/// Segment driver leaving the box towards `orientation`.
pub(crate) fn outnode(sgmt: SegmentProtoId, orientation: Orientation, section: u32) -> SegmentId {
    let position = match orientation {
        Orientation::North => Position::new(0, 1),
        Orientation::East => Position::new(1, 0),
        _ => Position::ORIGIN,
    };
    SegmentId::new(position, sgmt, orientation, section)
}

/// Registers the segment drivers and input bridges of a switch box.
///
/// For every segment and every orientation with a channel, the box drives
/// the segment leaving that way, plus its later sections when the opposite
/// channel is missing and `drive_truncated` is set, and receives every
/// section of the segment arriving from that side.
pub fn populate_switch_box(
    fabric: &mut Fabric,
    sbox: ModuleId,
    segments: &[SegmentProtoId],
    env: SwitchBoxEnvironment,
    drive_truncated: bool,
) -> RoutingResult<()> {
    for &sgmt in segments {
        let length = fabric.segment(sgmt).length;
        for ori in Orientation::ALL {
            if !env.has(ori) {
                continue;
            }
            fabric.get_or_create_node(sbox, outnode(sgmt, ori, 0).into(), None)?;
            let truncated = if drive_truncated && !env.has(ori.opposite()) {
                length
            } else {
                1
            };
            for section in 1..truncated {
                fabric.get_or_create_node(sbox, outnode(sgmt, ori, section).into(), None)?;
            }
            for section in 0..length {
                fabric.get_or_create_node(sbox, innode(sgmt, ori.opposite(), section).into(), None)?;
            }
        }
    }
    Ok(())
}

/// The four clockwise turns, in the order the cycle-free offset accumulates.
pub const CLOCKWISE: [(Orientation, Orientation); 4] = [
    (Orientation::East, Orientation::South),
    (Orientation::South, Orientation::West),
    (Orientation::West, Orientation::North),
    (Orientation::North, Orientation::East),
];

/// The four counter-clockwise turns.
pub const COUNTERCLOCKWISE: [(Orientation, Orientation); 4] = [
    (Orientation::South, Orientation::East),
    (Orientation::East, Orientation::North),
    (Orientation::North, Orientation::West),
    (Orientation::West, Orientation::South),
];

/// Track offsets per turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiltonPattern {
    offsets: BTreeMap<(Orientation, Orientation), i64>,
}

impl WiltonPattern {
    /// The original Wilton offsets.
    pub fn classic() -> Self {
        Self::from_turns(CLOCKWISE.into_iter().zip([1, 1, -1, 1]).chain(
            COUNTERCLOCKWISE.into_iter().zip([-1, 1, 1, 1]),
        ))
    }

    /// Offsets whose wrap-around turns can be pruned into an acyclic graph.
    pub fn cfoptimal() -> Self {
        Self::from_turns(CLOCKWISE.into_iter().zip([1, 1, 1, -2]).chain(
            COUNTERCLOCKWISE.into_iter().zip([1, 1, 1, -2]),
        ))
    }

    /// A custom pattern. Turns left out make [`generate_wilton`] fail.
    pub fn from_turns(turns: impl IntoIterator<Item = ((Orientation, Orientation), i64)>) -> Self {
        Self {
            offsets: turns.into_iter().collect(),
        }
    }

    /// The offset of the `from`-`to` turn.
    pub fn offset(&self, from: Orientation, to: Orientation) -> Option<i64> {
        self.offsets.get(&(from, to)).copied()
    }
}

/// One list of bits per track, indexed by orientation then by global track.
type TrackBits = BTreeMap<Orientation, Vec<Vec<Net>>>;

fn port_bus(fabric: &Fabric, sbox: ModuleId, node: RoutingNode) -> Option<Bus> {
    fabric
        .module(sbox)
        .port_by_key(&PortKey::Node(node))
        .map(|p| Bus::port(sbox, p))
}

fn push_bits(fabric: &Fabric, lists: &mut [Vec<Net>], base: usize, bus: Bus) -> RoutingResult<()> {
    let net = Net::from(bus);
    for i in 0..fabric.bus_width(bus) {
        lists[base + i as usize].push(fabric.bit(&net, i)?);
    }
    Ok(())
}

/// Connects a populated switch box in a Wilton pattern.
///
/// Straight-through connections join the last input section to the leaving
/// driver. Each turn connects input track `i` to output track
/// `(W + i + offset) mod W`, `W` being the total width of `segments`. With
/// `cycle_free`, the last turn of each rotation skips outputs below the
/// offset accumulated over that rotation. `pattern` defaults to
/// [`WiltonPattern::cfoptimal`] for cycle-free boxes and to
/// [`WiltonPattern::classic`] otherwise.
pub fn generate_wilton(
    fabric: &mut Fabric,
    sbox: ModuleId,
    segments: &[SegmentProtoId],
    pattern: Option<&WiltonPattern>,
    cycle_free: bool,
    sink: &DiagnosticSink,
) -> RoutingResult<()> {
    let default_pattern;
    let pattern = match pattern {
        Some(p) => p,
        None => {
            default_pattern = if cycle_free {
                WiltonPattern::cfoptimal()
            } else {
                WiltonPattern::classic()
            };
            &default_pattern
        }
    };

    let mut inputs = TrackBits::new();
    let mut outputs = TrackBits::new();
    for ori in Orientation::ALL {
        let mut ins: Vec<Vec<Net>> = Vec::new();
        let mut outs: Vec<Vec<Net>> = Vec::new();
        for &sgmt in segments {
            let proto = fabric.segment(sgmt).clone();
            let base = ins.len();
            ins.resize(base + proto.width as usize, Vec::new());
            outs.resize(base + proto.width as usize, Vec::new());
            for section in 0..proto.length {
                if let Some(bus) = port_bus(fabric, sbox, innode(sgmt, ori, section).into()) {
                    push_bits(fabric, &mut ins, base, bus)?;
                }
                if let Some(bus) = port_bus(fabric, sbox, outnode(sgmt, ori, section).into()) {
                    push_bits(fabric, &mut outs, base, bus)?;
                }
            }
            let straight = (
                port_bus(fabric, sbox, innode(sgmt, ori, proto.length - 1).into()),
                port_bus(fabric, sbox, outnode(sgmt, ori, 0).into()),
            );
            if let (Some(source), Some(dest)) = straight {
                connect_nodes(fabric, &[source.into()], &[dest.into()], ConnectMode::Bitwise, sink)?;
            }
        }
        inputs.insert(ori, ins);
        outputs.insert(ori, outs);
    }

    let total: i64 = segments
        .iter()
        .map(|s| i64::from(fabric.segment(*s).width))
        .sum();
    let mut turns = 0usize;
    for rotation in [CLOCKWISE, COUNTERCLOCKWISE] {
        let mut class_offset = 0i64;
        for (turn_id, (from, to)) in rotation.into_iter().enumerate() {
            let offset = pattern
                .offset(from, to)
                .ok_or(RoutingError::MissingTurnOffset { from, to })?;
            let cycle_free_offset = class_offset + offset;
            let (Some(ins), Some(outs)) = (inputs.get(&from), outputs.get(&to)) else {
                continue;
            };
            for (i, in_bits) in ins.iter().enumerate() {
                let o = (total + i as i64 + offset).rem_euclid(total);
                let out_bits = &outs[o as usize];
                if in_bits.is_empty() || out_bits.is_empty() {
                    continue;
                }
                if cycle_free && turn_id == 3 && o < cycle_free_offset {
                    continue;
                }
                turns += connect_nodes(fabric, in_bits, out_bits, ConnectMode::FullyConnected, sink)?;
            }
            class_offset += offset;
        }
    }
    log::debug!(
        "wilton pattern in '{}': {} turn connection(s)",
        fabric.module(sbox).name(),
        turns
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_ir::PortDirection;

    fn one_segment(width: u32, length: u32) -> (Fabric, ModuleId, SegmentProtoId) {
        let mut f = Fabric::new();
        let s = f.create_segment("l", width, length).unwrap();
        let sb = f.create_switch_box("sb").unwrap();
        (f, sb, s)
    }

    fn has_node(f: &Fabric, sb: ModuleId, node: impl Into<RoutingNode>) -> bool {
        f.module(sb).port_by_key(&PortKey::Node(node.into())).is_some()
    }

    #[test]
    fn environment_tag_lists_present_sides() {
        assert_eq!(SwitchBoxEnvironment::default().tag(), "nesw");
        let env = SwitchBoxEnvironment {
            north: false,
            east: false,
            ..Default::default()
        };
        assert_eq!(env.tag(), "sw");
        assert!(!env.has(Orientation::Auto));
    }

    #[test]
    fn full_environment_drives_only_section_zero() {
        let (mut f, sb, s) = one_segment(2, 3);
        populate_switch_box(&mut f, sb, &[s], SwitchBoxEnvironment::default(), true).unwrap();
        for ori in Orientation::ALL {
            assert!(has_node(&f, sb, outnode(s, ori, 0)));
            assert!(!has_node(&f, sb, outnode(s, ori, 1)));
            for section in 0..3 {
                assert!(has_node(&f, sb, innode(s, ori, section)));
            }
        }
        // 4 drivers + 12 input bridges
        assert_eq!(f.module(sb).port_count(), 16);
    }

    #[test]
    fn missing_opposite_channel_drives_truncated_sections() {
        let (mut f, sb, s) = one_segment(1, 3);
        let env = SwitchBoxEnvironment {
            north: false,
            ..Default::default()
        };
        populate_switch_box(&mut f, sb, &[s], env, true).unwrap();
        assert!(has_node(&f, sb, outnode(s, Orientation::South, 1)));
        assert!(has_node(&f, sb, outnode(s, Orientation::South, 2)));
        assert!(!has_node(&f, sb, outnode(s, Orientation::North, 0)));
        assert!(!has_node(&f, sb, innode(s, Orientation::South, 0)));

        let (mut f, sb, s) = one_segment(1, 3);
        populate_switch_box(&mut f, sb, &[s], env, false).unwrap();
        assert!(!has_node(&f, sb, outnode(s, Orientation::South, 1)));
    }

    #[test]
    fn drivers_are_outputs() {
        let (mut f, sb, s) = one_segment(1, 1);
        populate_switch_box(&mut f, sb, &[s], SwitchBoxEnvironment::default(), true).unwrap();
        let p = f
            .module(sb)
            .port_by_key(&PortKey::Node(outnode(s, Orientation::East, 0).into()))
            .unwrap();
        assert_eq!(f.module(sb).port(p).direction, PortDirection::Output);
        assert_eq!(f.module(sb).port(p).name, "sgmt_l_x1y0e");
    }

    #[test]
    fn straight_connection_uses_last_section() {
        let (mut f, sb, s) = one_segment(2, 2);
        populate_switch_box(&mut f, sb, &[s], SwitchBoxEnvironment::default(), true).unwrap();
        let sink = DiagnosticSink::new();
        generate_wilton(&mut f, sb, &[s], None, false, &sink).unwrap();
        let last = port_bus(&f, sb, innode(s, Orientation::North, 1).into()).unwrap();
        let out = port_bus(&f, sb, outnode(s, Orientation::North, 0).into()).unwrap();
        let sources = f.get_multisource(out).unwrap();
        let straight = f.bit(&last.into(), 0).unwrap();
        assert!(sources[0].contains(&straight));
    }

    #[test]
    fn classic_turn_offsets() {
        let (mut f, sb, s) = one_segment(4, 1);
        populate_switch_box(&mut f, sb, &[s], SwitchBoxEnvironment::default(), true).unwrap();
        let sink = DiagnosticSink::new();
        generate_wilton(&mut f, sb, &[s], None, false, &sink).unwrap();
        // E->S has offset +1: input track 0 of the eastbound segment reaches
        // output track 1 of the southbound one.
        let east_in = port_bus(&f, sb, innode(s, Orientation::East, 0).into()).unwrap();
        let south_out = port_bus(&f, sb, outnode(s, Orientation::South, 0).into()).unwrap();
        let sources = f.get_multisource(south_out).unwrap();
        assert!(sources[1].contains(&f.bit(&east_in.into(), 0).unwrap()));
        assert!(!sources[0].contains(&f.bit(&east_in.into(), 0).unwrap()));
        assert_eq!(sink.count(fabric_diagnostics::DiagnosticCode::WIDTH_MISMATCH), 0);
    }

    #[test]
    fn missing_turn_is_fatal() {
        let (mut f, sb, s) = one_segment(1, 1);
        populate_switch_box(&mut f, sb, &[s], SwitchBoxEnvironment::default(), true).unwrap();
        let partial = WiltonPattern::from_turns(CLOCKWISE.into_iter().zip([1, 1, 1, -2]));
        let sink = DiagnosticSink::new();
        let err = generate_wilton(&mut f, sb, &[s], Some(&partial), false, &sink).unwrap_err();
        assert!(matches!(
            err,
            RoutingError::MissingTurnOffset {
                from: Orientation::South,
                to: Orientation::East
            }
        ));
    }

    #[test]
    fn cycle_free_prunes_wraparound_turn() {
        let (mut f, sb, s) = one_segment(4, 1);
        populate_switch_box(&mut f, sb, &[s], SwitchBoxEnvironment::default(), true).unwrap();
        let sink = DiagnosticSink::new();
        generate_wilton(&mut f, sb, &[s], None, true, &sink).unwrap();
        // N->E is the fourth clockwise turn; accumulated offset 1 + 1 + 1 - 2 = 1,
        // so output track 0 gets no turn from the north.
        let north_in = port_bus(&f, sb, innode(s, Orientation::North, 0).into()).unwrap();
        let east_out = port_bus(&f, sb, outnode(s, Orientation::East, 0).into()).unwrap();
        let sources = f.get_multisource(east_out).unwrap();
        let from_north = |bit: &Net| {
            (0..4).any(|i| f.bit(&north_in.into(), i).unwrap() == *bit)
        };
        assert!(!sources[0].iter().any(from_north));
        assert!(sources[1].iter().any(from_north));
    }
}
