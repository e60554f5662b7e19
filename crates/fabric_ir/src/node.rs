//! Routing node addressing.
//!
//! Routing nodes are identified by immutable value types that are compared
//! and hashed structurally, and are used directly as port keys. Every id
//! carries a `position` anchor expressed in the frame of the module that
//! owns the port; moving an id into a child instance's frame is a plain
//! subtraction of the instance position (see [`RoutingNode::moved`]).

use crate::ids::{ModuleId, PortId, SegmentProtoId};
use fabric_common::{Orientation, Position};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// The role of a port that proxies a segment across a module boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum SegmentBridgeType {
    /// Switch box input fed by the segment itself.
    SboxinRegular,
    /// Switch box input fed by the first connection box output on this segment.
    SboxinCboxout,
    /// Switch box input fed by the second connection box output on this segment.
    SboxinCboxout2,
    /// Connection box input tapping the segment.
    Cboxin,
    /// Connection box output driving onto the segment.
    Cboxout,
    /// Tile or array input carrying the segment in from outside.
    ArrayRegular,
    /// Tile or array output carrying the first connection box output out.
    ArrayCboxout,
    /// Tile or array output carrying the second connection box output out.
    ArrayCboxout2,
}

impl SegmentBridgeType {
    /// Returns the short prefix used in generated port names.
    pub fn prefix(self) -> &'static str {
        match self {
            SegmentBridgeType::SboxinRegular => "sbir",
            SegmentBridgeType::SboxinCboxout => "sbic",
            SegmentBridgeType::SboxinCboxout2 => "sbid",
            SegmentBridgeType::Cboxin => "cbi",
            SegmentBridgeType::Cboxout => "cbo",
            SegmentBridgeType::ArrayRegular => "arr",
            SegmentBridgeType::ArrayCboxout => "arc",
            SegmentBridgeType::ArrayCboxout2 => "ard",
        }
    }

    /// Returns `true` for the three switch box input kinds.
    pub fn is_sbox_input(self) -> bool {
        matches!(
            self,
            SegmentBridgeType::SboxinRegular
                | SegmentBridgeType::SboxinCboxout
                | SegmentBridgeType::SboxinCboxout2
        )
    }

    /// Returns `true` for the three array-element bridge kinds.
    pub fn is_array_bridge(self) -> bool {
        matches!(
            self,
            SegmentBridgeType::ArrayRegular
                | SegmentBridgeType::ArrayCboxout
                | SegmentBridgeType::ArrayCboxout2
        )
    }
}

/// The output of a segment driver, `section` sections away from its origin.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SegmentId {
    /// Anchor of this section in the owning module's frame.
    pub position: Position,
    /// Segment prototype.
    pub prototype: SegmentProtoId,
    /// Direction the segment travels.
    pub orientation: Orientation,
    /// Number of sections between the driver and this anchor.
    pub section: u32,
}

impl SegmentId {
    /// Creates a new segment id.
    pub fn new(
        position: Position,
        prototype: SegmentProtoId,
        orientation: Orientation,
        section: u32,
    ) -> Self {
        Self {
            position,
            prototype,
            orientation,
            section,
        }
    }

    /// Returns this id translated by `offset`.
    pub fn moved(self, offset: Position) -> Self {
        Self {
            position: self.position + offset,
            ..self
        }
    }

    /// Returns the bridge of kind `bridge_type` proxying this section.
    pub fn to_bridge_id(self, bridge_type: SegmentBridgeType) -> SegmentBridgeId {
        SegmentBridgeId {
            position: self.position,
            prototype: self.prototype,
            orientation: self.orientation,
            section: self.section,
            bridge_type,
        }
    }
}

/// Walks `n` sections further along the segment.
impl Add<u32> for SegmentId {
    type Output = SegmentId;

    fn add(self, n: u32) -> SegmentId {
        SegmentId {
            position: self.position + self.orientation.step(n as i32),
            section: self.section + n,
            ..self
        }
    }
}

/// Walks `n` sections back towards the driver. `n` must not exceed `section`.
impl Sub<u32> for SegmentId {
    type Output = SegmentId;

    fn sub(self, n: u32) -> SegmentId {
        SegmentId {
            position: self.position - self.orientation.step(n as i32),
            section: self.section - n,
            ..self
        }
    }
}

/// A port proxying a segment section across a box, tile or array boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SegmentBridgeId {
    /// Anchor of the proxied section in the owning module's frame.
    pub position: Position,
    /// Segment prototype.
    pub prototype: SegmentProtoId,
    /// Direction the segment travels.
    pub orientation: Orientation,
    /// Section being proxied.
    pub section: u32,
    /// What the bridge connects.
    pub bridge_type: SegmentBridgeType,
}

impl SegmentBridgeId {
    /// Creates a new segment bridge id.
    pub fn new(
        position: Position,
        prototype: SegmentProtoId,
        orientation: Orientation,
        section: u32,
        bridge_type: SegmentBridgeType,
    ) -> Self {
        Self {
            position,
            prototype,
            orientation,
            section,
            bridge_type,
        }
    }

    /// Returns the segment driver id this bridge proxies.
    pub fn to_driver_id(self) -> SegmentId {
        SegmentId {
            position: self.position,
            prototype: self.prototype,
            orientation: self.orientation,
            section: self.section,
        }
    }

    /// Returns the same section with a different bridge kind.
    pub fn to_bridge_id(self, bridge_type: SegmentBridgeType) -> SegmentBridgeId {
        SegmentBridgeId {
            bridge_type,
            ..self
        }
    }

    /// Returns this id translated by `offset`.
    pub fn moved(self, offset: Position) -> Self {
        Self {
            position: self.position + offset,
            ..self
        }
    }
}

impl Add<u32> for SegmentBridgeId {
    type Output = SegmentBridgeId;

    fn add(self, n: u32) -> SegmentBridgeId {
        (self.to_driver_id() + n).to_bridge_id(self.bridge_type)
    }
}

impl Sub<u32> for SegmentBridgeId {
    type Output = SegmentBridgeId;

    fn sub(self, n: u32) -> SegmentBridgeId {
        (self.to_driver_id() - n).to_bridge_id(self.bridge_type)
    }
}

/// A single sub-block's instance of a block port.
///
/// `position` is the tile the port sits on, in the owning module's frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct BlockPortId {
    /// Tile of the port in the owning module's frame.
    pub position: Position,
    /// The block declaring the port.
    pub block: ModuleId,
    /// The port on `block`.
    pub port: PortId,
    /// Sub-block index inside the tile.
    pub subblock: u32,
}

impl BlockPortId {
    /// Creates a new block port id.
    pub fn new(position: Position, block: ModuleId, port: PortId, subblock: u32) -> Self {
        Self {
            position,
            block,
            port,
            subblock,
        }
    }

    /// Returns this id translated by `offset`.
    pub fn moved(self, offset: Position) -> Self {
        Self {
            position: self.position + offset,
            ..self
        }
    }
}

/// Any routing node id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum RoutingNode {
    /// A segment driver.
    Segment(SegmentId),
    /// A segment bridge.
    SegmentBridge(SegmentBridgeId),
    /// A block port bridge.
    BlockPort(BlockPortId),
}

impl RoutingNode {
    /// Returns the anchor position.
    pub fn position(&self) -> Position {
        match self {
            RoutingNode::Segment(id) => id.position,
            RoutingNode::SegmentBridge(id) => id.position,
            RoutingNode::BlockPort(id) => id.position,
        }
    }

    /// Returns this id translated by `offset`.
    pub fn moved(self, offset: Position) -> Self {
        match self {
            RoutingNode::Segment(id) => RoutingNode::Segment(id.moved(offset)),
            RoutingNode::SegmentBridge(id) => RoutingNode::SegmentBridge(id.moved(offset)),
            RoutingNode::BlockPort(id) => RoutingNode::BlockPort(id.moved(offset)),
        }
    }

    /// Returns the segment prototype and section for segment-based ids.
    pub fn segment(&self) -> Option<(SegmentProtoId, u32)> {
        match self {
            RoutingNode::Segment(id) => Some((id.prototype, id.section)),
            RoutingNode::SegmentBridge(id) => Some((id.prototype, id.section)),
            RoutingNode::BlockPort(_) => None,
        }
    }

    /// Walks `steps` sections along a segment-based id; negative steps walk
    /// back towards the driver. Returns `None` for block port ids or when
    /// walking past section 0.
    pub fn walk(self, steps: i64) -> Option<RoutingNode> {
        let (_, section) = self.segment()?;
        if steps < 0 {
            let n = u32::try_from(-steps).ok()?;
            if n > section {
                return None;
            }
            return Some(match self {
                RoutingNode::Segment(id) => RoutingNode::Segment(id - n),
                RoutingNode::SegmentBridge(id) => RoutingNode::SegmentBridge(id - n),
                RoutingNode::BlockPort(_) => return None,
            });
        }
        let n = u32::try_from(steps).ok()?;
        Some(match self {
            RoutingNode::Segment(id) => RoutingNode::Segment(id + n),
            RoutingNode::SegmentBridge(id) => RoutingNode::SegmentBridge(id + n),
            RoutingNode::BlockPort(_) => return None,
        })
    }

    /// Returns `true` if user-level connections may target this node inside
    /// a routing box.
    pub fn is_user_accessible(&self) -> bool {
        match self {
            RoutingNode::Segment(_) | RoutingNode::BlockPort(_) => true,
            RoutingNode::SegmentBridge(id) => matches!(
                id.bridge_type,
                SegmentBridgeType::SboxinRegular
                    | SegmentBridgeType::Cboxin
                    | SegmentBridgeType::Cboxout
            ),
        }
    }
}

impl From<SegmentId> for RoutingNode {
    fn from(id: SegmentId) -> Self {
        RoutingNode::Segment(id)
    }
}

impl From<SegmentBridgeId> for RoutingNode {
    fn from(id: SegmentBridgeId) -> Self {
        RoutingNode::SegmentBridge(id)
    }
}

impl From<BlockPortId> for RoutingNode {
    fn from(id: BlockPortId) -> Self {
        RoutingNode::BlockPort(id)
    }
}

impl fmt::Display for RoutingNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingNode::Segment(id) => write!(
                f,
                "sgmt[{} @ {} {} sec {}]",
                id.prototype, id.position, id.orientation, id.section
            ),
            RoutingNode::SegmentBridge(id) => write!(
                f,
                "{}[{} @ {} {} sec {}]",
                id.bridge_type.prefix(),
                id.prototype,
                id.position,
                id.orientation,
                id.section
            ),
            RoutingNode::BlockPort(id) => write!(
                f,
                "blkp[{}.{} @ {} sub {}]",
                id.block, id.port, id.position, id.subblock
            ),
        }
    }
}
