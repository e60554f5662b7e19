//! Ports, port keys and net classes.

use crate::ids::GlobalId;
use crate::node::{BlockPortId, RoutingNode};
use fabric_common::{Orientation, Position};
use serde::{Deserialize, Serialize};

/// The direction of a port on a module boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Data flows into the module.
    Input,
    /// Data flows out of the module.
    Output,
}

impl PortDirection {
    /// Returns the opposite direction.
    pub fn opposite(self) -> PortDirection {
        match self {
            PortDirection::Input => PortDirection::Output,
            PortDirection::Output => PortDirection::Input,
        }
    }
}

/// What a net carries, used by downstream passes to pick emission rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetClass {
    /// Off-fabric IO (`exti`/`exto` and their external proxies).
    Io,
    /// A global wire.
    Global,
    /// Switch data pins.
    Switch,
    /// Configuration bits.
    Config,
    /// A user-visible block port.
    BlockPort,
    /// A routing node or bridge.
    Node,
    /// Anything on a leaf primitive.
    Primitive,
}

/// Hashable key identifying a port within its module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKey {
    /// A port addressed by name only.
    Name(String),
    /// A routing node or bridge.
    Node(RoutingNode),
    /// An external IO proxy of a block port instance.
    External(BlockPortId),
    /// A hierarchical input for a global wire.
    Global(GlobalId),
}

impl From<RoutingNode> for PortKey {
    fn from(node: RoutingNode) -> Self {
        PortKey::Node(node)
    }
}

/// A port on a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Port name, unique within the module.
    pub name: String,
    /// Lookup key.
    pub key: PortKey,
    /// Bit width.
    pub width: u32,
    /// Direction of data flow.
    pub direction: PortDirection,
    /// What the port carries.
    pub class: NetClass,
    /// Tile offset inside the block. Only meaningful for block ports.
    pub position: Position,
    /// Block edge the port faces. Only meaningful for block ports.
    pub orientation: Orientation,
    /// The global wire feeding this port, if any.
    pub global: Option<GlobalId>,
}

impl Port {
    /// Creates a port keyed by its name, with no placement.
    pub fn new(name: impl Into<String>, width: u32, direction: PortDirection, class: NetClass) -> Self {
        let name = name.into();
        Self {
            key: PortKey::Name(name.clone()),
            name,
            width,
            direction,
            class,
            position: Position::ORIGIN,
            orientation: Orientation::Auto,
            global: None,
        }
    }

    /// Replaces the lookup key.
    pub fn with_key(mut self, key: PortKey) -> Self {
        self.key = key;
        self
    }

    /// Sets the block-edge placement.
    pub fn placed(mut self, position: Position, orientation: Orientation) -> Self {
        self.position = position;
        self.orientation = orientation;
        self
    }

    /// Returns the routing node this port represents, if any.
    pub fn node(&self) -> Option<RoutingNode> {
        match self.key {
            PortKey::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Returns `true` for input ports.
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }
}
