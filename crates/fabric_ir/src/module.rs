//! Modules and instances.
//!
//! A [`Module`] owns its ports, its instances and its connection graph. An
//! [`Instance`] refers to its model by [`ModuleId`]; a model is shared by all
//! of its instances. Ports and instances are addressed both by dense IDs and
//! by hashable keys, so that routing nodes and grid positions map to the same
//! handle no matter which resolver asks for them.

use crate::arena::Arena;
use crate::connection::{Connections, SourceMode};
use crate::grid::ArrayData;
use crate::ids::{InstanceId, ModuleId, PortId};
use crate::port::{Port, PortKey};
use fabric_common::{Dimension, Orientation, Position};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Size and capacity of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockShape {
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
    /// Number of sub-block instances per tile.
    pub capacity: u32,
}

/// Which external ports an IO block has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IoKind {
    /// Only `exti`.
    Input,
    /// Only `exto`.
    Output,
    /// Both.
    Inout,
}

impl IoKind {
    /// Returns `true` if the block has an `exti` port.
    pub fn has_input(self) -> bool {
        matches!(self, IoKind::Input | IoKind::Inout)
    }

    /// Returns `true` if the block has an `exto` port.
    pub fn has_output(self) -> bool {
        matches!(self, IoKind::Output | IoKind::Inout)
    }
}

/// A tile: one block type, instantiated `capacity` times, plus the connection
/// boxes around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileData {
    /// The block model.
    pub block: ModuleId,
    /// Footprint and capacity, copied from the block.
    pub shape: BlockShape,
    /// IO tiles sit on one array edge; logic tiles use `Auto`.
    pub orientation: Orientation,
}

/// What a module is, plus the kind-specific data.
#[derive(Debug, Clone)]
pub enum ModuleKind {
    /// A leaf cell.
    Primitive,
    /// A configurable multiplexer with `inputs` data inputs.
    Switch {
        /// Data input count.
        inputs: u32,
    },
    /// An IO block.
    IoBlock {
        /// Footprint (always 1x1) and capacity.
        shape: BlockShape,
        /// Direction of the external pin.
        io: IoKind,
    },
    /// A logic block.
    LogicBlock {
        /// Footprint and capacity (always 1).
        shape: BlockShape,
    },
    /// A tile.
    Tile(TileData),
    /// A 2-D array of tiles and switch boxes.
    Array(ArrayData),
    /// A switch box.
    SwitchBox,
    /// A connection box on the channel of the given dimension.
    ConnectionBox {
        /// Dimension of the channel the box taps.
        dimension: Dimension,
    },
}

impl ModuleKind {
    /// Returns a short human-readable name.
    pub fn describe(&self) -> &'static str {
        match self {
            ModuleKind::Primitive => "a primitive",
            ModuleKind::Switch { .. } => "a switch",
            ModuleKind::IoBlock { .. } => "an IO block",
            ModuleKind::LogicBlock { .. } => "a logic block",
            ModuleKind::Tile(_) => "a tile",
            ModuleKind::Array(_) => "an array",
            ModuleKind::SwitchBox => "a switch box",
            ModuleKind::ConnectionBox { .. } => "a connection box",
        }
    }

    /// The connection mode modules of this kind start out in.
    pub fn source_mode(&self) -> SourceMode {
        match self {
            ModuleKind::Primitive
            | ModuleKind::IoBlock { .. }
            | ModuleKind::LogicBlock { .. }
            | ModuleKind::SwitchBox
            | ModuleKind::ConnectionBox { .. } => SourceMode::Multi,
            ModuleKind::Switch { .. } | ModuleKind::Tile(_) | ModuleKind::Array(_) => {
                SourceMode::Single
            }
        }
    }
}

/// Hashable key identifying an instance within its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceKey {
    /// Addressed by name.
    Name(String),
    /// Sub-block `i` of a tile.
    SubBlock(u32),
    /// Connection box of a tile, by tile-local position and edge.
    ConnectionBox(Position, Orientation),
    /// Switch box of an array, by grid position.
    SwitchBox(Position),
    /// Tile or nested array of an array, by anchor position.
    Element(Position),
}

/// An instance of a module inside another module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Instance name, unique within the parent.
    pub name: String,
    /// Lookup key.
    pub key: InstanceKey,
    /// The instantiated module.
    pub model: ModuleId,
    /// Anchor position in the parent's frame.
    pub position: Position,
}

/// A module in the fabric.
#[derive(Debug, Clone)]
pub struct Module {
    pub(crate) name: String,
    pub(crate) kind: ModuleKind,
    pub(crate) ports: Arena<PortId, Port>,
    pub(crate) port_keys: HashMap<PortKey, PortId>,
    pub(crate) port_names: HashMap<String, PortId>,
    pub(crate) instances: Arena<InstanceId, Instance>,
    pub(crate) instance_keys: HashMap<InstanceKey, InstanceId>,
    pub(crate) instance_names: HashMap<String, InstanceId>,
    pub(crate) connections: Connections,
}

impl Module {
    /// Creates an empty module of the given kind.
    pub fn new(name: impl Into<String>, kind: ModuleKind) -> Self {
        let mode = kind.source_mode();
        Self {
            name: name.into(),
            kind,
            ports: Arena::new(),
            port_keys: HashMap::new(),
            port_names: HashMap::new(),
            instances: Arena::new(),
            instance_keys: HashMap::new(),
            instance_names: HashMap::new(),
            connections: Connections::new(mode),
        }
    }

    /// The module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module kind.
    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    /// Returns the port with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this module.
    pub fn port(&self, id: PortId) -> &Port {
        &self.ports[id]
    }

    /// Iterates over ports in creation order.
    pub fn ports(&self) -> impl Iterator<Item = (PortId, &Port)> {
        self.ports.iter()
    }

    /// Number of ports.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Looks up a port by key.
    pub fn port_by_key(&self, key: &PortKey) -> Option<PortId> {
        self.port_keys.get(key).copied()
    }

    /// Looks up a port by name.
    pub fn port_by_name(&self, name: &str) -> Option<PortId> {
        self.port_names.get(name).copied()
    }

    /// Returns the instance with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this module.
    pub fn instance(&self, id: InstanceId) -> &Instance {
        &self.instances[id]
    }

    /// Iterates over instances in creation order.
    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.instances.iter()
    }

    /// Number of instances.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Looks up an instance by key.
    pub fn instance_by_key(&self, key: &InstanceKey) -> Option<InstanceId> {
        self.instance_keys.get(key).copied()
    }

    /// Looks up an instance by name.
    pub fn instance_by_name(&self, name: &str) -> Option<InstanceId> {
        self.instance_names.get(name).copied()
    }

    /// The connection graph.
    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    /// Returns `true` if sinks of this module may have several drivers.
    pub fn is_multi_source(&self) -> bool {
        self.connections.mode() == SourceMode::Multi
    }

    /// Returns the shape of a block module.
    pub fn block_shape(&self) -> Option<BlockShape> {
        match self.kind {
            ModuleKind::IoBlock { shape, .. } | ModuleKind::LogicBlock { shape } => Some(shape),
            _ => None,
        }
    }

    /// Returns `true` for IO blocks.
    pub fn is_io_block(&self) -> bool {
        matches!(self.kind, ModuleKind::IoBlock { .. })
    }

    /// Returns the tile data of a tile module.
    pub fn tile(&self) -> Option<&TileData> {
        match &self.kind {
            ModuleKind::Tile(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the grid of an array module.
    pub fn array(&self) -> Option<&ArrayData> {
        match &self.kind {
            ModuleKind::Array(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn array_mut(&mut self) -> Option<&mut ArrayData> {
        match &mut self.kind {
            ModuleKind::Array(data) => Some(data),
            _ => None,
        }
    }
}
