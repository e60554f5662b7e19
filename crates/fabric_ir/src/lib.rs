//! The module graph of a reconfigurable fabric under construction.
//!
//! A [`Fabric`] owns every [`Module`] (blocks, tiles, arrays, routing boxes and
//! switches), the routing [`SegmentPrototype`]s and the [`Global`] wires.
//! Modules expose ports keyed by routing node ids ([`RoutingNode`]), record
//! bit-level connections between ports and instance pins, and are legalized
//! into single-driver netlists by [`Fabric::switchify`].
//!
//! # Usage
//!
//! ```
//! use fabric_ir::{Bus, Fabric, MuxLibrary, NetClass, Port, PortDirection};
//!
//! let mut fabric = Fabric::new();
//! let sb = fabric.create_switch_box("sb").unwrap();
//! let a = fabric.add_port(sb, Port::new("a", 1, PortDirection::Input, NetClass::Node)).unwrap();
//! let b = fabric.add_port(sb, Port::new("b", 1, PortDirection::Input, NetClass::Node)).unwrap();
//! let o = fabric.add_port(sb, Port::new("o", 1, PortDirection::Output, NetClass::Node)).unwrap();
//! fabric.connect(Bus::port(sb, a), Bus::port(sb, o)).unwrap();
//! fabric.connect(Bus::port(sb, b), Bus::port(sb, o)).unwrap();
//!
//! let mut lib = MuxLibrary::new();
//! assert_eq!(fabric.switchify(sb, &mut lib).unwrap(), 1);
//! ```

#![warn(missing_docs)]

pub mod arena;
pub mod connection;
pub mod error;
pub mod fabric;
pub mod graph;
pub mod grid;
pub mod ids;
pub mod legalize;
pub mod module;
pub mod naming;
pub mod net;
mod netops;
pub mod node;
mod nodes;
pub mod port;
pub mod prototype;

pub use arena::{Arena, ArenaId};
pub use connection::{BitKey, Connections, Driver, SourceMode};
pub use error::{IrError, IrResult};
pub use fabric::{Fabric, IO_INPUT, IO_OUTPUT};
pub use graph::{ConnectionGraph, GraphNode};
pub use grid::{ArrayData, ChannelCoverage, Footprint, GridCell, SboxOccupant};
pub use ids::{GlobalId, InstanceId, ModuleId, PortId, SegmentProtoId};
pub use legalize::{MuxLibrary, SwitchLibrary, SWITCH_CONFIG, SWITCH_INPUT, SWITCH_OUTPUT};
pub use module::{BlockShape, Instance, InstanceKey, IoKind, Module, ModuleKind, TileData};
pub use net::{Bit, BitRef, Bus, BusKind, Const, ConstBit, Net, Slice};
pub use node::{BlockPortId, RoutingNode, SegmentBridgeId, SegmentBridgeType, SegmentId};
pub use port::{NetClass, Port, PortDirection, PortKey};
pub use prototype::{Global, GlobalBinding, SegmentPrototype};
