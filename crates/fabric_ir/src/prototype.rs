//! Routing segment prototypes and global wires.

use fabric_common::Position;
use serde::{Deserialize, Serialize};

/// A routing segment type: `width` parallel tracks, each spanning `length`
/// grid cells.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPrototype {
    /// Name used in generated port names.
    pub name: String,
    /// Number of tracks per direction.
    pub width: u32,
    /// Number of sections.
    pub length: u32,
}

/// Where a global wire enters the fabric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobalBinding {
    /// Tile position of the IO block feeding the global.
    pub position: Position,
    /// Sub-block of that IO block.
    pub subblock: u32,
}

/// A global wire (clock, reset, ...), distributed outside the routing network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Global {
    /// Name, also used for the hierarchical global-input ports.
    pub name: String,
    /// Bit width.
    pub width: u32,
    /// Clocks are always 1 bit wide.
    pub is_clock: bool,
    /// External input feeding this global, if bound.
    pub binding: Option<GlobalBinding>,
}
