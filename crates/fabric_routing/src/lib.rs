//! Routing passes over a [`fabric_ir::Fabric`].
//!
//! The passes turn blocks into a routable fabric bottom-up:
//!
//! 1. [`cboxify`] places connection boxes around a tile's block and
//!    [`netify_tile`] wires them to the sub-blocks, exposing the segment
//!    bridges as tile ports.
//! 2. [`sboxify`] fills an array's switch-box cells and [`netify_array`]
//!    resolves every bridge of its elements, deferring anything outside the
//!    array's channel coverage to the enclosing array.
//! 3. [`compile_architecture`] runs the whole flow from an architecture
//!    description and legalizes the result with configurable muxes.
//!
//! Switch and connection boxes come from pluggable libraries
//! ([`SwitchBoxLibrary`], [`ConnectionBoxLibrary`]); the Wilton and FC based
//! implementations cover the usual island-style fabrics.

#![warn(missing_docs)]

pub mod array;
pub mod builder;
pub mod cbox;
pub mod connect;
pub mod diagnostics;
pub mod error;
pub mod library;
pub mod sbox;
pub mod tile;

pub use array::{
    create_and_connect_cs_bridge, find_blockport_bridge_driver, find_segment_driver, netify_array, sboxify,
};
pub use builder::compile_architecture;
pub use cbox::{generate_fc, populate_connection_box, BlockFcValue, BlockPortFcValue, FcValue};
pub use connect::{connect_nodes, ConnectMode};
pub use error::{RoutingError, RoutingResult};
pub use library::{ConnectionBoxLibrary, FcConnectionBoxLibrary, SwitchBoxLibrary, WiltonSwitchBoxLibrary};
pub use sbox::{generate_wilton, populate_switch_box, SwitchBoxEnvironment, WiltonPattern};
pub use tile::{cboxify, netify_tile};
