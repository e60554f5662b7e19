//! Parsing and validation of TOML architecture descriptions.
//!
//! This crate reads an architecture file and produces a strongly-typed
//! [`ArchitectureConfig`] describing segments, globals, blocks, tiles, grid
//! placements and switch-box options. Cross-references between sections are
//! checked by [`validate_architecture`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_architecture, load_architecture_from_str, validate_architecture};
pub use types::*;
