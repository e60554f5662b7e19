//! Shared foundational types used across the fabric architecture compiler.
//!
//! This crate provides grid geometry (positions, dimensions, directions and
//! orientations) and the common internal error type.

#![warn(missing_docs)]

pub mod geometry;
pub mod result;

pub use geometry::{Dimension, Direction, Orientation, Position};
pub use result::{FabricResult, InternalError};
