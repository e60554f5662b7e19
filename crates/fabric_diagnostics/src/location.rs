//! Structural locations inside a module hierarchy.

use fabric_common::Position;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where in the architecture a diagnostic was raised.
///
/// `module` is a hierarchical path such as `top/tileinst_x0y0`; `position` is
/// the grid position in that module's frame when one is meaningful.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Hierarchical module path.
    pub module: String,
    /// Grid position inside the module, if any.
    pub position: Option<Position>,
}

impl Location {
    /// A location naming only a module.
    pub fn module(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            position: None,
        }
    }

    /// A location naming a module and a grid position inside it.
    pub fn at(module: impl Into<String>, position: Position) -> Self {
        Self {
            module: module.into(),
            position: Some(position),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{} @ {}", self.module, pos),
            None => f.write_str(&self.module),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_position() {
        let loc = Location::at("top/tileinst_x1y0", Position::new(0, -1));
        assert_eq!(loc.to_string(), "top/tileinst_x1y0 @ (0, -1)");
    }

    #[test]
    fn display_module_only() {
        assert_eq!(Location::module("sbox").to_string(), "sbox");
    }
}
