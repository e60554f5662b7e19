//! Diagnostics emitted by the routing passes.
//!
//! `W001` and `W002` flag connections the passes skip; `N003` records a
//! boundary pin of the top-level array that nothing drives or receives.

use fabric_common::Position;
use fabric_diagnostics::{Diagnostic, DiagnosticCode, Location};

/// A bit-wise routing-box connection with mismatched source and sink counts.
pub fn warn_width_mismatch(module: &str, sources: usize, sinks: usize) -> Diagnostic {
    Diagnostic::warning(
        DiagnosticCode::WIDTH_MISMATCH,
        format!("{sources} source bit(s) cannot be connected bit-wise to {sinks} sink bit(s)"),
    )
    .with_location(Location::module(module))
    .with_note("the connection was skipped")
}

/// A connection-box pin driving a block port that belongs to another tile.
pub fn warn_unsupported_bridge(tile: &str, pin: &str, position: Position) -> Diagnostic {
    Diagnostic::warning(
        DiagnosticCode::UNSUPPORTED_BRIDGE,
        format!("connection box pin `{pin}` drives a block port outside this tile"),
    )
    .with_location(Location::at(tile, position))
    .with_help("place the connection box in the tile owning the block port")
}

/// A boundary pin left unconnected.
pub fn note_dangling_boundary(array: &str, pin: &str, position: Position) -> Diagnostic {
    Diagnostic::note(
        DiagnosticCode::DANGLING_BOUNDARY,
        format!("`{pin}` reaches the array boundary and is left unconnected"),
    )
    .with_location(Location::at(array, position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_diagnostics::Severity;

    #[test]
    fn width_mismatch_is_a_warning() {
        let d = warn_width_mismatch("sb", 4, 2);
        assert_eq!(d.code, DiagnosticCode::WIDTH_MISMATCH);
        assert_eq!(d.severity, Severity::Warning);
        assert!(d.message.contains("4 source"));
    }

    #[test]
    fn dangling_boundary_is_a_note() {
        let d = note_dangling_boundary("top", "tileinst_x0y0.arr_l1_x0y0n", Position::ORIGIN);
        assert_eq!(d.code, DiagnosticCode::DANGLING_BOUNDARY);
        assert_eq!(d.severity, Severity::Note);
        assert_eq!(d.location.unwrap().position, Some(Position::ORIGIN));
    }
}
