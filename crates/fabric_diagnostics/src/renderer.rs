//! Diagnostic rendering for human-readable output.

use crate::diagnostic::Diagnostic;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-like terminal format:
///
/// ```text
/// warning[W001]: 4 sources cannot drive 2 sinks bit-wise
///   --> cbox_io_e @ (0, 0)
///    = note: ...
///    = help: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in the header line.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn header(&self, diag: &Diagnostic) -> String {
        let head = format!("{}[{}]", diag.severity, diag.code);
        if !self.color {
            return head;
        }
        let ansi = match diag.severity {
            crate::Severity::Error => "31",
            crate::Severity::Warning => "33",
            crate::Severity::Note => "36",
        };
        format!("\x1b[1;{ansi}m{head}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = format!("{}: {}\n", self.header(diag), diag.message);
        if let Some(location) = &diag.location {
            out.push_str(&format!("  --> {location}\n"));
        }
        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::DiagnosticCode;
    use crate::location::Location;
    use fabric_common::Position;

    #[test]
    fn render_with_location_and_notes() {
        let diag = Diagnostic::warning(DiagnosticCode::WIDTH_MISMATCH, "widths differ")
            .with_location(Location::at("cbox", Position::new(0, 0)))
            .with_note("4 sources, 2 sinks")
            .with_help("use a fully connected pattern");
        let out = TerminalRenderer::new(false).render(&diag);
        assert!(out.starts_with("warning[W001]: widths differ\n"));
        assert!(out.contains("  --> cbox @ (0, 0)\n"));
        assert!(out.contains("= note: 4 sources, 2 sinks"));
        assert!(out.contains("= help: use a fully connected pattern"));
    }

    #[test]
    fn render_without_location() {
        let diag = Diagnostic::note(DiagnosticCode::DANGLING_BOUNDARY, "pin left open");
        let out = TerminalRenderer::new(false).render(&diag);
        assert_eq!(out, "note[N003]: pin left open\n");
    }

    #[test]
    fn color_wraps_header() {
        let diag = Diagnostic::note(DiagnosticCode::DANGLING_BOUNDARY, "x");
        let out = TerminalRenderer::new(true).render(&diag);
        assert!(out.starts_with("\x1b[1;36mnote[N003]\x1b[0m"));
    }
}
