//! Diagnostic codes with category prefixes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Error diagnostics, prefixed with `E`.
    Error,
    /// Warning diagnostics, prefixed with `W`.
    Warning,
    /// Informational notes, prefixed with `N`.
    Note,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
            Category::Note => 'N',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a number.
///
/// Displayed as the prefix followed by a zero-padded 3-digit number, e.g. `W001`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// A bit-wise routing box connection was skipped because the widths differ.
    pub const WIDTH_MISMATCH: DiagnosticCode = DiagnosticCode::new(Category::Warning, 1);
    /// A connection box drives a block input that lives in another tile.
    pub const UNSUPPORTED_BRIDGE: DiagnosticCode = DiagnosticCode::new(Category::Warning, 2);
    /// A routing pin on the outermost array has nothing to connect to.
    pub const DANGLING_BOUNDARY: DiagnosticCode = DiagnosticCode::new(Category::Note, 3);

    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Error.prefix(), 'E');
        assert_eq!(Category::Warning.prefix(), 'W');
        assert_eq!(Category::Note.prefix(), 'N');
    }

    #[test]
    fn well_known_codes_display() {
        assert_eq!(DiagnosticCode::WIDTH_MISMATCH.to_string(), "W001");
        assert_eq!(DiagnosticCode::UNSUPPORTED_BRIDGE.to_string(), "W002");
        assert_eq!(DiagnosticCode::DANGLING_BOUNDARY.to_string(), "N003");
        assert_eq!(DiagnosticCode::new(Category::Error, 42).to_string(), "E042");
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::WIDTH_MISMATCH;
        let json = serde_json::to_string(&code).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
