//! Non-fatal reporting for architecture construction passes.
//!
//! Fatal conditions are returned as typed errors; everything a pass wants to
//! tell the user without aborting (skipped connections, dangling boundary
//! pins, unsupported bridges) is emitted as a [`Diagnostic`] into a shared
//! [`DiagnosticSink`], and rendered with a [`DiagnosticRenderer`].

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod location;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use location::Location;
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
