//! Conformance test helpers for the fabric routing engine.
//!
//! Provides architecture fixtures and shared functions that compile them
//! through the full construction flow (tiles → array → legalization) and
//! return structured results for assertion in integration tests.

#![warn(missing_docs)]

use fabric_config::{load_architecture_from_str, ArchitectureConfig};
use fabric_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use fabric_ir::{Fabric, GraphNode, ModuleId};
use fabric_routing::{compile_architecture, RoutingResult};
use petgraph::Direction;

/// A 1x1 fabric holding one inout IO tile on the west edge, with a single
/// 4-track routing segment of length 1.
pub const IO_ARCH: &str = r#"
[architecture]
name = "top"
width = 1
height = 1

[architecture.coverage]
north = true
east = true
south = true
west = true

[[segments]]
name = "l1"
width = 4
length = 1

[[blocks]]
name = "iob"
kind = "io"
io = "inout"

[[blocks.ports]]
name = "outpad"
direction = "input"

[[blocks.ports]]
name = "inpad"
direction = "output"

[[blocks.connections]]
from = "exti"
to = "inpad"

[[blocks.connections]]
from = "outpad"
to = "exto"

[[tiles]]
name = "iotile"
block = "iob"
orientation = "west"

[[placements]]
tile = "iotile"
position = [0, 0]
"#;

/// A 3x1 fabric: an IO tile feeding a clock at (0, 0), a logic tile at
/// (1, 0) using it, and a second IO tile at (2, 0).
pub const CLOCKED_ARCH: &str = r#"
[architecture]
name = "top"
width = 3
height = 1

[architecture.coverage]
north = true
east = true
south = true
west = true

[[segments]]
name = "l1"
width = 4
length = 1

[[segments]]
name = "l2"
width = 2
length = 2

[[globals]]
name = "clk"
is_clock = true
position = [0, 0]

[[blocks]]
name = "iob"
kind = "io"
io = "inout"

[[blocks.ports]]
name = "outpad"
direction = "input"

[[blocks.ports]]
name = "inpad"
direction = "output"

[[blocks.connections]]
from = "exti"
to = "inpad"

[[blocks.connections]]
from = "outpad"
to = "exto"

[[blocks]]
name = "clb"
kind = "logic"

[blocks.fc]
default_in = 0.5
default_out = { default = 1.0, segments = { l2 = 1 } }

[[blocks.ports]]
name = "clk"
direction = "input"
global = "clk"

[[blocks.ports]]
name = "in"
direction = "input"
width = 2
orientation = "west"

[[blocks.ports]]
name = "out"
direction = "output"
orientation = "east"

[[tiles]]
name = "iotile_w"
block = "iob"
orientation = "west"

[[tiles]]
name = "iotile_e"
block = "iob"
orientation = "east"

[[tiles]]
name = "clbtile"
block = "clb"

[[placements]]
tile = "iotile_w"
position = [0, 0]

[[placements]]
tile = "clbtile"
position = [1, 0]

[[placements]]
tile = "iotile_e"
position = [2, 0]

[switch_box]
cycle_free = true
"#;

/// Result of compiling an architecture through the full flow.
pub struct CompileResult {
    /// The legalized fabric.
    pub fabric: Fabric,
    /// The top-level array.
    pub top: ModuleId,
    /// All diagnostics emitted during compilation.
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileResult {
    /// Number of diagnostics with `code`.
    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.diagnostics.iter().filter(|d| d.code == code).count()
    }
}

/// Parses and validates an architecture fixture.
pub fn parse(source: &str) -> ArchitectureConfig {
    load_architecture_from_str(source).unwrap()
}

/// Compiles an architecture description, returning the routing error if
/// compilation fails.
pub fn try_compile(source: &str) -> RoutingResult<CompileResult> {
    let config = parse(source);
    let sink = DiagnosticSink::new();
    let (fabric, top) = compile_architecture(&config, &sink)?;
    Ok(CompileResult {
        fabric,
        top,
        diagnostics: sink.take_all(),
    })
}

/// Compiles an architecture description that is expected to succeed.
pub fn compile(source: &str) -> CompileResult {
    match try_compile(source) {
        Ok(result) => result,
        Err(e) => panic!("compilation failed: {e}"),
    }
}

/// Returns the largest number of drivers of any bit in `module`.
pub fn max_fan_in(fabric: &Fabric, module: ModuleId) -> usize {
    let g = fabric.connection_graph(module);
    g.graph
        .node_indices()
        .filter(|&n| matches!(g.graph[n], GraphNode::Bit(_)))
        .map(|n| g.graph.neighbors_directed(n, Direction::Incoming).count())
        .max()
        .unwrap_or(0)
}
