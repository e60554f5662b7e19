//! Export of a module's bit-level connection graph to `petgraph`.

use crate::connection::{BitKey, Driver};
use crate::ids::ModuleId;
use crate::net::{Bus, BusKind};
use crate::Fabric;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// A vertex of an exported connection graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphNode {
    /// One bit of a port or pin.
    Bit(BitKey),
    /// Constant zero driver.
    Zero,
    /// Constant one driver.
    One,
}

/// A module's connections as a directed graph. Edges run source to sink.
#[derive(Debug, Default)]
pub struct ConnectionGraph {
    /// The graph.
    pub graph: DiGraph<GraphNode, ()>,
    index: HashMap<GraphNode, NodeIndex>,
}

impl ConnectionGraph {
    /// Returns the vertex for `node`, if it takes part in any connection.
    pub fn node(&self, node: GraphNode) -> Option<NodeIndex> {
        self.index.get(&node).copied()
    }

    fn intern(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node) {
            return idx;
        }
        let idx = self.graph.add_node(node);
        self.index.insert(node, idx);
        idx
    }
}

impl Fabric {
    fn bus_kind_width(&self, module: ModuleId, kind: BusKind) -> u32 {
        self.bus_width(Bus {
            scope: module,
            kind,
        })
    }

    /// Exports every recorded connection of `module`, one vertex per bit.
    pub fn connection_graph(&self, module: ModuleId) -> ConnectionGraph {
        let conns = self.module(module).connections();
        let mut out = ConnectionGraph::default();
        for bus in conns.driven_buses() {
            for index in 0..self.bus_kind_width(module, bus) {
                let sink = BitKey { bus, index };
                for driver in conns.drivers_of(sink) {
                    let from = match driver {
                        Driver::Bit(bit) => GraphNode::Bit(bit),
                        Driver::Zero => GraphNode::Zero,
                        Driver::One => GraphNode::One,
                    };
                    let a = out.intern(from);
                    let b = out.intern(GraphNode::Bit(sink));
                    out.graph.add_edge(a, b, ());
                }
            }
        }
        out
    }
}
