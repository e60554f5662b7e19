//! Topological errors raised while wiring a fabric.

use fabric_common::{Dimension, Orientation, Position};
use fabric_config::ConfigError;
use fabric_ir::IrError;

/// Errors raised by the routing passes.
///
/// Apart from the wrapped construction errors, every variant signals a
/// malformed architecture rather than an engine defect, and names the node,
/// module and position involved.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// A connection-box output needs a third landing slot on one switch-box side.
    #[error("third connection box to switch box bridge for {node} in '{module}' at {position}")]
    ThirdBridge {
        /// The bridged node.
        node: String,
        /// Module where the slots ran out.
        module: String,
        /// Position of the node in that module.
        position: Position,
    },

    /// A Wilton pattern has no offset for one of the eight turns.
    #[error("no track offset given for the {from}-{to} turn")]
    MissingTurnOffset {
        /// Orientation the turn starts from.
        from: Orientation,
        /// Orientation the turn ends in.
        to: Orientation,
    },

    /// An FC value is out of range for a segment.
    #[error("invalid FC value ({value}) for segment '{segment}'")]
    InvalidFc {
        /// The offending value.
        value: String,
        /// The segment name.
        segment: String,
    },

    /// A connection box is populated for an edge its channel cannot serve.
    #[error("connection box '{cbox}' taps the {dimension} channel and cannot serve the {orientation} edge")]
    BoxDimensionMismatch {
        /// The connection box name.
        cbox: String,
        /// The box dimension.
        dimension: Dimension,
        /// The requested edge.
        orientation: Orientation,
    },

    /// A net handed to a routing box connection is not a user-accessible node.
    #[error("{net} is not a user-accessible routing node of '{module}'")]
    InaccessibleNode {
        /// Description of the net.
        net: String,
        /// The routing box.
        module: String,
    },

    /// A global wire used by a block is not bound to any IO.
    #[error("global '{global}' is not bound to an IO block")]
    GlobalUnbound {
        /// The global name.
        global: String,
    },

    /// No external input exists where a global is bound.
    #[error("global '{global}' is bound to {position} sub-block {subblock}, which has no external input")]
    GlobalNoInput {
        /// The global name.
        global: String,
        /// Bound position.
        position: Position,
        /// Bound sub-block.
        subblock: u32,
    },

    /// More than one external input exists where a global is bound.
    #[error("global '{global}' is bound to {position} sub-block {subblock}, which has {count} external inputs")]
    GlobalMultipleInputs {
        /// The global name.
        global: String,
        /// Bound position.
        position: Position,
        /// Bound sub-block.
        subblock: u32,
        /// Number of candidate inputs.
        count: usize,
    },

    /// The external input a global is bound to has the wrong width.
    #[error("global '{global}' is {expected} bits wide but the external input at {position} is {found}")]
    GlobalWidthMismatch {
        /// The global name.
        global: String,
        /// Width of the global.
        expected: u32,
        /// Width of the external input.
        found: u32,
        /// Bound position.
        position: Position,
    },

    /// A bridging port is left on the top-level array.
    #[error("unresolved routing node {node} on top-level array '{module}' at {position}")]
    UnresolvedNode {
        /// The node.
        node: String,
        /// The array.
        module: String,
        /// Position of the node.
        position: Position,
    },

    /// An IO tile was connection-boxed without an explicit orientation.
    #[error("tile '{tile}' holds an IO block and needs an explicit connection box orientation")]
    IoBlockNeedsOrientation {
        /// The tile name.
        tile: String,
    },

    /// A name in the architecture description does not resolve.
    #[error("unknown {kind} '{name}'")]
    UnknownReference {
        /// What was referenced.
        kind: &'static str,
        /// The referenced name.
        name: String,
    },

    /// A module-graph construction error.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// The architecture description failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience alias for results carrying a [`RoutingError`].
pub type RoutingResult<T> = Result<T, RoutingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn third_bridge_names_node_module_and_position() {
        let err = RoutingError::ThirdBridge {
            node: "sgmt_l1_x0y0n".to_string(),
            module: "top".to_string(),
            position: Position::new(0, 0),
        };
        let msg = err.to_string();
        assert!(msg.contains("sgmt_l1_x0y0n"));
        assert!(msg.contains("'top'"));
        assert!(msg.contains("(0, 0)"));
    }

    #[test]
    fn missing_turn_offset_message() {
        let err = RoutingError::MissingTurnOffset {
            from: Orientation::North,
            to: Orientation::East,
        };
        assert_eq!(err.to_string(), "no track offset given for the north-east turn");
    }

    #[test]
    fn ir_errors_pass_through() {
        let err: RoutingError = IrError::MultiSource {
            module: "sb".to_string(),
        }
        .into();
        assert!(matches!(err, RoutingError::Ir(_)));
        assert!(err.to_string().contains("'sb'"));
    }
}
