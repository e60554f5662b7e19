//! Error types for module-graph construction and net operations.

use fabric_common::{InternalError, Position};

/// Usage and construction errors raised while building the module graph.
///
/// Every variant indicates a defect in the code constructing the architecture,
/// not a recoverable condition, and carries enough context (module name, net
/// or node description, position) to be diagnosed from the message alone.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// A slice range exceeds the width of the sliced net.
    #[error("slice [{start}..{end}) out of range for {net} (width {width})")]
    SliceOutOfRange {
        /// Description of the sliced net.
        net: String,
        /// Requested first bit.
        start: u32,
        /// Requested end bit (exclusive).
        end: u32,
        /// Width of the sliced net.
        width: u32,
    },

    /// Source and sink of a connection have different widths.
    #[error("width mismatch connecting {source_net} (width {source_width}) to {sink} (width {sink_width})")]
    WidthMismatch {
        /// Description of the source net.
        source_net: String,
        /// Width of the source.
        source_width: u32,
        /// Description of the sink net.
        sink: String,
        /// Width of the sink.
        sink_width: u32,
    },

    /// A net used as a connection source cannot drive.
    #[error("{net} is not a valid source")]
    NotASource {
        /// Description of the offending net.
        net: String,
    },

    /// A net used as a connection sink cannot be driven.
    #[error("{net} is not a valid sink")]
    NotASink {
        /// Description of the offending net.
        net: String,
    },

    /// Source and sink live in different module scopes.
    #[error("cannot connect {source_net} to {sink}: different module scopes")]
    CrossScope {
        /// Description of the source bit.
        source_net: String,
        /// Description of the sink bit.
        sink: String,
    },

    /// A single-source module sink already has a driver.
    #[error("{sink} in single-source module '{module}' is already driven")]
    AlreadyDriven {
        /// Description of the sink bit.
        sink: String,
        /// The owning module.
        module: String,
    },

    /// `get_source` was called on a multi-source module.
    #[error("module '{module}' is multi-source; query its sources with get_multisource")]
    MultiSource {
        /// The owning module.
        module: String,
    },

    /// The module kind cannot host the requested routing node.
    #[error("module '{module}' cannot host routing node {node}")]
    InvalidNode {
        /// The module name.
        module: String,
        /// The rejected node.
        node: String,
    },

    /// A direction hint contradicts the direction implied by the node kind or
    /// by an existing port.
    #[error("conflicting direction for routing node {node} in module '{module}'")]
    DirectionConflict {
        /// The module name.
        module: String,
        /// The node.
        node: String,
    },

    /// A node that can be either an input or an output was requested without a
    /// direction hint.
    #[error("routing node {node} in module '{module}' needs a direction hint")]
    DirectionRequired {
        /// The module name.
        module: String,
        /// The node.
        node: String,
    },

    /// A port with the same key already exists.
    #[error("duplicate port '{port}' in module '{module}'")]
    DuplicatePort {
        /// The module name.
        module: String,
        /// The port name.
        port: String,
    },

    /// An instance with the same key already exists.
    #[error("duplicate instance '{instance}' in module '{module}'")]
    DuplicateInstance {
        /// The module name.
        module: String,
        /// The instance name.
        instance: String,
    },

    /// A port or instance lookup failed.
    #[error("unknown {what} '{name}' in module '{module}'")]
    Unknown {
        /// What was looked up (`port`, `instance`, ...).
        what: &'static str,
        /// The requested name.
        name: String,
        /// The module name.
        module: String,
    },

    /// A placed element does not fit inside the grid.
    #[error("'{element}' at {position} does not fit in array '{array}'")]
    DoesNotFit {
        /// The array name.
        array: String,
        /// The element name.
        element: String,
        /// Requested anchor position.
        position: Position,
    },

    /// A grid cell is already occupied.
    #[error("cell {position} of array '{array}' is already occupied (placing '{element}')")]
    PlacementConflict {
        /// The array name.
        array: String,
        /// The element being placed.
        element: String,
        /// The conflicting cell.
        position: Position,
    },

    /// An orientation or position is invalid for the object it is applied to.
    #[error("invalid orientation {orientation} at {position} for '{name}': {reason}")]
    InvalidOrientation {
        /// The object name (port, box, tile).
        name: String,
        /// The offending orientation.
        orientation: fabric_common::Orientation,
        /// The offending position.
        position: Position,
        /// What rule was broken.
        reason: &'static str,
    },

    /// A connection box dimension does not match its orientation.
    #[error("connection box '{cbox}' of dimension {dimension} cannot sit on the {orientation} edge")]
    BoxDimensionMismatch {
        /// The connection box name.
        cbox: String,
        /// The box dimension.
        dimension: fabric_common::Dimension,
        /// The requested orientation.
        orientation: fabric_common::Orientation,
    },

    /// A switch library returned a switch narrower than requested.
    #[error("switch '{switch}' has {available} inputs but {required} are required")]
    SwitchTooNarrow {
        /// The switch module name.
        switch: String,
        /// Inputs available.
        available: u32,
        /// Inputs required.
        required: u32,
    },

    /// An operation was applied to the wrong kind of module.
    #[error("module '{module}' is not {expected}")]
    WrongModuleKind {
        /// The module name.
        module: String,
        /// The expected kind.
        expected: &'static str,
    },

    /// A prototype or global was declared with invalid parameters.
    #[error("invalid declaration '{name}': {reason}")]
    InvalidDeclaration {
        /// The declared name.
        name: String,
        /// What rule was broken.
        reason: &'static str,
    },

    /// An engine invariant was violated.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// Convenience alias for results carrying an [`IrError`].
pub type IrResult<T> = Result<T, IrError>;
