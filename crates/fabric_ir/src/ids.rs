//! Opaque ID newtypes for module-graph entities.
//!
//! [`ModuleId`], [`SegmentProtoId`] and [`GlobalId`] index the
//! [`Fabric`](crate::Fabric)-wide arenas. [`PortId`] and [`InstanceId`] are
//! local to the module that issued them.

use crate::arena::ArenaId;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $tag, self.0)
            }
        }
    };
}

define_id!(
    /// A module in the fabric (array, tile, box, block, primitive or switch).
    ModuleId,
    "module"
);

define_id!(
    /// A port of one module.
    PortId,
    "port"
);

define_id!(
    /// An instance inside one module.
    InstanceId,
    "inst"
);

define_id!(
    /// A routing segment prototype.
    SegmentProtoId,
    "segment"
);

define_id!(
    /// A global wire.
    GlobalId,
    "global"
);
