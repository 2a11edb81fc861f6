//! Arena handle types.
//!
//! Pins, nodes, port registers and protocol engines live in index-addressed
//! arenas owned by the simulator. Components refer to each other through these
//! handles instead of references, so a removed component can never be reached
//! through a dangling pointer; a stale handle simply fails lookup.
//! 1. **Type Safety:** A `PinId` cannot be passed where a `NodeId` is expected.
//! 2. **Determinism:** Handles are allocated sequentially and ordered, so
//!    iteration over them is reproducible.

use std::fmt;

/// Simulation time, counted in processor cycles since reset.
pub type Cycle = u64;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            /// Returns the arena slot index of this handle.
            #[inline(always)]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Builds a handle from an arena slot index.
            #[inline(always)]
            pub(crate) const fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Handle to a pin in the netlist arena.
    PinId,
    "pin"
);

arena_id!(
    /// Handle to a node (shared bus segment) in the netlist arena.
    NodeId,
    "node"
);

arena_id!(
    /// Handle to a port register owned by the simulator.
    PortId,
    "port"
);

arena_id!(
    /// Handle to a two-wire slave engine owned by the simulator.
    EngineId,
    "i2c"
);
