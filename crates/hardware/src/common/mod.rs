//! Common types and constants used throughout the simulation kernel.
//!
//! This module provides the building blocks shared by every component:
//! 1. **Handles:** Arena ids for pins, nodes, ports and engines, and the `Cycle` type.
//! 2. **Signals:** The `SignalLevel` domain and the `Drive` a pin asserts.
//! 3. **Constants:** Register widths, bus framing and timing constants.
//! 4. **Error Handling:** The `SimError` type and `Result` alias.

/// Common constants used throughout the simulator.
pub mod constants;

/// Error types.
pub mod error;

/// Arena handle types.
pub mod ids;

/// Signal level and drive definitions.
pub mod level;

pub use error::{Result, SimError};
pub use ids::{Cycle, EngineId, NodeId, PinId, PortId};
pub use level::{Drive, SignalLevel};
