//! Simulation error definitions.
//!
//! This module defines the error type returned across the kernel boundary. It covers:
//! 1. **Programming Errors:** Scheduling in the past, stale handles, out-of-range bits.
//! 2. **Configuration Errors:** Invalid or unparsable configuration.
//!
//! Electrical anomalies (bus contention, floating reads, unmatched addresses) are
//! not errors. They are recorded in [`crate::stats::SimStats`] and the
//! simulation proceeds with a defined fallback.

use thiserror::Error;

use super::ids::{Cycle, EngineId, NodeId, PinId, PortId};

/// Errors returned by scheduler, netlist, register and engine operations.
#[derive(Debug, Error)]
pub enum SimError {
    /// A callback was requested at or before the current cycle.
    #[error("cannot schedule at cycle {at}: current cycle is {now}")]
    ScheduleInPast {
        /// Requested cycle.
        at: Cycle,
        /// Scheduler time when the request was made.
        now: Cycle,
    },

    /// The pin handle does not refer to a live pin.
    #[error("unknown pin {0}")]
    UnknownPin(PinId),

    /// The node handle does not refer to a live node.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The port handle does not refer to a live port register.
    #[error("unknown port register {0}")]
    UnknownPort(PortId),

    /// The engine handle does not refer to a live two-wire engine.
    #[error("unknown two-wire engine {0}")]
    UnknownEngine(EngineId),

    /// A register bit index beyond the register width.
    #[error("bit {bit} out of range for {width}-bit register")]
    BitOutOfRange {
        /// Offending bit index.
        bit: u32,
        /// Register width in bits.
        width: u32,
    },

    /// A memory image does not fit the peripheral it is loaded into.
    #[error("image of {len} bytes at offset {offset} exceeds {size}-byte memory")]
    ImageTooLarge {
        /// Load offset.
        offset: usize,
        /// Image length.
        len: usize,
        /// Memory size.
        size: usize,
    },

    /// The configuration is structurally valid but semantically wrong.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;
