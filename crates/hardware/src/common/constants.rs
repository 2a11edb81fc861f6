//! Global Simulation Constants.
//!
//! This module defines constants shared across the simulation kernel. It includes:
//! 1. **Register Constants:** Port register width limits.
//! 2. **Bus Constants:** Two-wire framing (bits per byte, direction bit).
//! 3. **Timing Constants:** Fixed callback delays used by protocol engines.

use super::ids::Cycle;

/// Widest port register supported (bits).
pub const PORT_MAX_WIDTH: u32 = 32;

/// Bits shifted per two-wire byte, excluding the acknowledge bit.
pub const BITS_PER_BYTE: u8 = 8;

/// Direction bit in a two-wire address byte (1 = master reads).
pub const ADDRESS_RW_BIT: u8 = 0x01;

/// Mask selecting the 7-bit address field of an address byte.
pub const ADDRESS_FIELD_MASK: u8 = 0xFE;

/// Delay between an observed clock edge and the engine acting on it.
///
/// Both lines are allowed to settle for one cycle before the data line is
/// sampled or driven.
pub const EDGE_SETTLE_DELAY: Cycle = 1;

/// Depth of the anomaly history kept by [`crate::stats::SimStats`] when not configured.
pub const DEFAULT_ANOMALY_HISTORY: usize = 64;
