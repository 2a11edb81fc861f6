//! # Unit Components
//!
//! This module serves as the central hub for the per-component tests of the
//! simulation kernel: shared value types, the scheduler and simulator, the
//! signal network, port registers and two-wire devices.




/// Unit tests for the on-board components.
///
/// This module organizes tests for digital and analog node resolution, port
/// registers, the two-wire engine and the serial EEPROM.
pub mod soc;
