//! Two-wire bus devices.
//!
//! This module contains the slave protocol engine that turns clock and data
//! line activity into byte transfers, and the peripherals that sit behind it.

/// Serial EEPROM (24xx family).
pub mod eeprom;

/// Two-wire slave protocol engine.
pub mod two_wire;

pub use eeprom::SerialEeprom;
pub use two_wire::{Line, TwoWireSlave, TwoWireState};

pub use crate::soc::traits::TwoWireDevice;
