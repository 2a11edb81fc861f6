//! Peripheral trait for the two-wire bus.
//!
//! This module defines the `TwoWireDevice` trait implemented by every peripheral
//! placed behind a two-wire slave engine. It provides:
//! 1. **Addressing:** `on_address` when the engine matches its address byte.
//! 2. **Data:** `on_byte_received` for master writes, `next_byte_to_send` for reads.
//! 3. **Write Cycles:** Optional `on_stop` / `on_write_complete` for peripherals
//!    with an internal programming delay.
//! 4. **Downcasting:** Optional cast to `SerialEeprom` for device-specific access.
//!
//! The engine owns the protocol; a device only ever sees whole bytes.

use crate::common::Cycle;
use crate::soc::devices::SerialEeprom;

/// Acknowledge bit driven after a received byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ack {
    /// Data line pulled low: byte accepted.
    Ack,
    /// Data line released: byte refused.
    Nack,
}

impl Ack {
    /// True for [`Ack::Ack`].
    pub const fn is_ack(self) -> bool {
        matches!(self, Self::Ack)
    }
}

/// Peripheral contract of a two-wire slave.
pub trait TwoWireDevice: std::fmt::Debug {
    /// Called once the address byte matched; the low bit is the read flag.
    fn on_address(&mut self, byte: u8);

    /// Delivers a byte written by the master and returns the acknowledge to drive.
    fn on_byte_received(&mut self, byte: u8) -> Ack;

    /// Supplies the next byte for a master read.
    fn next_byte_to_send(&mut self) -> u8;

    /// Called on a stop condition. Returning `Some(cycles)` starts an internal
    /// write cycle of that length, during which the engine ignores its address.
    fn on_stop(&mut self) -> Option<Cycle> {
        None
    }

    /// Called when the write cycle started by [`Self::on_stop`] ends.
    fn on_write_complete(&mut self) {}

    /// Returns the device to its power-on transfer state.
    fn reset(&mut self) {}

    /// Returns a reference as `SerialEeprom` if this device is one; otherwise `None`.
    fn as_eeprom(&self) -> Option<&SerialEeprom> {
        None
    }

    /// Returns a mutable reference as `SerialEeprom` if this device is one; otherwise `None`.
    fn as_eeprom_mut(&mut self) -> Option<&mut SerialEeprom> {
        None
    }
}
