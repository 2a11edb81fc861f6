//! Port register.
//!
//! A port register is the processor-visible view of up to 32 pins. It keeps two
//! values apart:
//! 1. **Driving Value:** What the processor last wrote. Every written bit is
//!    retained, including bits that are disabled, unbound or configured as inputs.
//! 2. **Driven Value:** What the bound pins actually resolve to after node
//!    resolution, updated whenever a bound pin changes.
//!
//! Reads combine the driven value of enabled bits with a default value for the
//! rest, masked by the readable-bit mask. The direction mask works like a 6510
//! data direction register: a 1 enables the output stage of the bound pin.

use tracing::{debug, trace};

use crate::common::constants::PORT_MAX_WIDTH;
use crate::common::{Drive, PinId, PortId, Result, SignalLevel, SimError};
use crate::stats::Anomaly;

use super::Wiring;

/// Register of up to 32 pin-backed bits.
#[derive(Clone, Debug)]
pub struct PortRegister {
    id: PortId,
    name: String,
    width: u32,
    /// Pin bound to each bit.
    pins: Vec<Option<PinId>>,
    /// Bits connected to their pins.
    enable_mask: u32,
    /// Bits visible to reads.
    output_mask: u32,
    /// Data direction, 1 = output.
    direction: u32,
    /// Last value written by the processor.
    driving: u32,
    /// Value resolved on the bound pins.
    driven: u32,
    /// Value read for bits that are not enabled.
    default_value: u32,
    /// Set after the first write pushed every enabled bit to its pin.
    synced: bool,
}

impl PortRegister {
    /// Creates a register of `width` bits with nothing bound.
    ///
    /// All bits are readable and configured as outputs; no bit is enabled until
    /// a pin is bound to it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] when `width` is zero or above 32.
    pub fn new(id: PortId, name: impl Into<String>, width: u32) -> Result<Self> {
        if width == 0 || width > PORT_MAX_WIDTH {
            return Err(SimError::InvalidConfig(format!(
                "port width {width} not in 1..={PORT_MAX_WIDTH}"
            )));
        }
        let mask = width_mask(width);
        Ok(Self {
            id,
            name: name.into(),
            width,
            pins: vec![None; width as usize],
            enable_mask: 0,
            output_mask: mask,
            direction: mask,
            driving: 0,
            driven: 0,
            default_value: 0,
            synced: false,
        })
    }

    /// Register handle.
    pub const fn id(&self) -> PortId {
        self.id
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width in bits.
    pub const fn width(&self) -> u32 {
        self.width
    }

    fn mask(&self) -> u32 {
        width_mask(self.width)
    }

    fn check_bit(&self, bit: u32) -> Result<()> {
        if bit < self.width {
            Ok(())
        } else {
            Err(SimError::BitOutOfRange {
                bit,
                width: self.width,
            })
        }
    }

    /// Binds `pin` to `bit` and enables the bit.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::BitOutOfRange`] for a bit beyond the width.
    pub fn bind(&mut self, bit: u32, pin: PinId) -> Result<()> {
        self.check_bit(bit)?;
        self.pins[bit as usize] = Some(pin);
        self.enable_mask |= 1 << bit;
        Ok(())
    }

    /// Removes the pin bound to `bit` and disables it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::BitOutOfRange`] for a bit beyond the width.
    pub fn unbind(&mut self, bit: u32) -> Result<Option<PinId>> {
        self.check_bit(bit)?;
        self.enable_mask &= !(1 << bit);
        self.driven &= !(1 << bit);
        Ok(self.pins[bit as usize].take())
    }

    /// Pin bound to `bit`.
    pub fn pin(&self, bit: u32) -> Option<PinId> {
        self.pins.get(bit as usize).copied().flatten()
    }

    /// Bit position `pin` is bound to.
    pub fn bit_of(&self, pin: PinId) -> Option<u32> {
        self.pins
            .iter()
            .position(|&p| p == Some(pin))
            .map(|i| i as u32)
    }

    /// Bound pins with their bit positions.
    pub fn bound_pins(&self) -> impl Iterator<Item = (u32, PinId)> + '_ {
        self.pins
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|pin| (i as u32, pin)))
    }

    /// Last value written.
    pub const fn driving_value(&self) -> u32 {
        self.driving
    }

    /// Value resolved on the bound pins.
    pub const fn driven_value(&self) -> u32 {
        self.driven
    }

    /// Bits connected to their pins.
    pub const fn enable_mask(&self) -> u32 {
        self.enable_mask
    }

    /// Bits visible to reads.
    pub const fn output_mask(&self) -> u32 {
        self.output_mask
    }

    /// Data direction, 1 = output.
    pub const fn direction(&self) -> u32 {
        self.direction
    }

    /// Value read for bits that are not enabled.
    pub const fn default_value(&self) -> u32 {
        self.default_value
    }

    /// Restricts which bound bits are connected. Unbound bits stay disabled.
    pub fn set_enable_mask(&mut self, mask: u32) {
        let bound = self
            .bound_pins()
            .fold(0u32, |acc, (bit, _)| acc | (1 << bit));
        self.enable_mask = mask & bound;
    }

    /// Sets which bits are visible to reads.
    pub fn set_output_mask(&mut self, mask: u32) {
        self.output_mask = mask & self.mask();
    }

    /// Sets the value read for bits that are not enabled.
    pub fn set_default_value(&mut self, value: u32) {
        self.default_value = value & self.mask();
    }

    /// Writes `value` to the register.
    ///
    /// Every bit is retained as the driving value. Enabled bits whose value
    /// changed (all enabled bits on the first write) push a strong level to
    /// their pin; the driven value is then re-read from the pins.
    ///
    /// # Errors
    ///
    /// Propagates netlist errors for pins that no longer exist.
    pub fn write(&mut self, value: u32, w: &mut Wiring<'_>) -> Result<()> {
        let value = value & self.mask();
        let changed = if self.synced {
            self.driving ^ value
        } else {
            self.mask()
        };
        self.driving = value;
        self.synced = true;
        trace!(port = %self.id, value = format_args!("{value:#x}"), "write");

        for bit in 0..self.width {
            let m = 1 << bit;
            if changed & self.enable_mask & m == 0 {
                continue;
            }
            if let Some(pin) = self.pin(bit) {
                w.drive(pin, Drive::bit(value & m != 0))?;
            }
        }
        self.refresh(w)
    }

    /// Reads the register.
    ///
    /// Returns `((driven & enable) | (default & !enable)) & output_mask`.
    /// Readable enabled bits whose pin is floating or unknown read 0 and record
    /// an anomaly.
    ///
    /// # Errors
    ///
    /// Propagates netlist errors for pins that no longer exist.
    pub fn read(&self, w: &mut Wiring<'_>) -> Result<u32> {
        let visible = self.enable_mask & self.output_mask;
        for (bit, pin) in self.bound_pins() {
            if visible & (1 << bit) == 0 {
                continue;
            }
            if w.level(pin)?.to_bit().is_none() {
                w.record(Anomaly::FloatingRead { port: self.id, bit });
            }
        }
        let value = ((self.driven & self.enable_mask) | (self.default_value & !self.enable_mask))
            & self.output_mask;
        Ok(value)
    }

    /// Updates the driven bit of a bound pin after its level changed.
    pub fn on_pin_changed(&mut self, bit: u32, level: SignalLevel) {
        if bit >= self.width {
            return;
        }
        let m = 1 << bit;
        if level.to_bit().unwrap_or(false) {
            self.driven |= m;
        } else {
            self.driven &= !m;
        }
    }

    /// Sets the data direction register (1 = output).
    ///
    /// Bi-directional and open-collector pins get their output stage switched;
    /// fixed-direction pins are left alone. Input bits keep their driving value.
    ///
    /// # Errors
    ///
    /// Propagates netlist errors for pins that no longer exist.
    pub fn set_direction(&mut self, mask: u32, w: &mut Wiring<'_>) -> Result<()> {
        let mask = mask & self.mask();
        let changed = self.direction ^ mask;
        self.direction = mask;
        debug!(port = %self.id, direction = format_args!("{mask:#x}"), "direction changed");

        for (bit, pin) in self.bound_pins().collect::<Vec<_>>() {
            if changed & (1 << bit) != 0 {
                let _ = w.set_output_enabled(pin, mask & (1 << bit) != 0)?;
            }
        }
        self.refresh(w)
    }

    /// Re-reads the driven value from every bound pin.
    fn refresh(&mut self, w: &Wiring<'_>) -> Result<()> {
        for (bit, pin) in self.bound_pins().collect::<Vec<_>>() {
            let level = w.level(pin)?;
            self.on_pin_changed(bit, level);
        }
        Ok(())
    }
}

/// Mask covering the low `width` bits.
const fn width_mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}
