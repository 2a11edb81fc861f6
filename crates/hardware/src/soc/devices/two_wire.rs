//! Two-wire (I²C-style) slave protocol engine.
//!
//! The engine watches a clock line and a data line through its own pins and
//! turns bus activity into byte-level calls on a [`TwoWireDevice`]. It handles:
//! 1. **Framing:** Start and stop conditions (data edges while the clock is high).
//! 2. **Addressing:** Matching the first byte of a transfer against a configured
//!    address and chip-select mask.
//! 3. **Bit Timing:** Clock edges are acted on one cycle after they are seen,
//!    rising edges sample the data line and falling edges drive it.
//! 4. **Write Cycles:** A device may report an internal write cycle at stop,
//!    during which the engine does not answer to its address.
//!
//! The data pin is open-collector: the engine only ever pulls it low or
//! releases it, the pull-up on the bus provides the high level.

use std::fmt;

use tracing::debug;
#[cfg(feature = "bit-trace")]
use tracing::trace;

use crate::common::constants::{
    ADDRESS_FIELD_MASK, ADDRESS_RW_BIT, BITS_PER_BYTE, EDGE_SETTLE_DELAY,
};
use crate::common::{Drive, EngineId, PinId, Result, SignalLevel};
use crate::sim::Task;
use crate::soc::Wiring;
use crate::soc::traits::{Ack, TwoWireDevice};
use crate::stats::Anomaly;

/// Protocol state of a two-wire slave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TwoWireState {
    /// Not part of a transfer.
    Idle,
    /// Start condition seen; waiting for the first clock fall.
    Start,
    /// Shifting in the address byte.
    RxAddress,
    /// Address matched; ACK is driven on the next clock fall.
    AckAddress,
    /// Shifting in a data byte written by the master.
    RxData,
    /// Data byte delivered; its ACK or NACK is driven on the next clock fall.
    AckReceivedData,
    /// ACK is on the bus; released on the next clock fall.
    AckAfterWrite,
    /// Stop seen; the device is busy with an internal write cycle.
    WritePending,
    /// Byte sent; waiting for the master's acknowledge.
    AckRead,
    /// Shifting out a byte read by the master.
    TxData,
}

impl fmt::Display for TwoWireState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Which of the engine's two lines a pin belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Line {
    /// Serial clock.
    Clock,
    /// Serial data.
    Data,
}

/// Clock edge waiting to be acted on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Edge {
    Rising,
    Falling,
}

/// Slave side of a two-wire bus bound to one peripheral.
#[derive(Debug)]
pub struct TwoWireSlave {
    id: EngineId,
    state: TwoWireState,
    /// Bits shifted in or out of the current byte.
    bit_count: u8,
    /// Receive shift register.
    shift: u8,
    /// Byte being transmitted.
    tx: u8,
    /// Address byte (7-bit address in bits 7..1).
    address: u8,
    /// Address bits that take part in matching.
    cs_mask: u8,
    /// Direction of the current transfer, true when the master reads.
    reading: bool,
    /// The current transfer addressed this engine.
    addressed: bool,
    /// Acknowledge decided for the byte just received.
    ack: Ack,
    /// The master acknowledged the last transmitted byte.
    master_ack: bool,
    /// The device is in an internal write cycle.
    busy: bool,
    clock: PinId,
    data: PinId,
    clock_high: bool,
    data_high: bool,
    pending_edge: Option<Edge>,
    device: Box<dyn TwoWireDevice>,
}

impl TwoWireSlave {
    /// Creates an idle engine for `device` using `clock` and `data` as its own pins.
    ///
    /// # Arguments
    ///
    /// * `id` - Handle used for the engine's scheduler tasks.
    /// * `device` - Peripheral receiving byte-level callbacks.
    /// * `address` - Address byte to answer to (7-bit address in bits 7..1).
    /// * `cs_mask` - Address bits compared; cleared bits match anything.
    /// * `clock` - Input pin on the clock node.
    /// * `data` - Open-collector pin on the data node.
    pub fn new(
        id: EngineId,
        device: Box<dyn TwoWireDevice>,
        address: u8,
        cs_mask: u8,
        clock: PinId,
        data: PinId,
    ) -> Self {
        Self {
            id,
            state: TwoWireState::Idle,
            bit_count: 0,
            shift: 0,
            tx: 0,
            address,
            cs_mask,
            reading: false,
            addressed: false,
            ack: Ack::Ack,
            master_ack: false,
            busy: false,
            clock,
            data,
            clock_high: true,
            data_high: true,
            pending_edge: None,
            device,
        }
    }

    /// Engine handle.
    pub const fn id(&self) -> EngineId {
        self.id
    }

    /// Protocol state.
    pub const fn state(&self) -> TwoWireState {
        self.state
    }

    /// Configured address byte.
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Configured chip-select mask.
    pub const fn cs_mask(&self) -> u8 {
        self.cs_mask
    }

    /// True while the device is in an internal write cycle.
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Clock pin.
    pub const fn clock_pin(&self) -> PinId {
        self.clock
    }

    /// Data pin.
    pub const fn data_pin(&self) -> PinId {
        self.data
    }

    /// Peripheral behind the engine.
    pub fn device(&self) -> &dyn TwoWireDevice {
        self.device.as_ref()
    }

    /// Mutable access to the peripheral behind the engine.
    pub fn device_mut(&mut self) -> &mut dyn TwoWireDevice {
        self.device.as_mut()
    }

    /// Consumes the engine, returning its peripheral.
    pub fn into_device(self) -> Box<dyn TwoWireDevice> {
        self.device
    }

    /// Sets the address byte and chip-select mask.
    pub fn configure(&mut self, address: u8, cs_mask: u8) {
        self.address = address;
        self.cs_mask = cs_mask;
    }

    /// Binds the engine to its lines and samples their current levels.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SimError::UnknownPin`] when either pin does not exist.
    pub fn attach(&mut self, clock: PinId, data: PinId, w: &Wiring<'_>) -> Result<()> {
        self.clock = clock;
        self.data = data;
        self.clock_high = w.level(clock)?.is_high();
        self.data_high = w.level(data)?.is_high();
        Ok(())
    }

    /// True when `byte` selects this engine.
    pub const fn matches(&self, byte: u8) -> bool {
        let mask = self.cs_mask & ADDRESS_FIELD_MASK;
        !self.busy && (byte & mask) == (self.address & mask)
    }

    /// Reacts to a level change on one of the engine's pins.
    ///
    /// # Errors
    ///
    /// Propagates scheduling and netlist errors.
    pub fn on_pin_changed(
        &mut self,
        line: Line,
        level: SignalLevel,
        w: &mut Wiring<'_>,
    ) -> Result<()> {
        let high = level.is_high();
        match line {
            Line::Clock => {
                if high == self.clock_high {
                    return Ok(());
                }
                self.clock_high = high;
                if !self.is_transferring() {
                    w.record(Anomaly::IgnoredBusActivity { engine: self.id });
                    return Ok(());
                }
                self.pending_edge = Some(if high { Edge::Rising } else { Edge::Falling });
                w.schedule_in(Task::TwoWireEdge(self.id), EDGE_SETTLE_DELAY)
            }
            Line::Data => {
                if high == self.data_high {
                    return Ok(());
                }
                self.data_high = high;
                if !self.clock_high {
                    return Ok(());
                }
                if high {
                    self.stop(w)
                } else {
                    self.start(w)
                }
            }
        }
    }

    /// Acts on the clock edge recorded when the edge task was scheduled.
    ///
    /// # Errors
    ///
    /// Propagates scheduling and netlist errors.
    pub fn on_edge(&mut self, w: &mut Wiring<'_>) -> Result<()> {
        match self.pending_edge.take() {
            Some(Edge::Rising) => self.sample(w),
            Some(Edge::Falling) => self.drive(w),
            None => Ok(()),
        }
    }

    /// Ends the device's internal write cycle.
    ///
    /// # Errors
    ///
    /// Propagates netlist errors.
    pub fn on_write_complete(&mut self, _w: &mut Wiring<'_>) -> Result<()> {
        self.device.on_write_complete();
        self.busy = false;
        if self.state == TwoWireState::WritePending {
            self.set_state(TwoWireState::Idle);
        }
        Ok(())
    }

    /// Cancels pending tasks, releases the data line and returns to `Idle`.
    ///
    /// # Errors
    ///
    /// Propagates netlist errors.
    pub fn reset(&mut self, w: &mut Wiring<'_>) -> Result<()> {
        let _ = w.cancel(Task::TwoWireEdge(self.id));
        let _ = w.cancel(Task::TwoWireWrite(self.id));
        self.pending_edge = None;
        self.busy = false;
        self.addressed = false;
        self.bit_count = 0;
        self.shift = 0;
        self.device.reset();
        self.set_state(TwoWireState::Idle);
        w.drive(self.data, Drive::RELEASED)
    }

    const fn is_transferring(&self) -> bool {
        !matches!(self.state, TwoWireState::Idle | TwoWireState::WritePending)
    }

    fn set_state(&mut self, state: TwoWireState) {
        if self.state != state {
            debug!(engine = %self.id, from = %self.state, to = %state, "state change");
            self.state = state;
        }
    }

    fn start(&mut self, w: &mut Wiring<'_>) -> Result<()> {
        debug!(engine = %self.id, cycle = w.now(), "start condition");
        let _ = w.cancel(Task::TwoWireEdge(self.id));
        self.pending_edge = None;
        self.bit_count = 0;
        self.shift = 0;
        self.addressed = false;
        self.set_state(TwoWireState::Start);
        Ok(())
    }

    fn stop(&mut self, w: &mut Wiring<'_>) -> Result<()> {
        debug!(engine = %self.id, cycle = w.now(), "stop condition");
        let _ = w.cancel(Task::TwoWireEdge(self.id));
        self.pending_edge = None;
        self.bit_count = 0;
        w.drive(self.data, Drive::RELEASED)?;

        if !std::mem::take(&mut self.addressed) {
            if self.state != TwoWireState::WritePending {
                self.set_state(TwoWireState::Idle);
            }
            return Ok(());
        }
        match self.device.on_stop() {
            Some(cycles) if cycles > 0 => {
                self.busy = true;
                self.set_state(TwoWireState::WritePending);
                w.schedule_in(Task::TwoWireWrite(self.id), cycles)
            }
            Some(_) => {
                self.device.on_write_complete();
                self.set_state(TwoWireState::Idle);
                Ok(())
            }
            None => {
                self.set_state(TwoWireState::Idle);
                Ok(())
            }
        }
    }

    /// Rising clock edge: sample the data line.
    fn sample(&mut self, w: &mut Wiring<'_>) -> Result<()> {
        let bit = w.level(self.data)?.is_high();
        match self.state {
            TwoWireState::Start | TwoWireState::RxAddress | TwoWireState::RxData => {
                self.shift = (self.shift << 1) | u8::from(bit);
                self.bit_count += 1;
                #[cfg(feature = "bit-trace")]
                trace!(engine = %self.id, bit, count = self.bit_count, "rx bit");
                if self.bit_count == BITS_PER_BYTE {
                    let byte = self.shift;
                    self.bit_count = 0;
                    self.shift = 0;
                    if self.state == TwoWireState::RxData {
                        self.byte_received(byte, w);
                    } else {
                        self.address_received(byte, w);
                    }
                }
            }
            TwoWireState::TxData => {
                // The falling edge that hands over to AckRead was lost.
                if self.bit_count >= BITS_PER_BYTE {
                    w.record(Anomaly::ClockTooFast { engine: self.id });
                } else {
                    self.bit_count += 1;
                    #[cfg(feature = "bit-trace")]
                    trace!(engine = %self.id, bit, count = self.bit_count, "tx bit");
                }
            }
            TwoWireState::AckRead => {
                self.master_ack = !bit;
                if !self.master_ack {
                    w.stats.nacks += 1;
                    debug!(engine = %self.id, "master NACK ends read");
                    self.set_state(TwoWireState::Idle);
                }
            }
            TwoWireState::AckAddress
            | TwoWireState::AckReceivedData
            | TwoWireState::AckAfterWrite => {}
            TwoWireState::Idle | TwoWireState::WritePending => {
                w.record(Anomaly::IgnoredBusActivity { engine: self.id });
            }
        }
        Ok(())
    }

    fn address_received(&mut self, byte: u8, w: &mut Wiring<'_>) {
        if self.matches(byte) {
            self.reading = byte & ADDRESS_RW_BIT != 0;
            self.addressed = true;
            self.ack = Ack::Ack;
            debug!(
                engine = %self.id,
                byte = format_args!("{byte:#04x}"),
                read = self.reading,
                "addressed"
            );
            self.device.on_address(byte);
            self.set_state(TwoWireState::AckAddress);
        } else {
            w.record(Anomaly::UnmatchedAddress {
                engine: self.id,
                byte,
            });
            self.set_state(TwoWireState::Idle);
        }
    }

    fn byte_received(&mut self, byte: u8, w: &mut Wiring<'_>) {
        w.stats.bytes_received += 1;
        self.ack = self.device.on_byte_received(byte);
        if !self.ack.is_ack() {
            w.stats.nacks += 1;
        }
        debug!(
            engine = %self.id,
            byte = format_args!("{byte:#04x}"),
            ack = ?self.ack,
            "byte received"
        );
        self.set_state(TwoWireState::AckReceivedData);
    }

    /// Falling clock edge: drive the data line for the low phase.
    fn drive(&mut self, w: &mut Wiring<'_>) -> Result<()> {
        if w.level(self.clock)?.is_high() {
            if self.is_transferring() && self.state != TwoWireState::Start {
                w.record(Anomaly::ClockTooFast { engine: self.id });
            }
            return Ok(());
        }
        match self.state {
            TwoWireState::Start => {
                self.bit_count = 0;
                self.shift = 0;
                self.set_state(TwoWireState::RxAddress);
                Ok(())
            }
            TwoWireState::AckAddress | TwoWireState::AckReceivedData => {
                if self.ack.is_ack() {
                    self.set_state(TwoWireState::AckAfterWrite);
                    w.drive(self.data, Drive::Level(SignalLevel::DrivenLow))
                } else {
                    self.set_state(TwoWireState::Idle);
                    w.drive(self.data, Drive::RELEASED)
                }
            }
            TwoWireState::AckAfterWrite => {
                w.drive(self.data, Drive::RELEASED)?;
                if self.reading {
                    self.load_next_byte(w)
                } else {
                    self.bit_count = 0;
                    self.shift = 0;
                    self.set_state(TwoWireState::RxData);
                    Ok(())
                }
            }
            TwoWireState::TxData => {
                if self.bit_count >= BITS_PER_BYTE {
                    self.master_ack = false;
                    self.set_state(TwoWireState::AckRead);
                    w.drive(self.data, Drive::RELEASED)
                } else {
                    self.drive_tx_bit(w)
                }
            }
            TwoWireState::AckRead => {
                if self.master_ack {
                    self.load_next_byte(w)
                } else {
                    Ok(())
                }
            }
            TwoWireState::RxAddress
            | TwoWireState::RxData
            | TwoWireState::Idle
            | TwoWireState::WritePending => Ok(()),
        }
    }

    fn load_next_byte(&mut self, w: &mut Wiring<'_>) -> Result<()> {
        self.tx = self.device.next_byte_to_send();
        self.bit_count = 0;
        w.stats.bytes_sent += 1;
        debug!(engine = %self.id, byte = format_args!("{:#04x}", self.tx), "byte to send");
        self.set_state(TwoWireState::TxData);
        self.drive_tx_bit(w)
    }

    fn drive_tx_bit(&mut self, w: &mut Wiring<'_>) -> Result<()> {
        let bit = self.tx & (0x80 >> self.bit_count) != 0;
        #[cfg(feature = "bit-trace")]
        trace!(engine = %self.id, bit, index = self.bit_count, "tx drive");
        let drive = if bit {
            Drive::RELEASED
        } else {
            Drive::Level(SignalLevel::DrivenLow)
        };
        w.drive(self.data, drive)
    }
}

