//! Serial EEPROM (24xx family).
//!
//! A byte-addressed non-volatile array behind a two-wire slave engine.
//!
//! # Transfers
//!
//! * **Write:** `S addr+W A word-address A [data A]... P`. The word address
//!   (one or two bytes) sets the pointer; data bytes are staged in a page
//!   buffer whose column wraps inside the page. The stop starts an internal
//!   write cycle that commits the page; the part ignores its address until the
//!   cycle ends.
//! * **Current Read:** `S addr+R [data A]... data N P` returns bytes from the
//!   pointer, wrapping at the end of the array.
//! * **Random Read:** a write of the word address followed by a repeated start
//!   and a current read.
//!
//! One-address-byte parts larger than 256 bytes take the upper address bits
//! (block select) from bits 3..1 of the device address byte.

use tracing::{debug, info};

use crate::common::constants::ADDRESS_RW_BIT;
use crate::common::{Cycle, Result, SimError};
use crate::config::EepromConfig;
use crate::soc::traits::{Ack, TwoWireDevice};

/// Serial EEPROM peripheral.
#[derive(Clone, Debug)]
pub struct SerialEeprom {
    memory: Vec<u8>,
    page_size: usize,
    address_bytes: u8,
    write_cycle: Cycle,
    /// Word-address pointer.
    pointer: usize,
    /// Block bits taken from the device address byte.
    block: usize,
    /// Word-address bytes still expected in the current write.
    address_remaining: u8,
    /// Word address accumulated so far.
    address_acc: usize,
    /// First address of the page being staged.
    page_base: usize,
    /// Staged bytes by page column.
    page: Vec<Option<u8>>,
    write_protect: bool,
    busy: bool,
}

impl SerialEeprom {
    /// Creates an erased (all `0xFF`) part with the given geometry.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] when the geometry fails validation.
    pub fn new(config: &EepromConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            memory: vec![0xFF; config.size],
            page_size: config.page_size,
            address_bytes: config.address_bytes,
            write_cycle: config.write_cycle,
            pointer: 0,
            block: 0,
            address_remaining: 0,
            address_acc: 0,
            page_base: 0,
            page: vec![None; config.page_size],
            write_protect: false,
            busy: false,
        })
    }

    /// Capacity in bytes.
    pub fn size(&self) -> usize {
        self.memory.len()
    }

    /// Page buffer size in bytes.
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Copies `data` into the array at `offset`, bypassing the bus.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ImageTooLarge`] when the image does not fit.
    pub fn load(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let size = self.memory.len();
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= size)
            .ok_or(SimError::ImageTooLarge {
                offset,
                len: data.len(),
                size,
            })?;
        self.memory[offset..end].copy_from_slice(data);
        info!(offset, len = data.len(), "eeprom image loaded");
        Ok(())
    }

    /// Array contents.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Byte at `addr`, wrapping at the array size.
    pub fn read_byte(&self, addr: usize) -> u8 {
        self.memory[addr & self.addr_mask()]
    }

    /// Enables or disables write protection; protected parts NACK data bytes.
    pub fn set_write_protect(&mut self, enabled: bool) {
        self.write_protect = enabled;
    }

    /// Write protection state.
    pub const fn write_protect(&self) -> bool {
        self.write_protect
    }

    /// Word-address pointer.
    pub const fn pointer(&self) -> usize {
        self.pointer
    }

    /// True during an internal write cycle.
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    fn addr_mask(&self) -> usize {
        self.memory.len() - 1
    }

    /// Block bits encoded in the device address byte.
    fn block_of(&self, byte: u8) -> usize {
        if self.address_bytes != 1 || self.memory.len() <= 256 {
            return 0;
        }
        let blocks = self.memory.len() >> 8;
        (usize::from(byte >> 1) & 0x07) & (blocks - 1)
    }

    fn stage(&mut self, byte: u8) {
        let column = self.pointer & (self.page_size - 1);
        self.page[column] = Some(byte);
        self.pointer = self.page_base | ((column + 1) & (self.page_size - 1));
    }

    fn staged(&self) -> usize {
        self.page.iter().flatten().count()
    }
}

impl TwoWireDevice for SerialEeprom {
    fn on_address(&mut self, byte: u8) {
        self.block = self.block_of(byte);
        if byte & ADDRESS_RW_BIT == 0 {
            self.address_remaining = self.address_bytes;
            self.address_acc = 0;
            self.page.fill(None);
        } else {
            self.address_remaining = 0;
        }
    }

    fn on_byte_received(&mut self, byte: u8) -> Ack {
        if self.address_remaining > 0 {
            self.address_acc = (self.address_acc << 8) | usize::from(byte);
            self.address_remaining -= 1;
            if self.address_remaining == 0 {
                self.pointer = ((self.block << 8) | self.address_acc) & self.addr_mask();
                self.page_base = self.pointer & !(self.page_size - 1);
                debug!(pointer = self.pointer, "eeprom word address");
            }
            return Ack::Ack;
        }
        if self.write_protect {
            debug!(pointer = self.pointer, "eeprom write protected");
            return Ack::Nack;
        }
        self.stage(byte);
        Ack::Ack
    }

    fn next_byte_to_send(&mut self) -> u8 {
        let byte = self.memory[self.pointer];
        self.pointer = (self.pointer + 1) & self.addr_mask();
        byte
    }

    fn on_stop(&mut self) -> Option<Cycle> {
        self.address_remaining = 0;
        if self.staged() == 0 {
            return None;
        }
        self.busy = true;
        debug!(page = self.page_base, bytes = self.staged(), "eeprom write cycle started");
        Some(self.write_cycle)
    }

    fn on_write_complete(&mut self) {
        for (column, byte) in self.page.iter_mut().enumerate() {
            if let Some(b) = byte.take() {
                self.memory[self.page_base + column] = b;
            }
        }
        self.busy = false;
        debug!(page = self.page_base, "eeprom page committed");
    }

    fn reset(&mut self) {
        self.address_remaining = 0;
        self.address_acc = 0;
        self.page.fill(None);
        self.busy = false;
    }

    fn as_eeprom(&self) -> Option<&SerialEeprom> {
        Some(self)
    }

    fn as_eeprom_mut(&mut self) -> Option<&mut SerialEeprom> {
        Some(self)
    }
}
