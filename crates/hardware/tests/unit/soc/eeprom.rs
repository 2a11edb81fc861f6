//! Serial EEPROM tests over a bit-banged bus.
//!
//! Verifies page writes, random and current reads, acknowledge polling during
//! the write cycle, write protection and block select.

use mcusim_core::config::Config;
use mcusim_core::{SerialEeprom, Task, TwoWireState};
use pretty_assertions::assert_eq;

use crate::common::harness::{Bus, TestContext};

const HALF: u64 = 5;
const WRITE_CYCLE: u64 = 500;

fn setup() -> (TestContext, Bus) {
    let mut config = Config::default();
    config.eeprom.write_cycle = WRITE_CYCLE;
    let mut ctx = TestContext::with_config(config);
    let bus = ctx.bus(HALF);
    (ctx, bus)
}

#[test]
fn page_write_then_random_read() {
    let (mut ctx, bus) = setup();
    let engine = ctx.add_eeprom(&bus, 0xA0);
    let m = bus.master;

    let acks = m.write(&mut ctx.sim, 0xA0, &[0x10, 0xDE, 0xAD]);
    assert_eq!(acks, vec![true; 4]);
    m.stop(&mut ctx.sim);
    assert!(ctx.sim.eeprom(engine).unwrap().is_busy());
    assert_eq!(ctx.sim.eeprom(engine).unwrap().read_byte(0x10), 0xFF);

    ctx.run(WRITE_CYCLE);
    let rom = ctx.sim.eeprom(engine).unwrap();
    assert!(!rom.is_busy());
    assert_eq!(&rom.memory()[0x10..0x12], &[0xDE, 0xAD]);

    // Word address, repeated start, then read two bytes.
    assert_eq!(m.write(&mut ctx.sim, 0xA0, &[0x10]), vec![true, true]);
    m.start(&mut ctx.sim);
    assert!(m.write_byte(&mut ctx.sim, 0xA1));
    assert_eq!(m.read_byte(&mut ctx.sim, true), 0xDE);
    assert_eq!(m.read_byte(&mut ctx.sim, false), 0xAD);
    m.stop(&mut ctx.sim);

    assert_eq!(ctx.sim.two_wire_state(engine).unwrap(), TwoWireState::Idle);
    assert!(!ctx.sim.eeprom(engine).unwrap().is_busy());
    assert_eq!(ctx.sim.stats().bytes_sent, 2);
}

#[test]
fn current_read_starts_at_pointer() {
    let (mut ctx, bus) = setup();
    let engine = ctx.add_eeprom(&bus, 0xA0);
    ctx.sim.eeprom_mut(engine).unwrap().load(0, b"hi!").unwrap();
    let m = bus.master;

    m.start(&mut ctx.sim);
    assert!(m.write_byte(&mut ctx.sim, 0xA1));
    let bytes = [
        m.read_byte(&mut ctx.sim, true),
        m.read_byte(&mut ctx.sim, true),
        m.read_byte(&mut ctx.sim, false),
    ];
    m.stop(&mut ctx.sim);
    assert_eq!(&bytes, b"hi!");
    assert_eq!(ctx.sim.eeprom(engine).unwrap().pointer(), 3);
}

#[test]
fn acknowledge_polling_during_write_cycle() {
    let (mut ctx, bus) = setup();
    let engine = ctx.add_eeprom(&bus, 0xA0);
    let m = bus.master;

    let _ = m.write(&mut ctx.sim, 0xA0, &[0x00, 0x42]);
    m.stop(&mut ctx.sim);
    assert!(ctx.sim.scheduler().pending(Task::TwoWireWrite(engine)).is_some());

    m.start(&mut ctx.sim);
    assert!(!m.write_byte(&mut ctx.sim, 0xA0));
    m.stop(&mut ctx.sim);
    assert_eq!(ctx.sim.stats().unmatched_addresses, 1);

    ctx.run(WRITE_CYCLE);
    m.start(&mut ctx.sim);
    assert!(m.write_byte(&mut ctx.sim, 0xA0));
    m.stop(&mut ctx.sim);
    assert_eq!(ctx.sim.eeprom(engine).unwrap().read_byte(0), 0x42);
}

#[test]
fn write_protect_nacks_data_and_keeps_memory() {
    let (mut ctx, bus) = setup();
    let engine = ctx.add_eeprom(&bus, 0xA0);
    ctx.sim.eeprom_mut(engine).unwrap().set_write_protect(true);
    let m = bus.master;

    let acks = m.write(&mut ctx.sim, 0xA0, &[0x00, 0x11]);
    assert_eq!(acks, vec![true, true, false]);
    m.stop(&mut ctx.sim);

    let rom = ctx.sim.eeprom(engine).unwrap();
    assert!(!rom.is_busy());
    assert_eq!(rom.read_byte(0), 0xFF);
    assert_eq!(ctx.sim.stats().nacks, 1);
    assert_eq!(ctx.sim.scheduler().pending(Task::TwoWireWrite(engine)), None);
}

#[test]
fn block_select_from_device_address() {
    let mut config = Config::default();
    config.eeprom.size = 1024;
    config.eeprom.page_size = 16;
    config.eeprom.write_cycle = WRITE_CYCLE;
    let mut ctx = TestContext::with_config(config);
    let bus = ctx.bus(HALF);
    let rom = SerialEeprom::new(&ctx.sim.config().eeprom).unwrap();
    // Bits 3..1 of the address byte select the block, not the part.
    let engine = ctx
        .sim
        .add_two_wire_slave(Box::new(rom), 0xA0, 0xF0, bus.scl, bus.sda)
        .unwrap();
    let m = bus.master;

    assert_eq!(m.write(&mut ctx.sim, 0xA4, &[0x10, 0x5A]), vec![true; 3]);
    m.stop(&mut ctx.sim);
    ctx.run(WRITE_CYCLE);
    assert_eq!(ctx.sim.eeprom(engine).unwrap().read_byte(0x210), 0x5A);
    assert_eq!(ctx.sim.eeprom(engine).unwrap().read_byte(0x010), 0xFF);
}

#[test]
fn removal_mid_write_cycle_drops_pending_commit() {
    let (mut ctx, bus) = setup();
    let engine = ctx.add_eeprom(&bus, 0xA0);
    let m = bus.master;

    let _ = m.write(&mut ctx.sim, 0xA0, &[0x00, 0x42]);
    m.stop(&mut ctx.sim);
    let device = ctx.sim.remove_two_wire_slave(engine).unwrap();
    ctx.run(2 * WRITE_CYCLE);

    let rom = device.as_eeprom().unwrap();
    assert!(rom.is_busy());
    assert_eq!(rom.read_byte(0), 0xFF);
    assert_eq!(ctx.sim.scheduler().pending(Task::TwoWireWrite(engine)), None);
}
