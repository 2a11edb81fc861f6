//! Port register unit tests.
//!
//! Verifies the driving/driven split, masks, floating reads and the data
//! direction register.

use mcusim_core::{Drive, PinConfig, PinKind, PortId, SignalLevel, SimError};
use pretty_assertions::assert_eq;

use crate::common::harness::TestContext;

/// Port of 8 bits; bit 0 is open-collector with a pull-down on its node,
/// bits 1..=3 are push-pull outputs, bits 4..=7 are unbound.
fn port_with_pulldown(ctx: &mut TestContext) -> PortId {
    let port = ctx.sim.add_port("PORTA", 8).unwrap();

    let n0 = ctx.sim.add_node("ra0");
    let oc = ctx
        .sim
        .add_pin(PinConfig::new("ra0", PinKind::OpenCollector { output_enabled: true }));
    let pulldown = ctx.sim.add_pin(
        PinConfig::new("pulldown", PinKind::Output).with_drive(Drive::Level(SignalLevel::WeakLow)),
    );
    ctx.sim.attach(n0, oc).unwrap();
    ctx.sim.attach(n0, pulldown).unwrap();
    ctx.sim.bind_port_pin(port, 0, oc).unwrap();

    for bit in 1..=3 {
        let node = ctx.sim.add_node(format!("ra{bit}"));
        let pin = ctx.sim.add_pin(PinConfig::new(format!("ra{bit}"), PinKind::Output));
        ctx.sim.attach(node, pin).unwrap();
        ctx.sim.bind_port_pin(port, bit, pin).unwrap();
    }
    port
}

#[test]
fn write_read_split_with_pulldown() {
    let mut ctx = TestContext::new();
    let port = port_with_pulldown(&mut ctx);
    assert_eq!(ctx.sim.port(port).unwrap().enable_mask(), 0x0F);

    ctx.sim.port_write(port, 0xFF).unwrap();
    assert_eq!(ctx.sim.port_read(port).unwrap(), 0x0E);

    let reg = ctx.sim.port(port).unwrap();
    assert_eq!(reg.driving_value(), 0xFF);
    assert_eq!(reg.driven_value(), 0x0E);
}

#[test]
fn only_changed_bits_touch_pins() {
    let mut ctx = TestContext::new();
    let port = port_with_pulldown(&mut ctx);
    ctx.sim.port_write(port, 0x0A).unwrap();
    assert_eq!(ctx.sim.port_read(port).unwrap(), 0x0A);

    // An external change on bit 3 is kept until the processor writes bit 3 again.
    let pin3 = ctx.sim.port(port).unwrap().pin(3).unwrap();
    ctx.sim.set_driving(pin3, Drive::bit(false)).unwrap();
    assert_eq!(ctx.sim.port_read(port).unwrap(), 0x02);
    ctx.sim.port_write(port, 0x0E).unwrap();
    assert_eq!(ctx.sim.port_read(port).unwrap(), 0x06);
    ctx.sim.port_write(port, 0x06).unwrap();
    ctx.sim.port_write(port, 0x0E).unwrap();
    assert_eq!(ctx.sim.port_read(port).unwrap(), 0x0E);
}

#[test]
fn disabled_bits_read_default_and_mask_applies() {
    let mut ctx = TestContext::new();
    let port = port_with_pulldown(&mut ctx);
    {
        let reg = ctx.sim.port_mut(port).unwrap();
        reg.set_default_value(0xF0);
        reg.set_enable_mask(0x06);
        reg.set_output_mask(0x7F);
    }
    ctx.sim.port_write(port, 0xFF).unwrap();
    assert_eq!(ctx.sim.port_read(port).unwrap(), 0x76);
}

#[test]
fn floating_bit_reads_zero_and_is_recorded() {
    let mut ctx = TestContext::new();
    let port = ctx.sim.add_port("PORTB", 4).unwrap();
    let node = ctx.sim.add_node("rb0");
    let pin = ctx.sim.add_pin(PinConfig::new("rb0", PinKind::Input));
    ctx.sim.attach(node, pin).unwrap();
    ctx.sim.bind_port_pin(port, 0, pin).unwrap();

    assert_eq!(ctx.sim.port_read(port).unwrap(), 0);
    assert_eq!(ctx.sim.stats().floating_reads, 1);

    ctx.sim.set_pullup(pin, true).unwrap();
    assert_eq!(ctx.sim.port_read(port).unwrap(), 1);
    assert_eq!(ctx.sim.stats().floating_reads, 1);
}

#[test]
fn direction_register_switches_output_stage() {
    let mut ctx = TestContext::new();
    let port = ctx.sim.add_port("PORTC", 2).unwrap();
    let node = ctx.sim.add_node("rc0");
    let io = ctx
        .sim
        .add_pin(PinConfig::new("rc0", PinKind::BiDirectional { output_enabled: true }));
    let ext = ctx.sim.add_pin(PinConfig::new("ext", PinKind::Output).with_drive(
        Drive::Level(SignalLevel::WeakHigh),
    ));
    ctx.sim.attach(node, io).unwrap();
    ctx.sim.attach(node, ext).unwrap();
    ctx.sim.bind_port_pin(port, 0, io).unwrap();

    ctx.sim.port_write(port, 0x00).unwrap();
    assert_eq!(ctx.sim.port_read(port).unwrap(), 0x00);

    // Input: the external pull-up wins, the written 0 is kept as bookkeeping.
    ctx.sim.set_port_direction(port, 0x00).unwrap();
    assert_eq!(ctx.sim.port_read(port).unwrap(), 0x01);
    assert_eq!(ctx.sim.port(port).unwrap().driving_value(), 0x00);

    ctx.sim.set_port_direction(port, 0x01).unwrap();
    assert_eq!(ctx.sim.port_read(port).unwrap(), 0x00);
}

#[test]
fn bad_handles_and_bits() {
    let mut ctx = TestContext::new();
    let port = ctx.sim.add_port("P", 4).unwrap();
    let pin = ctx.sim.add_pin(PinConfig::new("x", PinKind::Input));
    assert!(matches!(
        ctx.sim.bind_port_pin(port, 4, pin),
        Err(SimError::BitOutOfRange { bit: 4, width: 4 })
    ));
    assert!(matches!(
        ctx.sim.port_write(PortId(9), 1),
        Err(SimError::UnknownPort(PortId(9)))
    ));
    assert!(ctx.sim.add_port("wide", 33).is_err());
}

#[test]
fn removing_a_bound_pin_unbinds_its_bit() {
    let mut ctx = TestContext::new();
    let port = port_with_pulldown(&mut ctx);
    ctx.sim.port_mut(port).unwrap().set_default_value(0x02);
    ctx.sim.port_write(port, 0x0F).unwrap();

    let pin1 = ctx.sim.port(port).unwrap().pin(1).unwrap();
    ctx.sim.remove_pin(pin1).unwrap();
    let reg = ctx.sim.port(port).unwrap();
    assert_eq!(reg.pin(1), None);
    assert_eq!(reg.enable_mask(), 0x0D);

    // The rest of the register keeps working; bit 1 reads its default.
    ctx.sim.port_write(port, 0x00).unwrap();
    assert_eq!(ctx.sim.port_read(port).unwrap(), 0x02);
    ctx.sim.port_write(port, 0x0F).unwrap();
    assert_eq!(ctx.sim.port_read(port).unwrap(), 0x0E);
}
