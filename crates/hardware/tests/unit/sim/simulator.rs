//! Simulator context tests.
//!
//! Verifies handle validation, time control and reset.

use mcusim_core::config::Config;
use mcusim_core::{
    Drive, EngineId, NodeId, PinConfig, PinId, PinKind, SignalLevel, SimError, Simulator, Task,
};
use pretty_assertions::assert_eq;

use crate::common::harness::TestContext;

fn rc(ctx: &mut TestContext) -> NodeId {
    let node = ctx.sim.add_node("rc");
    let cap = ctx
        .sim
        .add_pin(PinConfig::new("cap", PinKind::Input).with_capacitance(1e-9));
    let src = ctx.sim.add_pin(PinConfig::new("src", PinKind::Output).with_drive(Drive::Analog {
        volts: 5.0,
        impedance: 10_000.0,
    }));
    ctx.sim.attach(node, cap).unwrap();
    ctx.sim.attach(node, src).unwrap();
    node
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = Config::default();
    config.electrical.vdd = 0.0;
    assert!(matches!(Simulator::new(config), Err(SimError::InvalidConfig(_))));
}

#[test]
fn stale_handles_are_errors() {
    let mut ctx = TestContext::new();
    let pin = ctx.sim.add_pin(PinConfig::new("p", PinKind::Output));
    let node = ctx.sim.add_node("n");
    ctx.sim.remove_pin(pin).unwrap();
    ctx.sim.remove_node(node).unwrap();

    assert!(matches!(
        ctx.sim.set_driving(pin, Drive::bit(true)),
        Err(SimError::UnknownPin(p)) if p == pin
    ));
    assert!(matches!(ctx.sim.node_level(node), Err(SimError::UnknownNode(_))));

    let fresh = ctx.sim.add_pin(PinConfig::new("q", PinKind::Input));
    assert!(matches!(ctx.sim.attach(node, fresh), Err(SimError::UnknownNode(_))));
    assert!(matches!(
        ctx.sim.two_wire_state(EngineId(0)),
        Err(SimError::UnknownEngine(_))
    ));
    assert!(ctx.sim.driven_state(PinId(999)).is_err());
    assert!(ctx.sim.eeprom(EngineId(3)).is_none());
}

#[test]
fn new_handles_are_never_reused() {
    let mut ctx = TestContext::new();
    let a = ctx.sim.add_pin(PinConfig::new("a", PinKind::Input));
    ctx.sim.remove_pin(a).unwrap();
    let b = ctx.sim.add_pin(PinConfig::new("b", PinKind::Input));
    assert_ne!(a, b);
    assert!(ctx.sim.pin(a).is_err());
    assert_eq!(ctx.sim.pin(b).unwrap().name(), "b");
}

#[test]
fn advance_fires_callbacks_and_lands_on_target() {
    let mut ctx = TestContext::new();
    let _ = rc(&mut ctx);
    let fired = ctx.sim.advance_by(25).unwrap();
    assert!(fired > 0);
    assert_eq!(ctx.sim.now(), 25);
    assert_eq!(ctx.sim.stats().callbacks_fired, fired as u64);

    assert_eq!(ctx.sim.advance_to(10).unwrap(), 0);
    assert_eq!(ctx.sim.now(), 25);
}

#[test]
fn idle_board_only_moves_time() {
    let mut ctx = TestContext::new();
    assert_eq!(ctx.sim.advance_to(1_000_000).unwrap(), 0);
    assert_eq!(ctx.sim.now(), 1_000_000);
    assert!(ctx.sim.scheduler().is_empty());
}

#[test]
fn reset_keeps_voltage_and_resumes_settling() {
    let mut ctx = TestContext::new();
    let node = rc(&mut ctx);
    ctx.run(20);
    let before = ctx.sim.node_voltage(node).unwrap();
    assert!(before > 0.0 && before < 5.0);

    ctx.sim.reset().unwrap();
    assert_eq!(ctx.sim.now(), 0);
    assert!((ctx.sim.node_voltage(node).unwrap() - before).abs() < 1e-9);
    assert!(ctx.sim.scheduler().pending(Task::Settle(node)).is_some());
    assert_eq!(ctx.sim.stats().callbacks_fired, 0);

    ctx.run(1_000);
    assert!((ctx.sim.node_voltage(node).unwrap() - 5.0).abs() < 1e-12);
}

#[test]
fn reset_keeps_digital_levels() {
    let mut ctx = TestContext::new();
    let node = ctx.sim.add_node("n");
    let p = ctx.sim.add_pin(PinConfig::new("p", PinKind::Output).with_drive(Drive::bit(true)));
    ctx.sim.attach(node, p).unwrap();
    ctx.run(10);
    ctx.sim.reset().unwrap();
    assert_eq!(ctx.sim.node_level(node).unwrap(), SignalLevel::DrivenHigh);
}

#[test]
fn config_from_json_drives_time_constants() {
    let config = Config::from_json(r#"{ "clock": { "cycles_per_second": 2000000 } }"#).unwrap();
    let mut ctx = TestContext::with_config(config);
    let node = rc(&mut ctx);
    // τ is now 20 cycles.
    ctx.run(20);
    let expected = 5.0 * (1.0 - (-1.0f64).exp());
    assert!((ctx.sim.node_voltage(node).unwrap() - expected).abs() < 1e-9);
}
