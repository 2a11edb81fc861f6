//! Analog node settling tests.
//!
//! An RC network with Zth = 10 kΩ and Cth = 1 nF has τ = 10 µs, i.e. 10 cycles
//! at the default 1 MHz cycle rate.

use mcusim_core::{Drive, NodeId, PinConfig, PinKind, PinId, SignalLevel, Task};

use crate::common::harness::TestContext;

const TAU_CYCLES: u64 = 10;

/// Capacitor probe on a node, then a 5 V source behind 10 kΩ attached at cycle 0.
fn rc_network(ctx: &mut TestContext) -> (NodeId, PinId, PinId) {
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
    (node, cap, src)
}

#[test]
fn converges_within_one_percent_after_five_tau() {
    let mut ctx = TestContext::new();
    let (node, cap, _) = rc_network(&mut ctx);
    assert!(ctx.sim.netlist().node(node).unwrap().is_settling());
    assert_eq!(ctx.sim.node_voltage(node).unwrap(), 0.0);

    ctx.run(5 * TAU_CYCLES);
    let v = ctx.sim.node_voltage(node).unwrap();
    assert!((v - 5.0).abs() <= 0.05, "v = {v}");
    assert!(v < 5.0);
    assert_eq!(ctx.sim.driven_state(cap).unwrap(), SignalLevel::DrivenHigh);
}

#[test]
fn zero_elapsed_cycles_leave_voltage_unchanged() {
    let mut ctx = TestContext::new();
    let (node, _, _) = rc_network(&mut ctx);
    ctx.run(7);
    let before = ctx.sim.node_voltage(node).unwrap();
    ctx.run(0);
    assert_eq!(ctx.sim.node_voltage(node).unwrap(), before);
}

#[test]
fn follows_exponential_between_steps() {
    let mut ctx = TestContext::new();
    let (node, _, _) = rc_network(&mut ctx);
    for t in [3u64, 10, 21, 34] {
        let _ = ctx.sim.advance_to(t).unwrap();
        let expected = 5.0 * (1.0 - (-(t as f64) / TAU_CYCLES as f64).exp());
        let v = ctx.sim.node_voltage(node).unwrap();
        assert!((v - expected).abs() < 1e-9, "t = {t}: {v} vs {expected}");
    }
}

#[test]
fn settles_and_stops_scheduling() {
    let mut ctx = TestContext::new();
    let (node, _, _) = rc_network(&mut ctx);
    ctx.run(50 * TAU_CYCLES);
    let n = ctx.sim.netlist().node(node).unwrap();
    assert!(!n.is_settling());
    assert!((ctx.sim.node_voltage(node).unwrap() - 5.0).abs() < 1e-12);
    assert_eq!(ctx.sim.scheduler().pending(Task::Settle(node)), None);
    assert!(ctx.sim.stats().settle_steps > 2);
}

#[test]
fn level_crosses_threshold_with_hysteresis() {
    let mut ctx = TestContext::new();
    let (node, cap, _) = rc_network(&mut ctx);
    assert_eq!(ctx.sim.driven_state(cap).unwrap(), SignalLevel::DrivenLow);

    // Vih = 3.5 V is crossed at t = -τ ln(0.3) ≈ 12 cycles.
    ctx.run(8);
    assert_eq!(ctx.sim.node_level(node).unwrap(), SignalLevel::DrivenLow);
    ctx.run(60);
    assert_eq!(ctx.sim.node_level(node).unwrap(), SignalLevel::DrivenHigh);
}

#[test]
fn thevenin_of_two_sources() {
    let mut ctx = TestContext::new();
    let (node, _, _) = rc_network(&mut ctx);
    let sink = ctx.sim.add_pin(PinConfig::new("sink", PinKind::Output).with_drive(Drive::Analog {
        volts: 0.0,
        impedance: 10_000.0,
    }));
    ctx.sim.attach(node, sink).unwrap();
    let (vth, zth, cth) = ctx.sim.netlist().node(node).unwrap().thevenin();
    assert!((vth - 2.5).abs() < 1e-12);
    assert!((zth - 5_000.0).abs() < 1e-6);
    assert!((cth - 1e-9).abs() < 1e-21);

    ctx.run(200);
    assert!((ctx.sim.node_voltage(node).unwrap() - 2.5).abs() < 1e-12);
}

#[test]
fn returning_to_digital_cancels_settle() {
    let mut ctx = TestContext::new();
    let node = ctx.sim.add_node("n");
    let src = ctx.sim.add_pin(PinConfig::new("src", PinKind::Output));
    let cap = ctx
        .sim
        .add_pin(PinConfig::new("cap", PinKind::Input).with_capacitance(1e-9));
    ctx.sim.attach(node, src).unwrap();
    ctx.sim.attach(node, cap).unwrap();
    ctx.sim
        .set_driving(
            src,
            Drive::Analog {
                volts: 5.0,
                impedance: 10_000.0,
            },
        )
        .unwrap();
    assert!(ctx.sim.scheduler().pending(Task::Settle(node)).is_some());

    ctx.sim.detach(cap).unwrap();
    ctx.sim.set_driving(src, Drive::bit(false)).unwrap();
    assert_eq!(ctx.sim.scheduler().pending(Task::Settle(node)), None);
    assert_eq!(ctx.sim.node_level(node).unwrap(), SignalLevel::DrivenLow);
    assert_eq!(ctx.sim.node_voltage(node).unwrap(), 0.0);
}

#[test]
fn pulled_only_node_reports_weak_level() {
    let mut ctx = TestContext::new();
    let node = ctx.sim.add_node("pulled");
    let cap = ctx
        .sim
        .add_pin(PinConfig::new("cap", PinKind::Input).with_capacitance(1e-9));
    let pull = ctx
        .sim
        .add_pin(PinConfig::new("pull", PinKind::Input).with_pullup(true));
    ctx.sim.attach(node, cap).unwrap();
    ctx.sim.attach(node, pull).unwrap();
    assert_eq!(ctx.sim.node_level(node).unwrap(), SignalLevel::WeakLow);

    // 20 kΩ pull-up into 1 nF: τ = 20 cycles.
    ctx.run(800);
    assert_eq!(ctx.sim.node_level(node).unwrap(), SignalLevel::WeakHigh);
    assert_eq!(ctx.sim.driven_state(cap).unwrap(), SignalLevel::WeakHigh);

    let sink = ctx.sim.add_pin(
        PinConfig::new("sink", PinKind::OpenCollector { output_enabled: true })
            .with_drive(Drive::bit(false)),
    );
    ctx.sim.attach(node, sink).unwrap();
    assert_eq!(ctx.sim.node_level(node).unwrap(), SignalLevel::DrivenLow);
}
