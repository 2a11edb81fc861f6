//! Digital node resolution tests.
//!
//! Verifies the resolution table, pin capabilities, contention reporting and
//! re-attachment.

use mcusim_core::soc::net::resolve_levels;
use mcusim_core::{Drive, PinConfig, PinKind, SignalLevel};
use proptest::prelude::*;
use rstest::rstest;

use crate::common::harness::TestContext;

use SignalLevel::{DrivenHigh, DrivenLow, Floating, Unknown, WeakHigh, WeakLow};

#[rstest]
#[case(&[DrivenHigh, Floating], DrivenHigh, false)]
#[case(&[DrivenHigh, DrivenLow], Unknown, true)]
#[case(&[WeakHigh, DrivenLow], DrivenLow, false)]
#[case(&[WeakHigh, WeakLow], Unknown, false)]
#[case(&[WeakLow, Floating], WeakLow, false)]
#[case(&[DrivenHigh, Unknown], Unknown, false)]
#[case(&[Floating, Floating], Floating, false)]
#[case(&[], Floating, false)]
fn resolution_table(
    #[case] levels: &[SignalLevel],
    #[case] expected: SignalLevel,
    #[case] contention: bool,
) {
    let r = resolve_levels(levels.iter().copied());
    assert_eq!(r.level, expected);
    assert_eq!(r.contention, contention);
}

fn any_level() -> impl Strategy<Value = SignalLevel> {
    prop_oneof![
        Just(DrivenHigh),
        Just(DrivenLow),
        Just(WeakHigh),
        Just(WeakLow),
        Just(Floating),
        Just(Unknown),
    ]
}

proptest! {
    #[test]
    fn resolution_ignores_order(mut levels in prop::collection::vec(any_level(), 0..8)) {
        let forward = resolve_levels(levels.iter().copied());
        levels.reverse();
        prop_assert_eq!(resolve_levels(levels.iter().copied()), forward);
    }
}

#[test]
fn high_and_floating_resolve_high() {
    let mut ctx = TestContext::new();
    let node = ctx.sim.add_node("n");
    let drv = ctx.sim.add_pin(PinConfig::new("drv", PinKind::Output).with_drive(Drive::bit(true)));
    let inp = ctx.sim.add_pin(PinConfig::new("in", PinKind::Input));
    ctx.sim.attach(node, drv).unwrap();
    ctx.sim.attach(node, inp).unwrap();

    assert_eq!(ctx.sim.node_level(node).unwrap(), DrivenHigh);
    assert_eq!(ctx.sim.driven_state(inp).unwrap(), DrivenHigh);
    assert_eq!(ctx.sim.node_voltage(node).unwrap(), 5.0);
}

#[test]
fn contention_resolves_unknown_and_is_recorded_once() {
    let mut ctx = TestContext::new();
    let node = ctx.sim.add_node("n");
    let a = ctx.sim.add_pin(PinConfig::new("a", PinKind::Output).with_drive(Drive::bit(true)));
    let b = ctx.sim.add_pin(PinConfig::new("b", PinKind::Output).with_drive(Drive::bit(false)));
    ctx.sim.attach(node, a).unwrap();
    ctx.sim.attach(node, b).unwrap();

    assert_eq!(ctx.sim.node_level(node).unwrap(), Unknown);
    assert!(ctx.sim.netlist().node(node).unwrap().in_contention());
    assert_eq!(ctx.sim.stats().contentions, 1);

    // still fighting: no new anomaly
    ctx.sim.set_pullup(a, true).unwrap();
    assert_eq!(ctx.sim.stats().contentions, 1);

    ctx.sim.set_driving(b, Drive::RELEASED).unwrap();
    assert_eq!(ctx.sim.node_level(node).unwrap(), DrivenHigh);
    assert!(!ctx.sim.netlist().node(node).unwrap().in_contention());
}

#[test]
fn open_collector_releases_to_pullup() {
    let mut ctx = TestContext::new();
    let node = ctx.sim.add_node("n");
    let oc = ctx.sim.add_pin(
        PinConfig::new("oc", PinKind::OpenCollector { output_enabled: true }).with_pullup(true),
    );
    ctx.sim.attach(node, oc).unwrap();
    assert_eq!(ctx.sim.node_level(node).unwrap(), WeakHigh);

    ctx.sim.set_driving(oc, Drive::bit(false)).unwrap();
    assert_eq!(ctx.sim.node_level(node).unwrap(), DrivenLow);

    ctx.sim.set_driving(oc, Drive::bit(true)).unwrap();
    assert_eq!(ctx.sim.node_level(node).unwrap(), WeakHigh);
}

#[test]
fn bidirectional_follows_output_enable() {
    let mut ctx = TestContext::new();
    let node = ctx.sim.add_node("n");
    let io = ctx.sim.add_pin(
        PinConfig::new("io", PinKind::BiDirectional { output_enabled: false })
            .with_drive(Drive::bit(false)),
    );
    ctx.sim.attach(node, io).unwrap();
    assert_eq!(ctx.sim.node_level(node).unwrap(), Floating);

    assert!(ctx.sim.set_output_enabled(io, true).unwrap());
    assert_eq!(ctx.sim.node_level(node).unwrap(), DrivenLow);

    let out = ctx.sim.add_pin(PinConfig::new("out", PinKind::Output));
    assert!(!ctx.sim.set_output_enabled(out, false).unwrap());
}

#[test]
fn unattached_pin_resolves_from_own_drive() {
    let mut ctx = TestContext::new();
    let p = ctx.sim.add_pin(PinConfig::new("p", PinKind::Output));
    assert_eq!(ctx.sim.driven_state(p).unwrap(), Floating);
    ctx.sim.set_driving(p, Drive::bit(true)).unwrap();
    assert_eq!(ctx.sim.driven_state(p).unwrap(), DrivenHigh);
}

#[test]
fn attach_to_second_node_moves_pin() {
    let mut ctx = TestContext::new();
    let n1 = ctx.sim.add_node("n1");
    let n2 = ctx.sim.add_node("n2");
    let p = ctx.sim.add_pin(PinConfig::new("p", PinKind::Output).with_drive(Drive::bit(true)));
    ctx.sim.attach(n1, p).unwrap();
    ctx.sim.attach(n2, p).unwrap();

    assert!(ctx.sim.netlist().pins_of(n1).unwrap().is_empty());
    assert_eq!(ctx.sim.netlist().pins_of(n2).unwrap(), &[p]);
    assert_eq!(ctx.sim.node_level(n1).unwrap(), Floating);
    assert_eq!(ctx.sim.node_level(n2).unwrap(), DrivenHigh);
}

#[test]
fn detach_restores_node() {
    let mut ctx = TestContext::new();
    let node = ctx.sim.add_node("n");
    let p = ctx.sim.add_pin(PinConfig::new("p", PinKind::Output).with_drive(Drive::bit(false)));
    ctx.sim.attach(node, p).unwrap();
    assert!(ctx.sim.detach(p).unwrap());
    assert!(!ctx.sim.detach(p).unwrap());
    assert_eq!(ctx.sim.node_level(node).unwrap(), Floating);
    assert_eq!(ctx.sim.driven_state(p).unwrap(), DrivenLow);
}

#[test]
fn lookup_by_name_and_removal() {
    let mut ctx = TestContext::new();
    let node = ctx.sim.add_node("bus");
    let p = ctx.sim.add_pin(PinConfig::new("pb3", PinKind::Input));
    ctx.sim.attach(node, p).unwrap();
    assert_eq!(ctx.sim.find_pin("pb3"), Some(p));
    assert_eq!(ctx.sim.find_node("bus"), Some(node));

    ctx.sim.remove_pin(p).unwrap();
    assert_eq!(ctx.sim.find_pin("pb3"), None);
    assert!(ctx.sim.driven_state(p).is_err());
    assert!(ctx.sim.netlist().pins_of(node).unwrap().is_empty());

    ctx.sim.remove_node(node).unwrap();
    assert_eq!(ctx.sim.find_node("bus"), None);
}
