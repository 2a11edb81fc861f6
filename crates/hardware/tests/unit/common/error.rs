//! Error message and conversion tests.

use mcusim_core::{Config, NodeId, PinId, SimError};

#[test]
fn schedule_in_past_message() {
    let e = SimError::ScheduleInPast { at: 3, now: 7 };
    assert_eq!(e.to_string(), "cannot schedule at cycle 3: current cycle is 7");
}

#[test]
fn handle_errors_name_the_handle() {
    assert_eq!(SimError::UnknownPin(PinId(4)).to_string(), "unknown pin pin#4");
    assert_eq!(SimError::UnknownNode(NodeId(0)).to_string(), "unknown node node#0");
}

#[test]
fn json_errors_convert() {
    let err = Config::from_json("{ not json").unwrap_err();
    assert!(matches!(err, SimError::ConfigParse(_)));
}
