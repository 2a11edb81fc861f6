//! Microcontroller simulation kernel.
//!
//! This crate implements the event-driven core of a microcontroller simulator with the following:
//! 1. **Clock:** A monotonic cycle counter with one deferred callback per owner.
//! 2. **Signals:** Pins and nodes with tri-state digital resolution and RC settling
//!    for analog stimuli.
//! 3. **Registers:** Port registers that keep the value written apart from the
//!    value actually present on their pins.
//! 4. **Buses:** A two-wire (I²C-style) slave protocol engine with a serial EEPROM
//!    peripheral.
//! 5. **Simulation:** The simulator context, configuration and diagnostics.
//!
//! # Example
//!
//! ```
//! use mcusim_core::{Config, Drive, PinConfig, PinKind, SignalLevel, Simulator};
//!
//! let mut sim = Simulator::new(Config::default()).unwrap();
//! let node = sim.add_node("led");
//! let out = sim.add_pin(PinConfig::new("pa0", PinKind::Output));
//! let probe = sim.add_pin(PinConfig::new("probe", PinKind::Input));
//! sim.attach(node, out).unwrap();
//! sim.attach(node, probe).unwrap();
//!
//! sim.set_driving(out, Drive::bit(true)).unwrap();
//! assert_eq!(sim.driven_state(probe).unwrap(), SignalLevel::DrivenHigh);
//! ```

/// Common types and constants (ids, signal levels, errors).
pub mod common;
/// Simulator configuration (defaults, sections, JSON loading).
pub mod config;
/// Cycle scheduler and simulator context.
pub mod sim;
/// Signal network, port registers and two-wire devices.
pub mod soc;
/// Simulation statistics and anomaly reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or `Config::from_json`.
pub use crate::config::Config;
/// Handles, signal values and the error type.
pub use crate::common::{
    Cycle, Drive, EngineId, NodeId, PinId, PortId, Result, SignalLevel, SimError,
};
/// Top-level simulator; owns the clock and every component.
pub use crate::sim::{Scheduler, Simulator, Task};
/// Pin construction and two-wire peripheral contract.
pub use crate::soc::{
    Ack, PinConfig, PinKind, SerialEeprom, TwoWireDevice, TwoWireSlave, TwoWireState,
};
/// Diagnostics.
pub use crate::stats::{Anomaly, SimStats};
