//! Simulated on-chip and board components.
//!
//! This module organizes the components that make up the simulated board: the
//! pin/node signal network, port registers bound to pins, two-wire peripherals
//! and the [`Wiring`] context through which components touch shared state.

/// Two-wire slave engine and peripherals.
pub mod devices;

/// Pins, nodes and signal resolution.
pub mod net;

/// Port registers.
pub mod port;

/// Peripheral trait definitions for the two-wire bus.
pub mod traits;

pub use devices::{SerialEeprom, TwoWireSlave, TwoWireState};
pub use net::{Netlist, PinChange, PinConfig, PinKind};
pub use port::PortRegister;
pub use traits::{Ack, TwoWireDevice};

use crate::common::{Cycle, Drive, PinId, Result, SignalLevel};
use crate::sim::{Scheduler, Task};
use crate::stats::{Anomaly, SimStats};

/// Mutable view of the shared simulation state handed to a component.
///
/// Registers and engines never own the netlist or the clock; each operation
/// borrows them through this context for its duration.
#[derive(Debug)]
pub struct Wiring<'a> {
    /// Pin and node arena.
    pub net: &'a mut Netlist,
    /// Cycle clock.
    pub scheduler: &'a mut Scheduler<Task>,
    /// Diagnostics sink.
    pub stats: &'a mut SimStats,
}

impl Wiring<'_> {
    /// Current cycle.
    pub fn now(&self) -> Cycle {
        self.scheduler.now()
    }

    /// Resolved level seen by `pin`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SimError::UnknownPin`] for a stale handle.
    pub fn level(&self, pin: PinId) -> Result<SignalLevel> {
        self.net.driven_state(pin)
    }

    /// Changes what `pin` asserts.
    ///
    /// # Errors
    ///
    /// Propagates netlist errors.
    pub fn drive(&mut self, pin: PinId, drive: Drive) -> Result<()> {
        self.net.set_driving(pin, drive, self.scheduler, self.stats)
    }

    /// Enables or disables a pin's output stage.
    ///
    /// # Errors
    ///
    /// Propagates netlist errors.
    pub fn set_output_enabled(&mut self, pin: PinId, enabled: bool) -> Result<bool> {
        self.net
            .set_output_enabled(pin, enabled, self.scheduler, self.stats)
    }

    /// Schedules `task` `delta` cycles from now.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SimError::ScheduleInPast`] when `delta` is zero.
    pub fn schedule_in(&mut self, task: Task, delta: Cycle) -> Result<()> {
        self.scheduler.schedule_in(task, delta)
    }

    /// Cancels a pending task.
    pub fn cancel(&mut self, task: Task) -> bool {
        self.scheduler.cancel(task)
    }

    /// Records an anomaly at the current cycle.
    pub fn record(&mut self, anomaly: Anomaly) {
        let now = self.scheduler.now();
        self.stats.record(now, anomaly);
    }
}
