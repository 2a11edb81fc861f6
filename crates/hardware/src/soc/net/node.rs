//! Node model and digital resolution.
//!
//! A node is a shared bus segment. In digital mode it resolves the levels of
//! its attached pins with a fixed table; in analog mode (see [`super::analog`])
//! it tracks a voltage settling toward the Thevenin equivalent of its drivers.

use crate::common::{Cycle, PinId, SignalLevel};

/// Outcome of resolving a set of digital contributions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved level.
    pub level: SignalLevel,
    /// Strong high and strong low were both asserted.
    pub contention: bool,
    /// Weak high and weak low were both asserted with no strong driver.
    pub weak_conflict: bool,
}

/// Resolves digital contributions into one level.
///
/// | contributions                         | result       |
/// |---------------------------------------|--------------|
/// | any `Unknown`                         | `Unknown`    |
/// | `DrivenHigh` and `DrivenLow`          | `Unknown`, contention |
/// | one strong polarity                   | that level   |
/// | `WeakHigh` and `WeakLow`, no strong   | `Unknown`    |
/// | one weak polarity, no strong          | that level   |
/// | nothing                               | `Floating`   |
///
/// The result depends only on which levels are present, never on their order.
pub fn resolve_levels<I>(levels: I) -> Resolution
where
    I: IntoIterator<Item = SignalLevel>,
{
    let (mut strong_high, mut strong_low) = (false, false);
    let (mut weak_high, mut weak_low) = (false, false);
    let mut unknown = false;

    for level in levels {
        match level {
            SignalLevel::DrivenHigh => strong_high = true,
            SignalLevel::DrivenLow => strong_low = true,
            SignalLevel::WeakHigh => weak_high = true,
            SignalLevel::WeakLow => weak_low = true,
            SignalLevel::Unknown => unknown = true,
            SignalLevel::Floating => {}
        }
    }

    let contention = strong_high && strong_low;
    let strong = strong_high || strong_low;
    let weak_conflict = !strong && weak_high && weak_low;

    let level = if unknown || contention || weak_conflict {
        SignalLevel::Unknown
    } else if strong_high {
        SignalLevel::DrivenHigh
    } else if strong_low {
        SignalLevel::DrivenLow
    } else if weak_high {
        SignalLevel::WeakHigh
    } else if weak_low {
        SignalLevel::WeakLow
    } else {
        SignalLevel::Floating
    };

    Resolution {
        level,
        contention,
        weak_conflict,
    }
}

/// A node living in the netlist arena.
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) name: String,
    /// Attached pins in attach order.
    pub(crate) pins: Vec<PinId>,
    /// Resolved level.
    pub(crate) level: SignalLevel,
    /// Voltage at cycle `since`.
    pub(crate) voltage: f64,
    /// Cycle at which `voltage` was last evaluated.
    pub(crate) since: Cycle,
    /// Thevenin target voltage.
    pub(crate) target: f64,
    /// Thevenin resistance (ohms); infinite with no drivers.
    pub(crate) zth: f64,
    /// Total capacitance (farads).
    pub(crate) cth: f64,
    /// Time constant in cycles.
    pub(crate) tau_cycles: f64,
    /// Wiring capacitance of the node itself (farads).
    pub(crate) capacitance: f64,
    pub(crate) analog: bool,
    /// Only pull resistors drive the analog voltage.
    pub(crate) pulled_only: bool,
    pub(crate) settling: bool,
    pub(crate) settle_at: Option<Cycle>,
    pub(crate) contention: bool,
}

impl Node {
    pub(crate) fn new(name: String, capacitance: f64) -> Self {
        Self {
            name,
            pins: Vec::new(),
            level: SignalLevel::Floating,
            voltage: 0.0,
            since: 0,
            target: 0.0,
            zth: f64::INFINITY,
            cth: capacitance,
            tau_cycles: 0.0,
            capacitance,
            analog: false,
            pulled_only: false,
            settling: false,
            settle_at: None,
            contention: false,
        }
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attached pins, in attach order.
    pub fn pins(&self) -> &[PinId] {
        &self.pins
    }

    /// Resolved level.
    pub const fn level(&self) -> SignalLevel {
        self.level
    }

    /// True while an RC settle is in progress.
    pub const fn is_settling(&self) -> bool {
        self.settling
    }

    /// True when the node is resolved with the RC model.
    pub const fn is_analog(&self) -> bool {
        self.analog
    }

    /// Cycle of the next settle callback.
    pub const fn settle_at(&self) -> Option<Cycle> {
        self.settle_at
    }

    /// True while strong drivers of both polarities are attached.
    pub const fn in_contention(&self) -> bool {
        self.contention
    }

    /// Thevenin target voltage, resistance and capacitance.
    pub const fn thevenin(&self) -> (f64, f64, f64) {
        (self.target, self.zth, self.cth)
    }
}
