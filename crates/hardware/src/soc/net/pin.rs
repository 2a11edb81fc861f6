//! Pin model.
//!
//! A pin is one electrical terminal. It separates what this side asserts
//! (its drive) from what it observes after node resolution (its driven state).
//! Pin variants are expressed as a capability-tagged [`PinKind`] rather than a
//! type hierarchy: the kind decides how the raw drive becomes the effective
//! contribution to the node.

use crate::common::{Drive, NodeId, SignalLevel};

/// Electrical capability of a pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinKind {
    /// Observes only; its drive is ignored.
    Input,
    /// Push-pull output that always drives.
    Output,
    /// Input or push-pull output depending on `output_enabled`.
    BiDirectional {
        /// Output stage enabled (TRIS/DDR bit clear/set).
        output_enabled: bool,
    },
    /// Open-drain output: can pull low or release, never drives high.
    OpenCollector {
        /// Output stage enabled.
        output_enabled: bool,
    },
}

impl PinKind {
    /// True when the output stage is active.
    pub const fn output_enabled(self) -> bool {
        match self {
            Self::Input => false,
            Self::Output => true,
            Self::BiDirectional { output_enabled } | Self::OpenCollector { output_enabled } => {
                output_enabled
            }
        }
    }
}

/// Construction parameters for a pin.
///
/// Impedances left as `None` take the netlist's configured defaults.
#[derive(Clone, Debug)]
pub struct PinConfig {
    /// Diagnostic name, unique names can be looked up later.
    pub name: String,
    /// Electrical capability.
    pub kind: PinKind,
    /// Initial drive.
    pub drive: Drive,
    /// Pull-up resistor enabled.
    pub pullup: bool,
    /// Output driver impedance override (ohms).
    pub drive_impedance: Option<f64>,
    /// Pull resistor override (ohms); also used for weak low drives.
    pub pull_impedance: Option<f64>,
    /// Capacitance to ground (farads); a nonzero value makes the node analog.
    pub capacitance: f64,
}

impl PinConfig {
    /// A pin of the given kind, released, with default electricals.
    pub fn new(name: impl Into<String>, kind: PinKind) -> Self {
        Self {
            name: name.into(),
            kind,
            drive: Drive::RELEASED,
            pullup: false,
            drive_impedance: None,
            pull_impedance: None,
            capacitance: 0.0,
        }
    }

    /// Sets the initial drive.
    #[must_use]
    pub fn with_drive(mut self, drive: Drive) -> Self {
        self.drive = drive;
        self
    }

    /// Enables the pull-up resistor.
    #[must_use]
    pub fn with_pullup(mut self, pullup: bool) -> Self {
        self.pullup = pullup;
        self
    }

    /// Overrides the driver impedance.
    #[must_use]
    pub fn with_drive_impedance(mut self, ohms: f64) -> Self {
        self.drive_impedance = Some(ohms);
        self
    }

    /// Overrides the pull resistor.
    #[must_use]
    pub fn with_pull_impedance(mut self, ohms: f64) -> Self {
        self.pull_impedance = Some(ohms);
        self
    }

    /// Adds capacitance to ground.
    #[must_use]
    pub fn with_capacitance(mut self, farads: f64) -> Self {
        self.capacitance = farads;
        self
    }
}

/// A pin living in the netlist arena.
#[derive(Clone, Debug)]
pub struct Pin {
    pub(crate) name: String,
    pub(crate) kind: PinKind,
    pub(crate) drive: Drive,
    pub(crate) pullup: bool,
    pub(crate) drive_impedance: f64,
    pub(crate) pull_impedance: f64,
    pub(crate) capacitance: f64,
    /// Level observed after resolution.
    pub(crate) driven: SignalLevel,
    /// Voltage observed after resolution.
    pub(crate) voltage: f64,
    pub(crate) node: Option<NodeId>,
}

impl Pin {
    pub(crate) fn new(config: PinConfig, default_drive_z: f64, default_pull_z: f64) -> Self {
        Self {
            name: config.name,
            kind: config.kind,
            drive: config.drive,
            pullup: config.pullup,
            drive_impedance: config.drive_impedance.unwrap_or(default_drive_z),
            pull_impedance: config.pull_impedance.unwrap_or(default_pull_z),
            capacitance: config.capacitance,
            driven: SignalLevel::Floating,
            voltage: 0.0,
            node: None,
        }
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Electrical capability.
    pub const fn kind(&self) -> PinKind {
        self.kind
    }

    /// Raw drive as last set by the owner.
    pub const fn drive(&self) -> Drive {
        self.drive
    }

    /// Resolved level seen by this pin.
    pub const fn driven_state(&self) -> SignalLevel {
        self.driven
    }

    /// Resolved voltage seen by this pin.
    pub const fn voltage(&self) -> f64 {
        self.voltage
    }

    /// Node the pin is attached to.
    pub const fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Pull-up resistor state.
    pub const fn pullup(&self) -> bool {
        self.pullup
    }

    /// Capacitance to ground (farads).
    pub const fn capacitance(&self) -> f64 {
        self.capacitance
    }

    /// Enables or disables the output stage. Returns `false` for kinds without one.
    pub(crate) fn set_output_enabled(&mut self, enabled: bool) -> bool {
        match &mut self.kind {
            PinKind::BiDirectional { output_enabled }
            | PinKind::OpenCollector { output_enabled } => {
                *output_enabled = enabled;
                true
            }
            PinKind::Input | PinKind::Output => false,
        }
    }

    /// Contribution of this pin to its node after applying the kind's restrictions.
    pub fn effective_drive(&self) -> Drive {
        let released = if self.pullup {
            Drive::Level(SignalLevel::WeakHigh)
        } else {
            Drive::RELEASED
        };
        if !self.kind.output_enabled() {
            return released;
        }

        let out = match (self.kind, self.drive) {
            (PinKind::OpenCollector { .. }, Drive::Level(level))
                if level.is_low() || level == SignalLevel::Unknown =>
            {
                Drive::Level(level)
            }
            (PinKind::OpenCollector { .. }, _) => Drive::RELEASED,
            (_, drive) => drive,
        };
        if out == Drive::RELEASED { released } else { out }
    }

    /// Digital level contributed to the node, `None` for analog drives.
    pub fn contributed_level(&self) -> Option<SignalLevel> {
        self.effective_drive().level()
    }

    /// True if this pin forces its node into analog (RC) mode.
    pub fn is_analog_stimulus(&self) -> bool {
        self.capacitance > 0.0 || self.effective_drive().is_analog()
    }

    /// Thevenin source `(volts, ohms)` this pin presents, `None` when high impedance.
    pub fn thevenin(&self, vdd: f64) -> Option<(f64, f64)> {
        match self.effective_drive() {
            Drive::Analog { volts, impedance } => Some((volts, impedance)),
            Drive::Level(SignalLevel::DrivenHigh) => Some((vdd, self.drive_impedance)),
            Drive::Level(SignalLevel::DrivenLow) => Some((0.0, self.drive_impedance)),
            Drive::Level(SignalLevel::WeakHigh) => Some((vdd, self.pull_impedance)),
            Drive::Level(SignalLevel::WeakLow) => Some((0.0, self.pull_impedance)),
            Drive::Level(SignalLevel::Floating | SignalLevel::Unknown) => None,
        }
    }
}
