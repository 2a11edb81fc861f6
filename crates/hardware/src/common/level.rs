//! Signal levels and pin drives.
//!
//! This module defines the small value domain every digital pin speaks:
//! 1. **`SignalLevel`:** Drive strength plus polarity, or the absence of drive.
//! 2. **`Drive`:** What one side of a connection asserts, either a digital level
//!    or an analog source voltage behind a series impedance.

use std::fmt;

/// A resolved or asserted digital signal.
///
/// The ordering between variants is not numeric; node resolution is done by an
/// explicit table (see [`crate::soc::net::resolve_levels`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SignalLevel {
    /// Actively driven high through a low impedance.
    DrivenHigh,
    /// Actively driven low through a low impedance.
    DrivenLow,
    /// Pulled high through a resistor; loses to any strong drive.
    WeakHigh,
    /// Pulled low through a resistor; loses to any strong drive.
    WeakLow,
    /// Nothing drives the signal.
    #[default]
    Floating,
    /// Contended or otherwise indeterminate.
    Unknown,
}

impl SignalLevel {
    /// Maps a logic bit onto a strong drive.
    #[inline]
    pub const fn from_bit(bit: bool) -> Self {
        if bit { Self::DrivenHigh } else { Self::DrivenLow }
    }

    /// True for `DrivenHigh` and `WeakHigh`.
    #[inline]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::DrivenHigh | Self::WeakHigh)
    }

    /// True for `DrivenLow` and `WeakLow`.
    #[inline]
    pub const fn is_low(self) -> bool {
        matches!(self, Self::DrivenLow | Self::WeakLow)
    }

    /// True for the two strongly driven levels.
    #[inline]
    pub const fn is_strong(self) -> bool {
        matches!(self, Self::DrivenHigh | Self::DrivenLow)
    }

    /// True for the two pulled levels.
    #[inline]
    pub const fn is_weak(self) -> bool {
        matches!(self, Self::WeakHigh | Self::WeakLow)
    }

    /// The pulled level of the same polarity; other levels are unchanged.
    #[inline]
    pub const fn weakened(self) -> Self {
        match self {
            Self::DrivenHigh => Self::WeakHigh,
            Self::DrivenLow => Self::WeakLow,
            other => other,
        }
    }

    /// Returns the logic value, or `None` when floating or unknown.
    #[inline]
    pub const fn to_bit(self) -> Option<bool> {
        match self {
            Self::DrivenHigh | Self::WeakHigh => Some(true),
            Self::DrivenLow | Self::WeakLow => Some(false),
            Self::Floating | Self::Unknown => None,
        }
    }

    /// Voltage a node settles at when this level is the only contributor.
    ///
    /// Returns `None` for `Floating` and `Unknown`, which hold the previous
    /// voltage.
    #[inline]
    pub fn nominal_voltage(self, vdd: f64) -> Option<f64> {
        self.to_bit().map(|bit| if bit { vdd } else { 0.0 })
    }
}

impl fmt::Display for SignalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DrivenHigh => "1",
            Self::DrivenLow => "0",
            Self::WeakHigh => "H",
            Self::WeakLow => "L",
            Self::Floating => "Z",
            Self::Unknown => "X",
        };
        f.write_str(s)
    }
}

/// What a pin asserts onto its node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Drive {
    /// A digital level.
    Level(SignalLevel),
    /// An ideal voltage source behind a series resistance (Thevenin source).
    Analog {
        /// Source voltage in volts.
        volts: f64,
        /// Series resistance in ohms; must be positive.
        impedance: f64,
    },
}

impl Drive {
    /// Convenience constructor for a strong logic drive.
    #[inline]
    pub const fn bit(bit: bool) -> Self {
        Self::Level(SignalLevel::from_bit(bit))
    }

    /// A released (high impedance) drive.
    pub const RELEASED: Self = Self::Level(SignalLevel::Floating);

    /// Returns the digital level, or `None` for analog drives.
    #[inline]
    pub const fn level(self) -> Option<SignalLevel> {
        match self {
            Self::Level(level) => Some(level),
            Self::Analog { .. } => None,
        }
    }

    /// True for analog source drives.
    #[inline]
    pub const fn is_analog(self) -> bool {
        matches!(self, Self::Analog { .. })
    }
}

impl Default for Drive {
    fn default() -> Self {
        Self::RELEASED
    }
}

impl From<SignalLevel> for Drive {
    fn from(level: SignalLevel) -> Self {
        Self::Level(level)
    }
}
