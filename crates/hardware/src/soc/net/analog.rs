//! Analog settling of a node.
//!
//! This module implements the RC model used when a node carries an analog stimulus:
//! 1. **Thevenin Combination:** Parallel sources reduce to one voltage behind one resistance.
//! 2. **Settling:** The node voltage follows `V(t) = Vth + (V0 - Vth) * exp(-t / tau)`
//!    with `tau = Zth * Cth` expressed in cycles.
//! 3. **Step Schedule:** Callbacks are spaced so each one closes a bounded share of
//!    the remaining gap, short while the gap is large and exponentially longer as
//!    the voltage converges, ending once the gap is within tolerance.
//! 4. **Thresholds:** Voltages map back to levels with hysteresis.

use crate::common::{Cycle, SignalLevel};
use crate::config::Config;

use super::node::Node;

/// Electrical parameters needed by the settle model, derived from [`Config`].
#[derive(Clone, Copy, Debug)]
pub struct AnalogParams {
    /// Supply voltage.
    pub vdd: f64,
    /// Input-high threshold (V).
    pub vih: f64,
    /// Input-low threshold (V).
    pub vil: f64,
    /// Snap-to-target tolerance (V).
    pub tolerance: f64,
    /// Largest share of Vdd closed per step.
    pub step_fraction: f64,
    /// Cycles per simulated second.
    pub cycles_per_second: f64,
}

impl AnalogParams {
    /// Extracts the analog parameters from a configuration.
    pub fn from_config(config: &Config) -> Self {
        let e = &config.electrical;
        Self {
            vdd: e.vdd,
            vih: e.vih(),
            vil: e.vil(),
            tolerance: e.settle_tolerance,
            step_fraction: e.settle_step_fraction,
            cycles_per_second: config.clock.cycles_per_second,
        }
    }
}

/// Thevenin equivalent of everything attached to a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thevenin {
    /// Open-circuit voltage; meaningless when `ohms` is infinite.
    pub volts: f64,
    /// Source resistance; infinite when nothing drives.
    pub ohms: f64,
    /// Total capacitance to ground.
    pub farads: f64,
}

impl Thevenin {
    /// Combines parallel `(volts, ohms)` sources and a total capacitance.
    pub fn combine<I>(sources: I, farads: f64) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut conductance = 0.0;
        let mut current = 0.0;
        for (volts, ohms) in sources {
            let g = 1.0 / ohms.max(f64::MIN_POSITIVE);
            conductance += g;
            current += volts * g;
        }
        if conductance > 0.0 {
            Self {
                volts: current / conductance,
                ohms: 1.0 / conductance,
                farads,
            }
        } else {
            Self {
                volts: 0.0,
                ohms: f64::INFINITY,
                farads,
            }
        }
    }

    /// True when at least one source drives the node.
    pub fn is_driven(&self) -> bool {
        self.ohms.is_finite()
    }
}

/// Maps a voltage onto a level; between the thresholds the previous logic value is kept.
pub fn level_for_voltage(volts: f64, previous: SignalLevel, vih: f64, vil: f64) -> SignalLevel {
    if volts >= vih {
        SignalLevel::DrivenHigh
    } else if volts <= vil {
        SignalLevel::DrivenLow
    } else {
        match previous.to_bit() {
            Some(bit) => SignalLevel::from_bit(bit),
            None => SignalLevel::Unknown,
        }
    }
}

impl Node {
    /// Node voltage at cycle `now`, extrapolating an in-progress settle.
    pub fn voltage_at(&self, now: Cycle) -> f64 {
        if !self.settling || self.tau_cycles <= 0.0 {
            return self.voltage;
        }
        let elapsed = now.saturating_sub(self.since) as f64;
        let decay = (-elapsed / self.tau_cycles).exp();
        self.target + (self.voltage - self.target) * decay
    }

    /// Applies a new Thevenin equivalent at cycle `now`.
    ///
    /// Returns the cycle of the next settle callback, or `None` when the node
    /// settled immediately.
    pub(crate) fn retarget(
        &mut self,
        th: Thevenin,
        now: Cycle,
        params: &AnalogParams,
    ) -> Option<Cycle> {
        let v = self.voltage_at(now);
        self.voltage = v;
        self.since = now;
        self.zth = th.ohms;
        self.cth = th.farads;
        // Undriven nodes hold their charge.
        self.target = if th.is_driven() { th.volts } else { v };
        self.tau_cycles = if th.is_driven() {
            params.cycles_per_second * th.ohms * th.farads
        } else {
            f64::INFINITY
        };

        if (self.target - v).abs() <= params.tolerance || self.tau_cycles < 1.0 {
            self.snap();
            return None;
        }
        self.settling = true;
        Some(now.saturating_add(self.next_step(params)))
    }

    /// Advances an in-progress settle to `now`.
    ///
    /// Returns the cycle of the next callback, or `None` once within tolerance.
    pub(crate) fn settle_step(&mut self, now: Cycle, params: &AnalogParams) -> Option<Cycle> {
        if !self.settling {
            return None;
        }
        let v = self.voltage_at(now);
        self.voltage = v;
        self.since = now;
        if (self.target - v).abs() <= params.tolerance {
            self.snap();
            return None;
        }
        Some(now.saturating_add(self.next_step(params)))
    }

    /// Level of an analog node at its current voltage.
    ///
    /// A node held only by pull resistors reports the weak level, so a strong
    /// driver elsewhere on the bus still wins.
    pub(crate) fn analog_level(&self, params: &AnalogParams) -> SignalLevel {
        let level = level_for_voltage(self.voltage, self.level, params.vih, params.vil);
        if self.pulled_only {
            level.weakened()
        } else {
            level
        }
    }

    /// Ends a settle at the target voltage.
    fn snap(&mut self) {
        self.voltage = self.target;
        self.settling = false;
        self.settle_at = None;
    }

    /// Cycles until the next settle callback.
    fn next_step(&self, params: &AnalogParams) -> Cycle {
        let gap = (self.target - self.voltage).abs();
        let chunk = params.step_fraction * params.vdd;
        let tau = self.tau_cycles;

        let t = if gap > chunk + params.tolerance {
            // time for the gap to shrink by one chunk
            tau * (gap / (gap - chunk)).ln()
        } else {
            // time for the gap to reach the tolerance
            tau * (gap / params.tolerance).ln()
        };

        if t.is_finite() {
            (t.ceil() as Cycle).clamp(1, Cycle::MAX / 2)
        } else {
            1
        }
    }
}
