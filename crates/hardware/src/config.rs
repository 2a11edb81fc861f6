//! Configuration system for the simulation kernel.
//!
//! This module defines all configuration structures used to parameterize
//! the simulator. It provides:
//! 1. **Defaults:** Baseline clock, electrical and peripheral constants.
//! 2. **Structures:** Hierarchical config for clock, electrical model, diagnostics and EEPROM.
//! 3. **Validation:** Semantic checks applied after deserialisation.
//!
//! Configuration is supplied as JSON by the embedding front-end, or use `Config::default()`.

use serde::Deserialize;

use crate::common::{Cycle, Result, SimError};

/// Default configuration constants for the simulator.
mod defaults {
    use crate::common::Cycle;

    /// Instruction cycles per simulated second (4 MHz oscillator, 4 clocks per cycle).
    pub const CYCLES_PER_SECOND: f64 = 1_000_000.0;

    /// Supply voltage in volts.
    pub const VDD: f64 = 5.0;

    /// Low-to-high input threshold as a fraction of Vdd.
    pub const HIGH_THRESHOLD: f64 = 0.7;

    /// High-to-low input threshold as a fraction of Vdd.
    pub const LOW_THRESHOLD: f64 = 0.3;

    /// Output driver impedance in ohms.
    pub const DRIVE_IMPEDANCE: f64 = 250.0;

    /// Pull-up / pull-down resistor in ohms.
    pub const PULLUP_IMPEDANCE: f64 = 20_000.0;

    /// Absolute voltage error at which a settling node snaps to its target.
    pub const SETTLE_TOLERANCE: f64 = 0.01;

    /// Largest share of Vdd a single settle step may close.
    pub const SETTLE_STEP_FRACTION: f64 = 0.1;

    /// Depth of the anomaly history.
    pub const ANOMALY_HISTORY: usize = crate::common::constants::DEFAULT_ANOMALY_HISTORY;

    /// EEPROM size in bytes (24C02).
    pub const EEPROM_SIZE: usize = 256;

    /// EEPROM page size in bytes.
    pub const EEPROM_PAGE_SIZE: usize = 8;

    /// EEPROM word-address bytes.
    pub const EEPROM_ADDRESS_BYTES: u8 = 1;

    /// EEPROM internal write cycle (5 ms at the default clock).
    pub const EEPROM_WRITE_CYCLE: Cycle = 5_000;
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// ```
/// use mcusim_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.electrical.vdd, 5.0);
/// assert_eq!(config.eeprom.size, 256);
/// ```
///
/// Deserializing from JSON, with missing fields taking their defaults:
///
/// ```
/// use mcusim_core::config::Config;
///
/// let json = r#"{
///     "clock": { "cycles_per_second": 5000000.0 },
///     "electrical": { "vdd": 3.3, "pullup_impedance": 4700.0 },
///     "eeprom": { "size": 2048, "page_size": 16 }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.electrical.vdd, 3.3);
/// assert_eq!(config.electrical.drive_impedance, 250.0);
/// assert_eq!(config.eeprom.address_bytes, 1);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Simulation clock settings
    #[serde(default)]
    pub clock: ClockConfig,
    /// Electrical model parameters
    #[serde(default)]
    pub electrical: ElectricalConfig,
    /// Anomaly reporting settings
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    /// Serial EEPROM peripheral parameters
    #[serde(default)]
    pub eeprom: EepromConfig,
}

impl Config {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ConfigParse`] for malformed JSON and
    /// [`SimError::InvalidConfig`] when a value fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let e = &self.electrical;
        if !(self.clock.cycles_per_second > 0.0) {
            return Err(invalid("clock.cycles_per_second must be positive"));
        }
        if !(e.vdd > 0.0) {
            return Err(invalid("electrical.vdd must be positive"));
        }
        if !(0.0 < e.low_threshold && e.low_threshold <= e.high_threshold && e.high_threshold < 1.0)
        {
            return Err(invalid(
                "electrical thresholds must satisfy 0 < low_threshold <= high_threshold < 1",
            ));
        }
        if !(e.drive_impedance > 0.0 && e.pullup_impedance > 0.0) {
            return Err(invalid("electrical impedances must be positive"));
        }
        if !(e.settle_tolerance > 0.0) {
            return Err(invalid("electrical.settle_tolerance must be positive"));
        }
        if !(e.settle_step_fraction > 0.0 && e.settle_step_fraction <= 1.0) {
            return Err(invalid("electrical.settle_step_fraction must be in (0, 1]"));
        }
        if e.node_capacitance < 0.0 {
            return Err(invalid("electrical.node_capacitance must not be negative"));
        }
        self.eeprom.validate()
    }
}

fn invalid(msg: &str) -> SimError {
    SimError::InvalidConfig(msg.to_owned())
}

/// Simulation clock settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ClockConfig {
    /// Cycles per simulated second; converts RC time constants into cycles.
    #[serde(default = "ClockConfig::default_cycles_per_second")]
    pub cycles_per_second: f64,
}

impl ClockConfig {
    /// Returns the default cycle rate.
    fn default_cycles_per_second() -> f64 {
        defaults::CYCLES_PER_SECOND
    }

    /// Converts a duration in seconds into (fractional) cycles.
    #[inline]
    pub fn seconds_to_cycles(&self, seconds: f64) -> f64 {
        seconds * self.cycles_per_second
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            cycles_per_second: defaults::CYCLES_PER_SECOND,
        }
    }
}

/// Electrical model parameters shared by every pin and node.
#[derive(Debug, Clone, Deserialize)]
pub struct ElectricalConfig {
    /// Supply voltage (V)
    #[serde(default = "ElectricalConfig::default_vdd")]
    pub vdd: f64,

    /// Voltage at or above which a node reads high, as a fraction of Vdd
    #[serde(default = "ElectricalConfig::default_high_threshold")]
    pub high_threshold: f64,

    /// Voltage at or below which a node reads low, as a fraction of Vdd
    #[serde(default = "ElectricalConfig::default_low_threshold")]
    pub low_threshold: f64,

    /// Default output driver impedance for new pins (ohms)
    #[serde(default = "ElectricalConfig::default_drive_impedance")]
    pub drive_impedance: f64,

    /// Default pull resistor for new pins (ohms)
    #[serde(default = "ElectricalConfig::default_pullup_impedance")]
    pub pullup_impedance: f64,

    /// Settled when within this many volts of the Thevenin target
    #[serde(default = "ElectricalConfig::default_settle_tolerance")]
    pub settle_tolerance: f64,

    /// Largest share of Vdd one settle step may close
    #[serde(default = "ElectricalConfig::default_settle_step_fraction")]
    pub settle_step_fraction: f64,

    /// Wiring capacitance added to every node (farads)
    #[serde(default)]
    pub node_capacitance: f64,
}

impl ElectricalConfig {
    /// Returns the default supply voltage.
    fn default_vdd() -> f64 {
        defaults::VDD
    }

    /// Returns the default high input threshold.
    fn default_high_threshold() -> f64 {
        defaults::HIGH_THRESHOLD
    }

    /// Returns the default low input threshold.
    fn default_low_threshold() -> f64 {
        defaults::LOW_THRESHOLD
    }

    /// Returns the default driver impedance.
    fn default_drive_impedance() -> f64 {
        defaults::DRIVE_IMPEDANCE
    }

    /// Returns the default pull resistor value.
    fn default_pullup_impedance() -> f64 {
        defaults::PULLUP_IMPEDANCE
    }

    /// Returns the default settle tolerance.
    fn default_settle_tolerance() -> f64 {
        defaults::SETTLE_TOLERANCE
    }

    /// Returns the default settle step fraction.
    fn default_settle_step_fraction() -> f64 {
        defaults::SETTLE_STEP_FRACTION
    }

    /// Input-high threshold in volts.
    #[inline]
    pub fn vih(&self) -> f64 {
        self.high_threshold * self.vdd
    }

    /// Input-low threshold in volts.
    #[inline]
    pub fn vil(&self) -> f64 {
        self.low_threshold * self.vdd
    }
}

impl Default for ElectricalConfig {
    fn default() -> Self {
        Self {
            vdd: defaults::VDD,
            high_threshold: defaults::HIGH_THRESHOLD,
            low_threshold: defaults::LOW_THRESHOLD,
            drive_impedance: defaults::DRIVE_IMPEDANCE,
            pullup_impedance: defaults::PULLUP_IMPEDANCE,
            settle_tolerance: defaults::SETTLE_TOLERANCE,
            settle_step_fraction: defaults::SETTLE_STEP_FRACTION,
            node_capacitance: 0.0,
        }
    }
}

/// Anomaly reporting settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticsConfig {
    /// Number of recent anomalies retained for inspection
    #[serde(default = "DiagnosticsConfig::default_anomaly_history")]
    pub anomaly_history: usize,
}

impl DiagnosticsConfig {
    /// Returns the default anomaly history depth.
    fn default_anomaly_history() -> usize {
        defaults::ANOMALY_HISTORY
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            anomaly_history: defaults::ANOMALY_HISTORY,
        }
    }
}

/// Serial EEPROM geometry and timing.
#[derive(Debug, Clone, Deserialize)]
pub struct EepromConfig {
    /// Capacity in bytes (power of two)
    #[serde(default = "EepromConfig::default_size")]
    pub size: usize,

    /// Page write buffer size in bytes (power of two, at most `size`)
    #[serde(default = "EepromConfig::default_page_size")]
    pub page_size: usize,

    /// Word-address bytes sent after the device address (1 or 2)
    #[serde(default = "EepromConfig::default_address_bytes")]
    pub address_bytes: u8,

    /// Internal write cycle duration in cycles
    #[serde(default = "EepromConfig::default_write_cycle")]
    pub write_cycle: Cycle,
}

impl EepromConfig {
    /// Returns the default capacity.
    fn default_size() -> usize {
        defaults::EEPROM_SIZE
    }

    /// Returns the default page size.
    fn default_page_size() -> usize {
        defaults::EEPROM_PAGE_SIZE
    }

    /// Returns the default word-address byte count.
    fn default_address_bytes() -> u8 {
        defaults::EEPROM_ADDRESS_BYTES
    }

    /// Returns the default write cycle.
    fn default_write_cycle() -> Cycle {
        defaults::EEPROM_WRITE_CYCLE
    }

    /// Checks the geometry.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] for a non power-of-two size or page,
    /// a page larger than the array, an address byte count other than 1 or 2,
    /// or a one-byte part too large to address with the three block bits.
    pub fn validate(&self) -> Result<()> {
        if !self.size.is_power_of_two() || !self.page_size.is_power_of_two() {
            return Err(invalid("eeprom size and page_size must be powers of two"));
        }
        if self.page_size > self.size {
            return Err(invalid("eeprom.page_size must not exceed eeprom.size"));
        }
        match self.address_bytes {
            1 if self.size > 2048 => Err(invalid(
                "eeprom larger than 2048 bytes needs two address bytes",
            )),
            2 if self.size > 65536 => Err(invalid("eeprom larger than 65536 bytes")),
            1 | 2 => Ok(()),
            _ => Err(invalid("eeprom.address_bytes must be 1 or 2")),
        }
    }
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self {
            size: defaults::EEPROM_SIZE,
            page_size: defaults::EEPROM_PAGE_SIZE,
            address_bytes: defaults::EEPROM_ADDRESS_BYTES,
            write_cycle: defaults::EEPROM_WRITE_CYCLE,
        }
    }
}
