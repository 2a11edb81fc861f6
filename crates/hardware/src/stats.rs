//! Simulation statistics and electrical diagnostics.
//!
//! This module is the warning channel for non-fatal conditions. It provides:
//! 1. **Counters:** Callbacks fired, settle steps, bytes moved over the two-wire bus.
//! 2. **Anomalies:** Bus contention, floating reads, unmatched addresses and
//!    ignored bus activity, each counted and kept in a bounded history.
//! 3. **Reporting:** A human readable summary via [`SimStats::print`].
//!
//! Every anomaly is also emitted as a `tracing` warning or debug event at the
//! point it is recorded.

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use tracing::{debug, warn};

use crate::common::{Cycle, EngineId, NodeId, PortId};

/// A non-fatal electrical or protocol condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Anomaly {
    /// Strong high and strong low drivers on the same node.
    Contention {
        /// Node being fought over.
        node: NodeId,
    },
    /// A port register bit was read while its pin was floating or unknown.
    FloatingRead {
        /// Register read.
        port: PortId,
        /// Bit position.
        bit: u32,
    },
    /// An address byte on the two-wire bus did not select the engine.
    UnmatchedAddress {
        /// Engine that declined.
        engine: EngineId,
        /// Address byte as clocked in, direction bit included.
        byte: u8,
    },
    /// Bus activity arrived while the engine was not transferring.
    IgnoredBusActivity {
        /// Engine that ignored it.
        engine: EngineId,
    },
    /// The clock rose again before a falling-edge action could drive the data line.
    ClockTooFast {
        /// Engine that skipped the drive.
        engine: EngineId,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contention { node } => write!(f, "bus contention on {node}"),
            Self::FloatingRead { port, bit } => write!(f, "floating read of {port} bit {bit}"),
            Self::UnmatchedAddress { engine, byte } => {
                write!(f, "{engine}: address byte {byte:#04x} not matched")
            }
            Self::IgnoredBusActivity { engine } => write!(f, "{engine}: ignored bus activity"),
            Self::ClockTooFast { engine } => {
                write!(f, "{engine}: clock rose before data could be driven")
            }
        }
    }
}

/// Simulation statistics structure tracking callbacks, bus traffic and anomalies.
#[derive(Clone, Debug)]
pub struct SimStats {
    start_time: Instant,
    /// Scheduled callbacks dispatched.
    pub callbacks_fired: u64,
    /// Analog settle callbacks processed.
    pub settle_steps: u64,
    /// Node resolutions that found strong drivers of both polarities.
    pub contentions: u64,
    /// Port reads that sampled a floating or unknown pin.
    pub floating_reads: u64,
    /// Address bytes that did not match a slave.
    pub unmatched_addresses: u64,
    /// Edges or bytes ignored because no transfer was in progress.
    pub ignored_bus_activity: u64,
    /// Falling-edge actions skipped because the clock was already high again.
    pub clock_overruns: u64,
    /// Data bytes delivered to two-wire peripherals.
    pub bytes_received: u64,
    /// Data bytes shifted out by two-wire peripherals.
    pub bytes_sent: u64,
    /// NACKs driven by slaves or received from masters.
    pub nacks: u64,

    history: VecDeque<(Cycle, Anomaly)>,
    history_depth: usize,
}

impl Default for SimStats {
    fn default() -> Self {
        Self::new(crate::common::constants::DEFAULT_ANOMALY_HISTORY)
    }
}

impl SimStats {
    /// Creates empty statistics retaining up to `history_depth` anomalies.
    pub fn new(history_depth: usize) -> Self {
        Self {
            start_time: Instant::now(),
            callbacks_fired: 0,
            settle_steps: 0,
            contentions: 0,
            floating_reads: 0,
            unmatched_addresses: 0,
            ignored_bus_activity: 0,
            clock_overruns: 0,
            bytes_received: 0,
            bytes_sent: 0,
            nacks: 0,
            history: VecDeque::with_capacity(history_depth),
            history_depth,
        }
    }

    /// Records an anomaly: bumps its counter, logs it and appends it to the history.
    pub fn record(&mut self, cycle: Cycle, anomaly: Anomaly) {
        match &anomaly {
            Anomaly::Contention { .. } => {
                self.contentions += 1;
                warn!(cycle, "{anomaly}");
            }
            Anomaly::FloatingRead { .. } => {
                self.floating_reads += 1;
                warn!(cycle, "{anomaly}");
            }
            Anomaly::UnmatchedAddress { .. } => {
                self.unmatched_addresses += 1;
                debug!(cycle, "{anomaly}");
            }
            Anomaly::IgnoredBusActivity { .. } => {
                self.ignored_bus_activity += 1;
                debug!(cycle, "{anomaly}");
            }
            Anomaly::ClockTooFast { .. } => {
                self.clock_overruns += 1;
                warn!(cycle, "{anomaly}");
            }
        }

        if self.history_depth == 0 {
            return;
        }
        if self.history.len() == self.history_depth {
            let _ = self.history.pop_front();
        }
        self.history.push_back((cycle, anomaly));
    }

    /// Recent anomalies, oldest first, each stamped with the cycle it occurred.
    pub fn anomalies(&self) -> impl Iterator<Item = &(Cycle, Anomaly)> {
        self.history.iter()
    }

    /// Drops the anomaly history and zeroes every counter.
    pub fn clear(&mut self) {
        *self = Self::new(self.history_depth);
    }

    /// Prints a summary of the statistics to stdout.
    pub fn print(&self, now: Cycle) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            now as f64 / elapsed / 1e6
        } else {
            0.0
        };

        println!("\n==========================================================");
        println!("SIMULATION STATISTICS");
        println!("==========================================================");
        println!("host_seconds             {elapsed:.4} s");
        println!("sim_cycles               {now}");
        println!("sim_rate                 {rate:.2} Mcycles/s");
        println!("callbacks_fired          {}", self.callbacks_fired);
        println!("settle_steps             {}", self.settle_steps);
        println!("----------------------------------------------------------");
        println!("BUS TRAFFIC");
        println!("  bytes_received         {}", self.bytes_received);
        println!("  bytes_sent             {}", self.bytes_sent);
        println!("  nacks                  {}", self.nacks);
        println!("----------------------------------------------------------");
        println!("ANOMALIES");
        println!("  contentions            {}", self.contentions);
        println!("  floating_reads         {}", self.floating_reads);
        println!("  unmatched_addresses    {}", self.unmatched_addresses);
        println!("  ignored_bus_activity   {}", self.ignored_bus_activity);
        println!("  clock_overruns         {}", self.clock_overruns);
        for (cycle, anomaly) in &self.history {
            println!("  @{cycle:<12} {anomaly}");
        }
        println!("==========================================================");
    }
}
