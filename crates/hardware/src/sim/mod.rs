//! Simulation control: the cycle scheduler and the simulator context.
//!
//! This module provides:
//! 1. **Scheduler:** The generic cycle clock with one pending callback per owner.
//! 2. **Tasks:** The owner keys used by the kernel's own components.
//! 3. **Simulator:** The context object that owns every component and routes
//!    fired callbacks and pin changes between them.

/// Cycle clock and callback queue.
pub mod scheduler;

/// Top-level simulator context.
pub mod simulator;

pub use scheduler::Scheduler;
pub use simulator::Simulator;

use crate::common::{EngineId, NodeId};

/// Callback owners known to the simulator.
///
/// Each variant names one schedulable activity of one component, so a
/// component with several independent timers uses several variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {
    /// Analog settle step of a node.
    Settle(NodeId),
    /// Deferred handling of a clock edge seen by a two-wire engine.
    TwoWireEdge(EngineId),
    /// End of a two-wire peripheral's internal write cycle.
    TwoWireWrite(EngineId),
}
