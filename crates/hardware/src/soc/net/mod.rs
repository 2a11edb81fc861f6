//! Pin/node signal network.
//!
//! The netlist owns every pin and node in index-addressed arenas. It provides:
//! 1. **Wiring:** Attaching pins to nodes (one node per pin) and detaching them.
//! 2. **Resolution:** Recomputing a node whenever an attached pin's contribution
//!    changes, digitally by table or with the RC model when analog.
//! 3. **Change Queue:** Every pin whose resolved level changes is queued as a
//!    [`PinChange`]; the simulator drains the queue to notify registers and
//!    protocol engines.
//!
//! Operations that can change node state take the scheduler (for analog settle
//! callbacks) and the statistics sink (for anomalies) explicitly.

/// Analog settle model.
pub mod analog;

/// Node state and digital resolution table.
pub mod node;

/// Pin state and capability kinds.
pub mod pin;

use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace};

use crate::common::{Cycle, Drive, NodeId, PinId, Result, SignalLevel, SimError};
use crate::config::Config;
use crate::sim::{Scheduler, Task};
use crate::stats::{Anomaly, SimStats};

pub use analog::{AnalogParams, Thevenin, level_for_voltage};
pub use node::{Node, Resolution, resolve_levels};
pub use pin::{Pin, PinConfig, PinKind};

/// A pin whose resolved level changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinChange {
    /// Pin that changed.
    pub pin: PinId,
    /// Level before the change.
    pub previous: SignalLevel,
    /// Level after the change.
    pub level: SignalLevel,
}

/// Arena of pins and nodes.
#[derive(Debug)]
pub struct Netlist {
    pins: Vec<Option<Pin>>,
    nodes: Vec<Option<Node>>,
    pin_names: HashMap<String, PinId>,
    node_names: HashMap<String, NodeId>,
    params: AnalogParams,
    drive_impedance: f64,
    pull_impedance: f64,
    node_capacitance: f64,
    changes: VecDeque<PinChange>,
}

impl Netlist {
    /// Creates an empty netlist using the electrical parameters of `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            pins: Vec::new(),
            nodes: Vec::new(),
            pin_names: HashMap::new(),
            node_names: HashMap::new(),
            params: AnalogParams::from_config(config),
            drive_impedance: config.electrical.drive_impedance,
            pull_impedance: config.electrical.pullup_impedance,
            node_capacitance: config.electrical.node_capacitance,
            changes: VecDeque::new(),
        }
    }

    /// Analog parameters in effect.
    pub const fn params(&self) -> &AnalogParams {
        &self.params
    }

    /// Creates an unattached pin. Its driven state reflects its own drive.
    pub fn add_pin(&mut self, config: PinConfig) -> PinId {
        let id = PinId::from_index(self.pins.len());
        let pin = Pin::new(config, self.drive_impedance, self.pull_impedance);
        let _ = self.pin_names.insert(pin.name.clone(), id);
        self.pins.push(Some(pin));
        self.refresh_standalone(id);
        // A freshly created pin has no observers yet.
        self.changes.retain(|c| c.pin != id);
        id
    }

    /// Creates an empty node.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        let node = Node::new(name.into(), self.node_capacitance);
        let _ = self.node_names.insert(node.name.clone(), id);
        self.nodes.push(Some(node));
        id
    }

    /// Looks up a pin.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale or foreign handle.
    pub fn pin(&self, id: PinId) -> Result<&Pin> {
        self.pins
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(SimError::UnknownPin(id))
    }

    /// Looks up a node.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] for a stale or foreign handle.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(SimError::UnknownNode(id))
    }

    fn pin_mut(&mut self, id: PinId) -> Result<&mut Pin> {
        self.pins
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(SimError::UnknownPin(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(SimError::UnknownNode(id))
    }

    /// Finds a live pin by name.
    pub fn pin_by_name(&self, name: &str) -> Option<PinId> {
        self.pin_names
            .get(name)
            .copied()
            .filter(|&id| self.pin(id).is_ok())
    }

    /// Finds a live node by name.
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.node_names
            .get(name)
            .copied()
            .filter(|&id| self.node(id).is_ok())
    }

    /// Resolved level seen by a pin.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale handle.
    pub fn driven_state(&self, id: PinId) -> Result<SignalLevel> {
        self.pin(id).map(Pin::driven_state)
    }

    /// Resolved level of a node.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] for a stale handle.
    pub fn node_level(&self, id: NodeId) -> Result<SignalLevel> {
        self.node(id).map(Node::level)
    }

    /// Node voltage at cycle `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] for a stale handle.
    pub fn node_voltage(&self, id: NodeId, now: Cycle) -> Result<f64> {
        self.node(id).map(|n| n.voltage_at(now))
    }

    /// Pins attached to a node, in attach order.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] for a stale handle.
    pub fn pins_of(&self, id: NodeId) -> Result<&[PinId]> {
        self.node(id).map(Node::pins)
    }

    /// Takes the oldest queued pin change.
    pub fn pop_change(&mut self) -> Option<PinChange> {
        self.changes.pop_front()
    }

    /// True when pin changes are waiting to be delivered.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Attaches `pin` to `node`, detaching it from any previous node first.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] or [`SimError::UnknownPin`] for stale handles,
    /// and propagates scheduling errors from the node update.
    pub fn attach(
        &mut self,
        node: NodeId,
        pin: PinId,
        sched: &mut Scheduler<Task>,
        stats: &mut SimStats,
    ) -> Result<()> {
        let _ = self.node(node)?;
        match self.pin(pin)?.node {
            Some(current) if current == node => return Ok(()),
            Some(current) => {
                debug!(%pin, from = %current, to = %node, "re-attaching pin");
                let _ = self.detach(pin, sched, stats)?;
            }
            None => {}
        }

        self.node_mut(node)?.pins.push(pin);
        self.pin_mut(pin)?.node = Some(node);
        trace!(%pin, %node, "attached");
        self.update_node(node, sched, stats)
    }

    /// Detaches `pin` from its node. Returns whether it was attached.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale handle.
    pub fn detach(
        &mut self,
        pin: PinId,
        sched: &mut Scheduler<Task>,
        stats: &mut SimStats,
    ) -> Result<bool> {
        let Some(node) = self.pin_mut(pin)?.node.take() else {
            return Ok(false);
        };
        self.node_mut(node)?.pins.retain(|&p| p != pin);
        trace!(%pin, %node, "detached");
        self.refresh_standalone(pin);
        self.update_node(node, sched, stats)?;
        Ok(true)
    }

    /// Detaches and destroys a pin. Its handle becomes stale.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale handle.
    pub fn remove_pin(
        &mut self,
        pin: PinId,
        sched: &mut Scheduler<Task>,
        stats: &mut SimStats,
    ) -> Result<()> {
        let _ = self.detach(pin, sched, stats)?;
        if let Some(slot) = self.pins.get_mut(pin.index()) {
            if let Some(removed) = slot.take() {
                let _ = self.pin_names.remove(&removed.name);
            }
        }
        self.changes.retain(|c| c.pin != pin);
        Ok(())
    }

    /// Detaches every pin of a node, cancels its settle callback and destroys it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] for a stale handle.
    pub fn remove_node(
        &mut self,
        node: NodeId,
        sched: &mut Scheduler<Task>,
        stats: &mut SimStats,
    ) -> Result<()> {
        let pins = self.node(node)?.pins.clone();
        for pin in pins {
            let _ = self.detach(pin, sched, stats)?;
        }
        let _ = sched.cancel(Task::Settle(node));
        if let Some(slot) = self.nodes.get_mut(node.index()) {
            if let Some(removed) = slot.take() {
                let _ = self.node_names.remove(&removed.name);
            }
        }
        Ok(())
    }

    /// Sets what a pin asserts and re-resolves its node.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale handle.
    pub fn set_driving(
        &mut self,
        pin: PinId,
        drive: Drive,
        sched: &mut Scheduler<Task>,
        stats: &mut SimStats,
    ) -> Result<()> {
        let p = self.pin_mut(pin)?;
        if p.drive == drive {
            return Ok(());
        }
        p.drive = drive;
        self.refresh(pin, sched, stats)
    }

    /// Enables or disables a pin's pull-up and re-resolves its node.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale handle.
    pub fn set_pullup(
        &mut self,
        pin: PinId,
        enabled: bool,
        sched: &mut Scheduler<Task>,
        stats: &mut SimStats,
    ) -> Result<()> {
        let p = self.pin_mut(pin)?;
        if p.pullup == enabled {
            return Ok(());
        }
        p.pullup = enabled;
        self.refresh(pin, sched, stats)
    }

    /// Switches a bi-directional or open-collector pin between input and output.
    ///
    /// Returns `false` (and changes nothing) for fixed-direction kinds.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale handle.
    pub fn set_output_enabled(
        &mut self,
        pin: PinId,
        enabled: bool,
        sched: &mut Scheduler<Task>,
        stats: &mut SimStats,
    ) -> Result<bool> {
        let p = self.pin_mut(pin)?;
        if p.kind.output_enabled() == enabled {
            return Ok(matches!(
                p.kind,
                PinKind::BiDirectional { .. } | PinKind::OpenCollector { .. }
            ));
        }
        if !p.set_output_enabled(enabled) {
            return Ok(false);
        }
        self.refresh(pin, sched, stats)?;
        Ok(true)
    }

    /// Re-resolves whatever the pin contributes to.
    fn refresh(
        &mut self,
        pin: PinId,
        sched: &mut Scheduler<Task>,
        stats: &mut SimStats,
    ) -> Result<()> {
        match self.pin(pin)?.node {
            Some(node) => self.update_node(node, sched, stats),
            None => {
                self.refresh_standalone(pin);
                Ok(())
            }
        }
    }

    /// Resolves an unattached pin from its own drive.
    fn refresh_standalone(&mut self, pin: PinId) {
        let params = self.params;
        let Ok(p) = self.pin(pin) else { return };
        let (level, volts) = match p.effective_drive() {
            Drive::Level(level) => {
                let volts = level.nominal_voltage(params.vdd).unwrap_or(p.voltage);
                (level, volts)
            }
            Drive::Analog { volts, .. } => (
                level_for_voltage(volts, p.driven, params.vih, params.vil),
                volts,
            ),
        };
        self.set_driven(pin, level, volts);
    }

    /// Stores a pin's resolved state, queueing a change if the level moved.
    fn set_driven(&mut self, pin: PinId, level: SignalLevel, volts: f64) {
        let Ok(p) = self.pin_mut(pin) else { return };
        p.voltage = volts;
        if p.driven == level {
            return;
        }
        let previous = p.driven;
        p.driven = level;
        trace!(%pin, %previous, %level, "pin driven state changed");
        self.changes.push_back(PinChange {
            pin,
            previous,
            level,
        });
    }

    /// Recomputes a node from its attached pins and pushes the result to them.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] for a stale handle, or a scheduling error
    /// from an analog settle request.
    pub fn update_node(
        &mut self,
        id: NodeId,
        sched: &mut Scheduler<Task>,
        stats: &mut SimStats,
    ) -> Result<()> {
        let now = sched.now();
        let params = self.params;

        let node = self.node(id)?;
        let mut analog = node.capacitance > 0.0;
        let mut farads = node.capacitance;
        let mut levels = Vec::with_capacity(node.pins.len());
        let mut sources = Vec::with_capacity(node.pins.len());
        let mut strong_source = false;
        for &pid in &node.pins {
            let p = self.pin(pid)?;
            analog |= p.is_analog_stimulus();
            farads += p.capacitance;
            let level = p.contributed_level();
            if let Some(source) = p.thevenin(params.vdd) {
                sources.push(source);
                strong_source |= !level.is_some_and(SignalLevel::is_weak);
            }
            if let Some(level) = level {
                levels.push(level);
            }
        }
        let resolution = resolve_levels(levels);

        let node = self.node_mut(id)?;
        if resolution.contention && !node.contention {
            stats.record(now, Anomaly::Contention { node: id });
        }
        if resolution.weak_conflict {
            debug!(node = %id, "weak pull-up and pull-down on the same node");
        }
        node.contention = resolution.contention;

        if analog {
            node.analog = true;
            node.pulled_only = !sources.is_empty() && !strong_source;
            let th = Thevenin::combine(sources, farads);
            match node.retarget(th, now, &params) {
                Some(at) => {
                    node.settle_at = Some(at);
                    sched.schedule(Task::Settle(id), at)?;
                }
                None => {
                    let _ = sched.cancel(Task::Settle(id));
                }
            }
            node.level = node.analog_level(&params);
        } else {
            if node.settling || node.analog {
                node.settling = false;
                node.settle_at = None;
                let _ = sched.cancel(Task::Settle(id));
            }
            node.analog = false;
            node.pulled_only = false;
            let voltage = node.voltage_at(now);
            node.voltage = resolution.level.nominal_voltage(params.vdd).unwrap_or(voltage);
            node.since = now;
            node.target = node.voltage;
            node.level = resolution.level;
        }

        self.push_to_pins(id)
    }

    /// Live node handles in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId::from_index(i))
    }

    /// Stops every settle at the voltage reached by cycle `now` and rebases
    /// node time to cycle 0. Used when the clock is reset.
    pub fn freeze(&mut self, now: Cycle) {
        for node in self.nodes.iter_mut().flatten() {
            node.voltage = node.voltage_at(now);
            node.target = node.voltage;
            node.since = 0;
            node.settling = false;
            node.settle_at = None;
        }
    }

    /// Re-resolves every node.
    ///
    /// # Errors
    ///
    /// Propagates scheduling errors from analog settle requests.
    pub fn refresh_all(
        &mut self,
        sched: &mut Scheduler<Task>,
        stats: &mut SimStats,
    ) -> Result<()> {
        let ids: Vec<NodeId> = self.node_ids().collect();
        for id in ids {
            self.update_node(id, sched, stats)?;
        }
        Ok(())
    }

    /// Runs one analog settle callback for a node.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] for a stale handle.
    pub fn settle(
        &mut self,
        id: NodeId,
        sched: &mut Scheduler<Task>,
        stats: &mut SimStats,
    ) -> Result<()> {
        let now = sched.now();
        let params = self.params;
        let node = self.node_mut(id)?;
        stats.settle_steps += 1;

        match node.settle_step(now, &params) {
            Some(at) => {
                node.settle_at = Some(at);
                sched.schedule(Task::Settle(id), at)?;
            }
            None => {
                trace!(node = %id, volts = node.voltage, "settled");
            }
        }
        node.level = node.analog_level(&params);
        self.push_to_pins(id)
    }

    /// Copies the node's resolved level and voltage into every attached pin.
    fn push_to_pins(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        let (level, volts) = (node.level, node.voltage);
        let pins = node.pins.clone();
        for pin in pins {
            self.set_driven(pin, level, volts);
        }
        Ok(())
    }
}
