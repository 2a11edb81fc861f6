//! Simulator: owns the clock and the board side-by-side.
//!
//! Keeping the scheduler next to (rather than inside) the board lets a fired
//! callback borrow the scheduler and every component at once without
//! temporarily taking either out of its owner.
//!
//! Pin changes produced by any operation are queued by the netlist and
//! delivered here in order. A listener that drives a pin in response only
//! appends to the queue, so bus reactions are processed iteratively.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::common::{Cycle, Drive, EngineId, NodeId, PinId, PortId, Result, SignalLevel, SimError};
use crate::config::Config;
use crate::sim::{Scheduler, Task};
use crate::soc::Wiring;
use crate::soc::devices::{Line, SerialEeprom, TwoWireSlave, TwoWireState};
use crate::soc::net::{Netlist, Pin, PinConfig, PinKind};
use crate::soc::port::PortRegister;
use crate::soc::traits::TwoWireDevice;
use crate::stats::SimStats;

/// Component notified when a pin's resolved level changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Listener {
    /// A port register bit.
    Port { port: PortId, bit: u32 },
    /// One line of a two-wire engine.
    TwoWire { engine: EngineId, line: Line },
}

/// Everything the scheduler dispatches into.
#[derive(Debug)]
struct Board {
    net: Netlist,
    ports: Vec<Option<PortRegister>>,
    engines: Vec<Option<TwoWireSlave>>,
    listeners: HashMap<PinId, Vec<Listener>>,
    stats: SimStats,
}

/// Top-level simulator: cycle clock + pins, nodes, registers and engines.
#[derive(Debug)]
pub struct Simulator {
    scheduler: Scheduler<Task>,
    board: Board,
    config: Config,
}

impl Board {
    fn wiring<'a>(
        net: &'a mut Netlist,
        scheduler: &'a mut Scheduler<Task>,
        stats: &'a mut SimStats,
    ) -> Wiring<'a> {
        Wiring {
            net,
            scheduler,
            stats,
        }
    }

    fn port(&self, id: PortId) -> Result<&PortRegister> {
        self.ports
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(SimError::UnknownPort(id))
    }

    fn engine(&self, id: EngineId) -> Result<&TwoWireSlave> {
        self.engines
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(SimError::UnknownEngine(id))
    }

    /// Runs one fired callback, then delivers the pin changes it caused.
    fn dispatch(&mut self, scheduler: &mut Scheduler<Task>, task: Task) -> Result<()> {
        self.stats.callbacks_fired += 1;
        match task {
            Task::Settle(node) => self.net.settle(node, scheduler, &mut self.stats)?,
            Task::TwoWireEdge(id) | Task::TwoWireWrite(id) => {
                let engine = self
                    .engines
                    .get_mut(id.index())
                    .and_then(Option::as_mut)
                    .ok_or(SimError::UnknownEngine(id))?;
                let mut w = Self::wiring(&mut self.net, scheduler, &mut self.stats);
                if matches!(task, Task::TwoWireEdge(_)) {
                    engine.on_edge(&mut w)?;
                } else {
                    engine.on_write_complete(&mut w)?;
                }
            }
        }
        self.deliver(scheduler)
    }

    /// Drains the netlist's pin-change queue into the registered listeners.
    fn deliver(&mut self, scheduler: &mut Scheduler<Task>) -> Result<()> {
        while let Some(change) = self.net.pop_change() {
            let Some(listeners) = self.listeners.get(&change.pin).cloned() else {
                continue;
            };
            for listener in listeners {
                match listener {
                    Listener::Port { port, bit } => {
                        let slot = self.ports.get_mut(port.index());
                        if let Some(p) = slot.and_then(Option::as_mut) {
                            p.on_pin_changed(bit, change.level);
                        }
                    }
                    Listener::TwoWire { engine, line } => {
                        let slot = self.engines.get_mut(engine.index());
                        if let Some(e) = slot.and_then(Option::as_mut) {
                            let mut w = Self::wiring(&mut self.net, scheduler, &mut self.stats);
                            e.on_pin_changed(line, change.level, &mut w)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn listen(&mut self, pin: PinId, listener: Listener) {
        let entry = self.listeners.entry(pin).or_default();
        if !entry.contains(&listener) {
            entry.push(listener);
        }
    }
}

impl Simulator {
    /// Creates an empty simulator at cycle 0.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] when `config` fails validation.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        info!(
            cycles_per_second = config.clock.cycles_per_second,
            vdd = config.electrical.vdd,
            "simulator created"
        );
        Ok(Self {
            scheduler: Scheduler::new(),
            board: Board {
                net: Netlist::new(&config),
                ports: Vec::new(),
                engines: Vec::new(),
                listeners: HashMap::new(),
                stats: SimStats::new(config.diagnostics.anomaly_history),
            },
            config,
        })
    }

    /// Current cycle.
    pub const fn now(&self) -> Cycle {
        self.scheduler.now()
    }

    /// Configuration in effect.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Statistics and anomaly history.
    pub const fn stats(&self) -> &SimStats {
        &self.board.stats
    }

    /// Prints the statistics summary to stdout.
    pub fn print_stats(&self) {
        self.board.stats.print(self.scheduler.now());
    }

    /// The cycle clock.
    pub const fn scheduler(&self) -> &Scheduler<Task> {
        &self.scheduler
    }

    /// The pin and node arena.
    pub const fn netlist(&self) -> &Netlist {
        &self.board.net
    }

    /// Advances time to `target`, firing every callback due on the way.
    ///
    /// A target in the past leaves time unchanged.
    ///
    /// # Returns
    ///
    /// The number of callbacks fired.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised by a callback.
    pub fn advance_to(&mut self, target: Cycle) -> Result<usize> {
        let Self {
            scheduler, board, ..
        } = self;
        board.deliver(scheduler)?;
        scheduler.advance_to(target, |sched, task| board.dispatch(sched, task))
    }

    /// Advances time by `delta` cycles.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised by a callback.
    pub fn advance_by(&mut self, delta: Cycle) -> Result<usize> {
        self.advance_to(self.scheduler.now().saturating_add(delta))
    }

    /// Runs a netlist operation, then delivers the pin changes it produced.
    fn with_net<T>(
        &mut self,
        op: impl FnOnce(&mut Netlist, &mut Scheduler<Task>, &mut SimStats) -> Result<T>,
    ) -> Result<T> {
        let Self {
            scheduler, board, ..
        } = self;
        let out = op(&mut board.net, scheduler, &mut board.stats)?;
        board.deliver(scheduler)?;
        Ok(out)
    }

    /// Creates an unattached pin.
    pub fn add_pin(&mut self, config: PinConfig) -> PinId {
        self.board.net.add_pin(config)
    }

    /// Creates an empty node.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        self.board.net.add_node(name)
    }

    /// Looks up a pin.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale handle.
    pub fn pin(&self, pin: PinId) -> Result<&Pin> {
        self.board.net.pin(pin)
    }

    /// Attaches `pin` to `node`, detaching it from any previous node.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] or [`SimError::UnknownPin`] for stale handles.
    pub fn attach(&mut self, node: NodeId, pin: PinId) -> Result<()> {
        self.with_net(|net, sched, stats| net.attach(node, pin, sched, stats))
    }

    /// Detaches `pin` from its node. Returns whether it was attached.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale handle.
    pub fn detach(&mut self, pin: PinId) -> Result<bool> {
        self.with_net(|net, sched, stats| net.detach(pin, sched, stats))
    }

    /// Destroys a pin, unbinding it from any register or engine listener.
    ///
    /// Port bits bound to the pin are unbound and read their default value
    /// afterwards. Removing one of a two-wire engine's own pins removes the
    /// engine with it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale handle.
    pub fn remove_pin(&mut self, pin: PinId) -> Result<()> {
        let _ = self.board.net.pin(pin)?;
        let owner = self
            .board
            .engines
            .iter()
            .flatten()
            .find(|e| e.clock_pin() == pin || e.data_pin() == pin)
            .map(TwoWireSlave::id);
        if let Some(engine) = owner {
            warn!(%pin, %engine, "engine pin removed, removing its engine");
            let _ = self.remove_two_wire_slave(engine)?;
            return Ok(());
        }

        for reg in self.board.ports.iter_mut().flatten() {
            while let Some(bit) = reg.bit_of(pin) {
                let _ = reg.unbind(bit)?;
                debug!(port = %reg.id(), bit, %pin, "port bit unbound");
            }
        }
        self.with_net(|net, sched, stats| net.remove_pin(pin, sched, stats))?;
        let _ = self.board.listeners.remove(&pin);
        Ok(())
    }

    /// Destroys a node after detaching its pins.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] for a stale handle.
    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        self.with_net(|net, sched, stats| net.remove_node(node, sched, stats))
    }

    /// Changes what `pin` asserts.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale handle.
    pub fn set_driving(&mut self, pin: PinId, drive: impl Into<Drive>) -> Result<()> {
        let drive = drive.into();
        self.with_net(|net, sched, stats| net.set_driving(pin, drive, sched, stats))
    }

    /// Enables or disables a pin's pull-up.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale handle.
    pub fn set_pullup(&mut self, pin: PinId, enabled: bool) -> Result<()> {
        self.with_net(|net, sched, stats| net.set_pullup(pin, enabled, sched, stats))
    }

    /// Switches the output stage of a bi-directional or open-collector pin.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale handle.
    pub fn set_output_enabled(&mut self, pin: PinId, enabled: bool) -> Result<bool> {
        self.with_net(|net, sched, stats| net.set_output_enabled(pin, enabled, sched, stats))
    }

    /// Resolved level seen by `pin`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPin`] for a stale handle.
    pub fn driven_state(&self, pin: PinId) -> Result<SignalLevel> {
        self.board.net.driven_state(pin)
    }

    /// Resolved level of `node`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] for a stale handle.
    pub fn node_level(&self, node: NodeId) -> Result<SignalLevel> {
        self.board.net.node_level(node)
    }

    /// Voltage of `node` at the current cycle.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] for a stale handle.
    pub fn node_voltage(&self, node: NodeId) -> Result<f64> {
        self.board.net.node_voltage(node, self.scheduler.now())
    }

    /// Finds a pin by name.
    pub fn find_pin(&self, name: &str) -> Option<PinId> {
        self.board.net.pin_by_name(name)
    }

    /// Finds a node by name.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.board.net.node_by_name(name)
    }

    /// Creates a port register of `width` bits.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] when `width` is zero or above 32.
    pub fn add_port(&mut self, name: impl Into<String>, width: u32) -> Result<PortId> {
        let id = PortId::from_index(self.board.ports.len());
        let port = PortRegister::new(id, name, width)?;
        debug!(port = %id, name = port.name(), width, "port added");
        self.board.ports.push(Some(port));
        Ok(id)
    }

    /// Binds `pin` to bit `bit` of a port register and enables the bit.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPort`], [`SimError::UnknownPin`] or
    /// [`SimError::BitOutOfRange`].
    pub fn bind_port_pin(&mut self, port: PortId, bit: u32, pin: PinId) -> Result<()> {
        let level = self.board.net.driven_state(pin)?;
        let reg = self.port_mut(port)?;
        if let Some(old) = reg.pin(bit) {
            if old != pin {
                self.unlisten(old, Listener::Port { port, bit });
            }
        }
        let reg = self.port_mut(port)?;
        reg.bind(bit, pin)?;
        reg.on_pin_changed(bit, level);
        self.board.listen(pin, Listener::Port { port, bit });
        Ok(())
    }

    fn unlisten(&mut self, pin: PinId, listener: Listener) {
        if let Some(list) = self.board.listeners.get_mut(&pin) {
            list.retain(|l| *l != listener);
            if list.is_empty() {
                let _ = self.board.listeners.remove(&pin);
            }
        }
    }

    /// Looks up a port register.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPort`] for a stale handle.
    pub fn port(&self, port: PortId) -> Result<&PortRegister> {
        self.board.port(port)
    }

    /// Mutable access to a port register's masks and default value.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPort`] for a stale handle.
    pub fn port_mut(&mut self, port: PortId) -> Result<&mut PortRegister> {
        self.board
            .ports
            .get_mut(port.index())
            .and_then(Option::as_mut)
            .ok_or(SimError::UnknownPort(port))
    }

    /// Processor write to a port register.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPort`] for a stale handle.
    pub fn port_write(&mut self, port: PortId, value: u32) -> Result<()> {
        let Self {
            scheduler, board, ..
        } = self;
        let reg = board
            .ports
            .get_mut(port.index())
            .and_then(Option::as_mut)
            .ok_or(SimError::UnknownPort(port))?;
        reg.write(value, &mut Board::wiring(&mut board.net, scheduler, &mut board.stats))?;
        board.deliver(scheduler)
    }

    /// Processor read of a port register.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPort`] for a stale handle.
    pub fn port_read(&mut self, port: PortId) -> Result<u32> {
        let Self {
            scheduler, board, ..
        } = self;
        let reg = board
            .ports
            .get(port.index())
            .and_then(Option::as_ref)
            .ok_or(SimError::UnknownPort(port))?;
        reg.read(&mut Board::wiring(&mut board.net, scheduler, &mut board.stats))
    }

    /// Sets a port register's data direction (1 = output).
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownPort`] for a stale handle.
    pub fn set_port_direction(&mut self, port: PortId, mask: u32) -> Result<()> {
        let Self {
            scheduler, board, ..
        } = self;
        let reg = board
            .ports
            .get_mut(port.index())
            .and_then(Option::as_mut)
            .ok_or(SimError::UnknownPort(port))?;
        reg.set_direction(mask, &mut Board::wiring(&mut board.net, scheduler, &mut board.stats))?;
        board.deliver(scheduler)
    }

    /// Places a two-wire peripheral on the bus formed by `clock` and `data`.
    ///
    /// The engine gets its own input pin on the clock node and open-collector
    /// pin on the data node, named `i2c#N.scl` and `i2c#N.sda`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] when either node does not exist.
    pub fn add_two_wire_slave(
        &mut self,
        device: Box<dyn TwoWireDevice>,
        address: u8,
        cs_mask: u8,
        clock: NodeId,
        data: NodeId,
    ) -> Result<EngineId> {
        let _ = self.board.net.node(clock)?;
        let _ = self.board.net.node(data)?;

        let id = EngineId::from_index(self.board.engines.len());
        let scl = self.add_pin(PinConfig::new(format!("{id}.scl"), PinKind::Input));
        let sda = self.add_pin(PinConfig::new(
            format!("{id}.sda"),
            PinKind::OpenCollector {
                output_enabled: true,
            },
        ));
        self.attach(clock, scl)?;
        self.attach(data, sda)?;

        let mut engine = TwoWireSlave::new(id, device, address, cs_mask, scl, sda);
        {
            let Self {
                scheduler, board, ..
            } = self;
            engine.attach(scl, sda, &Board::wiring(&mut board.net, scheduler, &mut board.stats))?;
        }
        self.board.engines.push(Some(engine));
        self.board.listen(
            scl,
            Listener::TwoWire {
                engine: id,
                line: Line::Clock,
            },
        );
        self.board.listen(
            sda,
            Listener::TwoWire {
                engine: id,
                line: Line::Data,
            },
        );
        info!(engine = %id, address = format_args!("{address:#04x}"), "two-wire slave added");
        Ok(id)
    }

    /// Looks up a two-wire engine.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownEngine`] for a stale handle.
    pub fn two_wire(&self, engine: EngineId) -> Result<&TwoWireSlave> {
        self.board.engine(engine)
    }

    /// Protocol state of a two-wire engine.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownEngine`] for a stale handle.
    pub fn two_wire_state(&self, engine: EngineId) -> Result<TwoWireState> {
        self.board.engine(engine).map(TwoWireSlave::state)
    }

    /// The serial EEPROM behind an engine, if that is what it carries.
    pub fn eeprom(&self, engine: EngineId) -> Option<&SerialEeprom> {
        self.board.engine(engine).ok()?.device().as_eeprom()
    }

    /// Mutable access to the serial EEPROM behind an engine.
    pub fn eeprom_mut(&mut self, engine: EngineId) -> Option<&mut SerialEeprom> {
        self.board
            .engines
            .get_mut(engine.index())?
            .as_mut()?
            .device_mut()
            .as_eeprom_mut()
    }

    /// Returns a two-wire engine to `Idle`, cancelling its pending work.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownEngine`] for a stale handle.
    pub fn reset_two_wire(&mut self, engine: EngineId) -> Result<()> {
        let Self {
            scheduler, board, ..
        } = self;
        let e = board
            .engines
            .get_mut(engine.index())
            .and_then(Option::as_mut)
            .ok_or(SimError::UnknownEngine(engine))?;
        e.reset(&mut Board::wiring(&mut board.net, scheduler, &mut board.stats))?;
        board.deliver(scheduler)
    }

    /// Removes a two-wire engine and its pins, returning its peripheral.
    ///
    /// Pending tasks of the engine are cancelled first, so nothing is ever
    /// dispatched to the removed engine.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownEngine`] for a stale handle.
    pub fn remove_two_wire_slave(&mut self, engine: EngineId) -> Result<Box<dyn TwoWireDevice>> {
        let e = self
            .board
            .engines
            .get_mut(engine.index())
            .and_then(Option::take)
            .ok_or(SimError::UnknownEngine(engine))?;
        let _ = self.scheduler.cancel(Task::TwoWireEdge(engine));
        let _ = self.scheduler.cancel(Task::TwoWireWrite(engine));
        let (scl, sda) = (e.clock_pin(), e.data_pin());
        self.remove_pin(scl)?;
        self.remove_pin(sda)?;
        info!(engine = %engine, "two-wire slave removed");
        Ok(e.into_device())
    }

    /// Returns time to cycle 0.
    ///
    /// Pending callbacks are dropped, node voltages are kept and re-resolved,
    /// every engine returns to `Idle` and the statistics are cleared. Port
    /// register contents are untouched.
    ///
    /// # Errors
    ///
    /// Propagates netlist errors from re-resolving nodes.
    pub fn reset(&mut self) -> Result<()> {
        let Self {
            scheduler, board, ..
        } = self;
        board.net.freeze(scheduler.now());
        scheduler.reset();
        for engine in board.engines.iter_mut().flatten() {
            engine.reset(&mut Board::wiring(&mut board.net, scheduler, &mut board.stats))?;
        }
        board.net.refresh_all(scheduler, &mut board.stats)?;
        board.deliver(scheduler)?;
        board.stats.clear();
        info!("simulator reset");
        Ok(())
    }
}
