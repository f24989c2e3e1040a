//! `NodeRuntime`: owns all stations and dispatches events to them.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::channel::Channel;
use crate::error::{SimError, SimResult};
use crate::event::Event;
use crate::packet::PacketTable;
use crate::simulation::{EventHandler, Simulation, SimulationContext};
use crate::stats::StatsLogger;

use super::env::MacEnv;
use super::id::NodeId;
use super::mac::{MacNode, NodeCounters};

/// Counters summed over every station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub arrivals: u64,
    pub drops: u64,
    pub transmitted: u64,
    pub received: u64,
    pub corrupted: u64,
}

impl RunTotals {
    fn add(&mut self, c: NodeCounters) {
        self.arrivals += c.arrivals;
        self.drops += c.drops;
        self.transmitted += c.transmitted;
        self.received += c.received;
        self.corrupted += c.corrupted;
    }
}

/// Manages the set of stations of one run.
///
/// Implements [`EventHandler`] so it can be passed directly to
/// [`Simulation::run`]. Every event is routed to its destination station;
/// an event for an unknown station stops the run.
///
/// All randomness of the run comes from one [`ChaCha8Rng`] owned here, so
/// a run is fully determined by its seed and configuration.
pub struct NodeRuntime<L: StatsLogger> {
    nodes: BTreeMap<NodeId, MacNode>,
    channel: Channel,
    packets: PacketTable,
    logger: L,
    rng: ChaCha8Rng,
}

impl<L: StatsLogger> NodeRuntime<L> {
    pub fn new(seed: u64, range: f64, logger: L) -> Self {
        NodeRuntime {
            nodes: BTreeMap::new(),
            channel: Channel::new(range),
            packets: PacketTable::new(),
            logger,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Add a station and place it on the channel. A station registered
    /// under an existing id replaces it.
    pub fn register(&mut self, node: MacNode) {
        self.channel.register(node.id(), node.position());
        self.nodes.insert(node.id(), node);
    }

    /// Start every station, in id order.
    pub fn initialize(&mut self, sim: &mut Simulation) -> SimResult<()> {
        let mut ctx = sim.context();
        for node in self.nodes.values_mut() {
            let mut env = MacEnv {
                sim: &mut ctx,
                packets: &mut self.packets,
                channel: &self.channel,
                log: &mut self.logger,
                rng: &mut self.rng,
            };
            node.initialize(&mut env)?;
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&MacNode> {
        self.nodes.get(&id)
    }

    /// All stations in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &MacNode> + '_ {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn packets(&self) -> &PacketTable {
        &self.packets
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut L {
        &mut self.logger
    }

    pub fn into_logger(self) -> L {
        self.logger
    }

    pub fn totals(&self) -> RunTotals {
        let mut totals = RunTotals::default();
        for node in self.nodes.values() {
            totals.add(node.counters());
        }
        totals
    }
}

impl<L: StatsLogger> EventHandler for NodeRuntime<L> {
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event) -> SimResult<()> {
        let node = self
            .nodes
            .get_mut(&event.destination)
            .ok_or(SimError::NodeNotFound(event.destination))?;
        trace!(node = %event.destination, state = %node.state(), event = %event.kind, "deliver");

        let mut env = MacEnv {
            sim: ctx,
            packets: &mut self.packets,
            channel: &self.channel,
            log: &mut self.logger,
            rng: &mut self.rng,
        };
        node.handle_event(&mut env, event)
    }
}
