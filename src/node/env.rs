//! Everything a station touches while handling one event.

use rand::RngCore;

use crate::channel::Channel;
use crate::packet::PacketTable;
use crate::simulation::SimulationContext;
use crate::stats::StatsLogger;
use crate::time::VirtualTime;

/// Borrowed view of the shared collaborators, rebuilt by the runtime for
/// every dispatch.
///
/// Stations never hold on to any of these between events: timing goes
/// through `sim`, packets are looked up in `packets` by id, and all
/// randomness comes from the single run-wide `rng`.
pub struct MacEnv<'e, 'c> {
    pub sim: &'e mut SimulationContext<'c>,
    pub packets: &'e mut PacketTable,
    pub channel: &'e Channel,
    pub log: &'e mut dyn StatsLogger,
    pub rng: &'e mut dyn RngCore,
}

impl MacEnv<'_, '_> {
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.sim.now()
    }
}
