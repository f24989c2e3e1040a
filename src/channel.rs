/// The shared broadcast medium.
///
/// The channel knows where every station sits and which stations can hear
/// each other. A transmission is fanned out as one `START_RX` per
/// neighbour, each carrying its own copy of the packet, at the instant the
/// transmission starts. There is no propagation delay, fading or loss:
/// whether a copy arrives intact is decided by the receiver alone.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::error::{SimError, SimResult};
use crate::event::EventKind;
use crate::node::{NodeId, Position};
use crate::packet::{PacketId, PacketTable};
use crate::simulation::SimulationContext;

#[derive(Debug, Clone)]
pub struct Channel {
    /// Maximum distance in metres at which two stations hear each other.
    range: f64,
    positions: BTreeMap<NodeId, Position>,
    /// Neighbour sets, kept symmetric and sorted.
    neighbours: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl Channel {
    pub fn new(range: f64) -> Self {
        Channel {
            range,
            positions: BTreeMap::new(),
            neighbours: BTreeMap::new(),
        }
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    /// Place a station on the channel and link it with every station in
    /// range. Re-registering an id moves it.
    pub fn register(&mut self, id: NodeId, position: Position) {
        self.unregister(id);

        let mut mine = BTreeSet::new();
        for (&other, pos) in &self.positions {
            if pos.distance(&position) <= self.range {
                mine.insert(other);
                self.neighbours.entry(other).or_default().insert(id);
            }
        }
        self.positions.insert(id, position);
        self.neighbours.insert(id, mine);
    }

    fn unregister(&mut self, id: NodeId) {
        if let Some(old) = self.neighbours.remove(&id) {
            for other in old {
                if let Some(set) = self.neighbours.get_mut(&other) {
                    set.remove(&id);
                }
            }
        }
        self.positions.remove(&id);
    }

    pub fn position(&self, id: NodeId) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    /// Stations that hear `id`, in id order.
    pub fn neighbours(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.neighbours.get(&id).into_iter().flatten().copied()
    }

    pub fn can_hear(&self, a: NodeId, b: NodeId) -> bool {
        self.neighbours.get(&a).is_some_and(|set| set.contains(&b))
    }

    /// Announce that `source` starts sending `packet` now.
    ///
    /// Schedules a `START_RX` with a fresh receiver copy for every
    /// neighbour. Returns how many receivers were reached.
    pub fn start_transmission(
        &self,
        ctx: &mut SimulationContext,
        packets: &mut PacketTable,
        source: NodeId,
        packet: PacketId,
    ) -> SimResult<usize> {
        let now = ctx.now();
        let mut reached = 0;
        for receiver in self.neighbours(source) {
            let copy = packets
                .copy_for_receiver(packet)
                .ok_or(SimError::MissingPacket {
                    node: source,
                    event: EventKind::StartRx,
                    packet: Some(packet),
                })?;
            ctx.schedule_at(now, EventKind::StartRx, receiver, source, Some(copy))?;
            reached += 1;
        }
        trace!(node = %source, %packet, reached, "transmission started");
        Ok(reached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use crate::time::VirtualTime;

    fn line(range: f64) -> Channel {
        let mut ch = Channel::new(range);
        ch.register(NodeId::new(0), Position::new(0.0, 0.0));
        ch.register(NodeId::new(1), Position::new(5.0, 0.0));
        ch.register(NodeId::new(2), Position::new(10.0, 0.0));
        ch
    }

    #[test]
    fn test_neighbours_within_range() {
        let ch = line(5.0);
        let n = |i| NodeId::new(i);
        assert_eq!(ch.neighbours(n(0)).collect::<Vec<_>>(), vec![n(1)]);
        assert_eq!(ch.neighbours(n(1)).collect::<Vec<_>>(), vec![n(0), n(2)]);
        assert_eq!(ch.neighbours(n(2)).collect::<Vec<_>>(), vec![n(1)]);
        assert!(!ch.can_hear(n(0), n(2)));
        assert!(!ch.can_hear(n(0), n(0)));
    }

    #[test]
    fn test_reregister_moves_node() {
        let mut ch = line(5.0);
        ch.register(NodeId::new(2), Position::new(100.0, 0.0));
        assert!(!ch.can_hear(NodeId::new(1), NodeId::new(2)));
        assert_eq!(ch.neighbours(NodeId::new(2)).count(), 0);
        assert_eq!(ch.position(NodeId::new(2)), Some(Position::new(100.0, 0.0)));
    }

    #[test]
    fn test_start_transmission_fans_out_copies() {
        let ch = line(5.0);
        let mut sched = Scheduler::new();
        let mut packets = PacketTable::new();
        let sent = packets.insert(100, VirtualTime::from_nanos(800));
        let now = VirtualTime::from_nanos(42);

        let mut ctx = SimulationContext::new(&mut sched, now);
        let reached = ch
            .start_transmission(&mut ctx, &mut packets, NodeId::new(1), sent)
            .unwrap();
        assert_eq!(reached, 2);

        let events = sched.drain_ordered();
        assert_eq!(events.len(), 2);
        for (event, dest) in events.iter().zip([0, 2]) {
            assert_eq!(event.kind, EventKind::StartRx);
            assert_eq!(event.time, now);
            assert_eq!(event.source, NodeId::new(1));
            assert_eq!(event.destination, NodeId::new(dest));
            let copy = event.packet.unwrap();
            assert_ne!(copy, sent);
            assert_eq!(packets.get(copy).unwrap().size(), 100);
        }
    }

    #[test]
    fn test_isolated_sender_reaches_nobody() {
        let mut ch = Channel::new(1.0);
        ch.register(NodeId::new(0), Position::new(0.0, 0.0));
        let mut sched = Scheduler::new();
        let mut packets = PacketTable::new();
        let sent = packets.insert(10, VirtualTime::ZERO);
        let mut ctx = SimulationContext::new(&mut sched, VirtualTime::ZERO);
        assert_eq!(
            ch.start_transmission(&mut ctx, &mut packets, NodeId::new(0), sent)
                .unwrap(),
            0
        );
        assert!(sched.is_empty());
    }
}
