/// Deterministic event scheduler with cancellation.
///
/// Pending events live in a `BTreeMap` keyed by `(time, rank, id)`, so
/// popping the first entry always yields the next event in dispatch order
/// and cancelling is a keyed removal. Event ids are strictly increasing,
/// which makes the order total: two runs that schedule the same events
/// dispatch them identically.

use std::collections::BTreeMap;

use crate::error::{SimError, SimResult};
use crate::event::{Event, EventId, EventIdGen, EventKey, EventKind};
use crate::node::NodeId;
use crate::packet::PacketId;
use crate::time::VirtualTime;

/// Handle to a scheduled event, used only to cancel it.
///
/// Not `Clone`: a hook is spent either by [`Scheduler::cancel`] or by the
/// holder dropping it once the event has been dispatched.
#[derive(Debug, PartialEq, Eq)]
pub struct TimerHook {
    key: EventKey,
}

impl TimerHook {
    /// The id of the event this hook refers to.
    pub fn id(&self) -> EventId {
        self.key.id
    }

    /// The dispatch time of the event this hook refers to.
    pub fn time(&self) -> VirtualTime {
        self.key.time
    }

    /// `true` if `event` is the event this hook was issued for.
    pub fn matches(&self, event: &Event) -> bool {
        self.key.id == event.id
    }
}

/// The core deterministic scheduler.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BTreeMap<EventKey, Event>,
    id_gen: EventIdGen,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new event for dispatch at `at`.
    ///
    /// Returns a hook that can cancel the event while it is pending.
    pub fn schedule(
        &mut self,
        at: VirtualTime,
        kind: EventKind,
        destination: NodeId,
        source: NodeId,
        packet: Option<PacketId>,
    ) -> TimerHook {
        let id = self.id_gen.next_id();
        let event = Event::new(id, at, kind, destination, source, packet);
        let key = event.key();
        self.queue.insert(key, event);
        TimerHook { key }
    }

    /// Remove a pending event, consuming its hook.
    pub fn cancel(&mut self, hook: TimerHook) -> SimResult<Event> {
        self.queue
            .remove(&hook.key)
            .ok_or(SimError::UnknownTimer(hook.key.id))
    }

    /// Pop the next event in dispatch order.
    pub fn pop_next(&mut self) -> Option<Event> {
        self.queue.pop_first().map(|(_, event)| event)
    }

    /// Peek at the next event without removing it.
    pub fn peek_next(&self) -> Option<&Event> {
        self.queue.values().next()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns the next event ID that will be assigned.
    pub fn next_event_id(&self) -> EventId {
        self.id_gen.peek()
    }

    /// Iterate over pending events in dispatch order.
    pub fn pending(&self) -> impl Iterator<Item = &Event> {
        self.queue.values()
    }

    /// Drain all events in dispatch order into a `Vec`.
    pub fn drain_ordered(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.queue).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(id: u64) -> NodeId {
        NodeId::new(id)
    }

    fn at(nanos: u64) -> VirtualTime {
        VirtualTime::from_nanos(nanos)
    }

    #[test]
    fn test_fifo_at_same_time_and_kind() {
        let mut sched = Scheduler::new();
        sched.schedule(at(10), EventKind::NewPacket, n(0), n(0), None);
        sched.schedule(at(10), EventKind::NewPacket, n(1), n(1), None);
        sched.schedule(at(10), EventKind::NewPacket, n(2), n(2), None);

        let order: Vec<NodeId> = sched.drain_ordered().iter().map(|e| e.destination).collect();
        assert_eq!(order, vec![n(0), n(1), n(2)]);
    }

    #[test]
    fn test_time_ordering() {
        let mut sched = Scheduler::new();
        sched.schedule(at(30), EventKind::EndSlot, n(0), n(0), None);
        sched.schedule(at(10), EventKind::EndSlot, n(0), n(0), None);
        sched.schedule(at(20), EventKind::EndSlot, n(0), n(0), None);

        let times: Vec<u64> = sched.drain_ordered().iter().map(|e| e.time.nanos()).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn test_end_rx_dispatched_before_start_rx() {
        let mut sched = Scheduler::new();
        // A new frame starts at the instant the previous one ends; the
        // START_RX is admitted first.
        sched.schedule(at(1_000), EventKind::StartRx, n(1), n(2), Some(PacketId::new(2)));
        sched.schedule(at(1_000), EventKind::EndRx, n(1), n(1), Some(PacketId::new(1)));

        let first = sched.pop_next().unwrap();
        let second = sched.pop_next().unwrap();
        assert_eq!(first.kind, EventKind::EndRx);
        assert_eq!(second.kind, EventKind::StartRx);
    }

    #[test]
    fn test_cancel_removes_pending_event() {
        let mut sched = Scheduler::new();
        let hook = sched.schedule(at(50), EventKind::EndListening, n(0), n(0), None);
        sched.schedule(at(60), EventKind::NewPacket, n(0), n(0), None);
        assert_eq!(sched.len(), 2);

        let cancelled = sched.cancel(hook).unwrap();
        assert_eq!(cancelled.kind, EventKind::EndListening);
        assert_eq!(sched.len(), 1);
        assert_eq!(sched.pop_next().unwrap().kind, EventKind::NewPacket);
    }

    #[test]
    fn test_cancel_after_dispatch_is_an_error() {
        let mut sched = Scheduler::new();
        let hook = sched.schedule(at(5), EventKind::EndSlot, n(0), n(0), None);
        let dispatched = sched.pop_next().unwrap();
        assert!(hook.matches(&dispatched));

        let err = sched.cancel(hook).unwrap_err();
        assert!(matches!(err, SimError::UnknownTimer(id) if id == dispatched.id));
    }

    #[test]
    fn test_hook_accessors() {
        let mut sched = Scheduler::new();
        assert_eq!(sched.next_event_id(), EventId::new(0));
        let hook = sched.schedule(at(7), EventKind::EndSlot, n(0), n(0), None);
        assert_eq!(hook.id(), EventId::new(0));
        assert_eq!(hook.time(), at(7));
        assert_eq!(sched.peek_next().unwrap().id, hook.id());
    }

    #[test]
    fn test_empty_scheduler() {
        let mut sched = Scheduler::new();
        assert!(sched.is_empty());
        assert_eq!(sched.len(), 0);
        assert!(sched.pop_next().is_none());
        assert!(sched.peek_next().is_none());
    }

    #[test]
    fn test_determinism_across_runs() {
        fn build() -> Vec<(u64, u64, EventKind)> {
            let mut sched = Scheduler::new();
            sched.schedule(at(5), EventKind::StartRx, n(0), n(1), None);
            sched.schedule(at(3), EventKind::EndTx, n(1), n(1), None);
            sched.schedule(at(5), EventKind::EndRx, n(0), n(0), None);
            sched.schedule(at(1), EventKind::NewPacket, n(2), n(2), None);
            sched.schedule(at(5), EventKind::EndListening, n(3), n(3), None);
            sched
                .drain_ordered()
                .into_iter()
                .map(|e| (e.id.raw(), e.time.nanos(), e.kind))
                .collect()
        }

        let run1 = build();
        assert_eq!(run1, build());
        let kinds_at_5: Vec<EventKind> = run1
            .iter()
            .filter(|(_, t, _)| *t == 5)
            .map(|(_, _, k)| *k)
            .collect();
        assert_eq!(
            kinds_at_5,
            vec![EventKind::EndListening, EventKind::EndRx, EventKind::StartRx]
        );
    }
}
