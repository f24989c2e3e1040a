/// Event records and the dispatch-priority registry.
///
/// Every effect in the simulator is modeled as an `Event`. Events are
/// immutable records that sit in the scheduler until they are dispatched
/// to their destination node or cancelled.

use std::cmp::Ordering;

use crate::node::NodeId;
use crate::packet::PacketId;
use crate::time::VirtualTime;

// ── Event ID ──────────────────────────────────────────────────────────

/// A globally unique, strictly-increasing event identifier.
///
/// The last tie-break in dispatch order: two events with the same time
/// and the same kind rank are dispatched in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Event ID Generator ───────────────────────────────────────────────

/// Deterministic, strictly-increasing event-ID generator.
///
/// Each `Scheduler` owns exactly one of these.
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }

    /// Peek at the next ID without consuming it.
    pub fn peek(&self) -> EventId {
        EventId(self.next)
    }
}

// ── Event Kind ────────────────────────────────────────────────────────

/// The type tag of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// End of the listen-before-talk period.
    EndListening,
    /// A new packet arrives from the upper layer.
    NewPacket,
    /// The node finished transmitting a frame.
    EndTx,
    /// One contention-window slot elapsed.
    EndSlot,
    /// A frame finished arriving at a receiver.
    EndRx,
    /// A frame started arriving at a receiver.
    StartRx,
}

impl EventKind {
    /// All kinds, in dispatch-priority order.
    pub const ALL: [EventKind; 6] = [
        EventKind::EndListening,
        EventKind::NewPacket,
        EventKind::EndTx,
        EventKind::EndSlot,
        EventKind::EndRx,
        EventKind::StartRx,
    ];

    /// Dispatch rank among events sharing a timestamp. Lower goes first.
    ///
    /// `EndRx` must rank before `StartRx`: when one frame ends at the
    /// exact instant the next begins, the receiver has to finish the old
    /// reception before it counts the new one, otherwise the two would be
    /// seen as overlapping and both marked corrupted.
    pub const fn rank(self) -> u8 {
        match self {
            EventKind::EndListening => 0,
            EventKind::NewPacket => 1,
            EventKind::EndTx => 2,
            EventKind::EndSlot => 3,
            EventKind::EndRx => 4,
            EventKind::StartRx => 5,
        }
    }

    /// `true` for kinds that must carry a packet.
    pub fn carries_packet(self) -> bool {
        matches!(self, EventKind::EndTx | EventKind::EndRx | EventKind::StartRx)
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::EndListening => "END_LISTENING",
            EventKind::NewPacket => "NEW_PACKET",
            EventKind::EndTx => "END_TX",
            EventKind::EndSlot => "END_SLOT",
            EventKind::EndRx => "END_RX",
            EventKind::StartRx => "START_RX",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// A single simulation event.
///
/// Built once by the scheduler when the event is admitted and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Unique identifier (monotonically increasing).
    pub id: EventId,
    /// The virtual time at which this event is dispatched.
    pub time: VirtualTime,
    pub kind: EventKind,
    /// Node whose handler receives the event.
    pub destination: NodeId,
    /// Node that caused the event.
    pub source: NodeId,
    /// Packet attached to reception and transmission events.
    pub packet: Option<PacketId>,
}

impl Event {
    pub fn new(
        id: EventId,
        time: VirtualTime,
        kind: EventKind,
        destination: NodeId,
        source: NodeId,
        packet: Option<PacketId>,
    ) -> Self {
        Event {
            id,
            time,
            kind,
            destination,
            source,
            packet,
        }
    }

    /// The key this event is ordered by in the scheduler.
    pub fn key(&self) -> EventKey {
        EventKey {
            time: self.time,
            rank: self.kind.rank(),
            id: self.id,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} {}] {} {} → {}",
            self.time, self.id, self.kind, self.source, self.destination
        )?;
        if let Some(packet) = self.packet {
            write!(f, " ({})", packet)?;
        }
        Ok(())
    }
}

// ── Ordering ──────────────────────────────────────────────────────────

/// Key for ordering events in the scheduler.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Kind rank (see [`EventKind::rank`])
/// 3. Event id (creation order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub time: VirtualTime,
    pub rank: u8,
    pub id: EventId,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match self.rank.cmp(&other.rank) {
            Ordering::Equal => {}
            ord => return ord,
        }

        self.id.cmp(&other.id)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total dispatch order between two events: `Less` means `a` goes first.
pub fn dispatch_order(a: &Event, b: &Event) -> Ordering {
    a.key().cmp(&b.key())
}
