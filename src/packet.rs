//! Packets and the arena that owns them.
//!
//! A transmitted frame exists once for its sender and once more for every
//! receiver the channel fans it out to, because each receiver decides on
//! its own whether its copy arrived intact. Events and nodes refer to
//! packets by [`PacketId`]; only the [`PacketTable`] owns them.

use std::collections::BTreeMap;

use crate::time::VirtualTime;

/// Arena key for one packet copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketId(u64);

impl PacketId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        PacketId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PacketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P#{}", self.0)
    }
}

/// Reception state of a packet copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketState {
    /// Still arriving, nothing has overlapped it so far.
    Receiving,
    /// Arrived in full without overlap.
    Received,
    /// Overlapped another frame, or arrived while the receiver was
    /// transmitting.
    Corrupted,
}

impl std::fmt::Display for PacketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PacketState::Receiving => "RECEIVING",
            PacketState::Received => "RECEIVED",
            PacketState::Corrupted => "CORRUPTED",
        })
    }
}

/// One copy of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: PacketId,
    /// Shared by the sender's packet and every receiver copy.
    frame: u64,
    size: u32,
    duration: VirtualTime,
    state: PacketState,
}

impl Packet {
    pub fn id(&self) -> PacketId {
        self.id
    }

    /// Number of the transmission this copy belongs to.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Time on air.
    pub fn duration(&self) -> VirtualTime {
        self.duration
    }

    pub fn state(&self) -> PacketState {
        self.state
    }

    pub fn set_state(&mut self, state: PacketState) {
        self.state = state;
    }
}

/// Owner of every live packet copy.
#[derive(Debug, Clone, Default)]
pub struct PacketTable {
    packets: BTreeMap<PacketId, Packet>,
    next_id: u64,
    next_frame: u64,
}

impl PacketTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the sender's packet for a new frame.
    pub fn insert(&mut self, size: u32, duration: VirtualTime) -> PacketId {
        let frame = self.next_frame;
        self.next_frame += 1;
        self.store(frame, size, duration)
    }

    /// Create a receiver's copy of `original`, starting in `Receiving`.
    ///
    /// Returns `None` if `original` is not in the table.
    pub fn copy_for_receiver(&mut self, original: PacketId) -> Option<PacketId> {
        let (frame, size, duration) = {
            let p = self.packets.get(&original)?;
            (p.frame, p.size, p.duration)
        };
        Some(self.store(frame, size, duration))
    }

    fn store(&mut self, frame: u64, size: u32, duration: VirtualTime) -> PacketId {
        let id = PacketId(self.next_id);
        self.next_id += 1;
        self.packets.insert(
            id,
            Packet {
                id,
                frame,
                size,
                duration,
                state: PacketState::Receiving,
            },
        );
        id
    }

    pub fn get(&self, id: PacketId) -> Option<&Packet> {
        self.packets.get(&id)
    }

    pub fn get_mut(&mut self, id: PacketId) -> Option<&mut Packet> {
        self.packets.get_mut(&id)
    }

    /// Drop a copy once nothing refers to it any more.
    pub fn remove(&mut self, id: PacketId) -> Option<Packet> {
        self.packets.remove(&id)
    }

    /// Number of live copies.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}
