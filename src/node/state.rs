//! MAC protocol states.

/// The state of a station's MAC. Exactly one is active at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacState {
    /// Nothing to send and nothing being received.
    Idle,
    /// Transmitting a frame.
    Tx,
    /// At least one frame is arriving.
    Rx,
    /// Counting down contention-window slots.
    Slotting,
    /// Sensing the channel before the first attempt.
    Listening,
}

impl MacState {
    /// Numeric code written to the statistics trace.
    pub fn code(self) -> u64 {
        match self {
            MacState::Idle => 0,
            MacState::Tx => 1,
            MacState::Rx => 2,
            MacState::Slotting => 3,
            MacState::Listening => 4,
        }
    }
}

impl std::fmt::Display for MacState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MacState::Idle => "IDLE",
            MacState::Tx => "TX",
            MacState::Rx => "RX",
            MacState::Slotting => "SLOTTING",
            MacState::Listening => "LISTENING",
        })
    }
}
