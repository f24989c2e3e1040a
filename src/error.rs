//! Structured error types for the simulator.
//!
//! All fallible public APIs return `Result<T, SimError>`. Two families
//! live side by side:
//!
//! - internal-consistency failures (a handler entered in the wrong state,
//!   a dequeue on an empty queue, a timer fired that the node no longer
//!   owns). These mean the run is already wrong and must stop.
//! - configuration and I/O failures raised while loading a scenario or
//!   writing its trace.
//!
//! Queue overflow is not an error: a dropped packet is logged and the run
//! carries on.

use crate::event::{EventId, EventKind};
use crate::node::{MacState, NodeId};
use crate::packet::PacketId;

/// The top-level error type for the simulator.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    // ── Internal consistency ──────────────────────────────

    /// A handler was entered while the node was in a state it does not
    /// accept. Usually a timer that should have been cancelled.
    #[error("node {node} received {event} in state {actual}, expected {}", fmt_states(.expected))]
    StateMismatch {
        node: NodeId,
        event: EventKind,
        expected: &'static [MacState],
        actual: MacState,
    },

    /// `dequeue` was called on an empty send queue.
    #[error("node {node} tried to dequeue a packet from an empty queue")]
    EmptyQueue { node: NodeId },

    /// A protocol invariant other than the state precondition failed.
    #[error("node {node} violated an invariant while handling {event}: {detail}")]
    Invariant {
        node: NodeId,
        event: EventKind,
        detail: String,
    },

    /// A timer event fired that does not match the hook the node holds.
    #[error("node {node} received stale {event} ({id})")]
    StaleTimer {
        node: NodeId,
        event: EventKind,
        id: EventId,
    },

    /// A hook was cancelled whose event is no longer pending.
    #[error("cannot cancel {0}: event is not pending")]
    UnknownTimer(EventId),

    /// An event that must carry a packet arrived without one, or named a
    /// packet that is no longer in the table.
    #[error("{event} for node {node} refers to a missing packet {packet:?}")]
    MissingPacket {
        node: NodeId,
        event: EventKind,
        packet: Option<PacketId>,
    },

    /// An event was addressed to a node that is not registered.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// Attempted to schedule an event before the current time.
    #[error("cannot schedule event at {requested} when current time is {current}")]
    NonCausalEvent { requested: u64, current: u64 },

    /// A delay pushed virtual time past `u64::MAX` nanoseconds.
    #[error("virtual time overflow scheduling {delay}ns after {now}ns")]
    TimeOverflow { now: u64, delay: u64 },

    // ── Configuration / I/O ───────────────────────────────

    /// A scenario file or parameter is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// `true` for failures that indicate the simulation state itself is
    /// inconsistent, as opposed to a bad scenario or a failed write.
    pub fn is_internal(&self) -> bool {
        !matches!(
            self,
            SimError::Config(_) | SimError::Io(_) | SimError::Json(_)
        )
    }
}

fn fmt_states(states: &[MacState]) -> String {
    states
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mismatch_display() {
        let e = SimError::StateMismatch {
            node: NodeId::new(3),
            event: EventKind::EndSlot,
            expected: &[MacState::Slotting],
            actual: MacState::Rx,
        };
        assert_eq!(
            e.to_string(),
            "node N3 received END_SLOT in state RX, expected SLOTTING"
        );
    }

    #[test]
    fn test_multiple_expected_states_display() {
        let e = SimError::StateMismatch {
            node: NodeId::new(0),
            event: EventKind::EndRx,
            expected: &[MacState::Rx, MacState::Tx],
            actual: MacState::Idle,
        };
        assert!(e.to_string().ends_with("expected RX or TX"));
    }

    #[test]
    fn test_empty_queue_display() {
        let e = SimError::EmptyQueue { node: NodeId::new(5) };
        assert!(e.to_string().contains("N5"));
    }

    #[test]
    fn test_internal_classification() {
        assert!(SimError::EmptyQueue { node: NodeId::new(1) }.is_internal());
        assert!(SimError::UnknownTimer(EventId::new(9)).is_internal());
        assert!(!SimError::Config("bad".into()).is_internal());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert!(!SimError::from(io).is_internal());
    }

    #[test]
    fn test_error_is_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(SimError::NodeNotFound(NodeId::new(2)));
        assert_eq!(e.to_string(), "node N2 not found");
    }
}
