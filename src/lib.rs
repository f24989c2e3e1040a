//! # csma-sim: Deterministic CSMA/CA Simulator
//!
//! A discrete-event simulator for stations sharing one broadcast channel
//! under a listen-before-talk protocol with random slotted backoff. No
//! async, no threads, no wall-clock time: stations are state machines
//! driven by a virtual clock, and a run is fully determined by its seed.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │          NodeRuntime          │ ← routes events to MacNodes
//! │  ┌─────────┐  ┌────────────┐ │
//! │  │ Channel │  │ PacketTable│ │ ← fan-out, packet copies
//! │  └─────────┘  └────────────┘ │
//! │  ┌────────────────────────┐  │
//! │  │       Simulation        │  │ ← execution loop
//! │  │  ┌──────────────────┐  │  │
//! │  │  │    Scheduler     │  │  │ ← (time, rank, id) order
//! │  │  └──────────────────┘  │  │
//! │  └────────────────────────┘  │
//! └──────────────────────────────┘
//!          │ StatsLogger
//!          ▼
//!     CSV / memory trace
//! ```

pub mod channel;
pub mod config;
pub mod distribution;
pub mod error;
pub mod event;
pub mod node;
pub mod packet;
pub mod runner;
pub mod scheduler;
pub mod simulation;
pub mod stats;
pub mod time;

// Re-exports for convenience.
pub use channel::Channel;
pub use config::{RunConfig, Scenario};
pub use distribution::Distribution;
pub use error::{SimError, SimResult};
pub use event::{Event, EventId, EventKind};
pub use node::{MacConfig, MacNode, MacState, NodeId, NodeRuntime, Position};
pub use packet::{Packet, PacketId, PacketState, PacketTable};
pub use runner::{run_scenario, RunSummary};
pub use scheduler::{Scheduler, TimerHook};
pub use simulation::{EventHandler, Simulation, SimulationContext};
pub use stats::{CsvLogger, MemoryLogger, StatsLogger};
pub use time::VirtualTime;
