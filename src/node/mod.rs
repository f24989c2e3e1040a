//! Stations and the runtime that drives them.
//!
//! Stations never talk to each other directly. Everything they do goes
//! through events in the shared scheduler, packets in the shared table and
//! transmissions on the shared channel.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`NodeId`], [`Position`] |
//! | [`state`] | [`MacState`] |
//! | [`config`] | [`MacConfig`] |
//! | [`env`] | [`MacEnv`] |
//! | [`mac`] | [`MacNode`] state machine, [`NodeCounters`] |
//! | [`runtime`] | [`NodeRuntime`], [`RunTotals`] |

pub mod config;
pub mod env;
pub mod id;
pub mod mac;
pub mod runtime;
pub mod state;

pub use config::MacConfig;
pub use env::MacEnv;
pub use id::{NodeId, Position};
pub use mac::{MacNode, NodeCounters};
pub use runtime::{NodeRuntime, RunTotals};
pub use state::MacState;
