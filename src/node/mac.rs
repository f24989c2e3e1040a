//! The per-station CSMA/CA state machine.
//!
//! A station queues packets handed down from the upper layer, listens
//! before its first attempt, backs off for a random number of slots after
//! every transmission or reception, and counts overlapping receptions to
//! decide which frames arrived intact.
//!
//! ```text
//!            NEW_PACKET                END_LISTENING
//!   IDLE ───────────────▶ LISTENING ─────────────────▶ TX
//!    ▲                        │ START_RX                │ END_TX (queue non-empty)
//!    │                        ▼                         ▼
//!    └──────────────────────  RX  ◀──── START_RX ──── SLOTTING ──▶ TX
//!        END_RX (queue empty)     END_RX (queue non-empty)   END_SLOT (countdown 0)
//! ```
//!
//! Every handler checks the state and invariants it relies on before it
//! touches anything. A failed check means an earlier step went wrong
//! (typically a timer that should have been cancelled) and surfaces as a
//! [`SimError`]; the station is left exactly as it was.

use std::collections::VecDeque;

use rand::Rng;
use tracing::{debug, trace};

use crate::error::{SimError, SimResult};
use crate::event::{Event, EventId, EventKind};
use crate::packet::{PacketId, PacketState};
use crate::scheduler::TimerHook;
use crate::stats::StatsLogger;
use crate::time::VirtualTime;

use super::config::MacConfig;
use super::env::MacEnv;
use super::id::{NodeId, Position};
use super::state::MacState;

/// Running totals kept by each station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeCounters {
    pub arrivals: u64,
    pub drops: u64,
    pub transmitted: u64,
    pub received: u64,
    pub corrupted: u64,
}

/// One simulated station.
#[derive(Debug)]
pub struct MacNode {
    id: NodeId,
    position: Position,
    config: MacConfig,

    state: MacState,
    /// Sizes, in bytes, of packets waiting to be sent.
    queue: VecDeque<u32>,
    /// Receptions currently in progress.
    packets_in_air: u32,
    /// Slots left before the next transmission attempt.
    slot_countdown: u32,
    /// First frame of the current run of overlapping receptions, until it
    /// completes.
    rx_first_packet: Option<PacketId>,

    end_listening: Option<TimerHook>,
    end_slot: Option<TimerHook>,

    counters: NodeCounters,
}

impl MacNode {
    pub fn new(id: NodeId, position: Position, config: MacConfig) -> Self {
        MacNode {
            id,
            position,
            config,
            state: MacState::Idle,
            queue: VecDeque::new(),
            packets_in_air: 0,
            slot_countdown: 0,
            rx_first_packet: None,
            end_listening: None,
            end_slot: None,
            counters: NodeCounters::default(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn config(&self) -> &MacConfig {
        &self.config
    }

    pub fn state(&self) -> MacState {
        self.state
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_sizes(&self) -> impl Iterator<Item = u32> + '_ {
        self.queue.iter().copied()
    }

    pub fn packets_in_air(&self) -> u32 {
        self.packets_in_air
    }

    pub fn slot_countdown(&self) -> u32 {
        self.slot_countdown
    }

    pub fn rx_first_packet(&self) -> Option<PacketId> {
        self.rx_first_packet
    }

    /// Id of the pending END_LISTENING, if any.
    pub fn listening_timer(&self) -> Option<EventId> {
        self.end_listening.as_ref().map(TimerHook::id)
    }

    /// Id of the pending END_SLOT, if any.
    pub fn slot_timer(&self) -> Option<EventId> {
        self.end_slot.as_ref().map(TimerHook::id)
    }

    pub fn counters(&self) -> NodeCounters {
        self.counters
    }

    // ── Entry points ──────────────────────────────────────────────

    /// Start operating: report the initial state and schedule the first
    /// packet arrival.
    pub fn initialize(&mut self, env: &mut MacEnv) -> SimResult<()> {
        let now = env.now();
        env.log.log_state(now, self.id, self.state)?;
        self.schedule_next_arrival(env)
    }

    /// Dispatch one event addressed to this station.
    pub fn handle_event(&mut self, env: &mut MacEnv, event: &Event) -> SimResult<()> {
        match event.kind {
            EventKind::EndListening => self.handle_end_listening(env, event),
            EventKind::NewPacket => self.handle_new_packet(env),
            EventKind::EndTx => self.handle_end_tx(env, event),
            EventKind::EndSlot => self.handle_end_slot(env, event),
            EventKind::StartRx => self.handle_start_rx(env, event),
            EventKind::EndRx => self.handle_end_rx(env, event),
        }
    }

    // ── Queue ─────────────────────────────────────────────────────

    /// Append a packet of `size` bytes, or drop it if the queue is full.
    ///
    /// Returns `false` when the packet was dropped. A drop is an expected
    /// outcome and is only logged.
    pub fn enqueue(
        &mut self,
        log: &mut dyn StatsLogger,
        now: VirtualTime,
        size: u32,
    ) -> SimResult<bool> {
        if self.queue.len() < self.config.queue {
            self.queue.push_back(size);
            log.log_queue_length(now, self.id, self.queue.len())?;
            Ok(true)
        } else {
            debug!(node = %self.id, size, "queue full, packet dropped");
            self.counters.drops += 1;
            log.log_queue_drop(now, self.id, size)?;
            Ok(false)
        }
    }

    /// Pop the oldest queued packet size.
    pub fn dequeue(&mut self, log: &mut dyn StatsLogger, now: VirtualTime) -> SimResult<u32> {
        let size = self
            .queue
            .pop_front()
            .ok_or(SimError::EmptyQueue { node: self.id })?;
        log.log_queue_length(now, self.id, self.queue.len())?;
        Ok(size)
    }

    // ── Handlers ──────────────────────────────────────────────────

    fn handle_new_packet(&mut self, env: &mut MacEnv) -> SimResult<()> {
        let kind = EventKind::NewPacket;
        if self.state == MacState::Idle {
            self.check(kind, self.end_listening.is_none(), || {
                "idle station still holds a listening timer".into()
            })?;
        }

        let now = env.now();
        let draw = self.config.size.sample(&mut *env.rng);
        let size = self.config.packet_bytes(draw);
        self.counters.arrivals += 1;
        env.log.log_arrival(now, self.id, size)?;

        self.enqueue(&mut *env.log, now, size)?;
        self.schedule_next_arrival(env)?;

        // Only an idle station starts listening; otherwise the packet
        // waits for whatever the station is doing to finish.
        if self.state == MacState::Idle {
            self.switch_state(env, MacState::Listening)?;
            let hook = env.sim.schedule_after(
                self.config.listening_duration(),
                EventKind::EndListening,
                self.id,
                self.id,
                None,
            )?;
            self.end_listening = Some(hook);
        }
        Ok(())
    }

    fn handle_end_listening(&mut self, env: &mut MacEnv, event: &Event) -> SimResult<()> {
        let kind = EventKind::EndListening;
        self.expect_state(kind, &[MacState::Listening])?;
        self.check(kind, !self.queue.is_empty(), || "nothing to send after listening".into())?;
        self.check(kind, self.packets_in_air == 0, || {
            format!("{} packets in air after listening", self.packets_in_air)
        })?;
        Self::claim_timer(&mut self.end_listening, self.id, event)?;

        // Channel stayed quiet for the whole period.
        self.switch_state(env, MacState::Tx)?;
        self.transmit_next_packet(env)
    }

    fn handle_end_slot(&mut self, env: &mut MacEnv, event: &Event) -> SimResult<()> {
        let kind = EventKind::EndSlot;
        self.expect_state(kind, &[MacState::Slotting])?;
        self.check(kind, !self.queue.is_empty(), || "contention window with empty queue".into())?;
        self.check(kind, self.packets_in_air == 0, || {
            format!("contention window with {} packets in air", self.packets_in_air)
        })?;
        self.check(kind, self.slot_countdown > 0, || "slot countdown already at zero".into())?;
        Self::claim_timer(&mut self.end_slot, self.id, event)?;

        self.slot_countdown -= 1;
        if self.slot_countdown == 0 {
            // Won the contention.
            self.switch_state(env, MacState::Tx)?;
            self.transmit_next_packet(env)
        } else {
            self.schedule_next_slot_end(env)
        }
    }

    fn handle_end_tx(&mut self, env: &mut MacEnv, event: &Event) -> SimResult<()> {
        let kind = EventKind::EndTx;
        self.expect_state(kind, &[MacState::Tx])?;
        let sent = self.packet_of(env, event)?;

        // Receivers hold their own copies; the sender's one is done.
        env.packets.remove(sent);

        if self.queue.is_empty() {
            if self.packets_in_air == 0 {
                self.switch_state(env, MacState::Idle)
            } else {
                // Someone started talking while we were: keep receiving.
                self.switch_state(env, MacState::Rx)
            }
        } else {
            self.open_contention_window(env)
        }
    }

    fn handle_start_rx(&mut self, env: &mut MacEnv, event: &Event) -> SimResult<()> {
        let kind = EventKind::StartRx;
        let incoming = self.packet_of(env, event)?;
        match self.state {
            MacState::Listening => self.check(kind, self.end_listening.is_some(), || {
                "listening without a pending END_LISTENING".into()
            })?,
            MacState::Slotting => self.check(kind, self.end_slot.is_some(), || {
                "slotting without a pending END_SLOT".into()
            })?,
            _ => {}
        }
        let duration = env
            .packets
            .get(incoming)
            .map(|p| p.duration())
            .ok_or_else(|| self.missing_packet(kind, Some(incoming)))?;

        self.packets_in_air += 1;
        env.sim.schedule_after(
            duration,
            EventKind::EndRx,
            self.id,
            event.source,
            Some(incoming),
        )?;

        if self.packets_in_air == 1 {
            self.rx_first_packet = Some(incoming);
        } else {
            // Overlap: the new frame and the one that opened this run are
            // both lost. The opener may already have completed.
            if let Some(first) = self.rx_first_packet {
                Self::mark_corrupted(env, first);
            }
            Self::mark_corrupted(env, incoming);
        }

        match self.state {
            MacState::Idle => self.switch_state(env, MacState::Rx)?,
            MacState::Listening => {
                if let Some(hook) = self.end_listening.take() {
                    env.sim.cancel(hook)?;
                    debug!(node = %self.id, "channel busy, listening aborted");
                }
                self.switch_state(env, MacState::Rx)?;
            }
            MacState::Slotting => {
                if let Some(hook) = self.end_slot.take() {
                    env.sim.cancel(hook)?;
                    debug!(node = %self.id, remaining = self.slot_countdown, "channel busy, backoff aborted");
                }
                self.switch_state(env, MacState::Rx)?;
            }
            MacState::Tx => {
                // Our own transmission drowns anything arriving meanwhile.
                Self::mark_corrupted(env, incoming);
            }
            MacState::Rx => {}
        }
        Ok(())
    }

    fn handle_end_rx(&mut self, env: &mut MacEnv, event: &Event) -> SimResult<()> {
        let kind = EventKind::EndRx;
        self.expect_state(kind, &[MacState::Rx, MacState::Tx])?;
        let ended = self.packet_of(env, event)?;
        let intact = env
            .packets
            .get(ended)
            .map(|p| p.state() == PacketState::Receiving)
            .ok_or_else(|| self.missing_packet(kind, Some(ended)))?;
        self.check(kind, self.packets_in_air > 0, || "reception ended with nothing in air".into())?;
        if intact {
            self.expect_state(kind, &[MacState::Rx])?;
        }

        self.packets_in_air -= 1;
        if self.rx_first_packet == Some(ended) {
            self.rx_first_packet = None;
        }

        if let Some(packet) = env.packets.get_mut(ended) {
            if intact {
                packet.set_state(PacketState::Received);
                self.counters.received += 1;
            } else {
                self.counters.corrupted += 1;
            }
        }
        if let Some(packet) = env.packets.remove(ended) {
            let now = env.now();
            env.log.log_packet(now, event.source, self.id, &packet)?;
        }

        if self.state == MacState::Rx && self.packets_in_air == 0 {
            if self.queue.is_empty() {
                self.switch_state(env, MacState::Idle)?;
            } else {
                self.open_contention_window(env)?;
            }
        }
        Ok(())
    }

    // ── Channel access ────────────────────────────────────────────

    /// Back off for a random number of slots before the next attempt.
    fn open_contention_window(&mut self, env: &mut MacEnv) -> SimResult<()> {
        self.switch_state(env, MacState::Slotting)?;
        self.slot_countdown = env.rng.gen_range(0..self.config.window_size);
        trace!(node = %self.id, countdown = self.slot_countdown, "contention window opened");

        if self.slot_countdown == 0 {
            // Nothing can be corrupted by going now: any frame already in
            // the air started while we were transmitting.
            self.switch_state(env, MacState::Tx)?;
            self.transmit_next_packet(env)
        } else if self.packets_in_air > 0 {
            // The first slot would find the channel busy anyway.
            self.switch_state(env, MacState::Rx)
        } else {
            self.schedule_next_slot_end(env)
        }
    }

    /// Send the oldest queued packet. Must be in TX with a non-empty queue.
    fn transmit_next_packet(&mut self, env: &mut MacEnv) -> SimResult<()> {
        let kind = EventKind::EndTx;
        self.expect_state(kind, &[MacState::Tx])?;

        let now = env.now();
        let size = self.dequeue(&mut *env.log, now)?;
        let duration = self.config.tx_duration(size);
        let packet = env.packets.insert(size, duration);

        env.channel
            .start_transmission(env.sim, env.packets, self.id, packet)?;
        env.sim
            .schedule_after(duration, EventKind::EndTx, self.id, self.id, Some(packet))?;
        self.counters.transmitted += 1;
        Ok(())
    }

    fn schedule_next_arrival(&mut self, env: &mut MacEnv) -> SimResult<()> {
        let gap = self.config.interarrival.sample(&mut *env.rng);
        env.sim.schedule_after(
            VirtualTime::from_secs_f64(gap),
            EventKind::NewPacket,
            self.id,
            self.id,
            None,
        )?;
        Ok(())
    }

    fn schedule_next_slot_end(&mut self, env: &mut MacEnv) -> SimResult<()> {
        let hook = env.sim.schedule_after(
            self.config.slot_duration(),
            EventKind::EndSlot,
            self.id,
            self.id,
            None,
        )?;
        self.end_slot = Some(hook);
        Ok(())
    }

    // ── Helpers ───────────────────────────────────────────────────

    fn switch_state(&mut self, env: &mut MacEnv, next: MacState) -> SimResult<()> {
        let now = env.now();
        trace!(node = %self.id, from = %self.state, to = %next, time = %now, "state change");
        self.state = next;
        env.log.log_state(now, self.id, next)
    }

    fn mark_corrupted(env: &mut MacEnv, packet: PacketId) {
        if let Some(p) = env.packets.get_mut(packet) {
            p.set_state(PacketState::Corrupted);
        }
    }

    fn expect_state(&self, event: EventKind, expected: &'static [MacState]) -> SimResult<()> {
        if expected.contains(&self.state) {
            Ok(())
        } else {
            Err(SimError::StateMismatch {
                node: self.id,
                event,
                expected,
                actual: self.state,
            })
        }
    }

    fn check(&self, event: EventKind, ok: bool, detail: impl FnOnce() -> String) -> SimResult<()> {
        if ok {
            Ok(())
        } else {
            Err(SimError::Invariant {
                node: self.id,
                event,
                detail: detail(),
            })
        }
    }

    /// Surrender the hook for a timer that has just fired. The event must
    /// be the one the hook was issued for; the hook stays in place if not.
    fn claim_timer(slot: &mut Option<TimerHook>, node: NodeId, event: &Event) -> SimResult<()> {
        match slot.take() {
            Some(hook) if hook.matches(event) => Ok(()),
            other => {
                *slot = other;
                Err(SimError::StaleTimer {
                    node,
                    event: event.kind,
                    id: event.id,
                })
            }
        }
    }

    fn packet_of(&self, env: &MacEnv, event: &Event) -> SimResult<PacketId> {
        match event.packet {
            Some(id) if env.packets.get(id).is_some() => Ok(id),
            other => Err(self.missing_packet(event.kind, other)),
        }
    }

    fn missing_packet(&self, event: EventKind, packet: Option<PacketId>) -> SimError {
        SimError::MissingPacket {
            node: self.id,
            event,
            packet,
        }
    }
}
