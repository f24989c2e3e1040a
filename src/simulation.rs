/// Simulation execution loop.
///
/// Drives the scheduler: pops events, advances virtual time, dispatches
/// to a user-supplied handler. The loop is purely synchronous and
/// single-threaded. A handler error stops the loop and is returned to the
/// caller untouched.

use tracing::trace;

use crate::error::{SimError, SimResult};
use crate::event::{Event, EventKind};
use crate::node::NodeId;
use crate::packet::PacketId;
use crate::scheduler::{Scheduler, TimerHook};
use crate::time::VirtualTime;

// ── Handler trait ─────────────────────────────────────────────────────

/// Receiver of dispatched events.
///
/// The handler gets a `SimulationContext` so it can schedule follow-up
/// events and cancel pending ones.
pub trait EventHandler {
    /// Called for every dispatched event.
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event) -> SimResult<()>;
}

/// A handler backed by a closure, for tests and one-off scripts.
impl<F> EventHandler for F
where
    F: FnMut(&mut SimulationContext, &Event) -> SimResult<()>,
{
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event) -> SimResult<()> {
        (self)(ctx, event)
    }
}

// ── Simulation Context ───────────────────────────────────────────────

/// Mutable context passed to the handler on every event dispatch.
///
/// Borrows the scheduler mutably, so a handler can only affect dispatch
/// order through `schedule_*` and `cancel`.
pub struct SimulationContext<'a> {
    pub(crate) scheduler: &'a mut Scheduler,
    pub(crate) now: VirtualTime,
}

impl<'a> SimulationContext<'a> {
    /// Build a context over a bare scheduler at time `now`.
    pub fn new(scheduler: &'a mut Scheduler, now: VirtualTime) -> Self {
        SimulationContext { scheduler, now }
    }

    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// Schedule an event at an absolute virtual time.
    pub fn schedule_at(
        &mut self,
        at: VirtualTime,
        kind: EventKind,
        destination: NodeId,
        source: NodeId,
        packet: Option<PacketId>,
    ) -> SimResult<TimerHook> {
        if at < self.now {
            return Err(SimError::NonCausalEvent {
                requested: at.nanos(),
                current: self.now.nanos(),
            });
        }
        Ok(self.scheduler.schedule(at, kind, destination, source, packet))
    }

    /// Schedule an event `delay` after now.
    pub fn schedule_after(
        &mut self,
        delay: VirtualTime,
        kind: EventKind,
        destination: NodeId,
        source: NodeId,
        packet: Option<PacketId>,
    ) -> SimResult<TimerHook> {
        let at = self
            .now
            .advance(delay.nanos())
            .ok_or(SimError::TimeOverflow {
                now: self.now.nanos(),
                delay: delay.nanos(),
            })?;
        Ok(self.scheduler.schedule(at, kind, destination, source, packet))
    }

    /// Cancel a pending event through its hook.
    pub fn cancel(&mut self, hook: TimerHook) -> SimResult<Event> {
        self.scheduler.cancel(hook)
    }

    /// Number of pending events in the scheduler.
    pub fn pending_count(&self) -> usize {
        self.scheduler.len()
    }
}

// ── Simulation ────────────────────────────────────────────────────────

/// Top-level simulation driver.
///
/// Owns the scheduler and tracks the current virtual time.
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    scheduler: Scheduler,
    current_time: VirtualTime,
    events_processed: u64,
}

impl Simulation {
    /// Create a new simulation starting at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// A context at the current time, for seeding events outside dispatch.
    pub fn context(&mut self) -> SimulationContext<'_> {
        SimulationContext {
            scheduler: &mut self.scheduler,
            now: self.current_time,
        }
    }

    pub fn current_time(&self) -> VirtualTime {
        self.current_time
    }

    /// Total events processed so far.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Execute a single step: pop one event, advance time, dispatch.
    ///
    /// Returns `Ok(Some(event))` if an event was processed and `Ok(None)`
    /// when the queue is empty.
    pub fn step(&mut self, handler: &mut dyn EventHandler) -> SimResult<Option<Event>> {
        let Some(event) = self.scheduler.pop_next() else {
            return Ok(None);
        };

        // Virtual time must never go backward.
        if event.time < self.current_time {
            return Err(SimError::NonCausalEvent {
                requested: event.time.nanos(),
                current: self.current_time.nanos(),
            });
        }
        self.current_time = event.time;
        self.events_processed += 1;
        trace!(event = %event, "dispatch");

        let mut ctx = SimulationContext {
            scheduler: &mut self.scheduler,
            now: self.current_time,
        };
        handler.handle(&mut ctx, &event)?;

        Ok(Some(event))
    }

    /// Run until the event queue is empty.
    ///
    /// Returns the number of events processed during this call.
    pub fn run(&mut self, handler: &mut dyn EventHandler) -> SimResult<u64> {
        let start = self.events_processed;
        while self.step(handler)?.is_some() {}
        Ok(self.events_processed - start)
    }

    /// Run until the queue is empty or `max_steps` events have been
    /// dispatched, whichever comes first.
    pub fn run_for(&mut self, max_steps: u64, handler: &mut dyn EventHandler) -> SimResult<u64> {
        let start = self.events_processed;
        for _ in 0..max_steps {
            if self.step(handler)?.is_none() {
                break;
            }
        }
        Ok(self.events_processed - start)
    }

    /// Run every event scheduled at or before `limit`.
    ///
    /// Events later than `limit` stay pending and the clock is left at
    /// `limit`, so a later call can resume the run.
    pub fn run_until(&mut self, limit: VirtualTime, handler: &mut dyn EventHandler) -> SimResult<u64> {
        let start = self.events_processed;
        while self
            .scheduler
            .peek_next()
            .is_some_and(|next| next.time <= limit)
        {
            self.step(handler)?;
        }
        if self.current_time < limit {
            self.current_time = limit;
        }
        Ok(self.events_processed - start)
    }

    /// Returns `true` if there are no more events to process.
    pub fn is_finished(&self) -> bool {
        self.scheduler.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n0() -> NodeId {
        NodeId::new(0)
    }

    fn seed(sim: &mut Simulation, nanos: u64, kind: EventKind) -> TimerHook {
        sim.context()
            .schedule_at(VirtualTime::from_nanos(nanos), kind, n0(), n0(), None)
            .unwrap()
    }

    #[test]
    fn test_basic_execution_loop() {
        let mut sim = Simulation::new();
        seed(&mut sim, 10, EventKind::NewPacket);
        seed(&mut sim, 20, EventKind::EndTx);
        seed(&mut sim, 30, EventKind::EndSlot);

        let mut seen = Vec::new();
        let processed = sim
            .run(&mut |_ctx: &mut SimulationContext, event: &Event| -> SimResult<()> {
                seen.push(event.kind);
                Ok(())
            })
            .unwrap();

        assert_eq!(processed, 3);
        assert_eq!(seen, vec![EventKind::NewPacket, EventKind::EndTx, EventKind::EndSlot]);
        assert_eq!(sim.current_time(), VirtualTime::from_nanos(30));
    }

    #[test]
    fn test_handler_schedules_followup() {
        let mut sim = Simulation::new();
        seed(&mut sim, 0, EventKind::EndSlot);

        let mut times = Vec::new();
        sim.run(&mut |ctx: &mut SimulationContext, _event: &Event| -> SimResult<()> {
            times.push(ctx.now().nanos());
            if ctx.now().nanos() < 30 {
                ctx.schedule_after(VirtualTime::from_nanos(10), EventKind::EndSlot, n0(), n0(), None)?;
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(times, vec![0, 10, 20, 30]);
    }

    #[test]
    fn test_handler_cancels_pending_timer() {
        let mut sim = Simulation::new();
        seed(&mut sim, 5, EventKind::StartRx);
        let mut hook = Some(seed(&mut sim, 10, EventKind::EndListening));

        let mut seen = Vec::new();
        sim.run(&mut |ctx: &mut SimulationContext, event: &Event| -> SimResult<()> {
            seen.push(event.kind);
            if event.kind == EventKind::StartRx {
                if let Some(h) = hook.take() {
                    ctx.cancel(h)?;
                }
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(seen, vec![EventKind::StartRx]);
    }

    #[test]
    fn test_schedule_in_past_fails() {
        let mut sim = Simulation::new();
        seed(&mut sim, 100, EventKind::NewPacket);

        let result = sim.run(&mut |ctx: &mut SimulationContext, _event: &Event| -> SimResult<()> {
            ctx.schedule_at(VirtualTime::from_nanos(50), EventKind::EndSlot, n0(), n0(), None)?;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(SimError::NonCausalEvent { requested: 50, current: 100 })
        ));
    }

    #[test]
    fn test_handler_error_stops_run() {
        let mut sim = Simulation::new();
        seed(&mut sim, 1, EventKind::NewPacket);
        seed(&mut sim, 2, EventKind::NewPacket);

        let result = sim.run(&mut |_ctx: &mut SimulationContext, _event: &Event| -> SimResult<()> {
            Err(SimError::NodeNotFound(NodeId::new(9)))
        });
        assert!(matches!(result, Err(SimError::NodeNotFound(_))));
        assert_eq!(sim.events_processed(), 1);
        assert!(!sim.is_finished());
    }

    #[test]
    fn test_run_for_limits_steps() {
        let mut sim = Simulation::new();
        for i in 0..100 {
            seed(&mut sim, i, EventKind::NewPacket);
        }
        let mut noop = |_ctx: &mut SimulationContext, _event: &Event| -> SimResult<()> { Ok(()) };
        assert_eq!(sim.run_for(10, &mut noop).unwrap(), 10);
        assert_eq!(sim.events_processed(), 10);
        assert!(!sim.is_finished());
    }

    #[test]
    fn test_run_until_includes_boundary() {
        let mut sim = Simulation::new();
        seed(&mut sim, 10, EventKind::NewPacket);
        seed(&mut sim, 20, EventKind::NewPacket);
        seed(&mut sim, 21, EventKind::NewPacket);

        let mut noop = |_ctx: &mut SimulationContext, _event: &Event| -> SimResult<()> { Ok(()) };
        let processed = sim.run_until(VirtualTime::from_nanos(20), &mut noop).unwrap();
        assert_eq!(processed, 2);
        assert_eq!(sim.current_time(), VirtualTime::from_nanos(20));
        assert_eq!(sim.scheduler().len(), 1);

        let processed = sim.run_until(VirtualTime::from_nanos(100), &mut noop).unwrap();
        assert_eq!(processed, 1);
        assert_eq!(sim.current_time(), VirtualTime::from_nanos(100));
    }

    #[test]
    fn test_empty_simulation() {
        let mut sim = Simulation::new();
        let mut noop = |_ctx: &mut SimulationContext, _event: &Event| -> SimResult<()> { Ok(()) };
        assert_eq!(sim.run(&mut noop).unwrap(), 0);
        assert!(sim.is_finished());
    }
}
