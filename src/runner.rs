//! Run one configured simulation from start to finish.

use tracing::info;

use crate::config::RunConfig;
use crate::error::SimResult;
use crate::node::{MacNode, NodeId, NodeRuntime, RunTotals};
use crate::simulation::Simulation;
use crate::stats::StatsLogger;
use crate::time::VirtualTime;

/// Outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub events: u64,
    pub final_time: VirtualTime,
    pub totals: RunTotals,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} events until {}: {} arrivals, {} drops, {} sent, {} received, {} corrupted",
            self.events,
            self.final_time,
            self.totals.arrivals,
            self.totals.drops,
            self.totals.transmitted,
            self.totals.received,
            self.totals.corrupted
        )
    }
}

/// Build the stations of `config`, run them for `duration` and report.
///
/// The trace goes to `logger`, which is handed back once the run is over
/// so the caller can flush it.
pub fn run_scenario<L: StatsLogger>(config: &RunConfig, logger: L) -> SimResult<(RunSummary, L)> {
    config.validate()?;

    let mut runtime = NodeRuntime::new(config.seed, config.range, logger);
    for (i, pos) in config.nodes.iter().enumerate() {
        runtime.register(MacNode::new(NodeId::new(i as u64), *pos, config.mac.clone()));
    }
    info!(
        run = config.index,
        seed = config.seed,
        nodes = runtime.node_count(),
        duration = config.duration,
        "run started"
    );

    let mut sim = Simulation::new();
    runtime.initialize(&mut sim)?;
    let events = sim.run_until(config.duration_time(), &mut runtime)?;

    let summary = RunSummary {
        events,
        final_time: sim.current_time(),
        totals: runtime.totals(),
    };
    info!(
        run = config.index,
        events,
        received = summary.totals.received,
        corrupted = summary.totals.corrupted,
        drops = summary.totals.drops,
        "run finished"
    );
    Ok((summary, runtime.into_logger()))
}
