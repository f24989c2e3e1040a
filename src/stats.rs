//! The statistics trace: the only externally observable output of a run.
//!
//! Nodes report every state change, queue change, drop, arrival and
//! completed reception through [`StatsLogger`], exactly once per
//! occurrence. [`CsvLogger`] writes the trace to a file for offline
//! analysis; [`MemoryLogger`] keeps it in memory for tests and run
//! summaries.

use std::io::Write;

use crate::error::SimResult;
use crate::node::{MacState, NodeId};
use crate::packet::{Packet, PacketState};
use crate::time::VirtualTime;

/// Sink for the statistics trace.
pub trait StatsLogger {
    fn log_state(&mut self, now: VirtualTime, node: NodeId, state: MacState) -> SimResult<()>;

    fn log_queue_length(&mut self, now: VirtualTime, node: NodeId, length: usize) -> SimResult<()>;

    /// A packet of `size` bytes was dropped because the queue was full.
    fn log_queue_drop(&mut self, now: VirtualTime, node: NodeId, size: u32) -> SimResult<()>;

    /// A packet of `size` bytes arrived from the upper layer.
    fn log_arrival(&mut self, now: VirtualTime, node: NodeId, size: u32) -> SimResult<()>;

    /// `destination` finished receiving `packet` sent by `source`.
    fn log_packet(
        &mut self,
        now: VirtualTime,
        source: NodeId,
        destination: NodeId,
        packet: &Packet,
    ) -> SimResult<()>;
}

// ── Records ───────────────────────────────────────────────────────────

/// What a trace line reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    State(MacState),
    QueueLength,
    QueueDrop,
    Arrival,
    Packet(PacketState),
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogKind::State(_) => f.write_str("STATE"),
            LogKind::QueueLength => f.write_str("QUEUE_LEN"),
            LogKind::QueueDrop => f.write_str("QUEUE_DROP"),
            LogKind::Arrival => f.write_str("ARRIVAL"),
            LogKind::Packet(state) => write!(f, "{state}"),
        }
    }
}

/// One line of the statistics trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub time: VirtualTime,
    pub source: NodeId,
    pub destination: NodeId,
    pub kind: LogKind,
    /// State code, queue length, or size in bytes depending on `kind`.
    pub value: u64,
}

impl LogRecord {
    fn local(time: VirtualTime, node: NodeId, kind: LogKind, value: u64) -> Self {
        LogRecord {
            time,
            source: node,
            destination: node,
            kind,
            value,
        }
    }

    fn packet(time: VirtualTime, source: NodeId, destination: NodeId, packet: &Packet) -> Self {
        LogRecord {
            time,
            source,
            destination,
            kind: LogKind::Packet(packet.state()),
            value: u64::from(packet.size()),
        }
    }
}

impl std::fmt::Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.9},{},{},{},{}",
            self.time.as_secs_f64(),
            self.source.raw(),
            self.destination.raw(),
            self.kind,
            self.value
        )
    }
}

// ── MemoryLogger ──────────────────────────────────────────────────────

/// Keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogger {
    records: Vec<LogRecord>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// States `node` switched to, in order.
    pub fn states_of(&self, node: NodeId) -> Vec<MacState> {
        self.records
            .iter()
            .filter(|r| r.destination == node)
            .filter_map(|r| match r.kind {
                LogKind::State(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Number of records of `kind`, across all nodes.
    pub fn count(&self, kind: LogKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl StatsLogger for MemoryLogger {
    fn log_state(&mut self, now: VirtualTime, node: NodeId, state: MacState) -> SimResult<()> {
        self.records
            .push(LogRecord::local(now, node, LogKind::State(state), state.code()));
        Ok(())
    }

    fn log_queue_length(&mut self, now: VirtualTime, node: NodeId, length: usize) -> SimResult<()> {
        self.records
            .push(LogRecord::local(now, node, LogKind::QueueLength, length as u64));
        Ok(())
    }

    fn log_queue_drop(&mut self, now: VirtualTime, node: NodeId, size: u32) -> SimResult<()> {
        self.records
            .push(LogRecord::local(now, node, LogKind::QueueDrop, u64::from(size)));
        Ok(())
    }

    fn log_arrival(&mut self, now: VirtualTime, node: NodeId, size: u32) -> SimResult<()> {
        self.records
            .push(LogRecord::local(now, node, LogKind::Arrival, u64::from(size)));
        Ok(())
    }

    fn log_packet(
        &mut self,
        now: VirtualTime,
        source: NodeId,
        destination: NodeId,
        packet: &Packet,
    ) -> SimResult<()> {
        self.records
            .push(LogRecord::packet(now, source, destination, packet));
        Ok(())
    }
}

// ── CsvLogger ─────────────────────────────────────────────────────────

pub const CSV_HEADER: &str = "time,source,destination,event,value";

/// Writes the trace as CSV, one record per line, header first.
#[derive(Debug)]
pub struct CsvLogger<W: Write> {
    out: W,
    lines: u64,
}

impl<W: Write> CsvLogger<W> {
    pub fn new(mut out: W) -> SimResult<Self> {
        writeln!(out, "{CSV_HEADER}")?;
        Ok(CsvLogger { out, lines: 0 })
    }

    /// Records written so far, header excluded.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Flush and hand back the writer.
    pub fn finish(mut self) -> SimResult<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn write(&mut self, record: LogRecord) -> SimResult<()> {
        writeln!(self.out, "{record}")?;
        self.lines += 1;
        Ok(())
    }
}

impl<W: Write> StatsLogger for CsvLogger<W> {
    fn log_state(&mut self, now: VirtualTime, node: NodeId, state: MacState) -> SimResult<()> {
        self.write(LogRecord::local(now, node, LogKind::State(state), state.code()))
    }

    fn log_queue_length(&mut self, now: VirtualTime, node: NodeId, length: usize) -> SimResult<()> {
        self.write(LogRecord::local(now, node, LogKind::QueueLength, length as u64))
    }

    fn log_queue_drop(&mut self, now: VirtualTime, node: NodeId, size: u32) -> SimResult<()> {
        self.write(LogRecord::local(now, node, LogKind::QueueDrop, u64::from(size)))
    }

    fn log_arrival(&mut self, now: VirtualTime, node: NodeId, size: u32) -> SimResult<()> {
        self.write(LogRecord::local(now, node, LogKind::Arrival, u64::from(size)))
    }

    fn log_packet(
        &mut self,
        now: VirtualTime,
        source: NodeId,
        destination: NodeId,
        packet: &Packet,
    ) -> SimResult<()> {
        self.write(LogRecord::packet(now, source, destination, packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketTable;

    #[test]
    fn test_memory_logger_states() {
        let mut log = MemoryLogger::new();
        let n0 = NodeId::new(0);
        let n1 = NodeId::new(1);
        log.log_state(VirtualTime::ZERO, n0, MacState::Listening).unwrap();
        log.log_state(VirtualTime::ZERO, n1, MacState::Rx).unwrap();
        log.log_state(VirtualTime::from_nanos(5), n0, MacState::Tx).unwrap();

        assert_eq!(log.states_of(n0), vec![MacState::Listening, MacState::Tx]);
        assert_eq!(log.states_of(n1), vec![MacState::Rx]);
        assert_eq!(log.count(LogKind::State(MacState::Tx)), 1);
    }

    #[test]
    fn test_csv_format() {
        let mut table = PacketTable::new();
        let id = table.insert(100, VirtualTime::from_nanos(800_000));
        table.get_mut(id).unwrap().set_state(PacketState::Received);

        let mut log = CsvLogger::new(Vec::new()).unwrap();
        let n0 = NodeId::new(0);
        let n1 = NodeId::new(1);
        log.log_arrival(VirtualTime::ZERO, n0, 100).unwrap();
        log.log_queue_length(VirtualTime::ZERO, n0, 1).unwrap();
        log.log_state(VirtualTime::from_secs_f64(1.0), n0, MacState::Tx).unwrap();
        log.log_queue_drop(VirtualTime::from_secs_f64(1.0), n0, 60).unwrap();
        log.log_packet(VirtualTime::from_secs_f64(1.0008), n0, n1, table.get(id).unwrap())
            .unwrap();
        assert_eq!(log.lines(), 5);

        let text = String::from_utf8(log.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                CSV_HEADER,
                "0.000000000,0,0,ARRIVAL,100",
                "0.000000000,0,0,QUEUE_LEN,1",
                "1.000000000,0,0,STATE,1",
                "1.000000000,0,0,QUEUE_DROP,60",
                "1.000800000,0,1,RECEIVED,100",
            ]
        );
    }
}
