//! Per-station MAC parameters.

use serde::{Deserialize, Serialize};

use crate::distribution::Distribution;
use crate::error::{SimError, SimResult};
use crate::time::VirtualTime;

/// Parameters every station is built from. Field names match the keys of
/// a scenario section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacConfig {
    /// Transmission speed in bit/s.
    pub datarate: f64,
    /// Send-queue capacity in packets.
    pub queue: usize,
    /// Number of slots in the contention window.
    pub window_size: u32,
    /// Listen-before-talk period in seconds. Also the slot length.
    pub listening: f64,
    /// Seconds between packet arrivals.
    pub interarrival: Distribution,
    /// Packet size in bytes.
    pub size: Distribution,
    /// Per-packet processing time in seconds.
    pub processing: Distribution,
    /// Largest packet size in bytes; larger draws are truncated.
    pub maxsize: u32,
}

impl MacConfig {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.datarate.is_finite() && self.datarate > 0.0) {
            return Err(SimError::Config(format!(
                "datarate must be positive, got {}",
                self.datarate
            )));
        }
        if self.queue == 0 {
            return Err(SimError::Config("queue capacity must be at least 1".into()));
        }
        if self.window_size == 0 {
            return Err(SimError::Config("window_size must be at least 1".into()));
        }
        if !(self.listening.is_finite() && self.listening > 0.0) {
            return Err(SimError::Config(format!(
                "listening must be positive, got {}",
                self.listening
            )));
        }
        if self.maxsize == 0 {
            return Err(SimError::Config("maxsize must be at least 1".into()));
        }
        self.interarrival.validate()?;
        self.size.validate()?;
        self.processing.validate()?;
        Ok(())
    }

    pub fn listening_duration(&self) -> VirtualTime {
        VirtualTime::from_secs_f64(self.listening)
    }

    /// Length of one contention-window slot.
    pub fn slot_duration(&self) -> VirtualTime {
        self.listening_duration()
    }

    /// Time on air for `size` bytes.
    pub fn tx_duration(&self, size: u32) -> VirtualTime {
        VirtualTime::from_secs_f64(f64::from(size) * 8.0 / self.datarate)
    }

    /// Turn a raw size draw into a whole number of bytes in `1..=maxsize`.
    pub fn packet_bytes(&self, draw: f64) -> u32 {
        let max = f64::from(self.maxsize);
        draw.round().clamp(1.0, max) as u32
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> MacConfig {
    MacConfig {
        datarate: 1_000_000.0,
        queue: 4,
        window_size: 4,
        listening: 1.0,
        interarrival: Distribution::constant(100.0),
        size: Distribution::constant(100.0),
        processing: Distribution::constant(0.0),
        maxsize: 1500,
    }
}
