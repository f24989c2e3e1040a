/// Virtual time for the deterministic simulation.
///
/// Represents a logical timestamp with nanosecond resolution and no
/// dependency on `std::time`. Time advances only when the scheduler
/// dispatches events, never from wall-clock observation.
///
/// Scenario parameters are expressed in seconds as `f64`; they are rounded
/// to whole nanoseconds on the way in so event ordering stays a total order
/// over integers.

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// A point in simulated time, in nanoseconds since the start of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtualTime(u64);

impl VirtualTime {
    /// The zero-point of simulation time.
    pub const ZERO: VirtualTime = VirtualTime(0);

    /// Create a `VirtualTime` from a raw nanosecond value.
    #[inline]
    pub fn from_nanos(nanos: u64) -> Self {
        VirtualTime(nanos)
    }

    /// Convert seconds to virtual time, rounding to the nearest nanosecond.
    /// Negative and NaN inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !(secs > 0.0) {
            return VirtualTime::ZERO;
        }
        VirtualTime((secs * NANOS_PER_SEC).round() as u64)
    }

    /// Return the raw nanosecond value.
    #[inline]
    pub fn nanos(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC
    }

    /// Advance time by `delta` nanoseconds.
    /// Returns `None` on overflow.
    #[inline]
    pub fn advance(self, delta: u64) -> Option<VirtualTime> {
        self.0.checked_add(delta).map(VirtualTime)
    }

    /// Advance time by a duration given in seconds.
    pub fn plus_secs(self, secs: f64) -> Option<VirtualTime> {
        self.advance(VirtualTime::from_secs_f64(secs).0)
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: VirtualTime) -> bool {
        self.0 < other.0
    }

    /// Nanoseconds elapsed since `earlier`, or `None` if `earlier` is later.
    #[inline]
    pub fn duration_since(self, earlier: VirtualTime) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }
}

impl std::fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.9}s", self.as_secs_f64())
    }
}
