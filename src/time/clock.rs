//! Process-wide monotonic clock
//!
//! Wraps `std::time::Instant` behind a lazily initialised anchor so that
//! timestamps can be carried as plain `u64` microseconds through the
//! tracking ring buffer, the input action queue and the wire protocol.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Anchor instant, captured on first use
static ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Monotonic clock anchored at process start
#[derive(Debug, Clone, Copy)]
pub struct Clock;

impl Clock {
    /// Pin the anchor. Optional; the first call to `now_micros` does it too.
    pub fn init() {
        ANCHOR.get_or_init(Instant::now);
    }

    /// Microseconds elapsed since the anchor.
    #[inline]
    pub fn now_micros() -> u64 {
        let anchor = ANCHOR.get_or_init(Instant::now);
        anchor.elapsed().as_micros() as u64
    }

    /// Milliseconds elapsed since the anchor.
    #[inline]
    pub fn now_millis() -> u64 {
        Self::now_micros() / 1_000
    }
}

/// A point in time, in microseconds since the clock anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from raw microseconds.
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Create a timestamp from milliseconds.
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000)
    }

    /// Capture the current time.
    #[inline]
    pub fn now() -> Self {
        Self(Clock::now_micros())
    }

    /// Raw microsecond value.
    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000
    }

    /// Time elapsed since an earlier timestamp. Saturates at zero.
    #[inline]
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }

    /// Microseconds elapsed since an earlier timestamp, as a float in seconds.
    #[inline]
    pub fn secs_since(&self, earlier: Timestamp) -> f32 {
        self.0.saturating_sub(earlier.0) as f32 / 1_000_000.0
    }

    /// Timestamp shifted forward by a duration.
    #[inline]
    pub fn offset_by(&self, duration: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(duration.as_micros() as u64))
    }

    /// Check if this timestamp is after another.
    #[inline]
    pub fn is_after(&self, other: Timestamp) -> bool {
        self.0 > other.0
    }
}

impl serde::Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let micros = u64::deserialize(deserializer)?;
        Ok(Timestamp(micros))
    }
}

/// Stopwatch over explicit timestamps, so tick-driven logic stays
/// deterministic under test.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stopwatch {
    started: Option<Timestamp>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) at `now`.
    pub fn restart(&mut self, now: Timestamp) {
        self.started = Some(now);
    }

    pub fn stop(&mut self) {
        self.started = None;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Milliseconds since start, or zero when stopped.
    pub fn elapsed_millis(&self, now: Timestamp) -> u64 {
        self.started
            .map(|start| now.duration_since(start).as_millis() as u64)
            .unwrap_or(0)
    }

    /// True once the stopwatch has been running for at least `threshold_ms`.
    pub fn has_run_for(&self, now: Timestamp, threshold_ms: u64) -> bool {
        self.is_running() && self.elapsed_millis(now) >= threshold_ms
    }
}
