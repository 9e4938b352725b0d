//! Monotonic timing shared by the tick driver, tracking frames and
//! request correlation.
//!
//! All timestamps are microseconds since the process-wide clock anchor,
//! so they are comparable across threads and never go backward.

pub mod clock;

pub use clock::{Clock, Stopwatch, Timestamp};
