//! Hand tracking input
//!
//! Frames arrive from a tracking source through a lock-free ring buffer,
//! are read once per tick through the `TrackingProvider` boundary, and the
//! `HandTracker` decides which hand is primary.

pub mod types;
pub mod frame_buffer;
pub mod hand_tracker;
pub mod provider;
pub mod recording;

pub use types::*;
pub use frame_buffer::FrameBuffer;
pub use hand_tracker::{HandPresence, HandTracker, HandUpdate};
pub use provider::{BufferedTrackingProvider, TrackingProvider, TrackingServiceState};
pub use recording::{HandRecording, ReplaySource};
