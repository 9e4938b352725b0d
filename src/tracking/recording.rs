//! Hand frame recordings
//!
//! A recording is a JSON file of `HandFrame`s plus metadata. The replay
//! source pushes those frames into the frame buffer from its own thread at
//! the recorded rate, which stands in for a live tracking device.

use super::frame_buffer::FrameProducer;
use super::types::HandFrame;
use crate::time::Timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Current on-disk format version
pub const CURRENT_FORMAT_VERSION: u32 = 1;

/// Recording metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub name: String,
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    /// Rate frames are replayed at
    pub frame_rate_hz: u32,
}

fn default_format_version() -> u32 {
    CURRENT_FORMAT_VERSION
}

/// A sequence of tracking frames
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandRecording {
    pub metadata: RecordingMetadata,
    pub frames: Vec<HandFrame>,
}

impl HandRecording {
    pub fn new(name: String, frame_rate_hz: u32) -> Self {
        Self {
            metadata: RecordingMetadata {
                name,
                format_version: CURRENT_FORMAT_VERSION,
                created_at: Utc::now(),
                frame_rate_hz,
            },
            frames: Vec::new(),
        }
    }

    pub fn push(&mut self, frame: HandFrame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let recording: HandRecording = serde_json::from_str(&content)?;
        if recording.metadata.format_version != CURRENT_FORMAT_VERSION {
            warn!(
                name = %recording.metadata.name,
                found = recording.metadata.format_version,
                expected = CURRENT_FORMAT_VERSION,
                "Recording has different format version; some fields may use default values"
            );
        }
        if recording.metadata.frame_rate_hz == 0 {
            return Err(crate::Error::Tracking(format!(
                "recording '{}' has a zero frame rate",
                recording.metadata.name
            )));
        }
        Ok(recording)
    }
}

/// Background thread replaying a recording into the frame buffer
pub struct ReplaySource {
    stop: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReplaySource {
    /// Start replaying. Frames are re-stamped with the live clock as they
    /// are pushed. With `looping` the recording restarts when it ends;
    /// otherwise the source reports disconnected after the last frame.
    pub fn start(recording: HandRecording, mut producer: FrameProducer, looping: bool) -> crate::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let connected = Arc::new(AtomicBool::new(true));
        let interval = Duration::from_micros(1_000_000 / recording.metadata.frame_rate_hz.max(1) as u64);

        let thread_stop = Arc::clone(&stop);
        let thread_connected = Arc::clone(&connected);
        let handle = std::thread::Builder::new()
            .name("tf-replay".to_string())
            .spawn(move || {
                info!(
                    name = %recording.metadata.name,
                    frames = recording.len(),
                    "Replaying hand recording"
                );
                'replay: loop {
                    for frame in &recording.frames {
                        if thread_stop.load(Ordering::Acquire) || producer.is_abandoned() {
                            break 'replay;
                        }
                        let mut live = frame.clone();
                        live.timestamp = Timestamp::now();
                        if !producer.push(live) {
                            debug!("Frame buffer full, frame dropped");
                        }
                        std::thread::sleep(interval);
                    }
                    if !looping {
                        break;
                    }
                }
                thread_connected.store(false, Ordering::Release);
                info!("Replay finished");
            })?;

        Ok(Self {
            stop,
            connected,
            handle: Some(handle),
        })
    }

    /// Flag shared with the provider; false once replay has ended
    pub fn connected_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.connected)
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Replay thread panicked");
            }
        }
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;
    use crate::tracking::frame_buffer::FrameBuffer;
    use crate::tracking::types::{Chirality, HandSnapshot};
    use tempfile::TempDir;

    fn sample_recording(frames: usize) -> HandRecording {
        let mut recording = HandRecording::new("sample".to_string(), 200);
        for i in 0..frames {
            recording.push(HandFrame::new(
                Timestamp::from_millis(i as u64 * 5),
                vec![HandSnapshot::at(1, Chirality::Right, Vec3::new(0.0, 0.2, i as f32 * 0.01))],
            ));
        }
        recording
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("hands.json");

        let recording = sample_recording(3);
        recording.save(&path).expect("Failed to save");

        let loaded = HandRecording::load(&path).expect("Failed to load");
        assert_eq!(loaded.metadata.name, "sample");
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.frames[2].hands[0].palm_position.z, 0.02);
    }

    #[test]
    fn test_load_rejects_zero_rate() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("bad.json");

        let mut recording = sample_recording(1);
        recording.metadata.frame_rate_hz = 0;
        recording.save(&path).unwrap();

        assert!(HandRecording::load(&path).is_err());
    }

    #[test]
    fn test_replay_pushes_frames_then_disconnects() {
        let (producer, mut consumer) = FrameBuffer::with_capacity(64).unwrap().split();
        let mut source = ReplaySource::start(sample_recording(5), producer, false).unwrap();
        let connected = source.connected_flag();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while connected.load(Ordering::Acquire) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        source.stop();

        assert!(!connected.load(Ordering::Acquire));
        let mut received = 0;
        while consumer.pop().is_some() {
            received += 1;
        }
        assert_eq!(received, 5);
    }
}
