//! Tracking provider boundary
//!
//! The service never talks to tracking hardware directly. A
//! `TrackingProvider` supplies the newest frame each tick, reports
//! connectivity, and owns device-level settings such as the camera mask.

use super::frame_buffer::FrameConsumer;
use super::types::HandFrame;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Frames older than this are treated as "no hands"
pub const DEFAULT_STALE_AFTER_MS: u64 = 250;

/// Connectivity of the tracking collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingServiceState {
    /// No tracking service reachable
    Unavailable,
    /// Service reachable but no camera attached
    NoCamera,
    /// Service and camera both up
    Connected,
}

/// Static information about the tracking device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub tracking_version: String,
    pub camera_serial: String,
    pub camera_firmware_version: String,
}

/// Fraction of the camera image masked on each side
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskData {
    pub lower: f64,
    pub upper: f64,
    pub right: f64,
    pub left: f64,
}

/// Device-level tracking settings. Every field is optional so the same
/// type carries both full state and partial change requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<MaskData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_images: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_reversed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics_enabled: Option<bool>,
}

/// Outcome of applying a single tracking setting
pub type SettingOutcome = Result<(), String>;

/// Per-field outcome of `apply_tracking_settings`. `None` means the field
/// was not part of the request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingSettingsOutcome {
    pub mask: Option<SettingOutcome>,
    pub allow_images: Option<SettingOutcome>,
    pub camera_reversed: Option<SettingOutcome>,
    pub analytics_enabled: Option<SettingOutcome>,
}

/// Supplies hand frames and device state to the tick driver
pub trait TrackingProvider: Send {
    /// Newest frame, or `None` when tracking is unavailable
    fn latest_frame(&mut self, now: Timestamp) -> Option<HandFrame>;

    fn service_state(&self) -> TrackingServiceState;

    fn device_info(&self) -> DeviceInfo;

    fn tracking_settings(&self) -> TrackingSettings;

    fn apply_tracking_settings(&mut self, changes: &TrackingSettings) -> TrackingSettingsOutcome;

    /// Begin consuming frames; called when the first client connects
    fn connect(&mut self) {}

    /// Stop consuming frames; called when the last client leaves
    fn disconnect(&mut self) {}
}

/// Provider fed through the lock-free frame buffer.
///
/// Holds the last frame between source pushes so a tick that lands between
/// two device frames still sees the hands, but drops it once it goes stale.
pub struct BufferedTrackingProvider {
    consumer: FrameConsumer,
    source_connected: Arc<AtomicBool>,
    consuming: bool,
    last_frame: Option<HandFrame>,
    last_received: Timestamp,
    stale_after_ms: u64,
    settings: TrackingSettings,
    device: DeviceInfo,
}

impl BufferedTrackingProvider {
    pub fn new(consumer: FrameConsumer, source_connected: Arc<AtomicBool>, device: DeviceInfo) -> Self {
        Self {
            consumer,
            source_connected,
            consuming: true,
            last_frame: None,
            last_received: Timestamp::default(),
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
            settings: TrackingSettings {
                mask: Some(MaskData::default()),
                allow_images: Some(false),
                camera_reversed: Some(false),
                analytics_enabled: Some(false),
            },
            device,
        }
    }

    pub fn with_stale_after(mut self, stale_after_ms: u64) -> Self {
        self.stale_after_ms = stale_after_ms;
        self
    }
}

impl TrackingProvider for BufferedTrackingProvider {
    fn latest_frame(&mut self, now: Timestamp) -> Option<HandFrame> {
        if !self.source_connected.load(Ordering::Acquire) {
            self.last_frame = None;
            return None;
        }

        // Always drain so the ring never fills while nobody is listening
        let fresh = self.consumer.pop_latest();
        if !self.consuming {
            return None;
        }

        if let Some(slot) = fresh {
            self.last_frame = Some(slot.frame);
            self.last_received = now;
        }

        if now.duration_since(self.last_received).as_millis() as u64 > self.stale_after_ms {
            return Some(HandFrame::empty(now));
        }

        self.last_frame.clone()
    }

    fn service_state(&self) -> TrackingServiceState {
        if self.source_connected.load(Ordering::Acquire) {
            TrackingServiceState::Connected
        } else {
            TrackingServiceState::Unavailable
        }
    }

    fn device_info(&self) -> DeviceInfo {
        self.device.clone()
    }

    fn tracking_settings(&self) -> TrackingSettings {
        self.settings.clone()
    }

    fn apply_tracking_settings(&mut self, changes: &TrackingSettings) -> TrackingSettingsOutcome {
        let mut outcome = TrackingSettingsOutcome::default();

        if let Some(mask) = changes.mask {
            let in_range = [mask.lower, mask.upper, mask.left, mask.right]
                .iter()
                .all(|v| (0.0..=1.0).contains(v));
            outcome.mask = Some(if in_range {
                self.settings.mask = Some(mask);
                Ok(())
            } else {
                Err("Mask values must be between 0 and 1".to_string())
            });
        }
        if let Some(v) = changes.allow_images {
            self.settings.allow_images = Some(v);
            outcome.allow_images = Some(Ok(()));
        }
        if let Some(v) = changes.camera_reversed {
            self.settings.camera_reversed = Some(v);
            outcome.camera_reversed = Some(Ok(()));
        }
        if let Some(v) = changes.analytics_enabled {
            self.settings.analytics_enabled = Some(v);
            outcome.analytics_enabled = Some(Ok(()));
        }

        outcome
    }

    fn connect(&mut self) {
        self.consuming = true;
    }

    fn disconnect(&mut self) {
        self.consuming = false;
        self.last_frame = None;
    }
}
