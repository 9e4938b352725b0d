//! Tick driver
//!
//! One thread owns every piece of per-frame state and advances it at a
//! fixed rate:
//!
//! ```text
//! config changes ─▶ tracking frame ─▶ HandTracker ─▶ InteractionEngine ─▶ InputActionQueue ─▶ clients
//!                                          │                 │
//!                                          ▼                 ▼
//!                                   HAND_PRESENCE     INTERACTION_ZONE
//!
//! then: one request per category from the router queues
//! every Nth tick: SERVICE_STATUS if tracking or config state changed
//! ```
//!
//! Socket tasks never touch this state; they only fill the request queues.

use crate::app::config::Settings;
use crate::config::{ConfigManager, ConfigurationState, InteractionConfig, PhysicalConfig};
use crate::connection::{service_status, ConnectionManager, MessageRouter, RouterContext};
use crate::interaction::{InputType, InteractionEngine, InteractionZoneState};
use crate::positioning::{PositionTuning, TrackingTransform, VirtualScreen};
use crate::queue::InputActionQueue;
use crate::time::Timestamp;
use crate::tracking::{HandPresence, HandTracker, HandType, TrackingProvider, TrackingServiceState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceOptions {
    pub tick_period: Duration,
    /// Status is checked every this many ticks
    pub slow_update_divisor: u32,
    pub input_cull_to_count: usize,
    pub tuning: PositionTuning,
}

impl ServiceOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            tick_period: settings.tick.period(),
            slow_update_divisor: settings.tick.slow_update_divisor.max(1),
            input_cull_to_count: settings.queues.input_cull_to_count,
            tuning: settings.tuning,
        }
    }
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub hands: usize,
    pub presence: Option<HandPresence>,
    pub zone_event: Option<InteractionZoneState>,
    /// Type of the input action sent to clients, if any
    pub dispatched: Option<InputType>,
    pub requests_handled: usize,
    pub status_broadcast: bool,
}

pub struct Service {
    tracking: Box<dyn TrackingProvider>,
    config: ConfigManager,
    connections: Arc<ConnectionManager>,

    hand_tracker: HandTracker,
    engine: InteractionEngine,
    input_queue: InputActionQueue,
    transform: TrackingTransform,

    interaction_rx: watch::Receiver<InteractionConfig>,
    physical_rx: watch::Receiver<PhysicalConfig>,

    options: ServiceOptions,
    tick_count: u64,
    tracking_connected: bool,
    last_status: Option<(TrackingServiceState, ConfigurationState)>,
}

impl Service {
    /// Tracking stays idle until the first client connects
    pub fn new(
        mut tracking: Box<dyn TrackingProvider>,
        config: ConfigManager,
        connections: Arc<ConnectionManager>,
        options: ServiceOptions,
    ) -> Self {
        tracking.disconnect();
        let interaction = config.interaction();
        let physical = config.physical();
        let engine = InteractionEngine::new(&interaction, VirtualScreen::from_config(&physical), options.tuning);
        let interaction_rx = config.subscribe_interaction();
        let physical_rx = config.subscribe_physical();

        Self {
            tracking,
            config,
            connections,
            hand_tracker: HandTracker::new(),
            engine,
            input_queue: InputActionQueue::with_cull_to_count(options.input_cull_to_count),
            transform: TrackingTransform::from_config(&physical),
            interaction_rx,
            physical_rx,
            options,
            tick_count: 0,
            tracking_connected: false,
            last_status: None,
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn engine(&self) -> &InteractionEngine {
        &self.engine
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Advance everything by one frame
    pub fn tick(&mut self, now: Timestamp) -> TickReport {
        let mut report = TickReport::default();

        self.apply_config_changes();
        self.update_tracking_demand();

        let frame = self
            .tracking
            .latest_frame(now)
            .map(|frame| self.transform.apply_frame(&frame));
        report.hands = frame.as_ref().map_or(0, |f| f.hand_count());

        let hands = self.hand_tracker.update(frame.as_ref());
        if let Some(presence) = hands.presence {
            debug!(presence = ?presence, "Hand presence changed");
            self.connections.send_hand_presence(presence);
            report.presence = Some(presence);
        }

        let output = self.engine.update(hands.primary.as_ref(), HandType::Primary, now);
        if let Some(state) = output.zone_event {
            self.connections.send_zone_event(state);
            report.zone_event = Some(state);
        }
        if let Some(action) = output.action {
            self.input_queue.push(action);
        }

        if let Some(action) = self.input_queue.pop_next() {
            self.connections.send_input_action(&action);
            report.dispatched = Some(action.input_type);
        }

        let requests = Arc::clone(self.connections.requests());
        report.requests_handled = MessageRouter::drain(
            &requests,
            &mut RouterContext {
                config: &mut self.config,
                tracking: self.tracking.as_mut(),
                connections: &self.connections,
            },
        );

        if self.tick_count % u64::from(self.options.slow_update_divisor) == 0 {
            report.status_broadcast = self.slow_update();
        }

        self.tick_count += 1;
        report
    }

    fn apply_config_changes(&mut self) {
        if self.interaction_rx.has_changed().unwrap_or(false) {
            let interaction = self.interaction_rx.borrow_and_update().clone();
            self.engine.apply_interaction_config(&interaction);
        }

        if self.physical_rx.has_changed().unwrap_or(false) {
            let physical = self.physical_rx.borrow_and_update().clone();
            self.transform = TrackingTransform::from_config(&physical);
            self.engine.set_screen(VirtualScreen::from_config(&physical));

            let healthy = physical.is_valid();
            if !healthy {
                warn!(
                    width_px = physical.screen_width_px,
                    height_px = physical.screen_height_px,
                    "Physical config has invalid screen dimensions"
                );
            }
            self.connections.set_config_healthy(healthy);
        }
    }

    /// Frames are only consumed while at least one client is connected
    fn update_tracking_demand(&mut self) {
        let wanted = self.connections.connection_count() > 0;
        if wanted == self.tracking_connected {
            return;
        }

        if wanted {
            info!("First client connected, starting tracking");
            self.tracking.connect();
        } else {
            info!("Last client left, stopping tracking");
            self.tracking.disconnect();
            self.hand_tracker.reset();
            self.input_queue.clear();
        }
        self.tracking_connected = wanted;
    }

    /// Broadcast status when tracking or config state moved
    fn slow_update(&mut self) -> bool {
        let current = (self.tracking.service_state(), self.config.configuration_state());
        if self.last_status == Some(current) {
            return false;
        }

        let first = self.last_status.is_none();
        self.last_status = Some(current);
        if first {
            return false;
        }

        info!(tracking = ?current.0, configuration = ?current.1, "Service status changed");
        let status = service_status("", self.tracking.as_ref(), &self.config);
        self.connections.send_service_status(&status);
        true
    }

    /// Tick at the configured rate until `stop` is set
    pub fn run(mut self, stop: Arc<AtomicBool>) {
        let period = self.options.tick_period;
        info!(period_ms = period.as_secs_f64() * 1000.0, "Tick driver started");

        let mut next = Instant::now();
        while !stop.load(Ordering::Acquire) {
            self.tick(Timestamp::now());

            next += period;
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            } else {
                // Overran; don't try to catch up
                next = now;
            }
        }

        self.shutdown();
    }

    pub fn shutdown(&mut self) {
        if self.tracking_connected {
            self.tracking.disconnect();
            self.tracking_connected = false;
        }
        self.connections.close_all();
        info!(ticks = self.tick_count, "Tick driver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFileKind, InteractionType, MemoryStore};
    use crate::geometry::Vec3;
    use crate::tracking::frame_buffer::{FrameBuffer, FrameProducer};
    use crate::tracking::provider::DeviceInfo;
    use crate::tracking::{BufferedTrackingProvider, Chirality, HandFrame, HandSnapshot};
    use serde_json::{json, Value};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use uuid::Uuid;

    struct Fixture {
        service: Service,
        producer: FrameProducer,
        source_connected: Arc<AtomicBool>,
        store: Arc<MemoryStore>,
    }

    fn fixture(interaction_type: InteractionType) -> Fixture {
        let interaction = InteractionConfig {
            interaction_type,
            ..Default::default()
        };
        let store = Arc::new(MemoryStore::new().with_file(
            ConfigFileKind::Interaction,
            serde_json::to_string(&interaction).unwrap(),
        ));
        let config = ConfigManager::load(store.clone());

        let (producer, consumer) = FrameBuffer::with_capacity(16).unwrap().split();
        let source_connected = Arc::new(AtomicBool::new(true));
        let tracking = BufferedTrackingProvider::new(consumer, Arc::clone(&source_connected), DeviceInfo::default());

        let service = Service::new(
            Box::new(tracking),
            config,
            Arc::new(ConnectionManager::new()),
            ServiceOptions::default(),
        );
        Fixture {
            service,
            producer,
            source_connected,
            store,
        }
    }

    fn client(service: &Service) -> (Uuid, UnboundedReceiver<String>) {
        let (tx, mut rx) = unbounded_channel();
        let id = service.connections().add_connection(tx);
        let handshake = json!({"action": "VERSION_HANDSHAKE", "content": {"requestID": "h", "TfApiVersion": "1.2.0"}});
        service.connections().on_message(id, &handshake.to_string());
        while rx.try_recv().is_ok() {}
        (id, rx)
    }

    fn received(rx: &mut UnboundedReceiver<String>) -> Vec<Value> {
        let mut messages = Vec::new();
        while let Ok(text) = rx.try_recv() {
            messages.push(serde_json::from_str(&text).unwrap());
        }
        messages
    }

    fn hand_frame(ms: u64) -> HandFrame {
        HandFrame::new(
            Timestamp::from_millis(ms),
            vec![HandSnapshot::at(1, Chirality::Right, Vec3::new(0.0, 0.2, 0.1))],
        )
    }

    #[test]
    fn test_options_from_settings() {
        let mut settings = Settings::default();
        settings.tick.rate_hz = 30;
        settings.queues.input_cull_to_count = 5;
        let options = ServiceOptions::from_settings(&settings);
        assert_eq!(options.input_cull_to_count, 5);
        assert!((options.tick_period.as_secs_f64() - 1.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_hand_reaches_client_as_input_action() {
        let mut f = fixture(InteractionType::Grab);
        let (_id, mut rx) = client(&f.service);

        f.producer.push(hand_frame(0));
        let report = f.service.tick(Timestamp::from_millis(0));
        assert_eq!(report.hands, 1);
        assert_eq!(report.presence, Some(HandPresence::HandFound));
        assert_eq!(report.dispatched, Some(InputType::Move));

        let messages = received(&mut rx);
        let actions: Vec<&str> = messages.iter().map(|m| m["action"].as_str().unwrap()).collect();
        assert_eq!(actions, vec!["HAND_PRESENCE_EVENT", "INPUT_ACTION"]);
        let flags = messages[1]["content"]["InteractionFlags"].as_u64().unwrap();
        // RIGHT | PRIMARY | MOVE | GRAB
        assert_eq!(flags, 2 | 4 | 128 | 512);
    }

    #[test]
    fn test_losing_hands_broadcasts_presence_once() {
        let mut f = fixture(InteractionType::Grab);
        let (_id, mut rx) = client(&f.service);

        f.producer.push(hand_frame(0));
        f.service.tick(Timestamp::from_millis(0));
        received(&mut rx);

        f.producer.push(HandFrame::empty(Timestamp::from_millis(16)));
        let report = f.service.tick(Timestamp::from_millis(16));
        assert_eq!(report.presence, Some(HandPresence::HandsLost));
        let report = f.service.tick(Timestamp::from_millis(32));
        assert_eq!(report.presence, None);

        let presence: Vec<Value> = received(&mut rx)
            .into_iter()
            .filter(|m| m["action"] == "HAND_PRESENCE_EVENT")
            .collect();
        assert_eq!(presence.len(), 1);
        assert_eq!(presence[0]["content"]["state"], "HANDS_LOST");
    }

    #[test]
    fn test_no_clients_means_no_tracking() {
        let mut f = fixture(InteractionType::Grab);
        f.producer.push(hand_frame(0));
        let report = f.service.tick(Timestamp::from_millis(0));
        assert_eq!(report.hands, 0);
        assert!(report.dispatched.is_none());
    }

    #[test]
    fn test_config_change_switches_module() {
        let mut f = fixture(InteractionType::Grab);
        let (id, mut rx) = client(&f.service);

        let request = json!({
            "action": "SET_CONFIGURATION_STATE",
            "content": {"requestID": "c1", "interaction": {"InteractionType": "HOVER"}}
        });
        f.service.connections().on_message(id, &request.to_string());

        let report = f.service.tick(Timestamp::from_millis(0));
        assert_eq!(report.requests_handled, 1);
        let reply = received(&mut rx)
            .into_iter()
            .find(|m| m["action"] == "CONFIGURATION_RESPONSE")
            .unwrap();
        assert_eq!(reply["content"]["status"], "Success");

        // Applied at the start of the next tick
        f.service.tick(Timestamp::from_millis(16));
        assert_eq!(f.service.engine().active_type(), InteractionType::Hover);
        assert_eq!(f.service.config().interaction().interaction_type, InteractionType::Hover);
        assert!(f.store.contents(ConfigFileKind::Interaction).is_some());
    }

    #[test]
    fn test_invalid_screen_sets_handshake_warning() {
        let mut f = fixture(InteractionType::Grab);
        let (id, mut rx) = client(&f.service);
        let request = json!({
            "action": "SET_CONFIGURATION_STATE",
            "content": {"requestID": "c2", "physical": {"ScreenWidthPX": 0}}
        });
        f.service.connections().on_message(id, &request.to_string());
        f.service.tick(Timestamp::from_millis(0));
        f.service.tick(Timestamp::from_millis(16));
        received(&mut rx);

        let (tx, mut late_rx) = unbounded_channel();
        let late = f.service.connections().add_connection(tx);
        let handshake = json!({"action": "VERSION_HANDSHAKE", "content": {"requestID": "h2", "TfApiVersion": "1.2.0"}});
        f.service.connections().on_message(late, &handshake.to_string());
        let reply = received(&mut late_rx).remove(0);
        assert!(reply["content"]["message"]
            .as_str()
            .unwrap()
            .contains("Configuration is in a bad state"));
    }

    #[test]
    fn test_status_broadcast_on_tracking_change() {
        let mut f = fixture(InteractionType::Grab);
        let (_id, mut rx) = client(&f.service);

        for t in 0..4 {
            assert!(!f.service.tick(Timestamp::from_millis(t * 16)).status_broadcast);
        }
        f.source_connected.store(false, Ordering::Release);

        let mut broadcast = false;
        for t in 4..8 {
            broadcast |= f.service.tick(Timestamp::from_millis(t * 16)).status_broadcast;
        }
        assert!(broadcast);

        let status = received(&mut rx)
            .into_iter()
            .find(|m| m["action"] == "SERVICE_STATUS")
            .unwrap();
        assert_eq!(status["content"]["trackingServiceState"], "UNAVAILABLE");
    }

    #[test]
    fn test_run_stops_on_flag() {
        let f = fixture(InteractionType::Push);
        let connections = Arc::clone(f.service.connections());
        let (_id, _rx) = client(&f.service);
        let stop = Arc::new(AtomicBool::new(true));
        f.service.run(stop);
        assert_eq!(connections.connection_count(), 0);
    }
}
