//! End-to-end tests over a real socket
//!
//! A feeder thread pushes hand frames, the tick driver runs on its own
//! thread, and a `ServiceClient` talks to the WebSocket server:
//! Feeder -> Ring buffer -> Service tick -> WebSocket -> ServiceClient

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::watch;
use touchfree_service::app::config::ServerSettings;
use touchfree_service::client::{ClientOptions, ReceiverUpdate, ServiceClient};
use touchfree_service::config::{ConfigManager, InteractionConfigPartial, InteractionType, MemoryStore};
use touchfree_service::connection::{ConnectionManager, WebSocketServer};
use touchfree_service::geometry::Vec3;
use touchfree_service::protocol::ApiVersion;
use touchfree_service::tracking::frame_buffer::FrameBuffer;
use touchfree_service::tracking::provider::{DeviceInfo, TrackingSettings};
use touchfree_service::tracking::{
    BufferedTrackingProvider, Chirality, HandFrame, HandPresence, HandSnapshot, TrackingServiceState,
};
use touchfree_service::{Error, InputType, Service, ServiceOptions, Timestamp};

struct Harness {
    url: String,
    stop: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    threads: Vec<JoinHandle<()>>,
}

impl Harness {
    async fn start() -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let (mut producer, consumer) = FrameBuffer::with_capacity(64).unwrap().split();
        let device = DeviceInfo {
            tracking_version: "test".to_string(),
            camera_serial: "SN-1".to_string(),
            camera_firmware_version: "1.0".to_string(),
        };
        let tracking = BufferedTrackingProvider::new(consumer, Arc::new(AtomicBool::new(true)), device);

        let connections = Arc::new(ConnectionManager::new());
        let settings = ServerSettings {
            port: 0,
            ..Default::default()
        };
        let server = WebSocketServer::new(settings, Arc::clone(&connections));
        let listener = server.bind().await.unwrap();
        let url = format!("ws://{}/connect", listener.local_addr().unwrap());
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        tokio::spawn(async move { server.serve(listener, &mut shutdown_rx).await });

        let service = Service::new(
            Box::new(tracking),
            ConfigManager::load(Arc::new(MemoryStore::new())),
            connections,
            ServiceOptions::default(),
        );
        let service_stop = Arc::clone(&stop);
        let ticker = thread::spawn(move || service.run(service_stop));

        let feeder_stop = Arc::clone(&stop);
        let feeder = thread::spawn(move || {
            while !feeder_stop.load(Ordering::Acquire) {
                let hand = HandSnapshot::at(1, Chirality::Right, Vec3::new(0.0, 0.2, 0.1));
                producer.push(HandFrame::new(Timestamp::now(), vec![hand]));
                thread::sleep(Duration::from_millis(8));
            }
        });

        Self {
            url,
            stop,
            shutdown,
            threads: vec![ticker, feeder],
        }
    }

    fn finish(self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.shutdown.send(true);
        for thread in self.threads {
            thread.join().unwrap();
        }
    }
}

/// Poll the client until `accept` takes an update, or give up after two
/// seconds
async fn wait_for(client: &ServiceClient, mut accept: impl FnMut(&ReceiverUpdate) -> bool) -> bool {
    for _ in 0..200 {
        if accept(&client.update()) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_receives_hand_input() {
    let harness = Harness::start().await;
    let client = ServiceClient::connect(&harness.url).await.unwrap();
    assert!(client.handshake().is_success());

    let mut found = false;
    let mut moved = false;
    let done = wait_for(&client, |update| {
        found |= update.presence == Some(HandPresence::HandFound);
        moved |= update
            .action
            .is_some_and(|a| a.input_type == InputType::Move && a.chirality == Chirality::Right);
        found && moved
    })
    .await;
    assert!(done, "found={} moved={}", found, moved);

    client.close().await;
    harness.finish();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_requests_round_trip() {
    let harness = Harness::start().await;
    let client = ServiceClient::connect(&harness.url).await.unwrap();

    let status = client.request_service_status().await.unwrap();
    assert_eq!(status.tracking_service_state, TrackingServiceState::Connected);
    assert_eq!(status.camera_serial, "SN-1");

    let change = InteractionConfigPartial {
        interaction_type: Some(InteractionType::Hover),
        deadzone_radius: Some(0.005),
        ..Default::default()
    };
    let response = client.set_configuration_state(Some(&change), None).await.unwrap();
    assert!(response.is_success(), "{}", response.message);

    let state = client.request_configuration_state().await.unwrap();
    assert_eq!(state.interaction.interaction_type, InteractionType::Hover);
    assert!((state.interaction.deadzone_radius - 0.005).abs() < 1e-6);

    let tracking = client
        .set_tracking_state(&TrackingSettings {
            camera_reversed: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(tracking.camera_reversed.unwrap().succeeded);
    assert!(tracking.mask.is_none());

    let tracking = client.request_tracking_state().await.unwrap();
    assert_eq!(tracking.camera_reversed.unwrap().content, Some(true));

    client.close().await;
    harness.finish();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_newer_client_is_turned_away() {
    let harness = Harness::start().await;
    let options = ClientOptions {
        api_version: ApiVersion::new(1, 3, 0),
        ..Default::default()
    };

    match ServiceClient::connect_with(&harness.url, options).await {
        Err(Error::Handshake(message)) => assert!(message.contains("Service is outdated")),
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("handshake should fail"),
    }
    harness.finish();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_service_shutdown_disconnects_client() {
    let harness = Harness::start().await;
    let client = ServiceClient::connect(&harness.url).await.unwrap();
    assert!(client.is_connected());

    harness.finish();

    let mut connected = true;
    for _ in 0..200 {
        connected = client.is_connected();
        if !connected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!connected);
    client.close().await;
}
