//! # TouchFree Service
//!
//! Turns hand-tracking frames into pointer-style input actions and streams
//! them to client applications over a versioned WebSocket protocol. The
//! service also owns interaction and physical configuration, which clients
//! read and change through the same protocol.
//!
//! ## Quick Start
//!
//! ```no_run
//! use touchfree_service::client::ServiceClient;
//!
//! # async fn run() -> touchfree_service::Result<()> {
//! let client = ServiceClient::connect("ws://127.0.0.1:9739/connect").await?;
//! let status = client.request_service_status().await?;
//! println!("tracking: {:?}", status.tracking_service_state);
//!
//! loop {
//!     let update = client.update();
//!     if let Some(action) = update.action {
//!         println!("{:?} at {:?}", action.input_type, action.cursor_position);
//!     }
//!     tokio::time::sleep(std::time::Duration::from_millis(16)).await;
//! }
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`time`]: Monotonic microsecond timestamps
//! - [`tracking`]: Hand frames, ring buffer, provider boundary, primary/secondary election
//! - [`positioning`]: Virtual screen, deadzone, one-euro filter, extrapolation
//! - [`interaction`]: Interaction modules and the engine that switches between them
//! - [`queue`]: Input action culling queue and per-category message queues
//! - [`config`]: Interaction/physical configuration, schema validation, persistence
//! - [`protocol`]: Action codes, message envelopes, API versioning
//! - [`connection`]: WebSocket server, handshake gating, request routing
//! - [`correlation`]: Request/response matching with expiry
//! - [`client`]: Consumer-side connection and receiver
//! - [`service`]: The tick driver tying it all together
//! - [`app`]: CLI and service settings
//!
//! ## Frame Pipeline
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  Tracking   │───▶│ Ring Buffer │───▶│    Hand     │───▶│  Position   │
//! │   source    │    │ (lock-free) │    │   Tracker   │    │  Pipeline   │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!                                                                 │
//!                                                                 ▼
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  WebSocket  │◀───│ Connection  │◀───│ Input Action│◀───│ Interaction │
//! │   clients   │    │   Manager   │    │    Queue    │    │   Engine    │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//! ```

pub mod time;
pub mod geometry;
pub mod tracking;
pub mod positioning;
pub mod interaction;
pub mod queue;
pub mod config;
pub mod protocol;
pub mod connection;
pub mod correlation;
pub mod client;
pub mod service;
pub mod app;

// Re-export commonly used types
pub use interaction::{InputAction, InputType};
pub use protocol::{ActionCode, API_VERSION};
pub use service::{Service, ServiceOptions};
pub use time::Timestamp;

/// Result type alias for the service
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tracking error: {0}")]
    Tracking(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("File access error: {0}")]
    FileAccess(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
