//! Client connections
//!
//! ```text
//! socket task ──▶ ConnectionManager::on_message ──▶ handshake gate
//!                                                     │
//!                                                     ▼
//!                                       RequestQueues (one per category)
//!                                                     │  tick
//!                                                     ▼
//!                                       MessageRouter ──▶ reply to client
//! ```

pub mod client_connection;
pub mod manager;
pub mod router;
pub mod server;

pub use client_connection::{ClientConnection, ConnectionState, Inbound};
pub use manager::ConnectionManager;
pub use router::{
    service_status, Enqueued, IncomingRequest, MessageRouter, RequestCategory, RequestQueues, RouterContext,
};
pub use server::{Acceptor, WebSocketServer};
