//! Connection set and outbound fan-out
//!
//! The set is written from socket tasks (add, remove, inbound messages) and
//! read from the tick (broadcasts), so it sits behind a mutex. Connections
//! whose writer has gone away are pruned on the next broadcast.

use super::client_connection::{ClientConnection, Inbound};
use super::router::{Enqueued, IncomingRequest, RequestQueues, QUEUE_FULL};
use crate::interaction::{InputAction, InteractionZoneState};
use crate::protocol::{encode, ActionCode, HandPresenceEvent, InteractionZoneEvent, RawMessage, ServiceStatus};
use crate::tracking::HandPresence;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct ConnectionManager {
    connections: Mutex<HashMap<Uuid, ClientConnection>>,
    requests: Arc<RequestQueues>,
    /// Replayed to each client right after its handshake
    last_presence: Mutex<HandPresence>,
    config_healthy: AtomicBool,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::with_queues(Arc::new(RequestQueues::new()))
    }

    pub fn with_queues(requests: Arc<RequestQueues>) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            requests,
            last_presence: Mutex::new(HandPresence::HandsLost),
            config_healthy: AtomicBool::new(true),
        }
    }

    /// Queues the router drains
    pub fn requests(&self) -> &Arc<RequestQueues> {
        &self.requests
    }

    /// Register a socket whose writer task reads from `outbound`
    pub fn add_connection(&self, outbound: UnboundedSender<String>) -> Uuid {
        let id = Uuid::new_v4();
        let mut connections = self.connections.lock();
        connections.insert(id, ClientConnection::new(id, outbound));
        info!(client_id = %id, connections = connections.len(), "Client connected");
        id
    }

    pub fn remove_connection(&self, id: Uuid) {
        let mut connections = self.connections.lock();
        if let Some(mut connection) = connections.remove(&id) {
            connection.close();
            info!(client_id = %id, connections = connections.len(), "Client disconnected");
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn handshaked_count(&self) -> usize {
        self.connections.lock().values().filter(|c| c.is_handshaked()).count()
    }

    pub fn is_handshaked(&self, id: Uuid) -> bool {
        self.connections
            .lock()
            .get(&id)
            .map(ClientConnection::is_handshaked)
            .unwrap_or(false)
    }

    /// Whether handshakes succeed without the configuration warning
    pub fn set_config_healthy(&self, healthy: bool) {
        self.config_healthy.store(healthy, Ordering::Release);
    }

    /// Inbound text frame from client `id`
    pub fn on_message(&self, id: Uuid, text: &str) {
        let config_healthy = self.config_healthy.load(Ordering::Acquire);
        let mut connections = self.connections.lock();
        let Some(connection) = connections.get_mut(&id) else {
            warn!(client_id = %id, "Message from unknown connection");
            return;
        };

        match connection.receive(text, config_healthy) {
            Inbound::Handshaked => {
                let presence = *self.last_presence.lock();
                connection.send(ActionCode::HandPresenceEvent, &HandPresenceEvent { state: presence });
            }
            Inbound::Route(message) => self.route(connection, id, message),
            Inbound::Answered | Inbound::Malformed => {}
        }
    }

    fn route(&self, connection: &ClientConnection, id: Uuid, message: RawMessage) {
        let Some(action) = message.action_code() else {
            error!(client_id = %id, "Received a {} action. This action is not recognised.", message.action);
            return;
        };

        match self.requests.enqueue(IncomingRequest::new(id, action, message.content)) {
            Enqueued::Queued => return,
            Enqueued::Full(request) => {
                warn!(client_id = %id, action = %action, "Request queue full, rejecting request");
                match request.rejection(QUEUE_FULL) {
                    Ok(Some((reply_action, content))) => {
                        connection.send(reply_action, &content);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(client_id = %id, error = %e, "Could not build rejection"),
                }
                return;
            }
            Enqueued::Unroutable => {}
        }

        if action.expected_to_be_handled() {
            error!(client_id = %id, "Expected to be able to handle a {} action but unable to find queue.", action);
        } else {
            error!(client_id = %id, "Received a {} action. This action is not expected on the Service.", action);
        }
    }

    /// Reply to one client; false if it is gone
    pub fn send_to<T: Serialize>(&self, id: Uuid, action: ActionCode, content: &T) -> bool {
        match self.connections.lock().get(&id) {
            Some(connection) => connection.send(action, content),
            None => {
                warn!(client_id = %id, action = %action, "Reply for a client that has disconnected");
                false
            }
        }
    }

    /// Send to every handshaked client. Returns how many it reached.
    pub fn broadcast<T: Serialize>(&self, action: ActionCode, content: &T) -> usize {
        let text = match encode(action, content) {
            Ok(text) => text,
            Err(e) => {
                error!(action = %action, error = %e, "Failed to encode broadcast");
                return 0;
            }
        };

        let mut connections = self.connections.lock();
        let mut sent = 0;
        let mut closed = Vec::new();
        for (id, connection) in connections.iter() {
            if !connection.is_open() {
                closed.push(*id);
            } else if connection.is_handshaked() && connection.send_text(text.clone()) {
                sent += 1;
            }
        }
        for id in closed {
            connections.remove(&id);
            info!(client_id = %id, "Removed closed connection");
        }
        sent
    }

    pub fn send_input_action(&self, action: &InputAction) -> usize {
        self.broadcast(ActionCode::InputAction, &action.to_wire())
    }

    pub fn send_hand_presence(&self, presence: HandPresence) -> usize {
        *self.last_presence.lock() = presence;
        self.broadcast(ActionCode::HandPresenceEvent, &HandPresenceEvent { state: presence })
    }

    pub fn send_zone_event(&self, state: InteractionZoneState) -> usize {
        self.broadcast(ActionCode::InteractionZoneEvent, &InteractionZoneEvent { state })
    }

    pub fn send_service_status(&self, status: &ServiceStatus) -> usize {
        self.broadcast(ActionCode::ServiceStatus, status)
    }

    /// Drop every connection; their writer tasks end when the senders go
    pub fn close_all(&self) {
        let mut connections = self.connections.lock();
        for connection in connections.values_mut() {
            connection.close();
        }
        if !connections.is_empty() {
            info!(connections = connections.len(), "Closing all connections");
        }
        connections.clear();
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InteractionType;
    use crate::geometry::Vec2;
    use crate::connection::router::RequestCategory;
    use crate::interaction::InputType;
    use crate::positioning::Positions;
    use crate::time::Timestamp;
    use crate::tracking::{Chirality, HandType};
    use serde_json::{json, Value};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn handshake_text() -> String {
        json!({"action": "VERSION_HANDSHAKE", "content": {"requestID": "h", "TfApiVersion": "1.2.0"}}).to_string()
    }

    fn connect(manager: &ConnectionManager) -> (Uuid, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        (manager.add_connection(tx), rx)
    }

    fn next(rx: &mut UnboundedReceiver<String>) -> Option<Value> {
        rx.try_recv().ok().map(|text| serde_json::from_str(&text).unwrap())
    }

    fn action(input_type: InputType) -> InputAction {
        InputAction::new(
            Timestamp::from_millis(5),
            InteractionType::Push,
            HandType::Primary,
            Chirality::Right,
            input_type,
            Positions::new(Vec2::new(10.0, 20.0), 0.1),
            0.0,
        )
    }

    #[test]
    fn test_flooded_category_is_rejected() {
        let manager = ConnectionManager::with_queues(Arc::new(RequestQueues::with_capacity(2)));
        let (id, mut rx) = connect(&manager);
        manager.on_message(id, &handshake_text());
        while next(&mut rx).is_some() {}

        for n in 0..3 {
            let text = json!({"action": "REQUEST_SERVICE_STATUS", "content": {"requestID": format!("s{}", n)}});
            manager.on_message(id, &text.to_string());
        }

        assert_eq!(manager.requests().queue(RequestCategory::ServiceStatus).len(), 2);
        let reply = next(&mut rx).unwrap();
        assert_eq!(reply["action"], "SERVICE_STATUS_RESPONSE");
        assert_eq!(reply["content"]["status"], "Failure");
        assert_eq!(reply["content"]["requestID"], "s2");
        assert_eq!(reply["content"]["message"], QUEUE_FULL);
        assert!(next(&mut rx).is_none());
    }

    #[test]
    fn test_presence_replayed_after_handshake() {
        let manager = ConnectionManager::new();
        assert_eq!(manager.send_hand_presence(HandPresence::HandFound), 0);

        let (id, mut rx) = connect(&manager);
        manager.on_message(id, &handshake_text());

        assert_eq!(next(&mut rx).unwrap()["action"], "VERSION_HANDSHAKE_RESPONSE");
        let presence = next(&mut rx).unwrap();
        assert_eq!(presence["action"], "HAND_PRESENCE_EVENT");
        assert_eq!(presence["content"]["state"], "HAND_FOUND");
    }

    #[test]
    fn test_broadcast_skips_unhandshaked() {
        let manager = ConnectionManager::new();
        let (ready, mut ready_rx) = connect(&manager);
        let (_waiting, mut waiting_rx) = connect(&manager);
        manager.on_message(ready, &handshake_text());
        while next(&mut ready_rx).is_some() {}

        assert_eq!(manager.send_input_action(&action(InputType::Move)), 1);
        let sent = next(&mut ready_rx).unwrap();
        assert_eq!(sent["action"], "INPUT_ACTION");
        assert_eq!(sent["content"]["CursorPosition"]["x"], 10.0);
        assert!(next(&mut waiting_rx).is_none());
    }

    #[test]
    fn test_closed_connections_are_pruned() {
        let manager = ConnectionManager::new();
        let (id, rx) = connect(&manager);
        manager.on_message(id, &handshake_text());
        drop(rx);

        assert_eq!(manager.connection_count(), 1);
        assert_eq!(manager.send_zone_event(InteractionZoneState::HandEntered), 0);
        assert_eq!(manager.connection_count(), 0);
    }

    #[test]
    fn test_routing_after_handshake() {
        let manager = ConnectionManager::new();
        let (id, _rx) = connect(&manager);

        let request = json!({"action": "REQUEST_SERVICE_STATUS", "content": {"requestID": "s"}}).to_string();
        manager.on_message(id, &request);
        assert_eq!(manager.requests().pending(), 0);

        manager.on_message(id, &handshake_text());
        assert!(manager.is_handshaked(id));
        manager.on_message(id, &request);
        manager.on_message(id, &json!({"action": "QUICK_SETUP", "content": {}}).to_string());
        manager.on_message(id, &json!({"action": "NOT_A_CODE", "content": {}}).to_string());

        let queued = manager.requests().queue(RequestCategory::ServiceStatus).drain();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].client_id, id);
        assert_eq!(manager.requests().pending(), 0);
    }

    #[test]
    fn test_remove_and_close_all() {
        let manager = ConnectionManager::new();
        let (a, _rx_a) = connect(&manager);
        let (_b, _rx_b) = connect(&manager);
        manager.remove_connection(a);
        assert_eq!(manager.connection_count(), 1);
        assert!(!manager.send_to(a, ActionCode::ServiceStatus, &json!({})));
        manager.close_all();
        assert_eq!(manager.connection_count(), 0);
    }

    #[test]
    fn test_config_warning_follows_health() {
        let manager = ConnectionManager::new();
        manager.set_config_healthy(false);
        let (id, mut rx) = connect(&manager);
        manager.on_message(id, &handshake_text());
        let reply = next(&mut rx).unwrap();
        assert!(reply["content"]["message"]
            .as_str()
            .unwrap()
            .contains("Configuration is in a bad state"));
    }
}
