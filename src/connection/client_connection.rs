//! One connected client
//!
//! A connection starts out waiting for its handshake. Until a compatible
//! `VERSION_HANDSHAKE` arrives, every other request is answered with a
//! failure and dropped. Outbound text goes through an unbounded channel to
//! the socket's writer task, so sending never blocks the tick.

use crate::interaction::WireInputAction;
use crate::protocol::{
    encode, ActionCode, ApiVersion, Compatibility, RawMessage, ResponseToClient, API_HEADER_NAME, API_VERSION,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const MISSING_REQUEST_ID: &str = "Handshaking failed. This is due to a missing or invalid requestID";
pub const HANDSHAKE_REQUIRED: &str = "Request Rejected: Requests cannot be processed until handshaking is complete.";
pub const NO_API_VERSION: &str = "Handshaking Failed: No API Version supplied.";
/// Appended to handshake replies while the physical config cannot be used
pub const CONFIG_WARNING: &str = " Configuration is in a bad state. Please update the configuration via TouchFree Settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    HandshakeAwaited,
    Handshaked,
    Closed,
}

/// What became of one inbound text frame
#[derive(Debug)]
pub enum Inbound {
    /// The handshake succeeded with this message
    Handshaked,
    /// Answered directly; nothing to route
    Answered,
    /// Post-handshake request for the router
    Route(RawMessage),
    /// Not a message envelope at all
    Malformed,
}

#[derive(Debug)]
pub struct ClientConnection {
    id: Uuid,
    outbound: UnboundedSender<String>,
    state: ConnectionState,
    api_version: ApiVersion,
}

impl ClientConnection {
    pub fn new(id: Uuid, outbound: UnboundedSender<String>) -> Self {
        Self {
            id,
            outbound,
            state: ConnectionState::HandshakeAwaited,
            api_version: API_VERSION,
        }
    }

    /// Compare handshakes against `version` instead of this build's
    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = version;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_handshaked(&self) -> bool {
        self.state == ConnectionState::Handshaked
    }

    /// False once closed or once the writer task has gone away
    pub fn is_open(&self) -> bool {
        self.state != ConnectionState::Closed && !self.outbound.is_closed()
    }

    pub fn close(&mut self) {
        if self.state != ConnectionState::Closed {
            debug!(client_id = %self.id, "Connection closed");
        }
        self.state = ConnectionState::Closed;
    }

    /// Queue a pre-encoded frame; false if the socket is gone
    pub fn send_text(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    pub fn send<T: Serialize>(&self, action: ActionCode, content: &T) -> bool {
        match encode(action, content) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                error!(client_id = %self.id, action = %action, error = %e, "Failed to encode message");
                false
            }
        }
    }

    /// Nothing is sent before the handshake completes
    pub fn send_input_action(&self, action: &WireInputAction) -> bool {
        if !self.is_handshaked() {
            return false;
        }
        self.send(ActionCode::InputAction, action)
    }

    /// Interpret one inbound text frame. `config_healthy` decides whether a
    /// successful handshake carries the configuration warning.
    pub fn receive(&mut self, text: &str, config_healthy: bool) -> Inbound {
        let message = match RawMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(client_id = %self.id, error = %e, "Dropping malformed message");
                return Inbound::Malformed;
            }
        };

        match self.state {
            ConnectionState::Handshaked => Inbound::Route(message),
            ConnectionState::HandshakeAwaited => self.process_handshake(&message, config_healthy),
            ConnectionState::Closed => Inbound::Answered,
        }
    }

    fn process_handshake(&mut self, message: &RawMessage, config_healthy: bool) -> Inbound {
        let original = message.content.to_string();

        let Some(request_id) = message.request_id() else {
            self.handshake_failure(ResponseToClient::failure("", MISSING_REQUEST_ID, original));
            return Inbound::Answered;
        };

        if message.action_code() != Some(ActionCode::VersionHandshake) {
            self.handshake_failure(ResponseToClient::failure(request_id, HANDSHAKE_REQUIRED, original));
            return Inbound::Answered;
        }

        let Some(version) = message.content.get(API_HEADER_NAME).and_then(Value::as_str) else {
            self.handshake_failure(ResponseToClient::failure(request_id, NO_API_VERSION, original));
            return Inbound::Answered;
        };

        let client_version = match version.parse::<ApiVersion>() {
            Ok(v) => v,
            Err(e) => {
                let text = format!("Handshaking Failed: {}", e);
                self.handshake_failure(ResponseToClient::failure(request_id, text, original));
                return Inbound::Answered;
            }
        };

        let compatibility = Compatibility::check(client_version, self.api_version);
        let warning = if config_healthy { "" } else { CONFIG_WARNING };
        let text = format!("{}{}", compatibility.message(), warning);

        if compatibility.is_compatible() {
            self.state = ConnectionState::Handshaked;
            info!(client_id = %self.id, client_version = %client_version, "{}", text);
            self.send(
                ActionCode::VersionHandshakeResponse,
                &ResponseToClient::success(request_id, text, original),
            );
            Inbound::Handshaked
        } else {
            self.handshake_failure(ResponseToClient::failure(request_id, text, original));
            Inbound::Answered
        }
    }

    fn handshake_failure(&self, response: ResponseToClient) {
        warn!(client_id = %self.id, "{}", response.message);
        self.send(ActionCode::VersionHandshakeResponse, &response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResponseStatus;
    use serde_json::json;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn connection() -> (ClientConnection, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        (ClientConnection::new(Uuid::new_v4(), tx), rx)
    }

    fn reply(rx: &mut UnboundedReceiver<String>) -> Value {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    fn handshake(version: &str) -> String {
        json!({
            "action": "VERSION_HANDSHAKE",
            "content": {"requestID": "hs-1", "TfApiVersion": version}
        })
        .to_string()
    }

    #[test]
    fn test_successful_handshake() {
        let (mut conn, mut rx) = connection();
        assert!(matches!(conn.receive(&handshake("1.2.0"), true), Inbound::Handshaked));
        assert!(conn.is_handshaked());

        let value = reply(&mut rx);
        assert_eq!(value["action"], "VERSION_HANDSHAKE_RESPONSE");
        assert_eq!(value["content"]["status"], "Success");
        assert_eq!(value["content"]["requestID"], "hs-1");
        assert_eq!(value["content"]["message"], "Handshake Successful.");
    }

    #[test]
    fn test_requests_before_handshake_are_rejected() {
        let (mut conn, mut rx) = connection();
        let request = json!({
            "action": "REQUEST_CONFIGURATION_STATE",
            "content": {"requestID": "c-1"}
        })
        .to_string();

        assert!(matches!(conn.receive(&request, true), Inbound::Answered));
        assert!(!conn.is_handshaked());

        let value = reply(&mut rx);
        assert_eq!(value["action"], "VERSION_HANDSHAKE_RESPONSE");
        assert_eq!(value["content"]["status"], "Failure");
        assert_eq!(value["content"]["requestID"], "c-1");
        assert_eq!(value["content"]["message"], HANDSHAKE_REQUIRED);
    }

    #[test]
    fn test_missing_request_id() {
        let (mut conn, mut rx) = connection();
        let text = json!({"action": "VERSION_HANDSHAKE", "content": {"TfApiVersion": "1.2.0"}}).to_string();
        conn.receive(&text, true);
        let value = reply(&mut rx);
        assert_eq!(value["content"]["message"], MISSING_REQUEST_ID);
        assert_eq!(value["content"]["requestID"], "");
        assert!(!conn.is_handshaked());
    }

    #[test]
    fn test_missing_version() {
        let (mut conn, mut rx) = connection();
        let text = json!({"action": "VERSION_HANDSHAKE", "content": {"requestID": "x"}}).to_string();
        conn.receive(&text, true);
        assert_eq!(reply(&mut rx)["content"]["message"], NO_API_VERSION);
    }

    #[test]
    fn test_incompatible_versions_stay_gated() {
        for (version, message) in [
            ("1.1.0", "Handshake Failed: Client is outdated relative to Service."),
            ("1.3.0", "Handshake Failed: Service is outdated relative to Client."),
            ("1.2.5", "Handshake Failed: Service is outdated relative to Client."),
        ] {
            let (mut conn, mut rx) = connection();
            assert!(matches!(conn.receive(&handshake(version), true), Inbound::Answered));
            assert!(!conn.is_handshaked(), "{version}");

            let value = reply(&mut rx);
            assert_eq!(value["content"]["status"], "Failure");
            assert_eq!(value["content"]["message"], message);
        }
    }

    #[test]
    fn test_config_warning_suffix() {
        let (mut conn, mut rx) = connection();
        conn.receive(&handshake("1.2.0"), false);
        let response: ResponseToClient = serde_json::from_value(reply(&mut rx)["content"].clone()).unwrap();
        assert_eq!(response.status, ResponseStatus::Success);
        assert!(response.message.ends_with(CONFIG_WARNING));
    }

    #[test]
    fn test_routes_after_handshake() {
        let (mut conn, _rx) = connection();
        conn.receive(&handshake("1.2.0"), true);

        let request = json!({"action": "REQUEST_SERVICE_STATUS", "content": {"requestID": "s"}}).to_string();
        match conn.receive(&request, true) {
            Inbound::Route(message) => assert_eq!(message.action_code(), Some(ActionCode::RequestServiceStatus)),
            other => panic!("expected route, got {:?}", other),
        }
        assert!(matches!(conn.receive("{{", true), Inbound::Malformed));
    }

    #[test]
    fn test_input_actions_wait_for_handshake() {
        let (mut conn, mut rx) = connection();
        let wire = WireInputAction::default();
        assert!(!conn.send_input_action(&wire));
        assert!(rx.try_recv().is_err());

        conn.receive(&handshake("1.2.0"), true);
        reply(&mut rx);
        assert!(conn.send_input_action(&wire));
        assert_eq!(reply(&mut rx)["action"], "INPUT_ACTION");
    }

    #[test]
    fn test_closed_when_writer_dropped() {
        let (mut conn, rx) = connection();
        assert!(conn.is_open());
        drop(rx);
        assert!(!conn.is_open());

        let (mut other, _rx) = connection();
        other.close();
        assert!(!other.is_open());
        assert_eq!(conn.state(), ConnectionState::HandshakeAwaited);
        conn.close();
    }
}
