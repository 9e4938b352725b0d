//! Client-side message handling
//!
//! Messages from the service are sorted as they arrive: input actions go
//! through the same culling queue the service uses, replies resolve their
//! pending request, and presence/zone events are kept until the next
//! `update` reports them.

use crate::correlation::{ResponseCallback, ResponseStore};
use crate::interaction::{InputAction, InteractionZoneState, WireInputAction};
use crate::protocol::{
    ActionCode, ConfigState, HandPresenceEvent, InteractionZoneEvent, RawMessage, ResponseToClient, ServiceStatus,
    TrackingApiState,
};
use crate::queue::InputActionQueue;
use crate::time::Timestamp;
use crate::tracking::HandPresence;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// A reply to one of our requests
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResponse {
    /// Handshake and configuration change replies
    Response(ResponseToClient),
    ConfigState(ConfigState),
    ServiceStatus(ServiceStatus),
    TrackingState(TrackingApiState),
}

impl ServiceResponse {
    pub fn request_id(&self) -> &str {
        match self {
            ServiceResponse::Response(r) => &r.request_id,
            ServiceResponse::ConfigState(s) => &s.request_id,
            ServiceResponse::ServiceStatus(s) => &s.request_id,
            ServiceResponse::TrackingState(s) => &s.request_id,
        }
    }
}

/// What one `update` surfaced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiverUpdate {
    pub action: Option<InputAction>,
    pub presence: Option<HandPresence>,
    pub zone: Option<InteractionZoneState>,
    /// Unsolicited status broadcast
    pub status: Option<ServiceStatus>,
}

impl ReceiverUpdate {
    pub fn is_empty(&self) -> bool {
        self.action.is_none() && self.presence.is_none() && self.zone.is_none() && self.status.is_none()
    }
}

pub struct MessageReceiver {
    actions: InputActionQueue,
    responses: ResponseStore<ServiceResponse>,
    presence: Option<HandPresence>,
    zone: Option<InteractionZoneState>,
    status: Option<ServiceStatus>,
    /// Expired requests are swept once per interval, not every frame
    sweep_interval: Duration,
    last_sweep: Timestamp,
}

impl MessageReceiver {
    pub fn new(cull_to_count: usize, expiry: Duration) -> Self {
        Self {
            actions: InputActionQueue::with_cull_to_count(cull_to_count),
            responses: ResponseStore::with_expiry(expiry),
            presence: None,
            zone: None,
            status: None,
            sweep_interval: expiry,
            last_sweep: Timestamp::now(),
        }
    }

    /// Call `callback` with the reply to `request_id`
    pub fn expect_response(&mut self, request_id: &str, callback: ResponseCallback<ServiceResponse>) -> Result<()> {
        self.responses.register(request_id, callback)
    }

    pub fn pending_responses(&self) -> usize {
        self.responses.len()
    }

    pub fn queued_actions(&self) -> usize {
        self.actions.len()
    }

    /// Sort one text frame from the service
    pub fn handle_text(&mut self, text: &str) -> Result<()> {
        let message = RawMessage::parse(text)?;
        let Some(action) = message.action_code() else {
            return Err(Error::Protocol(format!("unknown action \"{}\"", message.action)));
        };

        match action {
            ActionCode::InputAction => {
                let wire: WireInputAction = content(message.content)?;
                self.actions.push(InputAction::from_wire(&wire));
            }
            ActionCode::HandPresenceEvent => {
                let event: HandPresenceEvent = content(message.content)?;
                self.presence = Some(event.state);
            }
            ActionCode::InteractionZoneEvent => {
                let event: InteractionZoneEvent = content(message.content)?;
                self.zone = Some(event.state);
            }
            ActionCode::ServiceStatus => {
                self.status = Some(content(message.content)?);
            }
            ActionCode::VersionHandshakeResponse
            | ActionCode::ConfigurationResponse
            | ActionCode::ConfigurationFileChangeResponse => {
                self.resolve(ServiceResponse::Response(content(message.content)?));
            }
            ActionCode::ConfigurationState | ActionCode::ConfigurationFileState => {
                self.resolve(ServiceResponse::ConfigState(content(message.content)?));
            }
            ActionCode::ServiceStatusResponse => {
                self.resolve(ServiceResponse::ServiceStatus(content(message.content)?));
            }
            ActionCode::GetTrackingStateResponse | ActionCode::SetTrackingStateResponse => {
                self.resolve(ServiceResponse::TrackingState(content(message.content)?));
            }
            other => debug!(action = %other, "Ignoring message"),
        }
        Ok(())
    }

    fn resolve(&mut self, response: ServiceResponse) {
        let request_id = response.request_id().to_string();
        if !self.responses.resolve(&request_id, response) {
            warn!(request_id = %request_id, "Received a response that did not match a callback");
        }
    }

    /// Per-frame drain: at most one input action, any pending presence or
    /// zone change (each reported once), and expiry of unanswered requests
    pub fn update(&mut self) -> ReceiverUpdate {
        self.update_at(Timestamp::now())
    }

    pub fn update_at(&mut self, now: Timestamp) -> ReceiverUpdate {
        if now.duration_since(self.last_sweep) >= self.sweep_interval {
            self.responses.sweep_at(now);
            self.last_sweep = now;
        }
        ReceiverUpdate {
            action: self.actions.pop_next(),
            presence: self.presence.take(),
            zone: self.zone.take(),
            status: self.status.take(),
        }
    }
}

impl Default for MessageReceiver {
    fn default() -> Self {
        Self::new(crate::queue::DEFAULT_CULL_TO_COUNT, crate::correlation::DEFAULT_EXPIRY)
    }
}

fn content<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}
