//! Message envelopes and content types
//!
//! Every message on the socket is `{"action": <code>, "content": {...}}`.
//! Field names follow the wire protocol exactly, hence the per-field
//! renames on the request ID.

use super::action_code::ActionCode;
use crate::config::{ConfigurationState, InteractionConfig, PhysicalConfig};
use crate::interaction::InteractionZoneState;
use crate::tracking::provider::{MaskData, SettingOutcome, TrackingSettings, TrackingSettingsOutcome};
use crate::tracking::{HandPresence, TrackingServiceState};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key every request and response carries
pub const REQUEST_ID_KEY: &str = "requestID";

/// Outbound envelope
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub action: ActionCode,
    pub content: &'a T,
}

/// Serialize `content` under `action`
pub fn encode<T: Serialize>(action: ActionCode, content: &T) -> Result<String> {
    Ok(serde_json::to_string(&Envelope { action, content })?)
}

/// Inbound envelope before the action is interpreted
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub action: String,
    #[serde(default)]
    pub content: Value,
}

impl RawMessage {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Known action code, or `None` for unrecognised ones
    pub fn action_code(&self) -> Option<ActionCode> {
        self.action.parse().ok()
    }

    /// Non-empty string request ID in the content
    pub fn request_id(&self) -> Option<&str> {
        request_id_of(&self.content)
    }
}

/// Non-empty string `requestID` of a content object
pub fn request_id_of(content: &Value) -> Option<&str> {
    content
        .get(REQUEST_ID_KEY)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    Failure,
}

/// Generic reply to a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseToClient {
    #[serde(rename = "requestID")]
    pub request_id: String,
    pub status: ResponseStatus,
    pub message: String,
    #[serde(rename = "originalRequest")]
    pub original_request: String,
}

impl ResponseToClient {
    pub fn success(request_id: impl Into<String>, message: impl Into<String>, original_request: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: ResponseStatus::Success,
            message: message.into(),
            original_request: original_request.into(),
        }
    }

    pub fn failure(request_id: impl Into<String>, message: impl Into<String>, original_request: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: ResponseStatus::Failure,
            message: message.into(),
            original_request: original_request.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// Full configuration, as sent in `CONFIGURATION_STATE` and
/// `CONFIGURATION_FILE_STATE`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigState {
    #[serde(rename = "requestID")]
    pub request_id: String,
    pub interaction: InteractionConfig,
    pub physical: PhysicalConfig,
}

/// `SERVICE_STATUS` and `SERVICE_STATUS_RESPONSE` content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    #[serde(rename = "requestID")]
    pub request_id: String,
    pub tracking_service_state: TrackingServiceState,
    pub configuration_state: ConfigurationState,
    pub service_version: String,
    pub tracking_version: String,
    pub camera_serial: String,
    pub camera_firmware_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandPresenceEvent {
    pub state: HandPresence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionZoneEvent {
    pub state: InteractionZoneState,
}

/// Outcome of one tracking setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessWrapper<T> {
    pub succeeded: bool,
    pub msg: String,
    pub content: Option<T>,
}

impl<T> SuccessWrapper<T> {
    pub fn ok(content: T) -> Self {
        Self {
            succeeded: true,
            msg: String::new(),
            content: Some(content),
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            msg: msg.into(),
            content: None,
        }
    }

    fn from_outcome(outcome: &SettingOutcome, content: Option<T>) -> Self {
        match (outcome, content) {
            (Ok(()), Some(content)) => Self::ok(content),
            (Ok(()), None) => Self::failed("Tracking setting not reported"),
            (Err(msg), _) => Self::failed(msg.clone()),
        }
    }
}

/// `GET_TRACKING_STATE_RESPONSE` and `SET_TRACKING_STATE_RESPONSE` content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingApiState {
    #[serde(rename = "requestID")]
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<SuccessWrapper<MaskData>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_images: Option<SuccessWrapper<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_reversed: Option<SuccessWrapper<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics_enabled: Option<SuccessWrapper<bool>>,
}

impl TrackingApiState {
    /// Every setting the provider reports, all successful
    pub fn from_settings(request_id: impl Into<String>, settings: &TrackingSettings) -> Self {
        let missing = || "Tracking setting not reported";
        Self {
            request_id: request_id.into(),
            mask: Some(settings.mask.map_or_else(|| SuccessWrapper::failed(missing()), SuccessWrapper::ok)),
            allow_images: Some(
                settings
                    .allow_images
                    .map_or_else(|| SuccessWrapper::failed(missing()), SuccessWrapper::ok),
            ),
            camera_reversed: Some(
                settings
                    .camera_reversed
                    .map_or_else(|| SuccessWrapper::failed(missing()), SuccessWrapper::ok),
            ),
            analytics_enabled: Some(
                settings
                    .analytics_enabled
                    .map_or_else(|| SuccessWrapper::failed(missing()), SuccessWrapper::ok),
            ),
        }
    }

    /// Only the settings that were part of the change request
    pub fn from_outcome(
        request_id: impl Into<String>,
        outcome: &TrackingSettingsOutcome,
        current: &TrackingSettings,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            mask: outcome
                .mask
                .as_ref()
                .map(|o| SuccessWrapper::from_outcome(o, current.mask)),
            allow_images: outcome
                .allow_images
                .as_ref()
                .map(|o| SuccessWrapper::from_outcome(o, current.allow_images)),
            camera_reversed: outcome
                .camera_reversed
                .as_ref()
                .map(|o| SuccessWrapper::from_outcome(o, current.camera_reversed)),
            analytics_enabled: outcome
                .analytics_enabled
                .as_ref()
                .map(|o| SuccessWrapper::from_outcome(o, current.analytics_enabled)),
        }
    }
}

/// `SET_TRACKING_STATE` content; absent fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingStateRequest {
    #[serde(rename = "requestID")]
    pub request_id: String,
    #[serde(flatten)]
    pub settings: TrackingSettings,
}
