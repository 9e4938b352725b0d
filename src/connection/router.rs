//! Request routing
//!
//! Handshaked requests land in one `MessageQueue` per category. The tick
//! drains each queue at most one request at a time, so a slow category
//! never holds up the others. Replies go back to the client that asked.

use super::manager::ConnectionManager;
use crate::config::{
    validate_config_request, ConfigManager, InteractionConfigPartial, PhysicalConfigPartial, SchemaError,
};
use crate::protocol::{
    request_id_of, ActionCode, ConfigState, ResponseToClient, ServiceStatus, SuccessWrapper, TrackingApiState,
    TrackingStateRequest, SERVICE_VERSION,
};
use crate::queue::{MessageQueue, DEFAULT_MESSAGE_QUEUE_CAPACITY};
use crate::tracking::TrackingProvider;
use crate::Error;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

pub const CONFIG_MISSING_REQUEST_ID: &str = "Setting configuration failed. This is due to a missing or invalid requestID";
pub const CONFIG_STATE_MISSING_REQUEST_ID: &str = "Config state request failed. This is due to a missing or invalid requestID";
pub const SERVICE_STATUS_MISSING_REQUEST_ID: &str =
    "Service state request failed. This is due to a missing or invalid requestID";
pub const TRACKING_MISSING_REQUEST_ID: &str =
    "Tracking State change request failed. This is due to a missing or invalid requestID";
pub const FILE_ACCESS_FAILURE: &str = "Did not have appropriate file access to modify the config file(s).";
pub const QUEUE_FULL: &str = "Request rejected: too many requests of this type are already waiting.";

const TRACKING_NOT_CONNECTED: &str = "Tracking not connected";
const DEVICE_NOT_CONNECTED: &str = "Device not connected";

/// A handshaked request waiting for the tick
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingRequest {
    pub client_id: Uuid,
    pub action: ActionCode,
    pub content: Value,
}

impl IncomingRequest {
    pub fn new(client_id: Uuid, action: ActionCode, content: Value) -> Self {
        Self {
            client_id,
            action,
            content,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        request_id_of(&self.content)
    }

    /// Content as echoed back in `originalRequest`
    pub fn original(&self) -> String {
        self.content.to_string()
    }

    /// Action code the reply to this request is sent under
    pub fn response_action(&self) -> Option<ActionCode> {
        match self.action {
            ActionCode::RequestConfigurationState => Some(ActionCode::ConfigurationState),
            ActionCode::SetConfigurationState => Some(ActionCode::ConfigurationResponse),
            ActionCode::RequestConfigurationFile => Some(ActionCode::ConfigurationFileState),
            ActionCode::SetConfigurationFile => Some(ActionCode::ConfigurationFileChangeResponse),
            ActionCode::RequestServiceStatus => Some(ActionCode::ServiceStatusResponse),
            ActionCode::GetTrackingState => Some(ActionCode::GetTrackingStateResponse),
            ActionCode::SetTrackingState => Some(ActionCode::SetTrackingStateResponse),
            _ => None,
        }
    }

    /// Failure reply in the shape the client expects for this action
    pub fn rejection(&self, message: &str) -> crate::Result<Option<(ActionCode, Value)>> {
        let Some(action) = self.response_action() else {
            return Ok(None);
        };
        let request_id = self.request_id().unwrap_or_default();
        let content = match RequestCategory::for_action(self.action) {
            Some(RequestCategory::TrackingState) => serde_json::to_value(failed_tracking_state(request_id, message))?,
            _ => serde_json::to_value(ResponseToClient::failure(request_id, message, self.original()))?,
        };
        Ok(Some((action, content)))
    }
}

/// Where `RequestQueues::enqueue` put a request
#[derive(Debug, PartialEq)]
pub enum Enqueued {
    Queued,
    /// The category's queue is at capacity; the request is handed back
    Full(IncomingRequest),
    /// No category takes this action
    Unroutable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestCategory {
    ConfigState,
    ConfigChange,
    ConfigFileState,
    ConfigFileChange,
    ServiceStatus,
    TrackingState,
}

impl RequestCategory {
    pub const ALL: [RequestCategory; 6] = [
        RequestCategory::ConfigState,
        RequestCategory::ConfigChange,
        RequestCategory::ConfigFileState,
        RequestCategory::ConfigFileChange,
        RequestCategory::ServiceStatus,
        RequestCategory::TrackingState,
    ];

    pub fn for_action(action: ActionCode) -> Option<Self> {
        match action {
            ActionCode::RequestConfigurationState => Some(RequestCategory::ConfigState),
            ActionCode::SetConfigurationState => Some(RequestCategory::ConfigChange),
            ActionCode::RequestConfigurationFile => Some(RequestCategory::ConfigFileState),
            ActionCode::SetConfigurationFile => Some(RequestCategory::ConfigFileChange),
            ActionCode::RequestServiceStatus => Some(RequestCategory::ServiceStatus),
            ActionCode::GetTrackingState | ActionCode::SetTrackingState => Some(RequestCategory::TrackingState),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestCategory::ConfigState => "config-state",
            RequestCategory::ConfigChange => "config-change",
            RequestCategory::ConfigFileState => "config-file-state",
            RequestCategory::ConfigFileChange => "config-file-change",
            RequestCategory::ServiceStatus => "service-status",
            RequestCategory::TrackingState => "tracking-state",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Per-category queues, written by socket tasks and drained by the tick
#[derive(Debug)]
pub struct RequestQueues {
    queues: Vec<MessageQueue<IncomingRequest>>,
}

impl RequestQueues {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MESSAGE_QUEUE_CAPACITY)
    }

    /// Queues that each hold at most `capacity` requests
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: RequestCategory::ALL
                .iter()
                .map(|category| MessageQueue::with_capacity(category.name(), capacity))
                .collect(),
        }
    }

    pub fn enqueue(&self, request: IncomingRequest) -> Enqueued {
        match RequestCategory::for_action(request.action) {
            Some(category) => match self.queue(category).push(request) {
                Ok(()) => Enqueued::Queued,
                Err(request) => Enqueued::Full(request),
            },
            None => Enqueued::Unroutable,
        }
    }

    pub fn queue(&self, category: RequestCategory) -> &MessageQueue<IncomingRequest> {
        &self.queues[category.index()]
    }

    /// Requests waiting across all categories
    pub fn pending(&self) -> usize {
        self.queues.iter().map(MessageQueue::len).sum()
    }
}

impl Default for RequestQueues {
    fn default() -> Self {
        Self::new()
    }
}

/// What request handlers may touch during a drain
pub struct RouterContext<'a> {
    pub config: &'a mut ConfigManager,
    pub tracking: &'a mut dyn TrackingProvider,
    pub connections: &'a ConnectionManager,
}

/// Current status, with the device fields filled in for display
pub fn service_status(request_id: &str, tracking: &dyn TrackingProvider, config: &ConfigManager) -> ServiceStatus {
    let device = tracking.device_info();
    let or = |value: String, fallback: &str| {
        if value.is_empty() {
            fallback.to_string()
        } else {
            value
        }
    };
    ServiceStatus {
        request_id: request_id.to_string(),
        tracking_service_state: tracking.service_state(),
        configuration_state: config.configuration_state(),
        service_version: SERVICE_VERSION.to_string(),
        tracking_version: or(device.tracking_version, TRACKING_NOT_CONNECTED),
        camera_serial: or(device.camera_serial, DEVICE_NOT_CONNECTED),
        camera_firmware_version: or(device.camera_firmware_version, DEVICE_NOT_CONNECTED),
    }
}

pub struct MessageRouter;

impl MessageRouter {
    /// Handle at most one request from each category. Returns how many were
    /// handled.
    pub fn drain(queues: &RequestQueues, ctx: &mut RouterContext<'_>) -> usize {
        let mut handled = 0;
        for category in RequestCategory::ALL {
            if let Some(request) = queues.queue(category).pop() {
                debug!(
                    client_id = %request.client_id,
                    action = %request.action,
                    queue = category.name(),
                    "Handling request"
                );
                Self::handle(category, &request, ctx);
                handled += 1;
            }
        }
        handled
    }

    pub fn handle(category: RequestCategory, request: &IncomingRequest, ctx: &mut RouterContext<'_>) {
        match category {
            RequestCategory::ConfigState => config_state(request, ctx, false),
            RequestCategory::ConfigFileState => config_state(request, ctx, true),
            RequestCategory::ConfigChange => config_change(request, ctx, false),
            RequestCategory::ConfigFileChange => config_change(request, ctx, true),
            RequestCategory::ServiceStatus => status(request, ctx),
            RequestCategory::TrackingState => tracking_state(request, ctx),
        }
    }
}

fn config_state(request: &IncomingRequest, ctx: &mut RouterContext<'_>, from_file: bool) {
    let action = if from_file {
        ActionCode::ConfigurationFileState
    } else {
        ActionCode::ConfigurationState
    };

    let Some(request_id) = request.request_id() else {
        let response = ResponseToClient::failure("", CONFIG_STATE_MISSING_REQUEST_ID, request.original());
        ctx.connections.send_to(request.client_id, action, &response);
        return;
    };

    let (interaction, physical) = if from_file {
        match ctx.config.file_state() {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "Could not read config files");
                let message = format!("Config file request failed. {}", e);
                let response = ResponseToClient::failure(request_id, message, request.original());
                ctx.connections.send_to(request.client_id, action, &response);
                return;
            }
        }
    } else {
        (ctx.config.interaction(), ctx.config.physical())
    };

    let state = ConfigState {
        request_id: request_id.to_string(),
        interaction,
        physical,
    };
    ctx.connections.send_to(request.client_id, action, &state);
}

fn config_change(request: &IncomingRequest, ctx: &mut RouterContext<'_>, to_file: bool) {
    let action = if to_file {
        ActionCode::ConfigurationFileChangeResponse
    } else {
        ActionCode::ConfigurationResponse
    };
    let request_id = request.request_id().unwrap_or_default();
    let original = request.original();

    let response = match validate_config_request(&request.content).map_err(schema_failure) {
        Err(message) => ResponseToClient::failure(request_id, message, original),
        Ok(normalised) => match parse_partials(&normalised) {
            Err(e) => ResponseToClient::failure(request_id, format!("Setting configuration failed. {}", e), original),
            Ok((interaction, physical)) if to_file => {
                match ctx.config.apply_file_change(interaction.as_ref(), physical.as_ref()) {
                    Ok(()) => ResponseToClient::success(request_id, "", original),
                    Err(Error::FileAccess(path)) => {
                        warn!(path = %path, "Config file not writable");
                        ResponseToClient::failure(request_id, FILE_ACCESS_FAILURE, original)
                    }
                    Err(e) => {
                        ResponseToClient::failure(request_id, format!("Setting configuration failed. {}", e), original)
                    }
                }
            }
            Ok((interaction, physical)) => {
                let changed = ctx.config.apply_partial(interaction.as_ref(), physical.as_ref());
                debug!(changed, "Configuration change applied");
                ResponseToClient::success(request_id, "", original)
            }
        },
    };

    if !response.is_success() {
        warn!(client_id = %request.client_id, "{}", response.message);
    }
    ctx.connections.send_to(request.client_id, action, &response);
}

fn schema_failure(error: SchemaError) -> String {
    match error {
        SchemaError::InvalidField(key) => {
            format!("Setting configuration failed. This is due to an invalid field \"{}\"", key)
        }
        SchemaError::MissingRequestId | SchemaError::NotAnObject => CONFIG_MISSING_REQUEST_ID.to_string(),
    }
}

type Partials = (Option<InteractionConfigPartial>, Option<PhysicalConfigPartial>);

/// Typed partials from a validated request
fn parse_partials(normalised: &Value) -> crate::Result<Partials> {
    let interaction = normalised
        .get("interaction")
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()?;
    let physical = normalised
        .get("physical")
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()?;
    Ok((interaction, physical))
}

fn status(request: &IncomingRequest, ctx: &mut RouterContext<'_>) {
    let action = ActionCode::ServiceStatusResponse;
    match request.request_id() {
        Some(request_id) => {
            let status = service_status(request_id, &*ctx.tracking, ctx.config);
            ctx.connections.send_to(request.client_id, action, &status);
        }
        None => {
            let response = ResponseToClient::failure("", SERVICE_STATUS_MISSING_REQUEST_ID, request.original());
            ctx.connections.send_to(request.client_id, action, &response);
        }
    }
}

fn tracking_state(request: &IncomingRequest, ctx: &mut RouterContext<'_>) {
    let is_set = request.action == ActionCode::SetTrackingState;
    let action = if is_set {
        ActionCode::SetTrackingStateResponse
    } else {
        ActionCode::GetTrackingStateResponse
    };

    let Some(request_id) = request.request_id() else {
        let state = failed_tracking_state("", TRACKING_MISSING_REQUEST_ID);
        ctx.connections.send_to(request.client_id, action, &state);
        return;
    };

    let state = if is_set {
        match serde_json::from_value::<TrackingStateRequest>(request.content.clone()) {
            Ok(change) => {
                let outcome = ctx.tracking.apply_tracking_settings(&change.settings);
                TrackingApiState::from_outcome(request_id, &outcome, &ctx.tracking.tracking_settings())
            }
            Err(e) => failed_tracking_state(request_id, &format!("Tracking State change request failed. {}", e)),
        }
    } else {
        TrackingApiState::from_settings(request_id, &ctx.tracking.tracking_settings())
    };

    ctx.connections.send_to(request.client_id, action, &state);
}

fn failed_tracking_state(request_id: &str, message: &str) -> TrackingApiState {
    TrackingApiState {
        request_id: request_id.to_string(),
        mask: Some(SuccessWrapper::failed(message)),
        allow_images: Some(SuccessWrapper::failed(message)),
        camera_reversed: Some(SuccessWrapper::failed(message)),
        analytics_enabled: Some(SuccessWrapper::failed(message)),
    }
}
