//! Async client for the service
//!
//! Connects, performs the version handshake, and offers one async method
//! per request type. Replies are matched to requests by a fresh UUID
//! request ID; everything else the service sends is left in the
//! `MessageReceiver` for the caller's frame loop to pick up via `update`.

use super::receiver::{MessageReceiver, ReceiverUpdate, ServiceResponse};
use crate::config::{InteractionConfigPartial, PhysicalConfigPartial};
use crate::protocol::{
    encode, ActionCode, ApiVersion, ConfigState, ResponseToClient, ServiceStatus, TrackingApiState, API_HEADER_NAME,
    API_VERSION, REQUEST_ID_KEY,
};
use crate::tracking::provider::TrackingSettings;
use crate::{Error, Result};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Version announced in the handshake
    pub api_version: ApiVersion,
    /// How long a request method waits for its reply
    pub request_timeout: Duration,
    pub cull_to_count: usize,
    /// Unanswered requests are forgotten after this long
    pub expiry: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_version: API_VERSION,
            request_timeout: Duration::from_secs(5),
            cull_to_count: crate::queue::DEFAULT_CULL_TO_COUNT,
            expiry: crate::correlation::DEFAULT_EXPIRY,
        }
    }
}

pub struct ServiceClient {
    receiver: Arc<Mutex<MessageReceiver>>,
    outbound: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    request_timeout: Duration,
    handshake: ResponseToClient,
}

impl ServiceClient {
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(url, ClientOptions::default()).await
    }

    /// Open the socket and complete the handshake. A handshake the service
    /// rejects is returned as `Error::Handshake` and the socket is closed.
    pub async fn connect_with(url: &str, options: ClientOptions) -> Result<Self> {
        let (socket, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut sink, mut source) = socket.split();
        info!(url, "Connected to service");

        let receiver = Arc::new(Mutex::new(MessageReceiver::new(options.cull_to_count, options.expiry)));
        let connected = Arc::new(AtomicBool::new(true));
        let (outbound, mut rx) = mpsc::unbounded_channel::<String>();

        let writer = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_receiver = Arc::clone(&receiver);
        let reader_connected = Arc::clone(&connected);
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = reader_receiver.lock().handle_text(&text) {
                            warn!(error = %e, "Could not handle message from service");
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "Service socket error");
                        break;
                    }
                }
            }
            reader_connected.store(false, Ordering::Release);
            info!("Disconnected from service");
        });

        let mut client = Self {
            receiver,
            outbound,
            connected,
            reader,
            writer,
            request_timeout: options.request_timeout,
            handshake: ResponseToClient::failure("", "", ""),
        };

        let content = json!({ API_HEADER_NAME: options.api_version.to_string() });
        let response = match client.request(ActionCode::VersionHandshake, content).await? {
            ServiceResponse::Response(response) => response,
            other => return Err(unexpected(ActionCode::VersionHandshake, &other)),
        };
        if !response.is_success() {
            client.close().await;
            return Err(Error::Handshake(response.message));
        }
        info!(message = %response.message, "Handshake complete");
        client.handshake = response;
        Ok(client)
    }

    /// The service's handshake reply, including any config warning
    pub fn handshake(&self) -> &ResponseToClient {
        &self.handshake
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Drain what arrived since the last call; see `MessageReceiver::update`
    pub fn update(&self) -> ReceiverUpdate {
        self.receiver.lock().update()
    }

    pub async fn request_configuration_state(&self) -> Result<ConfigState> {
        self.config_state(ActionCode::RequestConfigurationState).await
    }

    pub async fn request_configuration_file(&self) -> Result<ConfigState> {
        self.config_state(ActionCode::RequestConfigurationFile).await
    }

    /// Change live configuration. Only the fields set in the partials are
    /// sent.
    pub async fn set_configuration_state(
        &self,
        interaction: Option<&InteractionConfigPartial>,
        physical: Option<&PhysicalConfigPartial>,
    ) -> Result<ResponseToClient> {
        self.config_change(ActionCode::SetConfigurationState, interaction, physical)
            .await
    }

    /// Change the saved config files, then live configuration
    pub async fn set_configuration_file(
        &self,
        interaction: Option<&InteractionConfigPartial>,
        physical: Option<&PhysicalConfigPartial>,
    ) -> Result<ResponseToClient> {
        self.config_change(ActionCode::SetConfigurationFile, interaction, physical)
            .await
    }

    pub async fn request_service_status(&self) -> Result<ServiceStatus> {
        let action = ActionCode::RequestServiceStatus;
        match self.request(action, json!({})).await? {
            ServiceResponse::ServiceStatus(status) => Ok(status),
            other => Err(unexpected(action, &other)),
        }
    }

    pub async fn request_tracking_state(&self) -> Result<TrackingApiState> {
        self.tracking(ActionCode::GetTrackingState, json!({})).await
    }

    pub async fn set_tracking_state(&self, changes: &TrackingSettings) -> Result<TrackingApiState> {
        self.tracking(ActionCode::SetTrackingState, serde_json::to_value(changes)?)
            .await
    }

    /// Stop both socket tasks
    pub async fn close(self) {
        let Self {
            outbound,
            reader,
            writer,
            ..
        } = self;
        drop(outbound);
        if writer.await.is_err() {
            warn!("Writer task panicked");
        }
        reader.abort();
        let _ = reader.await;
    }

    async fn config_state(&self, action: ActionCode) -> Result<ConfigState> {
        match self.request(action, json!({})).await? {
            ServiceResponse::ConfigState(state) => Ok(state),
            other => Err(unexpected(action, &other)),
        }
    }

    async fn config_change(
        &self,
        action: ActionCode,
        interaction: Option<&InteractionConfigPartial>,
        physical: Option<&PhysicalConfigPartial>,
    ) -> Result<ResponseToClient> {
        let mut content = Map::new();
        if let Some(interaction) = interaction {
            content.insert("interaction".to_string(), serde_json::to_value(interaction)?);
        }
        if let Some(physical) = physical {
            content.insert("physical".to_string(), serde_json::to_value(physical)?);
        }

        match self.request(action, Value::Object(content)).await? {
            ServiceResponse::Response(response) => Ok(response),
            other => Err(unexpected(action, &other)),
        }
    }

    async fn tracking(&self, action: ActionCode, content: Value) -> Result<TrackingApiState> {
        match self.request(action, content).await? {
            ServiceResponse::TrackingState(state) => Ok(state),
            other => Err(unexpected(action, &other)),
        }
    }

    /// Send `content` under a new request ID and wait for the reply
    async fn request(&self, action: ActionCode, mut content: Value) -> Result<ServiceResponse> {
        let request_id = Uuid::new_v4().to_string();
        match content.as_object_mut() {
            Some(map) => {
                map.insert(REQUEST_ID_KEY.to_string(), Value::String(request_id.clone()));
            }
            None => return Err(Error::Protocol(format!("{} content must be an object", action))),
        }

        let (tx, rx) = oneshot::channel();
        self.receiver.lock().expect_response(
            &request_id,
            Box::new(move |response| {
                let _ = tx.send(response);
            }),
        )?;

        let text = encode(action, &content)?;
        if self.outbound.send(text).is_err() {
            return Err(Error::Connection("connection to service is closed".to_string()));
        }
        debug!(action = %action, request_id = %request_id, "Request sent");

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::Connection(format!("{} request expired without a response", action))),
            Err(_) => Err(Error::Connection(format!("timed out waiting for a response to {}", action))),
        }
    }
}

fn unexpected(action: ActionCode, response: &ServiceResponse) -> Error {
    Error::Protocol(format!("unexpected reply to {}: {:?}", action, response))
}
