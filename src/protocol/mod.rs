//! Wire protocol
//!
//! JSON text frames over a WebSocket. A connection must complete a
//! `VERSION_HANDSHAKE` before anything else it sends is acted on.

pub mod action_code;
pub mod messages;
pub mod version;

pub use action_code::ActionCode;
pub use messages::{
    encode, request_id_of, ConfigState, HandPresenceEvent, InteractionZoneEvent, RawMessage, ResponseStatus,
    ResponseToClient, ServiceStatus, SuccessWrapper, TrackingApiState, TrackingStateRequest, REQUEST_ID_KEY,
};
pub use version::{ApiVersion, Compatibility, API_HEADER_NAME, API_VERSION, SERVICE_VERSION};
