//! Action codes carried in the `action` field of every message

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionCode {
    InputAction,

    ConfigurationState,
    ConfigurationResponse,
    SetConfigurationState,
    RequestConfigurationState,

    VersionHandshake,
    VersionHandshakeResponse,

    HandPresenceEvent,
    InteractionZoneEvent,

    RequestServiceStatus,
    ServiceStatusResponse,
    ServiceStatus,

    RequestConfigurationFile,
    ConfigurationFileState,
    SetConfigurationFile,
    ConfigurationFileChangeResponse,

    QuickSetup,
    QuickSetupConfig,
    QuickSetupResponse,

    HandData,
    SetHandDataStreamState,
    SetHandDataStreamStateResponse,

    GetTrackingState,
    GetTrackingStateResponse,
    SetTrackingState,
    SetTrackingStateResponse,
}

impl ActionCode {
    pub const ALL: [ActionCode; 26] = [
        ActionCode::InputAction,
        ActionCode::ConfigurationState,
        ActionCode::ConfigurationResponse,
        ActionCode::SetConfigurationState,
        ActionCode::RequestConfigurationState,
        ActionCode::VersionHandshake,
        ActionCode::VersionHandshakeResponse,
        ActionCode::HandPresenceEvent,
        ActionCode::InteractionZoneEvent,
        ActionCode::RequestServiceStatus,
        ActionCode::ServiceStatusResponse,
        ActionCode::ServiceStatus,
        ActionCode::RequestConfigurationFile,
        ActionCode::ConfigurationFileState,
        ActionCode::SetConfigurationFile,
        ActionCode::ConfigurationFileChangeResponse,
        ActionCode::QuickSetup,
        ActionCode::QuickSetupConfig,
        ActionCode::QuickSetupResponse,
        ActionCode::HandData,
        ActionCode::SetHandDataStreamState,
        ActionCode::SetHandDataStreamStateResponse,
        ActionCode::GetTrackingState,
        ActionCode::GetTrackingStateResponse,
        ActionCode::SetTrackingState,
        ActionCode::SetTrackingStateResponse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCode::InputAction => "INPUT_ACTION",
            ActionCode::ConfigurationState => "CONFIGURATION_STATE",
            ActionCode::ConfigurationResponse => "CONFIGURATION_RESPONSE",
            ActionCode::SetConfigurationState => "SET_CONFIGURATION_STATE",
            ActionCode::RequestConfigurationState => "REQUEST_CONFIGURATION_STATE",
            ActionCode::VersionHandshake => "VERSION_HANDSHAKE",
            ActionCode::VersionHandshakeResponse => "VERSION_HANDSHAKE_RESPONSE",
            ActionCode::HandPresenceEvent => "HAND_PRESENCE_EVENT",
            ActionCode::InteractionZoneEvent => "INTERACTION_ZONE_EVENT",
            ActionCode::RequestServiceStatus => "REQUEST_SERVICE_STATUS",
            ActionCode::ServiceStatusResponse => "SERVICE_STATUS_RESPONSE",
            ActionCode::ServiceStatus => "SERVICE_STATUS",
            ActionCode::RequestConfigurationFile => "REQUEST_CONFIGURATION_FILE",
            ActionCode::ConfigurationFileState => "CONFIGURATION_FILE_STATE",
            ActionCode::SetConfigurationFile => "SET_CONFIGURATION_FILE",
            ActionCode::ConfigurationFileChangeResponse => "CONFIGURATION_FILE_CHANGE_RESPONSE",
            ActionCode::QuickSetup => "QUICK_SETUP",
            ActionCode::QuickSetupConfig => "QUICK_SETUP_CONFIG",
            ActionCode::QuickSetupResponse => "QUICK_SETUP_RESPONSE",
            ActionCode::HandData => "HAND_DATA",
            ActionCode::SetHandDataStreamState => "SET_HAND_DATA_STREAM_STATE",
            ActionCode::SetHandDataStreamStateResponse => "SET_HAND_DATA_STREAM_STATE_RESPONSE",
            ActionCode::GetTrackingState => "GET_TRACKING_STATE",
            ActionCode::GetTrackingStateResponse => "GET_TRACKING_STATE_RESPONSE",
            ActionCode::SetTrackingState => "SET_TRACKING_STATE",
            ActionCode::SetTrackingStateResponse => "SET_TRACKING_STATE_RESPONSE",
        }
    }

    /// Requests the service is meant to act on
    pub fn expected_to_be_handled(&self) -> bool {
        matches!(
            self,
            ActionCode::SetConfigurationState
                | ActionCode::RequestConfigurationState
                | ActionCode::RequestServiceStatus
                | ActionCode::SetConfigurationFile
                | ActionCode::RequestConfigurationFile
                | ActionCode::QuickSetup
                | ActionCode::SetHandDataStreamState
                | ActionCode::GetTrackingState
                | ActionCode::SetTrackingState
                | ActionCode::VersionHandshake
        )
    }

    /// Codes only the service itself sends
    pub fn unexpected_by_the_service(&self) -> bool {
        !self.expected_to_be_handled()
    }
}

impl fmt::Display for ActionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionCode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| crate::Error::Protocol(format!("unknown action \"{}\"", s)))
    }
}
