//! Interaction and physical configuration
//!
//! Typed configuration with partial-update tracking, the static schema that
//! change requests are validated against, file persistence, and the live
//! `ConfigManager`.

pub mod types;
pub mod schema;
pub mod store;
pub mod manager;

pub use types::{
    ConfigVector, ConfigurationState, HoverAndHoldConfig, InteractionConfig, InteractionConfigPartial,
    InteractionType, PhysicalConfig, PhysicalConfigPartial, TouchPlaneConfig, TrackedPosition,
};
pub use schema::{validate_config_request, SchemaError};
pub use store::{ConfigFileKind, ConfigStore, JsonFileStore, MemoryStore};
pub use manager::ConfigManager;
