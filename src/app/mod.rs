//! Application Layer
//!
//! CLI and service settings.

pub mod cli;
pub mod config;

pub use cli::Cli;
pub use config::Settings;
