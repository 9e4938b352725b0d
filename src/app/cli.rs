//! Command-Line Interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// TouchFree service - turn hand tracking into input actions for WebSocket clients
#[derive(Parser, Debug)]
#[command(name = "tf-service")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the service
    Serve {
        /// Listen on this port instead of the configured one
        #[arg(short, long)]
        port: Option<u16>,

        /// Hand frame recording to use as the tracking source
        #[arg(short, long)]
        replay: Option<PathBuf>,

        /// Start the recording again when it ends
        #[arg(long, requires = "replay")]
        loop_replay: bool,
    },

    /// Connect to a running service and print what it sends
    Connect {
        /// Service URL (defaults to the configured address)
        #[arg(short, long)]
        url: Option<String>,

        /// Seconds to stay connected (0 = until stopped)
        #[arg(short, long, default_value = "0")]
        duration: u64,
    },

    /// Write default settings and config files
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// View or modify service settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current settings
    Show,

    /// Set a settings value
    Set {
        /// Dotted key (e.g. "server.port", "tuning.enable_one_euro_filter")
        key: String,

        value: String,
    },

    /// Get a settings value
    Get {
        key: String,
    },

    /// Reset settings to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Settings file to use, honouring `--config`
    pub fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(super::config::Settings::default_path)
    }
}
