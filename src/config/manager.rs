//! Live configuration state
//!
//! `ConfigManager` owns the current interaction and physical config, loads
//! them from the store at startup, merges validated partial changes, and
//! notifies observers through `watch` channels. A receiver obtained from
//! `subscribe_*` starts out marked as changed, so a subscriber that arrives
//! after the config was loaded still sees the current value once.

use super::store::{ConfigFileKind, ConfigStore};
use super::types::{
    ConfigurationState, InteractionConfig, InteractionConfigPartial, PhysicalConfig, PhysicalConfigPartial,
};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Outcome of reading one config file
enum Loaded<T> {
    Found(T),
    Missing,
    Invalid,
}

pub struct ConfigManager {
    store: Arc<dyn ConfigStore>,
    interaction: watch::Sender<InteractionConfig>,
    physical: watch::Sender<PhysicalConfig>,
    state: ConfigurationState,
}

impl ConfigManager {
    /// Manager holding defaults, not yet loaded
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        let (interaction, _) = watch::channel(InteractionConfig::default());
        let (physical, _) = watch::channel(PhysicalConfig::default());
        Self {
            store,
            interaction,
            physical,
            state: ConfigurationState::NotLoaded,
        }
    }

    /// Create and load from the store.
    ///
    /// A missing file is written out with defaults. A file that fails to
    /// parse leaves defaults in place and marks the state errored.
    pub fn load(store: Arc<dyn ConfigStore>) -> Self {
        let mut manager = Self::new(store);
        manager.reload();
        manager
    }

    pub fn reload(&mut self) {
        let mut errored = false;

        match read_file::<InteractionConfig>(self.store.as_ref(), ConfigFileKind::Interaction) {
            Loaded::Found(config) => {
                self.interaction.send_replace(config);
            }
            Loaded::Missing => {
                let defaults = InteractionConfig::default();
                write_defaults(self.store.as_ref(), ConfigFileKind::Interaction, &defaults);
                self.interaction.send_replace(defaults);
            }
            Loaded::Invalid => errored = true,
        }

        match read_file::<PhysicalConfig>(self.store.as_ref(), ConfigFileKind::Physical) {
            Loaded::Found(config) => {
                self.physical.send_replace(config);
            }
            Loaded::Missing => {
                let defaults = PhysicalConfig::default();
                write_defaults(self.store.as_ref(), ConfigFileKind::Physical, &defaults);
                self.physical.send_replace(defaults);
            }
            Loaded::Invalid => errored = true,
        }

        self.state = if errored {
            ConfigurationState::Errored
        } else {
            ConfigurationState::Loaded
        };
        info!(state = ?self.state, "Configuration loaded");
    }

    pub fn configuration_state(&self) -> ConfigurationState {
        self.state
    }

    pub fn interaction(&self) -> InteractionConfig {
        self.interaction.borrow().clone()
    }

    pub fn physical(&self) -> PhysicalConfig {
        self.physical.borrow().clone()
    }

    /// Observe interaction config; the first `has_changed` is always true
    pub fn subscribe_interaction(&self) -> watch::Receiver<InteractionConfig> {
        let mut rx = self.interaction.subscribe();
        rx.mark_changed();
        rx
    }

    /// Observe physical config; the first `has_changed` is always true
    pub fn subscribe_physical(&self) -> watch::Receiver<PhysicalConfig> {
        let mut rx = self.physical.subscribe();
        rx.mark_changed();
        rx
    }

    /// Merge partial changes onto live state. Observers are notified only
    /// for the configs that actually changed.
    pub fn apply_partial(
        &self,
        interaction: Option<&InteractionConfigPartial>,
        physical: Option<&PhysicalConfigPartial>,
    ) -> bool {
        let mut changed = false;
        if let Some(partial) = interaction {
            changed |= self.interaction.send_if_modified(|config| config.apply(partial));
        }
        if let Some(partial) = physical {
            changed |= self.physical.send_if_modified(|config| config.apply(partial));
        }
        changed
    }

    /// Contents of the persisted files, with defaults for missing or
    /// unreadable ones
    pub fn file_state(&self) -> Result<(InteractionConfig, PhysicalConfig)> {
        let interaction = self
            .store
            .load(ConfigFileKind::Interaction)?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        let physical = self
            .store
            .load(ConfigFileKind::Physical)?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Ok((interaction, physical))
    }

    /// Merge partial changes onto the persisted files, save them, then make
    /// the saved result the live state
    pub fn apply_file_change(
        &mut self,
        interaction: Option<&InteractionConfigPartial>,
        physical: Option<&PhysicalConfigPartial>,
    ) -> Result<()> {
        let (mut file_interaction, mut file_physical) = self.file_state()?;

        if let Some(partial) = interaction {
            file_interaction.apply(partial);
            self.store
                .save(ConfigFileKind::Interaction, &serde_json::to_string_pretty(&file_interaction)?)?;
        }
        if let Some(partial) = physical {
            file_physical.apply(partial);
            self.store
                .save(ConfigFileKind::Physical, &serde_json::to_string_pretty(&file_physical)?)?;
        }

        self.interaction.send_if_modified(|live| {
            let changed = *live != file_interaction;
            *live = file_interaction;
            changed
        });
        self.physical.send_if_modified(|live| {
            let changed = *live != file_physical;
            *live = file_physical;
            changed
        });
        self.state = ConfigurationState::Loaded;
        Ok(())
    }
}

fn read_file<T: DeserializeOwned>(store: &dyn ConfigStore, kind: ConfigFileKind) -> Loaded<T> {
    match store.load(kind) {
        Ok(Some(contents)) => match serde_json::from_str(&contents) {
            Ok(config) => Loaded::Found(config),
            Err(e) => {
                warn!(file = kind.file_name(), error = %e, "Config file could not be parsed, using defaults");
                Loaded::Invalid
            }
        },
        Ok(None) => Loaded::Missing,
        Err(e) => {
            warn!(file = kind.file_name(), error = %e, "Config file could not be read, using defaults");
            Loaded::Invalid
        }
    }
}

fn write_defaults<T: Serialize>(store: &dyn ConfigStore, kind: ConfigFileKind, defaults: &T) {
    let result = serde_json::to_string_pretty(defaults)
        .map_err(crate::Error::from)
        .and_then(|json| store.save(kind, &json));
    if let Err(e) = result {
        warn!(file = kind.file_name(), error = %e, "Could not write default config file");
    }
}
