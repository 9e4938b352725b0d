//! Service settings
//!
//! How the service itself runs: where it listens, how fast it ticks, how
//! queues behave. Interaction and physical configuration are separate JSON
//! files owned by `config::ConfigManager`; `[paths]` says where they live.

use crate::positioning::PositionTuning;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub tick: TickSettings,
    #[serde(default)]
    pub queues: QueueSettings,
    /// Optional position filters
    #[serde(default)]
    pub tuning: PositionTuning,
    #[serde(default)]
    pub correlation: CorrelationSettings,
    #[serde(default)]
    pub paths: PathSettings,
}

/// WebSocket listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub address: String,
    pub port: u16,
    /// Largest inbound message accepted
    pub max_message_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 9739,
            max_message_bytes: 1 << 20,
        }
    }
}

impl ServerSettings {
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn url(&self) -> String {
        format!("ws://{}/connect", self.socket_address())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickSettings {
    pub rate_hz: u32,
    /// Status is polled every this many ticks
    pub slow_update_divisor: u32,
}

impl Default for TickSettings {
    fn default() -> Self {
        Self {
            rate_hz: 60,
            slow_update_divisor: 4,
        }
    }
}

impl TickSettings {
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz.max(1) as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Backlog size the input action queue culls down to
    pub input_cull_to_count: usize,
    /// Hand frame ring buffer size; must be a power of two
    pub frame_ring_capacity: usize,
    /// Requests each category holds before new ones are rejected
    pub request_queue_capacity: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            input_cull_to_count: crate::queue::input_queue::DEFAULT_CULL_TO_COUNT,
            frame_ring_capacity: crate::tracking::frame_buffer::DEFAULT_CAPACITY,
            request_queue_capacity: crate::queue::DEFAULT_MESSAGE_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationSettings {
    /// Unanswered requests are forgotten after this long
    pub expiry_secs: u64,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            expiry_secs: crate::correlation::store::DEFAULT_EXPIRY.as_secs(),
        }
    }
}

impl CorrelationSettings {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Directory holding the interaction and physical config files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<PathBuf>,
}

impl PathSettings {
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone().unwrap_or_else(Settings::default_dir)
    }
}

impl Settings {
    /// Check values are usable; reports the first bad one
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.server.address.trim().is_empty() {
            return Err(crate::Error::Config("server.address must not be empty".to_string()));
        }
        if self.server.max_message_bytes < 1024 {
            return Err(crate::Error::Config(format!(
                "server.max_message_bytes must be at least 1024, got {}",
                self.server.max_message_bytes
            )));
        }
        if !(1..=1000).contains(&self.tick.rate_hz) {
            return Err(crate::Error::Config(format!(
                "tick.rate_hz must be in [1, 1000], got {}",
                self.tick.rate_hz
            )));
        }
        if self.tick.slow_update_divisor == 0 {
            return Err(crate::Error::Config("tick.slow_update_divisor must be > 0".to_string()));
        }
        let capacity = self.queues.frame_ring_capacity;
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(crate::Error::Config(format!(
                "queues.frame_ring_capacity must be a power of 2, got {}",
                capacity
            )));
        }
        if self.queues.request_queue_capacity == 0 {
            return Err(crate::Error::Config("queues.request_queue_capacity must be > 0".to_string()));
        }
        if self.correlation.expiry_secs == 0 {
            return Err(crate::Error::Config("correlation.expiry_secs must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn load(path: &PathBuf) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings from the default location, or defaults if there is no file
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &PathBuf) -> Result<(), crate::Error> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn save_default(&self) -> Result<(), crate::Error> {
        self.save(&Self::default_path())
    }

    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("touchfree"))
            .unwrap_or_else(|| PathBuf::from("touchfree"))
    }

    pub fn default_path() -> PathBuf {
        Self::default_dir().join("service.toml")
    }

    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Value at a dotted key such as `server.port`
    pub fn get_value(&self, key: &str) -> Option<toml::Value> {
        let root = toml::Value::try_from(self).ok()?;
        key.split('.')
            .try_fold(&root, |value, part| value.get(part))
            .cloned()
    }

    /// Copy of these settings with `key` set to `raw`.
    ///
    /// `raw` is read as a TOML value (`9000`, `true`, `"text"`); anything
    /// that does not parse is taken as a bare string. The key must already
    /// exist and the result must validate.
    pub fn with_value(&self, key: &str, raw: &str) -> Result<Self, crate::Error> {
        let mut root = toml::Value::try_from(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        let value = parse_value(raw);

        let (path, leaf) = match key.rsplit_once('.') {
            Some((path, leaf)) => (Some(path), leaf),
            None => (None, key),
        };
        let mut table = &mut root;
        for part in path.into_iter().flat_map(|p| p.split('.')) {
            table = table
                .get_mut(part)
                .ok_or_else(|| crate::Error::Config(format!("unknown settings key '{}'", key)))?;
        }
        let table = table
            .as_table_mut()
            .ok_or_else(|| crate::Error::Config(format!("'{}' is not a settings section", key)))?;

        // config_dir is left out of the table while unset
        if !table.contains_key(leaf) && key != "paths.config_dir" {
            return Err(crate::Error::Config(format!("unknown settings key '{}'", key)));
        }
        table.insert(leaf.to_string(), value);

        let settings: Self = root
            .try_into()
            .map_err(|e: toml::de::Error| crate::Error::Config(format!("invalid value for '{}': {}", key, e)))?;
        settings.validate()?;
        Ok(settings)
    }
}

fn parse_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("v = {}", raw))
        .ok()
        .and_then(|mut table| table.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
