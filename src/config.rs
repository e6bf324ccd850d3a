//! Room session configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::error::ConfigError;

fn default_true() -> bool {
    true
}

fn default_topic_prefix() -> String {
    "room_".to_string()
}

/// Feature switches for a room session.
///
/// Every field has a default, so an empty TOML document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Only the occupant holding the current mark may move.
    #[serde(default = "default_true")]
    pub identity_gating: bool,

    /// Append lifecycle events to the event store.
    #[serde(default = "default_true")]
    pub event_logging: bool,

    /// Channel topic is this prefix followed by the room id.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Ignore `game_update`s carrying an older version than the applied one.
    #[serde(default)]
    pub reject_stale_updates: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            identity_gating: true,
            event_logging: true,
            topic_prefix: default_topic_prefix(),
            reject_stale_updates: false,
        }
    }
}

impl RoomConfig {
    /// Channel topic for `room_id`.
    pub fn topic_for(&self, room_id: &str) -> String {
        format!("{}{}", self.topic_prefix, room_id)
    }

    /// Parse configuration from TOML text.
    #[instrument(skip(content))]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        debug!(?config, "Config parsed");
        Ok(config)
    }

    /// Load configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        info!("Config loaded");
        Ok(config)
    }
}
