//! Session configuration, loaded from JSON.

use crate::error::ConfigError;
use crate::sdk::LcdType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Options for [`DeviceSession::open`](crate::session::DeviceSession::open).
///
/// Every field has a default, so `{}` is a valid config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Applet name shown by the vendor LCD manager. Fixed after init.
    pub applet_name: String,
    /// Panel to drive; `none` for a G-key-only session.
    pub lcd_type: LcdType,
    /// Suppress identical (device, index, pressed) events closer than this.
    pub debounce_millis: u64,
    /// Event queue size; on overflow the oldest event is dropped.
    pub queue_capacity: usize,
    /// How long `close` waits for an in-flight callback.
    pub close_grace_millis: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            applet_name: "g-broker".into(),
            lcd_type: LcdType::Mono,
            debounce_millis: 0,
            queue_capacity: 1024,
            close_grace_millis: 50,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.applet_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "applet_name",
                reason: "must not be empty",
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "queue_capacity",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}

/// Read and validate a JSON config file.
pub fn load_config(path: &Path) -> Result<SessionConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let config = parse_config(&raw)?;
    debug!(path = %path.display(), ?config, "Loaded session config");
    Ok(config)
}

pub fn parse_config(json: &str) -> Result<SessionConfig, ConfigError> {
    let config: SessionConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}
