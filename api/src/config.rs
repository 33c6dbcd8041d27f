use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunables for a render context. Every field has a default, so a config file only needs to
/// name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// How many frames the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,
    /// Initial capacity of new descriptor tables.
    pub descriptor_table_capacity: u32,
    /// Whether new command lists place UAV barriers between back to back unordered accesses.
    pub uav_barriers_enabled_by_default: bool,
    /// Upper bound on how long frame pacing waits for an old frame. `None` waits forever.
    pub command_buffer_wait_timeout_ms: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read render config: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse render config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("invalid render config: {0}")]
    Invalid(&'static str),
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            descriptor_table_capacity: 64,
            uav_barriers_enabled_by_default: true,
            command_buffer_wait_timeout_ms: None,
        }
    }
}

impl RenderConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: RenderConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid("`frames_in_flight` must be at least 1"));
        }
        Ok(())
    }

    #[inline(always)]
    pub fn wait_timeout(&self) -> Option<std::time::Duration> {
        self.command_buffer_wait_timeout_ms
            .map(std::time::Duration::from_millis)
    }
}
