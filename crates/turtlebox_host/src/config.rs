use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use turtlebox::{Defaults, MAX_SPEED};

use crate::InputPolicy;

/// Human-readable phase descriptions for `status` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusText {
    pub loading: String,
    pub running: String,
}

impl Default for StatusText {
    fn default() -> StatusText {
        StatusText {
            loading: String::from("Loading runtime…"),
            running: String::from("Running…"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub canvas: Defaults,
    pub input_policy: InputPolicy,
    pub status: StatusText,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("pen size must be a positive number, not {0}")]
    PenSize(f64),
    #[error("speed must be between 0 and 10, not {0}")]
    Speed(u8),
}

impl Config {
    pub fn from_toml(text: &str) -> anyhow::Result<Config> {
        let config: Config = toml::from_str(text).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Config> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Config::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let size = self.canvas.pen_size;
        if !size.is_finite() || size <= 0.0 {
            return Err(ConfigError::PenSize(size));
        }
        if self.canvas.speed > MAX_SPEED {
            return Err(ConfigError::Speed(self.canvas.speed));
        }
        Ok(())
    }
}
