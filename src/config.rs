//! Breaker settings from TOML.
//!
//! ```toml
//! error_threshold = 3
//! cooldown_secs = 30
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::circuit_breaker::Settings;
use crate::error::SettingsError;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config: {0}")]
	Io(#[from] std::io::Error),
	#[error("failed to parse config: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("invalid config: {0}")]
	Invalid(#[from] SettingsError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
	error_threshold: usize,
	cooldown_secs: u64,
}

impl Default for SettingsFile {
	fn default() -> Self {
		let settings = Settings::default();
		Self {
			error_threshold: settings.error_threshold(),
			cooldown_secs: settings.cooldown().as_secs(),
		}
	}
}

impl From<SettingsFile> for Settings {
	fn from(file: SettingsFile) -> Self {
		Settings::new(file.error_threshold, Duration::from_secs(file.cooldown_secs))
	}
}

pub fn parse_settings(content: &str) -> Result<Settings, ConfigError> {
	let file: SettingsFile = toml::from_str(content)?;
	let settings = Settings::from(file);
	settings.validate()?;
	Ok(settings)
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
	let content = fs::read_to_string(path)?;
	parse_settings(&content)
}
