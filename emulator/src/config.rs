//! Optional TOML overrides for the tracker configuration.
//!
//! ```toml
//! sample_interval_ms = 50
//! flush_interval_ms = 5000
//! step_threshold_g = 1.3
//! debounce_ms = 300
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use stride_core::config::TrackerConfig;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TrackerOverrides {
    pub sample_interval_ms: Option<u64>,
    pub flush_interval_ms: Option<u64>,
    pub step_threshold_g: Option<f32>,
    pub debounce_ms: Option<u64>,
}

impl TrackerOverrides {
    /// Reads overrides from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or holds unknown keys.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parses overrides from TOML text.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML, unknown keys, or mistyped values.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    #[must_use]
    pub fn apply(&self, mut config: TrackerConfig) -> TrackerConfig {
        if let Some(ms) = self.sample_interval_ms {
            config.sample_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.flush_interval_ms {
            config.flush_interval = Duration::from_millis(ms);
        }
        if let Some(threshold) = self.step_threshold_g {
            config.detector.threshold_g = threshold;
        }
        if let Some(ms) = self.debounce_ms {
            config.detector.debounce = Duration::from_millis(ms);
        }
        config
    }
}

/// Builds the tracker configuration from defaults plus an optional override file.
///
/// # Errors
///
/// Fails when the file cannot be loaded or the result does not validate.
pub fn load_tracker_config(path: Option<&Path>) -> anyhow::Result<TrackerConfig> {
    let overrides = match path {
        Some(path) => TrackerOverrides::load(path)?,
        None => TrackerOverrides::default(),
    };
    let config = overrides.apply(TrackerConfig::default());
    config
        .validate()
        .context("tracker configuration rejected")?;
    Ok(config)
}
