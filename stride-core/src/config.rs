//! Tracker tunables shared by the agent runtime and the host tooling.

use core::{fmt, time::Duration};

pub use crate::motion::DetectorConfig;

/// Reference sensor sampling interval.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Reference period between upload attempts.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

/// Timing and detection parameters for a tracking session.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TrackerConfig {
    pub sample_interval: Duration,
    pub flush_interval: Duration,
    pub detector: DetectorConfig,
}

impl TrackerConfig {
    #[must_use]
    pub const fn new(
        sample_interval: Duration,
        flush_interval: Duration,
        detector: DetectorConfig,
    ) -> Self {
        Self {
            sample_interval,
            flush_interval,
            detector,
        }
    }

    /// Returns a copy with a different flush interval.
    #[must_use]
    pub const fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Returns a copy with a different sample interval.
    #[must_use]
    pub const fn with_sample_interval(mut self, sample_interval: Duration) -> Self {
        self.sample_interval = sample_interval;
        self
    }

    /// Checks that the configuration can drive a session.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval.is_zero() {
            return Err(ConfigError::ZeroSampleInterval);
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::ZeroFlushInterval);
        }
        let threshold = self.detector.threshold_g;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold);
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_SAMPLE_INTERVAL,
            DEFAULT_FLUSH_INTERVAL,
            DetectorConfig::default(),
        )
    }
}

/// Reasons a [`TrackerConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    ZeroSampleInterval,
    ZeroFlushInterval,
    InvalidThreshold,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroSampleInterval => f.write_str("sample interval must be non-zero"),
            ConfigError::ZeroFlushInterval => f.write_str("flush interval must be non-zero"),
            ConfigError::InvalidThreshold => {
                f.write_str("step threshold must be a positive, finite g value")
            }
        }
    }
}

impl core::error::Error for ConfigError {}
