//! Configuration for the session cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sequence::MAX_SEQUENCE_DIFFERENCE;

/// Default interval between cleanup sweeps (30 minutes).
///
/// Entries are evicted after two idle sweeps, so an unused template lives
/// between one and two intervals.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 30 * 60;

/// Session cache configuration.
///
/// ```toml
/// [session]
/// cleanup_interval_secs = 1800
/// max_sequence_difference = 1000
/// shared_templates = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interval in seconds between cleanup sweeps.
    pub cleanup_interval_secs: u64,

    /// Largest sequence gap, in either direction, tolerated without a reset.
    pub max_sequence_difference: u32,

    /// Share templates between all exporters with the same source ID.
    pub shared_templates: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            max_sequence_difference: MAX_SEQUENCE_DIFFERENCE,
            shared_templates: false,
        }
    }
}

/// Document wrapper for configs nested under `[session]`.
#[derive(Deserialize)]
struct Document {
    session: SessionConfig,
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cleanup interval. Sub-second precision is truncated.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval_secs = interval.as_secs();
        self
    }

    /// Set the sequence gap tolerance.
    pub fn with_max_sequence_difference(mut self, max: u32) -> Self {
        self.max_sequence_difference = max;
        self
    }

    /// Enable or disable template sharing across exporters.
    pub fn with_shared_templates(mut self, shared: bool) -> Self {
        self.shared_templates = shared;
        self
    }

    /// Interval between cleanup sweeps.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Check that all values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.cleanup_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "cleanup_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_sequence_difference == 0 {
            return Err(Error::InvalidConfig(
                "max_sequence_difference must be greater than zero".to_string(),
            ));
        }
        if self.max_sequence_difference >= 1 << 31 {
            return Err(Error::InvalidConfig(format!(
                "max_sequence_difference {} disables gap detection (must be below 2^31)",
                self.max_sequence_difference
            )));
        }
        Ok(())
    }

    /// Parse and validate a configuration from TOML.
    ///
    /// Accepts either a document with a `[session]` table or the bare table
    /// contents.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let value: toml::Table = toml::from_str(input)?;
        let config = if value.contains_key("session") {
            toml::from_str::<Document>(input)?.session
        } else {
            toml::from_str::<SessionConfig>(input)?
        };
        config.validate()?;
        Ok(config)
    }
}
