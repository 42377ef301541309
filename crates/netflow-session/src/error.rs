//! Error types for session cache configuration.
//!
//! Cache operations themselves never fail: a missing template is `None` and a
//! sequence discontinuity is reported through [`SequenceCheck`](crate::SequenceCheck).

/// Error type for session cache configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration value is out of range.
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    /// The configuration document could not be parsed.
    #[error("Failed to parse session configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for session cache configuration.
pub type Result<T> = std::result::Result<T, Error>;
