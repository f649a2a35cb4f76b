//! Configuration error types.

use thiserror::Error;

/// Errors raised while resolving or composing configuration.
///
/// These are always reported synchronously, before any engine state is
/// touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Preset name is not one of the recognized presets.
    #[error("Does not support configuration preset: {0}")]
    UnknownPreset(String),

    /// Override values are inconsistent or out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Token does not name a value of the given kind.
    #[error("Does not support {kind}: {value}")]
    UnknownEnumValue {
        /// Human readable token kind (e.g. "log level").
        kind: &'static str,

        /// The rejected token.
        value: String,
    },
}

impl ConfigError {
    pub(crate) fn unknown(kind: &'static str, value: &str) -> Self {
        Self::UnknownEnumValue {
            kind,
            value: value.to_string(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
