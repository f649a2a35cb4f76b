//! Error types for engine and device operations.

use thiserror::Error;

/// Errors reported by the media engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// No device with the given URN is available.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The device is not attached to the session.
    #[error("Device not attached: {0}")]
    NotAttached(String),

    /// The mixer has no slot with the given name.
    #[error("Mixer slot not found: {0}")]
    SlotNotFound(String),

    /// Operation not supported by this engine or device.
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    /// Drawing into an image surface failed.
    #[error("Failed to draw image: {0}")]
    ImageDraw(String),

    /// Engine-specific failure.
    #[error("Engine error {code}: {message}")]
    Engine { code: i32, message: String },
}

/// Result type for engine and device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;
