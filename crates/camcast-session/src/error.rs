//! Error types for the session orchestrator.

use thiserror::Error;

use camcast_device::DeviceError;
use camcast_ipc::ConfigError;

/// Broad category of a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad preset, token or override. Aborts the triggering call.
    Configuration,

    /// Operation not valid in the current session state.
    Lifecycle,

    /// A device, slot or image was unavailable.
    Resource,

    /// The engine rejected an operation.
    Engine,
}

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `initialize()` called on an initialized session.
    #[error("Broadcast session has already been initialized")]
    AlreadyInitialized,

    /// Lifecycle operation requires an initialized session.
    #[error("Broadcast session is not initialized")]
    NotInitialized,

    /// `stop()` called while not broadcasting.
    #[error("Broadcast session is not broadcasting")]
    NotBroadcasting,

    /// Endpoint is not a valid URL.
    #[error("Can not create a URL instance for {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// A mixer slot with this name already exists.
    #[error("Mixer slot already exists: {0}")]
    DuplicateSlotName(String),

    /// The slot already has a bound input of this kind.
    #[error("Mixer slot {slot} already has a bound {kind} input")]
    SlotOccupied { slot: String, kind: &'static str },

    /// A device or image needed for the operation is unavailable.
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Engine error.
    #[error("Engine error: {0}")]
    Device(#[from] DeviceError),

    /// The serialized device context has shut down.
    #[error("Device queue closed")]
    QueueClosed,

    /// A session worker thread could not be started.
    #[error("Failed to spawn session thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

impl SessionError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::InvalidEndpoint { .. } => ErrorKind::Configuration,
            Self::AlreadyInitialized | Self::NotInitialized | Self::NotBroadcasting => {
                ErrorKind::Lifecycle
            }
            Self::DuplicateSlotName(_) | Self::SlotOccupied { .. } | Self::ResourceUnavailable(_) => {
                ErrorKind::Resource
            }
            Self::Device(_) | Self::QueueClosed | Self::ThreadSpawn(_) => ErrorKind::Engine,
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
