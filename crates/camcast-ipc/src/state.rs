//! Session lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a broadcast session.
///
/// `Uninitialized -> Initialized` via `initialize()`,
/// `Initialized <-> Broadcasting` via `start()`/`stop()`, and back to
/// `Uninitialized` from either via `deinitialize()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No engine session exists.
    #[default]
    Uninitialized,

    /// Engine session built and devices attached.
    Initialized,

    /// Transmission running.
    Broadcasting,
}

impl SessionState {
    /// Returns true once an engine session exists.
    pub fn is_initialized(&self) -> bool {
        !matches!(self, Self::Uninitialized)
    }

    /// Returns true while transmitting.
    pub fn is_broadcasting(&self) -> bool {
        matches!(self, Self::Broadcasting)
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Initialized => "Initialized",
            Self::Broadcasting => "Broadcasting",
        }
    }
}
