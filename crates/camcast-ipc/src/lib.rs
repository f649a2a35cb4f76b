//! Typed caller<->session messages for camcast.
//!
//! This crate defines the values that cross the session boundary:
//! configuration tokens and snapshots, mixer slot and device descriptions,
//! the declarative overlay list, and the canonical events delivered to the
//! session listener.

mod error;
mod events;
mod state;
mod tokens;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use events::{
    AudioStatsPayload, ErrorPayload, NetworkHealthPayload, QualityPayload, SessionEvent,
    StateChangedPayload, StateMetadata, TransmissionStatisticsPayload,
};
pub use state::SessionState;
pub use tokens::{AspectMode, AudioQuality, AutoBitrateProfile, LogLevel, Preset};
pub use types::{
    AudioConfig, AudioOverrides, BindingInfo, ConfigSnapshot, DeviceDescriptor, DevicePosition,
    DeviceType, MixerSlot, OverlayDescriptor, SessionSettings, Size, Vec2, VideoConfig,
    VideoOverrides, CAMERA_SLOT, CAMERA_SLOT_Z_INDEX, OVERLAY_SLOT_Z_INDEX,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for events (session -> caller).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<SessionEvent>, Receiver<SessionEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
