//! The media engine that captures, encodes and transmits.

use std::fmt;
use std::sync::Arc;

use url::Url;

use camcast_ipc::{AspectMode, ConfigSnapshot, DeviceDescriptor, LogLevel, MixerSlot};

use crate::device::DeviceHandle;
use crate::DeviceResult;

/// Factory for engine sessions plus device discovery.
pub trait BroadcastEngine: Send + Sync {
    /// Devices currently available for attachment.
    fn list_available_devices(&self) -> Vec<DeviceDescriptor>;

    /// Build a session from a configuration snapshot.
    ///
    /// The listener receives every lifecycle and statistics callback of the
    /// session, from any engine thread.
    fn create_session(
        &self,
        config: &ConfigSnapshot,
        listener: Arc<dyn SessionListener>,
    ) -> DeviceResult<Arc<dyn EngineSession>>;
}

/// A live engine session owning a compositing mixer.
///
/// Device and mixer calls are only issued from the session's serialized
/// device context; implementations need not order concurrent mutations
/// themselves.
pub trait EngineSession: Send + Sync {
    /// Attach an available device.
    fn attach_device(&self, descriptor: &DeviceDescriptor) -> DeviceResult<DeviceHandle>;

    /// Detach a previously attached device.
    fn detach_device(&self, device: &DeviceHandle) -> DeviceResult<()>;

    /// Atomically replace an attached device with a new one.
    ///
    /// The new device inherits the mixer binding of the old one; the mixer
    /// never observes the slot without a source.
    fn exchange_devices(
        &self,
        old: &DeviceHandle,
        new: &DeviceDescriptor,
    ) -> DeviceResult<DeviceHandle>;

    /// Create an image-backed input source. It is attached but unbound.
    fn create_image_source(&self) -> DeviceResult<DeviceHandle>;

    /// Add a slot to the mixer.
    fn add_slot(&self, slot: &MixerSlot) -> DeviceResult<()>;

    /// Remove a slot from the mixer.
    fn remove_slot(&self, name: &str) -> DeviceResult<()>;

    /// Bind a device to a mixer slot.
    fn bind(&self, device: &DeviceHandle, slot: &str) -> DeviceResult<()>;

    /// Unbind a device from whatever slot it feeds.
    fn unbind(&self, device: &DeviceHandle) -> DeviceResult<()>;

    /// Preview of the composited output.
    fn preview_view(&self, aspect: AspectMode) -> DeviceResult<Box<dyn PreviewView>>;

    /// Begin transmission.
    fn start(&self, endpoint: &Url, stream_key: &str) -> DeviceResult<()>;

    /// End transmission.
    fn stop(&self);

    /// Identifier of the current (or last) transmission.
    fn session_id(&self) -> String;

    /// Whether the session can start transmitting.
    fn is_ready(&self) -> bool;

    /// Change engine verbosity.
    fn set_log_level(&self, level: LogLevel);

    /// Release every engine resource. The session is unusable afterwards.
    fn release(&self);
}

/// Handle to a rendered preview of the session output.
pub trait PreviewView: Send {
    fn aspect_mode(&self) -> AspectMode;

    fn set_mirrored(&mut self, mirrored: bool);

    fn is_mirrored(&self) -> bool;
}

/// Callbacks emitted by an engine session.
///
/// Callbacks may arrive on any thread and must not block.
pub trait SessionListener: Send + Sync {
    fn on_error(&self, error: EngineError);

    fn on_state_changed(&self, state: BroadcastState);

    fn on_audio_stats(&self, peak: f64, rms: f64);

    fn on_transmission_stats_changed(&self, stats: TransmissionStatistics);

    /// Scalar quality from engines predating transmission statistics.
    fn on_broadcast_quality_changed(&self, quality: f64);

    /// Scalar network health from engines predating transmission statistics.
    fn on_network_health_changed(&self, health: f64);
}

/// Error reported by the engine through [`SessionListener::on_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub code: i32,
    pub detail: String,
    /// Component that raised the error.
    pub source: String,
    pub is_fatal: bool,
    /// Engine error category name.
    pub error_type: String,
}

/// Connection state of an engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BroadcastState {
    Invalid,
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl BroadcastState {
    /// Returns the engine's name for this state.
    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for BroadcastState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Network health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkHealth {
    Excellent,
    High,
    Medium,
    Low,
    Bad,
}

impl NetworkHealth {
    pub fn name(self) -> &'static str {
        match self {
            Self::Excellent => "EXCELLENT",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Bad => "BAD",
        }
    }
}

/// Broadcast quality classification relative to the configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BroadcastQuality {
    NearMaximum,
    High,
    Medium,
    Low,
    NearMinimum,
}

impl BroadcastQuality {
    pub fn name(self) -> &'static str {
        match self {
            Self::NearMaximum => "NEAR_MAXIMUM",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::NearMinimum => "NEAR_MINIMUM",
        }
    }
}

/// Transmission statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmissionStatistics {
    /// Round trip time in milliseconds.
    pub round_trip_time: f64,
    pub measured_bitrate: f64,
    pub recommended_bitrate: f64,
    pub network_health: NetworkHealth,
    pub broadcast_quality: BroadcastQuality,
}
