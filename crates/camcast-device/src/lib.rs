//! Media engine collaborator interfaces.
//!
//! This crate describes what the session needs from the platform media
//! engine: device discovery and attachment, a compositing mixer, image-backed
//! input surfaces, transmission control, lifecycle callbacks, and image
//! loading for overlays.

mod device;
mod engine;
mod error;
mod image;

pub use device::{
    AudioDevice, CameraCapabilities, CameraDevice, CameraOptions, Device, DeviceHandle,
    ImageSurface,
};
pub use engine::{
    BroadcastEngine, BroadcastQuality, BroadcastState, EngineError, EngineSession, NetworkHealth,
    PreviewView, SessionListener, TransmissionStatistics,
};
pub use error::{DeviceError, DeviceResult};
pub use image::{ImageLoader, RasterImage, ThreadedImageLoader};

/// Smallest zoom factor a camera accepts.
pub const MIN_ZOOM_FACTOR: f32 = 1.0;

/// Full output gain.
pub const UNITY_GAIN: f32 = 1.0;

/// Silenced output gain.
pub const MUTED_GAIN: f32 = 0.0;
