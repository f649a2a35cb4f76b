//! Attached device handles and their capability views.

use std::fmt;
use std::sync::Arc;

use camcast_ipc::{DeviceDescriptor, DeviceType};

use crate::image::RasterImage;
use crate::DeviceResult;

/// Shared handle to a device attached to an engine session.
pub type DeviceHandle = Arc<dyn Device>;

/// A device attached to an engine session.
///
/// Capabilities are exposed as optional views rather than downcasts: a
/// microphone answers [`Device::as_audio`], a camera answers
/// [`Device::as_camera`], an image-backed input answers
/// [`Device::as_image_surface`].
pub trait Device: Send + Sync {
    /// Descriptor the device was attached from.
    fn descriptor(&self) -> &DeviceDescriptor;

    /// Gain control, for audio-producing devices.
    fn as_audio(&self) -> Option<&dyn AudioDevice> {
        None
    }

    /// Zoom and capability queries, for cameras.
    fn as_camera(&self) -> Option<&dyn CameraDevice> {
        None
    }

    /// Drawable backing surface, for image-backed inputs.
    fn as_image_surface(&self) -> Option<&dyn ImageSurface> {
        None
    }

    /// Unique identifier of the device.
    fn urn(&self) -> &str {
        &self.descriptor().urn
    }

    /// Kind of device.
    fn device_type(&self) -> DeviceType {
        self.descriptor().device_type
    }
}

impl fmt::Debug for dyn Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("urn", &self.urn())
            .field("type", &self.device_type())
            .finish()
    }
}

/// Audio-producing device.
pub trait AudioDevice: Send + Sync {
    /// Set the output gain (0.0 silences without detaching).
    fn set_gain(&self, gain: f32);

    /// Current output gain.
    fn gain(&self) -> f32;
}

/// Static zoom capabilities of a camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraCapabilities {
    pub zoom_supported: bool,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl Default for CameraCapabilities {
    fn default() -> Self {
        Self {
            zoom_supported: false,
            min_zoom: 1.0,
            max_zoom: 1.0,
        }
    }
}

/// Dynamic camera options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraOptions {
    pub zoom_factor: f32,
}

/// Camera device.
pub trait CameraDevice: Send + Sync {
    /// Zoom capabilities.
    fn capabilities(&self) -> CameraCapabilities;

    /// Apply dynamic options.
    fn set_options(&self, options: CameraOptions);
}

/// Image-backed input source whose surface is drawn by the application.
pub trait ImageSurface: Send + Sync {
    /// Resize the backing surface.
    fn set_size(&self, width: u32, height: u32);

    /// Draw a decoded image at the surface origin.
    fn draw(&self, image: &RasterImage) -> DeviceResult<()>;
}
