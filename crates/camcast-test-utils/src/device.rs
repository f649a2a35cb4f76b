//! A fake device answering every capability view its type allows.

use parking_lot::Mutex;

use camcast_device::{
    AudioDevice, CameraCapabilities, CameraDevice, CameraOptions, Device, DeviceError,
    DeviceResult, ImageSurface, RasterImage, UNITY_GAIN,
};
use camcast_ipc::{DeviceDescriptor, DeviceType, Size};

#[derive(Debug, Default)]
struct Surface {
    size: Option<Size>,
    draws: usize,
}

/// In-memory device.
///
/// Microphones expose gain, cameras expose zoom, image sources expose a
/// drawable surface. Every setting is recorded for inspection.
#[derive(Debug)]
pub struct FakeDevice {
    descriptor: DeviceDescriptor,
    capabilities: CameraCapabilities,
    gain: Mutex<f32>,
    zoom: Mutex<Option<f32>>,
    surface: Mutex<Surface>,
}

impl FakeDevice {
    pub fn new(descriptor: DeviceDescriptor, capabilities: CameraCapabilities) -> Self {
        Self {
            descriptor,
            capabilities,
            gain: Mutex::new(UNITY_GAIN),
            zoom: Mutex::new(None),
            surface: Mutex::new(Surface::default()),
        }
    }

    /// Current output gain.
    pub fn gain(&self) -> f32 {
        *self.gain.lock()
    }

    /// Last zoom factor applied, if any.
    pub fn zoom(&self) -> Option<f32> {
        *self.zoom.lock()
    }

    /// Size of the backing surface, once set.
    pub fn surface_size(&self) -> Option<Size> {
        self.surface.lock().size
    }

    /// Number of successful draws into the surface.
    pub fn draw_count(&self) -> usize {
        self.surface.lock().draws
    }
}

impl Device for FakeDevice {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn as_audio(&self) -> Option<&dyn AudioDevice> {
        self.descriptor.device_type.is_audio().then_some(self as &dyn AudioDevice)
    }

    fn as_camera(&self) -> Option<&dyn CameraDevice> {
        (self.descriptor.device_type == DeviceType::Camera).then_some(self as &dyn CameraDevice)
    }

    fn as_image_surface(&self) -> Option<&dyn ImageSurface> {
        (self.descriptor.device_type == DeviceType::UserImage).then_some(self as &dyn ImageSurface)
    }
}

impl AudioDevice for FakeDevice {
    fn set_gain(&self, gain: f32) {
        *self.gain.lock() = gain;
    }

    fn gain(&self) -> f32 {
        FakeDevice::gain(self)
    }
}

impl CameraDevice for FakeDevice {
    fn capabilities(&self) -> CameraCapabilities {
        self.capabilities
    }

    fn set_options(&self, options: CameraOptions) {
        *self.zoom.lock() = Some(options.zoom_factor);
    }
}

impl ImageSurface for FakeDevice {
    fn set_size(&self, width: u32, height: u32) {
        self.surface.lock().size = Some(Size::new(width, height));
    }

    fn draw(&self, image: &RasterImage) -> DeviceResult<()> {
        if !image.is_valid() {
            return Err(DeviceError::ImageDraw(format!(
                "{} bytes for {}x{}",
                image.data.len(),
                image.width,
                image.height
            )));
        }
        self.surface.lock().draws += 1;
        Ok(())
    }
}
