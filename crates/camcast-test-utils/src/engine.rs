//! In-memory media engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

use camcast_device::{
    BroadcastEngine, BroadcastState, CameraCapabilities, Device, DeviceError, DeviceHandle,
    DeviceResult, EngineError, EngineSession, PreviewView, SessionListener,
    TransmissionStatistics,
};
use camcast_ipc::{
    AspectMode, AudioConfig, AudioQuality, AutoBitrateProfile, ConfigSnapshot, DeviceDescriptor,
    DevicePosition, DeviceType, LogLevel, MixerSlot, Size, VideoConfig, CAMERA_SLOT,
};

use crate::device::FakeDevice;

/// URN of the back camera in [`FakeEngine::with_default_devices`].
pub const BACK_CAMERA_URN: &str = "camera:back:0";

/// URN of the microphone in [`FakeEngine::with_default_devices`].
pub const MICROPHONE_URN: &str = "mic:0";

/// Fake engine with a mutable device list.
///
/// Every session it builds is kept so tests can inspect it.
pub struct FakeEngine {
    devices: Mutex<Vec<DeviceDescriptor>>,
    camera_capabilities: Arc<Mutex<CameraCapabilities>>,
    stats_on_attach: Arc<AtomicBool>,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    create_error: Mutex<Option<DeviceError>>,
}

impl FakeEngine {
    pub fn new(devices: Vec<DeviceDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            devices: Mutex::new(devices),
            camera_capabilities: Arc::new(Mutex::new(CameraCapabilities::default())),
            stats_on_attach: Arc::new(AtomicBool::new(false)),
            sessions: Mutex::new(Vec::new()),
            create_error: Mutex::new(None),
        })
    }

    /// Front and back camera plus one microphone.
    pub fn with_default_devices() -> Arc<Self> {
        Self::new(vec![
            DeviceDescriptor::new("camera:front:0", DeviceType::Camera, DevicePosition::Front),
            DeviceDescriptor::new(BACK_CAMERA_URN, DeviceType::Camera, DevicePosition::Back),
            DeviceDescriptor::new(MICROPHONE_URN, DeviceType::Microphone, DevicePosition::Unknown),
        ])
    }

    pub fn set_available_devices(&self, devices: Vec<DeviceDescriptor>) {
        *self.devices.lock() = devices;
    }

    /// Capabilities of cameras attached from now on.
    pub fn set_camera_capabilities(&self, capabilities: CameraCapabilities) {
        *self.camera_capabilities.lock() = capabilities;
    }

    /// When set, sessions report audio stats to their listener right after
    /// every device attach, from the attaching thread.
    pub fn raise_stats_on_attach(&self, enabled: bool) {
        self.stats_on_attach.store(enabled, Ordering::SeqCst);
    }

    /// Make the next `create_session` fail.
    pub fn fail_next_session(&self, error: DeviceError) {
        *self.create_error.lock() = Some(error);
    }

    /// Most recently created session.
    pub fn session(&self) -> Option<Arc<FakeSession>> {
        self.sessions.lock().last().cloned()
    }

    pub fn sessions_created(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Build a session directly, with the given slots and a listener that
    /// drops every callback.
    pub fn open_session(&self, slots: Vec<MixerSlot>) -> Arc<FakeSession> {
        let config = test_snapshot(slots);
        let session = Arc::new(FakeSession::new(
            config,
            Arc::new(NullListener),
            Arc::clone(&self.camera_capabilities),
            Arc::clone(&self.stats_on_attach),
        ));
        self.sessions.lock().push(Arc::clone(&session));
        session
    }
}

impl BroadcastEngine for FakeEngine {
    fn list_available_devices(&self) -> Vec<DeviceDescriptor> {
        self.devices.lock().clone()
    }

    fn create_session(
        &self,
        config: &ConfigSnapshot,
        listener: Arc<dyn SessionListener>,
    ) -> DeviceResult<Arc<dyn EngineSession>> {
        if let Some(error) = self.create_error.lock().take() {
            return Err(error);
        }

        let session = Arc::new(FakeSession::new(
            config.clone(),
            listener,
            Arc::clone(&self.camera_capabilities),
            Arc::clone(&self.stats_on_attach),
        ));
        self.sessions.lock().push(Arc::clone(&session));
        Ok(session)
    }
}

#[derive(Default)]
struct SessionInner {
    attached: Vec<Arc<FakeDevice>>,
    bindings: Vec<(Arc<FakeDevice>, String)>,
    slots: Vec<String>,
    camera_slot_history: Vec<usize>,
    exchanges: usize,
    image_sources: usize,
    started: Option<(Url, String)>,
    transmitting: bool,
    starts: usize,
    log_level: Option<LogLevel>,
    released: bool,
    fail_next_unbind: bool,
}

impl SessionInner {
    fn find(&self, device: &DeviceHandle) -> DeviceResult<usize> {
        self.attached
            .iter()
            .position(|d| d.descriptor().urn == device.urn())
            .ok_or_else(|| DeviceError::NotAttached(device.urn().to_string()))
    }

    /// Record how many video inputs feed the camera slot.
    fn record(&mut self) {
        let count = self
            .bindings
            .iter()
            .filter(|(d, slot)| slot == CAMERA_SLOT && d.descriptor().device_type.is_video())
            .count();
        self.camera_slot_history.push(count);
    }
}

/// Fake engine session.
///
/// Tracks attached devices, bindings and slots, and records the number of
/// video inputs feeding the camera slot after every mutation.
pub struct FakeSession {
    config: ConfigSnapshot,
    listener: Arc<dyn SessionListener>,
    camera_capabilities: Arc<Mutex<CameraCapabilities>>,
    stats_on_attach: Arc<AtomicBool>,
    inner: Mutex<SessionInner>,
}

impl FakeSession {
    fn new(
        config: ConfigSnapshot,
        listener: Arc<dyn SessionListener>,
        camera_capabilities: Arc<Mutex<CameraCapabilities>>,
        stats_on_attach: Arc<AtomicBool>,
    ) -> Self {
        let inner = SessionInner {
            slots: config.mixer_slots.iter().map(|s| s.name.clone()).collect(),
            ..Default::default()
        };
        Self {
            config,
            listener,
            camera_capabilities,
            stats_on_attach,
            inner: Mutex::new(inner),
        }
    }

    /// Configuration the session was built with.
    pub fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    /// Listener registered at construction, for raising engine callbacks.
    pub fn listener(&self) -> Arc<dyn SessionListener> {
        Arc::clone(&self.listener)
    }

    pub fn emit_state(&self, state: BroadcastState) {
        self.listener.on_state_changed(state);
    }

    pub fn emit_error(&self, error: EngineError) {
        self.listener.on_error(error);
    }

    pub fn emit_statistics(&self, stats: TransmissionStatistics) {
        self.listener.on_transmission_stats_changed(stats);
    }

    /// Attached device by URN.
    pub fn device(&self, urn: &str) -> Option<Arc<FakeDevice>> {
        self.inner
            .lock()
            .attached
            .iter()
            .find(|d| d.descriptor().urn == urn)
            .cloned()
    }

    pub fn attached_urns(&self) -> Vec<String> {
        self.inner
            .lock()
            .attached
            .iter()
            .map(|d| d.descriptor().urn.clone())
            .collect()
    }

    /// URNs of the devices feeding `slot`.
    pub fn bound_urns(&self, slot: &str) -> Vec<String> {
        self.inner
            .lock()
            .bindings
            .iter()
            .filter(|(_, s)| s == slot)
            .map(|(d, _)| d.descriptor().urn.clone())
            .collect()
    }

    /// Slots known to the mixer, in creation order.
    pub fn slot_names(&self) -> Vec<String> {
        self.inner.lock().slots.clone()
    }

    /// Camera slot video input count after each mutation.
    pub fn camera_slot_history(&self) -> Vec<usize> {
        self.inner.lock().camera_slot_history.clone()
    }

    pub fn clear_camera_slot_history(&self) {
        self.inner.lock().camera_slot_history.clear();
    }

    pub fn exchange_count(&self) -> usize {
        self.inner.lock().exchanges
    }

    /// Arguments of the last `start`.
    pub fn started(&self) -> Option<(Url, String)> {
        self.inner.lock().started.clone()
    }

    pub fn is_transmitting(&self) -> bool {
        self.inner.lock().transmitting
    }

    pub fn log_level(&self) -> Option<LogLevel> {
        self.inner.lock().log_level
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }

    /// Make the next `unbind` fail without changing any binding.
    pub fn fail_next_unbind(&self) {
        self.inner.lock().fail_next_unbind = true;
    }

    fn notify_attached(&self) {
        if self.stats_on_attach.load(Ordering::SeqCst) {
            self.listener.on_audio_stats(0.0, 0.0);
        }
    }

    fn make_device(&self, descriptor: &DeviceDescriptor) -> Arc<FakeDevice> {
        Arc::new(FakeDevice::new(
            descriptor.clone(),
            *self.camera_capabilities.lock(),
        ))
    }
}

impl EngineSession for FakeSession {
    fn attach_device(&self, descriptor: &DeviceDescriptor) -> DeviceResult<DeviceHandle> {
        let device = self.make_device(descriptor);
        {
            let mut inner = self.inner.lock();
            if inner.attached.iter().any(|d| d.descriptor().urn == descriptor.urn) {
                return Err(DeviceError::Engine {
                    code: 1,
                    message: format!("{} already attached", descriptor.urn),
                });
            }
            inner.attached.push(Arc::clone(&device));
            inner.record();
        }
        self.notify_attached();
        Ok(device)
    }

    fn detach_device(&self, device: &DeviceHandle) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        let index = inner.find(device)?;
        inner.attached.remove(index);
        inner.bindings.retain(|(d, _)| d.descriptor().urn != device.urn());
        inner.record();
        Ok(())
    }

    fn exchange_devices(
        &self,
        old: &DeviceHandle,
        new: &DeviceDescriptor,
    ) -> DeviceResult<DeviceHandle> {
        let next = self.make_device(new);
        let mut inner = self.inner.lock();
        let index = inner.find(old)?;
        inner.attached[index] = Arc::clone(&next);
        for (device, _) in inner.bindings.iter_mut() {
            if device.descriptor().urn == old.urn() {
                *device = Arc::clone(&next);
            }
        }
        inner.exchanges += 1;
        inner.record();
        Ok(next)
    }

    fn create_image_source(&self) -> DeviceResult<DeviceHandle> {
        let device = {
            let mut inner = self.inner.lock();
            inner.image_sources += 1;
            let descriptor = DeviceDescriptor::new(
                format!("image:{}", inner.image_sources),
                DeviceType::UserImage,
                DevicePosition::Unknown,
            );
            let device = Arc::new(FakeDevice::new(descriptor, CameraCapabilities::default()));
            inner.attached.push(Arc::clone(&device));
            inner.record();
            device
        };
        self.notify_attached();
        Ok(device)
    }

    fn add_slot(&self, slot: &MixerSlot) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        if inner.slots.contains(&slot.name) {
            return Err(DeviceError::Engine {
                code: 2,
                message: format!("slot {} exists", slot.name),
            });
        }
        inner.slots.push(slot.name.clone());
        inner.record();
        Ok(())
    }

    fn remove_slot(&self, name: &str) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        let index = inner
            .slots
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| DeviceError::SlotNotFound(name.to_string()))?;
        inner.slots.remove(index);
        inner.bindings.retain(|(_, slot)| slot != name);
        inner.record();
        Ok(())
    }

    fn bind(&self, device: &DeviceHandle, slot: &str) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        if !inner.slots.iter().any(|s| s == slot) {
            return Err(DeviceError::SlotNotFound(slot.to_string()));
        }
        let index = inner.find(device)?;
        let device = Arc::clone(&inner.attached[index]);
        inner
            .bindings
            .retain(|(d, _)| d.descriptor().urn != device.descriptor().urn);
        inner.bindings.push((device, slot.to_string()));
        inner.record();
        Ok(())
    }

    fn unbind(&self, device: &DeviceHandle) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        if std::mem::take(&mut inner.fail_next_unbind) {
            return Err(DeviceError::Engine {
                code: 4,
                message: format!("unbind of {} refused", device.urn()),
            });
        }
        inner.bindings.retain(|(d, _)| d.descriptor().urn != device.urn());
        inner.record();
        Ok(())
    }

    fn preview_view(&self, aspect: AspectMode) -> DeviceResult<Box<dyn PreviewView>> {
        if self.inner.lock().released {
            return Err(DeviceError::Unsupported("session released".into()));
        }
        Ok(Box::new(FakePreview::new(aspect)))
    }

    fn start(&self, endpoint: &Url, stream_key: &str) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        if inner.released {
            return Err(DeviceError::Engine {
                code: 3,
                message: "session released".into(),
            });
        }
        inner.starts += 1;
        inner.started = Some((endpoint.clone(), stream_key.to_string()));
        inner.transmitting = true;
        Ok(())
    }

    fn stop(&self) {
        self.inner.lock().transmitting = false;
    }

    fn session_id(&self) -> String {
        let inner = self.inner.lock();
        if inner.starts == 0 {
            String::new()
        } else {
            format!("fake-session-{}", inner.starts)
        }
    }

    fn is_ready(&self) -> bool {
        !self.inner.lock().released
    }

    fn set_log_level(&self, level: LogLevel) {
        self.inner.lock().log_level = Some(level);
    }

    fn release(&self) {
        let mut inner = self.inner.lock();
        inner.released = true;
        inner.transmitting = false;
        inner.attached.clear();
        inner.bindings.clear();
    }
}

/// Preview that remembers its aspect mode and mirroring.
#[derive(Debug)]
pub struct FakePreview {
    aspect: AspectMode,
    mirrored: bool,
}

impl FakePreview {
    pub fn new(aspect: AspectMode) -> Self {
        Self {
            aspect,
            mirrored: false,
        }
    }
}

impl PreviewView for FakePreview {
    fn aspect_mode(&self) -> AspectMode {
        self.aspect
    }

    fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    fn is_mirrored(&self) -> bool {
        self.mirrored
    }
}

struct NullListener;

impl SessionListener for NullListener {
    fn on_error(&self, _error: EngineError) {}
    fn on_state_changed(&self, _state: BroadcastState) {}
    fn on_audio_stats(&self, _peak: f64, _rms: f64) {}
    fn on_transmission_stats_changed(&self, _stats: TransmissionStatistics) {}
    fn on_broadcast_quality_changed(&self, _quality: f64) {}
    fn on_network_health_changed(&self, _health: f64) {}
}

fn test_snapshot(mixer_slots: Vec<MixerSlot>) -> ConfigSnapshot {
    ConfigSnapshot {
        video: VideoConfig {
            size: Size::new(720, 1280),
            initial_bitrate: 2_100_000,
            min_bitrate: 300_000,
            max_bitrate: 8_500_000,
            target_frame_rate: 30,
            keyframe_interval: 2,
            use_b_frames: true,
            use_auto_bitrate: true,
            auto_bitrate_profile: AutoBitrateProfile::Conservative,
            transparency_enabled: true,
        },
        audio: AudioConfig {
            bitrate: 96_000,
            channels: 2,
            quality: AudioQuality::Medium,
        },
        log_level: LogLevel::Error,
        mixer_slots,
    }
}
