//! Device attachment and slot bindings.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use camcast_device::{
    BroadcastEngine, CameraOptions, DeviceHandle, EngineSession, MIN_ZOOM_FACTOR, MUTED_GAIN,
    UNITY_GAIN,
};
use camcast_ipc::{BindingInfo, DeviceType, CAMERA_SLOT};

use crate::{SessionError, SessionResult};

/// An attached device feeding a mixer slot.
#[derive(Debug, Clone)]
struct DeviceBinding {
    device: DeviceHandle,
    slot: String,
}

/// Tracks attached devices and the slot each one feeds.
///
/// Only the session's device queue calls the mutating methods, so engine
/// calls issued from here never interleave.
pub struct DeviceLifecycleManager {
    engine: Arc<dyn BroadcastEngine>,
    session: Arc<dyn EngineSession>,
    bindings: Vec<DeviceBinding>,
    camera: Option<DeviceHandle>,
    microphone: Option<DeviceHandle>,
    muted: bool,
}

impl DeviceLifecycleManager {
    pub fn new(engine: Arc<dyn BroadcastEngine>, session: Arc<dyn EngineSession>) -> Self {
        Self {
            engine,
            session,
            bindings: Vec::new(),
            camera: None,
            microphone: None,
            muted: false,
        }
    }

    /// Attach the first back-facing camera and feed it into the camera slot.
    ///
    /// A different camera already attached is exchanged in one engine call,
    /// so the camera slot is never left without a video source.
    #[instrument(name = "attach_camera", skip(self))]
    pub fn attach_camera(&mut self) -> SessionResult<DeviceHandle> {
        let descriptor = self
            .engine
            .list_available_devices()
            .into_iter()
            .find(|d| d.is_back_camera())
            .ok_or_else(|| SessionError::ResourceUnavailable("no back-facing camera".into()))?;

        match self.camera.clone() {
            Some(current) if current.urn() == descriptor.urn => {
                debug!(urn = %descriptor.urn, "Camera already attached");
                Ok(current)
            }
            Some(current) => {
                let next = self.session.exchange_devices(&current, &descriptor)?;
                for binding in &mut self.bindings {
                    if Arc::ptr_eq(&binding.device, &current) {
                        binding.device = Arc::clone(&next);
                    }
                }
                info!(from = %current.urn(), to = %next.urn(), "Camera exchanged");
                self.camera = Some(Arc::clone(&next));
                Ok(next)
            }
            None => {
                let camera = self.session.attach_device(&descriptor)?;
                self.bind_or_detach(&camera, CAMERA_SLOT)?;
                info!(urn = %camera.urn(), "Camera attached");
                self.camera = Some(Arc::clone(&camera));
                Ok(camera)
            }
        }
    }

    /// Attach the first microphone, feed it into the camera slot and apply
    /// the current mute state.
    #[instrument(name = "attach_microphone", skip(self))]
    pub fn attach_microphone(&mut self) -> SessionResult<DeviceHandle> {
        if let Some(ref microphone) = self.microphone {
            return Ok(Arc::clone(microphone));
        }

        let descriptor = self
            .engine
            .list_available_devices()
            .into_iter()
            .find(|d| d.device_type == DeviceType::Microphone)
            .ok_or_else(|| SessionError::ResourceUnavailable("no microphone".into()))?;

        let microphone = self.session.attach_device(&descriptor)?;
        self.bind_or_detach(&microphone, CAMERA_SLOT)?;
        info!(urn = %microphone.urn(), "Microphone attached");

        self.microphone = Some(Arc::clone(&microphone));
        self.apply_gain();
        Ok(microphone)
    }

    /// Silence or restore the microphone. The device stays attached and bound.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.apply_gain();
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Apply a zoom factor to the attached camera.
    ///
    /// Returns false, without error, when there is no zoomable camera or the
    /// factor is below its minimum. Factors above the maximum are clamped.
    pub fn set_zoom(&self, factor: f32) -> bool {
        let Some(ref camera) = self.camera else {
            debug!(factor, "No camera attached, ignoring zoom");
            return false;
        };
        let Some(control) = camera.as_camera() else {
            return false;
        };

        let caps = control.capabilities();
        if !caps.zoom_supported {
            debug!(urn = %camera.urn(), "Camera does not support zoom");
            return false;
        }

        let min = caps.min_zoom.max(MIN_ZOOM_FACTOR);
        // Also rejects NaN.
        if !(factor >= min) {
            debug!(factor, min, "Zoom factor below minimum, ignoring");
            return false;
        }

        let zoom_factor = factor.min(caps.max_zoom);
        control.set_options(CameraOptions { zoom_factor });
        debug!(zoom_factor, "Zoom applied");
        true
    }

    /// Feed a device into a slot.
    ///
    /// A slot takes at most one video and one audio input. A device already
    /// bound elsewhere is moved.
    pub fn bind(&mut self, device: &DeviceHandle, slot: &str) -> SessionResult<()> {
        if let Some(existing) = self.binding_of(device) {
            if existing.slot == slot {
                return Ok(());
            }
            self.unbind(device)?;
        }

        if let Some(kind) = input_kind(device.device_type()) {
            let occupied = self.bindings.iter().any(|b| {
                b.slot == slot && input_kind(b.device.device_type()) == Some(kind)
            });
            if occupied {
                return Err(SessionError::SlotOccupied {
                    slot: slot.to_string(),
                    kind,
                });
            }
        }

        self.session.bind(device, slot)?;
        self.bindings.push(DeviceBinding {
            device: Arc::clone(device),
            slot: slot.to_string(),
        });
        debug!(urn = %device.urn(), %slot, "Device bound");
        Ok(())
    }

    /// Stop feeding a device into its slot. Unbound devices are ignored.
    pub fn unbind(&mut self, device: &DeviceHandle) -> SessionResult<()> {
        let Some(index) = self
            .bindings
            .iter()
            .position(|b| Arc::ptr_eq(&b.device, device))
        else {
            return Ok(());
        };

        self.session.unbind(device)?;
        let binding = self.bindings.remove(index);
        debug!(urn = %device.urn(), slot = %binding.slot, "Device unbound");
        Ok(())
    }

    /// Unbind and detach a device.
    ///
    /// The binding is forgotten even when the engine refuses the unbind, so a
    /// detached device never keeps its slot occupied.
    pub fn detach(&mut self, device: &DeviceHandle) -> SessionResult<()> {
        if let Err(e) = self.unbind(device) {
            warn!(urn = %device.urn(), "Failed to unbind device before detach: {}", e);
            self.bindings.retain(|b| !Arc::ptr_eq(&b.device, device));
        }
        self.session.detach_device(device)?;

        if self.camera.as_ref().is_some_and(|c| Arc::ptr_eq(c, device)) {
            self.camera = None;
        }
        if self.microphone.as_ref().is_some_and(|m| Arc::ptr_eq(m, device)) {
            self.microphone = None;
        }
        debug!(urn = %device.urn(), "Device detached");
        Ok(())
    }

    /// Copy of the binding table.
    pub fn bindings(&self) -> Vec<BindingInfo> {
        self.bindings
            .iter()
            .map(|b| BindingInfo {
                urn: b.device.urn().to_string(),
                device_type: b.device.device_type(),
                slot: b.slot.clone(),
            })
            .collect()
    }

    pub fn camera(&self) -> Option<DeviceHandle> {
        self.camera.clone()
    }

    pub fn microphone(&self) -> Option<DeviceHandle> {
        self.microphone.clone()
    }

    /// Unbind and detach everything. Engine failures are logged and skipped.
    #[instrument(name = "release_devices", skip(self))]
    pub fn release_all(&mut self) {
        let mut devices: Vec<DeviceHandle> = Vec::new();
        let tracked = self
            .bindings
            .iter()
            .map(|b| &b.device)
            .chain(self.camera.iter())
            .chain(self.microphone.iter());
        for device in tracked {
            if !devices.iter().any(|d| Arc::ptr_eq(d, device)) {
                devices.push(Arc::clone(device));
            }
        }

        for device in &devices {
            if let Err(e) = self.detach(device) {
                warn!(urn = %device.urn(), "Failed to release device: {}", e);
            }
        }

        self.bindings.clear();
        self.camera = None;
        self.microphone = None;
        debug!(count = devices.len(), "Devices released");
    }

    fn binding_of(&self, device: &DeviceHandle) -> Option<&DeviceBinding> {
        self.bindings.iter().find(|b| Arc::ptr_eq(&b.device, device))
    }

    fn bind_or_detach(&mut self, device: &DeviceHandle, slot: &str) -> SessionResult<()> {
        if let Err(e) = self.bind(device, slot) {
            if let Err(detach_err) = self.session.detach_device(device) {
                warn!(urn = %device.urn(), "Failed to detach unbound device: {}", detach_err);
            }
            return Err(e);
        }
        Ok(())
    }

    fn apply_gain(&self) {
        let Some(ref microphone) = self.microphone else {
            return;
        };
        let gain = if self.muted { MUTED_GAIN } else { UNITY_GAIN };
        match microphone.as_audio() {
            Some(audio) => {
                audio.set_gain(gain);
                debug!(gain, "Microphone gain set");
            }
            None => warn!(urn = %microphone.urn(), "Microphone has no gain control"),
        }
    }
}

fn input_kind(device_type: DeviceType) -> Option<&'static str> {
    if device_type.is_video() {
        Some("video")
    } else if device_type.is_audio() {
        Some("audio")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use camcast_device::CameraCapabilities;
    use camcast_ipc::{DeviceDescriptor, DevicePosition, MixerSlot};
    use camcast_test_utils::{FakeEngine, FakeSession};
    use pretty_assertions::assert_eq;

    use super::*;

    fn manager(engine: &Arc<FakeEngine>) -> (DeviceLifecycleManager, Arc<FakeSession>) {
        let session = engine.open_session(vec![MixerSlot::camera()]);
        let manager = DeviceLifecycleManager::new(
            Arc::clone(engine) as Arc<dyn BroadcastEngine>,
            Arc::clone(&session) as Arc<dyn EngineSession>,
        );
        (manager, session)
    }

    #[test]
    fn test_attach_camera_and_microphone() {
        let engine = FakeEngine::with_default_devices();
        let (mut manager, session) = manager(&engine);

        manager.attach_camera().unwrap();
        manager.attach_microphone().unwrap();

        let bindings = manager.bindings();
        assert_eq!(bindings.len(), 2);
        assert!(bindings.iter().all(|b| b.slot == CAMERA_SLOT));
        assert_eq!(session.bound_urns(CAMERA_SLOT).len(), 2);
    }

    #[test]
    fn test_attach_camera_without_camera_fails() {
        let engine = FakeEngine::new(vec![DeviceDescriptor::new(
            "mic:0",
            DeviceType::Microphone,
            DevicePosition::Unknown,
        )]);
        let (mut manager, _session) = manager(&engine);

        let err = manager.attach_camera().unwrap_err();
        assert!(matches!(err, SessionError::ResourceUnavailable(_)));
        assert!(manager.bindings().is_empty());
    }

    #[test]
    fn test_front_camera_is_not_used() {
        let engine = FakeEngine::new(vec![DeviceDescriptor::new(
            "camera:front",
            DeviceType::Camera,
            DevicePosition::Front,
        )]);
        let (mut manager, _session) = manager(&engine);

        assert!(manager.attach_camera().is_err());
    }

    #[test]
    fn test_reattach_same_camera_is_noop() {
        let engine = FakeEngine::with_default_devices();
        let (mut manager, session) = manager(&engine);

        let first = manager.attach_camera().unwrap();
        let second = manager.attach_camera().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(session.attached_urns().len(), 1);
    }

    #[test]
    fn test_exchange_keeps_camera_slot_fed() {
        let engine = FakeEngine::with_default_devices();
        let (mut manager, session) = manager(&engine);
        manager.attach_camera().unwrap();

        engine.set_available_devices(vec![DeviceDescriptor::new(
            "camera:back:1",
            DeviceType::Camera,
            DevicePosition::Back,
        )]);
        session.clear_camera_slot_history();
        manager.attach_camera().unwrap();

        let cameras: Vec<_> = manager
            .bindings()
            .into_iter()
            .filter(|b| b.device_type == DeviceType::Camera)
            .collect();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].urn, "camera:back:1");
        assert_eq!(cameras[0].slot, CAMERA_SLOT);
        assert!(session.camera_slot_history().iter().all(|&n| n == 1));
        assert_eq!(session.exchange_count(), 1);
    }

    #[test]
    fn test_mute_sets_gain_without_touching_bindings() {
        let engine = FakeEngine::with_default_devices();
        let (mut manager, session) = manager(&engine);
        manager.attach_camera().unwrap();
        manager.attach_microphone().unwrap();
        let before = manager.bindings();

        manager.set_muted(true);
        assert_eq!(session.device("mic:0").unwrap().gain(), 0.0);

        manager.set_muted(false);
        assert_eq!(session.device("mic:0").unwrap().gain(), 1.0);
        assert_eq!(manager.bindings(), before);
    }

    #[test]
    fn test_pending_mute_applied_on_attach() {
        let engine = FakeEngine::with_default_devices();
        let (mut manager, session) = manager(&engine);

        manager.set_muted(true);
        manager.attach_microphone().unwrap();

        assert_eq!(session.device("mic:0").unwrap().gain(), 0.0);
    }

    #[test]
    fn test_zoom_rules() {
        let engine = FakeEngine::with_default_devices();
        engine.set_camera_capabilities(CameraCapabilities {
            zoom_supported: true,
            min_zoom: 1.0,
            max_zoom: 4.0,
        });
        let (mut manager, session) = manager(&engine);

        assert!(!manager.set_zoom(2.0));

        manager.attach_camera().unwrap();
        let camera = session.device("camera:back:0").unwrap();

        assert!(!manager.set_zoom(0.5));
        assert_eq!(camera.zoom(), None);

        assert!(manager.set_zoom(2.0));
        assert_eq!(camera.zoom(), Some(2.0));

        assert!(manager.set_zoom(10.0));
        assert_eq!(camera.zoom(), Some(4.0));

        assert!(!manager.set_zoom(f32::NAN));
    }

    #[test]
    fn test_zoom_ignored_when_unsupported() {
        let engine = FakeEngine::with_default_devices();
        let (mut manager, session) = manager(&engine);
        manager.attach_camera().unwrap();

        assert!(!manager.set_zoom(2.0));
        assert_eq!(session.device("camera:back:0").unwrap().zoom(), None);
    }

    #[test]
    fn test_slot_takes_one_input_per_kind() {
        let engine = FakeEngine::with_default_devices();
        let (mut manager, session) = manager(&engine);
        manager.attach_camera().unwrap();

        let image = session.create_image_source().unwrap();
        let err = manager.bind(&image, CAMERA_SLOT).unwrap_err();

        assert!(matches!(err, SessionError::SlotOccupied { kind: "video", .. }));
    }

    #[test]
    fn test_release_all_detaches_everything() {
        let engine = FakeEngine::with_default_devices();
        let (mut manager, session) = manager(&engine);
        manager.attach_camera().unwrap();
        manager.attach_microphone().unwrap();

        manager.release_all();

        assert!(manager.bindings().is_empty());
        assert!(manager.camera().is_none());
        assert!(manager.microphone().is_none());
        assert!(session.attached_urns().is_empty());
    }
}
