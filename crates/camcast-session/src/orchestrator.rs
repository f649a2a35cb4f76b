//! Broadcast session facade.

use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use url::Url;

use camcast_device::{BroadcastEngine, EngineSession, ImageLoader, PreviewView, SessionListener};
use camcast_ipc::{
    AudioOverrides, BindingInfo, ConfigSnapshot, MixerSlot, OverlayDescriptor, Preset,
    SessionSettings, SessionState, VideoOverrides,
};

use crate::config;
use crate::events::{EventListener, EventNormalizer};
use crate::mixer::{MixerState, SharedMixer};
use crate::overlays::{OverlayReconciler, ReconcileOutcome};
use crate::queue::DeviceQueue;
use crate::slots::MixerSlotRegistry;
use crate::{SessionError, SessionResult, DEVICE_QUEUE_THREAD_NAME, OVERLAY_THREAD_NAME};

/// Receives the preview produced by [`BroadcastOrchestrator::get_camera_preview`].
pub type PreviewCallback = Box<dyn FnOnce(SessionResult<Box<dyn PreviewView>>) + Send + 'static>;

/// Everything that exists only while the session is initialized.
struct ActiveSession {
    engine_session: Arc<dyn EngineSession>,
    queue: DeviceQueue,
    mixer: SharedMixer,
    snapshot: ConfigSnapshot,
    /// Serializes overlay reconciliations.
    reconcile: Mutex<()>,
}

impl ActiveSession {
    /// Run a mixer job on the device queue.
    ///
    /// From the queue's own thread (a listener reacting to an engine callback
    /// raised inside a device job) the job is queued behind the current one.
    fn apply<F>(&self, job: F) -> SessionResult<()>
    where
        F: FnOnce(&mut MixerState) + Send + 'static,
    {
        let mixer = Arc::clone(&self.mixer);
        let job = move || job(&mut mixer.lock());
        if self.queue.is_current() {
            self.queue.submit(job)
        } else {
            self.queue.run(job)
        }
    }
}

/// Coordinates the lifecycle of one broadcast session.
///
/// Setters are valid in every state. Before `initialize()` they only record
/// the value for the next initialization; afterwards they also apply it.
pub struct BroadcastOrchestrator {
    engine: Arc<dyn BroadcastEngine>,
    reconciler: Arc<OverlayReconciler>,
    events: Arc<EventNormalizer>,
    settings: Arc<Mutex<SessionSettings>>,
    state: RwLock<SessionState>,
    session: RwLock<Option<Arc<ActiveSession>>>,
    lifecycle: Mutex<()>,
}

impl BroadcastOrchestrator {
    /// Create an orchestrator with default settings.
    pub fn new(engine: Arc<dyn BroadcastEngine>, image_loader: Arc<dyn ImageLoader>) -> Self {
        Self {
            engine,
            reconciler: Arc::new(OverlayReconciler::new(image_loader)),
            events: Arc::new(EventNormalizer::new()),
            settings: Arc::new(Mutex::new(SessionSettings::default())),
            state: RwLock::new(SessionState::Uninitialized),
            session: RwLock::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Create an orchestrator from pre-built settings, validating them now.
    pub fn with_settings(
        engine: Arc<dyn BroadcastEngine>,
        image_loader: Arc<dyn ImageLoader>,
        settings: SessionSettings,
    ) -> SessionResult<Self> {
        config::compose(&settings, &[])?;
        let orchestrator = Self::new(engine, image_loader);
        *orchestrator.settings.lock() = settings;
        Ok(orchestrator)
    }

    /// Build the engine session, attach capture devices and install any
    /// cached overlays.
    #[instrument(name = "initialize", skip(self))]
    pub fn initialize(&self) -> SessionResult<()> {
        let _lifecycle = self.lifecycle.lock();
        if self.state().is_initialized() {
            return Err(SessionError::AlreadyInitialized);
        }

        // Copied out so listeners called from device jobs can use the setters.
        let settings = self.settings.lock().clone();

        let mut slots = MixerSlotRegistry::new();
        slots.ensure_camera_slot();
        let snapshot = config::compose(&settings, &slots.slots())?;
        debug!(?snapshot, "Configuration composed");

        let listener: Arc<dyn SessionListener> = Arc::clone(&self.events) as _;
        let engine_session = self.engine.create_session(&snapshot, listener)?;
        engine_session.set_log_level(settings.session_log_level);

        let queue = match DeviceQueue::spawn(DEVICE_QUEUE_THREAD_NAME) {
            Ok(queue) => queue,
            Err(e) => {
                engine_session.release();
                return Err(e);
            }
        };

        let mixer = MixerState::new(
            slots,
            Arc::clone(&self.engine),
            Arc::clone(&engine_session),
        )
        .shared();

        let muted = settings.muted;
        let zoom = settings.zoom;
        let attached = {
            let mixer = Arc::clone(&mixer);
            queue.run(move || attach_capture_devices(&mut mixer.lock(), muted, zoom))
        };
        if let Err(e) = attached {
            queue.shutdown();
            engine_session.release();
            return Err(e);
        }

        let active = Arc::new(ActiveSession {
            engine_session,
            queue,
            mixer,
            snapshot,
            reconcile: Mutex::new(()),
        });

        // Taken before publishing so an overlay list set meanwhile lands
        // after the cached one.
        let reconcile = active.reconcile.lock();
        *self.session.write() = Some(Arc::clone(&active));
        self.transition_to(SessionState::Initialized);
        info!("Broadcast session initialized");

        self.apply_settings_changed_since(&active, &settings);
        self.install_cached_overlays(&active);
        drop(reconcile);

        Ok(())
    }

    /// Release the engine session and every binding. Safe in any state.
    #[instrument(name = "deinitialize", skip(self))]
    pub fn deinitialize(&self) {
        let _lifecycle = self.lifecycle.lock();
        let Some(active) = self.session.write().take() else {
            debug!("Not initialized, nothing to release");
            return;
        };

        if self.state().is_broadcasting() {
            active.engine_session.stop();
            info!("Broadcast stopped for deinitialization");
        }

        // Let an in-flight reconcile finish before tearing down.
        drop(active.reconcile.lock());
        let released = {
            let mixer = Arc::clone(&active.mixer);
            active.queue.run(move || {
                let mut state = mixer.lock();
                state.devices.release_all();
                state.overlays.clear();
            })
        };
        if let Err(e) = released {
            warn!("Failed to release devices: {}", e);
        }

        active.queue.shutdown();
        active.engine_session.release();
        self.events.set_session_id(None);
        self.transition_to(SessionState::Uninitialized);
        info!("Broadcast session released");
    }

    pub fn is_initialized(&self) -> bool {
        self.state().is_initialized()
    }

    /// Whether the engine session can start transmitting. False when not
    /// initialized.
    pub fn is_ready(&self) -> bool {
        self.active()
            .is_some_and(|active| active.engine_session.is_ready())
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Begin transmitting to `endpoint` with `stream_key`.
    #[instrument(name = "start", skip(self, stream_key))]
    pub fn start(&self, endpoint: &str, stream_key: &str) -> SessionResult<()> {
        let url = Url::parse(endpoint).map_err(|e| SessionError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let _lifecycle = self.lifecycle.lock();
        let active = self.active().ok_or(SessionError::NotInitialized)?;

        active.engine_session.start(&url, stream_key)?;
        let session_id = active.engine_session.session_id();
        self.events.set_session_id(Some(session_id.clone()));
        self.transition_to(SessionState::Broadcasting);
        info!(%session_id, "Broadcast started");
        Ok(())
    }

    /// End transmission. The session stays initialized.
    #[instrument(name = "stop", skip(self))]
    pub fn stop(&self) -> SessionResult<()> {
        let _lifecycle = self.lifecycle.lock();
        if !self.state().is_broadcasting() {
            return Err(SessionError::NotBroadcasting);
        }
        let active = self.active().ok_or(SessionError::NotInitialized)?;

        active.engine_session.stop();
        self.transition_to(SessionState::Initialized);
        info!("Broadcast stopped");
        Ok(())
    }

    /// Deliver a preview of the session output, after any device change
    /// already queued.
    pub fn get_camera_preview<F>(&self, callback: F) -> SessionResult<()>
    where
        F: FnOnce(SessionResult<Box<dyn PreviewView>>) + Send + 'static,
    {
        let active = self.active().ok_or(SessionError::NotInitialized)?;
        let (aspect, mirrored) = {
            let settings = self.settings.lock();
            (settings.preview_aspect_mode, settings.preview_mirrored)
        };

        let session = Arc::clone(&active.engine_session);
        active.queue.submit(move || {
            let preview = session.preview_view(aspect).map(|mut view| {
                view.set_mirrored(mirrored);
                view
            });
            callback(preview.map_err(SessionError::from));
        })
    }

    /// Set the preview aspect mode. When initialized and a callback is given,
    /// a fresh preview is delivered to it.
    pub fn set_camera_preview_aspect_mode(
        &self,
        mode: &str,
        on_preview: Option<PreviewCallback>,
    ) -> SessionResult<()> {
        let mode = config::resolve_aspect_mode(mode)?;
        self.settings.lock().preview_aspect_mode = mode;
        self.redeliver_preview(on_preview)
    }

    /// Set preview mirroring. When initialized and a callback is given, a
    /// fresh preview is delivered to it.
    pub fn set_preview_mirrored(
        &self,
        mirrored: bool,
        on_preview: Option<PreviewCallback>,
    ) -> SessionResult<()> {
        self.settings.lock().preview_mirrored = mirrored;
        self.redeliver_preview(on_preview)
    }

    /// Silence or restore the microphone.
    pub fn set_muted(&self, muted: bool) -> SessionResult<()> {
        self.settings.lock().muted = muted;
        match self.active() {
            Some(active) => self.apply_mute(&active),
            None => Ok(()),
        }
    }

    /// Zoom the camera. Unsupported or out-of-range factors are ignored.
    pub fn set_zoom(&self, factor: f32) -> SessionResult<()> {
        self.settings.lock().zoom = Some(factor);
        match self.active() {
            Some(active) => self.apply_zoom(&active),
            None => Ok(()),
        }
    }

    /// Set engine verbosity for the live session.
    pub fn set_session_log_level(&self, level: &str) -> SessionResult<()> {
        let level = config::resolve_log_level(level)?;
        self.settings.lock().session_log_level = level;
        if let Some(active) = self.active() {
            active.engine_session.set_log_level(level);
            debug!(%level, "Session log level applied");
        }
        Ok(())
    }

    /// Set the log level baked into the configuration at the next
    /// initialization.
    pub fn set_log_level(&self, level: &str) -> SessionResult<()> {
        let level = config::resolve_log_level(level)?;
        self.settings.lock().log_level = Some(level);
        Ok(())
    }

    /// Select the base configuration for the next initialization.
    pub fn set_configuration_preset(&self, name: &str) -> SessionResult<()> {
        let preset: Preset = name.parse()?;
        self.settings.lock().preset = preset;
        self.note_pending_config("preset");
        Ok(())
    }

    /// Layer video overrides over the ones already set. Present keys win.
    pub fn set_video_overrides(&self, overrides: VideoOverrides) -> SessionResult<()> {
        config::validate_video_overrides(&overrides)?;
        {
            let mut settings = self.settings.lock();
            let merged = match settings.video {
                Some(ref current) => config::merge_video_overrides(current, &overrides),
                None => overrides,
            };
            settings.video = Some(merged);
        }
        self.note_pending_config("video overrides");
        Ok(())
    }

    /// Layer audio overrides over the ones already set. Present keys win.
    pub fn set_audio_overrides(&self, overrides: AudioOverrides) -> SessionResult<()> {
        config::validate_audio_overrides(&overrides)?;
        {
            let mut settings = self.settings.lock();
            let merged = match settings.audio {
                Some(ref current) => config::merge_audio_overrides(current, &overrides),
                None => overrides,
            };
            settings.audio = Some(merged);
        }
        self.note_pending_config("audio overrides");
        Ok(())
    }

    /// Replace the desired overlay list.
    ///
    /// When initialized the overlays are rebuilt now and the outcome is
    /// returned. A rebuild always applies the most recently set list, so with
    /// concurrent callers the outcome may describe a newer list than the one
    /// passed here. Before initialization the list is kept for `initialize()`
    /// and `None` is returned. Called from the device queue, the rebuild runs
    /// on its own thread and `None` is returned.
    pub fn set_overlay_list(
        &self,
        overlays: Vec<OverlayDescriptor>,
    ) -> SessionResult<Option<ReconcileOutcome>> {
        self.settings.lock().overlays = Some(overlays);
        let Some(active) = self.active() else {
            return Ok(None);
        };

        if active.queue.is_current() {
            let reconciler = Arc::clone(&self.reconciler);
            let settings = Arc::clone(&self.settings);
            thread::Builder::new()
                .name(OVERLAY_THREAD_NAME.into())
                .spawn(move || {
                    if let Err(e) = reconcile_latest(&reconciler, &active, &settings) {
                        warn!("Deferred overlay reconcile failed: {}", e);
                    }
                })?;
            return Ok(None);
        }

        reconcile_latest(&self.reconciler, &active, &self.settings).map(Some)
    }

    /// Register the listener for session events. `None` drops events.
    pub fn set_event_listener(&self, listener: Option<Arc<dyn EventListener>>) {
        self.events.set_listener(listener);
    }

    /// Copy of the device binding table.
    pub fn bindings(&self) -> Vec<BindingInfo> {
        self.active()
            .map(|active| active.mixer.lock().devices.bindings())
            .unwrap_or_default()
    }

    /// Copy of the mixer slots in paint order.
    pub fn slots(&self) -> Vec<MixerSlot> {
        self.active()
            .map(|active| active.mixer.lock().slots.slots())
            .unwrap_or_default()
    }

    /// Configuration the live session was built with.
    pub fn config_snapshot(&self) -> Option<ConfigSnapshot> {
        self.active().map(|active| active.snapshot.clone())
    }

    /// Copy of the cached settings.
    pub fn settings(&self) -> SessionSettings {
        self.settings.lock().clone()
    }

    /// Identifier of the current transmission, once started.
    pub fn session_id(&self) -> Option<String> {
        self.events.session_id()
    }

    fn active(&self) -> Option<Arc<ActiveSession>> {
        self.session.read().clone()
    }

    /// Push values cached by setters while `initialize()` was building the
    /// session from `applied`.
    fn apply_settings_changed_since(&self, active: &ActiveSession, applied: &SessionSettings) {
        let (muted, zoom, level) = {
            let current = self.settings.lock();
            (current.muted, current.zoom, current.session_log_level)
        };

        if muted != applied.muted {
            if let Err(e) = self.apply_mute(active) {
                warn!("Failed to apply mute state: {}", e);
            }
        }
        if zoom != applied.zoom {
            if let Err(e) = self.apply_zoom(active) {
                warn!("Failed to apply zoom: {}", e);
            }
        }
        if level != applied.session_log_level {
            active.engine_session.set_log_level(level);
        }
    }

    // Device jobs read the cached value when they run, so setters racing
    // each other settle on the last value written.
    fn apply_mute(&self, active: &ActiveSession) -> SessionResult<()> {
        let settings = Arc::clone(&self.settings);
        active.apply(move |state| {
            let muted = settings.lock().muted;
            state.devices.set_muted(muted);
        })
    }

    fn apply_zoom(&self, active: &ActiveSession) -> SessionResult<()> {
        let settings = Arc::clone(&self.settings);
        active.apply(move |state| {
            if let Some(factor) = settings.lock().zoom {
                state.devices.set_zoom(factor);
            }
        })
    }

    /// Build the cached overlay list. The caller holds the reconcile guard.
    /// Failures leave the session initialized without overlays.
    fn install_cached_overlays(&self, active: &ActiveSession) {
        let cached = self.settings.lock().overlays.clone();
        let Some(overlays) = cached.filter(|o| !o.is_empty()) else {
            return;
        };

        let installed = self.reconciler.reconcile(
            &active.queue,
            &active.mixer,
            &active.engine_session,
            &overlays,
        );
        if let Err(e) = installed {
            warn!("Failed to install cached overlays: {}", e);
        }
    }

    fn redeliver_preview(&self, on_preview: Option<PreviewCallback>) -> SessionResult<()> {
        match on_preview {
            Some(callback) if self.is_initialized() => self.get_camera_preview(callback),
            _ => Ok(()),
        }
    }

    fn note_pending_config(&self, what: &str) {
        if self.is_initialized() {
            debug!(what, "Configuration change applies at the next initialize");
        }
    }

    fn transition_to(&self, new_state: SessionState) {
        let previous = std::mem::replace(&mut *self.state.write(), new_state);
        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );
    }
}

impl Drop for BroadcastOrchestrator {
    fn drop(&mut self) {
        self.deinitialize();
    }
}

/// Rebuild overlays from the latest cached list.
fn reconcile_latest(
    reconciler: &OverlayReconciler,
    active: &ActiveSession,
    settings: &Mutex<SessionSettings>,
) -> SessionResult<ReconcileOutcome> {
    let _reconcile = active.reconcile.lock();
    // Read under the guard so the last list written is the last one applied.
    let overlays = settings.lock().overlays.clone().unwrap_or_default();
    reconciler.reconcile(&active.queue, &active.mixer, &active.engine_session, &overlays)
}

/// Attach the camera and microphone. Missing devices only degrade the session.
fn attach_capture_devices(state: &mut MixerState, muted: bool, zoom: Option<f32>) {
    match state.devices.attach_camera() {
        Ok(_) => {
            if let Some(factor) = zoom {
                state.devices.set_zoom(factor);
            }
        }
        Err(e) => warn!("Camera unavailable, continuing without video: {}", e),
    }

    state.devices.set_muted(muted);
    if let Err(e) = state.devices.attach_microphone() {
        warn!("Microphone unavailable, continuing without audio: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use camcast_ipc::{AspectMode, LogLevel};
    use camcast_test_utils::{FakeEngine, StaticImageLoader};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ErrorKind;

    fn orchestrator() -> (BroadcastOrchestrator, Arc<FakeEngine>) {
        let engine = FakeEngine::with_default_devices();
        let orchestrator = BroadcastOrchestrator::new(
            Arc::clone(&engine) as Arc<dyn BroadcastEngine>,
            Arc::new(StaticImageLoader::new()),
        );
        (orchestrator, engine)
    }

    #[test]
    fn test_lifecycle_transitions() {
        let (orchestrator, _engine) = orchestrator();
        assert_eq!(orchestrator.state(), SessionState::Uninitialized);

        orchestrator.initialize().unwrap();
        assert_eq!(orchestrator.state(), SessionState::Initialized);

        orchestrator.start("rtmps://ingest.example.com:443/app/", "key").unwrap();
        assert_eq!(orchestrator.state(), SessionState::Broadcasting);

        orchestrator.stop().unwrap();
        assert_eq!(orchestrator.state(), SessionState::Initialized);

        orchestrator.deinitialize();
        assert_eq!(orchestrator.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_double_initialize_fails() {
        let (orchestrator, _engine) = orchestrator();
        orchestrator.initialize().unwrap();

        let err = orchestrator.initialize().unwrap_err();

        assert!(matches!(err, SessionError::AlreadyInitialized));
        assert_eq!(err.kind(), ErrorKind::Lifecycle);
    }

    #[test]
    fn test_start_requires_initialization() {
        let (orchestrator, engine) = orchestrator();

        let err = orchestrator.start("rtmps://ingest.example.com/app/", "key").unwrap_err();

        assert!(matches!(err, SessionError::NotInitialized));
        assert_eq!(engine.sessions_created(), 0);
    }

    #[test]
    fn test_start_rejects_invalid_endpoint() {
        let (orchestrator, engine) = orchestrator();
        orchestrator.initialize().unwrap();

        let err = orchestrator.start("not a url", "key").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(engine.session().unwrap().started().is_none());
        assert_eq!(orchestrator.state(), SessionState::Initialized);
    }

    #[test]
    fn test_stop_requires_broadcasting() {
        let (orchestrator, _engine) = orchestrator();
        assert!(matches!(orchestrator.stop(), Err(SessionError::NotBroadcasting)));

        orchestrator.initialize().unwrap();
        assert!(matches!(orchestrator.stop(), Err(SessionError::NotBroadcasting)));
    }

    #[test]
    fn test_start_while_broadcasting_restarts() {
        let (orchestrator, engine) = orchestrator();
        orchestrator.initialize().unwrap();

        orchestrator.start("rtmps://a.example.com/app/", "one").unwrap();
        orchestrator.start("rtmps://b.example.com/app/", "two").unwrap();

        let (url, key) = engine.session().unwrap().started().unwrap();
        assert_eq!(url.host_str(), Some("b.example.com"));
        assert_eq!(key, "two");
        assert_eq!(orchestrator.state(), SessionState::Broadcasting);
    }

    #[test]
    fn test_is_ready_false_before_initialize() {
        let (orchestrator, _engine) = orchestrator();
        assert!(!orchestrator.is_ready());

        orchestrator.initialize().unwrap();
        assert!(orchestrator.is_ready());
    }

    #[test]
    fn test_unknown_tokens_fail_eagerly() {
        let (orchestrator, _engine) = orchestrator();

        assert!(orchestrator.set_configuration_preset("ultra").is_err());
        assert!(orchestrator.set_log_level("loud").is_err());
        assert!(orchestrator.set_session_log_level("loud").is_err());
        assert!(orchestrator.set_camera_preview_aspect_mode("stretch", None).is_err());
        assert_eq!(orchestrator.settings(), SessionSettings::default());
    }

    #[test]
    fn test_session_log_level_applied_after_construction() {
        let (orchestrator, engine) = orchestrator();
        orchestrator.set_session_log_level("debug").unwrap();

        orchestrator.initialize().unwrap();
        let session = engine.session().unwrap();
        assert_eq!(session.log_level(), Some(LogLevel::Debug));

        orchestrator.set_session_log_level("warning").unwrap();
        assert_eq!(session.log_level(), Some(LogLevel::Warning));
    }

    #[test]
    fn test_preview_uses_cached_aspect_and_mirroring() {
        let (orchestrator, _engine) = orchestrator();
        orchestrator.set_camera_preview_aspect_mode("fit", None).unwrap();
        orchestrator.set_preview_mirrored(true, None).unwrap();
        assert!(matches!(
            orchestrator.get_camera_preview(|_| ()),
            Err(SessionError::NotInitialized)
        ));

        orchestrator.initialize().unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        orchestrator
            .get_camera_preview(move |preview| {
                let view = preview.unwrap();
                let _ = tx.send((view.aspect_mode(), view.is_mirrored()));
            })
            .unwrap();

        assert_eq!(rx.recv().unwrap(), (AspectMode::Fit, true));
    }

    #[test]
    fn test_cached_overlay_failure_keeps_session_initialized() {
        let (orchestrator, _engine) = orchestrator();
        orchestrator.initialize().unwrap();
        let active = orchestrator.active().unwrap();
        active.queue.shutdown();
        orchestrator.settings.lock().overlays =
            Some(vec![OverlayDescriptor::new("logo", "file:///logo.png")]);

        orchestrator.install_cached_overlays(&active);

        assert_eq!(orchestrator.state(), SessionState::Initialized);
        assert!(matches!(
            orchestrator.set_overlay_list(Vec::new()),
            Err(SessionError::QueueClosed)
        ));
        orchestrator.deinitialize();
        assert_eq!(orchestrator.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_drop_releases_session() {
        let (orchestrator, engine) = orchestrator();
        orchestrator.initialize().unwrap();
        let session = engine.session().unwrap();

        drop(orchestrator);

        assert!(session.is_released());
    }
}
