//! Mutable mixer topology of one session.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use camcast_device::{BroadcastEngine, Device, EngineSession};

use crate::devices::DeviceLifecycleManager;
use crate::slots::MixerSlotRegistry;

/// Overlay slot name to the image source feeding it.
///
/// Sources are held weakly; the binding table owns them.
pub type OverlayBook = HashMap<String, Weak<dyn Device>>;

/// Slot layout, device bindings and overlay bookkeeping.
pub struct MixerState {
    pub slots: MixerSlotRegistry,
    pub devices: DeviceLifecycleManager,
    pub overlays: OverlayBook,
}

/// Shared handle to a session's mixer state.
///
/// Locked only from jobs on the session's device queue, apart from
/// diagnostic copies.
pub type SharedMixer = Arc<Mutex<MixerState>>;

impl MixerState {
    pub fn new(
        slots: MixerSlotRegistry,
        engine: Arc<dyn BroadcastEngine>,
        session: Arc<dyn EngineSession>,
    ) -> Self {
        Self {
            slots,
            devices: DeviceLifecycleManager::new(engine, session),
            overlays: OverlayBook::new(),
        }
    }

    pub fn shared(self) -> SharedMixer {
        Arc::new(Mutex::new(self))
    }
}
