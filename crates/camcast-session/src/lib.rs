//! Live broadcast session orchestrator.
//!
//! This crate composes encoder configuration, attaches capture devices to
//! the engine's compositing mixer, keeps overlay slots in line with a
//! declarative list, and turns engine callbacks into canonical events.

pub mod config;
mod devices;
mod error;
mod events;
mod mixer;
mod orchestrator;
mod overlays;
mod queue;
mod slots;

pub use devices::DeviceLifecycleManager;
pub use error::{ErrorKind, SessionError, SessionResult};
pub use events::{ChannelListener, EventListener, EventNormalizer};
pub use mixer::{MixerState, OverlayBook, SharedMixer};
pub use orchestrator::{BroadcastOrchestrator, PreviewCallback};
pub use overlays::{OverlayReconciler, ReconcileOutcome};
pub use queue::DeviceQueue;
pub use slots::MixerSlotRegistry;

use std::sync::Arc;

use camcast_device::{BroadcastEngine, ImageLoader};
use camcast_ipc::SessionEvent;
use crossbeam_channel::Receiver;

/// Thread name of a session's serialized device context.
pub const DEVICE_QUEUE_THREAD_NAME: &str = "camcast-device-queue";

/// Thread name of an overlay rebuild requested from the device context.
pub const OVERLAY_THREAD_NAME: &str = "camcast-overlay-reconcile";

/// Create an orchestrator whose events are delivered on a bounded channel.
pub fn create_orchestrator(
    engine: Arc<dyn BroadcastEngine>,
    image_loader: Arc<dyn ImageLoader>,
) -> (BroadcastOrchestrator, Receiver<SessionEvent>) {
    let (event_tx, event_rx) = camcast_ipc::event_channel();
    let orchestrator = BroadcastOrchestrator::new(engine, image_loader);
    orchestrator.set_event_listener(Some(Arc::new(ChannelListener(event_tx))));
    (orchestrator, event_rx)
}
