//! Declarative overlay reconciliation.
//!
//! Every reconcile tears down all overlay slots and rebuilds them from the
//! desired list. Overlays change rarely, so no diff is computed.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use camcast_device::{DeviceHandle, EngineSession, ImageLoader, RasterImage};
use camcast_ipc::{OverlayDescriptor, Size, Vec2};

use crate::mixer::{MixerState, SharedMixer};
use crate::queue::DeviceQueue;
use crate::{SessionError, SessionResult};

/// What a reconcile pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Overlay slots created, in list order.
    pub created: Vec<String>,

    /// Entries skipped for a missing name or URI, a non-finite position, or
    /// a repeated name.
    pub skipped: usize,

    /// Entry whose image or source failed. Later entries were not processed.
    pub failed: Option<String>,
}

/// Rebuilds overlay slots from a desired list.
pub struct OverlayReconciler {
    loader: Arc<dyn ImageLoader>,
}

impl OverlayReconciler {
    pub fn new(loader: Arc<dyn ImageLoader>) -> Self {
        Self { loader }
    }

    /// Replace every overlay slot with the ones described by `desired`.
    ///
    /// Mixer mutations run on `queue`. Image loads are awaited on the calling
    /// thread between queue jobs. A failed load stops the pass; overlays
    /// created before it stay. Only a closed queue is an error.
    #[instrument(name = "reconcile_overlays", skip_all, fields(desired = desired.len()))]
    pub fn reconcile(
        &self,
        queue: &DeviceQueue,
        mixer: &SharedMixer,
        session: &Arc<dyn EngineSession>,
        desired: &[OverlayDescriptor],
    ) -> SessionResult<ReconcileOutcome> {
        let removed = {
            let mixer = Arc::clone(mixer);
            let session = Arc::clone(session);
            queue.run(move || teardown(&mut mixer.lock(), session.as_ref()))?
        };
        if removed > 0 {
            debug!(removed, "Overlays torn down");
        }

        let mut outcome = ReconcileOutcome::default();
        let mut seen = HashSet::new();

        for overlay in desired {
            let Some((name, uri)) = overlay.source() else {
                debug!(name = ?overlay.name, "Overlay entry lacks a name or uri, skipping");
                outcome.skipped += 1;
                continue;
            };
            if overlay.position.is_some_and(|position| !position.is_finite()) {
                warn!(%name, position = ?overlay.position, "Overlay position is not finite, skipping");
                outcome.skipped += 1;
                continue;
            }
            if !seen.insert(name.to_string()) {
                warn!(%name, "Duplicate overlay name, skipping");
                outcome.skipped += 1;
                continue;
            }

            let image = match self.loader.load(uri).recv() {
                Ok(Some(image)) => image,
                Ok(None) | Err(_) => {
                    warn!(%name, %uri, "Failed to load overlay image, abandoning remaining overlays");
                    outcome.failed = Some(name.to_string());
                    break;
                }
            };

            let size = overlay.size.unwrap_or_else(|| image.size());
            let position = overlay.position.unwrap_or(Vec2::ORIGIN);

            let installed = {
                let mixer = Arc::clone(mixer);
                let session = Arc::clone(session);
                let name = name.to_string();
                queue.run(move || {
                    install(&mut mixer.lock(), session.as_ref(), &name, size, position, &image)
                })?
            };

            match installed {
                Ok(()) => outcome.created.push(name.to_string()),
                Err(SessionError::DuplicateSlotName(_)) => {
                    warn!(%name, "Overlay name collides with an existing slot, skipping");
                    outcome.skipped += 1;
                }
                Err(e) => {
                    warn!(%name, "Failed to install overlay, abandoning remaining overlays: {}", e);
                    outcome.failed = Some(name.to_string());
                    break;
                }
            }
        }

        info!(
            created = outcome.created.len(),
            skipped = outcome.skipped,
            failed = outcome.failed.is_some(),
            "Overlays reconciled"
        );
        Ok(outcome)
    }
}

/// Remove every overlay slot and its source. Returns how many were removed.
pub(crate) fn teardown(state: &mut MixerState, session: &dyn EngineSession) -> usize {
    let mut names = state.slots.overlay_names();
    for name in state.overlays.keys() {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }

    for name in &names {
        if let Some(source) = state.overlays.remove(name).and_then(|weak| weak.upgrade()) {
            if let Err(e) = state.devices.detach(&source) {
                warn!(%name, "Failed to detach overlay source: {}", e);
            }
        }
        if state.slots.remove_slot(name).is_some() {
            if let Err(e) = session.remove_slot(name) {
                warn!(%name, "Failed to remove overlay slot: {}", e);
            }
        }
    }

    names.len()
}

fn install(
    state: &mut MixerState,
    session: &dyn EngineSession,
    name: &str,
    size: Size,
    position: Vec2,
    image: &RasterImage,
) -> SessionResult<()> {
    let slot = state.slots.add_overlay_slot(name, size, position)?;
    if let Err(e) = session.add_slot(&slot) {
        state.slots.remove_slot(name);
        return Err(e.into());
    }

    match feed_slot(state, session, name, image) {
        Ok(source) => {
            state.overlays.insert(name.to_string(), Arc::downgrade(&source));
            debug!(%name, urn = %source.urn(), "Overlay installed");
            Ok(())
        }
        Err(e) => {
            state.slots.remove_slot(name);
            if let Err(remove_err) = session.remove_slot(name) {
                warn!(%name, "Failed to roll back overlay slot: {}", remove_err);
            }
            Err(e)
        }
    }
}

/// Create an image source, draw `image` into it once and bind it to `slot`.
fn feed_slot(
    state: &mut MixerState,
    session: &dyn EngineSession,
    slot: &str,
    image: &RasterImage,
) -> SessionResult<DeviceHandle> {
    let source = session.create_image_source()?;

    let drawn = match source.as_image_surface() {
        Some(surface) => {
            surface.set_size(image.width, image.height);
            surface.draw(image).map_err(SessionError::from)
        }
        None => Err(SessionError::ResourceUnavailable(
            "image source has no drawable surface".into(),
        )),
    };

    if let Err(e) = drawn.and_then(|()| state.devices.bind(&source, slot)) {
        if let Err(detach_err) = session.detach_device(&source) {
            warn!(urn = %source.urn(), "Failed to detach image source: {}", detach_err);
        }
        return Err(e);
    }

    Ok(source)
}
