//! Named mixer slot bookkeeping.

use tracing::debug;

use camcast_ipc::{MixerSlot, Size, Vec2, CAMERA_SLOT};

use crate::{SessionError, SessionResult};

/// Registry of the slots the session has added to the mixer.
///
/// Slot names are unique. The camera slot, once present, stays for the
/// life of the session.
#[derive(Debug, Default, Clone)]
pub struct MixerSlotRegistry {
    slots: Vec<MixerSlot>,
}

impl MixerSlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure the camera slot exists and return it.
    pub fn ensure_camera_slot(&mut self) -> MixerSlot {
        if let Some(slot) = self.get(CAMERA_SLOT) {
            return slot.clone();
        }

        let slot = MixerSlot::camera();
        debug!(slot = %slot.name, "Registered camera slot");
        self.slots.push(slot.clone());
        slot
    }

    /// Register an overlay slot. Fails if the name is taken.
    pub fn add_overlay_slot(
        &mut self,
        name: &str,
        size: Size,
        position: Vec2,
    ) -> SessionResult<MixerSlot> {
        if self.contains(name) {
            return Err(SessionError::DuplicateSlotName(name.to_string()));
        }

        let slot = MixerSlot::overlay(name, size, position);
        debug!(slot = %name, width = size.width, height = size.height, "Registered overlay slot");
        self.slots.push(slot.clone());
        Ok(slot)
    }

    /// Forget a slot. Returns the removed slot, if any.
    ///
    /// The camera slot is never removed.
    pub fn remove_slot(&mut self, name: &str) -> Option<MixerSlot> {
        if name == CAMERA_SLOT {
            return None;
        }
        let index = self.slots.iter().position(|slot| slot.name == name)?;
        Some(self.slots.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&MixerSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All slots in paint order. Ties keep insertion order.
    pub fn slots(&self) -> Vec<MixerSlot> {
        let mut slots = self.slots.clone();
        slots.sort_by_key(|slot| slot.z_index);
        slots
    }

    /// Names of every overlay slot.
    pub fn overlay_names(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|slot| !slot.is_camera())
            .map(|slot| slot.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
