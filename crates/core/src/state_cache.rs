//! Last-known pressed state per (device, index, mode).
//!
//! Single writer (the normalizer, on the driver thread), any number of
//! readers. Entries are replaced whole under the write lock so a reader
//! never sees a half-updated entry.

use crate::gkey::{CanonicalEvent, DeviceKind, ModeId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Identity of one physical input in one mode.
pub type KeyId = (DeviceKind, u8, ModeId);

/// State of one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyState {
    pub pressed: bool,
    /// Capture time of the event that set this state.
    pub changed_at_ms: u64,
}

#[derive(Debug, Default)]
pub struct InputStateCache {
    table: RwLock<HashMap<KeyId, KeyState>>,
}

impl InputStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an emitted event. Called only by the normalizer path.
    pub fn update(&self, evt: &CanonicalEvent) {
        self.table.write().insert(
            (evt.device, evt.index, evt.mode),
            KeyState {
                pressed: evt.pressed,
                changed_at_ms: evt.timestamp_ms,
            },
        );
    }

    /// `false` for inputs never seen.
    pub fn query(&self, device: DeviceKind, index: u8, mode: ModeId) -> bool {
        self.get(device, index, mode).is_some_and(|s| s.pressed)
    }

    pub fn get(&self, device: DeviceKind, index: u8, mode: ModeId) -> Option<KeyState> {
        self.table.read().get(&(device, index, mode)).copied()
    }

    /// All currently pressed inputs, sorted.
    pub fn pressed(&self) -> Vec<KeyId> {
        let mut keys: Vec<KeyId> = self
            .table
            .read()
            .iter()
            .filter(|(_, s)| s.pressed)
            .map(|(k, _)| *k)
            .collect();
        keys.sort_by_key(|(d, i, m)| (*d == DeviceKind::Mouse, *i, m.number()));
        keys
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
