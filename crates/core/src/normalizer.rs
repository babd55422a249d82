//! Raw callback events → canonical events, with debouncing and mode tracking.
//!
//! Runs on the driver's callback thread. Locks here are held only for map
//! lookups; the SDK friendly-name lookup happens with no lock held.

use crate::gkey::{CanonicalEvent, DeviceKind, Gkey, ModeId, MouseButton, RawEvent};
use crate::sdk::GkeySdk;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Debounce identity: same origin, same index, same edge.
type DebounceKey = (DeviceKind, u8, bool);

/// Label identity: labels are static per device/index/mode.
type LabelKey = (u8, bool, ModeId);

#[derive(Debug, Default)]
struct NormalizerState {
    mode: ModeId,
    last_emitted_ms: HashMap<DebounceKey, u64>,
}

/// Decodes, debounces and labels G-key events.
pub struct EventNormalizer {
    debounce_ms: u64,
    state: Mutex<NormalizerState>,
    labels: Mutex<HashMap<LabelKey, Arc<str>>>,
    names: Arc<dyn GkeySdk>,
}

impl EventNormalizer {
    /// `debounce_ms` of 0 passes every event through.
    pub fn new(names: Arc<dyn GkeySdk>, debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            state: Mutex::new(NormalizerState::default()),
            labels: Mutex::new(HashMap::new()),
            names,
        }
    }

    /// Mode as of the most recently observed event (M1 before any event).
    pub fn current_mode(&self) -> ModeId {
        self.state.lock().mode
    }

    /// Normalize one raw event. `None` means it was debounced away.
    ///
    /// The mode switch is applied before the debounce check, so the tracked
    /// mode always follows the latest raw event even when it is suppressed.
    pub fn normalize(&self, raw: &RawEvent, driver_label: Option<&str>) -> Option<CanonicalEvent> {
        let device = raw.device();
        {
            let mut state = self.state.lock();
            if state.mode != raw.mode {
                debug!(from = %state.mode, to = %raw.mode, "G-key mode changed");
                state.mode = raw.mode;
            }

            let key = (device, raw.source_index, raw.is_down);
            if let Some(&last) = state.last_emitted_ms.get(&key) {
                let elapsed = raw.captured_at_ms.saturating_sub(last);
                if self.debounce_ms > 0 && elapsed < self.debounce_ms {
                    trace!(
                        index = raw.source_index,
                        pressed = raw.is_down,
                        elapsed_ms = elapsed,
                        "Debounced"
                    );
                    return None;
                }
            }
            state.last_emitted_ms.insert(key, raw.captured_at_ms);
        }

        let label = self.label_for(raw, driver_label);
        Some(CanonicalEvent {
            device,
            index: raw.source_index,
            pressed: raw.is_down,
            mode: raw.mode,
            label,
            timestamp_ms: raw.captured_at_ms,
        })
    }

    fn label_for(&self, raw: &RawEvent, driver_label: Option<&str>) -> Arc<str> {
        let key = (raw.source_index, raw.is_mouse_origin, raw.mode);
        if let Some(label) = self.labels.lock().get(&key) {
            return Arc::clone(label);
        }

        let looked_up = if raw.is_mouse_origin {
            self.names.mouse_button_string(raw.source_index)
        } else {
            self.names
                .keyboard_gkey_string(raw.source_index, raw.mode.number())
        };

        let label: Arc<str> = looked_up
            .filter(|s| !s.is_empty())
            .or_else(|| driver_label.filter(|s| !s.is_empty()).map(str::to_owned))
            .unwrap_or_else(|| fallback_name(raw))
            .into();

        self.labels
            .lock()
            .entry(key)
            .or_insert_with(|| Arc::clone(&label));
        label
    }
}

fn fallback_name(raw: &RawEvent) -> String {
    if raw.is_mouse_origin {
        MouseButton(raw.source_index).to_string()
    } else {
        Gkey {
            key: raw.source_index,
            mode: raw.mode,
        }
        .to_string()
    }
}
