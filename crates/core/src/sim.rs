//! In-process stand-in for the vendor G-key and LCD libraries.
//!
//! Records every init/push/update/shutdown call, lets tests and the CLI
//! fire callback events, and can be told to fail the next push.

use crate::gkey::GkeyCode;
use crate::sdk::{GkeyCallback, GkeySdk, LcdButton, LcdSdk, LcdType, Rgb};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use tracing::trace;

/// One recorded SDK call. Background pushes record only the buffer length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkCall {
    GkeyInit,
    GkeyShutdown,
    LcdInit(String, LcdType),
    IsConnected(LcdType),
    MonoSetBackground(usize),
    MonoSetText(usize, String),
    ColorSetBackground(usize),
    ColorSetTitle(String, Rgb),
    ColorSetText(usize, String, Rgb),
    Update,
    LcdShutdown,
}

pub struct SimulatedSdk {
    callback: Mutex<Option<GkeyCallback>>,
    gkey_init_ok: AtomicBool,
    unregister_on_shutdown: AtomicBool,
    lcd_init_ok: AtomicBool,
    connected: Mutex<HashSet<LcdType>>,
    calls: Mutex<Vec<SdkCall>>,
    fail_next_push: AtomicBool,
    lcd_buttons: AtomicU32,
    gkey_labels: Mutex<HashMap<(u8, u8), String>>,
    mouse_labels: Mutex<HashMap<u8, String>>,
    label_lookups: AtomicUsize,
    held_gkeys: Mutex<HashSet<(u8, u8)>>,
    held_mouse: Mutex<HashSet<u8>>,
    last_background: Mutex<Option<Vec<u8>>>,
}

impl Default for SimulatedSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSdk {
    /// Both inits succeed and a mono panel is connected.
    pub fn new() -> Self {
        Self {
            callback: Mutex::new(None),
            gkey_init_ok: AtomicBool::new(true),
            unregister_on_shutdown: AtomicBool::new(true),
            lcd_init_ok: AtomicBool::new(true),
            connected: Mutex::new(HashSet::from([LcdType::Mono])),
            calls: Mutex::new(Vec::new()),
            fail_next_push: AtomicBool::new(false),
            lcd_buttons: AtomicU32::new(0),
            gkey_labels: Mutex::new(HashMap::new()),
            mouse_labels: Mutex::new(HashMap::new()),
            label_lookups: AtomicUsize::new(0),
            held_gkeys: Mutex::new(HashSet::new()),
            held_mouse: Mutex::new(HashSet::new()),
            last_background: Mutex::new(None),
        }
    }

    /// Panels reported by `is_connected`.
    pub fn set_connected(&self, types: &[LcdType]) {
        *self.connected.lock() = types.iter().copied().collect();
    }

    pub fn set_gkey_init_result(&self, ok: bool) {
        self.gkey_init_ok.store(ok, Ordering::Release);
    }

    pub fn set_lcd_init_result(&self, ok: bool) {
        self.lcd_init_ok.store(ok, Ordering::Release);
    }

    /// With `false`, `shutdown` keeps the callback, like a driver that
    /// still has a callback queued when the application shuts down.
    pub fn set_unregister_on_shutdown(&self, unregister: bool) {
        self.unregister_on_shutdown.store(unregister, Ordering::Release);
    }

    /// Make the next push call return failure.
    pub fn fail_next_push(&self) {
        self.fail_next_push.store(true, Ordering::Release);
    }

    pub fn set_gkey_label(&self, gkey: u8, mode: u8, label: &str) {
        self.gkey_labels.lock().insert((gkey, mode), label.to_owned());
    }

    pub fn set_mouse_label(&self, button: u8, label: &str) {
        self.mouse_labels.lock().insert(button, label.to_owned());
    }

    /// Number of friendly-name lookups served.
    pub fn label_lookups(&self) -> usize {
        self.label_lookups.load(Ordering::Acquire)
    }

    pub fn press_lcd_button(&self, button: LcdButton, down: bool) {
        if down {
            self.lcd_buttons.fetch_or(button.mask(), Ordering::AcqRel);
        } else {
            self.lcd_buttons.fetch_and(!button.mask(), Ordering::AcqRel);
        }
    }

    pub fn hold_gkey(&self, gkey: u8, mode: u8, down: bool) {
        let mut held = self.held_gkeys.lock();
        if down {
            held.insert((gkey, mode));
        } else {
            held.remove(&(gkey, mode));
        }
    }

    pub fn hold_mouse_button(&self, button: u8, down: bool) {
        let mut held = self.held_mouse.lock();
        if down {
            held.insert(button);
        } else {
            held.remove(&button);
        }
    }

    /// Whether a callback is currently registered.
    pub fn has_callback(&self) -> bool {
        self.callback.lock().is_some()
    }

    /// Invoke the registered callback as the driver thread would.
    ///
    /// Returns `false` if no callback is registered.
    pub fn fire(&self, code: GkeyCode, label: Option<&str>) -> bool {
        let callback = self.callback.lock().clone();
        match callback {
            Some(cb) => {
                cb(code, label);
                true
            }
            None => false,
        }
    }

    /// Drain the call log.
    pub fn take_calls(&self) -> Vec<SdkCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Most recent background buffer pushed (mono or color).
    pub fn last_background(&self) -> Option<Vec<u8>> {
        self.last_background.lock().clone()
    }

    fn record(&self, call: SdkCall) {
        trace!(?call, "simulated SDK call");
        self.calls.lock().push(call);
    }

    fn push(&self, call: SdkCall) -> bool {
        self.record(call);
        !self.fail_next_push.swap(false, Ordering::AcqRel)
    }
}

impl GkeySdk for SimulatedSdk {
    fn init(&self, callback: GkeyCallback) -> bool {
        self.record(SdkCall::GkeyInit);
        if !self.gkey_init_ok.load(Ordering::Acquire) {
            return false;
        }
        *self.callback.lock() = Some(callback);
        true
    }

    fn shutdown(&self) {
        self.record(SdkCall::GkeyShutdown);
        if self.unregister_on_shutdown.load(Ordering::Acquire) {
            *self.callback.lock() = None;
        }
    }

    fn is_mouse_button_pressed(&self, button: u8) -> bool {
        self.held_mouse.lock().contains(&button)
    }

    fn is_keyboard_gkey_pressed(&self, gkey: u8, mode: u8) -> bool {
        self.held_gkeys.lock().contains(&(gkey, mode))
    }

    fn mouse_button_string(&self, button: u8) -> Option<String> {
        self.label_lookups.fetch_add(1, Ordering::AcqRel);
        self.mouse_labels.lock().get(&button).cloned()
    }

    fn keyboard_gkey_string(&self, gkey: u8, mode: u8) -> Option<String> {
        self.label_lookups.fetch_add(1, Ordering::AcqRel);
        self.gkey_labels.lock().get(&(gkey, mode)).cloned()
    }
}

impl LcdSdk for SimulatedSdk {
    fn init(&self, name: &str, lcd_type: LcdType) -> bool {
        self.record(SdkCall::LcdInit(name.to_owned(), lcd_type));
        self.lcd_init_ok.load(Ordering::Acquire)
    }

    fn is_connected(&self, lcd_type: LcdType) -> bool {
        self.record(SdkCall::IsConnected(lcd_type));
        self.connected.lock().contains(&lcd_type)
    }

    fn is_button_pressed(&self, button: LcdButton) -> bool {
        self.lcd_buttons.load(Ordering::Acquire) & button.mask() != 0
    }

    fn mono_set_background(&self, pixels: &[u8]) -> bool {
        *self.last_background.lock() = Some(pixels.to_vec());
        self.push(SdkCall::MonoSetBackground(pixels.len()))
    }

    fn mono_set_text(&self, line: usize, text: &str) -> bool {
        self.push(SdkCall::MonoSetText(line, text.to_owned()))
    }

    fn color_set_background(&self, pixels: &[u8]) -> bool {
        *self.last_background.lock() = Some(pixels.to_vec());
        self.push(SdkCall::ColorSetBackground(pixels.len()))
    }

    fn color_set_title(&self, text: &str, rgb: Rgb) -> bool {
        self.push(SdkCall::ColorSetTitle(text.to_owned(), rgb))
    }

    fn color_set_text(&self, line: usize, text: &str, rgb: Rgb) -> bool {
        self.push(SdkCall::ColorSetText(line, text.to_owned(), rgb))
    }

    fn update(&self) {
        self.record(SdkCall::Update);
    }

    fn shutdown(&self) {
        self.record(SdkCall::LcdShutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fire_without_callback_is_noop() {
        let sdk = SimulatedSdk::new();
        assert!(!sdk.fire(GkeyCode(0), None));
    }

    #[test]
    fn init_registers_and_shutdown_unregisters() {
        let sdk = SimulatedSdk::new();
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        assert!(GkeySdk::init(
            &sdk,
            Arc::new(move |_: GkeyCode, _: Option<&str>| {
                counter.fetch_add(1, Ordering::Relaxed);
            })
        ));
        assert!(sdk.fire(GkeyCode(0), None));
        GkeySdk::shutdown(&sdk);
        assert!(!sdk.fire(GkeyCode(0), None));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert_eq!(sdk.take_calls(), vec![SdkCall::GkeyInit, SdkCall::GkeyShutdown]);
    }

    #[test]
    fn fail_next_push_fails_once() {
        let sdk = SimulatedSdk::new();
        sdk.fail_next_push();
        assert!(!sdk.mono_set_text(0, "a"));
        assert!(sdk.mono_set_text(0, "a"));
    }

    #[test]
    fn lcd_buttons_are_bitmask() {
        let sdk = SimulatedSdk::new();
        sdk.press_lcd_button(LcdButton::Two, true);
        sdk.press_lcd_button(LcdButton::Ok, true);
        assert!(sdk.is_button_pressed(LcdButton::Two));
        assert!(sdk.is_button_pressed(LcdButton::Ok));
        assert!(!sdk.is_button_pressed(LcdButton::One));
        sdk.press_lcd_button(LcdButton::Two, false);
        assert!(!sdk.is_button_pressed(LcdButton::Two));
    }
}
