//! g-broker-core: event/state broker for the Logitech G-key and LCD SDKs.
//!
//! Turns the driver-thread G-key callback into a debounced, mode-tracked
//! event stream plus a queryable input state, and turns the stateless
//! "push a whole frame" LCD API into a diffed frame pipeline.

pub mod clock;
pub mod config;
pub mod device;
pub mod display;
pub mod error;
pub mod frame;
pub mod gkey;
#[cfg(test)]
mod integration_tests;
pub mod normalizer;
pub mod sdk;
pub mod session;
pub mod sim;
pub mod state_cache;

/// Logitech USB Vendor ID.
pub const LOGITECH_VID: u16 = 0x046D;

/// Product IDs of keyboards with G-keys and an LCD.
pub mod pids {
    /// G13 advanced gameboard.
    pub const G13: u16 = 0xC21C;
    /// G15 (first revision, orange backlight) LCD interface.
    pub const G15_V1: u16 = 0xC222;
    /// G15 (second revision, blue backlight).
    pub const G15_V2: u16 = 0xC227;
    /// G510 without headset attached.
    pub const G510: u16 = 0xC22D;
    /// G510 with headset attached (USB audio enabled).
    pub const G510_AUDIO: u16 = 0xC22E;
    /// G19 color LCD interface.
    pub const G19: u16 = 0xC229;
}
