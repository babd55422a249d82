//! Vendor SDK collaborator surface.
//!
//! The G-key and LCD libraries are closed-source; these traits describe the
//! calls the broker makes into them so that an FFI binding and the
//! [`sim::SimulatedSdk`](crate::sim::SimulatedSdk) share one interface.
//!
//! Implementations copy every driver-owned wide string into an owned
//! `String` before returning it.

use crate::gkey::GkeyCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Callback registered through `LogiGkeyInit`.
///
/// Invoked on the driver's thread with the raw bit-packed code and the
/// driver-supplied friendly string, if any.
pub type GkeyCallback = Arc<dyn Fn(GkeyCode, Option<&str>) + Send + Sync>;

/// `LogitechGkeyLib` surface.
pub trait GkeySdk: Send + Sync {
    /// Register the process-wide callback. `false` means no events will arrive.
    fn init(&self, callback: GkeyCallback) -> bool;

    /// Unregister the callback and release SDK resources.
    fn shutdown(&self);

    fn is_mouse_button_pressed(&self, button: u8) -> bool;

    fn is_keyboard_gkey_pressed(&self, gkey: u8, mode: u8) -> bool;

    /// Friendly name for a mouse button, e.g. "Mouse Btn 8".
    fn mouse_button_string(&self, button: u8) -> Option<String>;

    /// Friendly name for a keyboard G-key in a mode, e.g. "G5/M1".
    fn keyboard_gkey_string(&self, gkey: u8, mode: u8) -> Option<String>;
}

/// `LogitechLCDLib` surface.
pub trait LcdSdk: Send + Sync {
    fn init(&self, name: &str, lcd_type: LcdType) -> bool;

    fn is_connected(&self, lcd_type: LcdType) -> bool;

    fn is_button_pressed(&self, button: LcdButton) -> bool;

    /// 160x43 bytes, a pixel is lit when its byte is >= 128.
    fn mono_set_background(&self, pixels: &[u8]) -> bool;

    /// Line 0..=3.
    fn mono_set_text(&self, line: usize, text: &str) -> bool;

    /// 320x240 pixels, 4 bytes each.
    fn color_set_background(&self, pixels: &[u8]) -> bool;

    fn color_set_title(&self, text: &str, rgb: Rgb) -> bool;

    /// Line 0..=7.
    fn color_set_text(&self, line: usize, text: &str, rgb: Rgb) -> bool;

    /// Latch everything set since the last update to the panel.
    fn update(&self);

    fn shutdown(&self);
}

/// LCD kind requested at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LcdType {
    /// G-key only, no LCD.
    None,
    #[default]
    Mono,
    Color,
}

impl LcdType {
    /// Value passed to `LogiLcdInit` / `LogiLcdIsConnected`.
    pub fn sdk_value(&self) -> i32 {
        match self {
            Self::None => 0,
            Self::Mono => 1,
            Self::Color => 2,
        }
    }

    pub fn geometry(&self) -> Option<LcdGeometry> {
        match self {
            Self::None => None,
            Self::Mono => Some(LcdGeometry::MONO),
            Self::Color => Some(LcdGeometry::COLOR),
        }
    }
}

impl std::fmt::Display for LcdType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Mono => "mono",
            Self::Color => "color",
        };
        write!(f, "{name}")
    }
}

/// Panel dimensions and text layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcdGeometry {
    pub width: usize,
    pub height: usize,
    pub bytes_per_pixel: usize,
    pub text_lines: usize,
    pub has_title: bool,
}

impl LcdGeometry {
    pub const MONO: Self = Self {
        width: 160,
        height: 43,
        bytes_per_pixel: 1,
        text_lines: 4,
        has_title: false,
    };

    pub const COLOR: Self = Self {
        width: 320,
        height: 240,
        bytes_per_pixel: 4,
        text_lines: 8,
        has_title: true,
    };

    /// Exact background buffer length the SDK expects.
    pub fn bitmap_len(&self) -> usize {
        self.width * self.height * self.bytes_per_pixel
    }
}

/// 8-bit RGB text color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

/// LCD soft buttons, with the bit values `LogiLcdIsButtonPressed` takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum LcdButton {
    One = 0x0001,
    Two = 0x0002,
    Three = 0x0004,
    Four = 0x0008,
    Left = 0x0100,
    Right = 0x0200,
    Ok = 0x0400,
    Cancel = 0x0800,
    Up = 0x1000,
    Down = 0x2000,
    Menu = 0x4000,
}

impl LcdButton {
    pub const MONO: &'static [LcdButton] = &[Self::One, Self::Two, Self::Three, Self::Four];

    pub const COLOR: &'static [LcdButton] = &[
        Self::Left,
        Self::Right,
        Self::Ok,
        Self::Cancel,
        Self::Up,
        Self::Down,
        Self::Menu,
    ];

    pub fn mask(&self) -> u32 {
        *self as u32
    }

    /// Buttons present on a given panel type.
    pub fn for_lcd(lcd_type: LcdType) -> &'static [LcdButton] {
        match lcd_type {
            LcdType::None => &[],
            LcdType::Mono => Self::MONO,
            LcdType::Color => Self::COLOR,
        }
    }
}
