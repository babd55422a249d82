//! G-key event records: raw bit-packed codes and the canonical event.
//!
//! `GkeyCode` layout (LSB first):
//!   - bits 0..=7   key index (G6 → 6, mouse button 6 → 6)
//!   - bit  8       key down
//!   - bits 9..=10  mode state (1, 2, 3 for M1, M2, M3)
//!   - bit  11      event comes from a mouse
//!   - bits 12..=31 reserved
//!
//! Decoding uses shifts and masks only, never the C bitfield layout.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

const KEY_INDEX_MASK: u32 = 0xFF;
const KEY_DOWN_SHIFT: u32 = 8;
const MODE_SHIFT: u32 = 9;
const MODE_MASK: u32 = 0b11;
const MOUSE_SHIFT: u32 = 11;

/// Raw 32-bit code as delivered by the driver callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GkeyCode(pub u32);

impl GkeyCode {
    /// Pack fields into a code. Reserved bits are zero.
    pub fn pack(index: u8, down: bool, mode_bits: u8, mouse: bool) -> Self {
        let mut word = index as u32;
        word |= (down as u32) << KEY_DOWN_SHIFT;
        word |= ((mode_bits as u32) & MODE_MASK) << MODE_SHIFT;
        word |= (mouse as u32) << MOUSE_SHIFT;
        Self(word)
    }

    pub fn key_index(&self) -> u8 {
        (self.0 & KEY_INDEX_MASK) as u8
    }

    pub fn key_down(&self) -> bool {
        (self.0 >> KEY_DOWN_SHIFT) & 1 == 1
    }

    /// Raw 2-bit mode field; 0 is not a valid mode.
    pub fn mode_bits(&self) -> u8 {
        ((self.0 >> MODE_SHIFT) & MODE_MASK) as u8
    }

    pub fn is_mouse(&self) -> bool {
        (self.0 >> MOUSE_SHIFT) & 1 == 1
    }
}

/// G-key mode (M1/M2/M3 bank).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModeId {
    #[default]
    M1,
    M2,
    M3,
}

impl ModeId {
    pub const ALL: &'static [ModeId] = &[ModeId::M1, ModeId::M2, ModeId::M3];

    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            1 => Some(Self::M1),
            2 => Some(Self::M2),
            3 => Some(Self::M3),
            _ => None,
        }
    }

    /// 1-based mode number used by the SDK.
    pub fn number(&self) -> u8 {
        match self {
            Self::M1 => 1,
            Self::M2 => 2,
            Self::M3 => 3,
        }
    }
}

impl std::fmt::Display for ModeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "M{}", self.number())
    }
}

/// Origin of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Keyboard G-key.
    Key,
    /// Mouse button.
    Mouse,
}

/// One decoded hardware event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub source_index: u8,
    pub is_down: bool,
    pub mode: ModeId,
    pub is_mouse_origin: bool,
    /// Monotonic capture time, ms since session open.
    pub captured_at_ms: u64,
}

impl RawEvent {
    /// Decode a callback code. Returns `None` when the mode field is 0.
    pub fn decode(code: GkeyCode, captured_at_ms: u64) -> Option<Self> {
        let mode = ModeId::from_bits(code.mode_bits())?;
        Some(Self {
            source_index: code.key_index(),
            is_down: code.key_down(),
            mode,
            is_mouse_origin: code.is_mouse(),
            captured_at_ms,
        })
    }

    pub fn device(&self) -> DeviceKind {
        if self.is_mouse_origin {
            DeviceKind::Mouse
        } else {
            DeviceKind::Key
        }
    }
}

/// Normalized event handed to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEvent {
    pub device: DeviceKind,
    pub index: u8,
    pub pressed: bool,
    /// Mode after any transition carried by this event.
    pub mode: ModeId,
    pub label: Arc<str>,
    pub timestamp_ms: u64,
}

/// Keyboard G-key in a mode, written `G{key}_M{mode}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gkey {
    pub key: u8,
    pub mode: ModeId,
}

impl Gkey {
    /// Parse `G<key>_M<mode>`, e.g. `G12_M3`.
    pub fn from_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix('G')?;
        let (key, mode) = rest.split_once("_M")?;
        let key = key.parse::<u8>().ok()?;
        let mode = ModeId::from_bits(mode.parse::<u8>().ok()?)?;
        if key == 0 {
            return None;
        }
        Some(Self { key, mode })
    }
}

impl std::fmt::Display for Gkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "G{}_M{}", self.key, self.mode.number())
    }
}

/// Mouse button, written `M_{n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseButton(pub u8);

impl MouseButton {
    pub fn from_name(name: &str) -> Option<Self> {
        let n = name.strip_prefix("M_")?.parse::<u8>().ok()?;
        (n != 0).then_some(Self(n))
    }
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "M_{}", self.0)
    }
}
