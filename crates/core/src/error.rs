//! Error types for g-broker-core.

use crate::sdk::LcdType;
use thiserror::Error;

/// Failure to open a [`DeviceSession`](crate::session::DeviceSession).
///
/// Fatal to the session. Not retried: the device is most likely absent.
#[derive(Debug, Error)]
pub enum OpenError {
    /// Another session already owns the process-wide G-key callback.
    #[error("another device session is already active")]
    SessionActive,

    /// `LogiGkeyInit` returned failure.
    #[error("G-key SDK initialization failed")]
    GkeyInit,

    /// `LogiLcdInit` returned failure.
    #[error("LCD SDK initialization failed for applet {0:?}")]
    LcdInit(String),

    /// The requested LCD type is not connected.
    #[error("no {0} LCD connected")]
    LcdNotConnected(LcdType),

    /// Session configuration rejected before touching the SDK.
    #[error("invalid session configuration: {0}")]
    Config(String),
}

/// Failure while pushing a frame to the LCD.
///
/// The committed frame is left untouched, so the next tick retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// An SDK push call returned failure.
    #[error("LCD push failed: {call}")]
    PushFailed { call: &'static str },
}

/// Invalid mutation of a pending LCD frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Text line index past the device's line count.
    #[error("line {index} out of range (device has {count} lines)")]
    LineOutOfRange { index: usize, count: usize },

    /// Mono LCDs have no title line.
    #[error("title is only supported on color LCDs")]
    TitleUnsupported,

    /// Bitmap length does not match the device geometry.
    #[error("bitmap is {actual} bytes, expected {expected}")]
    BitmapSize { expected: usize, actual: usize },

    /// Session was opened without an LCD.
    #[error("session has no LCD")]
    NoDisplay,
}

/// Configuration loading/validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Value out of range.
    #[error("invalid config value: {field} ({reason})")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// HID enumeration failure during device discovery.
    #[error("HID error: {0}")]
    Hid(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
