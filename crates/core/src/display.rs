//! Pushes frame changes to the LCD SDK.
//!
//! Caller-paced: no internal timer. Call [`DisplayDriver::tick`] every
//! 60–250 ms. A tick with nothing changed makes no SDK calls.

use crate::error::DriverError;
use crate::frame::{FrameBuffer, FrameChanges, LcdFrame};
use crate::sdk::{LcdSdk, LcdType, Rgb};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Result of a successful tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Changes were pushed and latched with `LogiLcdUpdate`.
    Pushed,
    /// Nothing changed since the last push.
    Skipped,
}

pub struct DisplayDriver {
    sdk: Arc<dyn LcdSdk>,
    lcd_type: LcdType,
}

impl DisplayDriver {
    /// `lcd_type` must already be validated against `LogiLcdIsConnected`.
    pub fn new(sdk: Arc<dyn LcdSdk>, lcd_type: LcdType) -> Self {
        Self { sdk, lcd_type }
    }

    pub fn lcd_type(&self) -> LcdType {
        self.lcd_type
    }

    /// Push what differs and commit on success.
    ///
    /// On failure `committed` is untouched, so the next tick pushes again.
    pub fn tick(&self, frame: &mut FrameBuffer) -> Result<TickOutcome, DriverError> {
        if !frame.diff() {
            return Ok(TickOutcome::Skipped);
        }

        let changes = frame.changes();
        let result = match self.lcd_type {
            LcdType::Mono => self.push_mono(frame.pending(), &changes),
            LcdType::Color => self.push_color(frame.pending(), &changes),
            LcdType::None => return Ok(TickOutcome::Skipped),
        };

        if let Err(e) = result {
            warn!(error = %e, "LCD push failed, will retry on next tick");
            return Err(e);
        }

        self.sdk.update();
        frame.commit();
        debug!(
            title = changes.title,
            lines = ?changes.lines,
            bitmap = changes.bitmap,
            "LCD frame pushed"
        );
        Ok(TickOutcome::Pushed)
    }

    fn push_mono(&self, frame: &LcdFrame, changes: &FrameChanges) -> Result<(), DriverError> {
        if changes.bitmap {
            trace!("LogiLcdMonoSetBackground");
            let ok = match &frame.bitmap {
                Some(px) => self.sdk.mono_set_background(px),
                None => self.sdk.mono_set_background(&blank(self.lcd_type)),
            };
            check(ok, "LogiLcdMonoSetBackground")?;
        }
        for &i in &changes.lines {
            trace!(line = i, "LogiLcdMonoSetText");
            check(
                self.sdk.mono_set_text(i, &frame.lines[i].text),
                "LogiLcdMonoSetText",
            )?;
        }
        Ok(())
    }

    fn push_color(&self, frame: &LcdFrame, changes: &FrameChanges) -> Result<(), DriverError> {
        if changes.bitmap {
            trace!("LogiLcdColorSetBackground");
            let ok = match &frame.bitmap {
                Some(px) => self.sdk.color_set_background(px),
                None => self.sdk.color_set_background(&blank(self.lcd_type)),
            };
            check(ok, "LogiLcdColorSetBackground")?;
        }
        if changes.title {
            let (text, color) = frame
                .title
                .as_ref()
                .map_or(("", Rgb::WHITE), |t| (t.text.as_str(), t.color));
            trace!(text, "LogiLcdColorSetTitle");
            check(
                self.sdk.color_set_title(text, color),
                "LogiLcdColorSetTitle",
            )?;
        }
        for &i in &changes.lines {
            let line = &frame.lines[i];
            trace!(line = i, "LogiLcdColorSetText");
            check(
                self.sdk.color_set_text(i, &line.text, line.color),
                "LogiLcdColorSetText",
            )?;
        }
        Ok(())
    }
}

fn blank(lcd_type: LcdType) -> Vec<u8> {
    vec![0u8; lcd_type.geometry().map_or(0, |g| g.bitmap_len())]
}

fn check(ok: bool, call: &'static str) -> Result<(), DriverError> {
    if ok {
        Ok(())
    } else {
        Err(DriverError::PushFailed { call })
    }
}
