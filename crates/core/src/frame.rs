//! Logical LCD frame and the pending/committed pair used for diffing.
//!
//! The application mutates `pending`; [`DisplayDriver`](crate::display::DisplayDriver)
//! pushes whatever differs from `committed` and then commits.
//!
//! `FrameBuffer` takes `&mut self` for every mutation and for `commit`, so a
//! single owner is enforced by the borrow checker. Applications sharing a
//! session across threads must wrap it in their own lock; the buffer adds none.

use crate::error::FrameError;
use crate::sdk::{LcdGeometry, LcdType, Rgb};
use std::sync::Arc;

/// One line of text with its color (color is ignored on mono panels).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextLine {
    pub text: String,
    pub color: Rgb,
}

/// Title shown in the enlarged first row of a color panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    pub text: String,
    pub color: Rgb,
}

/// Full logical frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcdFrame {
    pub lines: Vec<TextLine>,
    pub title: Option<Title>,
    /// Background pixels, exactly `geometry.bitmap_len()` bytes.
    pub bitmap: Option<Arc<[u8]>>,
    pub color_mode: bool,
}

impl LcdFrame {
    /// Blank frame for a panel geometry.
    pub fn blank(geometry: &LcdGeometry) -> Self {
        Self {
            lines: vec![TextLine::default(); geometry.text_lines],
            title: None,
            bitmap: None,
            color_mode: geometry.has_title,
        }
    }
}

/// What differs between pending and committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameChanges {
    pub title: bool,
    pub lines: Vec<usize>,
    pub bitmap: bool,
}

impl FrameChanges {
    pub fn is_empty(&self) -> bool {
        !self.title && self.lines.is_empty() && !self.bitmap
    }
}

#[derive(Debug, Clone)]
pub struct FrameBuffer {
    geometry: LcdGeometry,
    pending: LcdFrame,
    committed: LcdFrame,
}

impl FrameBuffer {
    pub fn new(lcd_type: LcdType) -> Result<Self, FrameError> {
        let geometry = lcd_type.geometry().ok_or(FrameError::NoDisplay)?;
        let blank = LcdFrame::blank(&geometry);
        Ok(Self {
            geometry,
            pending: blank.clone(),
            committed: blank,
        })
    }

    pub fn geometry(&self) -> &LcdGeometry {
        &self.geometry
    }

    pub fn line_count(&self) -> usize {
        self.geometry.text_lines
    }

    pub fn pending(&self) -> &LcdFrame {
        &self.pending
    }

    /// Last frame actually pushed to the panel.
    pub fn committed(&self) -> &LcdFrame {
        &self.committed
    }

    /// Set line `index` in the default (white) color.
    pub fn set_line(&mut self, index: usize, text: impl Into<String>) -> Result<(), FrameError> {
        self.set_line_colored(index, text, Rgb::WHITE)
    }

    pub fn set_line_colored(
        &mut self,
        index: usize,
        text: impl Into<String>,
        color: Rgb,
    ) -> Result<(), FrameError> {
        let count = self.line_count();
        let line = self
            .pending
            .lines
            .get_mut(index)
            .ok_or(FrameError::LineOutOfRange { index, count })?;
        *line = TextLine {
            text: text.into(),
            color,
        };
        Ok(())
    }

    /// Set the title. Color panels only.
    pub fn set_title(&mut self, text: impl Into<String>, color: Rgb) -> Result<(), FrameError> {
        if !self.geometry.has_title {
            return Err(FrameError::TitleUnsupported);
        }
        self.pending.title = Some(Title {
            text: text.into(),
            color,
        });
        Ok(())
    }

    /// Replace the background. Length must match the panel exactly.
    pub fn set_bitmap(&mut self, pixels: impl Into<Arc<[u8]>>) -> Result<(), FrameError> {
        let pixels = pixels.into();
        let expected = self.geometry.bitmap_len();
        if pixels.len() != expected {
            return Err(FrameError::BitmapSize {
                expected,
                actual: pixels.len(),
            });
        }
        self.pending.bitmap = Some(pixels);
        Ok(())
    }

    /// Drop the background; the next push blanks the panel.
    pub fn clear_bitmap(&mut self) {
        self.pending.bitmap = None;
    }

    /// Clear the background, and with `true_clear` also the title and every line.
    pub fn clear(&mut self, true_clear: bool) {
        self.clear_bitmap();
        if true_clear {
            self.pending.title = None;
            self.pending
                .lines
                .iter_mut()
                .for_each(|l| *l = TextLine::default());
        }
    }

    /// `true` when pending differs from committed.
    pub fn diff(&self) -> bool {
        self.pending != self.committed
    }

    /// Field-wise breakdown of [`diff`](Self::diff).
    pub fn changes(&self) -> FrameChanges {
        FrameChanges {
            title: self.pending.title != self.committed.title,
            lines: self
                .pending
                .lines
                .iter()
                .zip(&self.committed.lines)
                .enumerate()
                .filter(|(_, (p, c))| p != c)
                .map(|(i, _)| i)
                .collect(),
            bitmap: self.pending.bitmap != self.committed.bitmap,
        }
    }

    /// Copy pending into committed. Only the display driver calls this,
    /// after a successful push.
    pub(crate) fn commit(&mut self) {
        if self.diff() {
            self.committed = self.pending.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_buffer_has_no_diff() {
        let fb = FrameBuffer::new(LcdType::Mono).unwrap();
        assert!(!fb.diff());
        assert!(fb.changes().is_empty());
        assert_eq!(fb.line_count(), 4);
        assert!(!fb.pending().color_mode);
    }

    #[test]
    fn no_display_is_rejected() {
        assert_eq!(
            FrameBuffer::new(LcdType::None).unwrap_err(),
            FrameError::NoDisplay
        );
    }

    #[test]
    fn set_line_marks_only_that_line() {
        let mut fb = FrameBuffer::new(LcdType::Color).unwrap();
        fb.set_line(2, "ALT 12000").unwrap();
        assert!(fb.diff());
        let changes = fb.changes();
        assert_eq!(changes.lines, vec![2]);
        assert!(!changes.title);
        assert!(!changes.bitmap);
    }

    #[test]
    fn line_out_of_range() {
        let mut fb = FrameBuffer::new(LcdType::Mono).unwrap();
        assert_eq!(
            fb.set_line(4, "x"),
            Err(FrameError::LineOutOfRange { index: 4, count: 4 })
        );
    }

    #[test]
    fn title_only_on_color() {
        let mut mono = FrameBuffer::new(LcdType::Mono).unwrap();
        assert_eq!(
            mono.set_title("F-16C", Rgb::WHITE),
            Err(FrameError::TitleUnsupported)
        );
        let mut color = FrameBuffer::new(LcdType::Color).unwrap();
        color.set_title("F-16C", Rgb(255, 0, 0)).unwrap();
        assert!(color.changes().title);
    }

    #[test]
    fn title_color_participates_in_diff() {
        let mut fb = FrameBuffer::new(LcdType::Color).unwrap();
        fb.set_title("F-16C", Rgb::WHITE).unwrap();
        fb.commit();
        fb.set_title("F-16C", Rgb::WHITE).unwrap();
        assert!(!fb.diff());
        fb.set_title("F-16C", Rgb(0, 255, 0)).unwrap();
        assert!(fb.diff());
    }

    #[test]
    fn bitmap_size_checked() {
        let mut fb = FrameBuffer::new(LcdType::Mono).unwrap();
        assert_eq!(
            fb.set_bitmap(vec![0u8; 10]),
            Err(FrameError::BitmapSize {
                expected: 6880,
                actual: 10
            })
        );
        fb.set_bitmap(vec![0u8; 6880]).unwrap();
        assert!(fb.changes().bitmap);
    }

    #[test]
    fn bitmap_compared_byte_for_byte() {
        let mut fb = FrameBuffer::new(LcdType::Mono).unwrap();
        fb.set_bitmap(vec![0u8; 6880]).unwrap();
        fb.commit();
        fb.set_bitmap(vec![0u8; 6880]).unwrap();
        assert!(!fb.diff());
        let mut px = vec![0u8; 6880];
        px[6879] = 255;
        fb.set_bitmap(px).unwrap();
        assert!(fb.diff());
    }

    #[test]
    fn commit_twice_is_idempotent() {
        let mut fb = FrameBuffer::new(LcdType::Color).unwrap();
        fb.set_line(0, "hello").unwrap();
        fb.commit();
        let once = fb.committed().clone();
        fb.commit();
        assert_eq!(fb.committed(), &once);
        assert!(!fb.diff());
    }

    #[test]
    fn true_clear_blanks_text() {
        let mut fb = FrameBuffer::new(LcdType::Color).unwrap();
        fb.set_title("T", Rgb::WHITE).unwrap();
        fb.set_line(1, "x").unwrap();
        fb.set_bitmap(vec![1u8; 307_200]).unwrap();
        fb.commit();

        fb.clear(false);
        assert_eq!(
            fb.changes(),
            FrameChanges {
                title: false,
                lines: vec![],
                bitmap: true
            }
        );

        fb.clear(true);
        let changes = fb.changes();
        assert!(changes.title);
        assert_eq!(changes.lines, vec![1]);
    }
}
