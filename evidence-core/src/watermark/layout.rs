//! Overlay geometry.
//!
//! All ratios are fixed policy and must stay in sync with any other renderer
//! that is expected to produce visually identical evidence.

use super::glyphs;

/// Font size as a fraction of output height.
pub const FONT_SIZE_RATIO: f64 = 0.035;
/// Line height as a multiple of the font size.
pub const LINE_HEIGHT_RATIO: f64 = 1.4;
/// Padding inside the background rectangle, as a multiple of the font size.
pub const PADDING_RATIO: f64 = 0.4;
/// Distance from the left and bottom edges, as a fraction of output width.
pub const MARGIN_RATIO: f64 = 0.02;

/// Colors of the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayStyle {
    /// Background rectangle color.
    pub background: [u8; 3],
    /// Background opacity, 0 (transparent) to 255 (opaque).
    pub background_alpha: u8,
    /// Text color (drawn opaque).
    pub foreground: [u8; 3],
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            background: [0, 0, 0],
            background_alpha: 128,
            foreground: [255, 255, 255],
        }
    }
}

/// Integer pixel rectangle, possibly extending past the image edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelRect {
    pub fn right(&self) -> i64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height
    }
}

/// Overlay geometry for a given output size and set of lines.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayout {
    pub font_size: u32,
    pub line_height: f64,
    pub padding: f64,
    pub margin: f64,
    /// Widest rendered line in pixels.
    pub text_width: u32,
    /// Unrounded rectangle origin and size.
    pub rect_x: f64,
    pub rect_y: f64,
    pub rect_width: f64,
    pub rect_height: f64,
}

impl OverlayLayout {
    pub fn compute<S: AsRef<str>>(width: u32, height: u32, lines: &[S]) -> Self {
        let font_size = ((height as f64 * FONT_SIZE_RATIO).round() as u32).max(1);
        let fs = font_size as f64;
        let line_height = fs * LINE_HEIGHT_RATIO;
        let padding = fs * PADDING_RATIO;
        let margin = width as f64 * MARGIN_RATIO;

        let text_width = lines
            .iter()
            .map(|line| glyphs::text_width(line.as_ref(), font_size))
            .max()
            .unwrap_or(0);

        let rect_width = text_width as f64 + 2.0 * padding;
        let rect_height = lines.len() as f64 * line_height + 2.0 * padding;

        Self {
            font_size,
            line_height,
            padding,
            margin,
            text_width,
            rect_x: margin,
            rect_y: height as f64 - rect_height - margin,
            rect_width,
            rect_height,
        }
    }

    /// Background rectangle rounded to whole pixels.
    pub fn background_rect(&self) -> PixelRect {
        let x = self.rect_x.round() as i64;
        let y = self.rect_y.round() as i64;
        PixelRect {
            x,
            y,
            width: (self.rect_x + self.rect_width).round() as i64 - x,
            height: (self.rect_y + self.rect_height).round() as i64 - y,
        }
    }

    /// Top-left pixel of the given line's first glyph.
    pub fn line_origin(&self, index: usize) -> (i64, i64) {
        let x = (self.rect_x + self.padding).round() as i64;
        let y = (self.rect_y + self.padding + index as f64 * self.line_height).round() as i64;
        (x, y)
    }
}
