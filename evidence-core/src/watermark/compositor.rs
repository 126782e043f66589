//! Watermark compositing and PNG encoding.
//!
//! # Usage
//!
//! ```no_run
//! use evidence_core::watermark::{compose, WatermarkSpec};
//! use evidence_core::{RawFrame, ScaleFactor};
//!
//! let frame = RawFrame::solid(1920, 1080, [40, 40, 40, 255]).unwrap();
//! let spec = WatermarkSpec::new(vec!["Timestamp (UTC): 2024-01-01T00:00:00.000Z".into()]);
//! let image = compose(frame, ScaleFactor::new(0.5).unwrap(), &spec).unwrap();
//! assert_eq!((image.width(), image.height()), (960, 540));
//! ```

use chrono::{DateTime, Utc};
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use tracing::debug;

use super::glyphs;
use super::layout::{OverlayLayout, OverlayStyle};
use crate::error::{EvidenceError, Result};
use crate::frame::{EncodedImage, RawFrame, ScaleFactor};
use crate::metadata::{format_timestamp, Geolocation};

/// Text lines and styling of the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkSpec {
    pub lines: Vec<String>,
    pub style: OverlayStyle,
}

impl WatermarkSpec {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            style: OverlayStyle::default(),
        }
    }

    /// Standard provenance lines: capture time, latitude and longitude.
    pub fn provenance(captured_at: DateTime<Utc>, location: &Geolocation) -> Self {
        let (lat, lon) = location.formatted();
        Self::new(vec![
            format!("Timestamp (UTC): {}", format_timestamp(captured_at)),
            format!("Latitude: {lat}"),
            format!("Longitude: {lon}"),
        ])
    }

    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }
}

/// Scale `frame`, burn in the overlay and encode the result as PNG.
///
/// The frame is consumed. Output is deterministic for identical inputs.
pub fn compose(frame: RawFrame, scale: ScaleFactor, spec: &WatermarkSpec) -> Result<EncodedImage> {
    let (src_w, src_h) = (frame.width(), frame.height());
    let (out_w, out_h) = scale.apply(src_w, src_h)?;

    let rgba = RgbaImage::from_raw(src_w, src_h, frame.into_pixels()).ok_or_else(|| {
        EvidenceError::InvalidGeometry(format!("pixel buffer does not match {src_w}x{src_h}"))
    })?;

    let rgba = if (out_w, out_h) == (src_w, src_h) {
        rgba
    } else {
        imageops::resize(&rgba, out_w, out_h, FilterType::Triangle)
    };
    let mut canvas = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let layout = OverlayLayout::compute(out_w, out_h, &spec.lines);
    draw_overlay(&mut canvas, &layout, spec);

    debug!(
        width = out_w,
        height = out_h,
        font_size = layout.font_size,
        lines = spec.lines.len(),
        "Composited watermark"
    );

    let bytes = encode_png(&canvas)?;
    Ok(EncodedImage::new(bytes, out_w, out_h))
}

fn draw_overlay(canvas: &mut RgbImage, layout: &OverlayLayout, spec: &WatermarkSpec) {
    let (width, height) = canvas.dimensions();
    let rect = layout.background_rect();
    let style = &spec.style;

    let x0 = rect.x.clamp(0, width as i64) as u32;
    let x1 = rect.right().clamp(0, width as i64) as u32;
    let y0 = rect.y.clamp(0, height as i64) as u32;
    let y1 = rect.bottom().clamp(0, height as i64) as u32;

    for y in y0..y1 {
        for x in x0..x1 {
            let pixel = canvas.get_pixel_mut(x, y);
            for (channel, bg) in pixel.0.iter_mut().zip(style.background) {
                *channel = blend(*channel, bg, style.background_alpha);
            }
        }
    }

    for (i, line) in spec.lines.iter().enumerate() {
        let (x, y) = layout.line_origin(i);
        glyphs::draw_text(canvas, x, y, line, layout.font_size, style.foreground);
    }
}

/// Integer alpha blend of `over` onto `under`.
fn blend(under: u8, over: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((under as u32 * (255 - a) + over as u32 * a + 127) / 255) as u8
}

fn encode_png(canvas: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut bytes, CompressionType::Default, PngFilterType::Adaptive);
    encoder
        .write_image(
            canvas.as_raw(),
            canvas.width(),
            canvas.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| EvidenceError::ImageEncoding(format!("PNG encoding failed: {e}")))?;
    Ok(bytes)
}
