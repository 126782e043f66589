//! Pixel buffers flowing into and out of the compositor.

use crate::error::{EvidenceError, Result};

/// Bytes per pixel of a [`RawFrame`] (RGBA8).
pub const BYTES_PER_PIXEL: usize = 4;

/// Raw RGBA8 pixels handed over by a frame source.
///
/// Owned by the capture step and consumed once by the compositor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RawFrame {
    /// Wrap an RGBA8 buffer, checking that it matches the declared dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EvidenceError::InvalidGeometry(format!(
                "frame dimensions must be non-zero, got {width}x{height}"
            )));
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| {
                EvidenceError::InvalidGeometry(format!("frame {width}x{height} is too large"))
            })?;

        if pixels.len() != expected {
            return Err(EvidenceError::InvalidGeometry(format!(
                "expected {expected} bytes for a {width}x{height} RGBA frame, got {}",
                pixels.len()
            )));
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A frame filled with one RGBA color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let count = (width as usize).saturating_mul(height as usize);
        let pixels = rgba.iter().copied().cycle().take(count * BYTES_PER_PIXEL).collect();
        Self::new(width, height, pixels)
    }

    /// Decode any image format supported by the `image` crate into a frame.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| EvidenceError::ImageEncoding(format!("Failed to decode image: {e}")))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, rgba.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

/// Output resolution as a fraction of the native capture resolution, in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    /// Native resolution.
    pub const FULL: ScaleFactor = ScaleFactor(1.0);

    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value <= 0.0 || value > 1.0 {
            return Err(EvidenceError::InvalidGeometry(format!(
                "scale factor must be in (0, 1], got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Scaled output dimensions, `floor(width * scale) x floor(height * scale)`.
    pub fn apply(self, width: u32, height: u32) -> Result<(u32, u32)> {
        let out_w = (width as f64 * self.0).floor() as u32;
        let out_h = (height as f64 * self.0).floor() as u32;
        if out_w == 0 || out_h == 0 {
            return Err(EvidenceError::InvalidGeometry(format!(
                "scale {} reduces {width}x{height} to {out_w}x{out_h}",
                self.0
            )));
        }
        Ok((out_w, out_h))
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self::FULL
    }
}

/// Final compressed image; the exact bytes that are hashed and packaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl EncodedImage {
    pub fn new(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            width,
            height,
        }
    }

    /// Wrap PNG bytes read back from a bundle, taking dimensions from the header.
    pub fn from_png(bytes: Vec<u8>) -> Result<Self> {
        let reader = image::ImageReader::with_format(
            std::io::Cursor::new(&bytes),
            image::ImageFormat::Png,
        );
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| EvidenceError::ImageEncoding(format!("Invalid PNG: {e}")))?;
        Ok(Self::new(bytes, width, height))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
