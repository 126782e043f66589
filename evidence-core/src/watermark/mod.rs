//! Burned-in provenance overlay.
//!
//! The overlay is rendered into the pixels *before* hashing, so the digest
//! covers exactly what a viewer of the image sees.
//!
//! # Components
//!
//! - **Layout**: fixed geometry policy derived from the output size
//!   (font size, line height, padding and margin ratios).
//! - **Glyphs**: an embedded 8x8 bitmap font scaled with integer
//!   nearest-neighbour sampling, so rendering is identical on every host.
//! - **Compositor**: resampling, overlay blending and PNG encoding.

pub mod compositor;
pub mod glyphs;
pub mod layout;

pub use compositor::{compose, WatermarkSpec};
pub use layout::{OverlayLayout, OverlayStyle, PixelRect};
