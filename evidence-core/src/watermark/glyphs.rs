//! Bitmap text rendering.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};

/// Native glyph cell size of the embedded font.
const CELL: u32 = 8;

/// Bitmap for `c`, falling back to `?` for characters the font lacks.
fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Rendered width of `text` at `font_size` pixels per cell.
pub fn text_width(text: &str, font_size: u32) -> u32 {
    text.chars().count() as u32 * font_size
}

/// Draw `text` with its top-left corner at `(x, y)`, clipping at the image edges.
pub fn draw_text(image: &mut RgbImage, x: i64, y: i64, text: &str, font_size: u32, color: [u8; 3]) {
    let (width, height) = image.dimensions();
    let size = font_size as i64;

    for (i, c) in text.chars().enumerate() {
        let rows = glyph(c);
        let cell_x = x + i as i64 * size;
        if cell_x >= width as i64 {
            break;
        }

        for gy in 0..font_size {
            let py = y + gy as i64;
            if py < 0 || py >= height as i64 {
                continue;
            }
            let bits = rows[(gy * CELL / font_size) as usize];
            for gx in 0..font_size {
                let px = cell_x + gx as i64;
                if px < 0 || px >= width as i64 {
                    continue;
                }
                // font8x8 stores the leftmost pixel in the least significant bit
                if bits & (1 << (gx * CELL / font_size)) != 0 {
                    image.put_pixel(px as u32, py as u32, Rgb(color));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width_counts_chars() {
        assert_eq!(text_width("abc", 10), 30);
        assert_eq!(text_width("", 10), 0);
        assert_eq!(text_width("°C", 8), 16);
    }

    #[test]
    fn test_space_draws_nothing() {
        let mut img = RgbImage::new(16, 16);
        draw_text(&mut img, 0, 0, " ", 16, [255, 255, 255]);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_glyph_draws_foreground() {
        let mut img = RgbImage::new(16, 16);
        draw_text(&mut img, 0, 0, "A", 16, [255, 0, 0]);
        assert!(img.pixels().any(|p| p.0 == [255, 0, 0]));
    }

    #[test]
    fn test_clipping_does_not_panic() {
        let mut img = RgbImage::new(10, 10);
        draw_text(&mut img, -5, -5, "WWWWWW", 12, [255, 255, 255]);
        draw_text(&mut img, 8, 8, "W", 12, [255, 255, 255]);
    }

    #[test]
    fn test_unknown_char_falls_back() {
        assert_eq!(glyph('\u{1F600}'), glyph('?'));
    }
}
