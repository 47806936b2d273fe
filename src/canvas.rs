//! Drawing primitives used by the renderer.
//!
//! The renderer only talks to the [`Canvas`] trait; [`RasterCanvas`] backs it
//! with an `RgbImage`, imageproc shapes and an 8x8 bitmap font.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut,
    draw_line_segment_mut,
};
use imageproc::rect::Rect;

pub type Color = [u8; 3];

/// Width of one glyph at scale 1.
pub const GLYPH_SIZE: i32 = 8;

pub trait Canvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    fn line(&mut self, from: (i32, i32), to: (i32, i32), color: Color, thickness: u32);

    /// Outline grown inward by `thickness` pixels.
    fn rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Color, thickness: u32);

    fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Color);

    fn circle(&mut self, center: (i32, i32), radius: i32, color: Color, filled: bool);

    /// Bitmap text with its top-left corner at `(x, y)`.
    fn text(&mut self, x: i32, y: i32, text: &str, color: Color, scale: u32);

    fn polyline(&mut self, points: &[(i32, i32)], color: Color, thickness: u32) {
        for pair in points.windows(2) {
            self.line(pair[0], pair[1], color, thickness);
        }
    }

    /// Line with an open arrow head at `to`.
    fn arrow(&mut self, from: (i32, i32), to: (i32, i32), color: Color, thickness: u32) {
        self.line(from, to, color, thickness);
        let (dx, dy) = ((to.0 - from.0) as f32, (to.1 - from.1) as f32);
        let len = (dx * dx + dy * dy).sqrt();
        if len < 1.0 {
            return;
        }
        let head = (len * 0.3).max(4.0);
        let angle = dy.atan2(dx);
        for side in [-0.5f32, 0.5] {
            let a = angle + std::f32::consts::PI + side;
            let tip = (
                to.0 + (head * a.cos()).round() as i32,
                to.1 + (head * a.sin()).round() as i32,
            );
            self.line(to, tip, color, thickness);
        }
    }
}

/// Pixel width of `text` at `scale`.
pub fn text_width(text: &str, scale: u32) -> i32 {
    text.chars().count() as i32 * GLYPH_SIZE * scale.max(1) as i32
}

pub struct RasterCanvas<'a> {
    img: &'a mut RgbImage,
}

impl<'a> RasterCanvas<'a> {
    pub fn new(img: &'a mut RgbImage) -> Self {
        Self { img }
    }

    fn put(&mut self, x: i32, y: i32, color: Color) {
        if x >= 0 && y >= 0 && (x as u32) < self.img.width() && (y as u32) < self.img.height() {
            self.img.put_pixel(x as u32, y as u32, Rgb(color));
        }
    }
}

impl Canvas for RasterCanvas<'_> {
    fn width(&self) -> u32 {
        self.img.width()
    }

    fn height(&self) -> u32 {
        self.img.height()
    }

    fn line(&mut self, from: (i32, i32), to: (i32, i32), color: Color, thickness: u32) {
        let t = thickness.max(1) as i32;
        // Offset parallel copies across the minor axis.
        let steep = (to.1 - from.1).abs() > (to.0 - from.0).abs();
        for i in 0..t {
            let off = i - t / 2;
            let (ox, oy) = if steep { (off, 0) } else { (0, off) };
            draw_line_segment_mut(
                &mut *self.img,
                ((from.0 + ox) as f32, (from.1 + oy) as f32),
                ((to.0 + ox) as f32, (to.1 + oy) as f32),
                Rgb(color),
            );
        }
    }

    fn rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Color, thickness: u32) {
        for i in 0..thickness.max(1) {
            let (iw, ih) = (w.saturating_sub(2 * i), h.saturating_sub(2 * i));
            if iw == 0 || ih == 0 {
                break;
            }
            let r = Rect::at(x + i as i32, y + i as i32).of_size(iw, ih);
            draw_hollow_rect_mut(&mut *self.img, r, Rgb(color));
        }
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Color) {
        if w == 0 || h == 0 {
            return;
        }
        draw_filled_rect_mut(&mut *self.img, Rect::at(x, y).of_size(w, h), Rgb(color));
    }

    fn circle(&mut self, center: (i32, i32), radius: i32, color: Color, filled: bool) {
        if filled {
            draw_filled_circle_mut(&mut *self.img, center, radius, Rgb(color));
        } else {
            draw_hollow_circle_mut(&mut *self.img, center, radius, Rgb(color));
        }
    }

    fn text(&mut self, x: i32, y: i32, text: &str, color: Color, scale: u32) {
        let s = scale.max(1) as i32;
        let mut cursor = x;
        for ch in text.chars() {
            let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
                cursor += GLYPH_SIZE * s;
                continue;
            };
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..GLYPH_SIZE {
                    if (bits >> col) & 1 == 0 {
                        continue;
                    }
                    for sy in 0..s {
                        for sx in 0..s {
                            self.put(cursor + col * s + sx, y + row as i32 * s + sy, color);
                        }
                    }
                }
            }
            cursor += GLYPH_SIZE * s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = [255, 0, 0];

    #[test]
    fn test_thick_rect_grows_inward() {
        let mut img = RgbImage::new(40, 40);
        RasterCanvas::new(&mut img).rect(10, 10, 20, 20, RED, 3);
        assert_eq!(img.get_pixel(10, 15).0, RED);
        assert_eq!(img.get_pixel(12, 15).0, RED);
        assert_eq!(img.get_pixel(13, 15).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(9, 15).0, [0, 0, 0]);
    }

    #[test]
    fn test_zero_size_shapes_are_skipped() {
        let mut img = RgbImage::new(10, 10);
        let mut canvas = RasterCanvas::new(&mut img);
        canvas.fill_rect(2, 2, 0, 5, RED);
        canvas.rect(2, 2, 5, 0, RED, 2);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_text_draws_inside_glyph_box() {
        let mut img = RgbImage::new(32, 16);
        RasterCanvas::new(&mut img).text(0, 0, "A", RED, 1);
        let lit: Vec<(u32, u32)> = img
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0 == RED)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!lit.is_empty());
        assert!(lit.iter().all(|&(x, y)| x < 8 && y < 8));
        assert_eq!(text_width("ABC", 2), 48);
    }

    #[test]
    fn test_drawing_off_canvas_is_clipped() {
        let mut img = RgbImage::new(10, 10);
        let mut canvas = RasterCanvas::new(&mut img);
        canvas.line((-20, -20), (30, 30), RED, 2);
        canvas.text(-4, -4, "X", RED, 1);
        canvas.circle((50, 50), 5, RED, true);
        assert_eq!(img.get_pixel(5, 5).0, RED);
    }
}
