// THEORY:
// `Canvas` is the raster the overlay paints into, a thin layer over an
// `RgbaImage` that offers the handful of 2D operations the render tick needs:
// clear, blit a scaled frame, stroke lines and rectangles of a given width, fill a
// translucent rectangle, and draw text.
//
// Stroke widths follow the usual 2D-canvas convention of centering the stroke on
// the geometric path. Everything clips silently at the raster edges, so callers
// can pass coordinates that fall partly or entirely off-canvas.

use ab_glyph::{FontArc, PxScale};
use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width.max(1), height.max(1), TRANSPARENT),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = TRANSPARENT;
        }
    }

    /// Draws `frame` stretched to cover the whole canvas.
    pub fn draw_frame(&mut self, frame: &RgbaImage) {
        if frame.dimensions() == self.image.dimensions() {
            self.image.copy_from_slice(frame.as_raw());
            return;
        }
        let scaled = imageops::resize(frame, self.width(), self.height(), FilterType::Triangle);
        imageops::replace(&mut self.image, &scaled, 0, 0);
    }

    /// Strokes a segment `width` pixels wide, centered on the path.
    pub fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgba<u8>, width: u32) {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let length = (dx * dx + dy * dy).sqrt();
        let (nx, ny) = if length.is_finite() && length > f32::EPSILON {
            (-dy / length, dx / length)
        } else {
            (0.0, 0.0)
        };

        let width = width.max(1);
        let half = (width - 1) as f32 / 2.0;
        let bounds = self.clip_bounds(width);
        for i in 0..width {
            let offset = i as f32 - half;
            let segment = clip_segment(
                (from.0 + nx * offset, from.1 + ny * offset),
                (to.0 + nx * offset, to.1 + ny * offset),
                bounds,
            );
            if let Some((start, end)) = segment {
                draw_line_segment_mut(&mut self.image, start, end, color);
            }
        }
    }

    /// Strokes a rectangle outline `width` pixels wide, centered on the path.
    pub fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgba<u8>, width: u32) {
        let width = width.max(1);
        let (min_x, min_y, max_x, max_y) = self.clip_bounds(width);
        let left = x.clamp(min_x, max_x);
        let right = (x + w).clamp(min_x, max_x);
        let top = y.clamp(min_y, max_y);
        let bottom = (y + h).clamp(min_y, max_y);
        if ![left, right, top, bottom].iter().all(|v| v.is_finite()) {
            return;
        }

        let (x, y) = (left.round() as i32, top.round() as i32);
        let (w, h) = ((right - left).round() as i32, (bottom - top).round() as i32);
        let width = width as i32;
        for i in 0..width {
            let inset = i - width / 2;
            let rw = w.saturating_sub(inset.saturating_mul(2));
            let rh = h.saturating_sub(inset.saturating_mul(2));
            if rw <= 0 || rh <= 0 {
                continue;
            }
            let rect = Rect::at(x.saturating_add(inset), y.saturating_add(inset)).of_size(rw as u32, rh as u32);
            draw_hollow_rect_mut(&mut self.image, rect, color);
        }
    }

    /// The raster grown by a stroke's width on every side. Geometry is clipped to
    /// this before it is converted to integer pixels.
    fn clip_bounds(&self, stroke: u32) -> (f64, f64, f64, f64) {
        let margin = stroke as f64 + 1.0;
        (-margin, -margin, self.width() as f64 + margin, self.height() as f64 + margin)
    }

    /// Fills a rectangle, alpha-blending `color` over what is already there.
    pub fn fill_rect_blended(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgba<u8>) {
        let clamp_x = |v: f64| v.round().clamp(0.0, self.width() as f64) as u32;
        let clamp_y = |v: f64| v.round().clamp(0.0, self.height() as f64) as u32;
        let (x0, x1) = (clamp_x(x), clamp_x(x + w));
        let (y0, y1) = (clamp_y(y), clamp_y(y + h));

        for py in y0..y1 {
            for px in x0..x1 {
                self.image.get_pixel_mut(px, py).blend(&color);
            }
        }
    }

    /// Draws `text` with its top-left corner at `(x, y)`.
    pub fn fill_text(&mut self, font: &FontArc, size: f32, x: i32, y: i32, text: &str, color: Rgba<u8>) {
        draw_text_mut(&mut self.image, color, x, y, PxScale::from(size), font, text);
    }
}

/// Liang-Barsky clip of a segment against `(min_x, min_y, max_x, max_y)`.
fn clip_segment(from: (f32, f32), to: (f32, f32), bounds: (f64, f64, f64, f64)) -> Option<((f32, f32), (f32, f32))> {
    let (x0, y0, x1, y1) = (from.0 as f64, from.1 as f64, to.0 as f64, to.1 as f64);
    if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (min_x, min_y, max_x, max_y) = bounds;
    let (dx, dy) = (x1 - x0, y1 - y0);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);

    for (p, q) in [(-dx, x0 - min_x), (dx, max_x - x0), (-dy, y0 - min_y), (dy, max_y - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| ((x0 + t * dx) as f32, (y0 + t * dy) as f32);
    Some((at(t0), at(t1)))
}

/// Width and height `text` occupies at the given pixel size.
pub fn measure_text(font: &FontArc, size: f32, text: &str) -> (u32, u32) {
    text_size(PxScale::from(size), font, text)
}
