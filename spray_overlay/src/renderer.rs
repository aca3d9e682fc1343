// THEORY:
// The `renderer` module is the top-level painter for the overlay. One call to
// `render_tick` turns the current inputs (latest frame, latest detections, the
// user's line) into a finished canvas. It owns no network or timing concerns;
// `controller` decides when it runs and `poller`/`frame_source` decide what it sees.
//
// Key architectural principles:
// 1.  **Never Block, Never Fail**: A tick with no decoded frame yet is a no-op that
//     reports `AwaitingFrame`. An empty detection list is simply a frame with no
//     boxes. Nothing here returns an error.
// 2.  **Layout, Then Paint**: `layout_overlay` is a pure function from inputs to
//     canvas-space geometry. Painting consumes that layout, which keeps the
//     scaling math testable without inspecting pixels.
// 3.  **Fixed Drawing Order**: frame, then line, then boxes with their labels, so
//     labels are always readable on top of everything else.

use ab_glyph::FontArc;
use image::{Rgba, RgbaImage};
use tracing::warn;

use crate::core_modules::canvas::{Canvas, measure_text};
use crate::core_modules::detection::{CanvasBox, DetectionBox, ScaleFactors};
use crate::core_modules::detection_line::DetectionLine;
use crate::error::ViewerError;

/// Visual constants for the overlay.
#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub line_color: Rgba<u8>,
    pub line_width: u32,
    pub box_color: Rgba<u8>,
    pub box_width: u32,
    pub chip_color: Rgba<u8>,
    pub chip_height: f64,
    pub chip_padding: f64,
    pub text_color: Rgba<u8>,
    pub font_size: f32,
    /// Fallback glyph advance when no font is loaded, in pixels.
    pub approx_glyph_width: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            line_color: Rgba([255, 0, 0, 255]),
            line_width: 3,
            box_color: Rgba([0, 255, 0, 255]),
            box_width: 2,
            chip_color: Rgba([0, 255, 0, 179]),
            chip_height: 18.0,
            chip_padding: 8.0,
            text_color: Rgba([0, 0, 0, 255]),
            font_size: 14.0,
            approx_glyph_width: 7.0,
        }
    }
}

/// A detection box placed on the canvas with its label chip.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledBox {
    pub bounds: CanvasBox,
    pub label: String,
    /// Chip rectangle as `(x, y, w, h)`; it sits directly above the box.
    pub chip: (f64, f64, f64, f64),
}

/// Everything that will be painted over the frame, in canvas pixels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayLayout {
    pub line: Option<((f32, f32), (f32, f32))>,
    pub boxes: Vec<LabeledBox>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// No decoded frame was available; the canvas was left untouched.
    AwaitingFrame,
    Drawn { boxes: usize, line: bool },
}

pub struct OverlayRenderer {
    canvas: Canvas,
    style: OverlayStyle,
    font: Option<FontArc>,
    warned_missing_font: bool,
}

impl OverlayRenderer {
    pub fn new(width: u32, height: u32, style: OverlayStyle, font: Option<FontArc>) -> Self {
        Self {
            canvas: Canvas::new(width, height),
            style,
            font,
            warned_missing_font: false,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn render_tick(&mut self, frame: Option<&RgbaImage>, detections: &[DetectionBox], line: &DetectionLine) -> RenderOutcome {
        // --- 1. Frame-ready guard ---
        let Some(frame) = frame.filter(|f| f.width() > 0 && f.height() > 0) else {
            return RenderOutcome::AwaitingFrame;
        };

        let layout = layout_overlay(
            frame.dimensions(),
            self.canvas.dimensions(),
            detections,
            line,
            &self.style,
            |label| self.label_width(label),
        );

        // --- 2. Frame ---
        self.canvas.clear();
        self.canvas.draw_frame(frame);

        // --- 3. Line ---
        if let Some((from, to)) = layout.line {
            self.canvas.stroke_line(from, to, self.style.line_color, self.style.line_width);
        }

        // --- 4. Boxes and labels ---
        for labeled in &layout.boxes {
            self.paint_box(labeled);
        }

        RenderOutcome::Drawn {
            boxes: layout.boxes.len(),
            line: layout.line.is_some(),
        }
    }

    fn paint_box(&mut self, labeled: &LabeledBox) {
        let b = labeled.bounds;
        self.canvas
            .stroke_rect(b.x1, b.y1, b.width(), b.height(), self.style.box_color, self.style.box_width);

        let (cx, cy, cw, ch) = labeled.chip;
        self.canvas.fill_rect_blended(cx, cy, cw, ch, self.style.chip_color);

        match &self.font {
            Some(font) => {
                // Origins far off-canvas are pulled in just far enough to stay invisible.
                let (w, h) = (self.canvas.width() as f64, self.canvas.height() as f64);
                let text_x = (b.x1 + self.style.chip_padding / 2.0).clamp(-cw.max(1.0), w).round() as i32;
                let text_y = (cy + (ch - self.style.font_size as f64) / 2.0).clamp(-ch.max(1.0), h).round() as i32;
                self.canvas
                    .fill_text(font, self.style.font_size, text_x, text_y, &labeled.label, self.style.text_color);
            }
            None if !self.warned_missing_font => {
                warn!("no label font configured, drawing label chips without text");
                self.warned_missing_font = true;
            }
            None => {}
        }
    }

    fn label_width(&self, label: &str) -> f64 {
        match &self.font {
            Some(font) => measure_text(font, self.style.font_size, label).0 as f64,
            None => label.chars().count() as f64 * self.style.approx_glyph_width,
        }
    }
}

/// Computes canvas-space geometry for the line and every detection.
///
/// Boxes are scaled with independent X/Y factors (`canvas / frame`). One
/// `LabeledBox` is produced per detection, in input order.
pub fn layout_overlay<F>(
    frame: (u32, u32),
    canvas: (u32, u32),
    detections: &[DetectionBox],
    line: &DetectionLine,
    style: &OverlayStyle,
    measure: F,
) -> OverlayLayout
where
    F: Fn(&str) -> f64,
{
    let Some(scale) = ScaleFactors::between(frame, canvas) else {
        return OverlayLayout::default();
    };

    let boxes = detections
        .iter()
        .map(|detection| {
            let bounds = scale.apply(detection);
            let label = detection.label();
            let chip = (
                bounds.x1,
                bounds.y1 - style.chip_height,
                measure(&label) + style.chip_padding,
                style.chip_height,
            );
            LabeledBox { bounds, label, chip }
        })
        .collect();

    OverlayLayout {
        line: line.to_pixels(canvas),
        boxes,
    }
}

/// Loads a TrueType/OpenType font for label text.
pub fn load_font(path: &std::path::Path) -> Result<FontArc, ViewerError> {
    let display = path.display().to_string();
    let data = std::fs::read(path).map_err(|e| ViewerError::Font {
        path: display.clone(),
        reason: e.to_string(),
    })?;
    FontArc::try_from_vec(data).map_err(|e| ViewerError::Font {
        path: display,
        reason: e.to_string(),
    })
}
