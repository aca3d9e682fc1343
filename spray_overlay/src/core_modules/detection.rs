// THEORY:
// The `detection` module holds the data model for what the backend's detector
// reports, and the single piece of geometry the overlay needs to put it on screen.
//
// Key architectural principles:
// 1.  **Ephemeral Snapshots**: A `DetectionBox` has no identity. Every poll
//     replaces the whole list, so there is nothing to match or track here.
// 2.  **Source-Frame Space**: Boxes arrive in the pixel space of the camera frame
//     the backend analysed, which is generally not the size of our canvas.
// 3.  **Independent Axes**: `ScaleFactors` maps that space onto the canvas with
//     separate X and Y ratios. The frame is stretched to fill the canvas, so the
//     boxes must be stretched the same way.

use serde::{Deserialize, Serialize};

/// A single bounding box as reported by `/yolo_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    /// Class name, e.g. "cat".
    pub cls: String,
    /// Confidence in `0..=1`.
    pub conf: f64,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl DetectionBox {
    /// The text shown in the label chip, confidence at two decimals.
    pub fn label(&self) -> String {
        format!("{} ({:.2})", self.cls, self.conf)
    }
}

/// Ratios that map source-frame pixels onto canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactors {
    /// `canvas / frame` on each axis. A zero-sized frame yields `None`.
    pub fn between(frame: (u32, u32), canvas: (u32, u32)) -> Option<Self> {
        if frame.0 == 0 || frame.1 == 0 {
            return None;
        }
        Some(Self {
            x: canvas.0 as f64 / frame.0 as f64,
            y: canvas.1 as f64 / frame.1 as f64,
        })
    }

    pub fn apply(&self, detection: &DetectionBox) -> CanvasBox {
        CanvasBox {
            x1: detection.x1 * self.x,
            y1: detection.y1 * self.y,
            x2: detection.x2 * self.x,
            y2: detection.y2 * self.y,
        }
    }
}

/// A detection box after scaling into canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CanvasBox {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}
