// THEORY:
// The detection line is the one piece of state the user authors. It is captured
// with two pointer gestures on the canvas: the press fixes the start, the release
// fixes the end. Coordinates are stored normalized to the canvas size so the
// backend can apply the same line to frames of any resolution.
//
// The capture is a tiny state machine: `Idle -> StartCaptured -> Complete`. A new
// press always starts over, which hides the old line until the matching release.
// Only a `Complete` line has the four components needed to draw or save it, and
// `coords()` is the single way to get them out.

/// A point expressed as a fraction of canvas width and height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    /// Normalizes a canvas-relative pixel position.
    pub fn from_canvas(x: f64, y: f64, canvas: (u32, u32)) -> Self {
        Self {
            x: x / canvas.0.max(1) as f64,
            y: y / canvas.1.max(1) as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DetectionLine {
    #[default]
    Idle,
    StartCaptured { start: NormalizedPoint },
    Complete { start: NormalizedPoint, end: NormalizedPoint },
}

impl DetectionLine {
    /// Pointer-down: records the first two components.
    pub fn press(&mut self, point: NormalizedPoint) {
        *self = DetectionLine::StartCaptured { start: point };
    }

    /// Pointer-up: records the last two components. A release with no prior
    /// press has no start point to pair with and is ignored.
    pub fn release(&mut self, point: NormalizedPoint) {
        match *self {
            DetectionLine::Idle => {}
            DetectionLine::StartCaptured { start } | DetectionLine::Complete { start, .. } => {
                *self = DetectionLine::Complete { start, end: point };
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, DetectionLine::Complete { .. })
    }

    /// `[x1, y1, x2, y2]`, only once both gestures have fired.
    pub fn coords(&self) -> Option<[f64; 4]> {
        match *self {
            DetectionLine::Complete { start, end } => Some([start.x, start.y, end.x, end.y]),
            _ => None,
        }
    }

    /// Rebuilds a complete line from a stored array. Anything other than exactly
    /// four finite numbers is rejected.
    pub fn from_coords(values: &[f64]) -> Option<Self> {
        match values {
            [x1, y1, x2, y2] if values.iter().all(|v| v.is_finite()) => Some(DetectionLine::Complete {
                start: NormalizedPoint { x: *x1, y: *y1 },
                end: NormalizedPoint { x: *x2, y: *y2 },
            }),
            _ => None,
        }
    }

    /// The segment endpoints in canvas pixels.
    pub fn to_pixels(&self, canvas: (u32, u32)) -> Option<((f32, f32), (f32, f32))> {
        let [x1, y1, x2, y2] = self.coords()?;
        let (w, h) = (canvas.0 as f64, canvas.1 as f64);
        Some((
            ((x1 * w) as f32, (y1 * h) as f32),
            ((x2 * w) as f32, (y2 * h) as f32),
        ))
    }
}
