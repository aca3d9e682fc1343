use image::Rgba;
use std::time::Duration;
use tokio::time::Instant;

pub const STATUS_DURATION: Duration = Duration::from_millis(3000);

pub const SUCCESS: Rgba<u8> = Rgba([0x28, 0xa7, 0x45, 0xff]);
pub const DANGER: Rgba<u8> = Rgba([0xdc, 0x35, 0x45, 0xff]);
pub const INFO: Rgba<u8> = Rgba([0x17, 0xa2, 0xb8, 0xff]);

/// A transient message for the status bar. It carries its own expiry, so a newer
/// message simply replaces it rather than extending or shortening it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub text: String,
    pub color: Rgba<u8>,
    pub shown_at: Instant,
    pub visible_until: Instant,
}

impl StatusMessage {
    pub fn new(text: impl Into<String>, color: Rgba<u8>, shown_at: Instant, duration: Duration) -> Self {
        Self {
            text: text.into(),
            color,
            shown_at,
            visible_until: shown_at + duration,
        }
    }

    pub fn is_visible_at(&self, now: Instant) -> bool {
        now < self.visible_until
    }
}

/// Renders a color as the `#rrggbb` form used by the status bar.
pub fn hex(color: Rgba<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color.0[0], color.0[1], color.0[2])
}
