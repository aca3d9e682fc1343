use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ViewerError;

/// Environment variables named `SPRAY_<FIELD>` override the config file,
/// e.g. `SPRAY_BACKEND_URL` or `SPRAY_POLL_INTERVAL_MS`.
pub const ENV_PREFIX: &str = "SPRAY";

/// Configuration for the overlay viewer, allowing for tunable behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Base URL of the sprayer backend, e.g. `http://raspberrypi.local:5000`.
    pub backend_url: String,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Delay between the end of one detection poll and the start of the next.
    pub poll_interval_ms: u64,
    /// Render cadence. 16ms approximates a 60Hz display.
    pub frame_interval_ms: u64,
    pub status_duration_ms: u64,
    /// Per-request timeout for the JSON endpoints. The MJPEG stream is exempt.
    pub request_timeout_ms: u64,
    pub stream_reconnect_ms: u64,
    pub stream_enabled: bool,
    /// TrueType font used for label text. Without one, label chips are drawn empty.
    pub label_font: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5000".to_string(),
            canvas_width: 640,
            canvas_height: 480,
            poll_interval_ms: 100,
            frame_interval_ms: 16,
            status_duration_ms: 3000,
            request_timeout_ms: 5000,
            stream_reconnect_ms: 1000,
            stream_enabled: true,
            label_font: None,
        }
    }
}

/// The layered sources as deserialized, before post-processing.
#[derive(Debug, Deserialize)]
struct RawViewerConfig {
    #[serde(flatten)]
    settings: ViewerConfig,
    /// `WIDTHxHEIGHT`, replacing `canvas_width` and `canvas_height`.
    canvas_size: Option<String>,
}

impl TryFrom<RawViewerConfig> for ViewerConfig {
    type Error = ViewerError;

    fn try_from(raw: RawViewerConfig) -> Result<Self, Self::Error> {
        let mut config = raw.settings;
        if let Some(size) = raw.canvas_size {
            let (w, h) = parse_size(&size).ok_or(ViewerError::ConfigValue {
                key: "canvas_size",
                value: size.clone(),
            })?;
            config.canvas_width = w;
            config.canvas_height = h;
        }
        config.backend_url = config.backend_url.trim().to_string();
        config.label_font = config.label_font.filter(|p| !p.as_os_str().is_empty());
        Ok(config)
    }
}

impl ViewerConfig {
    /// Reads an optional config file (JSON, TOML or YAML by extension), then
    /// applies `SPRAY_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ViewerError> {
        Self::from_sources(path, ::config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Layers `path` under `environment`; `load` passes the process environment.
    pub fn from_sources(path: Option<&Path>, environment: ::config::Environment) -> Result<Self, ViewerError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        let raw = builder
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize::<RawViewerConfig>()?;
        raw.try_into()
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas_width, self.canvas_height)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn status_duration(&self) -> Duration {
        Duration::from_millis(self.status_duration_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn stream_reconnect(&self) -> Duration {
        Duration::from_millis(self.stream_reconnect_ms)
    }
}

/// Parses `WIDTHxHEIGHT`, e.g. `640x480`. Both sides must be non-zero.
pub fn parse_size(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    let (w, h) = (w.trim().parse().ok()?, h.trim().parse().ok()?);
    (w > 0 && h > 0).then_some((w, h))
}
