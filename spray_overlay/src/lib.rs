// THEORY:
// This file is the main entry point for the `spray_overlay` library crate. It
// exposes the `OverlayController` as the one object a host needs: construct it
// from a `ViewerConfig`, `mount` it, feed it pointer gestures and user actions,
// read the rendered canvas and status message back out, and `unmount` it.
//
// The layers underneath are public for hosts that want finer control:
// - `core_modules`: the data model and pure drawing/parsing building blocks.
// - `renderer`: one render tick, frame plus line plus detection boxes.
// - `client`: the sprayer backend's HTTP surface.
// - `poller`, `frame_source`, `scheduler`: the background activities.

pub mod client;
pub mod config;
pub mod controller;
pub mod core_modules;
pub mod error;
pub mod frame_source;
pub mod poller;
pub mod renderer;
pub mod scheduler;

pub use client::{BackendClient, CameraSettings, RtspSettings};
pub use config::ViewerConfig;
pub use controller::{LogNotifier, Notifier, OverlayController};
pub use core_modules::detection::DetectionBox;
pub use core_modules::detection_line::DetectionLine;
pub use core_modules::status::StatusMessage;
pub use error::{ActionError, ClientError, StreamError, ViewerError};
pub use renderer::{OverlayRenderer, RenderOutcome};
