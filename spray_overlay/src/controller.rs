// THEORY:
// The `OverlayController` is the single owner of all viewer state. It is the
// object a host "mounts" when the view appears and "unmounts" when it goes away.
//
// Key architectural principles:
// 1.  **One Owner**: The detection list, the line, the latest frame, the presented
//     canvas, the status message and the device address all live here as `watch`
//     channels. Background tasks hold clones of the senders and receivers, never
//     references back to the controller.
// 2.  **Explicit Lifecycle**: `mount` starts the render, poll and stream tasks as
//     `RepeatingTask` handles; `unmount` cancels them and waits. Dropping the
//     controller stops them as well.
// 3.  **Explicit Failure Policy**: Every backend call returns a `Result`. The
//     poller only logs. User actions alert through the `Notifier` and log at error
//     level, then hand the error back to the caller. Invalid input is rejected
//     before any request is made.

use ab_glyph::FontArc;
use image::Rgba;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::client::{BackendClient, CameraSettings, DeviceAddress};
use crate::config::ViewerConfig;
use crate::core_modules::detection_line::{DetectionLine, NormalizedPoint};
use crate::core_modules::status::{self, StatusMessage};
use crate::error::{ActionError, ClientError, ViewerError};
use crate::frame_source::{Frame, spawn_stream_reader};
use crate::poller::{DetectionList, spawn_poller};
use crate::renderer::{OverlayRenderer, OverlayStyle, RenderOutcome, load_font};
use crate::scheduler::{Cadence, RepeatingTask};

/// The host's interruptive UI: blocking alerts and the settings panel.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);

    /// Closes the panel the device address was entered in, if the host has one.
    fn close_panel(&self) {}
}

/// A `Notifier` for headless hosts: alerts become warnings in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        warn!(alert = message);
    }
}

pub struct OverlayController {
    config: ViewerConfig,
    client: BackendClient,
    notifier: Arc<dyn Notifier>,
    font: Option<FontArc>,
    detections: watch::Sender<DetectionList>,
    line: watch::Sender<DetectionLine>,
    frames: watch::Sender<Option<Frame>>,
    presented: watch::Sender<Option<Frame>>,
    status: watch::Sender<Option<StatusMessage>>,
    device_address: watch::Sender<Option<String>>,
    tasks: Vec<RepeatingTask>,
}

impl OverlayController {
    pub fn new(config: ViewerConfig, notifier: Arc<dyn Notifier>) -> Result<Self, ViewerError> {
        let client = BackendClient::new(&config.backend_url, config.request_timeout())?;
        let font = config.label_font.as_deref().map(load_font).transpose()?;

        Ok(Self {
            config,
            client,
            notifier,
            font,
            detections: watch::Sender::new(Arc::new(Vec::new())),
            line: watch::Sender::new(DetectionLine::Idle),
            frames: watch::Sender::new(None),
            presented: watch::Sender::new(None),
            status: watch::Sender::new(None),
            device_address: watch::Sender::new(None),
            tasks: Vec::new(),
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn is_mounted(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Loads the backend's stored line and device address, then starts the
    /// stream, poll and render tasks. Mounting twice is a no-op.
    pub async fn mount(&mut self) {
        if self.is_mounted() {
            return;
        }

        self.adopt_backend_config().await;

        if self.config.stream_enabled {
            self.tasks.push(spawn_stream_reader(
                self.client.clone(),
                self.frames.clone(),
                self.config.stream_reconnect(),
            ));
        }
        self.tasks.push(spawn_poller(
            self.client.clone(),
            self.detections.clone(),
            self.config.poll_interval(),
        ));
        let renderer = self.spawn_renderer();
        self.tasks.push(renderer);

        info!(backend = %self.client.base_url(), tasks = self.tasks.len(), "overlay mounted");
    }

    /// Cancels every background task and waits for them to exit.
    pub async fn unmount(&mut self) {
        for task in self.tasks.drain(..) {
            task.cancel().await;
        }
        info!("overlay unmounted");
    }

    async fn adopt_backend_config(&self) {
        match self.client.fetch_config().await {
            Ok(stored) => {
                if let Some(line) = stored.line_coords().and_then(|c| DetectionLine::from_coords(&c)) {
                    self.line.send_if_modified(|current| {
                        let idle = matches!(current, DetectionLine::Idle);
                        if idle {
                            *current = line;
                        }
                        idle
                    });
                }
                if let Some(ip) = stored.esp32_ip.filter(|ip| !ip.is_empty()) {
                    self.device_address.send_replace(Some(ip));
                }
            }
            Err(e) => warn!(error = %e, "could not load stored backend config"),
        }
    }

    fn spawn_renderer(&self) -> RepeatingTask {
        let (w, h) = self.config.canvas_size();
        let renderer = Arc::new(Mutex::new(OverlayRenderer::new(w, h, OverlayStyle::default(), self.font.clone())));
        let frames = self.frames.subscribe();
        let detections = self.detections.subscribe();
        let line = self.line.subscribe();
        let presented = self.presented.clone();

        RepeatingTask::spawn("render", Cadence::FixedRate(self.config.frame_interval()), move || {
            let frame = frames.borrow().clone();
            let boxes = detections.borrow().clone();
            let current_line = *line.borrow();
            let renderer = renderer.clone();
            let presented = presented.clone();

            async move {
                // Idle ticks return before reaching the blocking pool.
                if frame.is_none() {
                    return;
                }
                // Scaling and painting run on the blocking pool.
                let painted = tokio::task::spawn_blocking(move || {
                    let mut renderer = renderer.lock().unwrap_or_else(PoisonError::into_inner);
                    match renderer.render_tick(frame.as_deref(), &boxes, &current_line) {
                        RenderOutcome::Drawn { .. } => Some(Arc::new(renderer.canvas().image().clone())),
                        RenderOutcome::AwaitingFrame => None,
                    }
                })
                .await;
                match painted {
                    Ok(Some(canvas)) => {
                        presented.send_replace(Some(canvas));
                    }
                    Ok(None) => {}
                    Err(e) => error!(error = %e, "render tick failed"),
                }
            }
        })
    }

    // --- State access ---

    pub fn detections(&self) -> DetectionList {
        self.detections.borrow().clone()
    }

    /// The most recently rendered canvas. `None` until the first frame arrives.
    pub fn subscribe_canvas(&self) -> watch::Receiver<Option<Frame>> {
        self.presented.subscribe()
    }

    /// Publishes a decoded frame as if it had come from the stream.
    pub fn push_frame(&self, frame: Frame) {
        self.frames.send_replace(Some(frame));
    }

    pub fn line(&self) -> DetectionLine {
        *self.line.borrow()
    }

    pub fn device_address(&self) -> Option<String> {
        self.device_address.borrow().clone()
    }

    /// The status message, if one is still visible.
    pub fn status(&self) -> Option<StatusMessage> {
        self.status_at(Instant::now())
    }

    pub fn status_at(&self, now: Instant) -> Option<StatusMessage> {
        self.status.borrow().clone().filter(|m| m.is_visible_at(now))
    }

    pub fn show_status(&self, text: impl Into<String>, color: Rgba<u8>) {
        let message = StatusMessage::new(text, color, Instant::now(), self.config.status_duration());
        info!(status = %message.text, color = %status::hex(color));
        self.status.send_replace(Some(message));
    }

    // --- Pointer gestures (canvas-relative pixels) ---

    pub fn pointer_down(&self, x: f64, y: f64) {
        let point = NormalizedPoint::from_canvas(x, y, self.config.canvas_size());
        self.line.send_modify(|line| line.press(point));
    }

    pub fn pointer_up(&self, x: f64, y: f64) {
        let point = NormalizedPoint::from_canvas(x, y, self.config.canvas_size());
        self.line.send_modify(|line| line.release(point));
    }

    // --- User actions ---

    pub async fn save_line(&self) -> Result<(), ActionError> {
        let Some(coords) = self.line().coords() else {
            self.notifier.alert("Draw a line on the video first.");
            return Err(ActionError::InvalidInput("detection line is incomplete"));
        };
        match self.client.save_line(coords).await {
            Ok(()) => {
                self.show_status("Detection line saved", status::SUCCESS);
                Ok(())
            }
            Err(e) => Err(self.report_failure("Failed to save detection line", e)),
        }
    }

    /// Sends the trimmed address from the device-address input.
    pub async fn save_device_address(&self, input: &str) -> Result<DeviceAddress, ActionError> {
        let ip = input.trim();
        if ip.is_empty() {
            self.notifier.alert("Please enter IP.");
            return Err(ActionError::InvalidInput("device address is empty"));
        }
        match self.client.set_device_ip(ip).await {
            Ok(saved) => {
                self.show_status(format!("ESP32 IP updated to: {}", saved.ip), status::SUCCESS);
                self.device_address.send_replace(Some(saved.ip.clone()));
                self.notifier.close_panel();
                Ok(saved)
            }
            Err(e) => Err(self.report_failure("Failed to save ESP32 IP", e)),
        }
    }

    pub async fn start_detection(&self) -> Result<(), ActionError> {
        match self.client.start_detection().await {
            Ok(()) => {
                self.show_status("Detection started", status::SUCCESS);
                Ok(())
            }
            Err(e) => Err(self.report_failure("Failed to start detection", e)),
        }
    }

    pub async fn stop_detection(&self) -> Result<(), ActionError> {
        match self.client.stop_detection().await {
            Ok(()) => {
                self.show_status("Detection stopped", status::DANGER);
                Ok(())
            }
            Err(e) => Err(self.report_failure("Failed to stop detection", e)),
        }
    }

    pub async fn spray_test(&self) -> Result<(), ActionError> {
        match self.client.spray_test().await {
            Ok(()) => {
                self.show_status("Spray triggered!", status::INFO);
                Ok(())
            }
            Err(e) => Err(self.report_failure("Failed to trigger spray", e)),
        }
    }

    pub async fn set_camera(&self, camera: &CameraSettings) -> Result<(), ActionError> {
        if let CameraSettings::Rtsp { rtsp } = camera {
            if rtsp.url.trim().is_empty() {
                self.notifier.alert("Please enter RTSP URL.");
                return Err(ActionError::InvalidInput("rtsp url is empty"));
            }
        }
        match self.client.set_camera(camera).await {
            Ok(()) => {
                self.show_status("Camera updated", status::SUCCESS);
                Ok(())
            }
            Err(e) => Err(self.report_failure("Failed to update camera", e)),
        }
    }

    fn report_failure(&self, alert: &str, e: ClientError) -> ActionError {
        error!(error = %e, "{alert}");
        self.notifier.alert(alert);
        ActionError::Request(e)
    }
}
