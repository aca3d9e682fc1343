#![allow(dead_code)]

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{Value, json};
use spray_overlay::{Notifier, ViewerConfig};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub method: &'static str,
    pub path: &'static str,
    pub body: Option<Value>,
}

#[derive(Clone)]
pub struct MockState {
    requests: Arc<Mutex<Vec<Recorded>>>,
    pub detections: Arc<Mutex<Value>>,
    pub stored_config: Arc<Mutex<Value>>,
    pub stream_content_type: Arc<Mutex<String>>,
    pub stream_body: Arc<Mutex<Vec<u8>>>,
    pub fail_detections: Arc<AtomicBool>,
    pub fail_actions: Arc<AtomicBool>,
}

impl MockState {
    fn record(&self, method: &'static str, path: &'static str, body: Option<Value>) {
        self.requests.lock().unwrap().push(Recorded { method, path, body });
    }

    fn action_response(&self, body: Value) -> Response {
        if self.fail_actions.load(Ordering::SeqCst) {
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        } else {
            Json(body).into_response()
        }
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: MockState,
}

impl MockBackend {
    pub async fn spawn() -> Self {
        let state = MockState {
            requests: Arc::new(Mutex::new(Vec::new())),
            detections: Arc::new(Mutex::new(json!([]))),
            stored_config: Arc::new(Mutex::new(json!({}))),
            stream_content_type: Arc::new(Mutex::new("multipart/x-mixed-replace; boundary=frame".into())),
            stream_body: Arc::new(Mutex::new(Vec::new())),
            fail_detections: Arc::new(AtomicBool::new(false)),
            fail_actions: Arc::new(AtomicBool::new(false)),
        };

        let app = Router::new()
            .route("/yolo_data", get(yolo_data))
            .route("/set_esp_ip", post(set_esp_ip))
            .route("/save_line", post(save_line))
            .route("/start_detection", get(start_detection))
            .route("/stop_detection", get(stop_detection))
            .route("/spray_test", get(spray_test))
            .route("/get_config", get(get_config))
            .route("/set_camera", post(set_camera))
            .route("/stream", get(stream))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> ViewerConfig {
        ViewerConfig {
            backend_url: self.url(),
            poll_interval_ms: 20,
            frame_interval_ms: 5,
            request_timeout_ms: 2000,
            stream_enabled: false,
            ..ViewerConfig::default()
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    pub fn set_detections(&self, value: Value) {
        *self.state.detections.lock().unwrap() = value;
    }
}

async fn yolo_data(State(s): State<MockState>) -> Response {
    s.record("GET", "/yolo_data", None);
    if s.fail_detections.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(s.detections.lock().unwrap().clone()).into_response()
}

async fn set_esp_ip(State(s): State<MockState>, Json(body): Json<Value>) -> Response {
    s.record("POST", "/set_esp_ip", Some(body.clone()));
    match body.get("ip") {
        Some(ip) => s.action_response(json!({"status": "ok", "ip": ip})),
        None => (StatusCode::BAD_REQUEST, Json(json!({"error": "Missing ip"}))).into_response(),
    }
}

async fn save_line(State(s): State<MockState>, Json(body): Json<Value>) -> Response {
    s.record("POST", "/save_line", Some(body));
    s.action_response(json!({"status": "ok"}))
}

async fn start_detection(State(s): State<MockState>) -> Response {
    s.record("GET", "/start_detection", None);
    s.action_response(json!({"status": "Detecting"}))
}

async fn stop_detection(State(s): State<MockState>) -> Response {
    s.record("GET", "/stop_detection", None);
    s.action_response(json!({"status": "Stopped"}))
}

async fn spray_test(State(s): State<MockState>) -> Response {
    s.record("GET", "/spray_test", None);
    s.action_response(json!({"status": "Spray Triggered"}))
}

async fn get_config(State(s): State<MockState>) -> Response {
    s.record("GET", "/get_config", None);
    Json(s.stored_config.lock().unwrap().clone()).into_response()
}

async fn set_camera(State(s): State<MockState>, Json(body): Json<Value>) -> Response {
    s.record("POST", "/set_camera", Some(body));
    s.action_response(json!({"status": "Camera updated"}))
}

async fn stream(State(s): State<MockState>) -> Response {
    s.record("GET", "/stream", None);
    let content_type = s.stream_content_type.lock().unwrap().clone();
    let body = s.stream_body.lock().unwrap().clone();
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// A solid-color JPEG of the given size.
pub fn jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Jpeg).unwrap();
    out.into_inner()
}

/// Wraps JPEG payloads the way the backend's `/stream` route does.
pub fn multipart(frames: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for frame in frames {
        out.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
        out.extend_from_slice(frame);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"--frame--\r\n");
    out
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<String>>,
    pub panels_closed: AtomicUsize,
}

impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }

    fn close_panel(&self) {
        self.panels_closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Polls `check` every 10ms until it holds or two seconds pass.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
