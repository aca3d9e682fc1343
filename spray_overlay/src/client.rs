// THEORY:
// `BackendClient` is the whole of the viewer's outside world: a handful of JSON
// endpoints on the sprayer backend plus the MJPEG feed. Every call is an async
// operation returning a `Result`, and the client itself never decides what a
// failure means. The poller swallows errors, user actions surface them; that
// policy lives with the callers in `poller` and `controller`.

use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::core_modules::detection::DetectionBox;
use crate::error::{ClientError, StreamError};

pub const DETECTIONS_PATH: &str = "yolo_data";
pub const SET_DEVICE_IP_PATH: &str = "set_esp_ip";
pub const SAVE_LINE_PATH: &str = "save_line";
pub const START_DETECTION_PATH: &str = "start_detection";
pub const STOP_DETECTION_PATH: &str = "stop_detection";
pub const SPRAY_TEST_PATH: &str = "spray_test";
pub const CONFIG_PATH: &str = "get_config";
pub const SET_CAMERA_PATH: &str = "set_camera";
pub const STREAM_PATH: &str = "stream";

const STREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct SaveLineRequest {
    line: [f64; 4],
}

#[derive(Debug, Serialize)]
struct DeviceAddressRequest<'a> {
    ip: &'a str,
}

/// The backend's acknowledgement of a new device address.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceAddress {
    pub ip: String,
}

/// The subset of the backend's stored configuration the viewer cares about.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub line: Option<serde_json::Value>,
    pub esp32_ip: Option<String>,
}

impl BackendConfig {
    /// The stored line, if it is an array of exactly four numbers.
    pub fn line_coords(&self) -> Option<Vec<f64>> {
        let values = self.line.as_ref()?.as_array()?;
        let coords: Option<Vec<f64>> = values.iter().map(|v| v.as_f64()).collect();
        coords.filter(|c| c.len() == 4)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RtspSettings {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// Camera source selection, serialized the way `/set_camera` expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CameraSettings {
    Usb { device: String },
    Rtsp { rtsp: RtspSettings },
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    base: Url,
    http: Client,
    stream_http: Client,
}

impl BackendClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ClientError> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base = Url::parse(&normalized).map_err(|_| ClientError::InvalidUrl(base_url.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(ClientError::Build)?;
        let stream_http = Client::builder()
            .connect_timeout(STREAM_CONNECT_TIMEOUT)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self { base, http, stream_http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &'static str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|_| ClientError::InvalidUrl(format!("{}{}", self.base, path)))
    }

    async fn get(&self, path: &'static str) -> Result<Response, ClientError> {
        debug!(path, "GET");
        let response = self
            .http
            .get(self.url(path)?)
            .send()
            .await
            .map_err(|source| ClientError::Transport { path, source })?;
        ensure_success(path, response)
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &'static str, body: &T) -> Result<Response, ClientError> {
        debug!(path, "POST");
        let response = self
            .http
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Transport { path, source })?;
        ensure_success(path, response)
    }

    pub async fn fetch_detections(&self) -> Result<Vec<DetectionBox>, ClientError> {
        let response = self.get(DETECTIONS_PATH).await?;
        response
            .json()
            .await
            .map_err(|source| ClientError::Decode { path: DETECTIONS_PATH, source })
    }

    pub async fn save_line(&self, line: [f64; 4]) -> Result<(), ClientError> {
        self.post_json(SAVE_LINE_PATH, &SaveLineRequest { line }).await?;
        Ok(())
    }

    pub async fn set_device_ip(&self, ip: &str) -> Result<DeviceAddress, ClientError> {
        let response = self.post_json(SET_DEVICE_IP_PATH, &DeviceAddressRequest { ip }).await?;
        response
            .json()
            .await
            .map_err(|source| ClientError::Decode { path: SET_DEVICE_IP_PATH, source })
    }

    pub async fn start_detection(&self) -> Result<(), ClientError> {
        self.get(START_DETECTION_PATH).await.map(drop)
    }

    pub async fn stop_detection(&self) -> Result<(), ClientError> {
        self.get(STOP_DETECTION_PATH).await.map(drop)
    }

    pub async fn spray_test(&self) -> Result<(), ClientError> {
        self.get(SPRAY_TEST_PATH).await.map(drop)
    }

    pub async fn fetch_config(&self) -> Result<BackendConfig, ClientError> {
        let response = self.get(CONFIG_PATH).await?;
        response
            .json()
            .await
            .map_err(|source| ClientError::Decode { path: CONFIG_PATH, source })
    }

    pub async fn set_camera(&self, camera: &CameraSettings) -> Result<(), ClientError> {
        self.post_json(SET_CAMERA_PATH, camera).await.map(drop)
    }

    /// Opens the MJPEG feed. Only the connect phase is bounded by a timeout.
    pub async fn open_stream(&self) -> Result<Response, StreamError> {
        let url = self
            .base
            .join(STREAM_PATH)
            .map_err(|_| StreamError::InvalidUrl(format!("{}{}", self.base, STREAM_PATH)))?;
        let response = self.stream_http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(StreamError::Status(response.status()));
        }
        Ok(response)
    }
}

fn ensure_success(path: &'static str, response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status { path, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_under_base_prefix() {
        let client = BackendClient::new("http://pi.local:5000/viewer", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url(DETECTIONS_PATH).unwrap().as_str(), "http://pi.local:5000/viewer/yolo_data");
    }

    #[test]
    fn rejects_non_http_base() {
        assert!(matches!(
            BackendClient::new("ftp://pi.local", Duration::from_secs(1)),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            BackendClient::new("not a url", Duration::from_secs(1)),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn camera_settings_wire_format() {
        let usb = serde_json::to_value(CameraSettings::Usb { device: "/dev/video0".into() }).unwrap();
        assert_eq!(usb, serde_json::json!({"type": "usb", "device": "/dev/video0"}));

        let rtsp = serde_json::to_value(CameraSettings::Rtsp {
            rtsp: RtspSettings {
                url: "10.0.0.5:554/live".into(),
                username: "admin".into(),
                password: "secret".into(),
            },
        })
        .unwrap();
        assert_eq!(rtsp["type"], "rtsp");
        assert_eq!(rtsp["rtsp"]["url"], "10.0.0.5:554/live");
    }

    #[test]
    fn config_line_requires_four_numbers() {
        let config: BackendConfig = serde_json::from_str(r#"{"line":[0.1,0.2,0.3,0.4],"esp32_ip":"10.0.0.9"}"#).unwrap();
        assert_eq!(config.line_coords(), Some(vec![0.1, 0.2, 0.3, 0.4]));

        let config: BackendConfig = serde_json::from_str(r#"{"line":[0.1,0.2]}"#).unwrap();
        assert_eq!(config.line_coords(), None);

        let config: BackendConfig = serde_json::from_str(r#"{"line":"oops"}"#).unwrap();
        assert_eq!(config.line_coords(), None);
    }

    #[test]
    fn config_ignores_fields_the_viewer_does_not_use() {
        let config: BackendConfig = serde_json::from_str(
            r#"{"line":[0.1,0.2,0.3,0.4],"esp32_ip":"10.0.0.9","detect_objects":null,"camera":{"type":"usb"}}"#,
        )
        .unwrap();
        assert_eq!(config.line_coords(), Some(vec![0.1, 0.2, 0.3, 0.4]));
        assert_eq!(config.esp32_ip.as_deref(), Some("10.0.0.9"));
    }
}
