// THEORY:
// `frame_source` plays the part of a hidden `<img>` pointed at the MJPEG feed: it
// keeps the newest decoded frame available for whoever renders next, and nothing
// more. There is no frame queue. When the renderer is slower than the camera,
// intermediate frames are simply never looked at.
//
// A stream session ends when the backend closes the body or the connection fails.
// The session runs inside a `FixedDelay` `RepeatingTask`, so the reconnect delay
// falls out of the scheduler instead of needing its own retry loop.

use futures::StreamExt;
use image::{ImageFormat, RgbaImage};
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::client::BackendClient;
use crate::core_modules::mjpeg::MjpegSplitter;
use crate::error::StreamError;
use crate::scheduler::{Cadence, RepeatingTask};

pub type Frame = Arc<RgbaImage>;

pub fn decode_jpeg(bytes: &[u8]) -> Result<RgbaImage, StreamError> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?.to_rgba8())
}

/// Reads one stream session to its end, publishing each newest frame.
/// Returns the number of frames published.
pub async fn read_stream(client: &BackendClient, frames: &watch::Sender<Option<Frame>>) -> Result<u64, StreamError> {
    let response = client.open_stream().await?;
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let mut splitter = MjpegSplitter::from_content_type(&content_type)?;
    info!(url = %client.base_url(), "mjpeg stream connected");

    let mut published = 0;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let mut parts = splitter.push(&chunk?);
        // Only the newest complete part matters.
        let Some(part) = parts.pop() else { continue };
        let size = part.len();
        match tokio::task::spawn_blocking(move || decode_jpeg(&part)).await {
            Ok(Ok(frame)) => {
                frames.send_replace(Some(Arc::new(frame)));
                published += 1;
            }
            Ok(Err(e)) => warn!(error = %e, bytes = size, "skipping undecodable frame"),
            Err(e) => warn!(error = %e, bytes = size, "frame decode task failed"),
        }
    }
    Ok(published)
}

/// Keeps a stream session open, reconnecting `reconnect` after each one ends.
pub fn spawn_stream_reader(client: BackendClient, frames: watch::Sender<Option<Frame>>, reconnect: Duration) -> RepeatingTask {
    RepeatingTask::spawn("mjpeg-stream", Cadence::FixedDelay(reconnect), move || {
        let client = client.clone();
        let frames = frames.clone();
        async move {
            match read_stream(&client, &frames).await {
                Ok(count) => info!(frames = count, "mjpeg stream ended, reconnecting"),
                Err(e) => warn!(error = %e, "mjpeg stream failed, reconnecting"),
            }
        }
    })
}
