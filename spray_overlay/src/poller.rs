use std::sync::Arc;
use tokio::sync::watch;
use tracing::{trace, warn};

use crate::client::BackendClient;
use crate::core_modules::detection::DetectionBox;
use crate::scheduler::{Cadence, RepeatingTask};

pub type DetectionList = Arc<Vec<DetectionBox>>;

/// One poll of `/yolo_data`.
///
/// Success replaces the published list wholesale. Failure leaves the previous
/// list in place (stale but valid) and is only logged.
pub async fn poll_detections(client: &BackendClient, detections: &watch::Sender<DetectionList>) -> bool {
    match client.fetch_detections().await {
        Ok(list) => {
            trace!(count = list.len(), "detections updated");
            detections.send_replace(Arc::new(list));
            true
        }
        Err(e) => {
            warn!(error = %e, "detection poll failed, keeping previous boxes");
            false
        }
    }
}

/// Polls forever at `delay` after each completed request, until the returned
/// task is cancelled or dropped.
pub fn spawn_poller(client: BackendClient, detections: watch::Sender<DetectionList>, delay: std::time::Duration) -> RepeatingTask {
    RepeatingTask::spawn("detection-poll", Cadence::FixedDelay(delay), move || {
        let client = client.clone();
        let detections = detections.clone();
        async move {
            poll_detections(&client, &detections).await;
        }
    })
}
