mod common;

use common::{MockBackend, RecordingNotifier};
use serde_json::json;
use spray_overlay::core_modules::status;
use spray_overlay::{ActionError, CameraSettings, OverlayController};
use std::sync::Arc;
use std::sync::atomic::Ordering;

async fn setup() -> (MockBackend, OverlayController, Arc<RecordingNotifier>) {
    let backend = MockBackend::spawn().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = OverlayController::new(backend.config(), notifier.clone()).unwrap();
    (backend, controller, notifier)
}

#[tokio::test]
async fn blank_device_address_sends_nothing() {
    let (backend, controller, notifier) = setup().await;

    for input in ["", "   ", "\t\n"] {
        let result = controller.save_device_address(input).await;
        assert!(matches!(result, Err(ActionError::InvalidInput(_))));
    }

    assert!(backend.requests().is_empty());
    assert_eq!(notifier.alerts(), vec!["Please enter IP."; 3]);
}

#[tokio::test]
async fn device_address_is_trimmed_and_echoed() {
    let (backend, controller, notifier) = setup().await;

    let saved = controller.save_device_address("  192.168.1.40 ").await.unwrap();
    assert_eq!(saved.ip, "192.168.1.40");

    let sent = backend.requests_to("/set_esp_ip");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, Some(json!({"ip": "192.168.1.40"})));

    let shown = controller.status().unwrap();
    assert_eq!(shown.text, "ESP32 IP updated to: 192.168.1.40");
    assert_eq!(shown.color, status::SUCCESS);
    assert_eq!(controller.device_address().as_deref(), Some("192.168.1.40"));
    assert_eq!(notifier.panels_closed.load(Ordering::SeqCst), 1);
    assert!(notifier.alerts().is_empty());
}

#[tokio::test]
async fn device_address_failure_alerts() {
    let (backend, controller, notifier) = setup().await;
    backend.state.fail_actions.store(true, Ordering::SeqCst);

    let result = controller.save_device_address("10.0.0.9").await;
    assert!(matches!(result, Err(ActionError::Request(_))));
    assert_eq!(notifier.alerts(), vec!["Failed to save ESP32 IP"]);
    assert_eq!(notifier.panels_closed.load(Ordering::SeqCst), 0);
    assert!(controller.status().is_none());
}

#[tokio::test]
async fn saves_completed_line() {
    let (backend, controller, _) = setup().await;

    controller.pointer_down(64.0, 48.0);
    controller.pointer_up(128.0, 96.0);
    controller.save_line().await.unwrap();

    let sent = backend.requests_to("/save_line");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, Some(json!({"line": [0.1, 0.1, 0.2, 0.2]})));
    assert_eq!(controller.status().unwrap().text, "Detection line saved");
}

#[tokio::test]
async fn never_saves_incomplete_line() {
    let (backend, controller, notifier) = setup().await;

    assert!(controller.save_line().await.is_err());
    controller.pointer_down(5.0, 5.0);
    assert!(controller.save_line().await.is_err());

    assert!(backend.requests_to("/save_line").is_empty());
    assert_eq!(notifier.alerts().len(), 2);
}

#[tokio::test]
async fn control_endpoints_show_their_status() {
    let (backend, controller, _) = setup().await;

    controller.start_detection().await.unwrap();
    let shown = controller.status().unwrap();
    assert_eq!((shown.text.as_str(), shown.color), ("Detection started", status::SUCCESS));

    controller.stop_detection().await.unwrap();
    let shown = controller.status().unwrap();
    assert_eq!((shown.text.as_str(), shown.color), ("Detection stopped", status::DANGER));

    controller.spray_test().await.unwrap();
    let shown = controller.status().unwrap();
    assert_eq!((shown.text.as_str(), shown.color), ("Spray triggered!", status::INFO));

    let paths: Vec<_> = backend.requests().iter().map(|r| (r.method, r.path)).collect();
    assert_eq!(
        paths,
        vec![("GET", "/start_detection"), ("GET", "/stop_detection"), ("GET", "/spray_test")]
    );
}

#[tokio::test]
async fn control_failure_alerts_and_keeps_status() {
    let (backend, controller, notifier) = setup().await;
    controller.start_detection().await.unwrap();
    backend.state.fail_actions.store(true, Ordering::SeqCst);

    assert!(controller.spray_test().await.is_err());
    assert_eq!(notifier.alerts(), vec!["Failed to trigger spray"]);
    assert_eq!(controller.status().unwrap().text, "Detection started");
}

#[tokio::test]
async fn camera_selection_is_posted() {
    let (backend, controller, _) = setup().await;

    controller
        .set_camera(&CameraSettings::Usb { device: "/dev/video2".into() })
        .await
        .unwrap();

    let sent = backend.requests_to("/set_camera");
    assert_eq!(sent[0].body, Some(json!({"type": "usb", "device": "/dev/video2"})));
    assert_eq!(controller.status().unwrap().text, "Camera updated");
}
