#![allow(dead_code)]

use damage_reporter::adapters::camera::UnavailableCamera;
use damage_reporter::core::detection::encode_jpeg;
use damage_reporter::{
    AppConfig, AppState, DetectionBridge, HttpPredictor, LocalDetection, LocalStorage,
    LocationStore, ReportService, SqliteReportRepository,
};
use httpmock::prelude::*;
use image::{Rgb, RgbImage};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestApp {
    pub state: AppState,
    pub dir: TempDir,
    pub predictor: MockServer,
}

/// 以 httpmock 模擬推論服務，回傳固定的偵測結果
pub async fn test_app(detections: serde_json::Value) -> TestApp {
    test_app_with(|predictor| {
        predictor.mock(|when, then| {
            when.method(POST).path("/predict");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({ "detections": detections }));
        });
    })
    .await
}

/// 推論服務的回應由呼叫端自行設定
pub async fn test_app_with(configure: impl FnOnce(&MockServer)) -> TestApp {
    let dir = TempDir::new().unwrap();
    let predictor = MockServer::start();
    configure(&predictor);

    let yaml = format!(
        r#"
database:
  url: "sqlite::memory:"
uploads:
  directory: "{uploads}"
detector:
  model: "nanodet-plus-m.pth"
  config: "nanodet-plus-m.yml"
  webcam: 0
  threshold: 0.35
  device: "cpu"
  endpoint: "{endpoint}"
location:
  store_path: "{location}"
"#,
        uploads = dir.path().join("uploads").display(),
        endpoint = predictor.url("/predict"),
        location = dir.path().join("location_store.json").display(),
    );
    let config = AppConfig::from_yaml_str(&yaml).unwrap();
    let upload_dir = config.ensure_upload_dir().unwrap();

    let repository = SqliteReportRepository::connect(&config.database.url)
        .await
        .unwrap();
    let reports = ReportService::new(Arc::new(repository), LocalStorage::new(&upload_dir));
    let bridge = DetectionBridge::new(
        Arc::new(HttpPredictor::from_settings(&config.detector).unwrap()),
        reports.clone(),
        config.detector.threshold,
    );
    let location = LocationStore::new(&config.location.store_path);
    let local_detection = Arc::new(LocalDetection::new(
        bridge.clone(),
        Arc::new(UnavailableCamera),
        location.clone(),
        config.detector.webcam,
        false,
    ));

    let state = AppState {
        config: Arc::new(config),
        reports,
        bridge,
        local_detection,
        location,
        upload_dir,
    };

    TestApp {
        state,
        dir,
        predictor,
    }
}

pub fn pothole() -> serde_json::Value {
    serde_json::json!([
        {"label": "pothole", "score": 0.87, "bbox": [4.0, 4.0, 20.0, 20.0]},
        {"label": "crack", "score": 0.1, "bbox": [0.0, 0.0, 8.0, 8.0]}
    ])
}

pub fn sample_jpeg() -> Vec<u8> {
    encode_jpeg(&RgbImage::from_pixel(32, 32, Rgb([90, 90, 90]))).unwrap()
}

pub const BOUNDARY: &str = "damage-reporter-test-boundary";

/// 組出 multipart/form-data 內容
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((name, filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}
