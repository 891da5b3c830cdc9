use crate::adapters::storage::{public_url, timestamped_file_name};
use crate::core::report_service::ReportService;
use crate::core::visualize::draw_detections;
use crate::core::{Predictor, Storage};
use crate::domain::model::{DamageSeverity, Detection, Location, NewReport, Report};
use crate::utils::error::{ReporterError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, RgbImage};
use std::sync::Arc;

pub const GPS_LOG_FILE: &str = "ws_gps_log.txt";
pub const JPEG_QUALITY: u8 = 85;
pub const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// 單一影格的偵測結果
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub visualized: RgbImage,
    /// 只包含分數達門檻的偵測
    pub detections: Vec<Detection>,
    pub label: Option<String>,
}

/// 已寫入磁碟的偵測影像與 (若有位置) 對應的回報
#[derive(Debug, Clone)]
pub struct SavedDetection {
    pub file_name: String,
    pub photo_url: String,
    pub report: Option<Report>,
}

pub struct DetectionBridge<S: Storage> {
    predictor: Arc<dyn Predictor>,
    reports: ReportService<S>,
    threshold: f32,
}

impl<S: Storage + Clone> Clone for DetectionBridge<S> {
    fn clone(&self) -> Self {
        Self {
            predictor: Arc::clone(&self.predictor),
            reports: self.reports.clone(),
            threshold: self.threshold,
        }
    }
}

/// `data:image/jpeg;base64,<b64>` 取第一個逗號之後的內容解碼
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let (_, encoded) = data_url
        .split_once(',')
        .ok_or_else(|| ReporterError::validation("Invalid data URL: missing ','"))?;
    Ok(STANDARD.decode(encoded.trim())?)
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| {
        tracing::debug!("Image decode failed: {}", e);
        ReporterError::validation("Failed to decode image.")
    })
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).encode_image(image)?;
    Ok(buffer)
}

pub fn to_data_url(jpeg: &[u8]) -> String {
    format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(jpeg))
}

/// 取分數最高者的類別；沒有任何偵測時為 None
pub fn class_label(detections: &[Detection]) -> Option<String> {
    detections
        .iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|d| d.label.clone())
}

fn format_coordinate(value: Option<f64>) -> String {
    value.map_or_else(|| "None".to_string(), |v| v.to_string())
}

impl<S: Storage> DetectionBridge<S> {
    pub fn new(predictor: Arc<dyn Predictor>, reports: ReportService<S>, threshold: f32) -> Self {
        Self {
            predictor,
            reports,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// 推論並在影格副本上畫出達門檻的偵測框
    pub async fn analyze(&self, image: &DynamicImage) -> Result<DetectionOutcome> {
        let frame = encode_jpeg(&image.to_rgb8())?;
        let detections: Vec<Detection> = self
            .predictor
            .inference(&frame)
            .await?
            .into_iter()
            .filter(|d| d.score >= self.threshold)
            .collect();

        let label = class_label(&detections);
        let visualized = draw_detections(image, &detections);
        if let Some(label) = &label {
            tracing::debug!("🔍 {} detections, class '{}'", detections.len(), label);
        }

        Ok(DetectionOutcome {
            visualized,
            detections,
            label,
        })
    }

    pub async fn save_result_image(&self, prefix: &str, jpeg: &[u8]) -> Result<String> {
        let file_name = timestamped_file_name(prefix);
        self.reports.storage().write_file(&file_name, jpeg).await?;
        tracing::info!("📁 Detection frame saved: {}", file_name);
        Ok(file_name)
    }

    pub async fn append_gps_log(&self, file_name: &str, location: &Location) -> Result<()> {
        let line = format!(
            "{}, lat={}, lon={}\n",
            file_name,
            format_coordinate(location.lat),
            format_coordinate(location.lon)
        );
        self.reports
            .storage()
            .append_file(GPS_LOG_FILE, line.as_bytes())
            .await
    }

    /// 經緯度不完整時不建立回報
    pub async fn save_report_from_detection(
        &self,
        location: &Location,
        label: &str,
        photo_url: &str,
        source: &str,
    ) -> Result<Option<Report>> {
        let Some((lat, lng)) = location.coordinates() else {
            tracing::info!("Location incomplete, detection of '{}' not reported", label);
            return Ok(None);
        };

        let report = NewReport {
            lat,
            lng,
            damage_type: label.to_string(),
            severity: DamageSeverity::Medium,
            description: Some(format!(
                "Automatic detection from {} at {}",
                source,
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            )),
        };

        let created = self
            .reports
            .create_report_with_photo_url(report, photo_url)
            .await?;
        Ok(Some(created))
    }

    /// 有類別時保存影像、GPS 紀錄與回報
    pub async fn persist(
        &self,
        outcome: &DetectionOutcome,
        jpeg: &[u8],
        location: &Location,
        prefix: &str,
        source: &str,
    ) -> Result<Option<SavedDetection>> {
        let Some(label) = &outcome.label else {
            return Ok(None);
        };

        let file_name = self.save_result_image(prefix, jpeg).await?;
        self.append_gps_log(&file_name, location).await?;

        let photo_url = public_url(&file_name);
        let report = self
            .save_report_from_detection(location, label, &photo_url, source)
            .await?;

        Ok(Some(SavedDetection {
            file_name,
            photo_url,
            report,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LocalStorage, SqliteReportRepository};
    use async_trait::async_trait;
    use image::Rgb;
    use tempfile::TempDir;

    struct StubPredictor {
        detections: Vec<Detection>,
    }

    #[async_trait]
    impl Predictor for StubPredictor {
        async fn inference(&self, jpeg: &[u8]) -> Result<Vec<Detection>> {
            assert!(image::load_from_memory(jpeg).is_ok());
            Ok(self.detections.clone())
        }
    }

    fn detection(label: &str, score: f32) -> Detection {
        Detection {
            label: label.to_string(),
            score,
            bbox: [1.0, 1.0, 6.0, 6.0],
        }
    }

    async fn bridge(
        detections: Vec<Detection>,
    ) -> (DetectionBridge<LocalStorage>, ReportService<LocalStorage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let repo = SqliteReportRepository::connect("sqlite::memory:").await.unwrap();
        let service = ReportService::new(Arc::new(repo), LocalStorage::new(temp_dir.path()));
        let bridge = DetectionBridge::new(
            Arc::new(StubPredictor { detections }),
            service.clone(),
            0.35,
        );
        (bridge, service, temp_dir)
    }

    fn frame() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([120, 120, 120])))
    }

    #[test]
    fn test_decode_data_url() {
        let bytes = decode_data_url("data:image/jpeg;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");

        assert!(decode_data_url("aGVsbG8=").is_err());
        assert!(matches!(
            decode_data_url("data:image/jpeg;base64,!!!").unwrap_err(),
            ReporterError::Base64Error(_)
        ));
    }

    #[test]
    fn test_decode_image_failure_message() {
        let err = decode_image(b"not an image").unwrap_err();
        assert!(err.to_string().contains("Failed to decode image."));
    }

    #[test]
    fn test_jpeg_data_url_round_trip() {
        let jpeg = encode_jpeg(&frame().to_rgb8()).unwrap();
        let data_url = to_data_url(&jpeg);
        assert!(data_url.starts_with(DATA_URL_PREFIX));

        let decoded = decode_image(&decode_data_url(&data_url).unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
    }

    #[test]
    fn test_class_label_picks_highest_score() {
        let detections = vec![detection("crack", 0.5), detection("pothole", 0.9)];
        assert_eq!(class_label(&detections).as_deref(), Some("pothole"));
        assert_eq!(class_label(&[]), None);
    }

    #[tokio::test]
    async fn test_analyze_applies_threshold() {
        let (bridge, _, _dir) =
            bridge(vec![detection("crack", 0.2), detection("pothole", 0.35)]).await;

        let outcome = bridge.analyze(&frame()).await.unwrap();
        assert_eq!(outcome.detections.len(), 1);
        assert_eq!(outcome.label.as_deref(), Some("pothole"));
        assert_ne!(outcome.visualized, frame().to_rgb8());
    }

    #[tokio::test]
    async fn test_analyze_below_threshold_has_no_label() {
        let (bridge, _, _dir) = bridge(vec![detection("crack", 0.1)]).await;
        let outcome = bridge.analyze(&frame()).await.unwrap();
        assert!(outcome.detections.is_empty());
        assert!(outcome.label.is_none());
        assert_eq!(outcome.visualized, frame().to_rgb8());
    }

    #[tokio::test]
    async fn test_persist_with_location_creates_report() {
        let (bridge, service, dir) = bridge(vec![detection("pothole", 0.8)]).await;
        let outcome = bridge.analyze(&frame()).await.unwrap();
        let jpeg = encode_jpeg(&outcome.visualized).unwrap();
        let location = Location::new(-6.2, 106.816666);

        let saved = bridge
            .persist(&outcome, &jpeg, &location, "detected_frame", "WebSocket")
            .await
            .unwrap()
            .unwrap();

        assert!(saved.file_name.starts_with("detected_frame_"));
        assert!(dir.path().join(&saved.file_name).exists());

        let log = std::fs::read_to_string(dir.path().join(GPS_LOG_FILE)).unwrap();
        assert_eq!(
            log,
            format!("{}, lat=-6.2, lon=106.816666\n", saved.file_name)
        );

        let report = saved.report.unwrap();
        assert_eq!(report.damage_type, "pothole");
        assert_eq!(report.severity, DamageSeverity::Medium);
        assert_eq!(report.photo_url.as_deref(), Some(saved.photo_url.as_str()));
        assert!(report
            .description
            .unwrap()
            .starts_with("Automatic detection from WebSocket at "));
        assert_eq!(service.list_reports(1, 10).await.unwrap().total_reports, 1);
    }

    #[tokio::test]
    async fn test_persist_without_location_logs_none() {
        let (bridge, service, dir) = bridge(vec![detection("pothole", 0.8)]).await;
        let outcome = bridge.analyze(&frame()).await.unwrap();
        let jpeg = encode_jpeg(&outcome.visualized).unwrap();

        let saved = bridge
            .persist(&outcome, &jpeg, &Location::default(), "detected_frame", "WebSocket")
            .await
            .unwrap()
            .unwrap();

        assert!(saved.report.is_none());
        let log = std::fs::read_to_string(dir.path().join(GPS_LOG_FILE)).unwrap();
        assert!(log.ends_with(", lat=None, lon=None\n"));
        assert_eq!(service.list_reports(1, 10).await.unwrap().total_reports, 0);
    }

    #[tokio::test]
    async fn test_persist_without_label_writes_nothing() {
        let (bridge, _, dir) = bridge(vec![]).await;
        let outcome = bridge.analyze(&frame()).await.unwrap();
        let saved = bridge
            .persist(&outcome, b"jpeg", &Location::new(1.0, 2.0), "detected_frame", "WebSocket")
            .await
            .unwrap();

        assert!(saved.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
