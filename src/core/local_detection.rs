use crate::adapters::LocationStore;
use crate::core::detection::{encode_jpeg, DetectionBridge};
use crate::core::{CameraOpener, Storage};
use crate::domain::model::{DetectionStatus, Location};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use image::DynamicImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);
pub const LOCAL_FRAME_PREFIX: &str = "detected_frame";
pub const LOCAL_SOURCE: &str = "local camera";

struct Worker {
    stop: Arc<AtomicBool>,
    consumer: JoinHandle<()>,
}

impl Worker {
    fn is_alive(&self) -> bool {
        !self.consumer.is_finished()
    }
}

/// 伺服器端本機攝影機偵測
///
/// 擷取在獨立執行緒進行，影格經由 channel 交給非同步任務偵測。
pub struct LocalDetection<S: Storage + Clone + 'static> {
    bridge: DetectionBridge<S>,
    camera: Arc<dyn CameraOpener>,
    location: LocationStore,
    device: i32,
    monitoring: bool,
    stop_timeout: Duration,
    worker: Mutex<Option<Worker>>,
}

impl<S: Storage + Clone + 'static> LocalDetection<S> {
    pub fn new(
        bridge: DetectionBridge<S>,
        camera: Arc<dyn CameraOpener>,
        location: LocationStore,
        device: i32,
        monitoring: bool,
    ) -> Self {
        Self {
            bridge,
            camera,
            location,
            device,
            monitoring,
            stop_timeout: STOP_TIMEOUT,
            worker: Mutex::new(None),
        }
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(Worker::is_alive)
    }

    pub async fn start(&self) -> DetectionStatus {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(Worker::is_alive) {
            tracing::info!("Local detection already running");
            return DetectionStatus::AlreadyRunning;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<DynamicImage>(1);

        let camera = Arc::clone(&self.camera);
        let device = self.device;
        let capture_stop = Arc::clone(&stop);
        std::thread::spawn(move || capture_frames(camera.as_ref(), device, &capture_stop, tx));

        let consumer = tokio::spawn(detect_frames(
            self.bridge.clone(),
            self.location.clone(),
            Arc::clone(&stop),
            rx,
            self.monitoring,
        ));

        *worker = Some(Worker { stop, consumer });
        tracing::info!("🚀 Local detection started on camera {}", self.device);
        DetectionStatus::Started
    }

    pub async fn stop(&self) -> DetectionStatus {
        let mut guard = self.worker.lock().await;
        if !guard.as_ref().is_some_and(Worker::is_alive) {
            *guard = None;
            return DetectionStatus::NotRunning;
        }
        let Some(worker) = guard.as_mut() else {
            return DetectionStatus::NotRunning;
        };

        worker.stop.store(true, Ordering::SeqCst);
        let finished = match tokio::time::timeout(self.stop_timeout, &mut worker.consumer).await {
            Ok(Ok(())) => {
                tracing::info!("🛑 Local detection stopped");
                true
            }
            Ok(Err(e)) => {
                tracing::error!("❌ Local detection worker failed: {}", e);
                true
            }
            Err(_) => {
                tracing::warn!(
                    "⚠️ Local detection did not stop within {:?}",
                    self.stop_timeout
                );
                false
            }
        };

        // 逾時的 worker 仍在收尾，保留它讓 start 回應 already_running
        if finished {
            *guard = None;
        }
        DetectionStatus::Stopped
    }
}

fn capture_frames(
    camera: &dyn CameraOpener,
    device: i32,
    stop: &AtomicBool,
    tx: mpsc::Sender<DynamicImage>,
) {
    let mut source = match camera.open(device) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!("❌ Cannot open camera {}: {}", device, e);
            return;
        }
    };

    while !stop.load(Ordering::SeqCst) {
        match source.read_frame() {
            Ok(Some(frame)) => {
                if tx.blocking_send(frame).is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::info!("Camera {} stream ended", device);
                break;
            }
            Err(e) => {
                tracing::error!("❌ Camera {} read failed: {}", device, e);
                break;
            }
        }
    }
}

async fn detect_frames<S: Storage + Clone>(
    bridge: DetectionBridge<S>,
    location: LocationStore,
    stop: Arc<AtomicBool>,
    mut rx: mpsc::Receiver<DynamicImage>,
    monitoring: bool,
) {
    let monitor = SystemMonitor::new(monitoring);
    monitor.log_stats("local detection start");

    while let Some(frame) = rx.recv().await {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let last_location = location.last_location();
        if let Err(e) = detect_frame(&bridge, &frame, &last_location).await {
            tracing::warn!("⚠️ Local detection frame failed: {}", e);
        }
    }

    monitor.log_stats("local detection stop");
    tracing::info!("✅ Local detection worker finished");
}

async fn detect_frame<S: Storage>(
    bridge: &DetectionBridge<S>,
    frame: &DynamicImage,
    location: &Location,
) -> Result<()> {
    let outcome = bridge.analyze(frame).await?;
    if outcome.label.is_none() {
        return Ok(());
    }

    let jpeg = encode_jpeg(&outcome.visualized)?;
    if let Some(saved) = bridge
        .persist(&outcome, &jpeg, location, LOCAL_FRAME_PREFIX, LOCAL_SOURCE)
        .await?
    {
        tracing::info!(
            "🧠 Local detection '{}' saved as {} (location: {:?})",
            outcome.label.as_deref().unwrap_or_default(),
            saved.file_name,
            location.coordinates()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LocalStorage, SqliteReportRepository};
    use crate::core::report_service::ReportService;
    use crate::core::{FrameSource, Predictor};
    use crate::domain::model::Detection;
    use crate::utils::error::ReporterError;
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    struct StubPredictor;

    #[async_trait]
    impl Predictor for StubPredictor {
        async fn inference(&self, _jpeg: &[u8]) -> Result<Vec<Detection>> {
            Ok(vec![Detection {
                label: "pothole".to_string(),
                score: 0.9,
                bbox: [1.0, 1.0, 5.0, 5.0],
            }])
        }
    }

    /// 每張影格都要花一段時間推論
    struct SlowPredictor;

    #[async_trait]
    impl Predictor for SlowPredictor {
        async fn inference(&self, jpeg: &[u8]) -> Result<Vec<Detection>> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            StubPredictor.inference(jpeg).await
        }
    }

    /// 持續產生影格直到被停止
    struct EndlessCamera;

    struct EndlessSource;

    impl FrameSource for EndlessSource {
        fn read_frame(&mut self) -> Result<Option<DynamicImage>> {
            std::thread::sleep(Duration::from_millis(10));
            Ok(Some(DynamicImage::ImageRgb8(RgbImage::from_pixel(
                8,
                8,
                Rgb([50, 50, 50]),
            ))))
        }
    }

    impl CameraOpener for EndlessCamera {
        fn open(&self, _device: i32) -> Result<Box<dyn FrameSource>> {
            Ok(Box::new(EndlessSource))
        }
    }

    struct BrokenCamera;

    impl CameraOpener for BrokenCamera {
        fn open(&self, device: i32) -> Result<Box<dyn FrameSource>> {
            Err(ReporterError::CameraError {
                message: format!("no camera {}", device),
            })
        }
    }

    async fn local_detection(
        camera: Arc<dyn CameraOpener>,
    ) -> (LocalDetection<LocalStorage>, ReportService<LocalStorage>, TempDir) {
        local_detection_with(camera, Arc::new(StubPredictor)).await
    }

    async fn local_detection_with(
        camera: Arc<dyn CameraOpener>,
        predictor: Arc<dyn Predictor>,
    ) -> (LocalDetection<LocalStorage>, ReportService<LocalStorage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let repo = SqliteReportRepository::connect("sqlite::memory:").await.unwrap();
        let service = ReportService::new(Arc::new(repo), LocalStorage::new(temp_dir.path()));
        let bridge = DetectionBridge::new(predictor, service.clone(), 0.35);

        let location = LocationStore::new(temp_dir.path().join("location_store.json"));
        location.update(-6.2, 106.8).unwrap();

        let detection = LocalDetection::new(bridge, camera, location, 0, false);
        (detection, service, temp_dir)
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let (detection, service, _dir) = local_detection(Arc::new(EndlessCamera)).await;

        assert_eq!(detection.stop().await, DetectionStatus::NotRunning);
        assert_eq!(detection.start().await, DetectionStatus::Started);
        assert_eq!(detection.start().await, DetectionStatus::AlreadyRunning);
        assert!(detection.is_running().await);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(detection.stop().await, DetectionStatus::Stopped);
        assert_eq!(detection.stop().await, DetectionStatus::NotRunning);
        assert!(!detection.is_running().await);

        let page = service.list_reports(1, 100).await.unwrap();
        assert!(page.total_reports > 0);
        let report = &page.reports[0];
        assert_eq!(report.damage_type, "pothole");
        assert!(report
            .photo_url
            .as_deref()
            .unwrap()
            .starts_with("/uploads/detected_frame_"));
        assert!(report
            .description
            .as_deref()
            .unwrap()
            .starts_with("Automatic detection from local camera at "));
    }

    #[tokio::test]
    async fn test_camera_failure_ends_worker() {
        let (detection, service, _dir) = local_detection(Arc::new(BrokenCamera)).await;

        assert_eq!(detection.start().await, DetectionStatus::Started);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!detection.is_running().await);
        assert_eq!(detection.stop().await, DetectionStatus::NotRunning);
        assert_eq!(detection.start().await, DetectionStatus::Started);
        assert_eq!(service.list_reports(1, 10).await.unwrap().total_reports, 0);
    }

    #[tokio::test]
    async fn test_stop_timeout_keeps_worker_until_it_finishes() {
        let (detection, _service, _dir) =
            local_detection_with(Arc::new(EndlessCamera), Arc::new(SlowPredictor)).await;
        let detection = detection.with_stop_timeout(Duration::from_millis(50));

        assert_eq!(detection.start().await, DetectionStatus::Started);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // 推論尚未結束，stop 逾時但 worker 仍在
        assert_eq!(detection.stop().await, DetectionStatus::Stopped);
        assert!(detection.is_running().await);
        assert_eq!(detection.start().await, DetectionStatus::AlreadyRunning);

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(!detection.is_running().await);
        assert_eq!(detection.stop().await, DetectionStatus::NotRunning);
        assert_eq!(detection.start().await, DetectionStatus::Started);
        assert_eq!(detection.stop().await, DetectionStatus::Stopped);
    }
}
