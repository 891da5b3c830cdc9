use crate::domain::ports::{CameraOpener, FrameSource};
use crate::utils::error::{ReporterError, Result};

#[cfg(feature = "camera")]
pub use opencv_camera::OpenCvCamera;

/// 未啟用 `camera` feature 時使用的相機，開啟一律失敗
pub struct UnavailableCamera;

impl CameraOpener for UnavailableCamera {
    fn open(&self, device: i32) -> Result<Box<dyn FrameSource>> {
        Err(ReporterError::CameraError {
            message: format!(
                "Camera {} unavailable: built without the `camera` feature",
                device
            ),
        })
    }
}

/// 依編譯選項回傳預設相機
pub fn default_camera() -> Box<dyn CameraOpener> {
    #[cfg(feature = "camera")]
    {
        Box::new(OpenCvCamera)
    }
    #[cfg(not(feature = "camera"))]
    {
        Box::new(UnavailableCamera)
    }
}

#[cfg(feature = "camera")]
mod opencv_camera {
    use super::*;
    use image::DynamicImage;
    use opencv::{
        core::{Mat, Vector},
        imgcodecs,
        prelude::*,
        videoio::{VideoCapture, CAP_ANY},
    };

    fn camera_error(device: i32, e: impl std::fmt::Display) -> ReporterError {
        ReporterError::CameraError {
            message: format!("Camera {}: {}", device, e),
        }
    }

    pub struct OpenCvCamera;

    impl CameraOpener for OpenCvCamera {
        fn open(&self, device: i32) -> Result<Box<dyn FrameSource>> {
            let capture =
                VideoCapture::new(device, CAP_ANY).map_err(|e| camera_error(device, e))?;
            if !capture.is_opened().map_err(|e| camera_error(device, e))? {
                return Err(camera_error(device, "failed to open"));
            }
            tracing::info!("📷 Camera {} opened", device);
            Ok(Box::new(OpenCvFrameSource { device, capture }))
        }
    }

    struct OpenCvFrameSource {
        device: i32,
        capture: VideoCapture,
    }

    impl FrameSource for OpenCvFrameSource {
        fn read_frame(&mut self) -> Result<Option<DynamicImage>> {
            let mut frame = Mat::default();
            let grabbed = self
                .capture
                .read(&mut frame)
                .map_err(|e| camera_error(self.device, e))?;
            if !grabbed {
                return Ok(None);
            }

            // BGR Mat -> JPEG -> RGB image
            let mut buffer = Vector::<u8>::new();
            imgcodecs::imencode(".jpg", &frame, &mut buffer, &Vector::new())
                .map_err(|e| camera_error(self.device, e))?;
            Ok(Some(image::load_from_memory(&buffer.to_vec())?))
        }
    }

    impl Drop for OpenCvFrameSource {
        fn drop(&mut self) {
            if let Err(e) = self.capture.release() {
                tracing::warn!("Failed to release camera {}: {}", self.device, e);
            }
            tracing::info!("✅ Camera {} released", self.device);
        }
    }
}
