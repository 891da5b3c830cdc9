pub mod detection;
pub mod local_detection;
pub mod report_service;
pub mod visualize;

pub use crate::domain::model::{NewReport, PhotoUpload, Report, ReportPage, ReportUpdate};
pub use crate::domain::ports::{CameraOpener, FrameSource, Predictor, ReportRepository, Storage};
pub use crate::utils::error::Result;
pub use detection::DetectionBridge;
pub use local_detection::LocalDetection;
pub use report_service::ReportService;
