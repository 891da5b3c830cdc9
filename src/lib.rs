pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::ServeArgs;

pub use adapters::{HttpPredictor, LocalStorage, LocationStore, SqliteReportRepository};
pub use app::{build_router, AppState};
pub use config::AppConfig;
pub use core::{DetectionBridge, LocalDetection, ReportService};
pub use utils::error::{ReporterError, Result};
