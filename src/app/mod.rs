pub mod detection;
pub mod health;
pub mod location;
pub mod reports;
pub mod websocket;

use crate::adapters::{LocalStorage, LocationStore};
use crate::config::AppConfig;
use crate::core::{DetectionBridge, LocalDetection, ReportService};
use crate::utils::error::ReporterError;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// 所有 handler 共用的狀態
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub reports: ReportService<LocalStorage>,
    pub bridge: DetectionBridge<LocalStorage>,
    pub local_detection: Arc<LocalDetection<LocalStorage>>,
    pub location: LocationStore,
    pub upload_dir: PathBuf,
}

/// 以 `{"detail": "..."}` 回應的 HTTP 錯誤
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }
}

impl From<ReporterError> for ApiError {
    fn from(error: ReporterError) -> Self {
        let status = match &error {
            ReporterError::NotFound { .. } => StatusCode::NOT_FOUND,
            ReporterError::ValidationError { .. } | ReporterError::InvalidValueError { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ReporterError::Base64Error(_) | ReporterError::ImageError(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(
                "❌ Request failed: {} (Category: {:?}, Severity: {:?})",
                error,
                error.category(),
                error.severity()
            );
        }

        Self::new(status, error.user_friendly_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    // 帶 credentials 時不能用萬用字元
    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

pub fn build_router(state: AppState) -> Router {
    let server = &state.config.server;
    let body_limit = server.max_upload_mb * 1024 * 1024;

    let mut router = Router::new()
        .merge(reports::router())
        .merge(location::router())
        .merge(websocket::router())
        .merge(detection::router())
        .merge(health::router())
        .nest_service("/uploads", ServeDir::new(&state.upload_dir));

    if let Some(static_dir) = &server.static_dir {
        tracing::info!("📁 Serving static files from {}", static_dir);
        router = router.nest_service("/static", ServeDir::new(static_dir));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
